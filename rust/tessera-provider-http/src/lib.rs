//! `http.star`: a blocking HTTP client for applets.
//!
//! - `http.get(url, params=None, headers=None, auth=None)`
//! - `http.post(url, params=None, headers=None, auth=None, body=None,
//!   form_body=None, json_body=None)`
//! - `http.put(...)` and `http.delete(...)` take the same arguments as `post`
//!
//! Each returns an `http.Response` with `url`, `status_code`, `status` and
//! `headers` attributes and `body()` / `json()` methods. All requests share
//! one client with a 30 second timeout. The call blocks the execution
//! context but checks for cancellation before sending.

use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, Request};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{
    ArgParser, Arguments, Bindings, Dict, EvalError, Function, ModuleBuilder, Object, Thread,
    Value,
};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static CLIENT: OnceCell<Client> = OnceCell::new();

fn client() -> Result<&'static Client, EvalError> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EvalError::msg(format!("http: failed to build client: {e}")))
    })
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn function_name(self) -> &'static str {
        match self {
            Method::Get => "http.get",
            Method::Post => "http.post",
            Method::Put => "http.put",
            Method::Delete => "http.delete",
        }
    }

    fn takes_body(self) -> bool {
        !matches!(self, Method::Get)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Raw(Vec<u8>),
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// A request as described by script arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub auth: Option<(String, String)>,
    pub body: Option<Body>,
}

fn string_pairs(value: Option<Dict>) -> Vec<(String, String)> {
    value
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
}

fn auth_arg(function: &str, value: Option<Value>) -> Result<Option<(String, String)>, EvalError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.as_sequence() {
        Some([user, pass]) => Ok(Some((user.to_string(), pass.to_string()))),
        _ => Err(EvalError::msg(format!(
            "{function}: auth must be a (username, password) tuple, got {}",
            value.type_name()
        ))),
    }
}

impl HttpRequest {
    pub fn from_args(method: Method, args: Arguments) -> Result<Self, EvalError> {
        let function = method.function_name();
        let mut p: ArgParser = args.parser(function);
        let url: String = p.required("url")?;
        let params = string_pairs(p.optional("params")?);
        let headers = string_pairs(p.optional("headers")?);
        let auth = auth_arg(function, p.optional("auth")?)?;

        let mut body = None;
        if method.takes_body() {
            let raw: Option<String> = p.optional("body")?;
            let form: Option<Dict> = p.optional("form_body")?;
            let json: Option<Value> = p.optional("json_body")?;
            let given = [raw.is_some(), form.is_some(), json.is_some()];
            if given.iter().filter(|b| **b).count() > 1 {
                return Err(EvalError::msg(format!(
                    "{function}: only one of body, form_body and json_body may be given"
                )));
            }
            body = if let Some(raw) = raw {
                Some(Body::Raw(raw.into_bytes()))
            } else if let Some(form) = form {
                Some(Body::Form(string_pairs(Some(form))))
            } else if let Some(json) = json {
                Some(Body::Json(
                    tessera_provider_encoding::json::to_json(&json)
                        .map_err(|e| EvalError::msg(format!("{function}: json_body: {}", e.message())))?,
                ))
            } else {
                None
            };
        }
        p.finish()?;

        Ok(HttpRequest {
            method,
            url,
            params,
            headers,
            auth,
            body,
        })
    }

    /// Build the wire request without sending it.
    pub fn build(&self, client: &Client) -> Result<Request, EvalError> {
        let function = self.method.function_name();
        let mut url = Url::parse(&self.url)
            .map_err(|e| EvalError::msg(format!("{function}: invalid URL {:?}: {e}", self.url)))?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }

        let mut req = match self.method {
            Method::Get => client.get(url),
            Method::Post => client.post(url),
            Method::Put => client.put(url),
            Method::Delete => client.delete(url),
        };
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| EvalError::msg(format!("{function}: header {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| EvalError::msg(format!("{function}: header {name}: {e}")))?;
            req = req.header(name, value);
        }
        if let Some((user, pass)) = &self.auth {
            req = req.basic_auth(user, Some(pass));
        }
        req = match &self.body {
            None => req,
            Some(Body::Raw(bytes)) => req.body(bytes.clone()),
            Some(Body::Form(pairs)) => {
                let encoded: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect();
                req.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(encoded.join("&"))
            }
            Some(Body::Json(json)) => req
                .header(CONTENT_TYPE, "application/json")
                .body(json.to_string()),
        };
        req.build()
            .map_err(|e| EvalError::msg(format!("{function}: {e}")))
    }
}

fn execute(thread: &mut Thread, method: Method, args: Arguments) -> Result<Value, EvalError> {
    let request = HttpRequest::from_args(method, args)?;
    let client = client()?;
    let wire = request.build(client)?;
    thread.checkpoint()?;

    tracing::debug!(applet = thread.name(), method = %wire.method(), url = %wire.url(), "http request");
    let function = method.function_name();
    let response = client
        .execute(wire)
        .map_err(|e| EvalError::msg(format!("{function}: request failed: {e}")))?;
    let response = HttpResponse::read(response)
        .map_err(|e| EvalError::msg(format!("{function}: reading response: {e}")))?;
    Ok(Value::object(response))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status_code: u16,
    pub status: String,
    pub headers: Dict,
    pub body: Arc<Vec<u8>>,
}

impl HttpResponse {
    fn read(response: reqwest::blocking::Response) -> reqwest::Result<Self> {
        let url = response.url().to_string();
        let status = response.status();
        let mut headers = Dict::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                headers.insert(name.to_string(), Value::from(text));
            }
        }
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse {
            url,
            status_code: status.as_u16(),
            status: status.to_string(),
            headers,
            body: Arc::new(body),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Object for HttpResponse {
    fn type_name(&self) -> &str {
        "http.Response"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "url" => Some(Value::from(self.url.as_str())),
            "status_code" => Some(Value::Int(i64::from(self.status_code))),
            "status" => Some(Value::from(self.status.as_str())),
            "headers" => Some(Value::Dict(self.headers.clone())),
            "body" => {
                let text = self.text();
                Some(Value::Function(Function::native(
                    "http.Response.body",
                    move |_thread, args| {
                        args.parser("http.Response.body").finish()?;
                        Ok(Value::String(text.clone()))
                    },
                )))
            }
            "json" => {
                let body = Arc::clone(&self.body);
                Some(Value::Function(Function::native(
                    "http.Response.json",
                    move |_thread, args| {
                        args.parser("http.Response.json").finish()?;
                        let parsed: serde_json::Value = serde_json::from_slice(&body)
                            .map_err(|e| EvalError::msg(format!("http.Response.json: {e}")))?;
                        Ok(tessera_provider_encoding::json::from_json(parsed))
                    },
                )))
            }
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        ["body", "headers", "json", "status", "status_code", "url"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("http")
        .function("get", |thread, args| execute(thread, Method::Get, args))
        .function("post", |thread, args| execute(thread, Method::Post, args))
        .function("put", |thread, args| execute(thread, Method::Put, args))
        .function("delete", |thread, args| execute(thread, Method::Delete, args))
        .build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
