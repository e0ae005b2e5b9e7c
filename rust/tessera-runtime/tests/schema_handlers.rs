//! Schema handler registration and dispatch.

use std::sync::Arc;
use tessera_core::{Arguments, EvalError, NativeInterpreter, Thread, UnitContext, Value};
use tessera_runtime::{Applet, CallError, CancelScope, LoadError, MemoryFs, ReturnKind, SchemaError};

fn attr(module: &Value, name: &str, thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    module.get_attr(name)?.call(thread, args)
}

fn common(args: Arguments, id: &str) -> Arguments {
    args.with_named("id", id)
        .with_named("name", id)
        .with_named("desc", format!("{id} field"))
        .with_named("icon", "gear")
}

/// Defines the handlers and `get_schema` of a weather applet.
fn weather(unit: &mut UnitContext<'_>) -> Result<(), EvalError> {
    let schema = unit.load_one("schema.star", "schema")?;
    unit.def("main", 1, 0, |_t, _a| Ok(Value::List(vec![])));

    let options_schema = schema.clone();
    let search = unit.def("search_cities", 10, 1, move |thread, args| {
        let query = args.positional.first().map(|v| v.to_string()).unwrap_or_default();
        let option = attr(
            &options_schema,
            "Option",
            thread,
            Arguments::none()
                .with_named("display", format!("{query} (city)"))
                .with_named("value", query.to_lowercase()),
        )?;
        Ok(Value::List(vec![option]))
    });

    let nested_schema = schema.clone();
    let units_for = unit.def("units_for", 20, 1, move |thread, args| {
        let station = args.positional.first().map(|v| v.to_string()).unwrap_or_default();
        let toggle = attr(
            &nested_schema,
            "Toggle",
            thread,
            common(Arguments::none(), &format!("{station}_metric")).with_named("default", true),
        )?;
        Ok(Value::List(vec![toggle]))
    });

    let oauth = unit.def("oauth_handler", 30, 1, |_t, args| {
        let code = args.positional.first().map(|v| v.to_string()).unwrap_or_default();
        if code == "bad" {
            return Ok(Value::Int(401));
        }
        if code == "raw" {
            return Ok(Value::Bytes(b"token".to_vec()));
        }
        if code == "boom" {
            return Err(EvalError::msg("token endpoint unreachable"));
        }
        Ok(Value::String(format!("token-for-{code}")))
    });

    let echo = unit.def("echo", 40, 1, |_t, args| {
        Ok(args.positional.first().cloned().unwrap_or_default())
    });

    unit.def("get_schema", 50, 0, move |thread, _args| {
        let typeahead = attr(
            &schema,
            "Typeahead",
            thread,
            common(Arguments::none(), "city").with_named("handler", search.clone()),
        )?;
        let generated = attr(
            &schema,
            "Generated",
            thread,
            Arguments::none()
                .with_named("id", "units")
                .with_named("source", "city")
                .with_named("handler", units_for.clone()),
        )?;
        let login = attr(
            &schema,
            "OAuth2",
            thread,
            common(Arguments::none(), "account")
                .with_named("handler", oauth.clone())
                .with_named("client_id", "tessera")
                .with_named("authorization_endpoint", "https://auth.example.com")
                .with_named("scopes", Value::List(vec!["read".into()])),
        )?;
        let handler_types = schema.get_attr("HandlerType")?;
        let echo_handler = attr(
            &schema,
            "Handler",
            thread,
            Arguments::none()
                .with_named("handler", echo.clone())
                .with_named("type", handler_types.get_attr("String")?),
        )?;
        attr(
            &schema,
            "Schema",
            thread,
            Arguments::none()
                .with_named("version", "1")
                .with_named("fields", Value::List(vec![typeahead, generated, login]))
                .with_named("handlers", Value::List(vec![echo_handler])),
        )
    });
    Ok(())
}

fn weather_applet() -> Applet {
    let interpreter = NativeInterpreter::new().program("weather.star", weather);
    Applet::from_source("weather", Arc::new(interpreter), "").expect("applet should load")
}

// ─── registration ───

#[test]
fn handlers_are_registered_by_kind() {
    let applet = weather_applet();
    let schema = applet.schema().expect("schema");
    let kinds: Vec<(&str, ReturnKind)> = schema
        .handlers
        .iter()
        .map(|(name, h)| (name.as_str(), h.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("echo", ReturnKind::String),
            ("oauth_handler", ReturnKind::String),
            ("search_cities", ReturnKind::Options),
            ("units_for", ReturnKind::Schema),
        ]
    );
    let json: serde_json::Value = serde_json::from_str(applet.schema_json()).unwrap();
    assert_eq!(json["schema"][0]["handler"], "search_cities");
    assert_eq!(json["schema"][1]["source"], "city");
    assert_eq!(json["schema"][2]["client_id"], "tessera");
}

// ─── dispatch ───

#[test]
fn options_handler_returns_encoded_options() {
    let applet = weather_applet();
    let out = applet
        .call_schema_handler(&CancelScope::new(), "search_cities", "Oslo")
        .unwrap();
    assert_eq!(out, r#"[{"display":"Oslo (city)","value":"oslo"}]"#);
}

#[test]
fn schema_handler_returns_a_nested_schema() {
    let applet = weather_applet();
    let out = applet
        .call_schema_handler(&CancelScope::new(), "units_for", "ENGM")
        .unwrap();
    assert_eq!(
        out,
        r#"{"version":"1","schema":[{"type":"toggle","id":"ENGM_metric","name":"ENGM_metric","description":"ENGM_metric field","icon":"gear","default":"true"}]}"#
    );
}

#[test]
fn string_handlers_pass_the_string_through() {
    let applet = weather_applet();
    let scope = CancelScope::new();
    assert_eq!(
        applet.call_schema_handler(&scope, "oauth_handler", "xyz").unwrap(),
        "token-for-xyz"
    );
    assert_eq!(applet.call_schema_handler(&scope, "echo", "ping").unwrap(), "ping");
}

#[test]
fn string_handler_returning_a_number() {
    let applet = weather_applet();
    let err = applet
        .call_schema_handler(&CancelScope::new(), "oauth_handler", "bad")
        .unwrap_err();
    assert!(matches!(err, SchemaError::NotAString { .. }));
    assert_eq!(
        err.to_string(),
        "expected oauth_handler to return a string or string-like value, found int"
    );
}

#[test]
fn string_handler_returning_bytes() {
    let applet = weather_applet();
    let err = applet
        .call_schema_handler(&CancelScope::new(), "oauth_handler", "raw")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "expected oauth_handler to return a string or string-like value, found bytes"
    );
}

#[test]
fn failing_handler_is_wrapped() {
    let applet = weather_applet();
    let err = applet
        .call_schema_handler(&CancelScope::new(), "oauth_handler", "boom")
        .unwrap_err();
    match &err {
        SchemaError::HandlerCall { handler, source } => {
            assert_eq!(handler, "oauth_handler");
            assert!(matches!(source, CallError::Eval { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().ends_with("Error in oauth_handler: token endpoint unreachable"));
}

#[test]
fn unknown_handler() {
    let applet = weather_applet();
    let err = applet
        .call_schema_handler(&CancelScope::new(), "get_schema", "")
        .unwrap_err();
    assert_eq!(err.to_string(), "no exported handler named 'get_schema'");
}

#[test]
fn applet_without_schema_has_no_handlers() {
    let interpreter = NativeInterpreter::new().program("plain.star", |unit| {
        unit.def("main", 1, 0, |_t, _a| Ok(Value::List(vec![])));
        Ok(())
    });
    let applet = Applet::from_source("plain", Arc::new(interpreter), "").unwrap();
    assert!(applet.schema().is_none());
    let err = applet
        .call_schema_handler(&CancelScope::new(), "anything", "")
        .unwrap_err();
    assert_eq!(err.to_string(), "no exported handler named 'anything'");
}

#[test]
fn cancelled_handler_keeps_the_cause() {
    let applet = weather_applet();
    let scope = CancelScope::new();
    scope.cancel("client went away");
    let err = applet
        .call_schema_handler(&scope, "echo", "ping")
        .unwrap_err();
    match err {
        SchemaError::HandlerCall { source, .. } => {
            assert_eq!(source.cancel_cause(), Some("client went away"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ─── invalid registrations fail the load ───

fn load_with_schema<F>(get_schema: F) -> Result<Applet, LoadError>
where
    F: Fn(&mut Thread, &Value, &Value) -> Result<Value, EvalError> + Send + Sync + Clone + 'static,
{
    let interpreter = NativeInterpreter::new().program("app.star", move |unit| {
        let schema = unit.load_one("schema.star", "schema")?;
        let handler = unit.def("handler", 2, 1, |_t, _a| Ok(Value::List(vec![])));
        let handler = Value::Function(handler);
        unit.def("main", 3, 0, |_t, _a| Ok(Value::List(vec![])));
        let body = get_schema.clone();
        unit.def("get_schema", 4, 0, move |thread, _| body(thread, &schema, &handler));
        Ok(())
    });
    Applet::builder("app", Arc::new(interpreter)).load(&MemoryFs::new().with_file("app.star", ""))
}

#[test]
fn handler_must_be_a_function() {
    let err = load_with_schema(|thread, schema, _| {
        attr(
            schema,
            "Handler",
            thread,
            Arguments::none()
                .with_named("handler", "handler")
                .with_named("type", 0i64),
        )
    })
    .unwrap_err();
    assert!(matches!(err, LoadError::SchemaCall { .. }));
    assert!(err
        .to_string()
        .contains("schema.Handler: for parameter handler: got string, want function"));
}

#[test]
fn handler_type_must_be_known() {
    let err = load_with_schema(|thread, schema, handler| {
        attr(
            schema,
            "Handler",
            thread,
            Arguments::none()
                .with_named("handler", handler.clone())
                .with_named("type", 42i64),
        )
    })
    .unwrap_err();
    assert!(err.to_string().contains("schema.Handler: invalid handler type 42"));
}

#[test]
fn handler_must_be_exported_by_the_schema_file() {
    let err = load_with_schema(|thread, schema, _| {
        let stray = tessera_core::Function::native("handler", |_t, _a| Ok(Value::None));
        let field = attr(
            schema,
            "Typeahead",
            thread,
            common(Arguments::none(), "city").with_named("handler", stray),
        )?;
        attr(
            schema,
            "Schema",
            thread,
            Arguments::none()
                .with_named("version", "1")
                .with_named("fields", Value::List(vec![field])),
        )
    })
    .unwrap_err();
    assert!(matches!(err, LoadError::SchemaParse { .. }));
    assert_eq!(
        err.to_string(),
        "parsing schema for app: invalid schema: handler \"handler\" is not a top-level function of the schema file"
    );
}

#[test]
fn one_handler_cannot_have_two_kinds() {
    let err = load_with_schema(|thread, schema, handler| {
        let a = attr(
            schema,
            "Typeahead",
            thread,
            common(Arguments::none(), "a").with_named("handler", handler.clone()),
        )?;
        let b = attr(
            schema,
            "Generated",
            thread,
            Arguments::none()
                .with_named("id", "b")
                .with_named("source", "a")
                .with_named("handler", handler.clone()),
        )?;
        attr(
            schema,
            "Schema",
            thread,
            Arguments::none()
                .with_named("version", "1")
                .with_named("fields", Value::List(vec![a, b])),
        )
    })
    .unwrap_err();
    assert!(err
        .to_string()
        .ends_with("handler \"handler\" registered as both options and schema"));
}

#[test]
fn duplicate_field_ids() {
    let err = load_with_schema(|thread, schema, _| {
        let text = |thread: &mut Thread| {
            attr(schema, "Text", thread, common(Arguments::none(), "name"))
        };
        let a = text(thread)?;
        let b = text(thread)?;
        attr(
            schema,
            "Schema",
            thread,
            Arguments::none()
                .with_named("version", "1")
                .with_named("fields", Value::List(vec![a, b])),
        )
    })
    .unwrap_err();
    assert!(err.to_string().ends_with("duplicate field id \"name\""));
}
