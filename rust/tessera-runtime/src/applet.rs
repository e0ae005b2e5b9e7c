//! The applet facade.
//!
//! An [`Applet`] is built once from a file set and then serves any number
//! of calls: [`Applet::run`] drives the `main` entry point and
//! [`Applet::call_schema_handler`] dispatches schema handlers. Construction
//! is atomic; on any load failure no applet is returned.

use crate::cancel::CancelScope;
use crate::config::{HostConfig, PrintMode};
use crate::engine::{disabled_print, log_print, stdout_print, ExecutionEngine, ReturnedRoots};
use crate::error::{CallError, LoadError, SchemaError};
use crate::loader::{GraphLoader, LoadedSchema};
use crate::modules::assert::TestReporter;
use crate::modules::cache::{Cache, InMemoryCache};
use crate::modules::secret::SecretDecrypter;
use crate::registry::ModuleRegistry;
use crate::schema::{encode_options, ReturnKind, Schema};
use crate::vfs::{FileSet, MemoryFs, SCRIPT_EXTENSION};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tessera_core::{
    Arguments, Bindings, EvalError, Function, Interpreter, Object, Root, Thread, Value,
};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct AppletBuilder {
    id: String,
    interpreter: Arc<dyn Interpreter>,
    registry: Arc<ModuleRegistry>,
    engine: ExecutionEngine,
}

impl AppletBuilder {
    pub fn registry(mut self, registry: Arc<ModuleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn print<F>(mut self, print: F) -> Self
    where
        F: Fn(&Thread, &str) + Send + Sync + 'static,
    {
        self.engine.set_print(Arc::new(print));
        self
    }

    pub fn print_disabled(mut self) -> Self {
        self.engine.set_print(disabled_print());
        self
    }

    /// Run `init` on every new execution context.
    pub fn initializer<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut Thread) + Send + Sync + 'static,
    {
        self.engine.add_initializer(Arc::new(init));
        self
    }

    pub fn secret_decrypter(mut self, decrypter: Arc<dyn SecretDecrypter>) -> Self {
        self.engine.set_secrets(Some(decrypter));
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.engine.set_cache(Some(cache));
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.engine.set_random_seed(Some(seed));
        self
    }

    /// Apply host configuration: print sink, random seed and cache.
    pub fn config(mut self, config: &HostConfig) -> Self {
        self.engine.set_print(match config.applet.print {
            PrintMode::Log => log_print(),
            PrintMode::Stdout => stdout_print(),
            PrintMode::Disabled => disabled_print(),
        });
        self.engine.set_random_seed(config.applet.random_seed);
        let cache: Option<Arc<dyn Cache>> = if config.cache.enabled {
            Some(Arc::new(InMemoryCache::new(config.cache.max_entries)))
        } else {
            None
        };
        self.engine.set_cache(cache);
        self
    }

    /// Load every script at the root of `fs`.
    pub fn load(self, fs: &dyn FileSet) -> Result<Applet, LoadError> {
        let loaded =
            GraphLoader::new(fs, &self.registry, self.interpreter.as_ref(), &self.engine).load()?;
        tracing::info!(
            applet = %self.id,
            units = loaded.units.len(),
            main = %loaded.main_file,
            schema = loaded.schema.is_some(),
            "applet loaded"
        );
        Ok(Applet {
            id: self.id,
            engine: self.engine,
            units: loaded.units,
            main_file: loaded.main_file,
            main: loaded.main,
            schema: loaded.schema,
        })
    }
}

// ---------------------------------------------------------------------------
// Applet
// ---------------------------------------------------------------------------

pub struct Applet {
    id: String,
    engine: ExecutionEngine,
    units: BTreeMap<String, Bindings>,
    main_file: String,
    main: Function,
    schema: Option<LoadedSchema>,
}

impl Applet {
    pub fn builder(id: impl Into<String>, interpreter: Arc<dyn Interpreter>) -> AppletBuilder {
        let id = id.into();
        AppletBuilder {
            engine: ExecutionEngine::new(id.clone()),
            id,
            interpreter,
            registry: ModuleRegistry::shared(),
        }
    }

    /// A single-file applet. The source is stored as `<id>.star`.
    pub fn from_source(
        id: &str,
        interpreter: Arc<dyn Interpreter>,
        src: impl Into<Vec<u8>>,
    ) -> Result<Applet, LoadError> {
        let filename = if id.ends_with(SCRIPT_EXTENSION) {
            id.to_string()
        } else {
            format!("{id}{SCRIPT_EXTENSION}")
        };
        let fs = MemoryFs::new().with_file(&filename, src);
        Applet::builder(id, interpreter).load(&fs)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    pub fn schema_file(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.file.as_str())
    }

    /// Exports of every loaded source unit, by normalized path.
    pub fn source_units(&self) -> impl Iterator<Item = (&str, &Bindings)> {
        self.units.iter().map(|(path, exports)| (path.as_str(), exports))
    }

    pub fn exports(&self, path: &str) -> Option<&Bindings> {
        self.units.get(path)
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref().map(|s| &s.schema)
    }

    /// Serialized schema, computed at load time. Empty without a schema.
    pub fn schema_json(&self) -> &str {
        self.schema.as_ref().map(|s| s.json.as_str()).unwrap_or("")
    }

    /// Invoke any function value of this applet.
    pub fn call(
        &self,
        scope: &CancelScope,
        function: &Function,
        args: Arguments,
    ) -> Result<Value, CallError> {
        self.engine.call(scope, function, args)
    }

    pub fn run(&self, scope: &CancelScope) -> Result<Vec<Root>, CallError> {
        self.run_with_config(scope, None)
    }

    /// Run `main`, passing `config` when it declares a parameter.
    pub fn run_with_config(
        &self,
        scope: &CancelScope,
        config: Option<&BTreeMap<String, String>>,
    ) -> Result<Vec<Root>, CallError> {
        let args = if self.main.num_params() > 0 {
            let config = AppletConfig::new(config.cloned().unwrap_or_default());
            Arguments::positional(vec![Value::object(config)])
        } else {
            Arguments::none()
        };
        let value = self.engine.call(scope, &self.main, args)?;
        ReturnedRoots::classify(&value).into_roots()
    }

    /// Call schema handler `name` with `parameter` and encode its result.
    pub fn call_schema_handler(
        &self,
        scope: &CancelScope,
        name: &str,
        parameter: &str,
    ) -> Result<String, SchemaError> {
        let loaded = self
            .schema
            .as_ref()
            .ok_or_else(|| SchemaError::UnknownHandler(name.to_string()))?;
        let handler = loaded
            .schema
            .handler(name)
            .ok_or_else(|| SchemaError::UnknownHandler(name.to_string()))?;

        let result = self
            .engine
            .call(
                scope,
                &handler.function,
                Arguments::positional(vec![parameter.into()]),
            )
            .map_err(|source| SchemaError::HandlerCall {
                handler: name.to_string(),
                source,
            })?;

        match handler.kind {
            ReturnKind::Options => encode_options(&result),
            ReturnKind::Schema => {
                let globals = self.units.get(&loaded.file).cloned().unwrap_or_default();
                Schema::from_handler_result(&result, &globals)?.to_json()
            }
            ReturnKind::String => match result {
                Value::String(s) => Ok(s),
                other => Err(SchemaError::NotAString {
                    handler: handler.function.name().to_string(),
                    found: other.type_name(),
                }),
            },
        }
    }

    /// Run every top-level function named `test_*` with an assertion
    /// reporter attached.
    pub fn run_tests(&self, scope: &CancelScope) -> Vec<TestOutcome> {
        let mut outcomes = Vec::new();
        for (file, exports) in &self.units {
            for (name, value) in exports {
                let Some(function) = value.as_function().filter(|_| name.starts_with("test_"))
                else {
                    continue;
                };
                let reporter = TestReporter::new();
                let mut failures = Vec::new();
                let result = self.engine.call_reporting(scope, function, &reporter);
                failures.extend(reporter.failures());
                if let Err(err) = result {
                    failures.push(err.to_string());
                }
                outcomes.push(TestOutcome {
                    name: format!("{file}/{name}"),
                    failures,
                });
            }
        }
        outcomes
    }
}

impl fmt::Debug for Applet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Applet")
            .field("id", &self.id)
            .field("main_file", &self.main_file)
            .field("schema_file", &self.schema_file())
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of one applet test function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    /// `file/function`.
    pub name: String,
    pub failures: Vec<String>,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AppletConfig
// ---------------------------------------------------------------------------

/// Configuration handed to `main(config)`.
#[derive(Debug, Clone)]
pub struct AppletConfig {
    values: Arc<BTreeMap<String, String>>,
}

impl AppletConfig {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    fn method(&self, name: &'static str) -> Function {
        let values = Arc::clone(&self.values);
        let qualified = format!("config.{name}");
        Function::native(qualified.clone(), move |_thread, args| {
            let mut p = args.parser(&qualified);
            let key: String = p.required("key")?;
            let default: Option<Value> = p.optional("default")?;
            p.finish()?;
            let found = values.get(&key);
            Ok(match name {
                "get" => found.map(|v| Value::from(v.as_str())).or(default).unwrap_or(Value::None),
                "str" => match found {
                    Some(v) => Value::from(v.as_str()),
                    None => default.unwrap_or_else(|| Value::from("")),
                },
                "bool" => match found.map(String::as_str).and_then(parse_bool) {
                    Some(b) => Value::Bool(b),
                    None => default.unwrap_or(Value::Bool(false)),
                },
                _ => return Err(EvalError::msg(format!("config has no method {name}"))),
            })
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl Object for AppletConfig {
    fn type_name(&self) -> &str {
        "AppletConfig"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "get" => Some(Value::Function(self.method("get"))),
            "str" => Some(Value::Function(self.method("str"))),
            "bool" => Some(Value::Function(self.method("bool"))),
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["bool".to_string(), "get".to_string(), "str".to_string()]
    }

    fn truth(&self) -> bool {
        !self.values.is_empty()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Value {
        let mut values = BTreeMap::new();
        values.insert("city".to_string(), "Oslo".to_string());
        values.insert("seconds".to_string(), "true".to_string());
        values.insert("broken".to_string(), "maybe".to_string());
        Value::object(AppletConfig::new(values))
    }

    fn call(method: &str, args: Vec<Value>) -> Value {
        config()
            .get_attr(method)
            .unwrap()
            .call(&mut Thread::new("t"), Arguments::positional(args))
            .unwrap()
    }

    #[test]
    fn get_and_str_defaults() {
        assert_eq!(call("get", vec!["city".into()]), Value::from("Oslo"));
        assert!(call("get", vec!["zone".into()]).is_none());
        assert_eq!(call("get", vec!["zone".into(), "UTC".into()]), Value::from("UTC"));
        assert_eq!(call("str", vec!["zone".into()]), Value::from(""));
    }

    #[test]
    fn bool_parses_or_falls_back() {
        assert_eq!(call("bool", vec!["seconds".into()]), Value::Bool(true));
        assert_eq!(call("bool", vec!["broken".into()]), Value::Bool(false));
        assert_eq!(
            call("bool", vec!["missing".into(), Value::Bool(true)]),
            Value::Bool(true)
        );
    }

    #[test]
    fn empty_config_is_falsy() {
        assert!(!Value::object(AppletConfig::new(BTreeMap::new())).truth());
        assert!(config().truth());
    }
}
