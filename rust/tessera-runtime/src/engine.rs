//! Execution engine: one isolated execution context per call.
//!
//! Every invocation gets a fresh [`Thread`] carrying the print sink and the
//! host capabilities, is bound to the caller's [`CancelScope`], and runs
//! behind the panic boundary. Failures come back as a classified
//! [`CallError`]; nothing raised inside the interpreter unwinds past
//! [`ExecutionEngine::call`].

use crate::cancel::CancelScope;
use crate::error::CallError;
use crate::modules::assert::TestReporter;
use crate::modules::cache::{Cache, CacheBinding};
use crate::modules::random::RandomSource;
use crate::modules::secret::{SecretBinding, SecretDecrypter};
use crate::panic_boundary::catch_panic;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tessera_core::{Arguments, EvalError, Function, PrintFn, Root, Thread, Value};

/// Customizes every new execution context, after the host capabilities are
/// attached.
pub type ThreadInitializer = Arc<dyn Fn(&mut Thread) + Send + Sync>;

/// Print sink that emits one `tracing` event per line of script output.
pub fn log_print() -> PrintFn {
    Arc::new(|thread: &Thread, msg: &str| {
        tracing::info!(applet = thread.name(), "{msg}");
    })
}

/// Print sink that writes `[applet] message` to stdout.
pub fn stdout_print() -> PrintFn {
    Arc::new(|thread: &Thread, msg: &str| {
        println!("[{}] {}", thread.name(), msg);
    })
}

/// Print sink that drops output.
pub fn disabled_print() -> PrintFn {
    Arc::new(|_thread: &Thread, _msg: &str| {})
}

#[derive(Clone)]
pub struct ExecutionEngine {
    id: String,
    print: PrintFn,
    initializers: Vec<ThreadInitializer>,
    random_seed: Option<u64>,
    cache: Option<Arc<dyn Cache>>,
    secrets: Option<Arc<dyn SecretDecrypter>>,
}

impl ExecutionEngine {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            print: log_print(),
            initializers: Vec::new(),
            random_seed: None,
            cache: None,
            secrets: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_print(&mut self, print: PrintFn) {
        self.print = print;
    }

    pub fn add_initializer(&mut self, init: ThreadInitializer) {
        self.initializers.push(init);
    }

    pub fn set_random_seed(&mut self, seed: Option<u64>) {
        self.random_seed = seed;
    }

    pub fn set_cache(&mut self, cache: Option<Arc<dyn Cache>>) {
        self.cache = cache;
    }

    pub fn set_secrets(&mut self, secrets: Option<Arc<dyn SecretDecrypter>>) {
        self.secrets = secrets;
    }

    /// Build a fresh execution context for this applet.
    pub fn new_thread(&self) -> Thread {
        let mut thread = Thread::new(self.id.clone());
        thread.set_print(Arc::clone(&self.print));
        thread.set_local(match self.random_seed {
            Some(seed) => RandomSource::seeded(seed),
            None => RandomSource::from_entropy(),
        });
        if let Some(cache) = &self.cache {
            thread.set_local(CacheBinding {
                cache: Arc::clone(cache),
                namespace: self.id.clone(),
            });
        }
        if let Some(secrets) = &self.secrets {
            thread.set_local(SecretBinding(Arc::clone(secrets)));
        }
        for init in &self.initializers {
            init(&mut thread);
        }
        thread
    }

    /// Invoke `function` under `scope`.
    pub fn call(
        &self,
        scope: &CancelScope,
        function: &Function,
        args: Arguments,
    ) -> Result<Value, CallError> {
        self.call_with(scope, function, args, |_| {})
    }

    /// Call a test function with `reporter` attached.
    pub(crate) fn call_reporting(
        &self,
        scope: &CancelScope,
        function: &Function,
        reporter: &TestReporter,
    ) -> Result<Value, CallError> {
        self.call_with(scope, function, Arguments::none(), |thread| {
            thread.set_local(reporter.clone())
        })
    }

    fn call_with(
        &self,
        scope: &CancelScope,
        function: &Function,
        args: Arguments,
        prepare: impl FnOnce(&mut Thread),
    ) -> Result<Value, CallError> {
        let mut thread = self.new_thread();
        prepare(&mut thread);

        let handle = thread.cancel_handle();
        let _watch = scope.after_cancel(move |cause| handle.cancel(cause));

        tracing::debug!(applet = %self.id, function = function.name(), "calling applet function");
        let outcome = catch_panic(AssertUnwindSafe(|| function.call(&mut thread, args)));
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.classify(function, err)),
            Err(panic) => Err(CallError::Panic {
                id: self.id.clone(),
                source: panic,
            }),
        }
    }

    fn classify(&self, function: &Function, err: EvalError) -> CallError {
        match err {
            EvalError::Cancelled { reason } => {
                tracing::warn!(applet = %self.id, function = function.name(), cause = %reason, "applet call cancelled");
                CallError::Cancelled {
                    id: self.id.clone(),
                    function: function.name().to_string(),
                    cause: reason,
                }
            }
            EvalError::Traced(traced) => CallError::Eval {
                backtrace: traced.backtrace(),
            },
            other => CallError::Function {
                function: function.name().to_string(),
                position: function.position(),
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("id", &self.id)
            .field("initializers", &self.initializers.len())
            .field("random_seed", &self.random_seed)
            .field("cache", &self.cache.is_some())
            .field("secrets", &self.secrets.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Entry-point results
// ---------------------------------------------------------------------------

/// Shape of the value returned by an applet's `main`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnedRoots {
    /// A single rootable value.
    Single(Root),
    /// A list or tuple whose every element is rootable.
    Sequence(Vec<Root>),
    /// Anything else. `index` points into a sequence at the first element
    /// that is not rootable.
    Mismatch { found: String, index: Option<usize> },
}

impl ReturnedRoots {
    pub fn classify(value: &Value) -> Self {
        if let Value::Object(obj) = value {
            if let Some(rootable) = obj.as_rootable() {
                return ReturnedRoots::Single(rootable.as_render_root());
            }
        }
        let Some(items) = value.as_sequence() else {
            return ReturnedRoots::Mismatch {
                found: value.type_name(),
                index: None,
            };
        };
        let mut roots = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let rootable = match item {
                Value::Object(obj) => obj.as_rootable(),
                _ => None,
            };
            match rootable {
                Some(rootable) => roots.push(rootable.as_render_root()),
                None => {
                    return ReturnedRoots::Mismatch {
                        found: item.type_name(),
                        index: Some(index),
                    }
                }
            }
        }
        ReturnedRoots::Sequence(roots)
    }

    pub fn into_roots(self) -> Result<Vec<Root>, CallError> {
        match self {
            ReturnedRoots::Single(root) => Ok(vec![root]),
            ReturnedRoots::Sequence(roots) => Ok(roots),
            ReturnedRoots::Mismatch { found, index: None } => {
                Err(CallError::UnexpectedReturn { found })
            }
            ReturnedRoots::Mismatch {
                found,
                index: Some(index),
            } => Err(CallError::UnexpectedElement { found, index }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::render::RootValue;
    use std::sync::mpsc;
    use std::time::Duration;
    use tessera_core::{NativeFunction, Position, Widget};

    fn root_value() -> Value {
        Value::object(RootValue(Root {
            child: Widget::Stack { children: vec![] },
            delay: 0,
            max_age: 0,
            show_full_animation: false,
        }))
    }

    #[test]
    fn classifies_single_sequence_and_mismatch() {
        assert!(matches!(
            ReturnedRoots::classify(&root_value()),
            ReturnedRoots::Single(_)
        ));
        match ReturnedRoots::classify(&Value::Tuple(vec![root_value(), root_value()])) {
            ReturnedRoots::Sequence(roots) => assert_eq!(roots.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            ReturnedRoots::classify(&Value::Int(3)),
            ReturnedRoots::Mismatch {
                found: "int".into(),
                index: None
            }
        );
        let err = ReturnedRoots::classify(&Value::List(vec![
            root_value(),
            Value::from("x"),
            root_value(),
        ]))
        .into_roots()
        .unwrap_err();
        assert!(err.to_string().ends_with("found: string (at index 1)"));
    }

    #[test]
    fn panics_become_call_errors() {
        let engine = ExecutionEngine::new("boom-app");
        let f = Function::native("main", |_t, _a| -> Result<Value, EvalError> {
            panic!("invariant violated")
        });
        let err = engine
            .call(&CancelScope::new(), &f, Arguments::none())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "panic while running boom-app: panic: invariant violated"
        );
    }

    #[test]
    fn builtin_failure_names_function_and_position() {
        let engine = ExecutionEngine::new("app");
        let f = Function::native("helper", |_t, _a| Err(EvalError::msg("bad input")));
        let err = engine
            .call(&CancelScope::new(), &f, Arguments::none())
            .unwrap_err();
        assert_eq!(err.to_string(), "in helper at <builtin>: bad input");
    }

    #[test]
    fn script_failure_carries_backtrace() {
        let engine = ExecutionEngine::new("app");
        let f = Function::new(
            NativeFunction::new("main", |_t, _a| Err(EvalError::msg("division by zero")))
                .at(Position::new("app.star", 7, 1)),
        );
        let err = engine
            .call(&CancelScope::new(), &f, Arguments::none())
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Traceback (most recent call last):"));
        assert!(text.contains("app.star:7:1: in main"));
    }

    #[test]
    fn cancellation_reports_upstream_cause() {
        let engine = ExecutionEngine::new("slow");
        let scope = CancelScope::new();
        let (started_tx, started_rx) = mpsc::channel();
        let f = Function::native("main", move |t, _a| {
            let _ = started_tx.send(());
            loop {
                t.checkpoint()?;
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        let canceller = scope.clone();
        std::thread::spawn(move || {
            let _ = started_rx.recv();
            canceller.cancel("request deadline");
        });
        let err = engine.call(&scope, &f, Arguments::none()).unwrap_err();
        assert_eq!(err.cancel_cause(), Some("request deadline"));
    }

    #[test]
    fn threads_get_fresh_capabilities() {
        let mut engine = ExecutionEngine::new("app");
        engine.set_random_seed(Some(9));
        engine.add_initializer(Arc::new(|t: &mut Thread| t.set_local(42u8)));
        let a = engine.new_thread();
        assert_eq!(a.name(), "app");
        assert_eq!(a.local::<u8>(), Some(&42));
        assert!(a.local::<RandomSource>().is_some());
        assert!(a.local::<CacheBinding>().is_none());
    }
}
