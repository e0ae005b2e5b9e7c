//! Function values and the calling protocol.
//!
//! Every invocation, whether it comes from the host (entry points, schema
//! handlers) or from script code, goes through [`Function::call`]. That is
//! where the cooperative cancellation checkpoint runs, where the call-frame
//! stack is maintained, and where plain failures pick up a backtrace.

use crate::error::{EvalError, Frame, Position};
use crate::thread::Thread;
use crate::value::{Dict, Value};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Callable / Function
// ---------------------------------------------------------------------------

/// Implemented by the interpreter for its function values, and by the host
/// for native builtins.
///
/// Implementations must tolerate being invoked from independent execution
/// contexts on different OS threads.
pub trait Callable: Send + Sync {
    fn name(&self) -> &str;

    fn position(&self) -> Position {
        Position::builtin()
    }

    /// Number of declared parameters.
    fn num_params(&self) -> usize {
        0
    }

    fn call(&self, thread: &mut Thread, args: Arguments) -> Result<Value, EvalError>;
}

#[derive(Clone)]
pub struct Function(Arc<dyn Callable>);

impl Function {
    pub fn new(callable: impl Callable + 'static) -> Self {
        Function(Arc::new(callable))
    }

    /// A host builtin backed by a closure.
    pub fn native<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Thread, Arguments) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Function::new(NativeFunction::new(name, body))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn position(&self) -> Position {
        self.0.position()
    }

    pub fn num_params(&self) -> usize {
        self.0.num_params()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Invoke the function on `thread`.
    pub fn call(&self, thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
        thread.checkpoint()?;
        thread.push_frame(Frame::new(self.name(), self.position()))?;
        let result = self.0.call(thread, args);
        let result = result.map_err(|err| err.traced(thread.frames()));
        thread.pop_frame();
        result
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {} at {}>", self.name(), self.position())
    }
}

// ---------------------------------------------------------------------------
// NativeFunction
// ---------------------------------------------------------------------------

type NativeBody = dyn Fn(&mut Thread, Arguments) -> Result<Value, EvalError> + Send + Sync;

/// A closure-backed [`Callable`].
pub struct NativeFunction {
    name: String,
    position: Position,
    num_params: usize,
    body: Box<NativeBody>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Thread, Arguments) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            position: Position::builtin(),
            num_params: 0,
            body: Box::new(body),
        }
    }

    /// Report `position` as the definition site. Functions with a real
    /// position are treated as script frames in backtraces.
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_params(mut self, num_params: usize) -> Self {
        self.num_params = num_params;
        self
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Position {
        self.position.clone()
    }

    fn num_params(&self) -> usize {
        self.num_params
    }

    fn call(&self, thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
        (self.body)(thread, args)
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Arguments {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: Vec::new(),
        }
    }

    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Start unpacking the arguments of a call to `function`.
    pub fn parser(self, function: &str) -> ArgParser {
        ArgParser {
            function: function.to_string(),
            positional: self.positional.into_iter(),
            named: self
                .named
                .into_iter()
                .map(|(name, value)| (name, Some(value)))
                .collect(),
        }
    }
}

/// Unpacks [`Arguments`] in parameter order.
///
/// Parameters must be requested in declaration order: positional arguments
/// bind to the parameters requested first, named arguments bind by name.
pub struct ArgParser {
    function: String,
    positional: std::vec::IntoIter<Value>,
    named: Vec<(String, Option<Value>)>,
}

impl ArgParser {
    fn take(&mut self, param: &str) -> Result<Option<Value>, EvalError> {
        let named = self
            .named
            .iter_mut()
            .find(|(name, _)| name == param)
            .and_then(|(_, value)| value.take());
        match (self.positional.next(), named) {
            (Some(_), Some(_)) => Err(EvalError::msg(format!(
                "{}: got multiple values for parameter {:?}",
                self.function, param
            ))),
            (Some(value), None) | (None, Some(value)) => Ok(Some(value)),
            (None, None) => Ok(None),
        }
    }

    fn convert<T: FromValue>(&self, param: &str, value: Value) -> Result<T, EvalError> {
        let found = value.type_name();
        T::from_value(value).map_err(|want| {
            EvalError::msg(format!(
                "{}: for parameter {}: got {}, want {}",
                self.function, param, found, want
            ))
        })
    }

    pub fn required<T: FromValue>(&mut self, param: &str) -> Result<T, EvalError> {
        match self.take(param)? {
            Some(value) => self.convert(param, value),
            None => Err(EvalError::msg(format!(
                "{}: missing argument for {}",
                self.function, param
            ))),
        }
    }

    /// An optional parameter; an explicit `None` counts as absent.
    pub fn optional<T: FromValue>(&mut self, param: &str) -> Result<Option<T>, EvalError> {
        match self.take(param)? {
            Some(Value::None) | None => Ok(None),
            Some(value) => self.convert(param, value).map(Some),
        }
    }

    pub fn or_default<T: FromValue>(&mut self, param: &str, default: T) -> Result<T, EvalError> {
        Ok(self.optional(param)?.unwrap_or(default))
    }

    /// Reject leftover positional or unknown named arguments.
    pub fn finish(self) -> Result<(), EvalError> {
        let extra = self.positional.len();
        if extra > 0 {
            return Err(EvalError::msg(format!(
                "{}: got {} unexpected positional argument(s)",
                self.function, extra
            )));
        }
        if let Some((name, _)) = self.named.iter().find(|(_, value)| value.is_some()) {
            return Err(EvalError::msg(format!(
                "{}: unexpected keyword argument {:?}",
                self.function, name
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FromValue
// ---------------------------------------------------------------------------

/// Typed conversion out of a [`Value`]. The error is the expected type name.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(s),
            _ => Err("string".into()),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(i),
            _ => Err("int".into()),
        }
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => u32::try_from(i).map_err(|_| "non-negative int".to_string()),
            _ => Err("int".into()),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| "32-bit int".to_string()),
            _ => Err("int".into()),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            _ => Err("float or int".into()),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(b),
            _ => Err("bool".into()),
        }
    }
}

impl FromValue for Function {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Function(f) => Ok(f),
            _ => Err("function".into()),
        }
    }
}

impl FromValue for Dict {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Dict(d) => Ok(d),
            _ => Err("dict".into()),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::List(items) | Value::Tuple(items) => items
                .into_iter()
                .map(T::from_value)
                .collect::<Result<Vec<T>, String>>()
                .map_err(|want| format!("list of {want}")),
            _ => Err("list".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Arguments {
        Arguments::positional(vec![Value::from("hello")]).with_named("width", 10i64)
    }

    #[test]
    fn parser_binds_positional_then_named() {
        let mut p = args().parser("render.Text");
        let content: String = p.required("content").unwrap();
        let font: Option<String> = p.optional("font").unwrap();
        let width: i64 = p.or_default("width", 0).unwrap();
        p.finish().unwrap();
        assert_eq!(content, "hello");
        assert_eq!(font, None);
        assert_eq!(width, 10);
    }

    #[test]
    fn parser_reports_type_mismatch() {
        let mut p = Arguments::positional(vec![Value::Int(1)]).parser("hash.md5");
        let err = p.required::<String>("input").unwrap_err();
        assert_eq!(
            err.to_string(),
            "hash.md5: for parameter input: got int, want string"
        );
    }

    #[test]
    fn parser_rejects_unknown_keyword() {
        let p = Arguments::none().with_named("colour", "red").parser("render.Box");
        let err = p.finish().unwrap_err();
        assert!(err.to_string().contains("unexpected keyword argument \"colour\""));
    }

    #[test]
    fn parser_rejects_duplicate_binding() {
        let mut p = Arguments::positional(vec![Value::from("a")])
            .with_named("content", "b")
            .parser("render.Text");
        assert!(p.required::<String>("content").is_err());
    }

    #[test]
    fn missing_required_argument() {
        let mut p = Arguments::none().parser("render.Root");
        let err = p.required::<Value>("child").unwrap_err();
        assert_eq!(err.to_string(), "render.Root: missing argument for child");
    }

    #[test]
    fn call_tracks_frames_and_traces_failures() {
        let inner = Function::new(
            NativeFunction::new("helper", |_t, _a| Err(EvalError::msg("boom")))
                .at(Position::new("lib.star", 4, 1)),
        );
        let outer = Function::new(
            NativeFunction::new("main", move |t, _a| inner.call(t, Arguments::none()))
                .at(Position::new("main.star", 1, 1)),
        );
        let mut thread = Thread::new("test");
        let err = outer.call(&mut thread, Arguments::none()).unwrap_err();
        match err {
            EvalError::Traced(traced) => {
                let names: Vec<&str> = traced.stack.iter().map(|f| f.function.as_str()).collect();
                assert_eq!(names, vec!["main", "helper"]);
                assert_eq!(traced.message, "boom");
            }
            other => panic!("expected traced error, got {other:?}"),
        }
        assert!(thread.frames().is_empty());
    }

    #[test]
    fn cancelled_thread_refuses_calls() {
        let f = Function::native("f", |_t, _a| Ok(Value::Int(1)));
        let mut thread = Thread::new("test");
        thread.cancel_handle().cancel("stop");
        let err = f.call(&mut thread, Arguments::none()).unwrap_err();
        assert_eq!(err, EvalError::Cancelled { reason: "stop".into() });
    }
}
