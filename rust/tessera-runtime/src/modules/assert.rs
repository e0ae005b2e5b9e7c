//! `assert.star`: assertions for applet test functions.
//!
//! Under [`crate::Applet::run_tests`] a [`TestReporter`] is attached to the
//! execution context and failed assertions are recorded there, so one test
//! reports every failing assertion. Without a reporter an assertion failure
//! fails the call.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};
use tessera_core::{Arguments, Bindings, EvalError, Function, ModuleBuilder, Thread, Value};

#[derive(Clone, Default)]
pub struct TestReporter {
    failures: Arc<Mutex<Vec<String>>>,
}

impl TestReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, message: impl Into<String>) {
        self.lock().push(message.into());
    }

    pub fn failures(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("assert")
        .function("eq", eq)
        .function("ne", ne)
        .function("true", is_true)
        .function("lt", lt)
        .function("contains", contains)
        .function("fails", fails)
        .build()
}

fn fail(thread: &Thread, message: String) -> Result<Value, EvalError> {
    match thread.local::<TestReporter>() {
        Some(reporter) => {
            reporter.report(message);
            Ok(Value::None)
        }
        None => Err(EvalError::msg(message)),
    }
}

fn with_msg(message: Option<String>, default: String) -> String {
    message.unwrap_or(default)
}

fn eq(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("assert.eq");
    let x: Value = p.required("x")?;
    let y: Value = p.required("y")?;
    let msg: Option<String> = p.optional("msg")?;
    p.finish()?;
    if x == y {
        return Ok(Value::None);
    }
    fail(thread, with_msg(msg, format!("{} != {}", x.repr(), y.repr())))
}

fn ne(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("assert.ne");
    let x: Value = p.required("x")?;
    let y: Value = p.required("y")?;
    let msg: Option<String> = p.optional("msg")?;
    p.finish()?;
    if x != y {
        return Ok(Value::None);
    }
    fail(thread, with_msg(msg, format!("{} == {}", x.repr(), y.repr())))
}

fn is_true(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("assert.true");
    let cond: Value = p.required("cond")?;
    let msg: Option<String> = p.optional("msg")?;
    p.finish()?;
    if cond.truth() {
        return Ok(Value::None);
    }
    fail(thread, with_msg(msg, "assertion failed".to_string()))
}

fn compare(x: &Value, y: &Value) -> Option<Ordering> {
    match (x, y) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn lt(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("assert.lt");
    let x: Value = p.required("x")?;
    let y: Value = p.required("y")?;
    p.finish()?;
    match compare(&x, &y) {
        Some(Ordering::Less) => Ok(Value::None),
        Some(_) => fail(thread, format!("{} is not less than {}", x.repr(), y.repr())),
        None => Err(EvalError::msg(format!(
            "assert.lt: cannot compare {} and {}",
            x.type_name(),
            y.type_name()
        ))),
    }
}

fn contains(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("assert.contains");
    let container: Value = p.required("x")?;
    let item: Value = p.required("y")?;
    p.finish()?;
    let found = match (&container, &item) {
        (Value::List(items) | Value::Tuple(items), _) => items.contains(&item),
        (Value::Dict(dict), Value::String(key)) => dict.contains_key(key),
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        _ => {
            return Err(EvalError::msg(format!(
                "assert.contains: {} does not support membership of {}",
                container.type_name(),
                item.type_name()
            )))
        }
    };
    if found {
        return Ok(Value::None);
    }
    fail(thread, format!("{} does not contain {}", container.repr(), item.repr()))
}

fn fails(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("assert.fails");
    let f: Function = p.required("f")?;
    let pattern: String = p.required("pattern")?;
    p.finish()?;
    let re = Regex::new(&pattern)
        .map_err(|e| EvalError::msg(format!("assert.fails: invalid pattern: {e}")))?;
    match f.call(thread, Arguments::none()) {
        Ok(_) => fail(
            thread,
            format!("evaluation succeeded unexpectedly (want error matching {pattern:?})"),
        ),
        Err(err) if err.is_cancelled() => Err(err),
        Err(err) => {
            let message = err.message();
            if re.is_match(&message) {
                Ok(Value::None)
            } else {
                fail(
                    thread,
                    format!("regular expression ({pattern}) did not match error ({message})"),
                )
            }
        }
    }
}
