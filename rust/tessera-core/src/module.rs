//! Builder for capability module namespaces.

use crate::error::EvalError;
use crate::function::{Arguments, Function};
use crate::thread::Thread;
use crate::value::{module_bindings, Bindings, Struct, Value};
use std::collections::BTreeMap;

/// Collects the members of a module namespace.
///
/// Functions are registered under their bare name and report the qualified
/// `module.name` in diagnostics:
///
/// ```
/// use tessera_core::{ModuleBuilder, Value};
///
/// let bindings = ModuleBuilder::new("math")
///     .value("pi", std::f64::consts::PI)
///     .function("zero", |_thread, _args| Ok(Value::Int(0)))
///     .build();
/// let math = &bindings["math"];
/// assert_eq!(math.attr("zero").unwrap().to_string(), "<function math.zero>");
/// ```
pub struct ModuleBuilder {
    name: String,
    members: BTreeMap<String, Value>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    pub fn function<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&mut Thread, Arguments) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let qualified = format!("{}.{}", self.name, name);
        self.members
            .insert(name.to_string(), Value::Function(Function::native(qualified, body)));
        self
    }

    pub fn value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.members.insert(name.to_string(), value.into());
        self
    }

    /// The namespace as a module struct value.
    pub fn into_struct(self) -> Struct {
        Struct::module(self.name, self.members)
    }

    /// `{name: module}` bindings as returned by a module loader.
    pub fn build(self) -> Bindings {
        module_bindings(&self.name, self.members)
    }
}
