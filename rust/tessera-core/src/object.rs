//! Opaque host values.

use crate::render::Rootable;
use crate::value::Value;
use std::any::Any;
use std::fmt;

/// A value implemented by the host rather than the interpreter: render
/// widgets, schema fields, time values, HTTP responses and so on.
pub trait Object: Send + Sync + fmt::Debug + 'static {
    /// Type name reported in diagnostics, e.g. `"render.Text"`.
    fn type_name(&self) -> &str;

    /// `value.name` lookup. Methods are returned as bound functions.
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn attr_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn truth(&self) -> bool {
        true
    }

    /// The render-root capability, if the value has it.
    fn as_rootable(&self) -> Option<&dyn Rootable> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
