//! Script values as seen by the host.
//!
//! The interpreter owns its internal representation; everything crossing the
//! boundary (exports, call arguments, return values) is a [`Value`].

use crate::error::EvalError;
use crate::function::{Arguments, Function};
use crate::object::Object;
use crate::thread::Thread;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Exported name → value mapping of a source unit or capability module.
pub type Bindings = BTreeMap<String, Value>;

/// String-keyed dictionary. Keys are kept sorted so that anything derived
/// from a dictionary (JSON, listings) is deterministic.
pub type Dict = BTreeMap<String, Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Dict),
    Struct(Struct),
    Function(Function),
    Object(Arc<dyn Object>),
}

impl Value {
    pub fn object(obj: impl Object) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Name of the value's type, as reported in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::String(_) => "string".into(),
            Value::Bytes(_) => "bytes".into(),
            Value::List(_) => "list".into(),
            Value::Tuple(_) => "tuple".into(),
            Value::Dict(_) => "dict".into(),
            Value::Struct(s) => s.type_name().into(),
            Value::Function(f) => {
                if f.position().is_builtin() {
                    "builtin_function_or_method".into()
                } else {
                    "function".into()
                }
            }
            Value::Object(obj) => obj.type_name().to_string(),
        }
    }

    /// Truthiness, following the usual scripting conventions.
    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Struct(_) | Value::Function(_) => true,
            Value::Object(obj) => obj.truth(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// String-like view of the value, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Elements of a list or tuple.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast an opaque host value to its concrete type.
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Attribute lookup (`value.name`) on structs, modules and host objects.
    pub fn attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::Struct(s) => s.get(name).cloned(),
            Value::Object(obj) => obj.attr(name),
            _ => None,
        }
    }

    /// Attribute lookup that fails with the conventional message.
    pub fn get_attr(&self, name: &str) -> Result<Value, EvalError> {
        self.attr(name).ok_or_else(|| {
            EvalError::msg(format!("{} has no .{} field or method", self.type_name(), name))
        })
    }

    /// Call the value if it is a function.
    pub fn call(&self, thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
        match self {
            Value::Function(f) => f.call(thread, args),
            other => Err(EvalError::msg(format!(
                "invalid call of non-function ({})",
                other.type_name()
            ))),
        }
    }

    /// Quoted, unambiguous rendering (strings are quoted).
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            Value::Bytes(b) => format!("b{:?}", String::from_utf8_lossy(b)),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::List(items) => write!(f, "[{}]", join_repr(items)),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => write!(f, "({})", join_repr(items)),
            Value::Dict(d) => {
                let entries: Vec<String> = d
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v.repr()))
                    .collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
            Value::Struct(s) => write!(f, "{s}"),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Value::Struct(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::None)
    }
}

// ---------------------------------------------------------------------------
// Struct
// ---------------------------------------------------------------------------

/// A record of named fields. Capability modules are structs whose
/// constructor is `"module"`, so `load("hash.star", "hash")` yields a
/// namespace whose members are reached with attribute lookup.
#[derive(Clone, PartialEq, Debug)]
pub struct Struct {
    constructor: String,
    fields: BTreeMap<String, Value>,
}

impl Struct {
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Self {
            constructor: "struct".to_string(),
            fields,
        }
    }

    /// A module namespace named `name`.
    pub fn module(name: impl Into<String>, members: BTreeMap<String, Value>) -> Self {
        let name = name.into();
        Self {
            constructor: format!("module:{name}"),
            fields: members,
        }
    }

    pub fn type_name(&self) -> &str {
        if self.constructor.starts_with("module:") {
            "module"
        } else {
            "struct"
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.constructor.strip_prefix("module:") {
            return write!(f, "<module \"{name}\">");
        }
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v.repr()))
            .collect();
        write!(f, "struct({})", fields.join(", "))
    }
}

/// Build a module binding map of the shape every capability loader returns:
/// a single name bound to the module namespace.
pub fn module_bindings(name: &str, members: BTreeMap<String, Value>) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert(name.to_string(), Value::Struct(Struct::module(name, members)));
    bindings
}
