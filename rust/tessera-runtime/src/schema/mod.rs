//! Applet configuration schema.
//!
//! The schema constructor (`get_schema`) returns a `schema.Schema` value built
//! with the constructors of `schema.star`. It is parsed once at load time into
//! a [`Schema`]: the ordered field list that is serialized for configuration
//! UIs, and the handler table that [`crate::Applet::call_schema_handler`]
//! dispatches on.

pub mod module;
pub mod options;

use crate::error::SchemaError;
use module::{FieldValue, HandlerValue, SchemaValue};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};
use tessera_core::{Bindings, Function, Value};

pub use options::{encode_options, SchemaOption};

/// Name of the function that defines an applet's schema.
pub const SCHEMA_FUNCTION_NAME: &str = "get_schema";

/// The only schema version understood by the host.
pub const SCHEMA_VERSION: &str = "1";

/// What a handler's return value is encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ReturnKind {
    /// A list of `schema.Option`.
    Options = 0,
    /// A nested schema.
    Schema = 1,
    /// A string.
    String = 2,
}

impl ReturnKind {
    /// Value of the matching `schema.HandlerType` member.
    pub fn from_i64(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(ReturnKind::Options),
            1 => Some(ReturnKind::Schema),
            2 => Some(ReturnKind::String),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone)]
pub struct HandlerRegistration {
    pub function: Function,
    pub kind: ReturnKind,
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldKind {
    Toggle,
    Text,
    Dropdown,
    Color,
    DateTime,
    Location,
    LocationBased,
    Typeahead,
    Generated,
    OAuth2,
    #[serde(rename = "png")]
    #[strum(serialize = "png")]
    PhotoSelect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SchemaOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub palette: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub handler: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub authorization_endpoint: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Field {
    pub fn new(kind: FieldKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: String::new(),
            description: String::new(),
            icon: String::new(),
            default: None,
            options: Vec::new(),
            palette: Vec::new(),
            source: String::new(),
            handler: String::new(),
            client_id: String::new(),
            authorization_endpoint: String::new(),
            scopes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub version: String,
    #[serde(rename = "schema")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub handlers: BTreeMap<String, HandlerRegistration>,
}

impl Schema {
    /// Parse the return value of the schema constructor. `globals` are the
    /// exports of the file that defines it; every handler must be one of
    /// them.
    pub fn from_value(value: &Value, globals: &Bindings) -> Result<Schema, SchemaError> {
        match value.downcast_ref::<SchemaValue>() {
            Some(schema) => Self::build(&schema.version, &schema.fields, &schema.handlers, globals),
            None => Err(SchemaError::Invalid(format!(
                "expected schema.Schema but found {}",
                value.type_name()
            ))),
        }
    }

    /// Parse the result of a nested-schema handler, which may also be a
    /// plain list of fields.
    pub fn from_handler_result(value: &Value, globals: &Bindings) -> Result<Schema, SchemaError> {
        if value.downcast_ref::<SchemaValue>().is_some() {
            return Self::from_value(value, globals);
        }
        let items = value.as_sequence().ok_or_else(|| {
            SchemaError::Invalid(format!(
                "expected schema.Schema or a list of fields but found {}",
                value.type_name()
            ))
        })?;
        let fields = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.downcast_ref::<FieldValue>().cloned().ok_or_else(|| {
                    SchemaError::Invalid(format!(
                        "expected schema field but found {} (at index {index})",
                        item.type_name()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(SCHEMA_VERSION, &fields, &[], globals)
    }

    fn build(
        version: &str,
        fields: &[FieldValue],
        handlers: &[HandlerValue],
        globals: &Bindings,
    ) -> Result<Schema, SchemaError> {
        if version != SCHEMA_VERSION {
            return Err(SchemaError::Invalid(format!(
                "only schema version {SCHEMA_VERSION} is supported, not: {version}"
            )));
        }
        let mut schema = Schema {
            version: version.to_string(),
            fields: Vec::with_capacity(fields.len()),
            handlers: BTreeMap::new(),
        };
        let mut ids = BTreeSet::new();
        for value in fields {
            if !ids.insert(value.field.id.clone()) {
                return Err(SchemaError::Invalid(format!(
                    "duplicate field id {:?}",
                    value.field.id
                )));
            }
            if let Some(handler) = &value.handler {
                schema.register(handler, globals)?;
            }
            schema.fields.push(value.field.clone());
        }
        for handler in handlers {
            schema.register(handler, globals)?;
        }
        Ok(schema)
    }

    fn register(&mut self, handler: &HandlerValue, globals: &Bindings) -> Result<(), SchemaError> {
        let name = handler.function.name().to_string();
        let exported = matches!(
            globals.get(&name),
            Some(Value::Function(f)) if f.ptr_eq(&handler.function)
        );
        if !exported {
            return Err(SchemaError::Invalid(format!(
                "handler {name:?} is not a top-level function of the schema file"
            )));
        }
        if let Some(existing) = self.handlers.get(&name) {
            if existing.kind != handler.kind {
                return Err(SchemaError::Invalid(format!(
                    "handler {name:?} registered as both {} and {}",
                    existing.kind, handler.kind
                )));
            }
            return Ok(());
        }
        self.handlers.insert(
            name,
            HandlerRegistration {
                function: handler.function.clone(),
                kind: handler.kind,
            },
        );
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerRegistration> {
        self.handlers.get(name)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(self)?)
    }
}
