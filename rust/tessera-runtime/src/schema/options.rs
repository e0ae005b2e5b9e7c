//! Selectable options and their JSON encoding.

use crate::error::SchemaError;
use serde::Serialize;
use tessera_core::{Object, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaOption {
    pub display: String,
    pub value: String,
}

/// `schema.Option` as seen by scripts.
#[derive(Debug, Clone)]
pub struct OptionValue(pub SchemaOption);

impl Object for OptionValue {
    fn type_name(&self) -> &str {
        "schema.Option"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "display" => Some(self.0.display.as_str().into()),
            "value" => Some(self.0.value.as_str().into()),
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["display".to_string(), "value".to_string()]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Convert a sequence of `schema.Option` values.
pub fn options_from_value(value: &Value) -> Result<Vec<SchemaOption>, SchemaError> {
    let items = value.as_sequence().ok_or_else(|| {
        SchemaError::Options(format!(
            "expected a list of schema.Option but found {}",
            value.type_name()
        ))
    })?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.downcast_ref::<OptionValue>()
                .map(|option| option.0.clone())
                .ok_or_else(|| {
                    SchemaError::Options(format!(
                        "expected schema.Option but found {} (at index {index})",
                        item.type_name()
                    ))
                })
        })
        .collect()
}

/// JSON encoding of an option-list handler result:
/// `[{"display": ..., "value": ...}, ...]`.
pub fn encode_options(value: &Value) -> Result<String, SchemaError> {
    let options = options_from_value(value)?;
    Ok(serde_json::to_string(&options)?)
}
