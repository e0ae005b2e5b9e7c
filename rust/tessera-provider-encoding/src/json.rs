//! `encoding/json.star`
//!
//! Conversion between script values and JSON. Dicts and structs encode as
//! objects (keys in sorted order), lists and tuples as arrays. Decoding
//! yields ints for integral numbers that fit in 64 bits and floats otherwise.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

pub fn to_json(value: &Value) -> Result<serde_json::Value, EvalError> {
    Ok(match value {
        Value::None => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| EvalError::msg(format!("json.encode: cannot encode non-finite float {x}")))?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) | Value::Tuple(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Value::Dict(entries) => object(entries)?,
        Value::Struct(s) => object(s.fields())?,
        other => {
            return Err(EvalError::msg(format!(
                "json.encode: cannot encode {}",
                other.type_name()
            )))
        }
    })
}

fn object(entries: &BTreeMap<String, Value>) -> Result<serde_json::Value, EvalError> {
    let mut map = serde_json::Map::new();
    for (key, value) in entries {
        map.insert(key.clone(), to_json(value)?);
    }
    Ok(serde_json::Value::Object(map))
}

pub fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Dict(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

/// Re-indent a JSON document. Every line after the first starts with
/// `prefix`, followed by one `indent` per nesting level.
pub fn indent(src: &str, prefix: &str, indent: &str) -> Result<String, EvalError> {
    let parsed: serde_json::Value =
        serde_json::from_str(src).map_err(|e| EvalError::msg(format!("json.indent: {e}")))?;
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(
        &mut out,
        PrettyFormatter::with_indent(indent.as_bytes()),
    );
    parsed
        .serialize(&mut ser)
        .map_err(|e| EvalError::msg(format!("json.indent: {e}")))?;
    let pretty = String::from_utf8_lossy(&out).into_owned();
    if prefix.is_empty() {
        return Ok(pretty);
    }
    Ok(pretty.replace('\n', &format!("\n{prefix}")))
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("json")
        .function("encode", |_thread, args| {
            let mut p = args.parser("json.encode");
            let value: Value = p.required("x")?;
            p.finish()?;
            let json = to_json(&value)?;
            Ok(Value::String(json.to_string()))
        })
        .function("decode", |_thread, args| {
            let mut p = args.parser("json.decode");
            let src: String = p.required("x")?;
            p.finish()?;
            let parsed: serde_json::Value = serde_json::from_str(&src)
                .map_err(|e| EvalError::msg(format!("json.decode: {e}")))?;
            Ok(from_json(parsed))
        })
        .function("indent", |_thread, args| {
            let mut p = args.parser("json.indent");
            let src: String = p.required("str")?;
            let prefix: String = p.or_default("prefix", String::new())?;
            let step: String = p.or_default("indent", "\t".to_string())?;
            p.finish()?;
            indent(&src, &prefix, &step).map(Value::String)
        })
        .build()
}
