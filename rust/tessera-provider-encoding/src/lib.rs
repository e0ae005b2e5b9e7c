//! Encoding and compression capability modules for tessera applets.
//!
//! - `encoding/json.star`: `json.encode`, `json.decode`, `json.indent`
//! - `encoding/base64.star`: `base64.encode`, `base64.decode`
//! - `encoding/csv.star`: `csv.read_all`, `csv.write_all`
//! - `compress/gzip.star`: `gzip.compress`, `gzip.decompress`
//! - `compress/zipfile.star`: `zipfile.ZipFile`

pub mod base64;
pub mod csv;
pub mod gzip;
pub mod json;
pub mod zipfile;

use tessera_core::{ArgParser, EvalError, Value};

pub(crate) fn bytes_arg(p: &mut ArgParser, function: &str, param: &str) -> Result<Vec<u8>, EvalError> {
    match p.required::<Value>(param)? {
        Value::String(s) => Ok(s.into_bytes()),
        Value::Bytes(b) => Ok(b),
        other => Err(EvalError::msg(format!(
            "{function}: for parameter {param}: got {}, want string or bytes",
            other.type_name()
        ))),
    }
}

/// A single-byte separator such as a CSV delimiter.
pub(crate) fn single_byte(function: &str, param: &str, value: &str) -> Result<u8, EvalError> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(EvalError::msg(format!(
            "{function}: {param} must be a single ASCII character, got {value:?}"
        ))),
    }
}
