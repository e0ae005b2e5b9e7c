//! Markup querying capability modules for tessera applets.
//!
//! - `html.star`: `html(body)` returns a selection over the parsed document
//!   with `find`, `filter`, `children`, `parent`, `first`, `last`, `eq`,
//!   `len`, `text`, `attr` and `html`
//! - `xpath.star`: `xpath.loads(xml)` returns a document with `query` and
//!   `query_all`

pub mod html;
pub mod xpath;

use tessera_core::{ArgParser, EvalError, Value};

pub(crate) fn text_arg(p: &mut ArgParser, function: &str, param: &str) -> Result<String, EvalError> {
    match p.required::<Value>(param)? {
        Value::String(s) => Ok(s),
        Value::Bytes(b) => String::from_utf8(b)
            .map_err(|_| EvalError::msg(format!("{function}: {param} is not valid UTF-8"))),
        other => Err(EvalError::msg(format!(
            "{function}: for parameter {param}: got {}, want string or bytes",
            other.type_name()
        ))),
    }
}
