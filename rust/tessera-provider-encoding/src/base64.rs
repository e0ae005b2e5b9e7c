//! `encoding/base64.star`
//!
//! `base64.encode(s, encoding="standard")` and `base64.decode(s,
//! encoding="standard")`. Encodings: `standard`, `standard_raw`, `url`,
//! `url_raw` (the raw variants omit padding).

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::engine::GeneralPurpose;
use base64::Engine;
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

fn engine(function: &str, encoding: &str) -> Result<&'static GeneralPurpose, EvalError> {
    match encoding {
        "standard" => Ok(&STANDARD),
        "standard_raw" => Ok(&STANDARD_NO_PAD),
        "url" => Ok(&URL_SAFE),
        "url_raw" => Ok(&URL_SAFE_NO_PAD),
        other => Err(EvalError::msg(format!(
            "{function}: unsupported encoding {other:?}"
        ))),
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("base64")
        .function("encode", |_thread, args| {
            let mut p = args.parser("base64.encode");
            let data = crate::bytes_arg(&mut p, "base64.encode", "s")?;
            let encoding: String = p.or_default("encoding", "standard".to_string())?;
            p.finish()?;
            Ok(Value::String(engine("base64.encode", &encoding)?.encode(data)))
        })
        .function("decode", |_thread, args| {
            let mut p = args.parser("base64.decode");
            let src: String = p.required("s")?;
            let encoding: String = p.or_default("encoding", "standard".to_string())?;
            p.finish()?;
            let decoded = engine("base64.decode", &encoding)?
                .decode(src.trim())
                .map_err(|e| EvalError::msg(format!("base64.decode: {e}")))?;
            Ok(match String::from_utf8(decoded) {
                Ok(text) => Value::String(text),
                Err(raw) => Value::Bytes(raw.into_bytes()),
            })
        })
        .build()
}
