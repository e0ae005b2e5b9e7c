//! Cryptographic capability modules for tessera applets.
//!
//! - `hash.star`: `hash.md5`, `hash.sha1`, `hash.sha256`, `hash.sha512`
//! - `hmac.star`: `hmac.md5`, `hmac.sha1`, `hmac.sha256`, `hmac.sha512`
//!
//! Inputs are strings or bytes; every digest is returned as a lowercase hex
//! string.

pub mod hash;
pub mod hmac;

use tessera_core::{ArgParser, EvalError, Value};

/// Digest algorithms shared by both modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }
}

/// Accept a string or bytes argument as raw bytes.
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
