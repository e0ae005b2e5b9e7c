//! `secret.star`: decryption of secrets embedded in applet source.
//!
//! The host supplies the actual decryption through [`SecretDecrypter`]; this
//! module only exposes it to scripts. `decrypt` yields `None` when no
//! decrypter is attached or decryption fails, so applets can fall back to a
//! development value.

use std::sync::Arc;
use tessera_core::{Arguments, Bindings, EvalError, ModuleBuilder, Thread, Value};

pub trait SecretDecrypter: Send + Sync {
    /// Decrypt `ciphertext` on behalf of applet `applet_id`.
    fn decrypt(&self, applet_id: &str, ciphertext: &str) -> Option<String>;
}

/// Decrypter attached to an execution context.
#[derive(Clone)]
pub struct SecretBinding(pub Arc<dyn SecretDecrypter>);

pub fn load_module() -> Bindings {
    ModuleBuilder::new("secret")
        .function("decrypt", decrypt)
        .build()
}

fn decrypt(thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("secret.decrypt");
    let value: String = p.required("value")?;
    p.finish()?;
    let Some(SecretBinding(decrypter)) = thread.local::<SecretBinding>() else {
        return Ok(Value::None);
    };
    Ok(decrypter.decrypt(thread.name(), &value).into())
}
