//! `hmac.star`: keyed digests, `hmac.sha256(key, s)`.

use crate::{bytes_arg, Algorithm};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

fn mac_hex<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8]) -> Result<String, EvalError> {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key)
        .map_err(|e| EvalError::msg(format!("invalid hmac key: {e}")))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn hmac_hex(algorithm: Algorithm, key: &[u8], data: &[u8]) -> Result<String, EvalError> {
    match algorithm {
        Algorithm::Md5 => mac_hex::<Hmac<Md5>>(key, data),
        Algorithm::Sha1 => mac_hex::<Hmac<Sha1>>(key, data),
        Algorithm::Sha256 => mac_hex::<Hmac<Sha256>>(key, data),
        Algorithm::Sha512 => mac_hex::<Hmac<Sha512>>(key, data),
    }
}

pub fn load_module() -> Bindings {
    let mut module = ModuleBuilder::new("hmac");
    for algorithm in Algorithm::ALL {
        let function = format!("hmac.{}", algorithm.name());
        module = module.function(algorithm.name(), move |_thread, args| {
            let mut p = args.parser(&function);
            let key = bytes_arg(&mut p, &function, "key")?;
            let data = bytes_arg(&mut p, &function, "s")?;
            p.finish()?;
            hmac_hex(algorithm, &key, &data).map(Value::String)
        });
    }
    module.build()
}
