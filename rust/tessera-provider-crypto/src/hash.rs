//! `hash.star`

use crate::{bytes_arg, Algorithm};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tessera_core::{Bindings, ModuleBuilder, Value};

pub fn digest_hex(algorithm: Algorithm, data: &[u8]) -> String {
    match algorithm {
        Algorithm::Md5 => hex::encode(Md5::digest(data)),
        Algorithm::Sha1 => hex::encode(Sha1::digest(data)),
        Algorithm::Sha256 => hex::encode(Sha256::digest(data)),
        Algorithm::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

pub fn load_module() -> Bindings {
    let mut module = ModuleBuilder::new("hash");
    for algorithm in Algorithm::ALL {
        let function = format!("hash.{}", algorithm.name());
        module = module.function(algorithm.name(), move |_thread, args| {
            let mut p = args.parser(&function);
            let data = bytes_arg(&mut p, &function, "s")?;
            p.finish()?;
            Ok(Value::String(digest_hex(algorithm, &data)))
        });
    }
    module.build()
}
