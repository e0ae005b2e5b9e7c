//! `compress/gzip.star`

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("gzip")
        .function("compress", |_thread, args| {
            let mut p = args.parser("gzip.compress");
            let data = crate::bytes_arg(&mut p, "gzip.compress", "data")?;
            p.finish()?;
            compress(&data)
                .map(Value::Bytes)
                .map_err(|e| EvalError::msg(format!("gzip.compress: {e}")))
        })
        .function("decompress", |_thread, args| {
            let mut p = args.parser("gzip.decompress");
            let data = crate::bytes_arg(&mut p, "gzip.decompress", "data")?;
            p.finish()?;
            decompress(&data)
                .map(Value::Bytes)
                .map_err(|e| EvalError::msg(format!("gzip.decompress: {e}")))
        })
        .build()
}
