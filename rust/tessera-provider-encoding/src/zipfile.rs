//! `compress/zipfile.star`: read-only access to zip archives,
//! `zipfile.ZipFile(data).open(name).read()`.

use std::io::{Cursor, Read};
use std::sync::Arc;
use tessera_core::{Bindings, EvalError, Function, ModuleBuilder, Object, Value};
use zip::ZipArchive;

/// An archive held in memory. Each call reopens the central directory, so
/// the value itself stays `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct ZipFile {
    data: Arc<Vec<u8>>,
}

impl ZipFile {
    pub fn new(data: Vec<u8>) -> Result<Self, EvalError> {
        let zip = ZipFile {
            data: Arc::new(data),
        };
        zip.archive()?;
        Ok(zip)
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>, EvalError> {
        ZipArchive::new(Cursor::new(self.data.as_slice()))
            .map_err(|e| EvalError::msg(format!("zipfile.ZipFile: {e}")))
    }

    /// Entry names in central-directory order.
    pub fn names(&self) -> Result<Vec<String>, EvalError> {
        let mut archive = self.archive()?;
        (0..archive.len())
            .map(|i| {
                archive
                    .by_index(i)
                    .map(|entry| entry.name().to_string())
                    .map_err(|e| EvalError::msg(format!("zipfile.namelist: {e}")))
            })
            .collect()
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, EvalError> {
        let mut archive = self.archive()?;
        let mut entry = archive
            .by_name(name)
            .map_err(|e| EvalError::msg(format!("zipfile.open: {name}: {e}")))?;
        let mut out = Vec::new();
        entry
            .read_to_end(&mut out)
            .map_err(|e| EvalError::msg(format!("zipfile.read: {name}: {e}")))?;
        Ok(out)
    }
}

/// Text when the entry is UTF-8, bytes otherwise.
fn contents(data: Vec<u8>) -> Value {
    match String::from_utf8(data) {
        Ok(text) => Value::String(text),
        Err(err) => Value::Bytes(err.into_bytes()),
    }
}

impl Object for ZipFile {
    fn type_name(&self) -> &str {
        "zipfile.ZipFile"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let zip = self.clone();
        let function = match name {
            "namelist" => Function::native("zipfile.ZipFile.namelist", move |_thread, args| {
                args.parser("zipfile.ZipFile.namelist").finish()?;
                Ok(Value::List(
                    zip.names()?.into_iter().map(Value::String).collect(),
                ))
            }),
            "read" => Function::native("zipfile.ZipFile.read", move |_thread, args| {
                let mut p = args.parser("zipfile.ZipFile.read");
                let name: String = p.required("name")?;
                p.finish()?;
                zip.read(&name).map(contents)
            }),
            "open" => Function::native("zipfile.ZipFile.open", move |_thread, args| {
                let mut p = args.parser("zipfile.ZipFile.open");
                let name: String = p.required("name")?;
                p.finish()?;
                if !zip.names()?.contains(&name) {
                    return Err(EvalError::msg(format!(
                        "zipfile.open: {name}: file not found in archive"
                    )));
                }
                Ok(Value::object(ZipEntry {
                    zip: zip.clone(),
                    name,
                }))
            }),
            _ => return None,
        };
        Some(Value::Function(function))
    }

    fn attr_names(&self) -> Vec<String> {
        ["namelist", "open", "read"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// One named member of an archive, as returned by `ZipFile.open`.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    zip: ZipFile,
    name: String,
}

impl Object for ZipEntry {
    fn type_name(&self) -> &str {
        "zipfile.ZipExtFile"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "read" => {
                let entry = self.clone();
                Some(Value::Function(Function::native(
                    "zipfile.ZipExtFile.read",
                    move |_thread, args| {
                        args.parser("zipfile.ZipExtFile.read").finish()?;
                        entry.zip.read(&entry.name).map(contents)
                    },
                )))
            }
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["name".into(), "read".into()]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("zipfile")
        .function("ZipFile", |_thread, args| {
            let mut p = args.parser("zipfile.ZipFile");
            let data = crate::bytes_arg(&mut p, "zipfile.ZipFile", "data")?;
            p.finish()?;
            ZipFile::new(data).map(Value::object)
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn lists_entries_in_archive_order() {
        let zip = ZipFile::new(archive(&[("b.txt", b"b"), ("a/c.json", b"{}")])).unwrap();
        assert_eq!(zip.names().unwrap(), vec!["b.txt", "a/c.json"]);
    }

    #[test]
    fn binary_entries_stay_bytes() {
        assert_eq!(contents(b"text".to_vec()), Value::from("text"));
        assert_eq!(contents(vec![0xff, 0x00]), Value::Bytes(vec![0xff, 0x00]));
    }

    #[test]
    fn garbage_is_rejected_up_front() {
        let err = ZipFile::new(b"not a zip".to_vec()).unwrap_err();
        assert!(err.to_string().starts_with("zipfile.ZipFile:"));
    }

    #[test]
    fn missing_entry_is_an_error() {
        let zip = ZipFile::new(archive(&[("a.txt", b"a")])).unwrap();
        assert!(zip.read("b.txt").is_err());
    }
}
