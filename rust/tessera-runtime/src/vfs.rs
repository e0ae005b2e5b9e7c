//! Read-only virtual file sets that applets are loaded from.
//!
//! Paths are slash-separated and relative to the applet root. Only files
//! directly at the root are discovered automatically; anything deeper is
//! reached through an explicit `load`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Extension of script source units.
pub const SCRIPT_EXTENSION: &str = ".star";

pub trait FileSet {
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    fn is_file(&self, path: &str) -> bool;

    /// Names of regular files directly at the root, sorted.
    fn root_entries(&self) -> io::Result<Vec<String>>;
}

/// Lexically clean a relative path: collapse separators, drop `.` segments
/// and resolve `..` against preceding segments.
///
/// ```
/// use tessera_runtime::vfs::normalize;
/// assert_eq!(normalize("./a//b/../c.star"), "a/c.star");
/// ```
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

pub fn is_script(path: &str) -> bool {
    path.ends_with(SCRIPT_EXTENSION)
}

// ---------------------------------------------------------------------------
// MemoryFs
// ---------------------------------------------------------------------------

/// An in-memory file set.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(normalize(path), contents.into());
    }
}

impl FileSet for MemoryFs {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("open {path}: file does not exist"))
        })
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn root_entries(&self) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|path| !path.contains('/'))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// DirFs
// ---------------------------------------------------------------------------

/// A directory on disk.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let clean = normalize(path);
        let relative = Path::new(&clean);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("open {path}: path escapes applet root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl FileSet for DirFs {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn root_entries(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
