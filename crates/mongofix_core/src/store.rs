use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::core_api::{CoreError, CoreErrorCode};

/// Where documents are read from and written back to.
pub trait DocumentStore {
    fn exists(&self, path: &Path) -> bool;

    /// Fails with `FileNotFound` when the path cannot be read and `Parse`
    /// when the content is not JSON.
    fn load(&mut self, path: &Path) -> Result<JsonValue, CoreError>;

    /// Creates missing parent directories. Any failure is a `PersistenceFailure`.
    fn save(&mut self, path: &Path, value: &JsonValue) -> Result<(), CoreError>;
}

/// Tab indented pretty JSON with a trailing newline.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    // serde_json only emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentStore for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn load(&mut self, path: &Path) -> Result<JsonValue, CoreError> {
        let text = fs::read_to_string(path).map_err(|e| {
            let message = match e.kind() {
                io::ErrorKind::NotFound => format!("file not found: {}", path.display()),
                _ => format!("failed to read {}: {e}", path.display()),
            };
            CoreError::new(CoreErrorCode::FileNotFound, message).with_file(path)
        })?;
        serde_json::from_str(&text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("failed to parse {}: {e}", path.display()),
            )
            .with_file(path)
        })
    }

    fn save(&mut self, path: &Path, value: &JsonValue) -> Result<(), CoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| CoreError::persistence(path, e))?;
        }
        let rendered = to_pretty_json(value).map_err(|e| CoreError::persistence(path, e))?;
        fs::write(path, rendered).map_err(|e| CoreError::persistence(path, e))
    }
}

/// In-memory store, mostly for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: BTreeMap<PathBuf, JsonValue>,
    read_only_prefix: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, value: JsonValue) {
        self.documents.insert(path.into(), value);
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&JsonValue> {
        self.documents.get(path.as_ref())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.documents.keys().map(PathBuf::as_path)
    }

    /// Every save under `prefix` fails from now on.
    pub fn reject_writes_under(&mut self, prefix: impl Into<PathBuf>) {
        self.read_only_prefix = Some(prefix.into());
    }
}

impl DocumentStore for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.documents.keys().any(|p| p.starts_with(path))
    }

    fn load(&mut self, path: &Path) -> Result<JsonValue, CoreError> {
        self.documents.get(path).cloned().ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::FileNotFound,
                format!("file not found: {}", path.display()),
            )
            .with_file(path)
        })
    }

    fn save(&mut self, path: &Path, value: &JsonValue) -> Result<(), CoreError> {
        if let Some(prefix) = &self.read_only_prefix
            && path.starts_with(prefix)
        {
            return Err(CoreError::persistence(path, "store is read-only here"));
        }
        self.documents.insert(path.to_path_buf(), value.clone());
        Ok(())
    }
}
