use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreErrorCode {
    FileNotFound,
    Parse,
    UnresolvedReference,
    PersistenceFailure,
    InternalConsistency,
    Config,
}

impl CoreErrorCode {
    /// Fatal errors abort the whole run; the rest are reported and the run goes on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailure | Self::InternalConsistency | Self::Config
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}{}", context_suffix(.file, .id, .field))]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
    pub file: Option<PathBuf>,
    pub id: Option<String>,
    pub field: Option<String>,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: None,
            id: None,
            field: None,
        }
    }

    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn unresolved(id: &str, message: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::UnresolvedReference, message).with_id(id)
    }

    pub fn persistence(path: &Path, message: impl std::fmt::Display) -> Self {
        Self::new(
            CoreErrorCode::PersistenceFailure,
            format!("failed to write {}: {message}", path.display()),
        )
        .with_file(path)
    }
}

fn context_suffix(file: &Option<PathBuf>, id: &Option<String>, field: &Option<String>) -> String {
    let mut parts = Vec::new();
    if let Some(file) = file {
        parts.push(format!("file={}", file.display()));
    }
    if let Some(id) = id {
        parts.push(format!("id={id}"));
    }
    if let Some(field) = field {
        parts.push(format!("field={field}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreError, CoreErrorCode};

    #[test]
    fn display_includes_context() {
        let err = CoreError::new(CoreErrorCode::UnresolvedReference, "no mapping")
            .with_file("db/locales/en.json")
            .with_id("cond1")
            .with_field("cond1");
        assert_eq!(
            err.to_string(),
            "UnresolvedReference: no mapping (file=db/locales/en.json, id=cond1, field=cond1)"
        );
    }

    #[test]
    fn display_without_context_matches_code_and_message() {
        let err = CoreError::new(CoreErrorCode::Parse, "bad json");
        assert_eq!(err.to_string(), "Parse: bad json");
        assert!(!err.code.is_fatal());
        assert!(CoreErrorCode::PersistenceFailure.is_fatal());
    }
}
