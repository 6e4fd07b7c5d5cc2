use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use tracing::info;

use crate::core_api::CoreError;
use crate::registry::RenameRegistry;
use crate::store::DocumentStore;

pub const AUDIT_CATEGORY: &str = "changed";

/// File name without the `.json` extension, or `None` if the path does not
/// name a json document.
pub fn document_name(path: &Path) -> Option<&str> {
    let extension = path.extension()?.to_str()?;
    if !extension.eq_ignore_ascii_case("json") {
        return None;
    }
    path.file_stem()?.to_str().filter(|stem| !stem.is_empty())
}

/// Writes pre-mutation snapshots to `<root>/<run>/<category>/<name>.json`.
///
/// The run directory and every backup path are unique: an existing run
/// directory or a name already used in this run gets a `-N` suffix.
#[derive(Debug)]
pub struct BackupManager {
    run_dir: PathBuf,
    written: HashSet<PathBuf>,
}

impl BackupManager {
    pub fn start(root: &Path, run_timestamp: &str, store: &dyn DocumentStore) -> Self {
        let mut run_dir = root.join(run_timestamp);
        let mut n = 1;
        while store.exists(&run_dir) {
            run_dir = root.join(format!("{run_timestamp}-{n}"));
            n += 1;
        }
        Self {
            run_dir,
            written: HashSet::new(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn backup(
        &mut self,
        store: &mut dyn DocumentStore,
        category: &str,
        name: &str,
        document: &JsonValue,
    ) -> Result<PathBuf, CoreError> {
        let path = self.claim(category, name);
        store.save(&path, document)?;
        info!(path = %path.display(), "backup generated for {category}/{name}");
        Ok(path)
    }

    /// Persists the `[old, new]` pairs of `registry` for manual rollback.
    pub fn write_audit(
        &mut self,
        store: &mut dyn DocumentStore,
        registry: &RenameRegistry,
    ) -> Result<PathBuf, CoreError> {
        let pairs = registry
            .pairs()
            .map(|(old, new)| JsonValue::from(vec![old, new]))
            .collect::<Vec<_>>();
        let path = self.claim(AUDIT_CATEGORY, registry.namespace().as_str());
        store.save(&path, &JsonValue::Array(pairs))?;
        info!(
            path = %path.display(),
            renames = registry.len(),
            "rename audit written for {} ids",
            registry.namespace()
        );
        Ok(path)
    }

    fn claim(&mut self, category: &str, name: &str) -> PathBuf {
        let dir = self.run_dir.join(category);
        let mut path = dir.join(format!("{name}.json"));
        let mut n = 1;
        while self.written.contains(&path) {
            path = dir.join(format!("{name}-{n}.json"));
            n += 1;
        }
        self.written.insert(path.clone());
        path
    }
}
