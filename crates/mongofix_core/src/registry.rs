use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::ids::IdSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Trader,
    Catalog,
    Quest,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Self::Trader, Self::Catalog, Self::Quest];

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Trader => "trader",
            Self::Catalog => "catalog",
            Self::Quest => "quest",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bijective old id -> new id table for one namespace.
#[derive(Debug, Clone)]
pub struct RenameRegistry {
    namespace: Namespace,
    forward: IndexMap<String, String>,
    reverse: HashMap<String, String>,
}

impl RenameRegistry {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            forward: IndexMap::new(),
            reverse: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn record_rename(&mut self, old: &str, new: &str) -> Result<(), CoreError> {
        if let Some(existing) = self.forward.get(old) {
            if existing == new {
                return Ok(());
            }
            return Err(CoreError::new(
                CoreErrorCode::InternalConsistency,
                format!(
                    "{} registry already maps {old} to {existing}, refusing {new}",
                    self.namespace
                ),
            )
            .with_id(old));
        }
        if let Some(previous_old) = self.reverse.get(new) {
            return Err(CoreError::new(
                CoreErrorCode::InternalConsistency,
                format!(
                    "{} registry already assigned {new} to {previous_old}, refusing it for {old}",
                    self.namespace
                ),
            )
            .with_id(old));
        }

        debug!(namespace = %self.namespace, old, new, "recorded rename");
        self.forward.insert(old.to_string(), new.to_string());
        self.reverse.insert(new.to_string(), old.to_string());
        Ok(())
    }

    /// Returns the id `old` was already renamed to, or allocates and records a fresh one.
    pub fn rename_with(&mut self, old: &str, ids: &mut dyn IdSource) -> Result<String, CoreError> {
        if let Some(existing) = self.forward.get(old) {
            return Ok(existing.clone());
        }
        let new = ids.generate();
        self.record_rename(old, &new)?;
        Ok(new)
    }

    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.forward.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.forward.contains_key(id)
    }

    /// Lenient policy: ids without an entry pass through untouched.
    pub fn resolve_or_keep<'a>(&'a self, id: &'a str) -> &'a str {
        self.lookup(id).unwrap_or(id)
    }

    /// Strict policy: a missing entry is an `UnresolvedReference`.
    pub fn resolve_or_fail(&self, id: &str) -> Result<&str, CoreError> {
        self.lookup(id).ok_or_else(|| {
            CoreError::unresolved(
                id,
                format!("{id} has no entry in the {} registry", self.namespace),
            )
        })
    }

    /// `[old, new]` pairs in the order they were recorded.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }
}

/// The per-run set of registries, one per namespace.
#[derive(Debug, Clone)]
pub struct Registries {
    pub trader: RenameRegistry,
    pub catalog: RenameRegistry,
    pub quest: RenameRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            trader: RenameRegistry::new(Namespace::Trader),
            catalog: RenameRegistry::new(Namespace::Catalog),
            quest: RenameRegistry::new(Namespace::Quest),
        }
    }

    pub fn get(&self, namespace: Namespace) -> &RenameRegistry {
        match namespace {
            Namespace::Trader => &self.trader,
            Namespace::Catalog => &self.catalog,
            Namespace::Quest => &self.quest,
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
