use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::registry::RenameRegistry;

/// Walks a JSON value tree and swaps every string leaf and object key that is
/// exactly an old id of one of the registries. Substrings never match.
///
/// Registries are consulted in order; the first hit wins.
#[derive(Debug, Clone)]
pub struct IdSubstitution<'a> {
    registries: Vec<&'a RenameRegistry>,
}

impl<'a> IdSubstitution<'a> {
    pub fn new(registries: impl IntoIterator<Item = &'a RenameRegistry>) -> Self {
        Self {
            registries: registries.into_iter().collect(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.registries.iter().all(|r| r.is_empty())
    }

    pub fn resolve(&self, id: &str) -> Option<&'a str> {
        self.registries.iter().find_map(|r| r.lookup(id))
    }

    /// Rewrites `value` in place and returns the number of replacements.
    pub fn apply(&self, value: &mut JsonValue) -> usize {
        if self.is_noop() {
            return 0;
        }
        self.visit(value)
    }

    fn visit(&self, value: &mut JsonValue) -> usize {
        match value {
            JsonValue::String(s) => match self.resolve(s) {
                Some(new) => {
                    *s = new.to_string();
                    1
                }
                None => 0,
            },
            JsonValue::Array(items) => items.iter_mut().map(|v| self.visit(v)).sum(),
            JsonValue::Object(map) => self.visit_object(map),
            JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => 0,
        }
    }

    fn visit_object(&self, map: &mut JsonMap<String, JsonValue>) -> usize {
        let mut replaced = 0;
        let entries = std::mem::take(map);
        for (key, mut child) in entries {
            replaced += self.visit(&mut child);
            let key = match self.resolve(&key) {
                Some(new) => {
                    replaced += 1;
                    new.to_string()
                }
                None => key,
            };
            map.insert(key, child);
        }
        replaced
    }
}
