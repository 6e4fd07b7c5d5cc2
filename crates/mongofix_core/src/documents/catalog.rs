use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{info, warn};

use super::RewriteOutcome;
use crate::core_api::CoreError;
use crate::ids::{IdSource, is_canonical};
use crate::registry::RenameRegistry;

/// Parent id of top level offers. Never looked up or remapped.
pub const ROOT_SENTINEL: &str = "hideout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_tpl", default, skip_serializing_if = "Option::is_none")]
    pub tpl: Option<String>,
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

/// A trader assort: offered items plus the trade and loyalty maps keyed by item id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub items: Vec<CatalogItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barter_scheme: Option<IndexMap<String, JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loyal_level_items: Option<IndexMap<String, JsonValue>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl CatalogDocument {
    /// `(item id, parent id)` for every parent that is neither the root
    /// sentinel nor an item of this catalog.
    pub fn dangling_parents(&self) -> Vec<(&str, &str)> {
        let ids: HashSet<&str> = self.items.iter().map(|item| item.id.as_str()).collect();
        self.items
            .iter()
            .filter_map(|item| {
                let parent = item.parent_id.as_deref()?;
                if parent == ROOT_SENTINEL || ids.contains(parent) {
                    return None;
                }
                Some((item.id.as_str(), parent))
            })
            .collect()
    }
}

pub struct CatalogRewriter<'r> {
    registry: &'r mut RenameRegistry,
    ids: &'r mut dyn IdSource,
}

impl<'r> CatalogRewriter<'r> {
    pub fn new(registry: &'r mut RenameRegistry, ids: &'r mut dyn IdSource) -> Self {
        Self { registry, ids }
    }

    pub fn rewrite(&mut self, catalog: &mut CatalogDocument) -> Result<RewriteOutcome, CoreError> {
        let mut outcome = RewriteOutcome::default();

        for item in &mut catalog.items {
            if is_canonical(&item.id) {
                continue;
            }
            item.id = self.registry.rename_with(&item.id, self.ids)?;
            outcome.remapped += 1;
        }

        for item in &mut catalog.items {
            let Some(parent) = item.parent_id.as_mut() else {
                continue;
            };
            if parent == ROOT_SENTINEL {
                continue;
            }
            let resolved = self.registry.resolve_or_keep(parent);
            if resolved != parent.as_str() {
                *parent = resolved.to_string();
                outcome.references += 1;
            } else if !is_canonical(parent) {
                warn!(
                    item = %item.id,
                    parent = %parent,
                    "parentId is not a mongo id and has no generated replacement, skipping"
                );
            }
        }

        for map in [
            catalog.barter_scheme.as_mut(),
            catalog.loyal_level_items.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            outcome.references += rekey_lenient(map, self.registry);
        }

        for (item, parent) in catalog.dangling_parents() {
            outcome.diagnostics.push(
                CoreError::unresolved(
                    parent,
                    format!("parentId {parent} of item {item} does not match any item"),
                )
                .with_field("parentId"),
            );
        }

        info!("{} item ID's changed to MongoID's", outcome.remapped);
        Ok(outcome)
    }
}

/// Replaces every key found in `registry`; other keys are kept as they are.
pub(crate) fn rekey_lenient<V>(map: &mut IndexMap<String, V>, registry: &RenameRegistry) -> usize {
    let mut replaced = 0;
    let entries = std::mem::take(map);
    for (key, value) in entries {
        let resolved = registry.resolve_or_keep(&key);
        if resolved != key {
            replaced += 1;
            map.insert(resolved.to_string(), value);
        } else {
            map.insert(key, value);
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CatalogDocument, CatalogRewriter, ROOT_SENTINEL};
    use crate::core_api::CoreErrorCode;
    use crate::ids::{SequentialIds, is_canonical};
    use crate::registry::{Namespace, RenameRegistry};

    fn catalog(value: serde_json::Value) -> CatalogDocument {
        serde_json::from_value(value).expect("valid catalog")
    }

    #[test]
    fn items_and_parents_are_remapped() {
        let mut registry = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("c0");
        let mut doc = catalog(json!({
            "items": [
                { "_id": "short1", "_tpl": "5449016a4bdc2d6f028b456f", "parentId": "hideout", "slotId": "hideout" },
                { "_id": "short2", "_tpl": "5449016a4bdc2d6f028b456f", "parentId": "short1", "slotId": "mod_magazine" }
            ],
            "barter_scheme": { "short1": [[{ "count": 1, "_tpl": "5449016a4bdc2d6f028b456f" }]] },
            "loyal_level_items": { "short1": 1, "short2": 2 }
        }));

        let outcome = CatalogRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        let x = registry.lookup("short1").expect("short1 renamed").to_string();
        let y = registry.lookup("short2").expect("short2 renamed").to_string();
        assert!(is_canonical(&x) && is_canonical(&y));
        assert_eq!(doc.items[0].id, x);
        assert_eq!(doc.items[0].parent_id.as_deref(), Some(ROOT_SENTINEL));
        assert_eq!(doc.items[1].id, y);
        assert_eq!(doc.items[1].parent_id.as_deref(), Some(x.as_str()));
        assert_eq!(doc.items[1].extra["slotId"], "mod_magazine");

        let barter = doc.barter_scheme.as_ref().expect("barter scheme");
        assert_eq!(
            barter.get(&x),
            Some(&json!([[{ "count": 1, "_tpl": "5449016a4bdc2d6f028b456f" }]]))
        );
        let loyalty = doc.loyal_level_items.as_ref().expect("loyalty");
        assert_eq!(loyalty.get(&x), Some(&json!(1)));
        assert_eq!(loyalty.get(&y), Some(&json!(2)));

        assert_eq!(outcome.remapped, 2);
        assert_eq!(outcome.references, 4);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn canonical_ids_and_unknown_keys_pass_through() {
        let mut registry = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("c0");
        let mut doc = catalog(json!({
            "items": [
                { "_id": "5c0647fdd443bc2504c2d371", "parentId": "hideout" }
            ],
            "barter_scheme": { "5c0647fdd443bc2504c2d371": [], "not_an_item": [] }
        }));
        let before = doc.clone();

        let outcome = CatalogRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        assert_eq!(doc, before);
        assert_eq!(outcome.remapped, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn dangling_parent_is_reported_not_rewritten() {
        let mut registry = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("c0");
        let mut doc = catalog(json!({
            "items": [
                { "_id": "short1", "parentId": "hideout" },
                { "_id": "short2", "parentId": "ghost" }
            ]
        }));

        let outcome = CatalogRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        assert_eq!(doc.items[1].parent_id.as_deref(), Some("ghost"));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].code,
            CoreErrorCode::UnresolvedReference
        );
        assert_eq!(outcome.diagnostics[0].id.as_deref(), Some("ghost"));
        assert!(doc.barter_scheme.is_none());
    }

    #[test]
    fn parents_resolve_across_catalogs_sharing_a_registry() {
        let mut registry = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("c0");
        let mut first = catalog(json!({ "items": [{ "_id": "root", "parentId": "hideout" }] }));
        let mut second = catalog(json!({ "items": [{ "_id": "child", "parentId": "root" }] }));

        CatalogRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut first)
            .expect("first");
        let outcome = CatalogRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut second)
            .expect("second");

        assert_eq!(second.items[0].parent_id.as_deref(), Some(first.items[0].id.as_str()));
        // The parent lives in another document, so this catalog still reports it.
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
