use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::info;

use super::{RewriteOutcome, decode, encode};
use crate::core_api::CoreError;
use crate::registry::RenameRegistry;
use crate::substitution::IdSubstitution;

/// Assort offers unlocked by quest progress: assort item id -> quest id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestAssortDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<IndexMap<String, JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<IndexMap<String, JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<IndexMap<String, JsonValue>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

pub struct QuestAssortRewriter<'r> {
    quests: &'r RenameRegistry,
    traders: &'r RenameRegistry,
    catalog: &'r RenameRegistry,
}

impl<'r> QuestAssortRewriter<'r> {
    pub fn new(
        quests: &'r RenameRegistry,
        traders: &'r RenameRegistry,
        catalog: &'r RenameRegistry,
    ) -> Self {
        Self {
            quests,
            traders,
            catalog,
        }
    }

    pub fn rewrite(&self, document: &mut QuestAssortDocument) -> Result<RewriteOutcome, CoreError> {
        let mut outcome = RewriteOutcome::default();

        // Keys are looked up leniently: quest ids first, then assort item ids.
        for map in [
            document.started.as_mut(),
            document.success.as_mut(),
            document.fail.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            let entries = std::mem::take(map);
            for (key, value) in entries {
                let mut resolved = self.quests.resolve_or_keep(&key);
                if resolved == key {
                    resolved = self.catalog.resolve_or_keep(&key);
                }
                if resolved != key {
                    outcome.references += 1;
                    map.insert(resolved.to_string(), value);
                } else {
                    map.insert(key, value);
                }
            }
        }

        let substitution = IdSubstitution::new([self.quests, self.traders]);
        if !substitution.is_noop() {
            let mut value = encode(document, "quest assort")?;
            outcome.references += substitution.apply(&mut value);
            *document = decode(value, "quest assort")?;
        }

        info!(references = outcome.references, "quest assort references updated");
        Ok(outcome)
    }
}
