pub mod catalog;
pub mod locale;
pub mod quest;
pub mod quest_assort;
pub mod trader;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::core_api::{CoreError, CoreErrorCode};

pub use catalog::{CatalogDocument, CatalogItem, CatalogRewriter, ROOT_SENTINEL};
pub use locale::{LocaleRewriter, LocaleTable, QUEST_TEXT_SUFFIXES};
pub use quest::{
    ConditionCounter, QUEST_TEXT_FIELDS, QuestCondition, QuestConditions, QuestDefinition,
    QuestDocument, QuestReward, QuestRewards, QuestRewriter, VisibilityCondition,
};
pub use quest_assort::{QuestAssortDocument, QuestAssortRewriter};
pub use trader::{TraderBase, TraderBaseRewriter};

/// What one rewriter did to one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Ids replaced by freshly allocated ones.
    pub remapped: usize,
    /// Reference sites rewritten to point at a new id.
    pub references: usize,
    /// Non-fatal problems (`UnresolvedReference`), one per occurrence.
    pub diagnostics: Vec<CoreError>,
}

impl RewriteOutcome {
    pub fn merge(&mut self, other: RewriteOutcome) {
        self.remapped += other.remapped;
        self.references += other.references;
        self.diagnostics.extend(other.diagnostics);
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: JsonValue, kind: &str) -> Result<T, CoreError> {
    serde_json::from_value(value).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Parse,
            format!("document is not a valid {kind}: {e}"),
        )
    })
}

pub(crate) fn encode<T: Serialize>(document: &T, kind: &str) -> Result<JsonValue, CoreError> {
    serde_json::to_value(document).map_err(|e| {
        CoreError::new(
            CoreErrorCode::InternalConsistency,
            format!("failed to convert {kind} back to json: {e}"),
        )
    })
}
