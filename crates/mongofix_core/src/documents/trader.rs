use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::info;

use super::RewriteOutcome;
use crate::core_api::CoreError;
use crate::ids::{IdSource, is_canonical};
use crate::registry::RenameRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderBase {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

/// Remaps the trader root id, seeding the trader registry.
pub struct TraderBaseRewriter<'r> {
    registry: &'r mut RenameRegistry,
    ids: &'r mut dyn IdSource,
}

impl<'r> TraderBaseRewriter<'r> {
    pub fn new(registry: &'r mut RenameRegistry, ids: &'r mut dyn IdSource) -> Self {
        Self { registry, ids }
    }

    pub fn rewrite(&mut self, base: &mut TraderBase) -> Result<RewriteOutcome, CoreError> {
        let mut outcome = RewriteOutcome::default();
        if is_canonical(&base.id) {
            return Ok(outcome);
        }

        let new_id = self.registry.rename_with(&base.id, self.ids)?;
        info!(old = %base.id, new = %new_id, "trader id changed to a mongo id");
        base.id = new_id;
        outcome.remapped = 1;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TraderBase, TraderBaseRewriter};
    use crate::ids::SequentialIds;
    use crate::registry::{Namespace, RenameRegistry};

    #[test]
    fn non_canonical_trader_id_is_remapped_once() {
        let mut registry = RenameRegistry::new(Namespace::Trader);
        let mut ids = SequentialIds::new("7a");
        let mut base: TraderBase =
            serde_json::from_value(json!({ "_id": "my_trader", "nickname": "Bob" }))
                .expect("base");

        let outcome = TraderBaseRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut base)
            .expect("rewrite");

        assert_eq!(outcome.remapped, 1);
        assert_eq!(base.id, "7a0000000000000000000001");
        assert_eq!(base.extra["nickname"], "Bob");
        assert_eq!(registry.lookup("my_trader"), Some("7a0000000000000000000001"));

        let again = TraderBaseRewriter::new(&mut registry, &mut ids)
            .rewrite(&mut base)
            .expect("rewrite");
        assert_eq!(again.remapped, 0);
        assert_eq!(registry.len(), 1);
    }
}
