use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, info};

use super::{CatalogItem, RewriteOutcome, decode, encode};
use crate::core_api::CoreError;
use crate::ids::{IdSource, is_canonical};
use crate::registry::RenameRegistry;
use crate::substitution::IdSubstitution;

/// Human readable quest fields authored as `"<quest id> <free text>"`.
pub const QUEST_TEXT_FIELDS: [&str; 10] = [
    "acceptPlayerMessage",
    "changeQuestMessageText",
    "completePlayerMessage",
    "declinePlayerMessage",
    "description",
    "failMessageText",
    "name",
    "note",
    "startedMessageText",
    "successMessageText",
];

const ASSORTMENT_UNLOCK: &str = "AssortmentUnlock";

/// Quest definitions keyed by quest id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestDocument(pub IndexMap<String, QuestDefinition>);

impl QuestDocument {
    pub fn get(&self, id: &str) -> Option<&QuestDefinition> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDefinition {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "traderId", default, skip_serializing_if = "Option::is_none")]
    pub trader_id: Option<String>,
    #[serde(rename = "acceptPlayerMessage", default, skip_serializing_if = "Option::is_none")]
    pub accept_player_message: Option<String>,
    #[serde(rename = "changeQuestMessageText", default, skip_serializing_if = "Option::is_none")]
    pub change_quest_message_text: Option<String>,
    #[serde(rename = "completePlayerMessage", default, skip_serializing_if = "Option::is_none")]
    pub complete_player_message: Option<String>,
    #[serde(rename = "declinePlayerMessage", default, skip_serializing_if = "Option::is_none")]
    pub decline_player_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "failMessageText", default, skip_serializing_if = "Option::is_none")]
    pub fail_message_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "startedMessageText", default, skip_serializing_if = "Option::is_none")]
    pub started_message_text: Option<String>,
    #[serde(rename = "successMessageText", default, skip_serializing_if = "Option::is_none")]
    pub success_message_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<QuestConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<QuestRewards>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl QuestDefinition {
    /// The [`QUEST_TEXT_FIELDS`], in that order.
    pub fn text_fields_mut(&mut self) -> [(&'static str, &mut Option<String>); 10] {
        [
            (QUEST_TEXT_FIELDS[0], &mut self.accept_player_message),
            (QUEST_TEXT_FIELDS[1], &mut self.change_quest_message_text),
            (QUEST_TEXT_FIELDS[2], &mut self.complete_player_message),
            (QUEST_TEXT_FIELDS[3], &mut self.decline_player_message),
            (QUEST_TEXT_FIELDS[4], &mut self.description),
            (QUEST_TEXT_FIELDS[5], &mut self.fail_message_text),
            (QUEST_TEXT_FIELDS[6], &mut self.name),
            (QUEST_TEXT_FIELDS[7], &mut self.note),
            (QUEST_TEXT_FIELDS[8], &mut self.started_message_text),
            (QUEST_TEXT_FIELDS[9], &mut self.success_message_text),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestConditions {
    #[serde(
        rename = "AvailableForFinish",
        alias = "availableForFinish",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub available_for_finish: Option<Vec<QuestCondition>>,
    #[serde(
        rename = "AvailableForStart",
        alias = "availableForStart",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub available_for_start: Option<Vec<QuestCondition>>,
    #[serde(
        rename = "Fail",
        alias = "fail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fail: Option<Vec<QuestCondition>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestCondition {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "conditionType", default, skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<ConditionCounter>,
    #[serde(
        rename = "visibilityConditions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub visibility_conditions: Option<Vec<VisibilityCondition>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionCounter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub conditions: Vec<QuestCondition>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityCondition {
    #[serde(default)]
    pub id: String,
    /// Usually the id of another condition of the same quest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "conditionType", default, skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestRewards {
    #[serde(
        rename = "Fail",
        alias = "fail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fail: Option<Vec<QuestReward>>,
    #[serde(
        rename = "Started",
        alias = "started",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub started: Option<Vec<QuestReward>>,
    #[serde(
        rename = "Success",
        alias = "success",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub success: Option<Vec<QuestReward>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestReward {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub reward_type: Option<String>,
    /// Mirrors the `_id` of the root item of `items`, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<CatalogItem>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

/// Replaces the first whitespace delimited token of `text` with `id`,
/// keeping leading whitespace and the rest verbatim. Blank strings are left
/// alone.
pub fn replace_leading_token(text: &str, id: &str) -> Option<String> {
    let body = text.trim_start();
    if body.is_empty() {
        return None;
    }
    let indent = &text[..text.len() - body.len()];
    let rest = body.find(char::is_whitespace).map_or("", |at| &body[at..]);
    Some(format!("{indent}{id}{rest}"))
}

/// Remaps quest ids and every id bearing node inside quest definitions.
///
/// Quest ids are only remapped when they are not canonical. Condition,
/// counter, visibility and reward node ids are always given fresh ids, even
/// canonical ones, and recorded in the quest registry so locale tables and
/// quest assorts can follow them.
pub struct QuestRewriter<'r> {
    quests: &'r mut RenameRegistry,
    traders: &'r RenameRegistry,
    catalog: &'r RenameRegistry,
    ids: &'r mut dyn IdSource,
}

impl<'r> QuestRewriter<'r> {
    pub fn new(
        quests: &'r mut RenameRegistry,
        traders: &'r RenameRegistry,
        catalog: &'r RenameRegistry,
        ids: &'r mut dyn IdSource,
    ) -> Self {
        Self {
            quests,
            traders,
            catalog,
            ids,
        }
    }

    pub fn rewrite(&mut self, document: &mut QuestDocument) -> Result<RewriteOutcome, CoreError> {
        let mut outcome = RewriteOutcome::default();
        let mut quests_changed = 0;

        let entries = std::mem::take(&mut document.0);
        for (key, mut quest) in entries {
            if !is_canonical(&quest.id) {
                self.remap_quest_id(&mut quest, &mut outcome)?;
                quests_changed += 1;
            }
            let key = match self.quests.lookup(&key) {
                Some(new) => new.to_string(),
                None => key,
            };

            if let Some(conditions) = quest.conditions.as_mut() {
                for group in [
                    conditions.available_for_finish.as_mut(),
                    conditions.available_for_start.as_mut(),
                    conditions.fail.as_mut(),
                ]
                .into_iter()
                .flatten()
                {
                    self.remap_conditions(group, &mut outcome)?;
                }
            }

            if let Some(rewards) = quest.rewards.as_mut() {
                for bucket in [
                    rewards.fail.as_mut(),
                    rewards.started.as_mut(),
                    rewards.success.as_mut(),
                ]
                .into_iter()
                .flatten()
                {
                    self.remap_rewards(bucket, &mut outcome)?;
                }
            }

            document.0.insert(key, quest);
        }

        outcome.references += self.propagate(document)?;
        info!(
            quests = quests_changed,
            nodes = outcome.remapped - quests_changed,
            "quest ID's changed to MongoID's"
        );
        Ok(outcome)
    }

    fn remap_quest_id(
        &mut self,
        quest: &mut QuestDefinition,
        outcome: &mut RewriteOutcome,
    ) -> Result<(), CoreError> {
        let new_id = self.quests.rename_with(&quest.id, self.ids)?;
        debug!(old = %quest.id, new = %new_id, "quest id remapped");
        quest.id = new_id.clone();
        outcome.remapped += 1;

        for (_, field) in quest.text_fields_mut() {
            let Some(text) = field.as_mut() else {
                continue;
            };
            if let Some(replaced) = replace_leading_token(text, &new_id) {
                *text = replaced;
                outcome.references += 1;
            }
        }
        Ok(())
    }

    fn remap_conditions(
        &mut self,
        conditions: &mut [QuestCondition],
        outcome: &mut RewriteOutcome,
    ) -> Result<(), CoreError> {
        for condition in conditions {
            condition.id = self.node_id(&condition.id, outcome)?;

            if let Some(counter) = condition.counter.as_mut() {
                counter.id = self.node_id(&counter.id, outcome)?;
                self.remap_conditions(&mut counter.conditions, outcome)?;
            }

            for visibility in condition.visibility_conditions.iter_mut().flatten() {
                visibility.id = self.node_id(&visibility.id, outcome)?;
            }
        }
        Ok(())
    }

    fn remap_rewards(
        &mut self,
        rewards: &mut [QuestReward],
        outcome: &mut RewriteOutcome,
    ) -> Result<(), CoreError> {
        for reward in rewards {
            reward.id = self.node_id(&reward.id, outcome)?;

            let Some(items) = reward.items.as_mut().filter(|items| !items.is_empty()) else {
                continue;
            };

            let root = reward
                .target
                .as_deref()
                .and_then(|target| items.iter().position(|item| item.id == target))
                .unwrap_or(0);
            let old_root = items[root].id.clone();

            let shared = if reward.reward_type.as_deref() == Some(ASSORTMENT_UNLOCK) {
                let old_target = reward.target.as_deref().unwrap_or(&old_root);
                self.catalog.resolve_or_keep(old_target).to_string()
            } else {
                self.ids.generate()
            };

            let mut local: HashMap<String, String> = HashMap::new();
            local.insert(old_root, shared.clone());
            for (index, item) in items.iter_mut().enumerate() {
                if index == root {
                    item.id = shared.clone();
                } else if !is_canonical(&item.id) {
                    let fresh = self.ids.generate();
                    local.insert(std::mem::replace(&mut item.id, fresh.clone()), fresh);
                }
            }
            for item in items.iter_mut() {
                if let Some(parent) = item.parent_id.as_mut()
                    && let Some(new) = local.get(parent.as_str())
                {
                    *parent = new.clone();
                }
            }
            reward.target = Some(shared);
        }
        Ok(())
    }

    /// Fresh id for a condition or reward node. Empty ids are replaced but
    /// never recorded, since `""` is a common placeholder elsewhere.
    fn node_id(&mut self, old: &str, outcome: &mut RewriteOutcome) -> Result<String, CoreError> {
        outcome.remapped += 1;
        if old.is_empty() {
            return Ok(self.ids.generate());
        }
        self.quests.rename_with(old, self.ids)
    }

    /// Catches every reference the structural walk did not visit.
    fn propagate(&self, document: &mut QuestDocument) -> Result<usize, CoreError> {
        let substitution = IdSubstitution::new([&*self.quests, self.traders]);
        if substitution.is_noop() {
            return Ok(0);
        }
        let mut value = encode(document, "quest document")?;
        let replaced = substitution.apply(&mut value);
        *document = decode(value, "quest document")?;
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{QuestDocument, QuestRewriter, replace_leading_token};
    use crate::ids::{SequentialIds, is_canonical};
    use crate::registry::{Namespace, RenameRegistry};

    fn quests(value: serde_json::Value) -> QuestDocument {
        serde_json::from_value(value).expect("valid quest document")
    }

    #[test]
    fn leading_token_only() {
        assert_eq!(
            replace_leading_token("q1 kill 5 bandits", "Z").as_deref(),
            Some("Z kill 5 bandits")
        );
        assert_eq!(replace_leading_token("q1", "Z").as_deref(), Some("Z"));
        assert_eq!(
            replace_leading_token("q1\tdescription", "Z").as_deref(),
            Some("Z\tdescription")
        );
        assert_eq!(replace_leading_token("", "Z"), None);
    }

    #[test]
    fn leading_whitespace_is_kept_before_the_token() {
        assert_eq!(
            replace_leading_token(" q1 foo", "Z").as_deref(),
            Some(" Z foo")
        );
        assert_eq!(
            replace_leading_token("\t q1", "Z").as_deref(),
            Some("\t Z")
        );
        assert_eq!(replace_leading_token("   ", "Z"), None);
    }

    #[test]
    fn quest_id_text_fields_and_key_are_remapped() {
        let mut quest_registry = RenameRegistry::new(Namespace::Quest);
        let traders = RenameRegistry::new(Namespace::Trader);
        let catalog = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("e0");
        let mut doc = quests(json!({
            "q1": {
                "_id": "q1",
                "QuestName": "Bandits",
                "description": "q1 kill 5 bandits",
                "name": "q1 name",
                "note": "",
                "conditions": { "AvailableForFinish": [], "AvailableForStart": [], "Fail": [] }
            }
        }));

        QuestRewriter::new(&mut quest_registry, &traders, &catalog, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        let z = quest_registry.lookup("q1").expect("q1 renamed").to_string();
        let quest = doc.get(&z).expect("re-keyed under the new id");
        assert_eq!(quest.id, z);
        assert_eq!(
            quest.description.as_deref(),
            Some(format!("{z} kill 5 bandits").as_str())
        );
        assert_eq!(quest.name.as_deref(), Some(format!("{z} name").as_str()));
        assert_eq!(quest.note.as_deref(), Some(""));
        assert_eq!(quest.extra["QuestName"], "Bandits");
        assert!(doc.get("q1").is_none());
    }

    #[test]
    fn canonical_quest_id_is_kept_but_conditions_are_always_remapped() {
        let mut quest_registry = RenameRegistry::new(Namespace::Quest);
        let traders = RenameRegistry::new(Namespace::Trader);
        let catalog = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("e0");
        let quest_id = "5936d90786f7742b1420ba5b";
        let mut doc = quests(json!({
            quest_id: {
                "_id": quest_id,
                "description": format!("{quest_id} description"),
                "conditions": {
                    "AvailableForFinish": [{
                        "id": "5967379186f77463860dadd6",
                        "conditionType": "CounterCreator",
                        "counter": {
                            "id": "counter1",
                            "conditions": [{ "id": "kills1", "conditionType": "Kills" }]
                        },
                        "visibilityConditions": [{
                            "id": "vis1",
                            "target": "cond_start",
                            "conditionType": "CompleteCondition"
                        }]
                    }],
                    "AvailableForStart": [{ "id": "cond_start", "conditionType": "Level" }],
                    "Fail": []
                }
            }
        }));

        let outcome = QuestRewriter::new(&mut quest_registry, &traders, &catalog, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        let quest = doc.get(quest_id).expect("canonical quest id kept");
        assert_eq!(quest.id, quest_id);
        assert_eq!(
            quest.description.as_deref(),
            Some(format!("{quest_id} description").as_str())
        );
        assert!(quest_registry.lookup(quest_id).is_none());

        let conditions = quest.conditions.as_ref().expect("conditions");
        let finish = &conditions.available_for_finish.as_ref().expect("finish")[0];
        assert_eq!(
            Some(finish.id.as_str()),
            quest_registry.lookup("5967379186f77463860dadd6")
        );
        let counter = finish.counter.as_ref().expect("counter");
        assert_eq!(Some(counter.id.as_str()), quest_registry.lookup("counter1"));
        assert_eq!(
            Some(counter.conditions[0].id.as_str()),
            quest_registry.lookup("kills1")
        );

        let visibility = &finish.visibility_conditions.as_ref().expect("visibility")[0];
        assert_eq!(Some(visibility.id.as_str()), quest_registry.lookup("vis1"));
        let start = &conditions.available_for_start.as_ref().expect("start")[0];
        assert_eq!(visibility.target.as_deref(), Some(start.id.as_str()));

        assert_eq!(outcome.remapped, 5);
        assert_eq!(quest_registry.len(), 5);
    }

    #[test]
    fn reward_items_share_one_id_with_target() {
        let mut quest_registry = RenameRegistry::new(Namespace::Quest);
        let traders = RenameRegistry::new(Namespace::Trader);
        let catalog = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("e0");
        let mut doc = quests(json!({
            "5936d90786f7742b1420ba5b": {
                "_id": "5936d90786f7742b1420ba5b",
                "rewards": {
                    "Started": [],
                    "Fail": [],
                    "Success": [
                        { "id": "rew_xp", "type": "Experience", "value": 1000 },
                        {
                            "id": "rew_gun",
                            "type": "Item",
                            "target": "gun",
                            "items": [
                                { "_id": "gun", "_tpl": "5447a9cd4bdc2dbd208b4567" },
                                { "_id": "mag", "_tpl": "55d4887d4bdc2d962f8b4570", "parentId": "gun", "slotId": "mod_magazine" }
                            ]
                        }
                    ]
                }
            }
        }));

        QuestRewriter::new(&mut quest_registry, &traders, &catalog, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        let quest = doc.get("5936d90786f7742b1420ba5b").expect("quest");
        let success = quest
            .rewards
            .as_ref()
            .and_then(|r| r.success.as_ref())
            .expect("success rewards");
        assert_eq!(Some(success[0].id.as_str()), quest_registry.lookup("rew_xp"));

        let gun = &success[1];
        let items = gun.items.as_ref().expect("items");
        let target = gun.target.as_deref().expect("target");
        assert!(is_canonical(target));
        assert_eq!(items[0].id, target);
        assert!(is_canonical(&items[1].id));
        assert_eq!(items[1].parent_id.as_deref(), Some(target));
        assert_eq!(items[1].extra["slotId"], "mod_magazine");
        assert!(quest_registry.lookup("gun").is_none());
    }

    #[test]
    fn assortment_unlock_mirrors_the_catalog_id() {
        let mut quest_registry = RenameRegistry::new(Namespace::Quest);
        let traders = RenameRegistry::new(Namespace::Trader);
        let mut catalog = RenameRegistry::new(Namespace::Catalog);
        catalog
            .record_rename("assort_gun", "c00000000000000000000001")
            .expect("catalog mapping");
        let mut ids = SequentialIds::new("e0");
        let mut doc = quests(json!({
            "5936d90786f7742b1420ba5b": {
                "_id": "5936d90786f7742b1420ba5b",
                "rewards": {
                    "Success": [{
                        "id": "unlock1",
                        "type": "AssortmentUnlock",
                        "target": "assort_gun",
                        "items": [{ "_id": "assort_gun", "_tpl": "5447a9cd4bdc2dbd208b4567" }]
                    }]
                }
            }
        }));

        QuestRewriter::new(&mut quest_registry, &traders, &catalog, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        let quest = doc.get("5936d90786f7742b1420ba5b").expect("quest");
        let reward = &quest
            .rewards
            .as_ref()
            .and_then(|r| r.success.as_ref())
            .expect("success rewards")[0];
        assert_eq!(reward.target.as_deref(), Some("c00000000000000000000001"));
        assert_eq!(
            reward.items.as_ref().expect("items")[0].id,
            "c00000000000000000000001"
        );
    }

    #[test]
    fn trader_ids_are_propagated_by_exact_match() {
        let mut quest_registry = RenameRegistry::new(Namespace::Quest);
        let mut traders = RenameRegistry::new(Namespace::Trader);
        traders
            .record_rename("my_trader", "7a0000000000000000000001")
            .expect("trader mapping");
        let catalog = RenameRegistry::new(Namespace::Catalog);
        let mut ids = SequentialIds::new("e0");
        let mut doc = quests(json!({
            "5936d90786f7742b1420ba5b": {
                "_id": "5936d90786f7742b1420ba5b",
                "traderId": "my_trader",
                "image": "/files/quest/icon/my_trader.jpg",
                "rewards": {
                    "Success": [{ "id": "standing", "type": "TraderStanding", "target": "my_trader", "value": 0.02 }]
                }
            }
        }));

        let outcome = QuestRewriter::new(&mut quest_registry, &traders, &catalog, &mut ids)
            .rewrite(&mut doc)
            .expect("rewrite");

        let quest = doc.get("5936d90786f7742b1420ba5b").expect("quest");
        assert_eq!(quest.trader_id.as_deref(), Some("7a0000000000000000000001"));
        assert_eq!(quest.extra["image"], "/files/quest/icon/my_trader.jpg");
        let standing = &quest
            .rewards
            .as_ref()
            .and_then(|r| r.success.as_ref())
            .expect("success rewards")[0];
        assert_eq!(standing.target.as_deref(), Some("7a0000000000000000000001"));
        assert_eq!(outcome.references, 2);
    }
}
