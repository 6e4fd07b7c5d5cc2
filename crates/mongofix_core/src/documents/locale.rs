use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use super::RewriteOutcome;
use crate::core_api::CoreError;
use crate::ids::is_canonical;
use crate::registry::RenameRegistry;

/// Suffixes of `"<quest id> <suffix>"` locale keys.
pub const QUEST_TEXT_SUFFIXES: [&str; 10] = [
    "name",
    "description",
    "successMessageText",
    "failMessageText",
    "startedMessageText",
    "acceptPlayerMessage",
    "declinePlayerMessage",
    "completePlayerMessage",
    "changeQuestMessageText",
    "note",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleTable(pub IndexMap<String, JsonValue>);

impl LocaleTable {
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A locale key split at its first whitespace: `head` plus everything after
/// it, separator included.
struct SplitKey<'k> {
    head: &'k str,
    tail: &'k str,
}

impl<'k> SplitKey<'k> {
    fn new(key: &'k str) -> Self {
        match key.find(char::is_whitespace) {
            Some(at) => Self {
                head: &key[..at],
                tail: &key[at..],
            },
            None => Self { head: key, tail: "" },
        }
    }

    fn suffix(&self) -> &'k str {
        self.tail.trim_start()
    }

    fn has_quest_suffix(&self) -> bool {
        !self.tail.is_empty() && QUEST_TEXT_SUFFIXES.contains(&self.suffix())
    }

    fn with_head(&self, head: &str) -> String {
        format!("{head}{}", self.tail)
    }
}

enum KeyResolution {
    Keep,
    Rename(String),
    Drop(CoreError),
}

/// Rewrites locale keys that name quests, quest nodes or the trader.
///
/// By default a key that looks like a quest key but has no quest mapping is
/// dropped with a diagnostic. [`LocaleRewriter::lenient`] keeps such keys,
/// for runs where the quest registry is known to be incomplete.
pub struct LocaleRewriter<'r> {
    quests: &'r RenameRegistry,
    traders: &'r RenameRegistry,
    strict: bool,
}

impl<'r> LocaleRewriter<'r> {
    pub fn new(quests: &'r RenameRegistry, traders: &'r RenameRegistry) -> Self {
        Self {
            quests,
            traders,
            strict: true,
        }
    }

    pub fn lenient(self) -> Self {
        Self {
            strict: false,
            ..self
        }
    }

    pub fn rewrite(&self, table: &mut LocaleTable) -> Result<RewriteOutcome, CoreError> {
        let mut outcome = RewriteOutcome::default();
        let entries = std::mem::take(&mut table.0);

        for (key, value) in entries {
            match self.resolve_key(&key) {
                KeyResolution::Keep => {
                    table.0.insert(key, value);
                }
                KeyResolution::Rename(new_key) => {
                    outcome.references += 1;
                    table.0.insert(new_key, value);
                }
                KeyResolution::Drop(err) => {
                    let err = CoreError {
                        message: format!("{}; dropping locale key {key:?} = {value}", err.message),
                        ..err
                    }
                    .with_field(key.as_str());
                    warn!("{err}");
                    outcome.diagnostics.push(err);
                }
            }
        }

        info!(
            renamed = outcome.references,
            dropped = outcome.diagnostics.len(),
            "locale keys updated"
        );
        Ok(outcome)
    }

    fn resolve_key(&self, key: &str) -> KeyResolution {
        let split = SplitKey::new(key);

        if !split.tail.is_empty()
            && let Some(trader) = self.traders.lookup(split.head)
        {
            return KeyResolution::Rename(split.with_head(trader));
        }

        // Canonical ids stay put unless the quest registry renamed them
        // (condition ids are remapped even when canonical).
        if split.has_quest_suffix() {
            if is_canonical(split.head) && !self.quests.contains(split.head) {
                return KeyResolution::Keep;
            }
            return self.quest_key(split.head, |new| split.with_head(new));
        }

        if is_canonical(split.head) && !self.quests.contains(key) {
            return KeyResolution::Keep;
        }
        self.quest_key(key, str::to_string)
    }

    fn quest_key(&self, id: &str, rename: impl FnOnce(&str) -> String) -> KeyResolution {
        if !self.strict {
            let new = self.quests.resolve_or_keep(id);
            return if new == id {
                KeyResolution::Keep
            } else {
                KeyResolution::Rename(rename(new))
            };
        }
        match self.quests.resolve_or_fail(id) {
            Ok(new) => KeyResolution::Rename(rename(new)),
            Err(err) => KeyResolution::Drop(err),
        }
    }
}
