use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{CoreError, CoreErrorCode};
use super::types::Stage;

/// Run configuration, read from a camelCase `config.json`.
///
/// Document paths are relative to `folder_path`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixerConfig {
    pub enable_fixer: bool,
    pub fix_trader_base: bool,
    pub fix_assorts: bool,
    pub fix_quests: bool,
    pub fix_quest_assorts: bool,
    pub fix_locales: bool,
    pub folder_path: PathBuf,
    pub backup_path: PathBuf,
    pub trader_base_path: Option<PathBuf>,
    pub assort_paths: Vec<PathBuf>,
    pub quest_paths: Vec<PathBuf>,
    pub quest_assort_paths: Vec<PathBuf>,
    pub locale_dir: PathBuf,
    pub locale_languages: Vec<String>,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            enable_fixer: true,
            fix_trader_base: true,
            fix_assorts: true,
            fix_quests: true,
            fix_quest_assorts: true,
            fix_locales: true,
            folder_path: PathBuf::new(),
            backup_path: PathBuf::from("backups"),
            trader_base_path: None,
            assort_paths: Vec::new(),
            quest_paths: Vec::new(),
            quest_assort_paths: Vec::new(),
            locale_dir: PathBuf::from("db/locales"),
            locale_languages: Vec::new(),
        }
    }
}

impl FixerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| {
            CoreError::new(CoreErrorCode::Config, format!("invalid configuration: {e}"))
        })
    }

    /// Anchors a relative `folder_path` and `backup_path` at `base`,
    /// usually the directory holding the config file.
    pub fn rebase(&mut self, base: &Path) {
        if self.folder_path.is_relative() {
            self.folder_path = base.join(&self.folder_path);
        }
        if self.backup_path.is_relative() {
            self.backup_path = base.join(&self.backup_path);
        }
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.folder_path.join(relative)
    }

    pub fn stage_enabled(&self, stage: Stage) -> bool {
        self.enable_fixer
            && match stage {
                Stage::TraderBase => self.fix_trader_base,
                Stage::Catalogs => self.fix_assorts,
                Stage::Quests => self.fix_quests,
                Stage::QuestAssorts => self.fix_quest_assorts,
                Stage::Locales => self.fix_locales,
            }
    }

    /// Resolved document paths for one stage, in configuration order.
    pub fn stage_paths(&self, stage: Stage) -> Vec<PathBuf> {
        match stage {
            Stage::TraderBase => self
                .trader_base_path
                .iter()
                .map(|p| self.resolve(p))
                .collect(),
            Stage::Catalogs => self.assort_paths.iter().map(|p| self.resolve(p)).collect(),
            Stage::Quests => self.quest_paths.iter().map(|p| self.resolve(p)).collect(),
            Stage::QuestAssorts => self
                .quest_assort_paths
                .iter()
                .map(|p| self.resolve(p))
                .collect(),
            Stage::Locales => self
                .locale_languages
                .iter()
                .map(|lang| self.resolve(&self.locale_dir.join(format!("{lang}.json"))))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::FixerConfig;
    use crate::core_api::{CoreErrorCode, Stage};

    #[test]
    fn missing_fields_take_defaults() {
        let config = FixerConfig::from_json_str(r#"{ "fixQuests": false }"#).expect("config");
        assert!(config.enable_fixer);
        assert!(!config.fix_quests);
        assert!(!config.stage_enabled(Stage::Quests));
        assert!(config.stage_enabled(Stage::Catalogs));
        assert_eq!(config.backup_path, PathBuf::from("backups"));
    }

    #[test]
    fn master_switch_disables_every_stage() {
        let config = FixerConfig::from_json_str(r#"{ "enableFixer": false }"#).expect("config");
        assert!(Stage::ALL.iter().all(|s| !config.stage_enabled(*s)));
    }

    #[test]
    fn paths_resolve_against_folder_path() {
        let mut config = FixerConfig::from_json_str(
            r#"{
                "folderPath": "user/mods/MyTrader",
                "assortPaths": ["db/assort.json"],
                "localeLanguages": ["en", "ru"]
            }"#,
        )
        .expect("config");
        config.rebase(Path::new("/srv/spt"));

        assert_eq!(
            config.stage_paths(Stage::Catalogs),
            vec![PathBuf::from("/srv/spt/user/mods/MyTrader/db/assort.json")]
        );
        assert_eq!(
            config.stage_paths(Stage::Locales),
            vec![
                PathBuf::from("/srv/spt/user/mods/MyTrader/db/locales/en.json"),
                PathBuf::from("/srv/spt/user/mods/MyTrader/db/locales/ru.json"),
            ]
        );
        assert_eq!(config.backup_path, PathBuf::from("/srv/spt/backups"));
        assert!(config.stage_paths(Stage::TraderBase).is_empty());
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let err = FixerConfig::from_json_str("{ \"assortPaths\": 3 }").expect_err("invalid");
        assert_eq!(err.code, CoreErrorCode::Config);
    }
}
