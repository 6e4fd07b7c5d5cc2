use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::CoreError;
use crate::registry::Namespace;

/// Pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TraderBase,
    Catalogs,
    Quests,
    QuestAssorts,
    Locales,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::TraderBase,
        Self::Catalogs,
        Self::Quests,
        Self::QuestAssorts,
        Self::Locales,
    ];

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::TraderBase => "trader_base",
            Self::Catalogs => "catalogs",
            Self::Quests => "quests",
            Self::QuestAssorts => "quest_assorts",
            Self::Locales => "locales",
        }
    }

    /// Backup sub-directory for documents of this stage.
    pub fn category(&self) -> &'static str {
        match *self {
            Self::TraderBase => "base",
            Self::Catalogs => "assort",
            Self::Quests => "quests",
            Self::QuestAssorts => "questassort",
            Self::Locales => "locales",
        }
    }

    pub fn document_kind(&self) -> &'static str {
        match *self {
            Self::TraderBase => "trader base",
            Self::Catalogs => "assort catalog",
            Self::Quests => "quest document",
            Self::QuestAssorts => "quest assort",
            Self::Locales => "locale table",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Disabled,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub backup: PathBuf,
    pub remapped: usize,
    pub references: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub files: Vec<FileReport>,
    /// Why the stage stopped early, for `Aborted` stages.
    pub error: Option<CoreError>,
}

impl StageReport {
    pub fn disabled(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Disabled,
            files: Vec::new(),
            error: None,
        }
    }

    pub fn remapped(&self) -> usize {
        self.files.iter().map(|f| f.remapped).sum()
    }

    pub fn references(&self) -> usize {
        self.files.iter().map(|f| f.references).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameAudit {
    pub namespace: Namespace,
    pub path: PathBuf,
    pub pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// `None` when the fixer is disabled and nothing was touched.
    pub run_dir: Option<PathBuf>,
    pub stages: Vec<StageReport>,
    pub diagnostics: Vec<CoreError>,
    pub renames: Vec<RenameAudit>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|s| s.status != StageStatus::Aborted)
    }

    pub fn renames_in(&self, namespace: Namespace) -> &[(String, String)] {
        self.renames
            .iter()
            .find(|audit| audit.namespace == namespace)
            .map(|audit| audit.pairs.as_slice())
            .unwrap_or(&[])
    }
}
