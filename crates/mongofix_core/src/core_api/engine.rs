use std::path::Path;

use chrono::Local;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::backup::{BackupManager, document_name};
use crate::documents::{
    CatalogDocument, CatalogRewriter, LocaleRewriter, LocaleTable, QuestAssortDocument,
    QuestAssortRewriter, QuestDocument, QuestRewriter, RewriteOutcome, TraderBase,
    TraderBaseRewriter, decode, encode,
};
use crate::ids::{IdSource, ObjectIdAllocator};
use crate::registry::{Namespace, Registries};
use crate::store::DocumentStore;

use super::config::FixerConfig;
use super::error::{CoreError, CoreErrorCode};
use super::types::{FileReport, RenameAudit, RunReport, Stage, StageReport, StageStatus};

const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Runs the enabled stages over a [`DocumentStore`].
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: FixerConfig,
}

impl Engine {
    pub fn new(config: FixerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FixerConfig {
        &self.config
    }

    pub fn run(&self, store: &mut dyn DocumentStore) -> Result<RunReport, CoreError> {
        let mut ids = ObjectIdAllocator::new();
        let run_timestamp = Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();
        self.run_with(store, &mut ids, &run_timestamp)
    }

    /// Like [`Engine::run`] with an explicit id source and backup run name.
    ///
    /// Returns `Err` only for fatal errors. Stages that could not load or
    /// parse a document are reported as [`StageStatus::Aborted`].
    pub fn run_with(
        &self,
        store: &mut dyn DocumentStore,
        ids: &mut dyn IdSource,
        run_timestamp: &str,
    ) -> Result<RunReport, CoreError> {
        if !self.config.enable_fixer {
            info!("fixer disabled, nothing to do");
            return Ok(RunReport {
                run_dir: None,
                stages: Stage::ALL.iter().map(|s| StageReport::disabled(*s)).collect(),
                diagnostics: Vec::new(),
                renames: Vec::new(),
            });
        }

        let backups = BackupManager::start(&self.config.backup_path, run_timestamp, store);
        info!(run_dir = %backups.run_dir().display(), "starting run");

        let mut run = Run {
            config: &self.config,
            store,
            ids,
            registries: Registries::new(),
            backups,
            diagnostics: Vec::new(),
        };

        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            if !self.config.stage_enabled(stage) {
                info!("{stage} stage disabled");
                stages.push(StageReport::disabled(stage));
                continue;
            }
            let report = match stage {
                Stage::TraderBase => run.stage(stage, |base: &mut TraderBase, regs, ids| {
                    TraderBaseRewriter::new(&mut regs.trader, ids).rewrite(base)
                })?,
                Stage::Catalogs => run.stage(stage, |catalog: &mut CatalogDocument, regs, ids| {
                    CatalogRewriter::new(&mut regs.catalog, ids).rewrite(catalog)
                })?,
                Stage::Quests => run.stage(stage, |quests: &mut QuestDocument, regs, ids| {
                    QuestRewriter::new(&mut regs.quest, &regs.trader, &regs.catalog, ids)
                        .rewrite(quests)
                })?,
                Stage::QuestAssorts => {
                    run.stage(stage, |assort: &mut QuestAssortDocument, regs, _| {
                        QuestAssortRewriter::new(&regs.quest, &regs.trader, &regs.catalog)
                            .rewrite(assort)
                    })?
                }
                Stage::Locales => {
                    // Without a completed quest stage the registry is partial,
                    // so unmapped keys may belong to quests never processed.
                    let quests_completed = stages.iter().any(|r: &StageReport| {
                        r.stage == Stage::Quests && r.status == StageStatus::Completed
                    });
                    if !quests_completed {
                        warn!(
                            "quest stage did not complete, keeping locale keys without a quest mapping"
                        );
                    }
                    run.stage(stage, |table: &mut LocaleTable, regs, _| {
                        let rewriter = LocaleRewriter::new(&regs.quest, &regs.trader);
                        if quests_completed {
                            rewriter.rewrite(table)
                        } else {
                            rewriter.lenient().rewrite(table)
                        }
                    })?
                }
            };
            stages.push(report);
        }

        let renames = run.write_audits()?;
        let run_dir = run.backups.run_dir().to_path_buf();
        let report = RunReport {
            run_dir: Some(run_dir),
            stages,
            diagnostics: run.diagnostics,
            renames,
        };
        info!(
            renames = report.renames.iter().map(|a| a.pairs.len()).sum::<usize>(),
            diagnostics = report.diagnostics.len(),
            "run finished"
        );
        Ok(report)
    }
}

struct Run<'a> {
    config: &'a FixerConfig,
    store: &'a mut dyn DocumentStore,
    ids: &'a mut dyn IdSource,
    registries: Registries,
    backups: BackupManager,
    diagnostics: Vec<CoreError>,
}

impl Run<'_> {
    fn stage<T, F>(&mut self, stage: Stage, mut rewrite: F) -> Result<StageReport, CoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T, &mut Registries, &mut dyn IdSource) -> Result<RewriteOutcome, CoreError>,
    {
        let mut report = StageReport {
            stage,
            status: StageStatus::Completed,
            files: Vec::new(),
            error: None,
        };

        let paths = self.config.stage_paths(stage);
        if paths.is_empty() {
            info!("no {} files configured", stage.document_kind());
        }

        for path in paths {
            match self.file::<T, F>(stage, &path, &mut rewrite) {
                Ok(file) => report.files.push(file),
                Err(err) if err.code.is_fatal() => {
                    error!("{err}");
                    return Err(err);
                }
                Err(err) => {
                    error!("{stage} stage aborted: {err}");
                    report.status = StageStatus::Aborted;
                    report.error = Some(err);
                    break;
                }
            }
        }
        Ok(report)
    }

    fn file<T, F>(
        &mut self,
        stage: Stage,
        path: &Path,
        rewrite: &mut F,
    ) -> Result<FileReport, CoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T, &mut Registries, &mut dyn IdSource) -> Result<RewriteOutcome, CoreError>,
    {
        let kind = stage.document_kind();
        let name = document_name(path)
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorCode::FileNotFound,
                    format!("{} does not name a .json {kind}", path.display()),
                )
                .with_file(path)
            })?
            .to_string();

        let original = self.store.load(path)?;
        let mut document: T = decode(original.clone(), kind).map_err(|e| e.with_file(path))?;

        let backup = self
            .backups
            .backup(&mut *self.store, stage.category(), &name, &original)?;

        let outcome = rewrite(&mut document, &mut self.registries, &mut *self.ids)
            .map_err(|e| e.with_file(path))?;

        let value = encode(&document, kind).map_err(|e| e.with_file(path))?;
        self.store.save(path, &value)?;
        info!(
            remapped = outcome.remapped,
            references = outcome.references,
            "New Id's written to {}",
            path.display()
        );

        let unresolved = outcome.diagnostics.len();
        for diagnostic in outcome.diagnostics {
            let diagnostic = match diagnostic.file {
                Some(_) => diagnostic,
                None => diagnostic.with_file(path),
            };
            self.diagnostics.push(diagnostic);
        }
        if unresolved > 0 {
            warn!(unresolved, "{} has unresolved references", path.display());
        }

        Ok(FileReport {
            path: path.to_path_buf(),
            backup,
            remapped: outcome.remapped,
            references: outcome.references,
            unresolved,
        })
    }

    fn write_audits(&mut self) -> Result<Vec<RenameAudit>, CoreError> {
        let mut audits = Vec::new();
        for namespace in Namespace::ALL {
            let registry = self.registries.get(namespace);
            if registry.is_empty() {
                continue;
            }
            let path = self.backups.write_audit(&mut *self.store, registry)?;
            audits.push(RenameAudit {
                namespace,
                path,
                pairs: registry
                    .pairs()
                    .map(|(old, new)| (old.to_string(), new.to_string()))
                    .collect(),
            });
        }
        Ok(audits)
    }
}
