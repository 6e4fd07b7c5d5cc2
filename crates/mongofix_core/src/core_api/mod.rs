mod config;
mod engine;
mod error;
mod types;

pub use config::FixerConfig;
pub use engine::Engine;
pub use error::{CoreError, CoreErrorCode};
pub use types::{FileReport, RenameAudit, RunReport, Stage, StageReport, StageStatus};
