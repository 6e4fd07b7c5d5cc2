use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser};
use mongofix_core::core_api::{CoreError, CoreErrorCode, Engine, FixerConfig};
use mongofix_core::store::FsStore;
use mongofix_render::{
    JsonStyle, TextRenderOptions, TextStyle, render_json_report, render_text_with_options,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;

/// Replaces non-canonical ids in trader mod data with 24 hex character ids
/// and rewrites every reference to them.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file; relative paths inside it resolve against its directory.
    #[arg(long, value_name = "PATH", default_value = "config.json")]
    config: PathBuf,
    /// Overrides `folderPath`.
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,
    /// Overrides `backupPath`.
    #[arg(long = "backup-dir", value_name = "DIR")]
    backup_dir: Option<PathBuf>,
    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,
    /// More logging (-v debug, -vv trace). Also lists files and renames in the summary.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_filter(&self) -> EnvFilter {
        let forced = match (self.quiet, self.verbose) {
            (true, _) => Some("warn"),
            (false, 0) => None,
            (false, 1) => Some("debug"),
            (false, _) => Some("trace"),
        };
        match forced {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli).unwrap_or_else(|e| {
        eprintln!("Error loading configuration {}: {e}", cli.config.display());
        process::exit(EXIT_USAGE);
    });
    debug!(?config, "configuration loaded");

    let engine = Engine::new(config);
    let report = engine.run(&mut FsStore::new()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(EXIT_FAILURE);
    });

    if cli.json {
        let json = render_json_report(&report, JsonStyle::CanonicalV1);
        let rendered = serde_json::to_string_pretty(&json).unwrap_or_else(|e| {
            eprintln!("Error rendering JSON output: {e}");
            process::exit(EXIT_FAILURE);
        });
        println!("{rendered}");
    } else {
        let options = TextRenderOptions {
            verbose: cli.verbose > 0,
        };
        print!(
            "{}",
            render_text_with_options(&report, TextStyle::Summary, options)
        );
    }

    if !report.is_success() {
        process::exit(EXIT_FAILURE);
    }
}

fn load_config(cli: &Cli) -> Result<FixerConfig, CoreError> {
    let text = fs::read_to_string(&cli.config).map_err(|e| {
        CoreError::new(CoreErrorCode::Config, format!("cannot read config: {e}"))
            .with_file(&cli.config)
    })?;
    let mut config = FixerConfig::from_json_str(&text).map_err(|e| e.with_file(&cli.config))?;

    let base = match cli.config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    config.rebase(base);

    if let Some(root) = &cli.root {
        config.folder_path = root.clone();
    }
    if let Some(backup_dir) = &cli.backup_dir {
        config.backup_path = backup_dir.clone();
    }
    Ok(config)
}
