use std::fmt::Write as _;
use std::path::Path;

use mongofix_core::core_api::{
    CoreError, CoreErrorCode, FileReport, RenameAudit, RunReport, StageReport, StageStatus,
};
use serde_json::{Map as JsonMap, Value as JsonValue};

const STAGE_COL_WIDTH: usize = 15;
const STATUS_COL_WIDTH: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    #[default]
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// List every processed file and every rename pair.
    pub verbose: bool,
}

pub fn render_json_report(report: &RunReport, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(report_json(report)),
    }
}

/// The `[old, new]` pairs of one namespace, as written to the audit file.
pub fn render_json_audit(audit: &RenameAudit) -> JsonValue {
    JsonValue::Array(
        audit
            .pairs
            .iter()
            .map(|(old, new)| {
                JsonValue::Array(vec![
                    JsonValue::String(old.clone()),
                    JsonValue::String(new.clone()),
                ])
            })
            .collect(),
    )
}

pub fn render_text(report: &RunReport, style: TextStyle) -> String {
    render_text_with_options(report, style, TextRenderOptions::default())
}

pub fn render_text_with_options(
    report: &RunReport,
    style: TextStyle,
    options: TextRenderOptions,
) -> String {
    match style {
        TextStyle::Summary => render_summary(report, options),
    }
}

fn report_json(report: &RunReport) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    out.insert(
        "run_dir".to_string(),
        report
            .run_dir
            .as_deref()
            .map_or(JsonValue::Null, path_to_json),
    );
    out.insert("success".to_string(), JsonValue::Bool(report.is_success()));
    out.insert(
        "stages".to_string(),
        JsonValue::Array(report.stages.iter().map(stage_to_json).collect()),
    );
    out.insert(
        "diagnostics".to_string(),
        JsonValue::Array(report.diagnostics.iter().map(error_to_json).collect()),
    );
    out.insert(
        "renames".to_string(),
        JsonValue::Array(report.renames.iter().map(audit_to_json).collect()),
    );
    out
}

fn stage_to_json(stage: &StageReport) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "stage".to_string(),
        JsonValue::String(stage.stage.as_str().to_string()),
    );
    m.insert(
        "status".to_string(),
        JsonValue::String(status_name(stage.status).to_string()),
    );
    m.insert("remapped".to_string(), JsonValue::from(stage.remapped()));
    m.insert("references".to_string(), JsonValue::from(stage.references()));
    m.insert(
        "files".to_string(),
        JsonValue::Array(stage.files.iter().map(file_to_json).collect()),
    );
    m.insert(
        "error".to_string(),
        stage.error.as_ref().map_or(JsonValue::Null, error_to_json),
    );
    JsonValue::Object(m)
}

fn file_to_json(file: &FileReport) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("path".to_string(), path_to_json(&file.path));
    m.insert("backup".to_string(), path_to_json(&file.backup));
    m.insert("remapped".to_string(), JsonValue::from(file.remapped));
    m.insert("references".to_string(), JsonValue::from(file.references));
    m.insert("unresolved".to_string(), JsonValue::from(file.unresolved));
    JsonValue::Object(m)
}

fn error_to_json(error: &CoreError) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "code".to_string(),
        JsonValue::String(code_name(error.code).to_string()),
    );
    m.insert(
        "message".to_string(),
        JsonValue::String(error.message.clone()),
    );
    m.insert(
        "file".to_string(),
        error.file.as_deref().map_or(JsonValue::Null, path_to_json),
    );
    m.insert(
        "id".to_string(),
        error.id.clone().map_or(JsonValue::Null, JsonValue::String),
    );
    m.insert(
        "field".to_string(),
        error.field.clone().map_or(JsonValue::Null, JsonValue::String),
    );
    JsonValue::Object(m)
}

fn audit_to_json(audit: &RenameAudit) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "namespace".to_string(),
        JsonValue::String(audit.namespace.as_str().to_string()),
    );
    m.insert("path".to_string(), path_to_json(&audit.path));
    m.insert("count".to_string(), JsonValue::from(audit.pairs.len()));
    m.insert("pairs".to_string(), render_json_audit(audit));
    JsonValue::Object(m)
}

fn path_to_json(path: &Path) -> JsonValue {
    JsonValue::String(path.display().to_string())
}

fn status_name(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Disabled => "disabled",
        StageStatus::Completed => "completed",
        StageStatus::Aborted => "aborted",
    }
}

fn code_name(code: CoreErrorCode) -> &'static str {
    match code {
        CoreErrorCode::FileNotFound => "FileNotFound",
        CoreErrorCode::Parse => "Parse",
        CoreErrorCode::UnresolvedReference => "UnresolvedReference",
        CoreErrorCode::PersistenceFailure => "PersistenceFailure",
        CoreErrorCode::InternalConsistency => "InternalConsistency",
        CoreErrorCode::Config => "Config",
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}

fn render_summary(report: &RunReport, options: TextRenderOptions) -> String {
    let mut out = String::new();

    let header = match report.run_dir.as_deref() {
        Some(dir) => format!("Backups: {}", dir.display()),
        None => "Fixer disabled, nothing was changed.".to_string(),
    };
    writeln!(&mut out, "{header}").expect("writing to String cannot fail");
    writeln!(&mut out).expect("writing to String cannot fail");

    for stage in &report.stages {
        let counts = match stage.status {
            StageStatus::Disabled => String::new(),
            _ => format!(
                "{}, {} remapped, {}",
                plural(stage.files.len(), "file", "files"),
                stage.remapped(),
                plural(stage.references(), "reference", "references"),
            ),
        };
        let line = format!(
            "  {:<stage_w$}{:<status_w$}{}",
            stage.stage.as_str(),
            status_name(stage.status),
            counts,
            stage_w = STAGE_COL_WIDTH,
            status_w = STATUS_COL_WIDTH,
        );
        writeln!(&mut out, "{}", line.trim_end()).expect("writing to String cannot fail");

        if options.verbose {
            for file in &stage.files {
                writeln!(
                    &mut out,
                    "    {} ({} remapped, {} references, {} unresolved)",
                    file.path.display(),
                    file.remapped,
                    file.references,
                    file.unresolved
                )
                .expect("writing to String cannot fail");
            }
        }
        if let Some(error) = &stage.error {
            writeln!(&mut out, "    aborted: {error}").expect("writing to String cannot fail");
        }
    }

    if !report.renames.is_empty() {
        writeln!(&mut out).expect("writing to String cannot fail");
        writeln!(&mut out, "Renames:").expect("writing to String cannot fail");
        for audit in &report.renames {
            writeln!(
                &mut out,
                "  {:<stage_w$}{:<6} -> {}",
                audit.namespace.as_str(),
                audit.pairs.len(),
                audit.path.display(),
                stage_w = STAGE_COL_WIDTH,
            )
            .expect("writing to String cannot fail");
            if options.verbose {
                for (old, new) in &audit.pairs {
                    writeln!(&mut out, "    {old} -> {new}")
                        .expect("writing to String cannot fail");
                }
            }
        }
    }

    if !report.diagnostics.is_empty() {
        writeln!(&mut out).expect("writing to String cannot fail");
        writeln!(
            &mut out,
            "Unresolved references: {}",
            report.diagnostics.len()
        )
        .expect("writing to String cannot fail");
        for diagnostic in &report.diagnostics {
            writeln!(&mut out, "  {diagnostic}").expect("writing to String cannot fail");
        }
    }

    writeln!(&mut out).expect("writing to String cannot fail");
    let result = if report.is_success() {
        "OK"
    } else {
        "INCOMPLETE"
    };
    writeln!(&mut out, "Result: {result}").expect("writing to String cannot fail");
    out
}
