pub mod html;
pub mod jira_wiki;
pub mod json;
pub mod markdown;
pub mod terminal;

use std::path::{Path, PathBuf};

use crate::config::OutputFormat;
use crate::error::AuditError;
use crate::types::{AuditReport, EndpointSummary};

/// `POST /v1/users/verify` → `post-v1-users-verify`.
pub fn slug(endpoint: &EndpointSummary) -> String {
    let raw = format!("{} {}", endpoint.http_method, endpoint.path).to_ascii_lowercase();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// `<dir>/endpoint-audit-<slug>.<ext>`, or `None` for terminal output.
pub fn output_file(dir: &Path, report: &AuditReport, format: OutputFormat) -> Option<PathBuf> {
    let ext = format.extension()?;
    Some(dir.join(format!("endpoint-audit-{}.{ext}", slug(&report.endpoint))))
}

/// Renders `report` in `format`. Returns the written file, if any.
///
/// HTML always goes to a file: `output_dir`, else the desktop, else the
/// working directory. JSON and Markdown go to stdout without `output_dir`.
pub fn emit(
    report: &AuditReport,
    format: OutputFormat,
    output_dir: Option<&Path>,
) -> Result<Option<PathBuf>, AuditError> {
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| AuditError::Report(format!("Cannot create output directory {}: {e}", dir.display())))?;
    }
    let target = |dir: &Path| output_file(dir, report, format);

    match format {
        OutputFormat::Terminal => {
            terminal::report_terminal(report);
            Ok(None)
        }
        OutputFormat::Json => {
            let path = output_dir.and_then(target);
            json::report_json(report, path.as_deref())?;
            Ok(path)
        }
        OutputFormat::Markdown => {
            let path = output_dir.and_then(target);
            markdown::report_markdown(report, path.as_deref())?;
            Ok(path)
        }
        OutputFormat::Html => {
            let dir = output_dir
                .map(Path::to_path_buf)
                .or_else(dirs::desktop_dir)
                .unwrap_or_else(|| PathBuf::from("."));
            let path = target(&dir)
                .ok_or_else(|| AuditError::Report("html output has no file extension".to_string()))?;
            html::report_html(report, &path)?;
            Ok(Some(path))
        }
    }
}
