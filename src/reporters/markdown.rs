use std::fmt::Write as _;
use std::path::Path;

use crate::error::AuditError;
use crate::types::AuditReport;

pub fn report_markdown(report: &AuditReport, output_file: Option<&Path>) -> Result<(), AuditError> {
    let text = render(report);
    match output_file {
        Some(path) => {
            std::fs::write(path, &text)
                .map_err(|e| AuditError::Report(format!("Failed to write {}: {e}", path.display())))?;
            eprintln!("✓ Markdown report written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

pub fn render(report: &AuditReport) -> String {
    let mut out = String::new();
    let endpoint = &report.endpoint;
    let runtime = &report.runtime_usage;
    let code = &report.code_usage;

    // `write!` into a String cannot fail.
    let _ = writeln!(out, "# Endpoint Deprecation Audit: `{} {}`\n", endpoint.http_method, endpoint.path);
    let _ = writeln!(out, "**Recommendation:** {}  ", report.recommendation.status.label());
    let _ = writeln!(out, "_{}_\n", report.recommendation.rationale);

    if endpoint.controller.is_some() || endpoint.handler_method.is_some() {
        out.push_str("## Handler\n\n");
        if let Some(controller) = &endpoint.controller {
            let _ = writeln!(out, "- Controller: `{controller}`");
        }
        if let Some(handler) = &endpoint.handler_method {
            let _ = writeln!(out, "- Method: `{handler}`");
        }
        out.push('\n');
    }

    out.push_str("## Log Extraction\n\n");
    match &report.log_extraction.template_parts {
        Some(parts) if report.log_extraction.extracted => {
            if parts.is_empty() {
                out.push_str("Message contains only placeholders.\n\n");
            } else {
                let quoted: Vec<String> = parts.iter().map(|p| format!("`{p}`")).collect();
                let _ = writeln!(out, "Template: {}\n", quoted.join(" … "));
            }
        }
        _ => out.push_str("Log template extraction failed.\n\n"),
    }

    out.push_str("## Runtime Usage\n\n");
    if runtime.enabled {
        out.push_str("| Provider | Time Window | Occurrences |\n|---|---|---|\n");
        let _ = writeln!(
            out,
            "| {} | {} days | {} |\n",
            runtime.provider.as_deref().unwrap_or("N/A"),
            runtime.days,
            runtime.total_occurrences.unwrap_or(0),
        );
        if let Some(query) = runtime.query.as_deref().filter(|q| !q.is_empty()) {
            let _ = writeln!(out, "Query: `{query}`\n");
        }
    } else {
        let reason = runtime.skipped_reason.as_deref().unwrap_or("provider not enabled");
        let _ = writeln!(out, "Runtime analysis was not performed ({reason}).\n");
    }

    out.push_str("## Code Usage\n\n");
    let _ = writeln!(out, "- Projects scanned: {}", code.projects_paths.len());
    for root in &code.projects_paths {
        let _ = writeln!(out, "  - `{root}`");
    }
    let _ = writeln!(out, "- Matches found: {}\n", code.matches_count);
    if !code.files.is_empty() {
        out.push_str("Files with references:\n\n");
        for file in &code.files {
            let _ = writeln!(out, "- `{file}`");
        }
        out.push('\n');
    }

    if !report.warnings.is_empty() {
        out.push_str("## Warnings\n\n");
        for warning in &report.warnings {
            let _ = writeln!(out, "- ⚠ {warning}");
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "---\n_Generated at {} by endpoint-auditor v{}_",
        report.metadata.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        report.metadata.version,
    );
    out
}
