use crate::types::{AuditReport, CodeUsage, LogExtraction, RecommendationStatus, RuntimeUsage};

fn status_icon(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::CandidateForDeprecation => "(/)",
        RecommendationStatus::StillReferencedInCode   => "(warning)",
        RecommendationStatus::RuntimeUsageDetected    => "(x)",
    }
}

/// Jira wiki markup for an issue comment.
pub fn render(report: &AuditReport) -> String {
    let status = report.recommendation.status;
    let icon = status_icon(status);

    let mut sections = vec![
        format!("h2. {icon} Endpoint Deprecation Audit Report"),
        String::new(),
        format!("*Endpoint:* {{{{{} {}}}}}", report.endpoint.http_method, report.endpoint.path),
        format!("*Recommendation:* {icon} *{}*", status.label()),
        format!("_{}_", report.recommendation.rationale),
        String::new(),
        runtime_section(&report.runtime_usage),
        code_usage_section(&report.code_usage),
        log_extraction_section(&report.log_extraction),
    ];

    if !report.warnings.is_empty() {
        let mut lines = vec!["h3. Warnings".to_string()];
        lines.extend(report.warnings.iter().map(|w| format!("* (warning) {w}")));
        sections.push(lines.join("\n"));
    }

    sections.push(format!(
        "\n----\n_Generated at {} | endpoint-deprecation-auditor v{}_",
        report.metadata.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        report.metadata.version,
    ));

    sections.join("\n")
}

fn runtime_section(runtime: &RuntimeUsage) -> String {
    if !runtime.enabled {
        let reason = runtime.skipped_reason.as_deref().unwrap_or("provider not enabled");
        return format!("h3. Runtime Usage\nRuntime analysis was not performed ({reason}).");
    }
    format!(
        "h3. Runtime Usage\n||Provider||Time Window||Occurrences||\n|{}|{} days|{}|",
        runtime.provider.as_deref().unwrap_or("N/A"),
        runtime.days,
        runtime.total_occurrences.unwrap_or(0),
    )
}

fn code_usage_section(code: &CodeUsage) -> String {
    let mut lines = vec![
        "h3. Code Usage (Static Analysis)".to_string(),
        format!("*Projects scanned:* {}", code.projects_paths.len()),
        format!("*Matches found:* {}", code.matches_count),
    ];
    if !code.files.is_empty() {
        lines.push("*Files with references:*".to_string());
        lines.extend(code.files.iter().map(|f| format!("* {{{{{f}}}}}")));
    }
    lines.join("\n")
}

fn log_extraction_section(extraction: &LogExtraction) -> String {
    match &extraction.template_parts {
        Some(parts) if extraction.extracted => {
            let template = if parts.is_empty() { "N/A".to_string() } else { parts.join(" ... ") };
            format!("h3. Log Extraction\n*Template:* {{{{{template}}}}}")
        }
        _ => "h3. Log Extraction\n(warning) Log template extraction failed.".to_string(),
    }
}
