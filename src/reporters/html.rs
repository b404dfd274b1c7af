use std::fs;
use std::path::Path;

use crate::error::AuditError;
use crate::types::{AuditReport, RecommendationStatus};

pub fn report_html(report: &AuditReport, output_file: &Path) -> Result<(), AuditError> {
    let html = build_html(report);
    fs::write(output_file, &html)
        .map_err(|e| AuditError::Report(format!("Failed to write {}: {e}", output_file.display())))?;
    eprintln!("✓ HTML report written to {}", output_file.display());
    Ok(())
}

fn build_html(report: &AuditReport) -> String {
    let endpoint = &report.endpoint;
    let runtime = &report.runtime_usage;
    let code = &report.code_usage;
    let status = report.recommendation.status;

    let occurrences = match (runtime.enabled, runtime.total_occurrences) {
        (true, Some(n)) => n.to_string(),
        _ => "n/a".to_string(),
    };

    let handler_rows: String = [
        ("Controller", endpoint.controller.as_deref()),
        ("Handler method", endpoint.handler_method.as_deref()),
    ]
    .iter()
    .filter_map(|(label, value)| value.map(|v| format!("<tr><th>{label}</th><td class=\"path\">{}</td></tr>", esc(v))))
    .collect();

    let template = match &report.log_extraction.template_parts {
        Some(parts) if report.log_extraction.extracted && !parts.is_empty() => parts
            .iter()
            .map(|p| format!("<code>{}</code>", esc(p)))
            .collect::<Vec<_>>()
            .join(" <span class=\"dim\">…</span> "),
        Some(_) if report.log_extraction.extracted => "<span class=\"dim\">placeholders only</span>".to_string(),
        _ => "<span class=\"warn\">extraction failed</span>".to_string(),
    };

    let runtime_section = if runtime.enabled {
        format!(
            "<table><thead><tr><th>Provider</th><th>Time Window</th><th style=\"text-align:right\">Occurrences</th></tr></thead>\
             <tbody><tr><td>{}</td><td>{} days</td><td class=\"num\">{occurrences}</td></tr></tbody></table>\
             <p class=\"dim\">Query: <code>{}</code></p>",
            esc(runtime.provider.as_deref().unwrap_or("N/A")),
            runtime.days,
            esc(runtime.query.as_deref().unwrap_or("")),
        )
    } else {
        format!(
            "<p>Runtime analysis was not performed <span class=\"dim\">({})</span>.</p>",
            esc(runtime.skipped_reason.as_deref().unwrap_or("provider not enabled"))
        )
    };

    let file_rows: String = code
        .files
        .iter()
        .map(|f| format!("<tr><td class=\"path\">{}</td></tr>", esc(f)))
        .collect();
    let files_table = if file_rows.is_empty() {
        "<p class=\"dim\">No client file references the endpoint.</p>".to_string()
    } else {
        format!("<table><thead><tr><th>Files with references</th></tr></thead><tbody>{file_rows}</tbody></table>")
    };

    let warnings_section = if report.warnings.is_empty() {
        String::new()
    } else {
        let items: String = report.warnings.iter().map(|w| format!("<li>⚠ {}</li>", esc(w))).collect();
        format!("<div class=\"card warn-card\"><h2>Warnings</h2><ul>{items}</ul></div>")
    };

    let generated = report.metadata.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>endpoint-auditor report: {method} {path}</title>
  <style>
    *,*::before,*::after{{box-sizing:border-box;margin:0;padding:0}}
    body{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#0f172a;color:#e2e8f0;padding:2rem;font-size:14px;line-height:1.6}}
    h1{{font-size:1.75rem;font-weight:800}}
    h2{{font-size:1rem;font-weight:700;color:#94a3b8;text-transform:uppercase;letter-spacing:.06em;margin-bottom:1rem}}
    .meta{{color:#64748b;margin:.4rem 0 2rem;font-size:.8rem}} .meta span{{margin-right:1.5rem}}
    .stats{{display:grid;grid-template-columns:repeat(auto-fit,minmax(180px,1fr));gap:1rem;margin-bottom:1.5rem}}
    .stat{{background:#1e293b;border:1px solid #334155;border-radius:.625rem;padding:1rem 1.25rem}}
    .stat-label{{font-size:.7rem;text-transform:uppercase;letter-spacing:.06em;color:#64748b}}
    .stat-value{{font-size:2rem;font-weight:800;margin-top:.2rem}}
    .stat-value.blue{{color:#60a5fa}} .stat-value.slate{{color:#94a3b8}}
    .card{{background:#1e293b;border:1px solid #334155;border-radius:.75rem;padding:1.5rem;margin-bottom:1.5rem}}
    .warn-card{{border-color:#eab308}} .warn-card li{{list-style:none;color:#fde047}}
    .verdict{{border-width:2px}} .verdict p{{color:#cbd5e1;margin-top:.5rem}}
    table{{width:100%;border-collapse:collapse}}
    th{{text-align:left;padding:.5rem .75rem;border-bottom:2px solid #334155;font-size:.7rem;font-weight:700;text-transform:uppercase;letter-spacing:.06em;color:#64748b}}
    td{{padding:.5rem .75rem;border-bottom:1px solid #1a2744;vertical-align:middle}}
    tr:last-child td{{border-bottom:none}}
    td.path{{font-family:'JetBrains Mono','Fira Code',ui-monospace,monospace;font-size:.78rem;color:#7dd3fc;word-break:break-all}}
    td.num{{text-align:right;color:#94a3b8}}
    code{{font-family:'JetBrains Mono','Fira Code',ui-monospace,monospace;background:#0b1222;padding:.1rem .35rem;border-radius:.25rem;color:#7dd3fc}}
    .dim{{color:#475569;font-size:.9em}} .warn{{color:#fbbf24;font-weight:600}}
    .badge{{display:inline-block;padding:.25rem .75rem;border-radius:999px;font-size:.85rem;font-weight:700;white-space:nowrap}}
    .badge-runtime{{background:rgba(239,68,68,.15);color:#fca5a5}}
    .badge-referenced{{background:rgba(234,179,8,.15);color:#fde047}}
    .badge-candidate{{background:rgba(34,197,94,.15);color:#86efac}}
    .footer{{text-align:center;color:#334155;font-size:.75rem;margin-top:2rem}}
  </style>
</head>
<body>
  <h1>Endpoint Deprecation Audit</h1>
  <p class="meta">
    <span>Endpoint: <strong>{method} {path}</strong></span>
    <span>Generated: <strong>{generated}</strong></span>
  </p>
  <div class="card verdict" style="border-color:{color}">
    <h2>Recommendation</h2>
    {badge}
    <p>{rationale}</p>
  </div>
  <div class="stats">
    <div class="stat"><div class="stat-label">Runtime Occurrences</div><div class="stat-value blue">{occurrences}</div></div>
    <div class="stat"><div class="stat-label">Code Matches</div><div class="stat-value slate">{matches}</div></div>
    <div class="stat"><div class="stat-label">Files With References</div><div class="stat-value slate">{file_count}</div></div>
    <div class="stat"><div class="stat-label">Projects Scanned</div><div class="stat-value slate">{project_count}</div></div>
  </div>
  <div class="card">
    <h2>Log Extraction</h2>
    <table><tbody>{handler_rows}<tr><th>Template</th><td>{template}</td></tr></tbody></table>
  </div>
  <div class="card"><h2>Runtime Usage</h2>{runtime_section}</div>
  <div class="card"><h2>Code Usage</h2>{files_table}</div>
  {warnings_section}
  <p class="footer">Generated by endpoint-auditor v{version} on {generated}</p>
</body>
</html>"#,
        method = endpoint.http_method,
        path = esc(&endpoint.path),
        generated = generated,
        color = status_color(status),
        badge = status_badge(status),
        rationale = esc(&report.recommendation.rationale),
        occurrences = occurrences,
        matches = code.matches_count,
        file_count = code.files.len(),
        project_count = code.projects_paths.len(),
        handler_rows = handler_rows,
        template = template,
        runtime_section = runtime_section,
        files_table = files_table,
        warnings_section = warnings_section,
        version = esc(&report.metadata.version),
    )
}

fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn status_color(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::RuntimeUsageDetected    => "#ef4444",
        RecommendationStatus::StillReferencedInCode   => "#eab308",
        RecommendationStatus::CandidateForDeprecation => "#22c55e",
    }
}

fn status_badge(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::RuntimeUsageDetected    => "<span class=\"badge badge-runtime\">🔴 Runtime Usage Detected</span>",
        RecommendationStatus::StillReferencedInCode   => "<span class=\"badge badge-referenced\">🟡 Still Referenced in Code</span>",
        RecommendationStatus::CandidateForDeprecation => "<span class=\"badge badge-candidate\">🟢 Candidate for Deprecation</span>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::assemble_report;
    use crate::types::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn report() -> AuditReport {
        assemble_report(
            &EndpointDescriptor::new("/search?q=<b>", HttpMethod::Get).with_handler("search"),
            LogExtraction::extracted(vec!["Searching for <term>".to_string()]),
            RuntimeUsage::measured("Graylog", 30, "\"Searching for <term>\"".to_string(), 0),
            CodeUsage {
                projects_paths: vec!["/repo".to_string()],
                matches_count: 1,
                files: BTreeSet::from(["/repo/O'BrienClient.java".to_string()]),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_user_text_is_escaped() {
        let html = build_html(&report());
        assert!(html.contains("/search?q=&lt;b&gt;"));
        assert!(html.contains("<code>Searching for &lt;term&gt;</code>"));
        assert!(html.contains("/repo/O&#x27;BrienClient.java"));
        assert!(!html.contains("<term>"));
    }

    #[test]
    fn test_verdict_and_counts() {
        let html = build_html(&report());
        assert!(html.contains("badge-referenced"));
        assert!(html.contains("<td class=\"path\">search</td>"));
        assert!(html.contains("<td class=\"num\">0</td>"));
        assert!(!html.contains("Warnings"));
    }

    #[test]
    fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.html");
        report_html(&report(), &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
