use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};

use crate::types::{AuditReport, RecommendationStatus};

pub fn report_terminal(report: &AuditReport) {
    let endpoint = &report.endpoint;
    let runtime = &report.runtime_usage;
    let code = &report.code_usage;

    eprintln!();
    println!(
        "{} {} {}",
        "🔎 endpoint-auditor".cyan().bold(),
        endpoint.http_method.to_string().bright_black(),
        endpoint.path.bold(),
    );
    if let (Some(controller), Some(handler)) = (&endpoint.controller, &endpoint.handler_method) {
        println!("   handler {} in {}", handler.cyan(), controller.bright_black());
    }
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["SIGNAL", "RESULT", "DETAIL"]);

    let template = match &report.log_extraction.template_parts {
        Some(parts) if report.log_extraction.extracted && !parts.is_empty() => parts.join(" … "),
        Some(_) if report.log_extraction.extracted => "(placeholders only)".to_string(),
        _ => String::new(),
    };
    table.add_row(vec![
        Cell::new("Log template"),
        if report.log_extraction.extracted {
            Cell::new("extracted").fg(Color::Green)
        } else {
            Cell::new("failed").fg(Color::Yellow)
        },
        Cell::new(truncate(&template, 60)),
    ]);

    table.add_row(match (runtime.enabled, runtime.total_occurrences) {
        (true, Some(n)) => vec![
            Cell::new(format!("Runtime ({} days)", runtime.days)),
            count_cell(n as usize, Color::Red),
            Cell::new(runtime.provider.as_deref().unwrap_or("N/A")),
        ],
        _ => vec![
            Cell::new(format!("Runtime ({} days)", runtime.days)),
            Cell::new("not measured").fg(Color::DarkGrey),
            Cell::new(truncate(runtime.skipped_reason.as_deref().unwrap_or(""), 60)),
        ],
    });

    table.add_row(vec![
        Cell::new("Code references"),
        count_cell(code.matches_count, Color::Yellow),
        Cell::new(format!(
            "{} file{} in {} project{}",
            code.files.len(),
            if code.files.len() == 1 { "" } else { "s" },
            code.projects_paths.len(),
            if code.projects_paths.len() == 1 { "" } else { "s" },
        )),
    ]);

    println!("{table}");

    if !code.files.is_empty() {
        println!();
        println!("{}", "📄 Files with references:".cyan());
        for file in &code.files {
            println!("    {} {}", "•".white(), file.bright_black());
        }
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("{} {}", "⚠".yellow(), warning.yellow());
        }
    }

    println!();
    let status = report.recommendation.status;
    let label = match status {
        RecommendationStatus::RuntimeUsageDetected    => format!("🔴 {}", status.label()).red().bold(),
        RecommendationStatus::StillReferencedInCode   => format!("🟡 {}", status.label()).yellow().bold(),
        RecommendationStatus::CandidateForDeprecation => format!("🟢 {}", status.label()).green().bold(),
    };
    println!("{} {}", "💡 Recommendation:".cyan(), label);
    println!("   {}", report.recommendation.rationale.bright_black());
    println!();
}

/// Plain text + native cell colour so comfy-table measures the visible width.
fn count_cell(n: usize, hit: Color) -> Cell {
    if n > 0 {
        Cell::new(n.to_string()).fg(hit).add_attribute(Attribute::Bold)
    } else {
        Cell::new("0").fg(Color::Green)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max - 1).collect();
    format!("{kept}…")
}
