use chrono::{DateTime, Utc};

use crate::types::*;

pub const RUNTIME_USAGE_RATIONALE: &str =
    "Runtime log occurrences were detected in the specified time range.";
pub const CODE_REFERENCE_RATIONALE: &str =
    "Static references to the endpoint were found in the scanned codebases.";
pub const CANDIDATE_RATIONALE: &str =
    "No runtime usage detected and no static references found in scanned codebases.";

pub const EXTRACTION_WARNING: &str = "Problems while extracting logs: Skipping log analysis";
pub const RUNTIME_WARNING: &str = "Problems while connecting to log extractor: Skipping log analysis";

/// Fuses the runtime and static signals into one status. First rule wins:
/// measured runtime occurrences, then code references, else a candidate.
pub fn recommend(runtime: &RuntimeUsage, code: &CodeUsage) -> Recommendation {
    let (status, rationale) = if runtime.enabled && runtime.total_occurrences.unwrap_or(0) > 0 {
        (RecommendationStatus::RuntimeUsageDetected, RUNTIME_USAGE_RATIONALE)
    } else if code.matches_count > 0 {
        (RecommendationStatus::StillReferencedInCode, CODE_REFERENCE_RATIONALE)
    } else {
        (RecommendationStatus::CandidateForDeprecation, CANDIDATE_RATIONALE)
    };
    Recommendation { status, rationale: rationale.to_string() }
}

/// One warning per degraded input; independent of the recommendation.
pub fn warnings(extraction: &LogExtraction, runtime: &RuntimeUsage) -> Vec<String> {
    let mut out = Vec::new();
    if !extraction.extracted {
        out.push(EXTRACTION_WARNING.to_string());
    }
    if !runtime.enabled {
        out.push(RUNTIME_WARNING.to_string());
    }
    out
}

/// Assembles the final report stamped with `generated_at`.
pub fn assemble_report(
    endpoint: &EndpointDescriptor,
    log_extraction: LogExtraction,
    runtime_usage: RuntimeUsage,
    code_usage: CodeUsage,
    generated_at: DateTime<Utc>,
) -> AuditReport {
    let recommendation = recommend(&runtime_usage, &code_usage);
    let warnings = warnings(&log_extraction, &runtime_usage);
    AuditReport {
        metadata: ReportMeta {
            generated_at,
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        endpoint: EndpointSummary::from(endpoint),
        log_extraction,
        runtime_usage,
        code_usage,
        recommendation,
        warnings,
    }
}
