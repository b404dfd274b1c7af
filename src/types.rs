use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::AuditError;

// ─── Endpoint ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get     => "GET",
            HttpMethod::Head    => "HEAD",
            HttpMethod::Post    => "POST",
            HttpMethod::Put     => "PUT",
            HttpMethod::Delete  => "DELETE",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace   => "TRACE",
            HttpMethod::Patch   => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = AuditError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET"     => Ok(HttpMethod::Get),
            "HEAD"    => Ok(HttpMethod::Head),
            "POST"    => Ok(HttpMethod::Post),
            "PUT"     => Ok(HttpMethod::Put),
            "DELETE"  => Ok(HttpMethod::Delete),
            "CONNECT" => Ok(HttpMethod::Connect),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE"   => Ok(HttpMethod::Trace),
            "PATCH"   => Ok(HttpMethod::Patch),
            _ => Err(AuditError::InvalidHttpMethod(raw.to_string())),
        }
    }
}

/// Where the handler's log message comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// A log line supplied verbatim by the caller.
    Message(String),
    /// A controller source file to locate the handler in and scan.
    Controller(std::path::PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    path: String,
    http_method: HttpMethod,
    controller_source: Option<String>,
    handler_method_name: Option<String>,
}

impl EndpointDescriptor {
    pub fn new(path: impl Into<String>, http_method: HttpMethod) -> Self {
        EndpointDescriptor {
            path: path.into(),
            http_method,
            controller_source: None,
            handler_method_name: None,
        }
    }

    pub fn with_controller(mut self, source: impl Into<String>) -> Self {
        self.controller_source = Some(source.into());
        self
    }

    pub fn with_handler(mut self, name: impl Into<String>) -> Self {
        self.handler_method_name = Some(name.into());
        self
    }

    pub fn path(&self) -> &str { &self.path }
    pub fn http_method(&self) -> HttpMethod { self.http_method }
    pub fn controller_source(&self) -> Option<&str> { self.controller_source.as_deref() }
    pub fn handler_method_name(&self) -> Option<&str> { self.handler_method_name.as_deref() }
}

// ─── Signals ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogExtraction {
    /// `None` iff `extracted` is false. May be an empty vector when the whole
    /// message was placeholders.
    pub template_parts: Option<Vec<String>>,
    pub extracted: bool,
}

impl LogExtraction {
    pub fn extracted(parts: Vec<String>) -> Self {
        LogExtraction { template_parts: Some(parts), extracted: true }
    }

    pub fn failed() -> Self {
        LogExtraction { template_parts: None, extracted: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeUsage {
    pub enabled: bool,
    pub provider: Option<String>,
    pub days: u32,
    pub query: Option<String>,
    /// `None` means "not measured"; `Some(0)` is a real measurement.
    pub total_occurrences: Option<u64>,
    pub skipped_reason: Option<String>,
}

impl RuntimeUsage {
    pub fn measured(provider: &str, days: u32, query: String, total: u64) -> Self {
        RuntimeUsage {
            enabled: true,
            provider: Some(provider.to_string()),
            days,
            query: Some(query),
            total_occurrences: Some(total),
            skipped_reason: None,
        }
    }

    pub fn not_measured(days: u32, reason: impl Into<String>) -> Self {
        RuntimeUsage {
            enabled: false,
            provider: None,
            days,
            query: None,
            total_occurrences: None,
            skipped_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUsage {
    pub projects_paths: Vec<String>,
    pub matches_count: usize,
    /// Sorted and deduplicated.
    pub files: BTreeSet<String>,
}

// ─── Recommendation ───────────────────────────────────────────────────────────

/// Declared in precedence order: the first applicable status wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    RuntimeUsageDetected,
    StillReferencedInCode,
    CandidateForDeprecation,
}

impl RecommendationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RecommendationStatus::RuntimeUsageDetected    => "Runtime Usage Detected",
            RecommendationStatus::StillReferencedInCode   => "Still Referenced in Code",
            RecommendationStatus::CandidateForDeprecation => "Candidate for Deprecation",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub status: RecommendationStatus,
    pub rationale: String,
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    #[serde(serialize_with = "rfc3339_seconds")]
    pub generated_at: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub path: String,
    pub http_method: HttpMethod,
    pub controller: Option<String>,
    pub handler_method: Option<String>,
}

impl From<&EndpointDescriptor> for EndpointSummary {
    fn from(e: &EndpointDescriptor) -> Self {
        EndpointSummary {
            path: e.path().to_string(),
            http_method: e.http_method(),
            controller: e.controller_source().map(str::to_string),
            handler_method: e.handler_method_name().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub metadata: ReportMeta,
    pub endpoint: EndpointSummary,
    pub log_extraction: LogExtraction,
    pub runtime_usage: RuntimeUsage,
    pub code_usage: CodeUsage,
    pub recommendation: Recommendation,
    pub warnings: Vec<String>,
}

fn rfc3339_seconds<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, false))
}
