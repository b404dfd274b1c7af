use std::path::PathBuf;
use thiserror::Error;

use crate::types::HttpMethod;

/// Failures that abort an audit. Everything else degrades into report warnings.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Controller file not found: {}", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a @RestController class: {}", path.display())]
    NotAController { path: PathBuf },

    #[error("Http method not supported: {0}")]
    UnsupportedMethod(HttpMethod),

    #[error("Invalid HTTP method: \"{0}\". Expected one of GET, HEAD, POST, PUT, DELETE, CONNECT, OPTIONS, TRACE, PATCH")]
    InvalidHttpMethod(String),

    #[error("project path not found: {}", path.display())]
    ProjectPathNotFound { path: PathBuf },

    #[error("{0}")]
    Config(String),

    #[error("Report output failed: {0}")]
    Report(String),

    #[error("Issue tracker error: {0}")]
    IssueTracker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// True for the fatal misconfiguration class: bad roots, unreadable or
    /// non-controller sources, unsupported methods, invalid settings.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AuditError::SourceNotFound { .. }
                | AuditError::NotAController { .. }
                | AuditError::UnsupportedMethod(_)
                | AuditError::InvalidHttpMethod(_)
                | AuditError::ProjectPathNotFound { .. }
                | AuditError::Config(_)
        )
    }
}

/// Failures of the text-level handler lookup. The orchestrator promotes the
/// first two to [`AuditError`]; `HandlerNotFound` only degrades extraction.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocateError {
    #[error("Not a @RestController class")]
    NotAController,

    #[error("Http method not supported: {0}")]
    UnsupportedMethod(HttpMethod),

    #[error("Handler method not found for endpoint '{endpoint}' with HTTP method '{method}'")]
    HandlerNotFound { endpoint: String, method: HttpMethod },
}

/// Reason a runtime occurrence count could not be measured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("log platform integration is not enabled")]
    Disabled,

    #[error("Stream '{0}' not found")]
    StreamNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        QueryError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Malformed(e.to_string())
    }
}
