use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::time::Duration;

use crate::config::JiraSettings;
use crate::error::AuditError;
use crate::reporters::jira_wiki;
use crate::types::AuditReport;

static ISSUE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*-\d+$").expect("issue key regex"));

/// Destination for audit report comments.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn add_comment(&self, issue_key: &str, markup: &str) -> Result<(), AuditError>;
}

/// Jira REST v2 client authenticated with an account email and API token.
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    token: String,
}

impl JiraClient {
    pub fn new(settings: &JiraSettings) -> Result<Self, AuditError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuditError::IssueTracker(format!("Failed to initialize Jira client: {e}")))?;
        Ok(JiraClient {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            email: settings.email.clone(),
            token: settings.token.clone(),
        })
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn add_comment(&self, issue_key: &str, markup: &str) -> Result<(), AuditError> {
        if !ISSUE_KEY.is_match(issue_key) {
            return Err(AuditError::IssueTracker(format!("Invalid issue key: \"{issue_key}\"")));
        }
        let url = format!("{}/rest/api/2/issue/{issue_key}/comment", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.email, Some(&self.token))
            .json(&json!({ "body": markup }))
            .send()
            .await
            .map_err(|e| AuditError::IssueTracker(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AuditError::IssueTracker(format!(
                "Posting comment to {issue_key} failed with HTTP {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }
        tracing::info!(issue = issue_key, "audit report posted");
        Ok(())
    }
}

/// Renders `report` as wiki markup and posts it on `issue_key`.
pub async fn post_report(
    tracker: &dyn IssueTracker,
    issue_key: &str,
    report: &AuditReport,
) -> Result<(), AuditError> {
    tracker.add_comment(issue_key, &jira_wiki::render(report)).await
}
