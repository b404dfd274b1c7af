use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::AuditError;
use crate::filters::ClientFileFilter;

pub const DEFAULT_DAYS: u32 = 30;

/// All settings that can be placed in an endpoint-auditor YAML config file.
/// Every field is optional. Environment variables override the file and CLI
/// flags override both.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditorConfig {
    pub graylog: Option<GraylogSection>,
    pub jira: Option<JiraSection>,

    // Audit defaults (overridden by the corresponding CLI flag)
    pub projects_paths: Option<Vec<String>>,
    pub days: Option<u32>,
    pub format: Option<String>,
    pub output_dir: Option<String>,

    // Reference-scan candidate files
    pub exclude_dirs: Option<Vec<String>>,
    pub client_extensions: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraylogSection {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub mcp_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraSection {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
}

impl AuditorConfig {
    /// Validates semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(fmt) = &self.format {
            OutputFormat::from_str(fmt)?;
        }

        if let Some(0) = self.days {
            return Err("Invalid 'days' value: 0. Must be 1 or greater".to_string());
        }

        let urls = [
            ("graylog.base_url", self.graylog.as_ref().and_then(|g| g.base_url.as_ref())),
            ("graylog.mcp_url", self.graylog.as_ref().and_then(|g| g.mcp_url.as_ref())),
            ("jira.base_url", self.jira.as_ref().and_then(|j| j.base_url.as_ref())),
        ];
        for (name, url) in urls {
            if let Some(u) = url {
                validate_url(name, u)?;
            }
        }

        if let Some(paths) = &self.projects_paths {
            if paths.iter().any(|p| p.trim().is_empty()) {
                return Err("Invalid 'projects_paths': entries must not be empty".to_string());
            }
        }

        Ok(())
    }
}

fn validate_url(name: &str, url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!(
            "Invalid '{name}' value: \"{url}\". Expected an http:// or https:// URL"
        ))
    }
}

/// Reads, parses, and validates a YAML config file from `path`.
pub fn load_config(path: &Path) -> Result<AuditorConfig, AuditError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AuditError::Config(format!("Cannot read config file '{}': {e}", path.display())))?;
    let cfg: AuditorConfig = serde_yaml::from_str(&content)
        .map_err(|e| AuditError::Config(format!("Invalid config file '{}': {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| AuditError::Config(format!("Config file '{}': {e}", path.display())))?;
    Ok(cfg)
}

/// `<config dir>/endpoint-auditor/config.yml`, when it exists.
pub fn default_config_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("endpoint-auditor").join("config.yml");
    path.is_file().then_some(path)
}

// ─── Output format ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
    Markdown,
    Html,
}

impl OutputFormat {
    /// File extension of formats that can be written to disk.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Terminal => None,
            OutputFormat::Json     => Some("json"),
            OutputFormat::Markdown => Some("md"),
            OutputFormat::Html     => Some("html"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terminal" => Ok(OutputFormat::Terminal),
            "json"     => Ok(OutputFormat::Json),
            "markdown" => Ok(OutputFormat::Markdown),
            "html"     => Ok(OutputFormat::Html),
            other => Err(format!(
                "Invalid 'format' value: \"{other}\". \
                 Expected one of: \"terminal\", \"json\", \"markdown\", \"html\""
            )),
        }
    }
}

// ─── Resolved settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraylogSettings {
    pub base_url: String,
    pub token: String,
    pub mcp_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraSettings {
    pub base_url: String,
    pub email: String,
    pub token: String,
}

/// Values given on the command line; `None` defers to env / file / default.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub projects_paths: Option<Vec<String>>,
    pub days: Option<u32>,
    pub format: Option<OutputFormat>,
    pub output_dir: Option<PathBuf>,
}

/// Immutable settings built once at start-up and passed to every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub graylog: Option<GraylogSettings>,
    pub jira: Option<JiraSettings>,
    pub projects_paths: Vec<PathBuf>,
    pub days: u32,
    pub format: OutputFormat,
    pub output_dir: Option<PathBuf>,
    pub client_filter: ClientFileFilter,
}

impl Settings {
    /// Merges CLI flags, environment (`env` lookup) and the config file.
    pub fn resolve(
        file: &AuditorConfig,
        env: impl Fn(&str) -> Option<String>,
        cli: CliOverrides,
    ) -> Result<Settings, AuditError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let graylog_file = file.graylog.as_ref();
        let jira_file = file.jira.as_ref();

        let graylog_base = env("GRAYLOG_BASE_URL").or_else(|| graylog_file.and_then(|g| g.base_url.clone()));
        let graylog_token = env("GRAYLOG_TOKEN").or_else(|| graylog_file.and_then(|g| g.token.clone()));
        let graylog_mcp = env("GRAYLOG_MCP_BASE_URL").or_else(|| graylog_file.and_then(|g| g.mcp_url.clone()));

        let graylog = match (graylog_base, graylog_token) {
            (Some(base_url), Some(token)) => {
                let base_url = base_url.trim_end_matches('/').to_string();
                let mcp_url = graylog_mcp.unwrap_or_else(|| format!("{base_url}/mcp"));
                validate_url("GRAYLOG_BASE_URL", &base_url).map_err(AuditError::Config)?;
                validate_url("GRAYLOG_MCP_BASE_URL", &mcp_url).map_err(AuditError::Config)?;
                Some(GraylogSettings { base_url, token, mcp_url })
            }
            _ => None,
        };

        let jira = match (
            env("JIRA_BASE_URL").or_else(|| jira_file.and_then(|j| j.base_url.clone())),
            env("JIRA_EMAIL").or_else(|| jira_file.and_then(|j| j.email.clone())),
            env("JIRA_TOKEN").or_else(|| jira_file.and_then(|j| j.token.clone())),
        ) {
            (Some(base_url), Some(email), Some(token)) => {
                let base_url = base_url.trim_end_matches('/').to_string();
                validate_url("JIRA_BASE_URL", &base_url).map_err(AuditError::Config)?;
                Some(JiraSettings { base_url, email, token })
            }
            _ => None,
        };

        let projects_paths: Vec<PathBuf> = cli
            .projects_paths
            .or_else(|| env("DEFAULT_PROJECTS_PATHS").map(|v| split_paths(&v)))
            .or_else(|| file.projects_paths.clone())
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        if projects_paths.is_empty() {
            return Err(AuditError::Config(
                "No project paths to scan. Pass --projects, set DEFAULT_PROJECTS_PATHS \
                 or add 'projects_paths' to the config file"
                    .to_string(),
            ));
        }

        let format = match cli.format {
            Some(f) => f,
            None => file
                .format
                .as_deref()
                .map(OutputFormat::from_str)
                .transpose()
                .map_err(AuditError::Config)?
                .unwrap_or(OutputFormat::Terminal),
        };

        Ok(Settings {
            graylog,
            jira,
            projects_paths,
            days: cli.days.or(file.days).unwrap_or(DEFAULT_DAYS),
            format,
            output_dir: cli.output_dir.or_else(|| file.output_dir.as_ref().map(PathBuf::from)),
            client_filter: ClientFileFilter::new(
                file.client_extensions.as_deref().unwrap_or_default(),
                file.exclude_dirs.as_deref().unwrap_or_default(),
            ),
        })
    }

    pub fn graylog_enabled(&self) -> bool {
        self.graylog.is_some()
    }

    pub fn jira_enabled(&self) -> bool {
        self.jira.is_some()
    }
}

/// Comma-separated list, blanks dropped.
pub fn split_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Annotated YAML template, printed by `--generate-config`.
pub static TEMPLATE: &str = r#"# endpoint-auditor configuration file
# Generated by: endpoint-auditor --generate-config
#
# All settings are optional. Omit any field to use the built-in default.
# Environment variables override this file; CLI flags override both.
#
#   endpoint-auditor --config endpoint-auditor.yml --endpoint /v1/users/verify ...

# ── Log platform (runtime usage) ───────────────────────────────────────────────
# Enabled when both base_url and token are set.
# Env: GRAYLOG_BASE_URL, GRAYLOG_TOKEN, GRAYLOG_MCP_BASE_URL

# graylog:
#   base_url: "https://graylog.example.com"
#   token:    "..."
#   mcp_url:  "https://graylog.example.com/mcp"   # defaults to <base_url>/mcp

# ── Issue tracker (report comments) ────────────────────────────────────────────
# Enabled when base_url, email and token are all set.
# Env: JIRA_BASE_URL, JIRA_EMAIL, JIRA_TOKEN

# jira:
#   base_url: "https://example.atlassian.net"
#   email:    "auditor@example.com"
#   token:    "..."

# ── Audit scope ────────────────────────────────────────────────────────────────

# Codebases searched for client references to the endpoint.
# Env: DEFAULT_PROJECTS_PATHS (comma separated). Equivalent to --projects.
# projects_paths:
#   - "/repos/checkout-web"
#   - "/repos/mobile-bff"

# Runtime observation window in days.
# days: 30

# ── Output ─────────────────────────────────────────────────────────────────────

# Output format: terminal, json, markdown, html
# format: "terminal"

# Directory that receives report files.
# output_dir: "reports"

# ── Reference scan ─────────────────────────────────────────────────────────────

# Directory names never walked (VCS metadata is always skipped).
# exclude_dirs:
#   - "generated"
#   - "node_modules"

# Extensions of client source files. Default: java
# client_extensions:
#   - "java"
#   - "kt"
"#;

/// Prints the config template to stdout, or writes it to `output_path` if given.
pub fn print_template(output_path: Option<&Path>) -> Result<(), AuditError> {
    match output_path {
        Some(path) => std::fs::write(path, TEMPLATE).map_err(|e| {
            AuditError::Config(format!("Cannot write config template to '{}': {e}", path.display()))
        }),
        None => {
            print!("{TEMPLATE}");
            Ok(())
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
