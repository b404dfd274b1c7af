mod analyzers;
mod config;
mod error;
mod filters;
mod integrations;
mod pipeline;
mod recommendation;
mod reporters;
mod types;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use config::{AuditorConfig, CliOverrides, OutputFormat, Settings};
use error::AuditError;
use integrations::graylog::GraylogClient;
use integrations::jira::{self, JiraClient};
use pipeline::{AuditRequest, LogCounter, Stage};
use types::{HttpMethod, LogSource};

const EXIT_FATAL: i32 = 1;
const EXIT_NO_INTEGRATION: i32 = 2;
const EXIT_JIRA_FAILED: i32 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "endpoint-auditor",
    about = "🔎 Audit whether a REST endpoint can be safely deprecated",
    version,
    long_about = "Combines three signals into one deprecation recommendation:\n\n\
                  • the log line the endpoint's handler emits (given with --log, or\n\
                    read from the Spring controller given with --controller)\n\
                  • how often that log line occurred in Graylog over the last --days\n\
                  • literal references to the endpoint path in *Client* source files\n\
                    under every --projects root\n\n\
                  Credentials come from the environment or --config; at least one of\n\
                  Graylog or Jira must be configured."
)]
struct Args {
    /// Full endpoint path, e.g. /v1/users/verify
    #[arg(long, required_unless_present = "generate_config")]
    endpoint: Option<String>,

    /// HTTP method of the endpoint (case-insensitive)
    #[arg(long = "http-method", value_name = "METHOD", required_unless_present = "generate_config")]
    http_method: Option<String>,

    /// A log line the handler emits; `{}` and `%s`-style placeholders are ignored
    #[arg(long, conflicts_with = "controller")]
    log: Option<String>,

    /// Controller source file to find the handler and its log statement in
    #[arg(long, value_name = "FILE")]
    controller: Option<PathBuf>,

    /// Graylog stream the application logs to
    #[arg(long = "application-name", value_name = "STREAM", required_unless_present = "generate_config")]
    application_name: Option<String>,

    /// Runtime observation window in days [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Comma-separated project roots to scan for client references
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    projects: Option<Vec<String>>,

    /// Output format [default: terminal]
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Directory for report files
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Jira issue key to post the report on, e.g. PROJ-123
    #[arg(long, value_name = "ISSUE")]
    jira: Option<String>,

    /// YAML config file (see --generate-config)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print an annotated config template, or write it to FILE
    #[arg(long, num_args = 0..=1, value_name = "FILE")]
    generate_config: Option<Option<PathBuf>>,

    /// More diagnostics on stderr (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);
    std::process::exit(run(args).await);
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "endpoint_auditor=debug",
        _ => "endpoint_auditor=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> i32 {
    if let Some(path) = &args.generate_config {
        return match config::print_template(path.as_deref()) {
            Ok(()) => {
                if let Some(p) = path {
                    eprintln!("✓ Config template written to {}", p.display());
                }
                0
            }
            Err(e) => fail(&e),
        };
    }

    let settings = match load_settings(&args) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if !settings.graylog_enabled() && !settings.jira_enabled() {
        eprintln!("Error: No valid integrations configured. Set GRAYLOG_BASE_URL + GRAYLOG_TOKEN");
        eprintln!("       and/or JIRA_BASE_URL + JIRA_EMAIL + JIRA_TOKEN (or use --config).");
        return EXIT_NO_INTEGRATION;
    }

    let request = match build_request(&args) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let counter = settings.graylog.as_ref().and_then(|g| match GraylogClient::new(g) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "Graylog client unavailable; runtime usage will not be measured");
            None
        }
    });

    let report = match audit(&request, &settings, counter.as_ref().map(|c| c as &dyn LogCounter)).await {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    if let Err(e) = reporters::emit(&report, settings.format, settings.output_dir.as_deref()) {
        return fail(&e);
    }

    match (&args.jira, &settings.jira) {
        (Some(key), Some(jira_settings)) => {
            eprintln!("Posting report to Jira issue {key}...");
            let posted = match JiraClient::new(jira_settings) {
                Ok(client) => jira::post_report(&client, key, &report).await,
                Err(e) => Err(e),
            };
            if let Err(e) = posted {
                eprintln!("Error: {e}");
                return EXIT_JIRA_FAILED;
            }
            eprintln!("✓ Report posted to {key}");
        }
        (Some(key), None) => {
            eprintln!("⚠ Jira is not configured; report was not posted to {key}");
        }
        (None, _) => {}
    }
    0
}

fn fail(e: &AuditError) -> i32 {
    eprintln!("Error: {e}");
    if e.is_configuration_error() {
        eprintln!("       Check the arguments, environment and config file (see --help).");
    }
    EXIT_FATAL
}

fn load_settings(args: &Args) -> Result<Settings, AuditError> {
    let file = match args.config.clone().or_else(config::default_config_path) {
        Some(path) => {
            tracing::debug!(config = %path.display(), "loading config file");
            config::load_config(&path)?
        }
        None => AuditorConfig::default(),
    };
    let cli = CliOverrides {
        projects_paths: args.projects.clone(),
        days: args.days,
        format: args.format,
        output_dir: args.output_dir.clone(),
    };
    Settings::resolve(&file, |key| std::env::var(key).ok(), cli)
}

fn build_request(args: &Args) -> Result<AuditRequest, AuditError> {
    let missing = |flag: &str| AuditError::Config(format!("{flag} is required"));
    let endpoint = args.endpoint.clone().ok_or_else(|| missing("--endpoint"))?;
    let http_method: HttpMethod = args.http_method.as_deref().ok_or_else(|| missing("--http-method"))?.parse()?;
    let application_name = args.application_name.clone().ok_or_else(|| missing("--application-name"))?;

    let log_source = match (&args.log, &args.controller) {
        (Some(message), None) => LogSource::Message(message.clone()),
        (None, Some(path)) => LogSource::Controller(path.clone()),
        _ => return Err(AuditError::Config("Exactly one of --log or --controller is required".to_string())),
    };

    Ok(AuditRequest { endpoint, http_method, log_source, application_name })
}

// ── Audit with progress ────────────────────────────────────────────────────────

async fn audit(
    request: &AuditRequest,
    settings: &Settings,
    counter: Option<&dyn LogCounter>,
) -> Result<types::AuditReport, AuditError> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .map_err(|e| AuditError::Report(e.to_string()))?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.enable_steady_tick(Duration::from_millis(80));

    let total_start = Instant::now();
    let mut step_start = Instant::now();
    let mut current: Option<Stage> = None;

    let finish_step = |stage: Stage, started: Instant| {
        pb.println(format!(
            "  ✓ [{}/{}] {:<40} {}",
            stage.number(),
            Stage::COUNT,
            stage.label(),
            fmt_dur(started.elapsed())
        ));
    };

    let result = pipeline::run_audit(request, settings, counter, &mut |stage| {
        if let Some(done) = current.replace(stage) {
            finish_step(done, step_start);
        }
        step_start = Instant::now();
        pb.set_message(format!("[{}/{}] {}...", stage.number(), Stage::COUNT, stage.label()));
    })
    .await;

    let report = match result {
        Ok(report) => {
            if let Some(done) = current {
                finish_step(done, step_start);
            }
            report
        }
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.finish_and_clear();
    eprintln!(
        "✔ {} {}: {} code match{}, runtime {} — ⏱ {}",
        request.http_method,
        request.endpoint,
        report.code_usage.matches_count,
        if report.code_usage.matches_count == 1 { "" } else { "es" },
        match report.runtime_usage.total_occurrences {
            Some(n) if report.runtime_usage.enabled => format!("{n} occurrence(s)"),
            _ => "not measured".to_string(),
        },
        fmt_dur(total_start.elapsed()),
    );
    Ok(report)
}

// ── Duration formatting ────────────────────────────────────────────────────────

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_millis();
    if ms >= 1000 { format!("{:.1}s", d.as_secs_f64()) } else { format!("{ms}ms") }
}
