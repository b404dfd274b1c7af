use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::path::Path;

use crate::analyzers::{handler_locator, log_template, reference_scan};
use crate::config::Settings;
use crate::error::{AuditError, LocateError, QueryError};
use crate::recommendation::assemble_report;
use crate::types::*;

/// Remote source of runtime log counts.
#[async_trait]
pub trait LogCounter: Send + Sync {
    /// Name shown in reports, e.g. "Graylog".
    fn provider(&self) -> &'static str;

    /// Provider-specific query matching every template part.
    fn build_query(&self, parts: &[String]) -> String;

    async fn find_stream_by_name(&self, name: &str) -> Result<String, QueryError>;

    async fn search_occurrences(
        &self,
        stream_id: &str,
        query: &str,
        window_seconds: u64,
    ) -> Result<u64, QueryError>;
}

/// One endpoint to audit.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub endpoint: String,
    pub http_method: HttpMethod,
    pub log_source: LogSource,
    pub application_name: String,
}

const SECONDS_PER_DAY: u64 = 86_400;

/// Audit stages, reported to the caller as each one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LogTemplate,
    Usage,
    Recommendation,
}

impl Stage {
    pub const COUNT: usize = 3;

    pub fn number(self) -> usize {
        match self {
            Stage::LogTemplate    => 1,
            Stage::Usage          => 2,
            Stage::Recommendation => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::LogTemplate    => "Extracting log template",
            Stage::Usage          => "Runtime query + reference scan",
            Stage::Recommendation => "Building recommendation",
        }
    }
}

/// Runs one audit: log template first, then the runtime query and the
/// reference scan side by side, then the recommendation.
pub async fn run_audit(
    request: &AuditRequest,
    settings: &Settings,
    counter: Option<&dyn LogCounter>,
    on_stage: &mut dyn FnMut(Stage),
) -> Result<AuditReport, AuditError> {
    on_stage(Stage::LogTemplate);
    let (descriptor, extraction) =
        resolve_log_template(&request.endpoint, request.http_method, &request.log_source)?;

    on_stage(Stage::Usage);
    let (runtime_usage, code_usage) = collect_usage(request, &extraction, settings, counter).await?;

    on_stage(Stage::Recommendation);
    Ok(assemble_report(&descriptor, extraction, runtime_usage, code_usage, Utc::now()))
}

/// Runtime query and reference scan, run concurrently. The scan runs on the
/// blocking pool; only its root check can fail the audit.
async fn collect_usage(
    request: &AuditRequest,
    extraction: &LogExtraction,
    settings: &Settings,
    counter: Option<&dyn LogCounter>,
) -> Result<(RuntimeUsage, CodeUsage), AuditError> {
    let endpoint = request.endpoint.clone();
    let roots = settings.projects_paths.clone();
    let filter = settings.client_filter.clone();
    let runtime = measure_runtime_usage(counter, &request.application_name, extraction, settings.days);
    join_usage(runtime, move || reference_scan::scan_references(&endpoint, &roots, &filter)).await
}

async fn join_usage<R, S>(runtime: R, scan: S) -> Result<(RuntimeUsage, CodeUsage), AuditError>
where
    R: Future<Output = RuntimeUsage>,
    S: FnOnce() -> Result<CodeUsage, AuditError> + Send + 'static,
{
    let scan = tokio::task::spawn_blocking(scan);
    let (runtime_usage, code_usage) = tokio::join!(runtime, scan);
    let code_usage = code_usage.map_err(|e| AuditError::Io(std::io::Error::other(e)))??;
    Ok((runtime_usage, code_usage))
}

/// Builds the endpoint descriptor and extracts the log template from either
/// a literal message or the handler found in a controller file.
///
/// An unreadable file, a non-controller or an unsupported method abort the
/// audit. A handler that cannot be found only fails the extraction.
pub fn resolve_log_template(
    endpoint: &str,
    method: HttpMethod,
    source: &LogSource,
) -> Result<(EndpointDescriptor, LogExtraction), AuditError> {
    let descriptor = EndpointDescriptor::new(endpoint, method);
    match source {
        LogSource::Message(raw) => Ok((descriptor, log_template::extract_from_message(raw))),
        LogSource::Controller(path) => {
            let text = handler_locator::read_controller(path)?;
            let descriptor = descriptor.with_controller(path.display().to_string());
            match handler_locator::locate_handler(&text, endpoint, method) {
                Ok(handler) => {
                    tracing::debug!(%handler, "handler located");
                    let extraction = log_template::extract_from_handler_body(&text, &handler);
                    Ok((descriptor.with_handler(handler), extraction))
                }
                Err(e) => promote_locate_error(e, path).map(|()| (descriptor, LogExtraction::failed())),
            }
        }
    }
}

fn promote_locate_error(err: LocateError, path: &Path) -> Result<(), AuditError> {
    match err {
        LocateError::NotAController => Err(AuditError::NotAController { path: path.to_path_buf() }),
        LocateError::UnsupportedMethod(m) => Err(AuditError::UnsupportedMethod(m)),
        LocateError::HandlerNotFound { .. } => {
            tracing::warn!(error = %err, "log extraction skipped");
            Ok(())
        }
    }
}

/// Counts template occurrences over the last `days`. Never fails: a missing
/// counter, an unusable template or any query error yields "not measured"
/// with the reason attached.
pub async fn measure_runtime_usage(
    counter: Option<&dyn LogCounter>,
    stream_name: &str,
    extraction: &LogExtraction,
    days: u32,
) -> RuntimeUsage {
    let Some(counter) = counter else {
        return RuntimeUsage::not_measured(days, QueryError::Disabled.to_string());
    };
    let parts = match &extraction.template_parts {
        None => return RuntimeUsage::not_measured(days, "log template was not extracted"),
        Some(parts) if parts.is_empty() => {
            return RuntimeUsage::not_measured(days, "log template has no constant text")
        }
        Some(parts) => parts,
    };

    let query = counter.build_query(parts);
    let window_seconds = u64::from(days) * SECONDS_PER_DAY;

    let outcome = async {
        let stream_id = counter.find_stream_by_name(stream_name).await?;
        counter.search_occurrences(&stream_id, &query, window_seconds).await
    }
    .await;

    match outcome {
        Ok(total) => {
            tracing::info!(provider = counter.provider(), stream = stream_name, total, "runtime usage measured");
            RuntimeUsage::measured(counter.provider(), days, query, total)
        }
        Err(e) => {
            tracing::warn!(provider = counter.provider(), stream = stream_name, error = %e, "runtime query failed");
            RuntimeUsage::not_measured(days, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditorConfig, CliOverrides};
    use crate::filters::ClientFileFilter;
    use crate::integrations::graylog::lucene_query;
    use crate::recommendation::{EXTRACTION_WARNING, RUNTIME_WARNING};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeCounter {
        streams: Vec<(&'static str, &'static str)>,
        result: Result<u64, QueryError>,
        searches: AtomicUsize,
        last_search: Mutex<Option<(String, String, u64)>>,
    }

    impl FakeCounter {
        fn returning(result: Result<u64, QueryError>) -> Self {
            FakeCounter {
                streams: vec![("s-1", "payments-api"), ("s-2", "users-api")],
                result,
                searches: AtomicUsize::new(0),
                last_search: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LogCounter for FakeCounter {
        fn provider(&self) -> &'static str {
            "Graylog"
        }

        fn build_query(&self, parts: &[String]) -> String {
            lucene_query(parts)
        }

        async fn find_stream_by_name(&self, name: &str) -> Result<String, QueryError> {
            self.streams
                .iter()
                .find(|(_, title)| *title == name)
                .map(|(id, _)| id.to_string())
                .ok_or_else(|| QueryError::StreamNotFound(name.to_string()))
        }

        async fn search_occurrences(&self, stream_id: &str, query: &str, window: u64) -> Result<u64, QueryError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            *self.last_search.lock().unwrap() = Some((stream_id.to_string(), query.to_string(), window));
            self.result.clone()
        }
    }

    fn fixtures() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    fn settings_with_roots(roots: Vec<PathBuf>) -> Settings {
        let cli = CliOverrides {
            projects_paths: Some(roots.iter().map(|r| r.display().to_string()).collect()),
            ..Default::default()
        };
        Settings::resolve(&AuditorConfig::default(), |_| None, cli).unwrap()
    }

    fn message_request(endpoint: &str, msg: &str) -> AuditRequest {
        AuditRequest {
            endpoint: endpoint.to_string(),
            http_method: HttpMethod::Post,
            log_source: LogSource::Message(msg.to_string()),
            application_name: "payments-api".to_string(),
        }
    }

    fn controller_request(endpoint: &str, method: HttpMethod, file: &str) -> AuditRequest {
        AuditRequest {
            endpoint: endpoint.to_string(),
            http_method: method,
            log_source: LogSource::Controller(fixtures().join("controllers").join(file)),
            application_name: "payments-api".to_string(),
        }
    }

    // ── measure_runtime_usage ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_measured_count_with_query_and_window() {
        let counter = FakeCounter::returning(Ok(42));
        let extraction = LogExtraction::extracted(vec!["Downloading Document".into(), "for case:".into()]);
        let usage = measure_runtime_usage(Some(&counter), "payments-api", &extraction, 7).await;

        assert!(usage.enabled);
        assert_eq!(usage.provider.as_deref(), Some("Graylog"));
        assert_eq!(usage.total_occurrences, Some(42));
        assert_eq!(usage.query.as_deref(), Some(r#""Downloading Document" AND "for case:""#));
        let (stream, _, window) = counter.last_search.lock().unwrap().clone().unwrap();
        assert_eq!(stream, "s-1");
        assert_eq!(window, 7 * 86_400);
    }

    #[tokio::test]
    async fn test_zero_is_a_real_measurement() {
        let counter = FakeCounter::returning(Ok(0));
        let extraction = LogExtraction::extracted(vec!["x".into()]);
        let usage = measure_runtime_usage(Some(&counter), "payments-api", &extraction, 30).await;
        assert!(usage.enabled);
        assert_eq!(usage.total_occurrences, Some(0));
    }

    #[tokio::test]
    async fn test_disabled_counter_is_not_measured() {
        let extraction = LogExtraction::extracted(vec!["x".into()]);
        let usage = measure_runtime_usage(None, "payments-api", &extraction, 30).await;
        assert!(!usage.enabled);
        assert!(usage.provider.is_none());
        assert!(usage.total_occurrences.is_none());
        assert_eq!(usage.days, 30);
    }

    #[tokio::test]
    async fn test_failed_or_empty_template_skips_query() {
        let counter = FakeCounter::returning(Ok(5));
        for extraction in [LogExtraction::failed(), LogExtraction::extracted(vec![])] {
            let usage = measure_runtime_usage(Some(&counter), "payments-api", &extraction, 30).await;
            assert!(!usage.enabled);
            assert!(usage.skipped_reason.is_some());
        }
        assert_eq!(counter.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_stream_is_not_measured() {
        let counter = FakeCounter::returning(Ok(5));
        let extraction = LogExtraction::extracted(vec!["x".into()]);
        let usage = measure_runtime_usage(Some(&counter), "billing-api", &extraction, 30).await;
        assert!(!usage.enabled);
        assert!(usage.skipped_reason.unwrap().contains("billing-api"));
        assert_eq!(counter.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_error_degrades() {
        let counter = FakeCounter::returning(Err(QueryError::Transport("connection reset".into())));
        let extraction = LogExtraction::extracted(vec!["x".into()]);
        let usage = measure_runtime_usage(Some(&counter), "payments-api", &extraction, 30).await;
        assert!(!usage.enabled);
        assert!(usage.provider.is_none());
        assert!(usage.total_occurrences.is_none());
    }

    // ── resolve_log_template ──────────────────────────────────────────────────

    #[test]
    fn test_controller_variant_locates_and_extracts() {
        let path = fixtures().join("controllers/PaymentController.java");
        let (descriptor, extraction) = resolve_log_template(
            "/api/payment/update",
            HttpMethod::Put,
            &LogSource::Controller(path.clone()),
        )
        .unwrap();
        assert_eq!(descriptor.handler_method_name(), Some("updatePayment"));
        assert_eq!(descriptor.controller_source(), Some(path.display().to_string().as_str()));
        assert_eq!(extraction.template_parts.unwrap(), vec!["Updating payment for id:"]);
    }

    #[test]
    fn test_missing_handler_degrades_extraction() {
        let (descriptor, extraction) = resolve_log_template(
            "/api/payment/nonexistent",
            HttpMethod::Get,
            &LogSource::Controller(fixtures().join("controllers/PaymentController.java")),
        )
        .unwrap();
        assert!(descriptor.handler_method_name().is_none());
        assert!(!extraction.extracted);
    }

    #[test]
    fn test_controller_errors_are_fatal() {
        let missing = resolve_log_template("/x", HttpMethod::Get, &LogSource::Controller("/no/such/File.java".into()));
        assert!(matches!(missing, Err(AuditError::SourceNotFound { .. })));

        let service = resolve_log_template(
            "/x",
            HttpMethod::Get,
            &LogSource::Controller(fixtures().join("controllers/NotAController.java")),
        );
        assert!(matches!(service, Err(AuditError::NotAController { .. })));

        let head = resolve_log_template(
            "/api/payment/status",
            HttpMethod::Head,
            &LogSource::Controller(fixtures().join("controllers/PaymentController.java")),
        );
        assert!(matches!(head, Err(AuditError::UnsupportedMethod(HttpMethod::Head))));
    }

    // ── run_audit ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_runtime_usage_detected_end_to_end() {
        let settings = settings_with_roots(vec![fixtures().join("clients")]);
        let counter = FakeCounter::returning(Ok(12));
        let request = message_request("/api/v1/payment", "Confirming payment. Transaction id: '{}'. Provider: '{}'");

        let report = run_audit(&request, &settings, Some(&counter), &mut |_| {}).await.unwrap();
        assert_eq!(report.recommendation.status, RecommendationStatus::RuntimeUsageDetected);
        assert_eq!(report.code_usage.matches_count, 6);
        assert_eq!(report.log_extraction.template_parts.as_ref().unwrap().len(), 3);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failing_counter_still_produces_report() {
        let settings = settings_with_roots(vec![fixtures().join("clients")]);
        let counter = FakeCounter::returning(Err(QueryError::Protocol("401 Unauthorized".into())));
        let request = message_request("/api/v1/users", "Fetching user {}");

        let report = run_audit(&request, &settings, Some(&counter), &mut |_| {}).await.unwrap();
        assert!(!report.runtime_usage.enabled);
        assert!(report.runtime_usage.total_occurrences.is_none());
        assert_eq!(report.warnings, vec![RUNTIME_WARNING]);
        assert_eq!(report.recommendation.status, RecommendationStatus::StillReferencedInCode);
        assert_eq!(report.code_usage.matches_count, 7);
    }

    #[tokio::test]
    async fn test_candidate_with_both_warnings() {
        let settings = settings_with_roots(vec![fixtures().join("clients")]);
        let request = controller_request("/api/payment/cancel", HttpMethod::Delete, "PaymentController.java");

        let mut stages = Vec::new();
        let report = run_audit(&request, &settings, None, &mut |s: Stage| stages.push(s.number())).await.unwrap();
        assert_eq!(stages, vec![1, 2, Stage::COUNT]);
        assert_eq!(report.endpoint.handler_method.as_deref(), Some("cancelPayment"));
        assert!(!report.log_extraction.extracted);
        assert_eq!(report.warnings, vec![EXTRACTION_WARNING, RUNTIME_WARNING]);
        assert_eq!(report.recommendation.status, RecommendationStatus::CandidateForDeprecation);
    }

    #[tokio::test]
    async fn test_missing_root_aborts_audit() {
        let settings = settings_with_roots(vec![PathBuf::from("/nonexistent/path")]);
        let counter = FakeCounter::returning(Ok(1));
        let mut stages = Vec::new();
        let err = run_audit(&message_request("/x", "Hello {}"), &settings, Some(&counter), &mut |s: Stage| stages.push(s))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::ProjectPathNotFound { .. }));
        assert_eq!(stages, vec![Stage::LogTemplate, Stage::Usage]);
    }

    // ── join_usage ────────────────────────────────────────────────────────────

    /// Answers only after the scan has signalled that it is running.
    struct RendezvousCounter {
        query_started: Mutex<std::sync::mpsc::Sender<()>>,
        scan_started: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl LogCounter for RendezvousCounter {
        fn provider(&self) -> &'static str {
            "Graylog"
        }

        fn build_query(&self, parts: &[String]) -> String {
            lucene_query(parts)
        }

        async fn find_stream_by_name(&self, _name: &str) -> Result<String, QueryError> {
            Ok("s-1".to_string())
        }

        async fn search_occurrences(&self, _: &str, _: &str, _: u64) -> Result<u64, QueryError> {
            let _ = self.query_started.lock().unwrap().send(());
            let scan_started = self.scan_started.lock().unwrap().take().expect("searched once");
            tokio::time::timeout(Duration::from_secs(5), scan_started)
                .await
                .map_err(|_| QueryError::Transport("scan did not run during the query".into()))?
                .map_err(|_| QueryError::Transport("scan dropped its signal".into()))?;
            Ok(7)
        }
    }

    #[tokio::test]
    async fn test_runtime_query_and_scan_overlap() {
        let (query_tx, query_rx) = std::sync::mpsc::channel();
        let (scan_tx, scan_rx) = tokio::sync::oneshot::channel();
        let counter = RendezvousCounter {
            query_started: Mutex::new(query_tx),
            scan_started: Mutex::new(Some(scan_rx)),
        };
        let roots = vec![fixtures().join("clients")];
        let scan = move || {
            query_rx
                .recv_timeout(Duration::from_secs(5))
                .map_err(|_| AuditError::Config("query did not run during the scan".into()))?;
            let _ = scan_tx.send(());
            reference_scan::scan_references("/v1/users", &roots, &ClientFileFilter::default())
        };
        let extraction = LogExtraction::extracted(vec!["Verifying user".into()]);
        let runtime = measure_runtime_usage(Some(&counter), "payments-api", &extraction, 30);

        let (runtime_usage, code_usage) = join_usage(runtime, scan).await.expect("both branches finish");
        assert!(runtime_usage.enabled, "{:?}", runtime_usage.skipped_reason);
        assert_eq!(runtime_usage.total_occurrences, Some(7));
        assert_eq!(code_usage.projects_paths.len(), 1);
    }
}
