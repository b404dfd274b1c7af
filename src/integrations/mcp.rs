//! Minimal MCP client over streamable HTTP: one `initialize` handshake per
//! client, then `tools/call` requests carrying the negotiated session id.

use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::QueryError;

pub const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_VERSION: &str = "2025-03-26";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct McpClient {
    http: reqwest::Client,
    url: String,
    session: OnceCell<Option<String>>,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    structured_content: Option<Value>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

impl McpClient {
    /// `headers` are sent with every request (auth and provider headers).
    pub fn new(url: impl Into<String>, headers: HeaderMap) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(McpClient {
            http,
            url: url.into(),
            session: OnceCell::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Calls a server tool and returns its JSON payload.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, QueryError> {
        let session = self.session.get_or_try_init(|| self.handshake()).await?;
        tracing::debug!(tool = name, "calling MCP tool");
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }), session.as_deref())
            .await?;
        tool_payload(result)
    }

    async fn handshake(&self) -> Result<Option<String>, QueryError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") },
        });
        let response = self.post(&self.envelope("initialize", params), None).await?;
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        read_result(response).await?;

        let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        self.post(&initialized, session.as_deref()).await?;
        tracing::debug!(url = %self.url, session = ?session, "MCP session initialized");
        Ok(session)
    }

    async fn request(&self, method: &str, params: Value, session: Option<&str>) -> Result<Value, QueryError> {
        let response = self.post(&self.envelope(method, params), session).await?;
        read_result(response).await
    }

    fn envelope(&self, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    async fn post(&self, body: &Value, session: Option<&str>) -> Result<reqwest::Response, QueryError> {
        let mut builder = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(id) = session {
            builder = builder.header(SESSION_HEADER, id);
        }
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Protocol(format!("HTTP {status} from {}", self.url)));
        }
        Ok(response)
    }
}

/// Reads a JSON-RPC response delivered either as plain JSON or as an event
/// stream, in which case the last `data:` event carries the response.
async fn read_result(response: reqwest::Response) -> Result<Value, QueryError> {
    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));
    let body = response.text().await?;

    let envelope: RpcEnvelope = if is_event_stream {
        let data = last_event_data(&body)
            .ok_or_else(|| QueryError::Malformed("event stream carried no data".to_string()))?;
        serde_json::from_str(&data)?
    } else {
        serde_json::from_str(&body)?
    };

    if let Some(err) = envelope.error {
        return Err(QueryError::Protocol(format!("JSON-RPC error {}: {}", err.code, err.message)));
    }
    envelope
        .result
        .ok_or_else(|| QueryError::Malformed("response has neither result nor error".to_string()))
}

fn last_event_data(body: &str) -> Option<String> {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .filter_map(|event| {
            let lines: Vec<&str> = event
                .lines()
                .filter_map(|l| l.strip_prefix("data:"))
                .map(|l| l.strip_prefix(' ').unwrap_or(l))
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        })
        .last()
}

/// `structuredContent` when present, otherwise the first text item parsed as JSON.
fn tool_payload(result: Value) -> Result<Value, QueryError> {
    let result: ToolResult = serde_json::from_value(result)?;
    let first_text = result
        .content
        .iter()
        .find(|c| c.kind == "text")
        .and_then(|c| c.text.as_deref());

    if result.is_error {
        return Err(QueryError::Protocol(
            first_text.unwrap_or("tool reported an error").to_string(),
        ));
    }
    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    match first_text {
        Some(text) => Ok(serde_json::from_str(text)?),
        None => Err(QueryError::Malformed("tool result has no content".to_string())),
    }
}
