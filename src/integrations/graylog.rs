use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::GraylogSettings;
use crate::error::QueryError;
use crate::integrations::mcp::McpClient;
use crate::pipeline::LogCounter;

pub const PROVIDER: &str = "Graylog";

/// Page size of a search; also the largest count one search can report.
pub const SEARCH_PAGE_SIZE: u32 = 300;
const SEARCH_FIELDS: [&str; 3] = ["message", "caseId", "timestamp"];

/// Counts log occurrences through the Graylog MCP server.
pub struct GraylogClient {
    mcp: McpClient,
}

#[derive(Debug, Deserialize)]
struct Stream {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    datarows: Vec<Value>,
}

impl GraylogClient {
    pub fn new(settings: &GraylogSettings) -> Result<Self, QueryError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", settings.token))?);
        headers.insert(HeaderName::from_static("x-graylog-api-base-url"), header_value(&settings.base_url)?);
        headers.insert(HeaderName::from_static("x-graylog-api-token"), header_value(&settings.token)?);
        Ok(GraylogClient { mcp: McpClient::new(&settings.mcp_url, headers)? })
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, QueryError> {
    let mut value = HeaderValue::from_str(raw)
        .map_err(|_| QueryError::Protocol("credentials contain characters not allowed in HTTP headers".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// `"part one" AND "part two"`; empty when there are no parts.
pub fn lucene_query(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[async_trait]
impl LogCounter for GraylogClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn build_query(&self, parts: &[String]) -> String {
        lucene_query(parts)
    }

    async fn find_stream_by_name(&self, name: &str) -> Result<String, QueryError> {
        let payload = self.mcp.call_tool("get_streams", json!({})).await?;
        let streams: Vec<Stream> = serde_json::from_value(payload)?;
        tracing::debug!(count = streams.len(), "streams listed");
        streams
            .into_iter()
            .find(|s| s.title == name)
            .map(|s| s.id)
            .ok_or_else(|| QueryError::StreamNotFound(name.to_string()))
    }

    async fn search_occurrences(
        &self,
        stream_id: &str,
        query: &str,
        window_seconds: u64,
    ) -> Result<u64, QueryError> {
        let arguments = json!({
            "stream_id": stream_id,
            "lucene_query": query,
            "range_in_seconds": window_seconds,
            "size": SEARCH_PAGE_SIZE,
            "fields": SEARCH_FIELDS,
        });
        let payload = self.mcp.call_tool("search_messages_relative", arguments).await?;
        let result: SearchResult = serde_json::from_value(payload)?;
        Ok(result.datarows.len() as u64)
    }
}
