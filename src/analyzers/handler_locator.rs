use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{AuditError, LocateError};
use crate::types::HttpMethod;

static REST_CONTROLLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@RestController\b").expect("rest controller regex"));

static REQUEST_MAPPING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@RequestMapping\s*\(\s*(?:value\s*=\s*)?["']([^"']+)["']\s*\)"#)
        .expect("request mapping regex")
});

static GET_MAPPING:    Lazy<Regex> = Lazy::new(|| mapping_regex("GetMapping"));
static POST_MAPPING:   Lazy<Regex> = Lazy::new(|| mapping_regex("PostMapping"));
static PUT_MAPPING:    Lazy<Regex> = Lazy::new(|| mapping_regex("PutMapping"));
static DELETE_MAPPING: Lazy<Regex> = Lazy::new(|| mapping_regex("DeleteMapping"));
static PATCH_MAPPING:  Lazy<Regex> = Lazy::new(|| mapping_regex("PatchMapping"));

/// `@XMapping` with an optional `("path")` / `(value = "path")` argument,
/// followed by return type and modifiers (generics, wildcards, arrays and
/// qualified names), then the method name and `(`.
/// Group 1: method path (may be absent). Group 2: method name.
fn mapping_regex(annotation: &str) -> Regex {
    Regex::new(&format!(
        r#"@{annotation}\s*(?:\(\s*(?:value\s*=\s*)?["']([^"']*?)["']\s*\))?\s+(?:[\w<>,.?\[\]\s]+\s+)?(\w+)\s*\("#
    ))
    .expect("mapping regex")
}

fn mapping_for(method: HttpMethod) -> Option<&'static Regex> {
    match method {
        HttpMethod::Get    => Some(&GET_MAPPING),
        HttpMethod::Post   => Some(&POST_MAPPING),
        HttpMethod::Put    => Some(&PUT_MAPPING),
        HttpMethod::Delete => Some(&DELETE_MAPPING),
        HttpMethod::Patch  => Some(&PATCH_MAPPING),
        HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace | HttpMethod::Connect => None,
    }
}

/// Reads a controller file. A missing or unreadable file is fatal to the audit.
pub fn read_controller(path: &Path) -> Result<String, AuditError> {
    std::fs::read_to_string(path).map_err(|source| AuditError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Finds the name of the method that handles `endpoint` for `method` in the
/// controller `source`. The first match in source order wins.
pub fn locate_handler(
    source: &str,
    endpoint: &str,
    method: HttpMethod,
) -> Result<String, LocateError> {
    let base_path = extract_base_path(source)?;
    let mapping = mapping_for(method).ok_or(LocateError::UnsupportedMethod(method))?;
    let wanted = endpoint.trim_end_matches('/');

    for caps in mapping.captures_iter(source) {
        let method_path = caps.get(1).map_or("", |m| m.as_str());
        let Some(name) = caps.get(2) else { continue };
        let full_path = build_full_path(&base_path, method_path);
        tracing::trace!(handler = name.as_str(), %full_path, "candidate mapping");
        if full_path.trim_end_matches('/') == wanted {
            return Ok(name.as_str().to_string());
        }
    }

    Err(LocateError::HandlerNotFound {
        endpoint: endpoint.to_string(),
        method,
    })
}

/// Class-level base path from the first `@RequestMapping`, without trailing `/`.
/// Empty when the controller has none.
fn extract_base_path(source: &str) -> Result<String, LocateError> {
    if !REST_CONTROLLER.is_match(source) {
        return Err(LocateError::NotAController);
    }
    Ok(REQUEST_MAPPING
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .unwrap_or_default())
}

/// Joins a class-level base path and a method-level path:
///   ("/api/payment", "/confirmation") → "/api/payment/confirmation"
///   ("/api/payment", "")              → "/api/payment"
///   ("", "/health")                   → "/health"
///   ("/api", "items")                 → "/api/items"
pub fn build_full_path(base_path: &str, method_path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let method = method_path.trim().trim_end_matches('/');

    if method.is_empty() {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    if method.starts_with('/') {
        format!("{base}{method}")
    } else {
        format!("{base}/{method}")
    }
}
