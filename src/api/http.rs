//! Shared HTTP helpers: client construction, headers, status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{Result, ThreadRunError};

/// Build a client for the run service.
///
/// Only the connect phase is bounded here; run streams may stay idle for
/// long periods and must not be cut by a whole-request timeout. Plain
/// requests apply their own per-request timeout.
pub fn build_client(connect_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(ThreadRunError::Network)
}

/// Default headers for a Bearer-token API.
pub fn bearer_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Map a non-success status and body to an error.
pub fn status_to_error(status: u16, body: &str) -> ThreadRunError {
    match status {
        401 | 403 => ThreadRunError::Authentication(error_message(body)),
        429 => ThreadRunError::QuotaExceeded {
            message: error_message(body),
            retry_after_ms: extract_retry_after(body),
        },
        _ => ThreadRunError::api(status, error_message(body)),
    }
}

/// Prefer `error.message` from a JSON body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
