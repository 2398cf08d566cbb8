//! Counter response building module
//!
//! Produces the JSON envelopes returned by the dispatcher. Every envelope,
//! including the literal fallback, carries the same CORS header set.

use super::error::CounterError;
use super::event::ProxyResponse;
use crate::logger;
use serde::Serialize;
use std::collections::BTreeMap;

/// Body written when even the error body cannot be serialized
pub const FALLBACK_ERROR_BODY: &str = r#"{"error":"Internal server error"}"#;

/// Fixed header set attached to every dispatcher response
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
    ("Content-Type", "application/json"),
];

/// Success body for get/increment
#[derive(Debug, Serialize)]
pub struct CountBody {
    pub count: u64,
    pub timestamp: i64,
    pub action: &'static str,
}

/// Error body for 405/500
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub status_code: u16,
    pub timestamp: i64,
}

/// Wall-clock epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn cors_headers() -> BTreeMap<String, String> {
    CORS_HEADERS
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect()
}

fn envelope(status_code: u16, body: String) -> ProxyResponse {
    ProxyResponse {
        status_code,
        headers: cors_headers(),
        body,
    }
}

/// Build 200 response for a count
pub fn count_response(count: u64, action: &'static str) -> Result<ProxyResponse, CounterError> {
    count_response_with(count, action, |body| serde_json::to_string(body))
}

/// Build 200 response for a count using the given encoder
pub fn count_response_with<F>(
    count: u64,
    action: &'static str,
    encode: F,
) -> Result<ProxyResponse, CounterError>
where
    F: FnOnce(&CountBody) -> serde_json::Result<String>,
{
    let body = CountBody {
        count,
        timestamp: now_millis(),
        action,
    };
    let json = encode(&body)?;
    Ok(envelope(200, json))
}

/// Build CORS preflight response (200, empty body)
pub fn preflight_response() -> ProxyResponse {
    envelope(200, String::new())
}

/// Build JSON error response
pub fn error_response(status_code: u16, message: &str) -> ProxyResponse {
    error_response_with(status_code, message, |body| serde_json::to_string(body))
}

/// Build JSON error response using the given encoder.
///
/// Falls back to [`FALLBACK_ERROR_BODY`] with status 500 when encoding fails.
pub fn error_response_with<F>(status_code: u16, message: &str, encode: F) -> ProxyResponse
where
    F: FnOnce(&ErrorBody<'_>) -> serde_json::Result<String>,
{
    let body = ErrorBody {
        error: message,
        status_code,
        timestamp: now_millis(),
    };

    match encode(&body) {
        Ok(json) => envelope(status_code, json),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize error response: {e}"));
            fallback_response()
        }
    }
}

/// Literal 500 response; needs no serialization
pub fn fallback_response() -> ProxyResponse {
    envelope(500, FALLBACK_ERROR_BODY.to_string())
}

/// Convert a dispatcher error into its response
pub fn from_error(err: &CounterError) -> ProxyResponse {
    error_response(err.status_code(), &err.public_message())
}
