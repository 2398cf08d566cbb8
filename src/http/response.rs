//! HTTP response building module
//!
//! Builders for the responses sent by the HTTP front end. Counter responses
//! keep the dispatcher's status, headers and body untouched.

use crate::counter::response::{cors_headers, error_response, fallback_response};
use crate::counter::ProxyResponse;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

pub type HttpResponse = Response<Full<Bytes>>;

/// Convert a dispatcher envelope into a hyper response
pub fn build_proxy_response(envelope: ProxyResponse, server_name: &str) -> HttpResponse {
    let mut builder = Response::builder()
        .status(envelope.status_code)
        .header("Server", server_name);
    for (name, value) in &envelope.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(Full::new(Bytes::from(envelope.body)))
        .unwrap_or_else(|e| {
            log_build_error("proxy", &e);
            literal_fallback(server_name)
        })
}

/// Build 200 response whose body is the whole envelope as JSON.
///
/// This is the Lambda-invoke shape: clients read `statusCode` and parse
/// `body` themselves.
pub fn build_envelope_response(envelope: &ProxyResponse, server_name: &str) -> HttpResponse {
    match serde_json::to_string(envelope) {
        Ok(json) => with_cors(200, json, server_name),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize envelope: {e}"));
            build_proxy_response(fallback_response(), server_name)
        }
    }
}

/// Build 400 Bad Request JSON response
pub fn build_bad_request_response(message: &str, server_name: &str) -> HttpResponse {
    build_proxy_response(error_response(400, message), server_name)
}

/// Build 413 Payload Too Large JSON response
pub fn build_413_response(server_name: &str) -> HttpResponse {
    build_proxy_response(error_response(413, "Payload too large"), server_name)
}

/// Build plain-text health probe response
pub fn build_health_response(status: u16, body: &'static str, server_name: &str) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("Server", server_name)
        .header("Content-Type", "text/plain")
        .header("Cache-Control", "no-cache")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(Full::new(Bytes::from_static(body.as_bytes())))
        })
}

fn with_cors(status: u16, body: String, server_name: &str) -> HttpResponse {
    build_proxy_response(
        ProxyResponse {
            status_code: status,
            headers: cors_headers(),
            body,
        },
        server_name,
    )
}

/// Last resort when the builder itself rejects a header or status
fn literal_fallback(server_name: &str) -> HttpResponse {
    let envelope = fallback_response();
    let mut resp = Response::new(Full::new(Bytes::from(envelope.body)));
    *resp.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
    let headers = resp.headers_mut();
    for (name, value) in &envelope.headers {
        if let (Ok(name), Ok(value)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    if let Ok(value) = hyper::header::HeaderValue::from_str(server_name) {
        headers.insert(hyper::header::SERVER, value);
    }
    resp
}

/// Log response build error
fn log_build_error(kind: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {kind} response: {error}"));
}
