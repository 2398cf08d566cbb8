//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body size check, health probes,
//! the JSON invoke endpoint, and the direct proxy path to the dispatcher.

use crate::config::{AppState, HealthConfig};
use crate::counter::{CounterError, Dispatcher, ProxyRequest, ProxyResponse};
use crate::counter::response::from_error;
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = access_entry(&req, peer_addr);

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let response = route_request(req, &state).await;

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().map_or(0, |n| {
            usize::try_from(n).unwrap_or(usize::MAX)
        });
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route_request<B>(req: Request<B>, state: &Arc<AppState>) -> HttpResponse
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let server_name = state.config.http.server_name.as_str();

    // 1. Reject oversized bodies before reading anything
    if exceeds_body_limit(&req, state.config.http.max_body_size) {
        return http::build_413_response(server_name);
    }

    // 2. Health probes
    if let Some(resp) = check_health(&req, &state.config.routes.health, state).await {
        return resp;
    }

    // 3. JSON proxy events
    if req.method() == Method::POST && req.uri().path() == state.config.routes.invoke_path {
        return handle_invoke(req, state).await;
    }

    // 4. Everything else is a direct counter call
    let event = proxy_request_from(&req);
    let envelope = dispatch(state, Some(event)).await;
    http::build_proxy_response(envelope, server_name)
}

/// Parse a JSON event and answer with the envelope as JSON.
/// An empty body or `null` stands for an absent event.
async fn handle_invoke<B>(req: Request<B>, state: &Arc<AppState>) -> HttpResponse
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let server_name = state.config.http.server_name.as_str();

    // Content-Length is optional, so the limit is enforced while reading too
    let max_body_size = state.config.http.max_body_size;
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let bytes = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            logger::log_error(&format!(
                "Request body too large: exceeded {max_body_size} bytes while reading"
            ));
            return http::build_413_response(server_name);
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read invoke body: {e}"));
            return http::build_bad_request_response("Failed to read request body", server_name);
        }
    };

    let event = match parse_event(&bytes) {
        Ok(event) => event,
        Err(e) => {
            logger::log_warning(&format!("Rejected invoke event: {e}"));
            return http::build_bad_request_response(&format!("Invalid event: {e}"), server_name);
        }
    };

    let envelope = dispatch(state, event).await;
    http::build_envelope_response(&envelope, server_name)
}

fn parse_event(bytes: &[u8]) -> serde_json::Result<Option<ProxyRequest>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
}

/// Run the dispatcher on the blocking pool; store calls may do file I/O
async fn dispatch(state: &Arc<AppState>, event: Option<ProxyRequest>) -> ProxyResponse {
    let dispatcher: Dispatcher = state.dispatcher.clone();
    let handle = tokio::task::spawn_blocking(move || dispatcher.handle(event.as_ref()));

    match handle.await {
        Ok(envelope) => envelope,
        Err(e) => {
            let err = CounterError::Internal(e.to_string());
            logger::log_error(&format!("Dispatcher task failed: {err}"));
            from_error(&err)
        }
    }
}

/// Translate an HTTP request into a proxy event
fn proxy_request_from<B>(req: &Request<B>) -> ProxyRequest {
    let headers: BTreeMap<String, Option<String>> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Some(v.to_string())))
        })
        .collect();

    ProxyRequest {
        path: Some(req.uri().path().to_string()),
        headers: Some(headers),
        ..ProxyRequest::with_method(req.method().as_str())
    }
}

async fn check_health<B>(
    req: &Request<B>,
    health: &HealthConfig,
    state: &Arc<AppState>,
) -> Option<HttpResponse> {
    if !health.enabled || req.method() != Method::GET {
        return None;
    }

    let server_name = state.config.http.server_name.as_str();
    let path = req.uri().path();

    if path == health.liveness_path {
        return Some(http::build_health_response(200, "ok", server_name));
    }

    if path == health.readiness_path {
        let dispatcher = state.dispatcher.clone();
        let ready = tokio::task::spawn_blocking(move || dispatcher.current_count().is_ok())
            .await
            .unwrap_or(false);
        return Some(if ready {
            http::build_health_response(200, "ready", server_name)
        } else {
            logger::log_warning("Readiness check failed: store unavailable");
            http::build_health_response(503, "store unavailable", server_name)
        });
    }

    None
}

/// Check the declared `Content-Length` against the configured maximum
fn exceeds_body_limit<B>(req: &Request<B>, max_body_size: u64) -> bool {
    let Some(content_length) = req.headers().get("content-length") else {
        return false;
    };

    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            false
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                true
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                false
            }
            _ => false,
        },
    )
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.origin = header("origin");
    entry.user_agent = header("user-agent");
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::counter::response::CORS_HEADERS;
    use crate::store::{CounterRecord, CounterStore, MemoryStore, SharedStore, StoreError};
    use http_body_util::Full;
    use hyper::body::Bytes;
    use serde_json::Value;

    struct DownStore;

    impl CounterStore for DownStore {
        fn read(&self, _key: &str) -> Result<Option<CounterRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn atomic_add(&self, _key: &str, _delta: u64) -> Result<CounterRecord, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    fn test_state(store: SharedStore) -> Arc<AppState> {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(dir.path().join("none").to_str().unwrap()).unwrap();
        config.logging.access_log = false;
        Arc::new(AppState::new(&config, store))
    }

    fn memory_state() -> Arc<AppState> {
        test_state(Arc::new(MemoryStore::new()))
    }

    fn request(method: &str, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> (u16, HttpResponse) {
        let peer: SocketAddr = "10.0.0.7:50123".parse().unwrap();
        let resp = handle_request(req, Arc::clone(state), peer).await.unwrap();
        (resp.status().as_u16(), resp)
    }

    async fn body_json(resp: HttpResponse) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors(resp: &HttpResponse) {
        for (name, value) in CORS_HEADERS {
            assert_eq!(resp.headers().get(name).unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_direct_post_then_get() {
        let state = memory_state();

        let (status, resp) = send(&state, request("POST", "/visitor-count", "")).await;
        assert_eq!(status, 200);
        assert_cors(&resp);
        let body = body_json(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["action"], "increment");

        let (_, resp) = send(&state, request("GET", "/anything/else", "")).await;
        let body = body_json(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["action"], "get");
    }

    #[tokio::test]
    async fn test_direct_options_and_delete() {
        let state = memory_state();

        let (status, resp) = send(&state, request("OPTIONS", "/visitor-count", "")).await;
        assert_eq!(status, 200);
        assert_cors(&resp);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());

        let (status, resp) = send(&state, request("DELETE", "/visitor-count", "")).await;
        assert_eq!(status, 405);
        assert_cors(&resp);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Method not allowed: DELETE");
    }

    #[tokio::test]
    async fn test_invoke_wraps_envelope() {
        let state = memory_state();

        let (status, resp) = send(&state, request("POST", "/invoke", r#"{"httpMethod":"POST"}"#)).await;
        assert_eq!(status, 200);
        assert_cors(&resp);
        let envelope = body_json(resp).await;
        assert_eq!(envelope["statusCode"], 200);
        let inner: Value = serde_json::from_str(envelope["body"].as_str().unwrap()).unwrap();
        assert_eq!(inner["count"], 1);

        // Absent event and null method both increment
        for body in ["", "null", r#"{"httpMethod":null}"#] {
            send(&state, request("POST", "/invoke", body)).await;
        }
        assert_eq!(state.dispatcher.current_count().unwrap(), 4);

        let (_, resp) = send(&state, request("POST", "/invoke", r#"{"httpMethod":"PATCH"}"#)).await;
        let envelope = body_json(resp).await;
        assert_eq!(envelope["statusCode"], 405);
    }

    #[tokio::test]
    async fn test_invoke_rejects_malformed_json() {
        let state = memory_state();
        let (status, resp) = send(&state, request("POST", "/invoke", "{not json")).await;
        assert_eq!(status, 400);
        assert_cors(&resp);
        assert_eq!(body_json(resp).await["statusCode"], 400);
        assert_eq!(state.dispatcher.current_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let state = test_state(Arc::new(DownStore));
        let (status, resp) = send(&state, request("GET", "/visitor-count", "")).await;
        assert_eq!(status, 500);
        assert_cors(&resp);
        let body = body_json(resp).await;
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["error"], "Failed to retrieve visitor count");
    }

    #[tokio::test]
    async fn test_health_probes() {
        let state = memory_state();
        let (status, _) = send(&state, request("GET", "/healthz", "")).await;
        assert_eq!(status, 200);
        let (status, _) = send(&state, request("GET", "/readyz", "")).await;
        assert_eq!(status, 200);

        let down = test_state(Arc::new(DownStore));
        let (status, _) = send(&down, request("GET", "/healthz", "")).await;
        assert_eq!(status, 200);
        let (status, _) = send(&down, request("GET", "/readyz", "")).await;
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let state = memory_state();
        let mut req = request("POST", "/visitor-count", "");
        req.headers_mut()
            .insert("content-length", "1048576".parse().unwrap());
        let (status, _) = send(&state, req).await;
        assert_eq!(status, 413);
        assert_eq!(state.dispatcher.current_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_streamed_oversized_invoke_rejected() {
        let state = memory_state();
        let limit = usize::try_from(state.config.http.max_body_size).unwrap();

        // No Content-Length: the size is only known once the body is read
        let mut body = " ".repeat(limit * 4);
        body.push_str(r#"{"httpMethod":"POST"}"#);
        let req = request("POST", "/invoke", &body);
        assert!(req.headers().get("content-length").is_none());

        let (status, _) = send(&state, req).await;
        assert_eq!(status, 413);
        assert_eq!(state.dispatcher.current_count().unwrap(), 0);

        // A body right at the limit is still accepted
        let mut body = " ".repeat(limit - r#"{"httpMethod":"POST"}"#.len());
        body.push_str(r#"{"httpMethod":"POST"}"#);
        let (status, _) = send(&state, request("POST", "/invoke", &body)).await;
        assert_eq!(status, 200);
        assert_eq!(state.dispatcher.current_count().unwrap(), 1);
    }

    #[test]
    fn test_proxy_request_from_http() {
        let req = Request::builder()
            .method("GET")
            .uri("/visitor-count?x=1")
            .header("Origin", "https://resume.example.com")
            .body(())
            .unwrap();
        let event = proxy_request_from(&req);
        assert_eq!(event.http_method.as_deref(), Some("GET"));
        assert_eq!(event.path.as_deref(), Some("/visitor-count"));
        assert_eq!(
            event.headers.unwrap().get("origin").cloned().flatten().as_deref(),
            Some("https://resume.example.com")
        );
    }

    #[test]
    fn test_parse_event() {
        assert_eq!(parse_event(b"").unwrap(), None);
        assert_eq!(parse_event(b"  \n").unwrap(), None);
        assert_eq!(parse_event(b"null").unwrap(), None);
        assert_eq!(
            parse_event(br#"{"httpMethod":"GET"}"#).unwrap(),
            Some(ProxyRequest::with_method("GET"))
        );
        assert!(parse_event(b"[1,2]").is_err());
    }

    #[tokio::test]
    async fn test_invoke_accepts_null_header_values() {
        let state = memory_state();
        let event = r#"{"httpMethod":"POST","headers":{"Accept":null,"Origin":"https://resume.example.com"}}"#;
        let (status, resp) = send(&state, request("POST", "/invoke", event)).await;
        assert_eq!(status, 200);
        assert_eq!(body_json(resp).await["statusCode"], 200);
        assert_eq!(state.dispatcher.current_count().unwrap(), 1);
    }
}
