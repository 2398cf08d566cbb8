//! HTTP protocol layer module
//!
//! Converts counter envelopes into hyper responses and builds the few
//! responses the front end produces on its own.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_413_response, build_bad_request_response, build_envelope_response,
    build_health_response, build_proxy_response, HttpResponse,
};
