//! Request handler module
//!
//! Maps HTTP requests onto counter events and probes.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
