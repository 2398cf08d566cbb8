//! Visitor counter module
//!
//! Turns proxy events into counter operations against the store:
//! - `event`: request/response envelopes
//! - `action`: method normalization and routing
//! - `dispatcher`: store calls and failure mapping
//! - `response`: JSON bodies and the fixed CORS header set

mod action;
mod dispatcher;
mod error;
mod event;
pub mod response;

pub use dispatcher::Dispatcher;
pub use error::CounterError;
pub use event::{ProxyRequest, ProxyResponse};
