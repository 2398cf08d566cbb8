// Proxy event types
// Request/response envelopes in the API-Gateway proxy shape (camelCase JSON)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inbound event. Only `http_method` drives routing; the rest is logged.
/// Header values may be `null` in gateway events and are kept as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, Option<String>>>,
}

impl ProxyRequest {
    pub fn with_method(method: impl Into<String>) -> Self {
        Self {
            http_method: Some(method.into()),
            ..Self::default()
        }
    }
}

/// Outbound envelope returned by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}
