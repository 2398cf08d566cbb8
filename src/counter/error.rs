//! Dispatcher error type

use crate::store::StoreError;
use thiserror::Error;

/// Everything that can go wrong while serving one counter event.
///
/// `Display` carries the detailed cause for the error log; clients only see
/// [`CounterError::public_message`].
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("store read failed: {0}")]
    StoreRead(#[source] StoreError),
    #[error("store write failed: {0}")]
    StoreWrite(#[source] StoreError),
    #[error("store acknowledged the add but returned no count")]
    MissingResultAfterWrite,
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    #[error("failed to serialize response body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CounterError {
    /// HTTP status reported for this error
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedMethod(_) => 405,
            _ => 500,
        }
    }

    /// Message placed in the `error` field of the response body
    pub fn public_message(&self) -> String {
        match self {
            Self::StoreRead(_) => "Failed to retrieve visitor count".to_string(),
            Self::StoreWrite(_) | Self::MissingResultAfterWrite => {
                "Failed to increment visitor count".to_string()
            }
            Self::UnsupportedMethod(method) => format!("Method not allowed: {method}"),
            Self::Serialization(_) => "Error creating response".to_string(),
            Self::Internal(detail) => format!("Internal server error: {detail}"),
        }
    }
}
