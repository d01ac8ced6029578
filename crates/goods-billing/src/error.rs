//! Billing Error Types

use thiserror::Error;

use crate::status::StatusClass;

/// Result type alias
pub type Result<T> = std::result::Result<T, BillingError>;

/// Billing-related errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Credential could not be loaded or refreshed
    #[error("Auth error: {0}")]
    Auth(String),

    /// Billing API answered with a non-success status
    #[error("Billing API returned {status} ({class}) for {url}")]
    Api {
        url: String,
        status: u16,
        class: StatusClass,
    },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was not the expected JSON
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BillingError {
    /// Check if this error is retryable
    ///
    /// Informational only: the client itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Api { class, .. } => *class == StatusClass::ServerError,
            BillingError::Transport(_) => true,
            _ => false,
        }
    }

    /// True when the API answered but refused the request
    pub fn is_api(&self) -> bool {
        matches!(self, BillingError::Api { .. })
    }
}
