//! Error Types

use thiserror::Error;

use goods_billing::BillingError;

/// Result type alias for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Purchase flow error types
#[derive(Error, Debug)]
pub enum FlowError {
    /// Billing API or credential failure
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    /// Selected SKU is not in the session's catalog snapshot
    #[error("SKU not found in catalog snapshot: {0}")]
    Lookup(String),

    /// Expected platform argument is missing or malformed
    #[error("Missing or invalid argument: {0}")]
    Argument(String),

    /// Session data missing or undecodable
    #[error("Session error: {0}")]
    Session(String),

    /// Consumption of a purchased item failed
    #[error("Consumption error: {0}")]
    Consumption(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether the conversation can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FlowError::Lookup(_) | FlowError::Consumption(_))
    }
}
