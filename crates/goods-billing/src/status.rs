//! HTTP Status Classification
//!
//! The billing API treats anything up to 207 Multi-Status as success. Every
//! other status is bucketed for diagnostics only; callers see a uniform failure.

use serde::{Deserialize, Serialize};

/// Upper bound (inclusive) of the success range
pub const LAST_SUCCESS_STATUS: u16 = 207;

/// Coarse class of a billing API response status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
    Unknown,
}

impl StatusClass {
    /// Classify a raw status code
    pub fn classify(status: u16) -> Self {
        match status {
            0..=LAST_SUCCESS_STATUS => StatusClass::Success,
            500.. => StatusClass::ServerError,
            400..=499 => StatusClass::ClientError,
            300..=399 => StatusClass::Redirect,
            _ => StatusClass::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusClass::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusClass::Success => "success",
            StatusClass::Redirect => "redirect",
            StatusClass::ClientError => "client error",
            StatusClass::ServerError => "server error",
            StatusClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
