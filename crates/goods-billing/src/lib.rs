//! # goods-billing
//!
//! Client for the digital purchases billing API.
//!
//! ## Call shape
//!
//! ```text
//! ┌──────────────┐  fetch_credential  ┌───────────────────┐
//! │ BillingClient│───────────────────▶│ CredentialProvider│  (service account → token)
//! │              │                    └───────────────────┘
//! │              │  POST skus:batchGet (in-app, then subscriptions)
//! │              │  POST entitlement:consume
//! └──────────────┘──────────────────▶ billing API
//! ```
//!
//! A credential is acquired for every call and nothing is retried. Responses
//! up to 207 are successes; anything else is classified for the logs and
//! returned as [`BillingError::Api`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use goods_billing::{BillingApi, BillingClient};
//!
//! let client = BillingClient::from_env();
//! let skus = client.fetch_sku_details("conversation-id").await?;
//! ```

mod client;
mod config;
mod credential;
mod error;
mod mock;
mod sku;
mod status;

pub use client::{BillingApi, BillingClient};
pub use config::{BillingConfig, CatalogConfig, DEFAULT_API_BASE, DIGITAL_PURCHASES_SCOPE};
pub use credential::{
    Credential, CredentialProvider, ServiceAccountCredentials, ServiceAccountKey, StaticCredential,
};
pub use error::{BillingError, Result};
pub use mock::{ConsumeCall, MockBillingApi};
pub use sku::{SkuDetails, SkuId, SkuType};
pub use status::StatusClass;
