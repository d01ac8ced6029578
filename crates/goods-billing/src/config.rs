//! Billing Configuration
//!
//! Product ids and endpoints, read from the environment with sample defaults.

use std::path::PathBuf;

/// Digital purchases OAuth scope
pub const DIGITAL_PURCHASES_SCOPE: &str = "https://www.googleapis.com/auth/actions.purchases.digital";

/// Default billing API host
pub const DEFAULT_API_BASE: &str = "https://actions.googleapis.com";

/// Product ids offered by this assistant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Package the SKUs belong to
    pub package_name: String,

    /// One-time item ids
    pub in_app_ids: Vec<String>,

    /// Subscription plan ids
    pub subscription_ids: Vec<String>,

    /// In-app ids consumed right after purchase so they can be bought again
    pub consumable_ids: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            package_name: "PACKAGE_NAME".into(),
            in_app_ids: vec!["premium".into(), "gas".into()],
            subscription_ids: vec!["gold_monthly".into(), "gold_yearly".into()],
            consumable_ids: vec!["gas".into()],
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            package_name: std::env::var("GOODS_PACKAGE_NAME").unwrap_or(defaults.package_name),
            in_app_ids: env_list("GOODS_IN_APP_IDS").unwrap_or(defaults.in_app_ids),
            subscription_ids: env_list("GOODS_SUBSCRIPTION_IDS")
                .unwrap_or(defaults.subscription_ids),
            consumable_ids: env_list("GOODS_CONSUMABLE_IDS").unwrap_or(defaults.consumable_ids),
        }
    }

    /// Whether a purchased SKU must be consumed
    pub fn is_consumable(&self, sku_id: &str) -> bool {
        self.consumable_ids.iter().any(|id| id == sku_id)
    }
}

/// Billing client configuration
#[derive(Clone, Debug)]
pub struct BillingConfig {
    /// Billing API host, without trailing slash
    pub api_base: String,

    /// Service-account key file
    pub credentials_path: PathBuf,

    /// OAuth scope requested for the access token
    pub scope: String,

    /// Insert `/` between the conversation id and `entitlement:consume`
    ///
    /// Off by default, which reproduces the endpoint the service has always
    /// called. Flip only once the API contract is confirmed.
    pub consume_path_separator: bool,

    /// Products to look up
    pub catalog: CatalogConfig,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            credentials_path: PathBuf::from("credentials.json"),
            scope: DIGITAL_PURCHASES_SCOPE.into(),
            consume_path_separator: false,
            catalog: CatalogConfig::default(),
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_base: std::env::var("GOODS_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            credentials_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            scope: defaults.scope,
            consume_path_separator: std::env::var("GOODS_CONSUME_PATH_SEPARATOR")
                .ok()
                .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")),
            catalog: CatalogConfig::from_env(),
        }
    }

    /// `skus:batchGet` endpoint for the configured package
    pub fn sku_endpoint(&self) -> String {
        format!(
            "{}/v3/packages/{}/skus:batchGet",
            self.api_base, self.catalog.package_name
        )
    }

    /// Consumption endpoint for one conversation
    pub fn consume_endpoint(&self, conversation_id: &str) -> String {
        let separator = if self.consume_path_separator { "/" } else { "" };
        format!(
            "{}/v3/conversations/{}{}entitlement:consume",
            self.api_base, conversation_id, separator
        )
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if items.is_empty() { None } else { Some(items) }
}
