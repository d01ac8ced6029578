//! Mock Billing API
//!
//! In-memory stand-in for the billing API. Serves a fixed catalog and records
//! every consumption request.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::BillingApi;
use crate::config::CatalogConfig;
use crate::error::{BillingError, Result};
use crate::sku::{SkuDetails, SkuId, SkuType};
use crate::status::StatusClass;

/// A recorded `consume_purchase` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumeCall {
    pub conversation_id: String,
    pub purchase_token: String,
}

type FetchFailure = Box<dyn Fn() -> BillingError + Send + Sync>;

/// Mock billing API with a static catalog
#[derive(Default)]
pub struct MockBillingApi {
    skus: Vec<SkuDetails>,
    fail_fetch: Option<FetchFailure>,
    fail_consume: bool,
    consumed: Mutex<Vec<ConsumeCall>>,
}

impl MockBillingApi {
    /// Serve exactly these SKUs
    pub fn new(skus: Vec<SkuDetails>) -> Self {
        Self {
            skus,
            ..Self::default()
        }
    }

    /// Demo catalog built from the configured product ids
    pub fn demo(catalog: &CatalogConfig) -> Self {
        let item = |sku_type, id: &String, price: &str| SkuDetails {
            sku_id: SkuId::new(sku_type, id.as_str(), catalog.package_name.as_str()),
            title: title_case(id),
            description: format!("Sample item {id}"),
            price: price.into(),
        };

        let skus = catalog
            .in_app_ids
            .iter()
            .map(|id| item(SkuType::InApp, id, "$0.99"))
            .chain(
                catalog
                    .subscription_ids
                    .iter()
                    .map(|id| item(SkuType::Subscription, id, "$4.99")),
            )
            .collect();

        Self::new(skus)
    }

    /// Answer every SKU lookup with this HTTP status
    pub fn failing_fetch(self, status: u16) -> Self {
        self.failing_fetch_with(move || BillingError::Api {
            url: "mock://skus:batchGet".into(),
            status,
            class: StatusClass::classify(status),
        })
    }

    /// Fail every SKU lookup with the error `make` builds
    pub fn failing_fetch_with<F>(mut self, make: F) -> Self
    where
        F: Fn() -> BillingError + Send + Sync + 'static,
    {
        self.fail_fetch = Some(Box::new(make));
        self
    }

    /// Fail every consumption request
    pub fn failing_consume(mut self) -> Self {
        self.fail_consume = true;
        self
    }

    /// Consumption requests received so far
    pub async fn consumed(&self) -> Vec<ConsumeCall> {
        self.consumed.lock().await.clone()
    }
}

#[async_trait]
impl BillingApi for MockBillingApi {
    async fn fetch_sku_details(&self, _conversation_id: &str) -> Result<Vec<SkuDetails>> {
        if let Some(make) = &self.fail_fetch {
            return Err(make());
        }
        Ok(self.skus.clone())
    }

    async fn consume_purchase(&self, conversation_id: &str, purchase_token: &str) -> Result<()> {
        self.consumed.lock().await.push(ConsumeCall {
            conversation_id: conversation_id.to_string(),
            purchase_token: purchase_token.to_string(),
        });

        if self.fail_consume {
            return Err(BillingError::Api {
                url: "mock://entitlement:consume".into(),
                status: 500,
                class: StatusClass::ServerError,
            });
        }
        Ok(())
    }
}

fn title_case(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
