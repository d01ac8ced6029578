//! SKU Model
//!
//! Purchasable items as the billing API describes them.

use serde::{Deserialize, Serialize};

/// Kind of purchasable item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkuType {
    #[serde(rename = "SKU_TYPE_IN_APP")]
    InApp,
    #[serde(rename = "SKU_TYPE_SUBSCRIPTION")]
    Subscription,
    #[serde(rename = "SKU_TYPE_UNSPECIFIED", other)]
    Unspecified,
}

/// Item identifier, unique within its type
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuId {
    pub sku_type: SkuType,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package_name: String,
}

impl SkuId {
    pub fn new(sku_type: SkuType, id: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            sku_type,
            id: id.into(),
            package_name: package_name.into(),
        }
    }
}

/// One purchasable item as returned by the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuDetails {
    pub sku_id: SkuId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Display price, already formatted by the billing API
    #[serde(rename = "formattedPrice", default)]
    pub price: String,
}

impl SkuDetails {
    /// Item identifier used as the catalog key
    pub fn id(&self) -> &str {
        &self.sku_id.id
    }
}

/// Body of a `skus:batchGet` response
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct SkuBatch {
    #[serde(default)]
    pub skus: Vec<SkuDetails>,
}

/// Join two batches: in-app items first, then subscriptions, each in API order
pub(crate) fn merge_batches(in_app: SkuBatch, subscriptions: SkuBatch) -> Vec<SkuDetails> {
    let mut skus = in_app.skus;
    skus.extend(subscriptions.skus);
    skus
}
