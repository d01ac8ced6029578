//! Session State
//!
//! Per-conversation scratch data carried between turns by the dialogue
//! platform: the catalog shown to the user and the item they picked.

use std::collections::HashMap;

use goods_billing::SkuDetails;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Session key holding the catalog snapshot
pub const SKU_DETAILS_LIST_KEY: &str = "skuDetailsList";

/// Session key holding the selected item
pub const PURCHASED_ITEM_SKU_KEY: &str = "purchasedItemSku";

/// Catalog shown on a "build the order" turn, keyed by SKU id
///
/// Serialized as `{"skus": [...]}` in presentation order; the id index is
/// rebuilt on load and duplicate ids are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRepr", into = "SnapshotRepr")]
pub struct SkuCatalogSnapshot {
    skus: Vec<SkuDetails>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotRepr {
    skus: Vec<SkuDetails>,
}

impl TryFrom<SnapshotRepr> for SkuCatalogSnapshot {
    type Error = String;

    fn try_from(repr: SnapshotRepr) -> std::result::Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(repr.skus.len());
        for (position, sku) in repr.skus.iter().enumerate() {
            if index.insert(sku.id().to_string(), position).is_some() {
                return Err(format!("duplicate SKU id in snapshot: {}", sku.id()));
            }
        }
        Ok(Self {
            skus: repr.skus,
            index,
        })
    }
}

impl From<SkuCatalogSnapshot> for SnapshotRepr {
    fn from(snapshot: SkuCatalogSnapshot) -> Self {
        Self {
            skus: snapshot.skus,
        }
    }
}

impl SkuCatalogSnapshot {
    /// Build from a completed fetch
    ///
    /// The same item id can come back under two SKU types; the first one wins.
    pub fn build(fetched: Vec<SkuDetails>) -> Self {
        let mut skus = Vec::with_capacity(fetched.len());
        let mut index = HashMap::with_capacity(fetched.len());

        for sku in fetched {
            if index.contains_key(sku.id()) {
                tracing::warn!(sku_id = %sku.id(), "Duplicate SKU id in catalog, keeping the first");
                continue;
            }
            index.insert(sku.id().to_string(), skus.len());
            skus.push(sku);
        }

        Self { skus, index }
    }

    pub fn get(&self, sku_id: &str) -> Option<&SkuDetails> {
        self.index.get(sku_id).map(|&i| &self.skus[i])
    }

    /// Items in presentation order
    pub fn skus(&self) -> &[SkuDetails] {
        &self.skus
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.skus.iter().map(SkuDetails::id)
    }

    pub fn len(&self) -> usize {
        self.skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }
}

/// Item the user chose, held until the purchase outcome arrives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseContext(pub SkuDetails);

impl PurchaseContext {
    pub fn sku(&self) -> &SkuDetails {
        &self.0
    }
}

/// Everything the flow remembers about one conversation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(
        rename = "skuDetailsList",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub catalog: Option<SkuCatalogSnapshot>,

    #[serde(
        rename = "purchasedItemSku",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase: Option<PurchaseContext>,
}

impl SessionState {
    /// Decode the platform's conversation data blob
    pub fn from_json(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(data).map_err(|e| FlowError::Session(e.to_string()))
    }

    /// Encode for the platform's conversation data blob
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read and discard the purchase context
    pub fn take_purchase(&mut self) -> Option<PurchaseContext> {
        self.purchase.take()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_none() && self.purchase.is_none()
    }
}
