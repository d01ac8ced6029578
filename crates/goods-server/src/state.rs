//! Application State

use std::sync::Arc;

use goods_flow::PurchaseFlow;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Purchase flow wired to the billing backend
    pub flow: Arc<PurchaseFlow>,

    /// Whether the billing backend is the demo mock
    pub mock_billing: bool,
}
