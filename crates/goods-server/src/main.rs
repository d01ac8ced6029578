//! Digital goods webhook server
//!
//! Axum server answering Dialogflow fulfillment calls for an assistant that
//! sells in-app items and subscriptions.

mod config;
mod dialogflow;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use goods_billing::{BillingApi, BillingClient, BillingConfig, MockBillingApi};
use goods_flow::PurchaseFlow;

use crate::config::ServerConfig;
use crate::handlers::{fulfillment, health_check};
use crate::state::AppState;

/// Build the router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/fulfillment", post(fulfillment))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_config = ServerConfig::from_env();
    let billing_config = BillingConfig::from_env();
    let catalog = billing_config.catalog.clone();

    let billing: Arc<dyn BillingApi> = if server_config.mock_billing {
        tracing::warn!("⚠ Using mock billing - demo catalog, nothing is charged");
        Arc::new(MockBillingApi::demo(&catalog))
    } else {
        if !billing_config.credentials_path.exists() {
            tracing::warn!(
                path = %billing_config.credentials_path.display(),
                "⚠ Service account key not found - billing calls will fail"
            );
            tracing::warn!("  Set GOOGLE_APPLICATION_CREDENTIALS or GOODS_MOCK_BILLING=1 in .env");
        }
        tracing::info!(endpoint = %billing_config.sku_endpoint(), "✓ Billing API configured");
        Arc::new(BillingClient::new(billing_config))
    };

    tracing::info!("Catalog for package {}:", catalog.package_name);
    tracing::info!("  In-app:        {}", catalog.in_app_ids.join(", "));
    tracing::info!("  Subscriptions: {}", catalog.subscription_ids.join(", "));
    tracing::info!("  Consumable:    {}", catalog.consumable_ids.join(", "));

    let state = AppState {
        flow: Arc::new(PurchaseFlow::new(billing, catalog)),
        mock_billing: server_config.mock_billing,
    };

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 digital goods webhook running on http://{}", server_config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health      - Health check");
    tracing::info!("  POST /fulfillment - Dialogflow webhook");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
