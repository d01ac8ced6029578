//! Billing API Client
//!
//! SKU lookup and purchase consumption over the digital purchases REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::BillingConfig;
use crate::credential::{Credential, CredentialProvider, ServiceAccountCredentials};
use crate::error::{BillingError, Result};
use crate::sku::{SkuBatch, SkuDetails, SkuType, merge_batches};
use crate::status::StatusClass;

/// Billing operations the purchase flow depends on
///
/// Implemented by [`BillingClient`] for the real API and by
/// [`MockBillingApi`](crate::MockBillingApi) for tests and demos.
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Look up every configured SKU: in-app items first, then subscriptions
    async fn fetch_sku_details(&self, conversation_id: &str) -> Result<Vec<SkuDetails>>;

    /// Mark a consumable purchase as used
    async fn consume_purchase(&self, conversation_id: &str, purchase_token: &str) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SkuBatchRequest<'a> {
    conversation_id: &'a str,
    sku_type: SkuType,
    ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsumeRequest<'a> {
    purchase_token: &'a str,
}

/// Digital purchases API client
///
/// Every call reacquires its credential. There is no retry; a failed call
/// fails the turn that made it.
pub struct BillingClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    config: BillingConfig,
}

impl BillingClient {
    /// Create a client backed by the configured service-account key
    pub fn new(config: BillingConfig) -> Self {
        let http = reqwest::Client::new();
        let credentials = Arc::new(ServiceAccountCredentials::new(
            config.credentials_path.clone(),
            config.scope.clone(),
            http.clone(),
        ));

        Self {
            http,
            credentials,
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(BillingConfig::from_env())
    }

    /// Use a different credential source
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Acquire a credential for one call
    pub async fn fetch_credential(&self) -> Result<Credential> {
        let credential = self.credentials.fetch_credential().await?;
        if credential.is_expired() {
            tracing::error!(expires_at = %credential.expires_at(), "Credential already expired");
            return Err(BillingError::Auth("credential already expired".into()));
        }
        Ok(credential)
    }

    async fn fetch_batch(
        &self,
        credential: &Credential,
        conversation_id: &str,
        sku_type: SkuType,
        ids: &[String],
    ) -> Result<SkuBatch> {
        let payload = SkuBatchRequest {
            conversation_id,
            sku_type,
            ids,
        };
        let body = self
            .call_api(&self.config.sku_endpoint(), &payload, credential)
            .await?;

        Ok(serde_json::from_value(Value::Object(body))?)
    }

    /// POST a JSON payload and classify the response
    async fn call_api<P: Serialize + Sync>(
        &self,
        url: &str,
        payload: &P,
        credential: &Credential,
    ) -> Result<Map<String, Value>> {
        tracing::debug!(url = %url, "Calling billing API");

        let response = self
            .http
            .post(url)
            .bearer_auth(credential.token())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let class = StatusClass::classify(status);

        if class.is_success() {
            let text = response.text().await?;
            tracing::debug!(url = %url, status, "Billing API response received");
            return parse_object(&text);
        }

        match class {
            StatusClass::ServerError => {
                tracing::error!(url = %url, status, "Billing API request failed");
            }
            StatusClass::ClientError => {
                tracing::error!(url = %url, status, "Bad request to billing API");
            }
            StatusClass::Redirect => {
                tracing::error!(url = %url, status, "Billing API request was redirected");
            }
            _ => {
                tracing::error!(url = %url, status, "Billing API request failed, please try again");
            }
        }

        Err(BillingError::Api {
            url: url.to_string(),
            status,
            class,
        })
    }
}

/// Parse a success body as a JSON object; an empty body is an empty object
fn parse_object(text: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        other => Err(BillingError::Decode(serde::de::Error::custom(format!(
            "expected a JSON object, got {other}"
        )))),
    }
}

#[async_trait]
impl BillingApi for BillingClient {
    async fn fetch_sku_details(&self, conversation_id: &str) -> Result<Vec<SkuDetails>> {
        let credential = self.fetch_credential().await?;
        let catalog = &self.config.catalog;

        let in_app = self
            .fetch_batch(&credential, conversation_id, SkuType::InApp, &catalog.in_app_ids)
            .await?;
        let subscriptions = self
            .fetch_batch(
                &credential,
                conversation_id,
                SkuType::Subscription,
                &catalog.subscription_ids,
            )
            .await?;

        let skus = merge_batches(in_app, subscriptions);
        tracing::info!(
            conversation_id = %conversation_id,
            count = skus.len(),
            "Fetched SKU details"
        );
        Ok(skus)
    }

    async fn consume_purchase(&self, conversation_id: &str, purchase_token: &str) -> Result<()> {
        let credential = self.fetch_credential().await?;
        let url = self.config.consume_endpoint(conversation_id);

        self.call_api(&url, &ConsumeRequest { purchase_token }, &credential)
            .await?;

        tracing::info!(conversation_id = %conversation_id, "Purchase consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticCredential;

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use chrono::{Duration, Utc};
    use serde_json::json;
    use tokio::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    async fn sku_batch(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Path(package): Path<String>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        seen.lock().await.push((auth, body.clone()));

        match package.as_str() {
            "broken" => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
            "missing" => return (StatusCode::NOT_FOUND, Json(json!({}))),
            "moved" => return (StatusCode::FOUND, Json(json!({}))),
            _ => {}
        }

        let skus: Vec<Value> = body["ids"]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| {
                json!({
                    "skuId": {"skuType": body["skuType"], "id": id, "packageName": package},
                    "title": id.as_str().unwrap().to_uppercase(),
                    "description": "",
                    "formattedPrice": "$1.00",
                })
            })
            .collect();
        (StatusCode::OK, Json(json!({ "skus": skus })))
    }

    async fn consume(
        State(seen): State<Seen>,
        Path(tail): Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        seen.lock().await.push((tail, body));
        StatusCode::OK
    }

    async fn spawn_api() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/v3/packages/{package}/skus:batchGet", post(sku_batch))
            .route("/v3/conversations/{tail}", post(consume))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    fn client_with(api_base: String, package: &str, credential: Credential) -> BillingClient {
        let mut config = BillingConfig {
            api_base,
            ..BillingConfig::default()
        };
        config.catalog.package_name = package.into();

        BillingClient::new(config).with_credentials(Arc::new(StaticCredential(credential)))
    }

    fn client(api_base: String, package: &str) -> BillingClient {
        let credential = Credential::new("test-token", Utc::now() + Duration::hours(1));
        client_with(api_base, package, credential)
    }

    #[tokio::test]
    async fn test_fetch_sku_details_merges_both_batches() {
        let (base, seen) = spawn_api().await;
        let client = client(base, "com.example.goods");

        let skus = client.fetch_sku_details("conv-1").await.unwrap();
        let ids: Vec<_> = skus.iter().map(SkuDetails::id).collect();
        assert_eq!(ids, ["premium", "gas", "gold_monthly", "gold_yearly"]);
        assert_eq!(skus[0].sku_id.sku_type, SkuType::InApp);
        assert_eq!(skus[3].sku_id.sku_type, SkuType::Subscription);

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "Bearer test-token");
        assert_eq!(seen[0].1["conversationId"], "conv-1");
        assert_eq!(seen[0].1["skuType"], "SKU_TYPE_IN_APP");
        assert_eq!(seen[1].1["skuType"], "SKU_TYPE_SUBSCRIPTION");
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let (base, _) = spawn_api().await;
        let client = client(base, "broken");

        let err = client.fetch_sku_details("conv-1").await.unwrap_err();
        match err {
            BillingError::Api { status, class, .. } => {
                assert_eq!(status, 500);
                assert_eq!(class, StatusClass::ServerError);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_and_redirect_are_api_errors() {
        let (base, seen) = spawn_api().await;

        for (package, expected_status, expected_class) in [
            ("missing", 404, StatusClass::ClientError),
            ("moved", 302, StatusClass::Redirect),
        ] {
            let err = client(base.clone(), package)
                .fetch_sku_details("conv-1")
                .await
                .unwrap_err();
            match err {
                BillingError::Api { status, class, url } => {
                    assert_eq!(status, expected_status);
                    assert_eq!(class, expected_class);
                    assert!(url.contains(package));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        // The in-app batch fails, so the subscription batch is never sent.
        assert_eq!(seen.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_credential_is_auth_error() {
        let (base, seen) = spawn_api().await;
        let expired = Credential::new("stale-token", Utc::now() - Duration::minutes(5));
        let client = client_with(base, "com.example.goods", expired);

        let err = client.fetch_sku_details("conv-1").await.unwrap_err();
        assert!(matches!(err, BillingError::Auth(_)));
        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_consume_posts_purchase_token() {
        let (base, seen) = spawn_api().await;
        let client = client(base, "com.example.goods");

        client.consume_purchase("conv-9", "token-abc").await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "conv-9entitlement:consume");
        assert_eq!(seen[0].1, json!({"purchaseToken": "token-abc"}));
    }

    #[test]
    fn test_parse_object() {
        assert!(parse_object("").unwrap().is_empty());
        assert_eq!(parse_object(r#"{"a": 1}"#).unwrap()["a"], 1);
        assert!(matches!(parse_object("[1, 2]"), Err(BillingError::Decode(_))));
    }
}
