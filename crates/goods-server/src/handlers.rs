//! HTTP Handlers

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::Instrument;

use crate::dialogflow::{WebhookRequest, WebhookResponse};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub billing: &'static str,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        billing: if state.mock_billing { "mock" } else { "live" },
    })
}

/// Dialogflow fulfillment endpoint, one call per conversation turn
pub async fn fulfillment(
    State(state): State<AppState>,
    Json(payload): Json<WebhookRequest>,
) -> Json<WebhookResponse> {
    let turn = payload.to_turn();
    let span = tracing::info_span!(
        "turn",
        turn_id = %uuid::Uuid::new_v4(),
        response_id = %payload.response_id,
        intent = %turn.intent,
        conversation_id = %turn.conversation_id,
    );
    span.in_scope(|| tracing::debug!(query = %payload.query_result.query_text, "User said"));

    let response = state.flow.handle(turn).instrument(span).await;
    Json(WebhookResponse::render(&payload.session, &response))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use goods_billing::{CatalogConfig, MockBillingApi};
    use goods_flow::{PurchaseFlow, SessionState, messages};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::app;

    const SESSION: &str = "projects/goods/agent/sessions/s-1";

    fn state(api: Arc<MockBillingApi>) -> AppState {
        AppState {
            flow: Arc::new(PurchaseFlow::new(api, CatalogConfig::default())),
            mock_billing: true,
        }
    }

    async fn post(state: AppState, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/fulfillment")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn turn(intent: &str, payload: Value, contexts: Value) -> Value {
        json!({
            "session": SESSION,
            "queryResult": {
                "intent": {"displayName": intent},
                "parameters": {},
                "outputContexts": contexts
            },
            "originalDetectIntentRequest": {"source": "google", "payload": payload}
        })
    }

    fn speech(body: &Value) -> &str {
        body["payload"]["google"]["richResponse"]["items"][0]["simpleResponse"]["textToSpeech"]
            .as_str()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_health() {
        let api = Arc::new(MockBillingApi::default());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app(state(api)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_order_then_select_round_trips_session() {
        let api = Arc::new(MockBillingApi::demo(&CatalogConfig::default()));

        let payload = json!({
            "conversation": {"conversationId": "conv-7"},
            "surface": {"capabilities": [{"name": "actions.capability.SCREEN_OUTPUT"}]}
        });
        let (status, body) = post(
            state(api.clone()),
            turn("Build the Order", payload.clone(), json!([])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(speech(&body).starts_with(messages::FOUND_ITEMS));
        assert_eq!(body["payload"]["google"]["systemIntent"]["intent"], "actions.intent.OPTION");

        // Feed the returned contexts back, as the platform would.
        let contexts = body["outputContexts"].clone();
        let mut payload = payload;
        payload["inputs"] = json!([{
            "intent": "actions.intent.OPTION",
            "arguments": [{"name": "OPTION", "textValue": "gas"}]
        }]);
        let (_, body) = post(state(api), turn("Initiate the Purchase", payload, contexts)).await;

        assert_eq!(speech(&body), messages::HERE_YOU_GO);
        let google = &body["payload"]["google"];
        assert_eq!(google["systemIntent"]["intent"], "actions.intent.COMPLETE_PURCHASE");
        assert_eq!(google["systemIntent"]["data"]["skuId"]["id"], "gas");

        let data = body["outputContexts"]
            .as_array()
            .unwrap()
            .iter()
            .find_map(|ctx| ctx["parameters"]["data"].as_str())
            .unwrap();
        let session = SessionState::from_json(data).unwrap();
        assert_eq!(session.purchase.unwrap().sku().id(), "gas");
    }

    #[tokio::test]
    async fn test_cannot_purchase_ends_conversation() {
        let api = Arc::new(MockBillingApi::default());
        let payload = json!({
            "inputs": [{"arguments": [{
                "name": "DIGITAL_PURCHASE_CHECK_RESULT",
                "extension": {"resultType": "CANNOT_PURCHASE"}
            }]}]
        });

        let (_, body) = post(state(api), turn("Digital Purchase Check", payload, json!([]))).await;
        assert_eq!(speech(&body), messages::NOT_ELIGIBLE);
        assert_eq!(body["payload"]["google"]["expectUserResponse"], false);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let api = Arc::new(MockBillingApi::default());
        let (status, _) = post(state(api), json!({"queryResult": "nope"})).await;
        assert!(status.is_client_error());
    }
}
