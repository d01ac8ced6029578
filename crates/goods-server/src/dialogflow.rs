//! Dialogflow Webhook Envelope
//!
//! Dialogflow v2 fulfillment request/response with the Actions on Google
//! payload, mapped onto the flow's turn types. Session state rides in the
//! `_actions_on_google` output context as a JSON string under `data`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use goods_flow::{
    Argument, Directive, Intent, PackageEntitlement, SessionState, TurnRequest, TurnResponse,
};

/// Output context that carries conversation data
pub const SESSION_DATA_CONTEXT: &str = "_actions_on_google";

/// Lifespan the platform gives the conversation data context
pub const SESSION_DATA_LIFESPAN: u32 = 99;

pub const SCREEN_OUTPUT_CAPABILITY: &str = "actions.capability.SCREEN_OUTPUT";

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub response_id: String,

    /// `projects/<project>/agent/sessions/<id>`
    #[serde(default)]
    pub session: String,

    #[serde(default)]
    pub query_result: QueryResult,

    #[serde(default)]
    pub original_detect_intent_request: Option<OriginalRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default)]
    pub intent: Option<IntentRef>,

    #[serde(default)]
    pub output_contexts: Vec<OutputContext>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRef {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputContext {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifespan_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl OutputContext {
    /// Last path segment of the context name
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalRequest {
    #[serde(default)]
    pub payload: AppRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRequest {
    #[serde(default)]
    pub user: Option<User>,

    #[serde(default)]
    pub conversation: Option<Conversation>,

    #[serde(default)]
    pub inputs: Vec<Input>,

    #[serde(default)]
    pub surface: Option<Surface>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub package_entitlements: Vec<PackageEntitlement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    pub conversation_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Surface {
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Capability {
    pub name: String,
}

impl WebhookRequest {
    fn app_request(&self) -> Option<&AppRequest> {
        self.original_detect_intent_request
            .as_ref()
            .map(|original| &original.payload)
    }

    /// Platform conversation id, falling back to the Dialogflow session id
    pub fn conversation_id(&self) -> String {
        self.app_request()
            .and_then(|app| app.conversation.as_ref())
            .map(|c| c.conversation_id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| {
                self.session
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.app_request()
            .and_then(|app| app.surface.as_ref())
            .is_some_and(|surface| surface.capabilities.iter().any(|c| c.name == capability))
    }

    /// Conversation data from the session context; undecodable data is dropped
    pub fn session_state(&self) -> SessionState {
        let data = self
            .query_result
            .output_contexts
            .iter()
            .find(|ctx| ctx.short_name() == SESSION_DATA_CONTEXT)
            .and_then(|ctx| ctx.parameters.get("data"))
            .and_then(Value::as_str);

        let Some(data) = data else {
            return SessionState::default();
        };

        SessionState::from_json(data).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding undecodable conversation data");
            SessionState::default()
        })
    }

    /// Map onto the flow's turn type
    pub fn to_turn(&self) -> TurnRequest {
        let intent = self
            .query_result
            .intent
            .as_ref()
            .map_or_else(Intent::default, |i| Intent::from_name(&i.display_name));

        let arguments = self
            .app_request()
            .map(|app| {
                app.inputs
                    .iter()
                    .flat_map(|input| input.arguments.iter().cloned())
                    .collect()
            })
            .unwrap_or_default();

        let entitlements = self
            .app_request()
            .and_then(|app| app.user.as_ref())
            .map(|user| user.package_entitlements.clone())
            .unwrap_or_default();

        TurnRequest {
            intent,
            conversation_id: self.conversation_id(),
            arguments,
            parameters: self.query_result.parameters.clone(),
            screen_output: self.has_capability(SCREEN_OUTPUT_CAPABILITY),
            entitlements,
            session: self.session_state(),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub payload: ResponsePayload,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_contexts: Vec<OutputContext>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub google: GooglePayload,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePayload {
    pub expect_user_response: bool,

    pub rich_response: RichResponse,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_intent: Option<SystemIntent>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RichResponse {
    pub items: Vec<RichItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichItem {
    pub simple_response: SimpleResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleResponse {
    pub text_to_speech: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemIntent {
    pub intent: String,
    pub data: Value,
}

impl SystemIntent {
    pub fn from_directive(directive: &Directive) -> Self {
        match directive {
            Directive::DigitalPurchaseCheck => Self {
                intent: "actions.intent.DIGITAL_PURCHASE_CHECK".into(),
                data: json!({
                    "@type": "type.googleapis.com/google.actions.transactions.v3.DigitalPurchaseCheckSpec",
                }),
            },
            Directive::SelectionCarousel(items) => {
                let items: Vec<Value> = items
                    .iter()
                    .map(|item| {
                        json!({
                            "optionInfo": {"key": item.key, "synonyms": []},
                            "title": item.title,
                            "description": item.description,
                        })
                    })
                    .collect();
                Self {
                    intent: "actions.intent.OPTION".into(),
                    data: json!({
                        "@type": "type.googleapis.com/google.actions.v2.OptionValueSpec",
                        "carouselSelect": {"items": items},
                    }),
                }
            }
            Directive::CompletePurchase(sku_id) => Self {
                intent: "actions.intent.COMPLETE_PURCHASE".into(),
                data: json!({
                    "@type": "type.googleapis.com/google.actions.transactions.v3.CompletePurchaseValueSpec",
                    "skuId": sku_id,
                }),
            },
        }
    }
}

impl WebhookResponse {
    /// Render a flow response for the Dialogflow session `session`
    ///
    /// Context names are scoped to the session path, so an empty `session`
    /// renders no output contexts.
    pub fn render(session: &str, response: &TurnResponse) -> Self {
        let mut items: Vec<RichItem> = response
            .speech
            .iter()
            .map(|text| RichItem {
                simple_response: SimpleResponse {
                    text_to_speech: text.clone(),
                },
            })
            .collect();

        // Helpers still need a leading simple response.
        if items.is_empty() && response.directive.is_some() {
            items.push(RichItem {
                simple_response: SimpleResponse {
                    text_to_speech: "PLACEHOLDER".into(),
                },
            });
        }

        let suggestions = response
            .suggestions
            .iter()
            .map(|title| Suggestion {
                title: title.clone(),
            })
            .collect();

        Self {
            payload: ResponsePayload {
                google: GooglePayload {
                    expect_user_response: !response.end_conversation,
                    rich_response: RichResponse { items, suggestions },
                    system_intent: response.directive.as_ref().map(SystemIntent::from_directive),
                },
            },
            output_contexts: output_contexts(session, response),
        }
    }

    /// Conversation data carried by this response
    pub fn session_data(&self) -> Option<&str> {
        self.output_contexts
            .iter()
            .find(|ctx| ctx.short_name() == SESSION_DATA_CONTEXT)?
            .parameters
            .get("data")?
            .as_str()
    }
}

fn output_contexts(session: &str, response: &TurnResponse) -> Vec<OutputContext> {
    if session.is_empty() {
        tracing::warn!("Request has no session path, dropping output contexts");
        return Vec::new();
    }

    let mut contexts: Vec<OutputContext> = response
        .contexts
        .iter()
        .map(|ctx| OutputContext {
            name: format!("{session}/contexts/{}", ctx.name),
            lifespan_count: Some(ctx.lifespan),
            parameters: Map::new(),
        })
        .collect();

    match response.session.to_json() {
        Ok(data) => {
            let mut parameters = Map::new();
            parameters.insert("data".into(), Value::String(data));
            contexts.push(OutputContext {
                name: format!("{session}/contexts/{SESSION_DATA_CONTEXT}"),
                lifespan_count: Some(SESSION_DATA_LIFESPAN),
                parameters,
            });
        }
        Err(e) => tracing::error!(error = %e, "Cannot encode conversation data"),
    }
    contexts
}
