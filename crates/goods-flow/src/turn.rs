//! Turn Request and Response
//!
//! Platform-neutral shape of one conversational turn. The webhook adapter
//! fills a [`TurnRequest`] from the platform envelope and renders the
//! [`TurnResponse`] back into it.

use goods_billing::SkuId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::intent::Intent;
use crate::session::SessionState;

/// Context re-armed so the user can go round the order again
pub const BUILD_ORDER_CONTEXT: &str = "build-the-order";

/// Turns the build-order context stays alive
pub const BUILD_ORDER_LIFETIME: u32 = 5;

/// Argument carrying the eligibility check result
pub const DIGITAL_PURCHASE_CHECK_RESULT: &str = "DIGITAL_PURCHASE_CHECK_RESULT";

/// Argument carrying the carousel selection
pub const OPTION: &str = "OPTION";

/// Argument carrying the purchase outcome
pub const COMPLETE_PURCHASE_VALUE: &str = "COMPLETE_PURCHASE_VALUE";

/// Parameter carrying a spoken SKU choice
pub const SKU_PARAMETER: &str = "SKU";

/// One platform argument
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,

    /// Typed helper result (`@type` plus fields)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<Map<String, Value>>,
}

impl Argument {
    /// String field of the extension object
    pub fn extension_str(&self, field: &str) -> Option<&str> {
        self.extension.as_ref()?.get(field)?.as_str()
    }
}

/// In-app purchase proof attached to an entitlement
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppDetails {
    #[serde(default)]
    pub in_app_purchase_data: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app_data_signature: Option<String>,
}

/// Platform record that the user owns a SKU
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub sku: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app_details: Option<InAppDetails>,
}

impl Entitlement {
    /// Opaque token that authorizes consumption
    pub fn purchase_token(&self) -> Option<&str> {
        self.in_app_details
            .as_ref()?
            .in_app_purchase_data
            .get("purchaseToken")?
            .as_str()
    }
}

/// Entitlements grouped by app package
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntitlement {
    #[serde(default)]
    pub package_name: String,

    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
}

/// First entitlement for `sku_id`, scanning groups and entries in order
pub fn find_entitlement<'a>(
    groups: &'a [PackageEntitlement],
    sku_id: &str,
) -> Option<&'a Entitlement> {
    groups
        .iter()
        .flat_map(|group| group.entitlements.iter())
        .find(|entitlement| entitlement.sku == sku_id)
}

/// One inbound turn
#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    pub intent: Intent,
    pub conversation_id: String,
    pub arguments: Vec<Argument>,
    pub parameters: Map<String, Value>,
    pub screen_output: bool,
    pub entitlements: Vec<PackageEntitlement>,
    pub session: SessionState,
}

impl TurnRequest {
    pub fn new(intent: Intent, conversation_id: impl Into<String>) -> Self {
        Self {
            intent,
            conversation_id: conversation_id.into(),
            ..Self::default()
        }
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    /// Parameter as text; numbers are stringified, empty strings count as absent
    pub fn parameter(&self, name: &str) -> Option<String> {
        match self.parameters.get(name)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_screen(mut self, screen_output: bool) -> Self {
        self.screen_output = screen_output;
        self
    }

    pub fn with_entitlements(mut self, entitlements: Vec<PackageEntitlement>) -> Self {
        self.entitlements = entitlements;
        self
    }

    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }
}

/// Card in a selection carousel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselItem {
    /// Option key reported back when the card is chosen
    pub key: String,
    pub title: String,
    pub description: String,
}

/// Platform-native helper the response asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    DigitalPurchaseCheck,
    SelectionCarousel(Vec<CarouselItem>),
    CompletePurchase(SkuId),
}

/// Context to (re)activate with a turn lifetime
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextDirective {
    pub name: String,
    pub lifespan: u32,
}

impl ContextDirective {
    pub fn build_order() -> Self {
        Self {
            name: BUILD_ORDER_CONTEXT.into(),
            lifespan: BUILD_ORDER_LIFETIME,
        }
    }
}

/// What the assistant says and does next
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnResponse {
    pub speech: Vec<String>,
    pub suggestions: Vec<String>,
    pub directive: Option<Directive>,
    pub contexts: Vec<ContextDirective>,
    pub end_conversation: bool,
    pub session: SessionState,
}

impl TurnResponse {
    /// Start a response that carries the session forward
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    pub fn say(&mut self, text: impl Into<String>) -> &mut Self {
        self.speech.push(text.into());
        self
    }

    pub fn suggest(&mut self, chips: &[&str]) -> &mut Self {
        self.suggestions.extend(chips.iter().map(|s| (*s).to_string()));
        self
    }

    pub fn directive(&mut self, directive: Directive) -> &mut Self {
        self.directive = Some(directive);
        self
    }

    pub fn context(&mut self, context: ContextDirective) -> &mut Self {
        self.contexts.push(context);
        self
    }

    pub fn end(&mut self) -> &mut Self {
        self.end_conversation = true;
        self
    }

    /// Whole spoken text
    pub fn text(&self) -> String {
        self.speech.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entitlement(sku: &str, token: &str) -> Entitlement {
        serde_json::from_value(json!({
            "sku": sku,
            "skuType": "IN_APP",
            "inAppDetails": {"inAppPurchaseData": {"purchaseToken": token}}
        }))
        .unwrap()
    }

    #[test]
    fn test_find_entitlement_first_match_wins() {
        let groups = vec![
            PackageEntitlement {
                package_name: "com.other".into(),
                entitlements: vec![entitlement("premium", "t-premium")],
            },
            PackageEntitlement {
                package_name: "com.example".into(),
                entitlements: vec![entitlement("gas", "t-first"), entitlement("gas", "t-second")],
            },
            PackageEntitlement {
                package_name: "com.example.two".into(),
                entitlements: vec![entitlement("gas", "t-third")],
            },
        ];

        let found = find_entitlement(&groups, "gas").unwrap();
        assert_eq!(found.purchase_token(), Some("t-first"));
        assert!(find_entitlement(&groups, "gold_monthly").is_none());
    }

    #[test]
    fn test_entitlement_without_token() {
        let entitlement = Entitlement {
            sku: "gas".into(),
            ..Entitlement::default()
        };
        assert!(entitlement.purchase_token().is_none());
    }

    #[test]
    fn test_parameter_coercion() {
        let request = TurnRequest::new(Intent::InitiatePurchase, "conv")
            .with_parameter("SKU", "gas")
            .with_parameter("EMPTY", "")
            .with_parameter("NUM", 7);

        assert_eq!(request.parameter("SKU").as_deref(), Some("gas"));
        assert_eq!(request.parameter("EMPTY"), None);
        assert_eq!(request.parameter("NUM").as_deref(), Some("7"));
        assert_eq!(request.parameter("MISSING"), None);
    }

    #[test]
    fn test_argument_extension() {
        let arg: Argument = serde_json::from_value(json!({
            "name": "COMPLETE_PURCHASE_VALUE",
            "extension": {"purchaseStatus": "PURCHASE_STATUS_OK"}
        }))
        .unwrap();
        assert_eq!(arg.extension_str("purchaseStatus"), Some("PURCHASE_STATUS_OK"));
        assert_eq!(arg.extension_str("missing"), None);
    }
}
