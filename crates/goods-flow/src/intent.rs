//! Intents and Platform Result Values
//!
//! Names the dialogue platform uses for the turns of the purchase flow, and
//! the result values it reports back from its purchase helpers.

use serde::{Deserialize, Serialize};

/// Intent handled by the purchase flow
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Conversation start; asks the platform for an eligibility check
    Welcome,
    /// Eligibility check result
    DigitalPurchaseCheck,
    /// List the items for sale
    BuildOrder,
    /// User picked an item
    InitiatePurchase,
    /// Purchase helper finished
    DescribePurchaseStatus,
    /// Anything this webhook does not handle
    Unknown(String),
}

impl Intent {
    pub const WELCOME: &'static str = "Default Welcome Intent";
    pub const DIGITAL_PURCHASE_CHECK: &'static str = "Digital Purchase Check";
    pub const BUILD_ORDER: &'static str = "Build the Order";
    pub const INITIATE_PURCHASE: &'static str = "Initiate the Purchase";
    pub const DESCRIBE_PURCHASE_STATUS: &'static str = "Describe the Purchase Status";

    pub fn from_name(name: &str) -> Self {
        match name {
            Self::WELCOME => Intent::Welcome,
            Self::DIGITAL_PURCHASE_CHECK => Intent::DigitalPurchaseCheck,
            Self::BUILD_ORDER => Intent::BuildOrder,
            Self::INITIATE_PURCHASE => Intent::InitiatePurchase,
            Self::DESCRIBE_PURCHASE_STATUS => Intent::DescribePurchaseStatus,
            other => Intent::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Intent::Welcome => Self::WELCOME,
            Intent::DigitalPurchaseCheck => Self::DIGITAL_PURCHASE_CHECK,
            Intent::BuildOrder => Self::BUILD_ORDER,
            Intent::InitiatePurchase => Self::INITIATE_PURCHASE,
            Intent::DescribePurchaseStatus => Self::DESCRIBE_PURCHASE_STATUS,
            Intent::Unknown(name) => name,
        }
    }
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Unknown(String::new())
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of the platform's digital purchase eligibility check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityResult {
    CanPurchase,
    CannotPurchase,
    Unspecified,
}

impl EligibilityResult {
    /// Parse a `resultType` value; unknown values count as unspecified
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("CAN_PURCHASE") {
            EligibilityResult::CanPurchase
        } else if value.eq_ignore_ascii_case("CANNOT_PURCHASE") {
            EligibilityResult::CannotPurchase
        } else {
            if !value.eq_ignore_ascii_case("RESULT_TYPE_UNSPECIFIED") {
                tracing::warn!(result_type = %value, "Unrecognized eligibility result");
            }
            EligibilityResult::Unspecified
        }
    }
}

/// Result of a purchase attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOutcome {
    Ok,
    AlreadyOwned,
    ItemUnavailable,
    ItemChangeRequested,
    UserCancelled,
    Error,
    Unspecified,
}

impl PurchaseOutcome {
    const ALL: [PurchaseOutcome; 7] = [
        PurchaseOutcome::Ok,
        PurchaseOutcome::AlreadyOwned,
        PurchaseOutcome::ItemUnavailable,
        PurchaseOutcome::ItemChangeRequested,
        PurchaseOutcome::UserCancelled,
        PurchaseOutcome::Error,
        PurchaseOutcome::Unspecified,
    ];

    /// Platform value, e.g. `PURCHASE_STATUS_OK`
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOutcome::Ok => "PURCHASE_STATUS_OK",
            PurchaseOutcome::AlreadyOwned => "PURCHASE_STATUS_ALREADY_OWNED",
            PurchaseOutcome::ItemUnavailable => "PURCHASE_STATUS_ITEM_UNAVAILABLE",
            PurchaseOutcome::ItemChangeRequested => "PURCHASE_STATUS_ITEM_CHANGE_REQUESTED",
            PurchaseOutcome::UserCancelled => "PURCHASE_STATUS_USER_CANCELLED",
            PurchaseOutcome::Error => "PURCHASE_STATUS_ERROR",
            PurchaseOutcome::Unspecified => "PURCHASE_STATUS_UNSPECIFIED",
        }
    }

    /// Parse a `purchaseStatus` value, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.as_str().eq_ignore_ascii_case(value))
    }

    /// Whether the user goes back to building an order
    pub fn loops_back(&self) -> bool {
        matches!(
            self,
            PurchaseOutcome::Ok
                | PurchaseOutcome::ItemChangeRequested
                | PurchaseOutcome::UserCancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_names() {
        assert_eq!(Intent::from_name("Build the Order"), Intent::BuildOrder);
        assert_eq!(
            Intent::from_name("Default Fallback Intent"),
            Intent::Unknown("Default Fallback Intent".into())
        );
        assert_eq!(Intent::InitiatePurchase.name(), "Initiate the Purchase");
    }

    #[test]
    fn test_eligibility_parse() {
        assert_eq!(EligibilityResult::parse("can_purchase"), EligibilityResult::CanPurchase);
        assert_eq!(EligibilityResult::parse("CANNOT_PURCHASE"), EligibilityResult::CannotPurchase);
        assert_eq!(EligibilityResult::parse("RESULT_TYPE_UNSPECIFIED"), EligibilityResult::Unspecified);
        assert_eq!(EligibilityResult::parse("MAYBE"), EligibilityResult::Unspecified);
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!(PurchaseOutcome::parse("PURCHASE_STATUS_OK"), Some(PurchaseOutcome::Ok));
        assert_eq!(
            PurchaseOutcome::parse("purchase_status_user_cancelled"),
            Some(PurchaseOutcome::UserCancelled)
        );
        assert_eq!(PurchaseOutcome::parse("PURCHASE_STATUS_REFUNDED"), None);
        assert!(PurchaseOutcome::Ok.loops_back());
        assert!(PurchaseOutcome::ItemChangeRequested.loops_back());
        assert!(!PurchaseOutcome::AlreadyOwned.loops_back());
        assert!(!PurchaseOutcome::Error.loops_back());
    }
}
