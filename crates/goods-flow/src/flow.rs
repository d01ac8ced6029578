//! Purchase Flow
//!
//! One handler per intent. Each handler reads the turn, updates the session,
//! calls billing where needed and decides what the assistant says next.
//!
//! ```text
//! Init ──welcome──▶ (eligibility check) ──CAN_PURCHASE──▶ EligibilityChecked
//!   ──build order──▶ CatalogPresented ──select──▶ ItemSelected/PurchaseInitiated
//!   ──outcome──▶ OutcomeReported ──[consume]──▶ Init
//! ```
//!
//! Failures never escape a turn: every fallible step returns a [`FlowError`]
//! which the handler turns into the matching user-facing message.

use std::sync::Arc;

use goods_billing::{BillingApi, CatalogConfig, SkuDetails};

use crate::error::{FlowError, Result};
use crate::intent::{EligibilityResult, Intent, PurchaseOutcome};
use crate::session::{PurchaseContext, SessionState, SkuCatalogSnapshot};
use crate::turn::{
    COMPLETE_PURCHASE_VALUE, CarouselItem, ContextDirective, DIGITAL_PURCHASE_CHECK_RESULT,
    Directive, OPTION, SKU_PARAMETER, TurnRequest, TurnResponse, find_entitlement,
};

/// User-facing lines
pub mod messages {
    pub const WELCOME: &str =
        "Welcome to Digital Goods Sample. Would you like to see what I have for sale?";
    pub const NOT_ELIGIBLE: &str = "You are not eligible to perform this digital purchase.";
    pub const INTERNAL_ERROR: &str = "There was an internal error. Please try again later";
    pub const NOTHING_AVAILABLE: &str =
        "Oops, looks like there is nothing available. Please try again later";
    pub const SOMETHING_WENT_WRONG: &str = "Oops, something went wrong. Try again later";
    pub const FOUND_ITEMS: &str = "Great! I found the following items: ";
    pub const SELECTION_FAILED: &str = "Oops, something went wrong, sorry.";
    pub const ITEM_NOT_FOUND: &str =
        "Sorry, I couldn't look up the item you selected. Which one would you like?";
    pub const HERE_YOU_GO: &str = "Great! Here you go.";
    pub const PURCHASE_OK: &str =
        "You've successfully purchased the item!. Would you like to do anything else?";
    pub const ALREADY_OWNED: &str = "Purchase failed. You already own the item.";
    pub const ITEM_UNAVAILABLE: &str = "Purchase failed. Item is not available.";
    pub const CHANGED_MIND: &str =
        "Looks like you've changed your mind. Would you like to try again?";
    pub const CANCELLED: &str =
        "Looks like you've cancelled the purchase. Do you still want to try to do a purchase?";
    pub const PURCHASE_FAILED: &str = "Purchase failed. try again later.";
    pub const CHECK_THE_LOGS: &str = "Purchased failed. Check the logs.";
    pub const OUTCOME_UNKNOWN: &str = "Oops, there was an internal error. Please try again later";
    pub const FALLBACK: &str = "Sorry, I didn't get that. Can you say that again?";
}

/// Conversational purchase flow
pub struct PurchaseFlow {
    billing: Arc<dyn BillingApi>,
    catalog: CatalogConfig,
}

impl PurchaseFlow {
    pub fn new(billing: Arc<dyn BillingApi>, catalog: CatalogConfig) -> Self {
        Self { billing, catalog }
    }

    /// Handle one turn
    pub async fn handle(&self, request: TurnRequest) -> TurnResponse {
        tracing::info!(intent = %request.intent, "Handling intent");

        match request.intent {
            Intent::Welcome => Self::welcome(request),
            Intent::DigitalPurchaseCheck => Self::check_eligibility(request),
            Intent::BuildOrder => self.build_order(request).await,
            Intent::InitiatePurchase => Self::initiate_purchase(request),
            Intent::DescribePurchaseStatus => self.report_outcome(request).await,
            Intent::Unknown(ref name) => {
                tracing::warn!(intent = %name, "No handler for intent");
                let mut response = TurnResponse::new(request.session);
                response.say(messages::FALLBACK);
                response
            }
        }
    }

    // ========================================================================
    // Welcome / eligibility
    // ========================================================================

    fn welcome(request: TurnRequest) -> TurnResponse {
        let mut response = TurnResponse::new(request.session);
        response.directive(Directive::DigitalPurchaseCheck);
        response
    }

    fn check_eligibility(request: TurnRequest) -> TurnResponse {
        let result = eligibility(&request);
        let mut response = TurnResponse::new(request.session);

        match result {
            Ok(EligibilityResult::CanPurchase) => {
                response.say(messages::WELCOME).suggest(&["Yes", "No"]);
            }
            Ok(EligibilityResult::CannotPurchase | EligibilityResult::Unspecified) => {
                // Location, device or account rules out digital purchases.
                response.say(messages::NOT_ELIGIBLE).end();
            }
            Err(e) => {
                tracing::error!(error = %e, "Eligibility check result unreadable");
                response.say(messages::INTERNAL_ERROR).end();
            }
        }
        response
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    async fn build_order(&self, request: TurnRequest) -> TurnResponse {
        let fetched = self.billing.fetch_sku_details(&request.conversation_id).await;
        let mut response = TurnResponse::new(request.session);

        let skus = match fetched {
            Ok(skus) if skus.is_empty() => {
                tracing::warn!("No SKUs available");
                response.say(messages::NOTHING_AVAILABLE).end();
                return response;
            }
            Ok(skus) => skus,
            Err(e) if e.is_api() => {
                tracing::error!(error = %e, "SKU lookup refused");
                response.say(messages::NOTHING_AVAILABLE).end();
                return response;
            }
            Err(e) => {
                tracing::error!(error = %e, "SKU lookup failed");
                response.say(messages::SOMETHING_WENT_WRONG).end();
                return response;
            }
        };

        let snapshot = SkuCatalogSnapshot::build(skus);
        response.say(format!("{}{}", messages::FOUND_ITEMS, summary(snapshot.skus())));
        if request.screen_output {
            response.directive(Directive::SelectionCarousel(carousel(snapshot.skus())));
        }
        response.session.catalog = Some(snapshot);
        response
    }

    // ========================================================================
    // Selection
    // ========================================================================

    fn initiate_purchase(request: TurnRequest) -> TurnResponse {
        let selected = selected_sku_id(&request);
        let mut response = TurnResponse::new(request.session);

        let sku_id = match selected {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "No item selected");
                response.say(messages::SELECTION_FAILED).end();
                return response;
            }
        };
        tracing::info!(sku_id = %sku_id, "Item selected");

        match resolve_selection(&response.session, &sku_id) {
            Ok(sku) => {
                let sku_id = sku.sku_id.clone();
                tracing::info!(description = %sku.description, "Found selected SKU");
                response.session.purchase = Some(PurchaseContext(sku));
                response
                    .say(messages::HERE_YOU_GO)
                    .directive(Directive::CompletePurchase(sku_id));
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "Selected SKU not in catalog");
                response.say(messages::ITEM_NOT_FOUND);
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot resolve selection");
                response.say(messages::SELECTION_FAILED).end();
            }
        }
        response
    }

    // ========================================================================
    // Outcome
    // ========================================================================

    async fn report_outcome(&self, request: TurnRequest) -> TurnResponse {
        let mut session = request.session.clone();
        let purchase = session.take_purchase();
        let mut response = TurnResponse::new(session);

        let Some(status) = request
            .argument(COMPLETE_PURCHASE_VALUE)
            .and_then(|arg| arg.extension_str("purchaseStatus"))
        else {
            tracing::error!("Purchase status missing");
            response.say(messages::CHECK_THE_LOGS).end();
            return response;
        };

        let Some(outcome) = PurchaseOutcome::parse(status) else {
            tracing::error!(status = %status, "Unrecognized purchase status");
            response.say(messages::OUTCOME_UNKNOWN).end();
            return response;
        };
        tracing::info!(outcome = ?outcome, "Purchase outcome");

        if outcome.loops_back() {
            response.context(ContextDirective::build_order());
        }

        match outcome {
            PurchaseOutcome::Ok => {
                response.say(messages::PURCHASE_OK);

                match self.consume_if_needed(&request, purchase.as_ref()).await {
                    Ok(true) => tracing::info!("Consumed purchase"),
                    Ok(false) => {}
                    Err(e) => tracing::error!(error = %e, "Consumption failed"),
                }
            }
            PurchaseOutcome::AlreadyOwned => {
                response.say(messages::ALREADY_OWNED).end();
            }
            PurchaseOutcome::ItemUnavailable => {
                response.say(messages::ITEM_UNAVAILABLE).end();
            }
            PurchaseOutcome::ItemChangeRequested => {
                response.say(messages::CHANGED_MIND);
            }
            PurchaseOutcome::UserCancelled => {
                response.say(messages::CANCELLED);
            }
            PurchaseOutcome::Error | PurchaseOutcome::Unspecified => {
                response.say(messages::PURCHASE_FAILED).end();
            }
        }
        response
    }

    /// Consume the purchased item when it is consumable
    ///
    /// `Ok(false)` means nothing needed consuming.
    async fn consume_if_needed(
        &self,
        request: &TurnRequest,
        purchase: Option<&PurchaseContext>,
    ) -> Result<bool> {
        let Some(purchase) = purchase else {
            tracing::warn!("No purchase context in session, skipping consumption check");
            return Ok(false);
        };

        let sku_id = purchase.sku().id();
        if !self.catalog.is_consumable(sku_id) {
            return Ok(false);
        }

        let token = find_entitlement(&request.entitlements, sku_id)
            .ok_or_else(|| FlowError::Consumption(format!("no entitlement for {sku_id}")))?
            .purchase_token()
            .ok_or_else(|| FlowError::Consumption(format!("no purchase token for {sku_id}")))?;

        self.billing
            .consume_purchase(&request.conversation_id, token)
            .await
            .map_err(|e| FlowError::Consumption(e.to_string()))?;

        Ok(true)
    }
}

/// Read the eligibility check result from the turn
fn eligibility(request: &TurnRequest) -> Result<EligibilityResult> {
    let result_type = request
        .argument(DIGITAL_PURCHASE_CHECK_RESULT)
        .ok_or_else(|| FlowError::Argument(DIGITAL_PURCHASE_CHECK_RESULT.into()))?
        .extension_str("resultType")
        .ok_or_else(|| FlowError::Argument(format!("{DIGITAL_PURCHASE_CHECK_RESULT}.resultType")))?;

    Ok(EligibilityResult::parse(result_type))
}

/// Selected SKU id: carousel choice first, then the spoken parameter
fn selected_sku_id(request: &TurnRequest) -> Result<String> {
    if let Some(option) = request.argument(OPTION) {
        return option
            .text_value
            .clone()
            .ok_or_else(|| FlowError::Argument(format!("{OPTION}.textValue")));
    }

    request
        .parameter(SKU_PARAMETER)
        .ok_or_else(|| FlowError::Argument(format!("{OPTION} or {SKU_PARAMETER}")))
}

/// Look the id up in the catalog shown on the previous turn
fn resolve_selection(session: &SessionState, sku_id: &str) -> Result<SkuDetails> {
    let catalog = session
        .catalog
        .as_ref()
        .ok_or_else(|| FlowError::Session("no catalog snapshot in session".into()))?;

    catalog
        .get(sku_id)
        .cloned()
        .ok_or_else(|| FlowError::Lookup(sku_id.to_string()))
}

fn summary(skus: &[SkuDetails]) -> String {
    skus.iter()
        .map(|sku| sku.title.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn carousel(skus: &[SkuDetails]) -> Vec<CarouselItem> {
    skus.iter()
        .map(|sku| CarouselItem {
            key: sku.id().to_string(),
            title: sku.title.clone(),
            description: sku.description.clone(),
        })
        .collect()
}
