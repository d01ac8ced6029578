//! # goods-flow
//!
//! Conversational purchase flow for selling digital goods through an
//! assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PurchaseFlow                           │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │   Intent    │  │ SessionState │  │    BillingApi      │  │
//! │  │  handlers   │──│  (snapshot,  │──│  (client or mock)  │  │
//! │  │             │  │   purchase)  │  │                    │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flow only sees platform-neutral [`TurnRequest`]s and produces
//! [`TurnResponse`]s; mapping to and from the dialogue platform's webhook
//! envelope is the server's job.

pub mod error;
pub mod flow;
pub mod intent;
pub mod session;
pub mod turn;

pub use error::{FlowError, Result};
pub use flow::{PurchaseFlow, messages};
pub use intent::{EligibilityResult, Intent, PurchaseOutcome};
pub use session::{PurchaseContext, SessionState, SkuCatalogSnapshot};
pub use turn::{
    Argument, BUILD_ORDER_CONTEXT, BUILD_ORDER_LIFETIME, CarouselItem, ContextDirective,
    Directive, Entitlement, InAppDetails, PackageEntitlement, TurnRequest, TurnResponse,
    find_entitlement,
};
