//! Domain data and state tracking
//!
//! This module contains:
//! - StockStatus: availability of a variant, and the rule table inferring it
//! - ProductRecord / FailureRecord: the rows written by a run
//! - ResolvePhase: per-URL state machine of the variant resolver

mod phase;
mod record;
mod stock;

pub use phase::{PhaseTracker, ResolvePhase};
pub use record::{
    AttemptOutcome, ExtractionAttempt, FailureRecord, ProductRecord, Strategy, NOT_AVAILABLE,
};
pub use stock::{StockRules, StockStatus};
