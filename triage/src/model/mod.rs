//! Shared data model for the triage pipeline.
//!
//! All values here are immutable once constructed: the classifier produces
//! [`ClassifiedFailure`]s from [`FailureRecord`]s, strategies produce
//! [`FixRecord`]s, and the aggregator folds them into a [`Proposal`].

mod failure;
mod fix;
mod proposal;

pub use failure::{ClassifiedFailure, FailureCategory, FailureRecord, TestRunner};
pub use fix::{FixRecord, FixRecordBuilder, ModelUsage};
pub use proposal::{Proposal, MINUTES_SAVED_PER_FIX};

/// Clamp a confidence score into `[0, 1]`. NaN collapses to 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
