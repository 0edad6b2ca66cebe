//! Repair strategies
//!
//! One strategy per failure category, ranging from pure text substitution to
//! delegation to a generative backend:
//!
//! ```text
//! Snapshot ──────────────► SnapshotStrategy     (no edit, explanation only)
//! Assertion ─────────────► AssertionStrategy    (substitution, AI fallback)
//! Mock / TypeError /
//! PropertyChange / Unknown ► GenerativeStrategy (FixBackend)
//! ```
//!
//! `generate_fix` is infallible by signature: every failure inside a strategy,
//! including backend transport errors, is reported as a failed [`FixRecord`].

mod assertion;
mod generative;
mod snapshot;

pub use assertion::{AssertionStrategy, ParsedAssertion};
pub use generative::GenerativeStrategy;
pub use snapshot::SnapshotStrategy;

use async_trait::async_trait;

use crate::model::{ClassifiedFailure, FixRecord};

/// A repair approach for one or more failure categories.
#[async_trait]
pub trait RepairStrategy: Send + Sync {
    /// Name recorded on every [`FixRecord`] this strategy produces.
    fn name(&self) -> &str;

    /// Whether this strategy understands the failure's category.
    fn can_handle(&self, failure: &ClassifiedFailure) -> bool;

    /// Propose a corrected version of `file_content`.
    async fn generate_fix(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
    ) -> FixRecord;
}
