//! Test Failure Triage Library
//!
//! This library provides the deterministic core of the test repair pipeline:
//! - A failure taxonomy and confidence-scored classifier for CI test failures
//! - Pluggable repair strategies keyed by failure category
//! - A dispatcher that applies the confidence policy before any strategy runs
//! - Aggregation of per-failure fixes into a reviewable proposal
//!
//! # Pipeline
//!
//! ```text
//! FailureRecord → FailureClassifier → ClassifiedFailure
//!     → RepairDispatcher (StrategyRegistry) → FixRecord
//!     → ProposalAggregator → Proposal → PatchSet / PullRequestDraft
//! ```
//!
//! Nothing in this crate performs network I/O. The only suspension points are
//! calls into an injected [`backend::FixBackend`] from the generative
//! strategies.

#![allow(clippy::uninlined_format_args)]

pub mod aggregator;
pub mod backend;
pub mod classifier;
pub mod dispatcher;
pub mod jest;
pub mod model;
pub mod patch;
pub mod prompt;
pub mod registry;
pub mod strategy;

// Re-export the data model
pub use model::{
    ClassifiedFailure, FailureCategory, FailureRecord, FixRecord, FixRecordBuilder, ModelUsage,
    Proposal, TestRunner,
};

// Re-export pipeline components
pub use aggregator::{ProposalAggregator, RepairContext};
pub use classifier::{ClassificationSummary, FailureClassifier};
pub use dispatcher::{DispatchConfig, DispatchRejection, RepairDispatcher};
pub use registry::StrategyRegistry;

// Re-export strategy types
pub use backend::{BackendError, FixBackend, FixRequest, GeneratedFix};
pub use strategy::{AssertionStrategy, GenerativeStrategy, RepairStrategy, SnapshotStrategy};

// Re-export publishing shapes
pub use patch::{ChangeOperation, CreatedPullRequest, FileChange, PatchSet, PullRequestDraft};
