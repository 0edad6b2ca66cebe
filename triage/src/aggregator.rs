//! Proposal aggregation.
//!
//! Runs the dispatcher over a batch of classified failures from one build and
//! folds the resulting fix records into a [`Proposal`]. File contents and the
//! commit diff arrive through an explicit [`RepairContext`].

use std::collections::HashMap;

use crate::dispatcher::RepairDispatcher;
use crate::model::{ClassifiedFailure, Proposal};

/// Per-run context handed to every strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairContext {
    /// Test file path → file content
    pub files: HashMap<String, String>,
    /// Diff of the commit under test, when available
    pub code_diff: Option<String>,
}

impl RepairContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn with_code_diff(mut self, diff: impl Into<String>) -> Self {
        self.code_diff = Some(diff.into());
        self
    }

    /// Content for `path`; missing files read as empty.
    pub fn file_content(&self, path: &str) -> &str {
        self.files.get(path).map(String::as_str).unwrap_or("")
    }
}

/// Folds dispatched fixes into a [`Proposal`].
#[derive(Debug, Clone, Default)]
pub struct ProposalAggregator {
    dispatcher: RepairDispatcher,
}

impl ProposalAggregator {
    pub fn new(dispatcher: RepairDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &RepairDispatcher {
        &self.dispatcher
    }

    /// One fix per failure, in input order. Build metadata comes from the
    /// first failure; an empty batch yields an empty proposal.
    pub async fn aggregate(
        &self,
        failures: &[ClassifiedFailure],
        context: &RepairContext,
    ) -> Proposal {
        let mut fixes = Vec::with_capacity(failures.len());
        for failure in failures {
            let content = context.file_content(&failure.test_file);
            let fix = self
                .dispatcher
                .dispatch(failure, content, context.code_diff.as_deref())
                .await;
            fixes.push(fix);
        }

        let (build_number, commit_sha, branch) = match failures.first() {
            Some(first) => (
                first.build_number,
                first.commit_sha.clone(),
                first.branch.clone(),
            ),
            None => (0, String::new(), None),
        };

        let proposal = Proposal::new(build_number, commit_sha, branch, fixes);
        tracing::info!(summary = %proposal.summary(), "proposal aggregated");
        proposal
    }
}
