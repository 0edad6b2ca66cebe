//! Pipeline orchestration: fetch → classify → gather context → dispatch →
//! aggregate → publish.
//!
//! ```text
//! TestResultSource ──► FailureClassifier ──► SourceRepository (files, diff)
//!                                                   │
//!                                                   ▼
//!                 SourceRepository ◄── PullRequestDraft ◄── ProposalAggregator
//! ```
//!
//! This is the only component that performs I/O. Everything below the
//! aggregator is pure or talks to the generative backend through
//! [`triage::FixBackend`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use triage::{
    ClassifiedFailure, CreatedPullRequest, DispatchConfig, FailureClassifier, FailureRecord,
    FixBackend, PatchSet, Proposal, ProposalAggregator, PullRequestDraft, RepairContext,
    RepairDispatcher, StrategyRegistry,
};

use crate::collaborators::{SourceRepository, TestResultSource};
use crate::config::RepositoryTarget;
use crate::errors::OrchestrationError;

/// Test file name reported when the runner output names no file.
const UNKNOWN_FILE: &str = "Unknown";
/// Branch targeted when neither the build nor the caller names one.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Placeholder content for a test file that could not be fetched.
pub fn unavailable_content(message: &str) -> String {
    format!("// Unable to fetch file content: {}", message)
}

/// Drives one pipeline run end to end.
pub struct TestFixOrchestrator {
    source: Arc<dyn TestResultSource>,
    repository: Arc<dyn SourceRepository>,
    target: RepositoryTarget,
    default_branch: String,
    classifier: FailureClassifier,
    aggregator: ProposalAggregator,
}

impl TestFixOrchestrator {
    /// Orchestrator with the default strategy set. `backend` powers the
    /// generative strategies; `None` leaves them reporting an unconfigured
    /// client.
    pub fn new(
        source: Arc<dyn TestResultSource>,
        repository: Arc<dyn SourceRepository>,
        target: RepositoryTarget,
        backend: Option<Arc<dyn FixBackend>>,
        dispatch: DispatchConfig,
    ) -> Self {
        let dispatcher = RepairDispatcher::new(StrategyRegistry::with_defaults(backend), dispatch);
        Self::with_dispatcher(source, repository, target, dispatcher)
    }

    /// Orchestrator with a caller-assembled dispatcher.
    pub fn with_dispatcher(
        source: Arc<dyn TestResultSource>,
        repository: Arc<dyn SourceRepository>,
        target: RepositoryTarget,
        dispatcher: RepairDispatcher,
    ) -> Self {
        Self {
            source,
            repository,
            target,
            default_branch: DEFAULT_BASE_BRANCH.to_string(),
            classifier: FailureClassifier::new(),
            aggregator: ProposalAggregator::new(dispatcher),
        }
    }

    /// Override the branch pull requests target when the build has none.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn target(&self) -> &RepositoryTarget {
        &self.target
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    // ── Stages ──────────────────────────────────────────────────────────

    pub async fn fetch_failures(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<FailureRecord>, OrchestrationError> {
        let failures = self
            .source
            .fetch_failures(pipeline_id)
            .await
            .map_err(|e| OrchestrationError::fetch(pipeline_id, e))?;
        info!(pipeline = pipeline_id, count = failures.len(), "fetched test failures");
        Ok(failures)
    }

    /// Fetch and classify. A run with no failing tests is an error so that
    /// callers never publish an empty proposal.
    pub async fn analyze(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<ClassifiedFailure>, OrchestrationError> {
        let failures = self.fetch_failures(pipeline_id).await?;
        if failures.is_empty() {
            return Err(OrchestrationError::NoFailures(pipeline_id.to_string()));
        }

        let classified = self.classifier.classify_many(&failures);
        for failure in &classified {
            debug!(
                test = %failure.test_name,
                file = %failure.test_file,
                category = %failure.category(),
                confidence = failure.confidence(),
                "classified failure"
            );
        }

        let summary = FailureClassifier::summarize(&classified);
        info!(
            pipeline = pipeline_id,
            total = summary.total,
            mean_confidence = summary.mean_confidence,
            "classification complete"
        );
        Ok(classified)
    }

    /// Test file contents at the failing commit plus that commit's diff.
    /// Individual fetch failures degrade to placeholder content.
    pub async fn gather_context(&self, failures: &[ClassifiedFailure]) -> RepairContext {
        let files: BTreeSet<&str> = failures
            .iter()
            .map(|f| f.test_file.as_str())
            .filter(|path| !path.trim().is_empty() && *path != UNKNOWN_FILE)
            .collect();

        let commit_sha = failures
            .iter()
            .map(|f| f.commit_sha.as_str())
            .find(|sha| !sha.is_empty());

        let owner = self.target.owner.as_str();
        let repo = self.target.repo.as_str();
        let mut context = RepairContext::new();

        for path in files {
            let content = match self
                .repository
                .get_file_content(owner, repo, path, commit_sha)
                .await
            {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = path, error = %e, "failed to fetch test file, using placeholder");
                    unavailable_content(&e.to_string())
                }
            };
            context = context.with_file(path, content);
        }

        if let Some(sha) = commit_sha {
            match self.repository.get_commit_diff(owner, repo, sha).await {
                Ok(diff) => context = context.with_code_diff(diff),
                Err(e) => warn!(commit = sha, error = %e, "failed to fetch commit diff"),
            }
        }

        debug!(files = context.files.len(), has_diff = context.code_diff.is_some(), "context gathered");
        context
    }

    pub async fn propose(&self, pipeline_id: &str) -> Result<Proposal, OrchestrationError> {
        let classified = self.analyze(pipeline_id).await?;
        let context = self.gather_context(&classified).await;
        let proposal = self.aggregator.aggregate(&classified, &context).await;
        info!(
            pipeline = pipeline_id,
            fixes = proposal.len(),
            succeeded = proposal.success_count(),
            "proposal ready"
        );
        Ok(proposal)
    }

    pub fn patch_set(&self, proposal: &Proposal) -> PatchSet {
        PatchSet::from_proposal(proposal)
    }

    /// Draft the pull request a proposal would open, without publishing it.
    pub fn draft(&self, proposal: &Proposal) -> PullRequestDraft {
        let base = proposal
            .branch()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.default_branch);
        PullRequestDraft::prepare(proposal, &self.target.owner, &self.target.repo, base)
    }

    pub async fn publish(
        &self,
        proposal: &Proposal,
    ) -> Result<CreatedPullRequest, OrchestrationError> {
        if proposal.success_count() == 0 {
            return Err(OrchestrationError::NothingToPublish(proposal.len()));
        }

        let draft = self.draft(proposal);
        info!(
            branch = %draft.branch_name,
            base = %draft.base_branch,
            files = draft.changes.len(),
            "opening pull request"
        );
        let created = self
            .repository
            .create_pull_request(&draft)
            .await
            .map_err(OrchestrationError::PublishFailed)?;
        info!(url = %created.url, number = created.number, "pull request opened");
        Ok(created)
    }

    pub async fn fix_and_publish(
        &self,
        pipeline_id: &str,
    ) -> Result<(Proposal, CreatedPullRequest), OrchestrationError> {
        let proposal = self.propose(pipeline_id).await?;
        let created = self.publish(&proposal).await?;
        Ok((proposal, created))
    }
}

impl std::fmt::Debug for TestFixOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestFixOrchestrator")
            .field("target", &self.target)
            .field("default_branch", &self.default_branch)
            .field("dispatcher", self.aggregator.dispatcher())
            .finish()
    }
}
