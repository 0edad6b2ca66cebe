//! External collaborator capabilities.
//!
//! The orchestrator only talks to the outside world through these traits.
//! HTTP implementations live in [`crate::adapters`]; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;
use triage::{CreatedPullRequest, FailureRecord, PullRequestDraft};

/// Errors from CI, repository or other HTTP collaborators
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("{service} API error: {status} {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn api(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            service,
            status,
            body: body.into(),
        }
    }

    /// Network failures, rate limits and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound(_) | Self::Decode(_) | Self::Io(_) => false,
        }
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Stands in for the CI provider.
#[async_trait]
pub trait TestResultSource: Send + Sync {
    /// Every failing test of a pipeline run. An empty list is a legitimate
    /// answer, distinct from an error.
    async fn fetch_failures(&self, pipeline_id: &str)
        -> Result<Vec<FailureRecord>, CollaboratorError>;
}

/// Stands in for the source hosting provider.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// File content at `git_ref` (default branch when `None`).
    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, CollaboratorError>;

    /// Unified diff introduced by `commit_sha`.
    async fn get_commit_diff(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<String, CollaboratorError>;

    /// Create a branch, commit the draft's changes and open a pull request.
    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> Result<CreatedPullRequest, CollaboratorError>;
}
