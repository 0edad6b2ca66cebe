//! Orchestration error taxonomy with retry classification.
//!
//! Only failures that stop the pipeline from making any progress surface
//! here. Per-file context failures and strategy failures are absorbed
//! upstream (placeholder content, failed fix records).
//!
//! ## Retry categories
//!
//! | Category        | Retriable | Raised by                                  |
//! |-----------------|-----------|--------------------------------------------|
//! | Transient       | yes       | network / 5xx / rate limit on fetch, publish |
//! | Permanent       | no        | auth, not found, malformed payloads        |
//! | NothingToDo     | no        | empty failure list, nothing to publish     |
//! | Misconfigured   | no        | missing credentials or repository          |

use std::fmt;

use thiserror::Error;

use crate::collaborators::CollaboratorError;

/// Classification used by callers to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Network or upstream outage; retrying later may succeed.
    Transient,
    /// The request itself is wrong; retrying will not help.
    Permanent,
    /// The pipeline ran but had nothing to act on.
    NothingToDo,
    /// Credentials or repository settings are missing.
    Misconfigured,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::NothingToDo => write!(f, "nothing_to_do"),
            Self::Misconfigured => write!(f, "misconfigured"),
        }
    }
}

/// Unified error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The test-result source could not be queried at all.
    #[error("Failed to fetch test failures for {pipeline}: {source}")]
    FetchFailed {
        pipeline: String,
        #[source]
        source: CollaboratorError,
    },

    /// The source returned successfully but reported no failing tests.
    #[error("No test failures found for {0}")]
    NoFailures(String),

    /// The proposal has no successful fix to publish.
    #[error("Nothing to publish: none of the {0} fixes succeeded")]
    NothingToPublish(usize),

    /// Opening the pull request failed.
    #[error("Failed to open pull request: {0}")]
    PublishFailed(#[source] CollaboratorError),

    /// Configuration is invalid or missing required fields.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other error that doesn't fit the above categories.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OrchestrationError {
    pub fn fetch(pipeline: impl Into<String>, source: CollaboratorError) -> Self {
        Self::FetchFailed {
            pipeline: pipeline.into(),
            source,
        }
    }

    /// Classify this error for retry logic.
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::FetchFailed { source, .. } | Self::PublishFailed(source) => {
                if source.is_transient() {
                    RetryCategory::Transient
                } else {
                    RetryCategory::Permanent
                }
            }
            Self::NoFailures(_) | Self::NothingToPublish(_) => RetryCategory::NothingToDo,
            Self::Configuration(_) => RetryCategory::Misconfigured,
            Self::Internal(_) => RetryCategory::Transient,
        }
    }

    /// Returns `true` if the caller may retry after this error.
    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }
}
