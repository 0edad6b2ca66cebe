//! Generative-model backend capability.
//!
//! Strategies that need a model-generated fix depend on [`FixBackend`]
//! rather than a concrete HTTP client, so the core can be exercised with a
//! deterministic stand-in. The network adapter lives in the `testfixer`
//! crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ClassifiedFailure;

/// Errors from a generative backend call
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("AI client not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("rate limited")]
    RateLimited,

    #[error("response parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Whether repeating the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotConfigured | Self::Parse(_) => false,
        }
    }
}

/// Everything the backend sees about one failing test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRequest {
    pub test_file: String,
    pub file_content: String,
    pub error_message: String,
    pub stack_trace: String,
    pub code_diff: Option<String>,
}

impl FixRequest {
    pub fn for_failure(
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
    ) -> Self {
        Self {
            test_file: failure.test_file.clone(),
            file_content: file_content.to_string(),
            error_message: failure.error_message.clone(),
            stack_trace: failure.stack_trace.clone(),
            code_diff: code_diff.map(str::to_string),
        }
    }
}

/// Parsed backend output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFix {
    /// Full replacement content for the test file
    pub fixed_code: String,
    pub explanation: String,
    pub tokens_used: u64,
}

/// A text-generation service able to propose a corrected test file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FixBackend: Send + Sync {
    /// Model identifier recorded on the fixes this backend produces.
    fn model_name(&self) -> &str;

    /// Ask the model for a corrected version of `request.file_content`.
    async fn generate_test_fix(&self, request: &FixRequest)
        -> Result<GeneratedFix, BackendError>;
}
