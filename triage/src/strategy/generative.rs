use async_trait::async_trait;
use std::sync::Arc;

use super::RepairStrategy;
use crate::backend::{BackendError, FixBackend, FixRequest, GeneratedFix};
use crate::model::{ClassifiedFailure, FailureCategory, FixRecord, ModelUsage};

/// Discount applied to the classifier's confidence for unverified model output.
pub const GENERATIVE_DISCOUNT: f64 = 0.8;
/// Ceiling for generative fix confidence.
pub const GENERATIVE_CONFIDENCE_CAP: f64 = 0.75;

/// Universal fallback that delegates the repair to a [`FixBackend`].
#[derive(Clone, Default)]
pub struct GenerativeStrategy {
    backend: Option<Arc<dyn FixBackend>>,
}

impl GenerativeStrategy {
    pub fn new(backend: Arc<dyn FixBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A strategy with no backend; every fix fails with "AI client not configured".
    pub fn unconfigured() -> Self {
        Self { backend: None }
    }

    pub fn from_optional(backend: Option<Arc<dyn FixBackend>>) -> Self {
        Self { backend }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    fn default_explanation(category: FailureCategory) -> &'static str {
        match category {
            FailureCategory::Mock => "Updated mock to match new implementation",
            FailureCategory::PropertyChange => "Fixed property/method name changes",
            FailureCategory::TypeError => "Corrected TypeScript type definitions",
            FailureCategory::Unknown => "Applied AI-suggested fix based on error analysis",
            FailureCategory::Snapshot | FailureCategory::Assertion => "Applied automated fix",
        }
    }

    /// `min(classifier confidence * 0.8, 0.75)`
    pub fn discounted_confidence(failure: &ClassifiedFailure) -> f64 {
        (failure.confidence() * GENERATIVE_DISCOUNT).min(GENERATIVE_CONFIDENCE_CAP)
    }
}

impl std::fmt::Debug for GenerativeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeStrategy")
            .field("backend", &self.backend.as_ref().map(|b| b.model_name().to_string()))
            .finish()
    }
}

/// Call the backend, logging failures. Shared with the assertion fallback.
pub(crate) async fn request_fix(
    backend: Option<&Arc<dyn FixBackend>>,
    failure: &ClassifiedFailure,
    file_content: &str,
    code_diff: Option<&str>,
) -> Result<(GeneratedFix, ModelUsage), BackendError> {
    let backend = backend.ok_or(BackendError::NotConfigured)?;
    let request = FixRequest::for_failure(failure, file_content, code_diff);

    match backend.generate_test_fix(&request).await {
        Ok(fix) => {
            let usage = ModelUsage::new(backend.model_name(), fix.tokens_used);
            Ok((fix, usage))
        }
        Err(e) => {
            tracing::warn!(
                file = %failure.test_file,
                model = backend.model_name(),
                error = %e,
                "generative backend call failed"
            );
            Err(e)
        }
    }
}

#[async_trait]
impl RepairStrategy for GenerativeStrategy {
    fn name(&self) -> &str {
        "ai-powered"
    }

    fn can_handle(&self, _failure: &ClassifiedFailure) -> bool {
        true
    }

    async fn generate_fix(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
    ) -> FixRecord {
        let message = match request_fix(self.backend.as_ref(), failure, file_content, code_diff)
            .await
        {
            Ok((generated, usage)) => {
                let explanation = if generated.explanation.trim().is_empty() {
                    Self::default_explanation(failure.category()).to_string()
                } else {
                    generated.explanation
                };
                return FixRecord::succeeded(failure.test_file.as_str(), self.name())
                    .original_code(file_content)
                    .fixed_code(generated.fixed_code)
                    .explanation(explanation)
                    .confidence(Self::discounted_confidence(failure))
                    .model(usage)
                    .build();
            }
            Err(BackendError::NotConfigured) => BackendError::NotConfigured.to_string(),
            Err(e) => format!("AI fix failed: {}", e),
        };

        FixRecord::failed(failure.test_file.as_str(), self.name())
            .original_code(file_content)
            .explanation(message.as_str())
            .validation_error(message)
            .build()
    }
}
