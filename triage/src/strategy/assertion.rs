use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};

use super::generative::request_fix;
use super::RepairStrategy;
use crate::backend::FixBackend;
use crate::model::{ClassifiedFailure, FailureCategory, FixRecord};

/// Confidence for a deterministic literal substitution.
pub const SUBSTITUTION_CONFIDENCE: f64 = 0.85;
/// Confidence for the generative fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.7;

const FALLBACK_EXPLANATION: &str = "Updated assertion based on AI analysis";

// Ordered: first match wins.
static ASSERTION_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?i)expected[:\s]+['"`]?([^'"`]+)['"`]?.*received[:\s]+['"`]?([^'"`]+)['"`]?"#)
            .unwrap(),
        Regex::new(r#"(?i)expected[:\s]+['"`]?([^'"`]+)['"`]?.*but got[:\s]+['"`]?([^'"`]+)['"`]?"#)
            .unwrap(),
        Regex::new(r"(?i)Expected:\s*([^\n]+)\s*Received:\s*([^\n]+)").unwrap(),
    ]
});

/// Expected/received literals pulled out of an assertion message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAssertion {
    pub expected: String,
    pub received: String,
}

impl ParsedAssertion {
    /// Parse "expected X / received Y" or "expected X but got Y".
    pub fn parse(error_message: &str) -> Option<Self> {
        ASSERTION_PATTERNS.iter().find_map(|pattern| {
            let caps = pattern.captures(error_message)?;
            let expected = normalize_literal(caps.get(1)?.as_str());
            let received = normalize_literal(caps.get(2)?.as_str());
            if expected.is_empty() || received.is_empty() {
                return None;
            }
            Some(Self { expected, received })
        })
    }

    /// Replace every quoted occurrence of `expected` with `received`,
    /// keeping the original quote character.
    pub fn apply(&self, code: &str) -> String {
        let escaped = regex::escape(&self.expected);
        let pattern = format!("'{0}'|\"{0}\"|`{0}`", escaped);
        let Ok(quoted) = Regex::new(&pattern) else {
            return code.to_string();
        };

        quoted
            .replace_all(code, |caps: &Captures| {
                let quote = &caps[0][..1];
                format!("{}{}{}", quote, self.received, quote)
            })
            .into_owned()
    }
}

fn normalize_literal(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches(',').trim_end();
    let unquoted = ['"', '\'', '`'].iter().find_map(|q| {
        trimmed
            .strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
    });
    unquoted.unwrap_or(trimmed).to_string()
}

/// Fixes assertion failures by swapping the expected literal for the received
/// one, falling back to a [`FixBackend`] when that is not possible.
#[derive(Clone, Default)]
pub struct AssertionStrategy {
    backend: Option<Arc<dyn FixBackend>>,
}

impl AssertionStrategy {
    /// Substitution only; the fallback reports "AI client not configured".
    pub fn new() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn FixBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn from_optional(backend: Option<Arc<dyn FixBackend>>) -> Self {
        Self { backend }
    }

    async fn fallback(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
        reason: &str,
    ) -> FixRecord {
        tracing::debug!(file = %failure.test_file, reason, "assertion substitution unavailable, using AI fallback");

        match request_fix(self.backend.as_ref(), failure, file_content, code_diff).await {
            Ok((generated, usage)) => {
                let explanation = if generated.explanation.trim().is_empty() {
                    FALLBACK_EXPLANATION.to_string()
                } else {
                    generated.explanation
                };
                FixRecord::succeeded(failure.test_file.as_str(), "assertion-ai")
                    .original_code(file_content)
                    .fixed_code(generated.fixed_code)
                    .explanation(explanation)
                    .confidence(FALLBACK_CONFIDENCE)
                    .model(usage)
                    .build()
            }
            Err(e) => {
                let strategy = if self.backend.is_some() {
                    "assertion-ai"
                } else {
                    self.name()
                };
                FixRecord::failed(failure.test_file.as_str(), strategy)
                    .original_code(file_content)
                    .explanation(format!("{}; AI fallback failed", reason))
                    .validation_error(reason)
                    .validation_error(format!("AI fallback failed: {}", e))
                    .build()
            }
        }
    }
}

impl std::fmt::Debug for AssertionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionStrategy")
            .field("has_backend", &self.backend.is_some())
            .finish()
    }
}

#[async_trait]
impl RepairStrategy for AssertionStrategy {
    fn name(&self) -> &str {
        "assertion"
    }

    fn can_handle(&self, failure: &ClassifiedFailure) -> bool {
        failure.category() == FailureCategory::Assertion
    }

    async fn generate_fix(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
    ) -> FixRecord {
        let Some(parsed) = ParsedAssertion::parse(&failure.error_message) else {
            return self
                .fallback(failure, file_content, code_diff, "Unable to parse assertion")
                .await;
        };

        let fixed = parsed.apply(file_content);
        if fixed == file_content {
            return self
                .fallback(
                    failure,
                    file_content,
                    code_diff,
                    "Assertion literal not found in test file",
                )
                .await;
        }

        FixRecord::succeeded(failure.test_file.as_str(), self.name())
            .original_code(file_content)
            .fixed_code(fixed)
            .explanation(format!(
                "Updated assertion: expected \"{}\" instead of \"{}\"",
                parsed.received, parsed.expected
            ))
            .confidence(SUBSTITUTION_CONFIDENCE)
            .build()
    }
}
