use serde::{Deserialize, Serialize};

use super::clamp_confidence;

const EMPTY_FIX_ERROR: &str = "Empty fix produced";

/// Generative-model usage attached to AI-backed fixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    #[serde(rename = "aiModel")]
    pub model: String,
    pub tokens_used: u64,
}

impl ModelUsage {
    pub fn new(model: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            model: model.into(),
            tokens_used,
        }
    }
}

/// Result of one repair attempt.
///
/// Produced for every classified failure, including rejected and failed
/// attempts. Construct through [`FixRecord::succeeded`] or
/// [`FixRecord::failed`]; the builder enforces that a successful record
/// carries non-empty code and a failed one carries at least one validation
/// error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawFixRecord")]
pub struct FixRecord {
    original_code: String,
    fixed_code: String,
    file_path: String,
    strategy: String,
    explanation: String,
    confidence: f64,
    success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    validation_errors: Vec<String>,
    #[serde(flatten)]
    model: Option<ModelUsage>,
}

impl FixRecord {
    /// Start a successful record for `file_path` produced by `strategy`.
    pub fn succeeded(file_path: impl Into<String>, strategy: impl Into<String>) -> FixRecordBuilder {
        FixRecordBuilder::new(file_path.into(), strategy.into(), true)
    }

    /// Start a failed record for `file_path` produced by `strategy`.
    pub fn failed(file_path: impl Into<String>, strategy: impl Into<String>) -> FixRecordBuilder {
        FixRecordBuilder::new(file_path.into(), strategy.into(), false)
    }

    pub fn original_code(&self) -> &str {
        &self.original_code
    }

    pub fn fixed_code(&self) -> &str {
        &self.fixed_code
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Name of the strategy that produced this record (`"none"` when no
    /// strategy was registered).
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    pub fn model(&self) -> Option<&ModelUsage> {
        self.model.as_ref()
    }

    /// Whether applying this fix would change the file.
    pub fn changes_content(&self) -> bool {
        self.success && self.original_code != self.fixed_code
    }
}

/// Builder for [`FixRecord`]. `build` normalizes confidence and applies the
/// success/validation-error invariants.
#[derive(Debug, Clone)]
pub struct FixRecordBuilder {
    record: FixRecord,
}

impl FixRecordBuilder {
    fn new(file_path: String, strategy: String, success: bool) -> Self {
        Self {
            record: FixRecord {
                original_code: String::new(),
                fixed_code: String::new(),
                file_path,
                strategy,
                explanation: String::new(),
                confidence: 0.0,
                success,
                validation_errors: Vec::new(),
                model: None,
            },
        }
    }

    pub fn original_code(mut self, code: impl Into<String>) -> Self {
        self.record.original_code = code.into();
        self
    }

    pub fn fixed_code(mut self, code: impl Into<String>) -> Self {
        self.record.fixed_code = code.into();
        self
    }

    pub fn explanation(mut self, explanation: impl Into<String>) -> Self {
        self.record.explanation = explanation.into();
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.record.confidence = confidence;
        self
    }

    pub fn model(mut self, usage: ModelUsage) -> Self {
        self.record.model = Some(usage);
        self
    }

    pub fn validation_error(mut self, error: impl Into<String>) -> Self {
        self.record.validation_errors.push(error.into());
        self
    }

    pub fn build(self) -> FixRecord {
        normalize(self.record)
    }
}

fn normalize(mut record: FixRecord) -> FixRecord {
    record.confidence = clamp_confidence(record.confidence);

    if record.success && record.fixed_code.trim().is_empty() {
        record.success = false;
        record.validation_errors = vec![EMPTY_FIX_ERROR.to_string()];
    }

    if record.success {
        record.validation_errors.clear();
    } else if record.validation_errors.is_empty() {
        let reason = if record.explanation.trim().is_empty() {
            "Fix failed".to_string()
        } else {
            record.explanation.clone()
        };
        record.validation_errors.push(reason);
    }

    record
}

/// Wire shape accepted when deserializing; normalized into a [`FixRecord`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFixRecord {
    #[serde(default)]
    original_code: String,
    #[serde(default)]
    fixed_code: String,
    file_path: String,
    strategy: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    confidence: f64,
    success: bool,
    #[serde(default)]
    validation_errors: Vec<String>,
    #[serde(flatten)]
    model: Option<ModelUsage>,
}

impl From<RawFixRecord> for FixRecord {
    fn from(raw: RawFixRecord) -> Self {
        normalize(FixRecord {
            original_code: raw.original_code,
            fixed_code: raw.fixed_code,
            file_path: raw.file_path,
            strategy: raw.strategy,
            explanation: raw.explanation,
            confidence: raw.confidence,
            success: raw.success,
            validation_errors: raw.validation_errors,
            model: raw.model,
        })
    }
}
