//! Repair dispatch policy.
//!
//! ```text
//! ClassifiedFailure
//!        │
//!        ▼
//!  strategy registered? ──no──► failed: "No strategy found"
//!        │ yes
//!        ▼
//!  confidence ≥ threshold? ──no──► failed: "Low confidence"
//!        │ yes
//!        ▼
//!  strategy.generate_fix(..) ──► FixRecord (unmodified)
//! ```
//!
//! The gates run in that order and short-circuit. A rejected failure never
//! reaches a strategy.

use std::fmt;

use crate::model::{clamp_confidence, ClassifiedFailure, FailureCategory, FixRecord};
use crate::registry::StrategyRegistry;

/// Minimum classifier confidence required before a strategy runs.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Strategy name recorded when no strategy handled the failure.
pub const NO_STRATEGY: &str = "none";

/// Dispatch policy knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchConfig {
    confidence_threshold: f64,
}

impl DispatchConfig {
    /// Threshold is clamped into `[0, 1]`.
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold: clamp_confidence(confidence_threshold),
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Why the policy refused to run a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRejection {
    NoStrategy,
    LowConfidence,
}

impl DispatchRejection {
    /// Validation-error string recorded on the fix.
    pub fn validation_error(&self) -> &'static str {
        match self {
            Self::NoStrategy => "No strategy found",
            Self::LowConfidence => "Low confidence",
        }
    }
}

impl fmt::Display for DispatchRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.validation_error())
    }
}

/// Applies the dispatch policy and runs the selected strategy.
#[derive(Debug, Clone, Default)]
pub struct RepairDispatcher {
    registry: StrategyRegistry,
    config: DispatchConfig,
}

impl RepairDispatcher {
    pub fn new(registry: StrategyRegistry, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    fn is_low_confidence(&self, failure: &ClassifiedFailure) -> bool {
        failure.confidence() < self.config.confidence_threshold
    }

    /// Produce exactly one [`FixRecord`] for `failure`.
    pub async fn dispatch(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
    ) -> FixRecord {
        let category = failure.category();

        let Some(strategy) = self.registry.get(category) else {
            let mut rejections = vec![DispatchRejection::NoStrategy];
            if self.is_low_confidence(failure) {
                rejections.push(DispatchRejection::LowConfidence);
            }
            tracing::debug!(file = %failure.test_file, %category, "no strategy registered");
            return rejected(
                failure,
                file_content,
                format!("No strategy available for {}", category),
                &rejections,
            );
        };

        if self.is_low_confidence(failure) {
            tracing::debug!(
                file = %failure.test_file,
                %category,
                confidence = failure.confidence(),
                threshold = self.config.confidence_threshold,
                "confidence below threshold, skipping strategy"
            );
            return rejected(
                failure,
                file_content,
                "Confidence too low for automatic fix".to_string(),
                &[DispatchRejection::LowConfidence],
            );
        }

        let fix = strategy.generate_fix(failure, file_content, code_diff).await;
        tracing::debug!(
            file = %failure.test_file,
            %category,
            strategy = fix.strategy(),
            success = fix.is_success(),
            confidence = fix.confidence(),
            "strategy finished"
        );
        fix
    }

    /// Categories that would dispatch to a strategy (ignoring confidence).
    pub fn handled_categories(&self) -> Vec<FailureCategory> {
        self.registry.registered_categories()
    }
}

fn rejected(
    failure: &ClassifiedFailure,
    file_content: &str,
    explanation: String,
    rejections: &[DispatchRejection],
) -> FixRecord {
    rejections
        .iter()
        .fold(
            FixRecord::failed(failure.test_file.as_str(), NO_STRATEGY)
                .original_code(file_content)
                .explanation(explanation)
                .confidence(failure.confidence()),
            |builder, r| builder.validation_error(r.validation_error()),
        )
        .build()
}
