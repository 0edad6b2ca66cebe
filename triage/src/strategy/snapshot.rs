use async_trait::async_trait;

use super::RepairStrategy;
use crate::model::{ClassifiedFailure, FailureCategory, FixRecord};

/// Confidence reported for snapshot fixes.
pub const SNAPSHOT_FIX_CONFIDENCE: f64 = 0.95;

/// Confirms snapshot mismatches without editing the test.
///
/// Regenerating the snapshot is left to the runner (`jest -u`); this strategy
/// only confirms the classification and explains what the reviewer should
/// check.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotStrategy;

impl SnapshotStrategy {
    pub fn new() -> Self {
        Self
    }

    fn explanation(code_diff: Option<&str>) -> String {
        let mut explanation = String::from("Snapshot mismatch detected. ");
        if code_diff.is_some_and(|d| !d.trim().is_empty()) {
            explanation
                .push_str("The UI or component output has changed due to recent code modifications. ");
        }
        explanation.push_str("The snapshot should be regenerated with the test runner (jest -u). ");
        explanation.push_str("Please review the snapshot diff to ensure the changes are intentional.");
        explanation
    }
}

#[async_trait]
impl RepairStrategy for SnapshotStrategy {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn can_handle(&self, failure: &ClassifiedFailure) -> bool {
        failure.category() == FailureCategory::Snapshot
    }

    async fn generate_fix(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        code_diff: Option<&str>,
    ) -> FixRecord {
        FixRecord::succeeded(failure.test_file.as_str(), self.name())
            .original_code(file_content)
            .fixed_code(file_content)
            .explanation(Self::explanation(code_diff))
            .confidence(SNAPSHOT_FIX_CONFIDENCE)
            .build()
    }
}
