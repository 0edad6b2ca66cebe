use serde::{Deserialize, Serialize};

use super::FixRecord;

/// Heuristic minutes of engineer time saved per successful fix.
pub const MINUTES_SAVED_PER_FIX: u32 = 15;

/// Aggregate of all fix attempts for one build/commit.
///
/// Summary statistics are derived from `fixes` on construction and on
/// deserialization, so they can never disagree with the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawProposal")]
pub struct Proposal {
    build_number: u64,
    commit_sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    fixes: Vec<FixRecord>,
    /// Mean confidence over successful fixes only.
    total_confidence: f64,
    #[serde(rename = "estimatedTimesSaved")]
    estimated_minutes_saved: u32,
}

impl Proposal {
    pub fn new(
        build_number: u64,
        commit_sha: impl Into<String>,
        branch: Option<String>,
        fixes: Vec<FixRecord>,
    ) -> Self {
        let successes: Vec<&FixRecord> = fixes.iter().filter(|f| f.is_success()).collect();
        let total_confidence = if successes.is_empty() {
            0.0
        } else {
            successes.iter().map(|f| f.confidence()).sum::<f64>() / successes.len() as f64
        };
        let estimated_minutes_saved = successes.len() as u32 * MINUTES_SAVED_PER_FIX;

        Self {
            build_number,
            commit_sha: commit_sha.into(),
            branch,
            fixes,
            total_confidence,
            estimated_minutes_saved,
        }
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Fix records in the same order as the classified failures they came from.
    pub fn fixes(&self) -> &[FixRecord] {
        &self.fixes
    }

    pub fn into_fixes(self) -> Vec<FixRecord> {
        self.fixes
    }

    pub fn total_confidence(&self) -> f64 {
        self.total_confidence
    }

    pub fn estimated_minutes_saved(&self) -> u32 {
        self.estimated_minutes_saved
    }

    pub fn successful_fixes(&self) -> impl Iterator<Item = &FixRecord> {
        self.fixes.iter().filter(|f| f.is_success())
    }

    pub fn failed_fixes(&self) -> impl Iterator<Item = &FixRecord> {
        self.fixes.iter().filter(|f| !f.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successful_fixes().count()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Compact summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "build={} fixes={} succeeded={} confidence={:.2} saved={}min",
            self.build_number,
            self.fixes.len(),
            self.success_count(),
            self.total_confidence,
            self.estimated_minutes_saved
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    #[serde(default)]
    build_number: u64,
    #[serde(default)]
    commit_sha: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    fixes: Vec<FixRecord>,
}

impl From<RawProposal> for Proposal {
    fn from(raw: RawProposal) -> Self {
        Proposal::new(raw.build_number, raw.commit_sha, raw.branch, raw.fixes)
    }
}
