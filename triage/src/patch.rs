//! Patch-set shaping for accepted proposals.
//!
//! The core never publishes anything itself. It only turns a [`Proposal`]
//! into the per-file changes and pull-request text a repository
//! collaborator needs.

use serde::{Deserialize, Serialize};

use crate::model::{FixRecord, Proposal};

/// Labels attached to every generated pull request.
pub const DEFAULT_LABELS: [&str; 2] = ["automated-fix", "tests"];

/// Prefix of generated branch names.
pub const BRANCH_PREFIX: &str = "testfixer";

const SHORT_SHA_LEN: usize = 7;

/// What to do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

/// A single file change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
    pub operation: ChangeOperation,
}

/// Per-file changes derived from the successful fixes of a proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub changes: Vec<FileChange>,
}

impl PatchSet {
    /// One [`ChangeOperation::Update`] per successful fix, in proposal order.
    pub fn from_proposal(proposal: &Proposal) -> Self {
        let changes = proposal
            .successful_fixes()
            .map(|fix| FileChange {
                path: fix.file_path().to_string(),
                content: fix.fixed_code().to_string(),
                operation: ChangeOperation::Update,
            })
            .collect();
        Self { changes }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.path.as_str())
    }
}

/// Everything needed to open a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestDraft {
    pub owner: String,
    pub repo: String,
    /// Branch the pull request targets
    pub base_branch: String,
    pub title: String,
    pub description: String,
    /// Branch the changes are committed to
    pub branch_name: String,
    pub changes: Vec<FileChange>,
    pub commit_message: String,
    pub labels: Vec<String>,
}

impl PullRequestDraft {
    pub fn prepare(
        proposal: &Proposal,
        owner: impl Into<String>,
        repo: impl Into<String>,
        base_branch: impl Into<String>,
    ) -> Self {
        let successes = proposal.success_count();
        let short_sha: String = proposal.commit_sha().chars().take(SHORT_SHA_LEN).collect();
        let branch_name = if short_sha.is_empty() {
            format!("{}/build-{}", BRANCH_PREFIX, proposal.build_number())
        } else {
            format!("{}/build-{}-{}", BRANCH_PREFIX, proposal.build_number(), short_sha)
        };

        let title = format!(
            "Fix {} failing test{} from build #{}",
            successes,
            if successes == 1 { "" } else { "s" },
            proposal.build_number()
        );

        let commit_message = format!(
            "fix(tests): automated fixes for build #{}\n\n{} of {} failing tests repaired",
            proposal.build_number(),
            successes,
            proposal.len()
        );

        Self {
            owner: owner.into(),
            repo: repo.into(),
            base_branch: base_branch.into(),
            title,
            description: render_description(proposal),
            branch_name,
            changes: PatchSet::from_proposal(proposal).changes,
            commit_message,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

fn render_description(proposal: &Proposal) -> String {
    let mut out = String::from("## Automated Test Fixes\n\n");
    out.push_str(&format!("- **Build:** #{}\n", proposal.build_number()));
    if !proposal.commit_sha().is_empty() {
        out.push_str(&format!("- **Commit:** `{}`\n", proposal.commit_sha()));
    }
    if let Some(branch) = proposal.branch() {
        out.push_str(&format!("- **Branch:** `{}`\n", branch));
    }
    out.push_str(&format!(
        "- **Fixes:** {} of {} failures\n- **Average confidence:** {:.0}%\n- **Estimated time saved:** {} minutes\n\n",
        proposal.success_count(),
        proposal.len(),
        proposal.total_confidence() * 100.0,
        proposal.estimated_minutes_saved()
    ));

    for fix in proposal.successful_fixes() {
        out.push_str(&render_fix(fix));
    }

    let failed: Vec<&FixRecord> = proposal.failed_fixes().collect();
    if !failed.is_empty() {
        out.push_str("### Not fixed automatically\n\n");
        for fix in failed {
            out.push_str(&format!(
                "- `{}` ({}): {}\n",
                fix.file_path(),
                fix.strategy(),
                fix.validation_errors().join("; ")
            ));
        }
        out.push('\n');
    }

    out.push_str("Please review each change before merging.\n");
    out
}

fn render_fix(fix: &FixRecord) -> String {
    let mut section = format!("### `{}`\n\n", fix.file_path());
    section.push_str(&format!(
        "- **Strategy:** {}\n- **Confidence:** {:.0}%\n",
        fix.strategy(),
        fix.confidence() * 100.0
    ));
    if let Some(usage) = fix.model() {
        section.push_str(&format!(
            "- **Model:** {} ({} tokens)\n",
            usage.model, usage.tokens_used
        ));
    }
    section.push_str(&format!("\n{}\n\n", fix.explanation()));
    section
}

/// A pull request opened by a repository collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPullRequest {
    pub url: String,
    pub number: u64,
    pub branch_name: String,
    pub files_changed: usize,
}
