use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use super::clamp_confidence;

/// Test runner that produced a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestRunner {
    #[default]
    Jest,
}

/// One failing test as reported by CI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub test_name: String,
    /// Path of the test source file, relative to the repository root.
    pub test_file: String,
    pub error_message: String,
    /// Raw stack trace; empty when the runner output had none.
    #[serde(default)]
    pub stack_trace: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub runner: TestRunner,
}

impl FailureRecord {
    pub fn new(
        test_name: impl Into<String>,
        test_file: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            test_file: test_file.into(),
            error_message: error_message.into(),
            stack_trace: String::new(),
            job_id: String::new(),
            build_number: 0,
            commit_sha: String::new(),
            branch: None,
            timestamp: Utc::now(),
            runner: TestRunner::Jest,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = stack_trace.into();
        self
    }

    /// Attach the CI job, build and commit this failure belongs to.
    pub fn with_build(
        mut self,
        job_id: impl Into<String>,
        build_number: u64,
        commit_sha: impl Into<String>,
    ) -> Self {
        self.job_id = job_id.into();
        self.build_number = build_number;
        self.commit_sha = commit_sha.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Root-cause category of a test failure.
///
/// The set is closed: every category must have a defined dispatch behavior,
/// which [`crate::registry::StrategyRegistry`] enforces with an exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Rendered output no longer matches a stored snapshot.
    Snapshot,
    /// An `expect(..)` comparison failed.
    Assertion,
    /// A mock, spy or stub no longer matches the implementation.
    Mock,
    /// Runtime type errors (undefined/null access, undefined identifiers).
    TypeError,
    /// A method or property was renamed or removed.
    PropertyChange,
    /// Nothing matched; handled by the generative fallback.
    Unknown,
}

impl FailureCategory {
    /// Every category, in declaration order.
    pub const ALL: [FailureCategory; 6] = [
        Self::Snapshot,
        Self::Assertion,
        Self::Mock,
        Self::TypeError,
        Self::PropertyChange,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Assertion => "assertion",
            Self::Mock => "mock",
            Self::TypeError => "type_error",
            Self::PropertyChange => "property_change",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`FailureRecord`] after classification.
///
/// Derefs to the underlying record so callers can read `test_file`,
/// `error_message` etc. directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedFailure {
    #[serde(flatten)]
    record: FailureRecord,
    #[serde(rename = "failureType")]
    category: FailureCategory,
    confidence: f64,
    affected_code: String,
}

impl ClassifiedFailure {
    /// Wrap a record with its category and confidence.
    ///
    /// The affected-code excerpt defaults to the record's stack trace.
    pub fn new(record: FailureRecord, category: FailureCategory, confidence: f64) -> Self {
        let affected_code = record.stack_trace.clone();
        Self {
            record,
            category,
            confidence: clamp_confidence(confidence),
            affected_code,
        }
    }

    pub fn with_affected_code(mut self, affected_code: impl Into<String>) -> Self {
        self.affected_code = affected_code.into();
        self
    }

    pub fn record(&self) -> &FailureRecord {
        &self.record
    }

    pub fn into_record(self) -> FailureRecord {
        self.record
    }

    pub fn category(&self) -> FailureCategory {
        self.category
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn affected_code(&self) -> &str {
        &self.affected_code
    }
}

impl Deref for ClassifiedFailure {
    type Target = FailureRecord;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}
