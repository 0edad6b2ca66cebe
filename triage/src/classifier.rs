//! Test failure classification
//!
//! Assigns every failing test a [`FailureCategory`] and a deterministic
//! confidence score from its error message and stack trace.
//!
//! Error messages routinely contain overlapping keywords ("expected ...
//! received undefined", "TypeError: mock is not a function"), so the rules are
//! evaluated in a fixed priority order and the first match wins:
//!
//! | # | Category         | Rule                                                        |
//! |---|------------------|-------------------------------------------------------------|
//! | 1 | `Snapshot`       | "snapshot" with "mismatch" / "does not match"               |
//! | 2 | `PropertyChange` | "is not a function"                                         |
//! | 3 | `TypeError`      | explicit "type error:" / "typeerror:" label                 |
//! | 4 | `Assertion`      | "expected" with "received" / "but got"                      |
//! | 5 | `TypeError`      | undefined/null access phrasing                              |
//! | 6 | `PropertyChange` | "undefined"/"null" with "property"/"field"/"attribute"      |
//! | 7 | `Mock`           | "mock", "spy", "stub" or a mock-framework call marker       |
//! | 8 | `Unknown`        | fallthrough                                                 |

use crate::model::{ClassifiedFailure, FailureCategory, FailureRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SNAPSHOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"snapshot").unwrap());

static MISMATCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mismatch|does not match").unwrap());

static NOT_A_FUNCTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"is not a function").unwrap());

static TYPE_ERROR_LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"type ?error:").unwrap());

static EXPECTED_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"expected").unwrap());

static ACTUAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"received|but got").unwrap());

static NULLISH_ACCESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"typeerror|cannot read propert|undefined is not|null is not|is not defined")
        .unwrap()
});

static NULLISH_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"undefined|null").unwrap());

static MEMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"propert(?:y|ies)|field|attribute").unwrap());

static MOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mock|spy|stub|jest\.fn|tohavebeencalled|sinon\.").unwrap()
});

/// Confidence assigned to failures nothing could classify.
pub const UNKNOWN_CONFIDENCE: f64 = 0.3;
/// Confidence assigned to snapshot mismatches.
pub const SNAPSHOT_CONFIDENCE: f64 = 0.9;
/// Starting confidence for every other category.
pub const BASE_CONFIDENCE: f64 = 0.7;
/// Bonus for a non-empty stack trace and for a detailed error message.
pub const DETAIL_BONUS: f64 = 0.1;
/// Error messages longer than this many characters count as detailed.
pub const DETAILED_MESSAGE_CHARS: usize = 50;

/// Stateless, deterministic failure classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureClassifier;

impl FailureClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a single failure. Pure function of the record's text.
    pub fn classify(&self, failure: &FailureRecord) -> ClassifiedFailure {
        let category = Self::detect_category(&failure.error_message, &failure.stack_trace);
        let confidence = Self::score_confidence(failure, category);

        tracing::debug!(
            test = %failure.test_name,
            file = %failure.test_file,
            %category,
            confidence,
            "classified failure"
        );

        // The affected-code excerpt is the stack trace; locating the exact
        // failing expression needs source lookups this crate does not do.
        ClassifiedFailure::new(failure.clone(), category, confidence)
    }

    /// Classify a batch, preserving input order.
    pub fn classify_many(&self, failures: &[FailureRecord]) -> Vec<ClassifiedFailure> {
        failures.iter().map(|f| self.classify(f)).collect()
    }

    /// Determine the category for an error message and stack trace.
    pub fn detect_category(error_message: &str, stack_trace: &str) -> FailureCategory {
        let text = format!("{} {}", error_message, stack_trace).to_lowercase();

        if SNAPSHOT_PATTERN.is_match(&text) && MISMATCH_PATTERN.is_match(&text) {
            return FailureCategory::Snapshot;
        }
        if NOT_A_FUNCTION_PATTERN.is_match(&text) {
            return FailureCategory::PropertyChange;
        }
        if TYPE_ERROR_LABEL_PATTERN.is_match(&text) {
            return FailureCategory::TypeError;
        }
        if EXPECTED_PATTERN.is_match(&text) && ACTUAL_PATTERN.is_match(&text) {
            return FailureCategory::Assertion;
        }
        if NULLISH_ACCESS_PATTERN.is_match(&text) {
            return FailureCategory::TypeError;
        }
        if NULLISH_PATTERN.is_match(&text) && MEMBER_PATTERN.is_match(&text) {
            return FailureCategory::PropertyChange;
        }
        if MOCK_PATTERN.is_match(&text) {
            return FailureCategory::Mock;
        }

        FailureCategory::Unknown
    }

    /// Score how clearly the failure points at a fix.
    pub fn score_confidence(failure: &FailureRecord, category: FailureCategory) -> f64 {
        match category {
            FailureCategory::Unknown => UNKNOWN_CONFIDENCE,
            FailureCategory::Snapshot => SNAPSHOT_CONFIDENCE,
            _ => {
                let mut confidence = BASE_CONFIDENCE;
                if !failure.stack_trace.is_empty() {
                    confidence += DETAIL_BONUS;
                }
                if failure.error_message.chars().count() > DETAILED_MESSAGE_CHARS {
                    confidence += DETAIL_BONUS;
                }
                confidence.min(1.0)
            }
        }
    }

    /// Summary statistics over a classified batch.
    pub fn summarize(failures: &[ClassifiedFailure]) -> ClassificationSummary {
        let mut by_category = BTreeMap::new();
        for failure in failures {
            *by_category.entry(failure.category()).or_insert(0) += 1;
        }

        let mean_confidence = if failures.is_empty() {
            0.0
        } else {
            failures.iter().map(|f| f.confidence()).sum::<f64>() / failures.len() as f64
        };

        ClassificationSummary {
            total: failures.len(),
            by_category,
            mean_confidence,
        }
    }
}

/// Summary of a classified batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    /// Total failure count
    pub total: usize,
    /// Count by category
    pub by_category: BTreeMap<FailureCategory, usize>,
    /// Mean classifier confidence
    pub mean_confidence: f64,
}

impl ClassificationSummary {
    pub fn count(&self, category: FailureCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(message: &str, stack: &str) -> FailureRecord {
        FailureRecord::new("test", "src/app.test.ts", message).with_stack_trace(stack)
    }

    fn category_of(message: &str) -> FailureCategory {
        FailureClassifier::detect_category(message, "")
    }

    #[test]
    fn test_snapshot_detection() {
        assert_eq!(
            category_of("Snapshot `renders 1` mismatched"),
            FailureCategory::Snapshot
        );
        assert_eq!(
            category_of("Received value does not match stored snapshot"),
            FailureCategory::Snapshot
        );
    }

    #[test]
    fn test_snapshot_beats_assertion() {
        let msg = "Snapshot mismatch: expected \"a\" received \"b\"";
        assert_eq!(category_of(msg), FailureCategory::Snapshot);
    }

    #[test]
    fn test_not_a_function_is_property_change() {
        assert_eq!(
            category_of("TypeError: user.getName is not a function"),
            FailureCategory::PropertyChange
        );
    }

    #[test]
    fn test_type_error_label_beats_assertion() {
        let msg = "TypeError: expected a string but got undefined";
        assert_eq!(category_of(msg), FailureCategory::TypeError);
    }

    #[test]
    fn test_assertion_detection() {
        assert_eq!(
            category_of("Expected: \"John\", Received: \"Jane\""),
            FailureCategory::Assertion
        );
        assert_eq!(
            category_of("Expected 200 but got 404"),
            FailureCategory::Assertion
        );
    }

    #[test]
    fn test_assertion_beats_nullish_heuristic() {
        let msg = "expect(received).toBe(expected)\nExpected: 3\nReceived: undefined";
        assert_eq!(category_of(msg), FailureCategory::Assertion);
    }

    #[test]
    fn test_nullish_access_is_type_error() {
        assert_eq!(
            category_of("Cannot read properties of undefined (reading 'id')"),
            FailureCategory::TypeError
        );
        assert_eq!(
            category_of("ReferenceError: fetchUser is not defined"),
            FailureCategory::TypeError
        );
    }

    #[test]
    fn test_missing_field_is_property_change() {
        assert_eq!(
            category_of("field userId was undefined in response"),
            FailureCategory::PropertyChange
        );
    }

    #[test]
    fn test_mock_detection() {
        assert_eq!(
            category_of("jest.fn() was not called with the right arguments"),
            FailureCategory::Mock
        );
        assert_eq!(
            category_of("spy was called 0 times"),
            FailureCategory::Mock
        );
        assert_eq!(category_of("stub returned nothing"), FailureCategory::Mock);
    }

    #[test]
    fn test_stack_trace_participates() {
        let cat = FailureClassifier::detect_category("Test failed", "at mockApi (api.ts:3:1)");
        assert_eq!(cat, FailureCategory::Mock);
    }

    #[test]
    fn test_unknown_fallthrough() {
        assert_eq!(category_of("Some weird error format"), FailureCategory::Unknown);
    }

    #[test]
    fn test_confidence_scoring() {
        let classifier = FailureClassifier::new();

        let unknown = classifier.classify(&failure("Some weird error format", "at x"));
        assert_eq!(unknown.confidence(), UNKNOWN_CONFIDENCE);

        let snapshot = classifier.classify(&failure("snapshot mismatch", ""));
        assert_eq!(snapshot.confidence(), SNAPSHOT_CONFIDENCE);

        let bare = classifier.classify(&failure("spy not called", ""));
        assert!((bare.confidence() - 0.7).abs() < 1e-9);

        let with_stack = classifier.classify(&failure("spy not called", "at a.ts:1:1"));
        assert!((with_stack.confidence() - 0.8).abs() < 1e-9);

        let long = "x".repeat(51);
        let detailed = classifier.classify(&failure(&format!("mock {}", long), "at a.ts:1:1"));
        assert!((detailed.confidence() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_affected_code_is_stack_trace() {
        let classified =
            FailureClassifier::new().classify(&failure("spy", "at Object.<anonymous> (a.ts:4:2)"));
        assert_eq!(classified.affected_code(), "at Object.<anonymous> (a.ts:4:2)");
    }

    #[test]
    fn test_classify_many_preserves_order() {
        let failures = vec![
            failure("snapshot mismatch", ""),
            failure("Some weird error format", ""),
            failure("Expected 1 but got 2", ""),
        ];
        let classified = FailureClassifier::new().classify_many(&failures);
        let categories: Vec<_> = classified.iter().map(|c| c.category()).collect();
        assert_eq!(
            categories,
            vec![
                FailureCategory::Snapshot,
                FailureCategory::Unknown,
                FailureCategory::Assertion
            ]
        );
    }

    #[test]
    fn test_summary() {
        let classifier = FailureClassifier::new();
        let classified = classifier.classify_many(&[
            failure("snapshot mismatch", ""),
            failure("snapshot does not match", ""),
            failure("weird", ""),
        ]);
        let summary = FailureClassifier::summarize(&classified);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count(FailureCategory::Snapshot), 2);
        assert_eq!(summary.count(FailureCategory::Unknown), 1);
        assert_eq!(summary.count(FailureCategory::Mock), 0);
        assert!((summary.mean_confidence - 0.7).abs() < 1e-9);
    }
}
