//! End-to-end behaviour of classify → dispatch → aggregate with a
//! deterministic backend.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use triage::{
    AssertionStrategy, BackendError, ClassifiedFailure, DispatchConfig, FailureCategory,
    FailureClassifier, FailureRecord, FixBackend, FixRecord, FixRequest, GeneratedFix,
    PatchSet, ProposalAggregator, RepairContext, RepairDispatcher, RepairStrategy,
    StrategyRegistry,
};

/// Backend that always answers with the same code and counts calls.
struct CannedBackend {
    fixed_code: String,
    calls: AtomicUsize,
}

impl CannedBackend {
    fn new(fixed_code: &str) -> Arc<Self> {
        Arc::new(Self {
            fixed_code: fixed_code.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixBackend for CannedBackend {
    fn model_name(&self) -> &str {
        "canned-model"
    }

    async fn generate_test_fix(&self, _request: &FixRequest) -> Result<GeneratedFix, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedFix {
            fixed_code: self.fixed_code.clone(),
            explanation: "canned".to_string(),
            tokens_used: 10,
        })
    }
}

fn classified(message: &str, category: FailureCategory, confidence: f64) -> ClassifiedFailure {
    let record = FailureRecord::new("t", "user.test.ts", message).with_build("job-1", 5, "abc");
    ClassifiedFailure::new(record, category, confidence)
}

#[tokio::test]
async fn assertion_substitution_scenario() {
    let failure = classified(
        "Expected: \"John\", Received: \"Jane\"",
        FailureCategory::Assertion,
        0.8,
    );
    let fix = AssertionStrategy::new()
        .generate_fix(&failure, "expect(user.name).toBe(\"John\")", None)
        .await;

    assert!(fix.is_success());
    assert!(fix.fixed_code().contains("\"Jane\""));
    assert_eq!(fix.confidence(), 0.85);
}

#[tokio::test]
async fn assertion_fallback_scenario() {
    let backend = CannedBackend::new("// AI generated fix");
    let failure = classified("Some weird error format", FailureCategory::Assertion, 0.8);

    let fix = AssertionStrategy::with_backend(backend.clone())
        .generate_fix(&failure, "expect(1).toBe(2)", None)
        .await;

    assert_eq!(fix.strategy(), "assertion-ai");
    assert!(fix.is_success());
    assert_eq!(fix.fixed_code(), "// AI generated fix");
    assert_eq!(fix.model().map(|m| m.model.as_str()), Some("canned-model"));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn snapshot_scenario_never_calls_backend() {
    let backend = CannedBackend::new("// nope");
    let registry = StrategyRegistry::with_defaults(Some(backend.clone() as Arc<dyn FixBackend>));
    let dispatcher = RepairDispatcher::new(registry, DispatchConfig::default());

    let failure = classified("snapshot mismatch", FailureCategory::Snapshot, 0.9);
    let fix = dispatcher.dispatch(&failure, "const tree = 1;", None).await;

    assert_eq!(fix.original_code(), fix.fixed_code());
    assert_eq!(fix.confidence(), 0.95);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn low_confidence_rejected_whether_or_not_registered() {
    let failure = classified("whatever", FailureCategory::Mock, 0.2);

    for registry in [
        StrategyRegistry::new(),
        StrategyRegistry::with_defaults(Some(CannedBackend::new("// x") as Arc<dyn FixBackend>)),
    ] {
        let dispatcher = RepairDispatcher::new(registry, DispatchConfig::default());
        let fix = dispatcher.dispatch(&failure, "code", None).await;
        assert!(!fix.is_success());
        assert!(fix.validation_errors().iter().any(|e| e == "Low confidence"));
    }
}

/// Produces a fixed outcome per file so the aggregate is easy to predict.
struct ScriptedStrategy;

#[async_trait]
impl RepairStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn can_handle(&self, _failure: &ClassifiedFailure) -> bool {
        true
    }

    async fn generate_fix(
        &self,
        failure: &ClassifiedFailure,
        file_content: &str,
        _code_diff: Option<&str>,
    ) -> FixRecord {
        if failure.test_file == "good.test.ts" {
            FixRecord::succeeded(failure.test_file.as_str(), self.name())
                .original_code(file_content)
                .fixed_code("// fixed")
                .confidence(0.8)
                .build()
        } else {
            FixRecord::failed(failure.test_file.as_str(), self.name())
                .validation_error("scripted failure")
                .build()
        }
    }
}

#[tokio::test]
async fn aggregate_mean_excludes_failed_fixes() {
    let registry = StrategyRegistry::new().with(FailureCategory::Mock, Arc::new(ScriptedStrategy));
    let aggregator = ProposalAggregator::new(RepairDispatcher::new(registry, DispatchConfig::default()));

    let make = |file: &str| {
        ClassifiedFailure::new(
            FailureRecord::new("t", file, "mock").with_build("j", 11, "sha"),
            FailureCategory::Mock,
            0.9,
        )
    };
    let failures = vec![make("good.test.ts"), make("bad.test.ts")];

    let proposal = aggregator.aggregate(&failures, &RepairContext::new()).await;

    assert_eq!(proposal.len(), 2);
    assert_eq!(proposal.total_confidence(), 0.8);
    assert_eq!(proposal.estimated_minutes_saved(), 15);
    assert_eq!(PatchSet::from_proposal(&proposal).len(), 1);
}

#[tokio::test]
async fn classify_then_aggregate_with_defaults() {
    let backend = CannedBackend::new("// regenerated");
    let classifier = FailureClassifier::new();
    let records = vec![
        FailureRecord::new("renders", "Button.test.tsx", "Snapshot mismatch in Button")
            .with_build("j", 3, "f00"),
        FailureRecord::new("name", "user.test.ts", "Expected: \"John\", Received: \"Jane\"")
            .with_stack_trace("at user.test.ts:4:1")
            .with_build("j", 3, "f00"),
        FailureRecord::new("calls", "api.test.ts", "Mock function was not called")
            .with_stack_trace("at api.test.ts:9:1")
            .with_build("j", 3, "f00"),
        FailureRecord::new("odd", "odd.test.ts", "Some weird error format").with_build("j", 3, "f00"),
    ];
    let classified = classifier.classify_many(&records);

    let context = RepairContext::new()
        .with_file("Button.test.tsx", "expect(tree).toMatchSnapshot()")
        .with_file("user.test.ts", "expect(user.name).toBe('John')")
        .with_file("api.test.ts", "expect(api).toHaveBeenCalled()")
        .with_code_diff("- John\n+ Jane");

    let registry = StrategyRegistry::with_defaults(Some(backend.clone() as Arc<dyn FixBackend>));
    let aggregator = ProposalAggregator::new(RepairDispatcher::new(registry, DispatchConfig::default()));
    let proposal = aggregator.aggregate(&classified, &context).await;

    let strategies: Vec<_> = proposal.fixes().iter().map(|f| f.strategy()).collect();
    assert_eq!(strategies, ["snapshot", "assertion", "ai-powered", "none"]);
    assert_eq!(proposal.success_count(), 3);
    // Only the mock failure reached the backend; unknown was below threshold.
    assert_eq!(backend.calls(), 1);
    assert_eq!(proposal.build_number(), 3);
}
