//! Category → strategy mapping.
//!
//! One optional slot per [`FailureCategory`]. Lookups go through an
//! exhaustive `match`, so adding a category forces a decision about its
//! slot here; an empty slot is the explicit "no handler" arm the dispatcher
//! reports as `"No strategy found"`.

use std::fmt;
use std::sync::Arc;

use crate::backend::FixBackend;
use crate::model::FailureCategory;
use crate::strategy::{AssertionStrategy, GenerativeStrategy, RepairStrategy, SnapshotStrategy};

type Slot = Option<Arc<dyn RepairStrategy>>;

/// Runtime-reconfigurable strategy table.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    snapshot: Slot,
    assertion: Slot,
    mock: Slot,
    type_error: Slot,
    property_change: Slot,
    unknown: Slot,
}

impl StrategyRegistry {
    /// An empty registry; every category dispatches to "no handler".
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard wiring:
    ///
    /// - `Snapshot` → [`SnapshotStrategy`]
    /// - `Assertion` → [`AssertionStrategy`] (with the backend as fallback)
    /// - everything else → [`GenerativeStrategy`]
    pub fn with_defaults(backend: Option<Arc<dyn FixBackend>>) -> Self {
        let generative: Arc<dyn RepairStrategy> =
            Arc::new(GenerativeStrategy::from_optional(backend.clone()));

        Self::new()
            .with(FailureCategory::Snapshot, Arc::new(SnapshotStrategy::new()))
            .with(
                FailureCategory::Assertion,
                Arc::new(AssertionStrategy::from_optional(backend)),
            )
            .with(FailureCategory::Mock, generative.clone())
            .with(FailureCategory::PropertyChange, generative.clone())
            .with(FailureCategory::TypeError, generative.clone())
            .with(FailureCategory::Unknown, generative)
    }

    fn slot_mut(&mut self, category: FailureCategory) -> &mut Slot {
        match category {
            FailureCategory::Snapshot => &mut self.snapshot,
            FailureCategory::Assertion => &mut self.assertion,
            FailureCategory::Mock => &mut self.mock,
            FailureCategory::TypeError => &mut self.type_error,
            FailureCategory::PropertyChange => &mut self.property_change,
            FailureCategory::Unknown => &mut self.unknown,
        }
    }

    fn slot(&self, category: FailureCategory) -> &Slot {
        match category {
            FailureCategory::Snapshot => &self.snapshot,
            FailureCategory::Assertion => &self.assertion,
            FailureCategory::Mock => &self.mock,
            FailureCategory::TypeError => &self.type_error,
            FailureCategory::PropertyChange => &self.property_change,
            FailureCategory::Unknown => &self.unknown,
        }
    }

    /// Install `strategy` for `category`. Last registration wins; the
    /// displaced strategy is returned.
    pub fn register(
        &mut self,
        category: FailureCategory,
        strategy: Arc<dyn RepairStrategy>,
    ) -> Option<Arc<dyn RepairStrategy>> {
        let previous = self.slot_mut(category).replace(strategy);
        if let Some(prev) = &previous {
            tracing::debug!(%category, replaced = prev.name(), "strategy overwritten");
        }
        previous
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, category: FailureCategory, strategy: Arc<dyn RepairStrategy>) -> Self {
        self.register(category, strategy);
        self
    }

    pub fn unregister(&mut self, category: FailureCategory) -> Option<Arc<dyn RepairStrategy>> {
        self.slot_mut(category).take()
    }

    pub fn get(&self, category: FailureCategory) -> Option<Arc<dyn RepairStrategy>> {
        self.slot(category).clone()
    }

    pub fn is_registered(&self, category: FailureCategory) -> bool {
        self.slot(category).is_some()
    }

    /// Categories with a strategy, in [`FailureCategory::ALL`] order.
    pub fn registered_categories(&self) -> Vec<FailureCategory> {
        FailureCategory::ALL
            .into_iter()
            .filter(|c| self.is_registered(*c))
            .collect()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for category in FailureCategory::ALL {
            map.entry(
                &category.as_str(),
                &self.slot(category).as_ref().map(|s| s.name().to_string()),
            );
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_category() {
        let registry = StrategyRegistry::with_defaults(None);
        assert_eq!(registry.registered_categories(), FailureCategory::ALL.to_vec());

        let name = |c| registry.get(c).map(|s| s.name().to_string());
        assert_eq!(name(FailureCategory::Snapshot).as_deref(), Some("snapshot"));
        assert_eq!(name(FailureCategory::Assertion).as_deref(), Some("assertion"));
        for c in [
            FailureCategory::Mock,
            FailureCategory::PropertyChange,
            FailureCategory::TypeError,
            FailureCategory::Unknown,
        ] {
            assert_eq!(name(c).as_deref(), Some("ai-powered"));
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = StrategyRegistry::new();
        assert!(registry
            .register(FailureCategory::Mock, Arc::new(SnapshotStrategy::new()))
            .is_none());

        let previous = registry.register(
            FailureCategory::Mock,
            Arc::new(GenerativeStrategy::unconfigured()),
        );
        assert_eq!(previous.map(|s| s.name().to_string()).as_deref(), Some("snapshot"));
        assert_eq!(
            registry.get(FailureCategory::Mock).map(|s| s.name().to_string()).as_deref(),
            Some("ai-powered")
        );
    }

    #[test]
    fn test_unregister() {
        let mut registry = StrategyRegistry::with_defaults(None);
        assert!(registry.unregister(FailureCategory::Unknown).is_some());
        assert!(!registry.is_registered(FailureCategory::Unknown));
        assert!(registry.get(FailureCategory::Unknown).is_none());
        assert_eq!(registry.registered_categories().len(), 5);
    }

    #[test]
    fn test_debug_lists_slots() {
        let registry = StrategyRegistry::new()
            .with(FailureCategory::Snapshot, Arc::new(SnapshotStrategy::new()));
        let debug = format!("{:?}", registry);
        assert!(debug.contains("\"snapshot\": Some(\"snapshot\")"));
        assert!(debug.contains("\"mock\": None"));
    }
}
