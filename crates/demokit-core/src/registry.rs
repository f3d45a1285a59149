//! Fixture registry
//!
//! Provides [`FixtureRegistry`], an immutable mapping from operation key to
//! fixture entry with optional per-scenario overlays.

use crate::error::SimulatedFailure;
use crate::types::{OperationKey, ScenarioName};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

type DynamicFn = dyn Fn(&Value) -> Result<Option<Value>, SimulatedFailure> + Send + Sync;

/// Argument-aware fixture
///
/// Returning `Ok(None)` means "no fixture for these arguments": resolution
/// then reports a miss even though the key matched.
#[derive(Clone)]
pub struct DynamicFixture(Arc<DynamicFn>);

impl DynamicFixture {
    /// Wrap a fixture function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<Value>, SimulatedFailure> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap an infallible fixture function
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::new(move |args| Ok(f(args)))
    }

    /// Evaluate against call arguments
    #[inline]
    pub fn call(&self, args: &Value) -> Result<Option<Value>, SimulatedFailure> {
        (self.0)(args)
    }
}

impl fmt::Debug for DynamicFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynamicFixture(..)")
    }
}

/// One fixture
#[derive(Debug, Clone)]
pub enum FixtureEntry {
    /// Same value for every call
    Static(Value),
    /// Value computed from the call arguments
    Dynamic(DynamicFixture),
    /// Every call fails with this error
    Failure(SimulatedFailure),
}

impl FixtureEntry {
    /// Static entry from anything serializable
    ///
    /// # Errors
    /// Returns the serializer error if `value` cannot become JSON.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Static)
    }

    fn evaluate(&self, args: &Value) -> Result<Option<Value>, SimulatedFailure> {
        match self {
            Self::Static(value) => Ok(Some(value.clone())),
            Self::Dynamic(f) => f.call(args),
            Self::Failure(failure) => Err(failure.clone()),
        }
    }
}

impl From<Value> for FixtureEntry {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

impl From<DynamicFixture> for FixtureEntry {
    fn from(f: DynamicFixture) -> Self {
        Self::Dynamic(f)
    }
}

impl From<SimulatedFailure> for FixtureEntry {
    fn from(failure: SimulatedFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Outcome of a registry lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A fixture answered
    Found(Value),
    /// No key match, or an argument-aware fixture declined
    Missing,
}

impl Resolution {
    /// Whether a fixture answered
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A flat set of fixtures (base registry or one scenario overlay)
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    entries: HashMap<OperationKey, FixtureEntry>,
}

impl FixtureSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; replaces any previous entry for the key
    pub fn insert(&mut self, key: OperationKey, entry: impl Into<FixtureEntry>) {
        self.entries.insert(key, entry.into());
    }

    /// Look up an entry
    #[inline]
    #[must_use]
    pub fn get(&self, key: &OperationKey) -> Option<&FixtureEntry> {
        self.entries.get(key)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys
    pub fn keys(&self) -> impl Iterator<Item = &OperationKey> {
        self.entries.keys()
    }

    /// Move all entries of `other` into this set; `other` wins on conflicts
    pub fn extend(&mut self, other: FixtureSet) {
        self.entries.extend(other.entries);
    }
}

/// Immutable fixture registry with scenario overlays
///
/// Lookups take `&self` and never mutate, so one registry can be shared
/// behind an `Arc` by any number of concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    base: FixtureSet,
    scenarios: HashMap<ScenarioName, FixtureSet>,
}

impl FixtureRegistry {
    /// Start building a registry
    #[inline]
    #[must_use]
    pub fn builder() -> FixtureRegistryBuilder {
        FixtureRegistryBuilder::default()
    }

    /// Registry with no fixtures
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve a key against the active scenario, then the base set
    ///
    /// The scenario overlay replaces the base entry for the same key as a
    /// whole; values are never merged field by field. An unknown scenario
    /// behaves as no scenario.
    ///
    /// # Errors
    /// Returns the fixture's [`SimulatedFailure`] when the matching entry is
    /// designed to fail.
    pub fn resolve(
        &self,
        key: &OperationKey,
        args: &Value,
        scenario: Option<&ScenarioName>,
    ) -> Result<Resolution, SimulatedFailure> {
        let entry = scenario
            .and_then(|name| self.scenarios.get(name))
            .and_then(|overlay| overlay.get(key))
            .or_else(|| self.base.get(key));

        match entry {
            Some(entry) => Ok(entry
                .evaluate(args)?
                .map_or(Resolution::Missing, Resolution::Found)),
            None => Ok(Resolution::Missing),
        }
    }

    /// Check if a key has an entry for the given scenario (or the base set)
    #[must_use]
    pub fn contains(&self, key: &OperationKey, scenario: Option<&ScenarioName>) -> bool {
        scenario
            .and_then(|name| self.scenarios.get(name))
            .is_some_and(|overlay| overlay.get(key).is_some())
            || self.base.get(key).is_some()
    }

    /// Base fixture set
    #[inline]
    #[must_use]
    pub fn base(&self) -> &FixtureSet {
        &self.base
    }

    /// Overlay for one scenario
    #[inline]
    #[must_use]
    pub fn scenario(&self, name: &ScenarioName) -> Option<&FixtureSet> {
        self.scenarios.get(name)
    }

    /// All keys in the base set, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<&OperationKey> {
        let mut keys: Vec<_> = self.base.keys().collect();
        keys.sort();
        keys
    }

    /// All scenario names, sorted
    #[must_use]
    pub fn scenarios(&self) -> Vec<&ScenarioName> {
        self.scenarios.keys().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Total number of entries across base and overlays
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len() + self.scenarios.values().map(FixtureSet::len).sum::<usize>()
    }

    /// Check if there are no entries at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for [`FixtureRegistry`]
///
/// Last registration for a key wins.
#[derive(Debug, Default)]
pub struct FixtureRegistryBuilder {
    base: FixtureSet,
    scenarios: HashMap<ScenarioName, FixtureSet>,
}

impl FixtureRegistryBuilder {
    /// Register a query fixture
    #[must_use]
    pub fn fixture(mut self, name: impl Into<String>, entry: impl Into<FixtureEntry>) -> Self {
        self.base.insert(OperationKey::query(name), entry);
        self
    }

    /// Register a mutation fixture under its demo name tag
    #[must_use]
    pub fn mutation(mut self, demo_name: impl Into<String>, entry: impl Into<FixtureEntry>) -> Self {
        self.base.insert(OperationKey::mutation(demo_name), entry);
        self
    }

    /// Register a query fixture in a scenario overlay
    #[must_use]
    pub fn scenario_fixture(
        mut self,
        scenario: ScenarioName,
        name: impl Into<String>,
        entry: impl Into<FixtureEntry>,
    ) -> Self {
        self.scenarios
            .entry(scenario)
            .or_default()
            .insert(OperationKey::query(name), entry);
        self
    }

    /// Register a mutation fixture in a scenario overlay
    #[must_use]
    pub fn scenario_mutation(
        mut self,
        scenario: ScenarioName,
        demo_name: impl Into<String>,
        entry: impl Into<FixtureEntry>,
    ) -> Self {
        self.scenarios
            .entry(scenario)
            .or_default()
            .insert(OperationKey::mutation(demo_name), entry);
        self
    }

    /// Register an entry under an explicit key
    pub fn insert(&mut self, key: OperationKey, entry: impl Into<FixtureEntry>) {
        self.base.insert(key, entry);
    }

    /// Register an entry under an explicit key in a scenario overlay
    pub fn insert_scenario(
        &mut self,
        scenario: ScenarioName,
        key: OperationKey,
        entry: impl Into<FixtureEntry>,
    ) {
        self.scenarios.entry(scenario).or_default().insert(key, entry);
    }

    /// Merge a base set and overlays; incoming entries win
    pub fn merge(&mut self, base: FixtureSet, scenarios: HashMap<ScenarioName, FixtureSet>) {
        self.base.extend(base);
        for (name, overlay) in scenarios {
            self.scenarios.entry(name).or_default().extend(overlay);
        }
    }

    /// Freeze into a registry
    #[must_use]
    pub fn build(self) -> FixtureRegistry {
        FixtureRegistry {
            base: self.base,
            scenarios: self.scenarios,
        }
    }
}
