//! Offline fixture commands: `check` and `resolve`

use crate::error::ServerError;
use demokit_core::{
    DemoConfig, FixtureRegistry, FixtureSet, OperationKey, Resolution, ScenarioName, SimulatedFailure,
};
use serde_json::Value;
use std::fmt;

/// Keys defined by the configured fixture files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Keys of the base set, sorted
    pub base: Vec<String>,
    /// Keys of each scenario overlay, sorted by scenario
    pub scenarios: Vec<(String, Vec<String>)>,
}

fn sorted_keys(set: &FixtureSet) -> Vec<String> {
    let mut keys: Vec<String> = set.keys().map(ToString::to_string).collect();
    keys.sort();
    keys
}

impl CheckReport {
    /// Summarise a registry
    #[must_use]
    pub fn from_registry(registry: &FixtureRegistry) -> Self {
        let scenarios = registry
            .scenarios()
            .into_iter()
            .map(|name| {
                let keys = registry.scenario(name).map(sorted_keys).unwrap_or_default();
                (name.to_string(), keys)
            })
            .collect();
        Self {
            base: sorted_keys(registry.base()),
            scenarios,
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "base ({} keys)", self.base.len())?;
        for key in &self.base {
            writeln!(f, "  {key}")?;
        }
        for (name, keys) in &self.scenarios {
            writeln!(f, "scenario {name} ({} keys)", keys.len())?;
            for key in keys {
                writeln!(f, "  {key}")?;
            }
        }
        Ok(())
    }
}

/// Load every fixture file the configuration names
///
/// # Errors
/// Returns the first load error.
pub fn check(config: &DemoConfig) -> Result<CheckReport, ServerError> {
    config.validate()?;
    let registry = config.load_registry()?;
    Ok(CheckReport::from_registry(&registry))
}

/// Result of resolving one key offline
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// A fixture answered
    Found(Value),
    /// Nothing answered; a live call would pass through
    Missing,
    /// The fixture simulates a failure
    Failed(SimulatedFailure),
}

impl fmt::Display for ResolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(value) => match serde_json::to_string_pretty(value) {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{value}"),
            },
            Self::Missing => f.write_str("no fixture (would pass through)"),
            Self::Failed(failure) => match failure.status {
                Some(status) => write!(f, "simulated failure {status}: {}", failure.message),
                None => write!(f, "simulated failure: {}", failure.message),
            },
        }
    }
}

/// What to resolve
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// Operation name, or demo name for a mutation
    pub key: String,
    /// Arguments as JSON text; `{}` when absent
    pub args: Option<String>,
    /// Scenario to resolve under
    pub scenario: Option<String>,
    /// Look the name up in the mutation namespace
    pub mutation: bool,
}

/// Resolve one key against the configured fixtures
///
/// # Errors
/// Returns an error when fixtures fail to load, `args` is not JSON, or the
/// scenario name is unusable.
pub fn resolve(config: &DemoConfig, request: &ResolveRequest) -> Result<ResolveOutcome, ServerError> {
    let registry = config.load_registry()?;
    let key = if request.mutation {
        OperationKey::mutation(&request.key)
    } else {
        OperationKey::query(&request.key)
    };
    let args: Value = match &request.args {
        Some(text) => serde_json::from_str(text)?,
        None => Value::Object(serde_json::Map::new()),
    };
    let scenario = request.scenario.as_deref().map(ScenarioName::new).transpose()?;

    Ok(match registry.resolve(&key, &args, scenario.as_ref()) {
        Ok(Resolution::Found(value)) => ResolveOutcome::Found(value),
        Ok(Resolution::Missing) => ResolveOutcome::Missing,
        Err(failure) => ResolveOutcome::Failed(failure),
    })
}
