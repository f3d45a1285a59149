//! Core types for demokit
//!
//! Defines the fundamental types shared by every layer:
//! - Mode state and scenario names
//! - Operation keys
//! - Interception records

use crate::error::DemoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Name of a scenario overlay
///
/// Scenario names travel inside a cookie value, so they must be non-empty,
/// must not be the literal `"true"` (which means "enabled, no scenario"), and
/// must not contain whitespace, control characters, `"`, `,`, `;` or `\`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ScenarioName(String);

impl ScenarioName {
    /// Validate and wrap a scenario name
    ///
    /// # Errors
    /// Returns `DemoError::InvalidScenario` if the name cannot be carried in
    /// the mode cookie.
    pub fn new(name: impl Into<String>) -> Result<Self, DemoError> {
        let name = name.into();
        if name.is_empty() || name == "true" || !name.chars().all(is_cookie_safe) {
            return Err(DemoError::InvalidScenario(name));
        }
        Ok(Self(name))
    }

    /// Borrow the name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_cookie_safe(c: char) -> bool {
    !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | ',' | ';' | '\\')
}

impl FromStr for ScenarioName {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for ScenarioName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScenarioName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether demo mode is on, and which scenario is active
///
/// A scenario can only be present while demo mode is enabled; the fields are
/// private so that no value breaks this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawModeState")]
pub struct ModeState {
    enabled: bool,
    scenario: Option<ScenarioName>,
}

impl ModeState {
    /// Demo mode off
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Demo mode on, base fixtures only
    #[inline]
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            scenario: None,
        }
    }

    /// Demo mode on with a scenario overlay
    #[inline]
    #[must_use]
    pub fn with_scenario(scenario: ScenarioName) -> Self {
        Self {
            enabled: true,
            scenario: Some(scenario),
        }
    }

    /// Whether demo mode is on
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Active scenario, if any
    #[inline]
    #[must_use]
    pub fn scenario(&self) -> Option<&ScenarioName> {
        self.scenario.as_ref()
    }
}

#[derive(Deserialize)]
struct RawModeState {
    enabled: bool,
    #[serde(default)]
    scenario: Option<ScenarioName>,
}

impl TryFrom<RawModeState> for ModeState {
    type Error = String;

    fn try_from(raw: RawModeState) -> Result<Self, Self::Error> {
        match (raw.enabled, raw.scenario) {
            (false, Some(name)) => Err(format!("scenario {name} set while demo mode is disabled")),
            (enabled, scenario) => Ok(Self { enabled, scenario }),
        }
    }
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.enabled, &self.scenario) {
            (false, _) => f.write_str("disabled"),
            (true, None) => f.write_str("enabled"),
            (true, Some(name)) => write!(f, "enabled ({name})"),
        }
    }
}

/// Kind of data operation a key identifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read operation (query, loader, GET)
    Query,
    /// Write operation, keyed by its demo name tag
    Mutation,
}

/// Opaque identifier correlating a call site with a fixture entry
///
/// The name is never interpreted by the core; each adapter decides how to
/// derive it (query name, route pattern, procedure path, demo name tag).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    /// Read or write
    pub kind: OperationKind,
    /// Adapter-derived name
    pub name: String,
}

impl OperationKey {
    /// Key for a read operation
    #[inline]
    #[must_use]
    pub fn query(name: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Query,
            name: name.into(),
        }
    }

    /// Key for a write operation, from its demo name tag
    #[inline]
    #[must_use]
    pub fn mutation(demo_name: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Mutation,
            name: demo_name.into(),
        }
    }

    /// Key name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperationKind::Query => f.write_str(&self.name),
            OperationKind::Mutation => write!(f, "mutation:{}", self.name),
        }
    }
}

/// Where an intercepted call got its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// Answered from the fixture registry
    Fixture,
    /// Passed through to the real operation
    Real,
}

/// Per-call telemetry record
///
/// Produced once per intercepted call and handed to logging/observers; it has
/// no lifecycle beyond the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptionRecord {
    /// Operation key
    pub key: OperationKey,
    /// Whether a fixture matched
    pub matched: bool,
    /// Path taken
    pub source: ResolutionSource,
    /// Artificial latency applied
    #[serde(rename = "latency_ms", serialize_with = "as_millis")]
    pub latency: Duration,
    /// Scenario active when the call started
    pub scenario: Option<ScenarioName>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_name_validation() {
        assert!(ScenarioName::new("empty-cart").is_ok());
        assert!(ScenarioName::new("holiday_sale.v2").is_ok());
        assert!(ScenarioName::new("").is_err());
        assert!(ScenarioName::new("true").is_err());
        assert!(ScenarioName::new("two words").is_err());
        assert!(ScenarioName::new("a;b").is_err());
        assert!(ScenarioName::new("quote\"d").is_err());
    }

    #[test]
    fn mode_state_constructors_hold_invariant() {
        let off = ModeState::disabled();
        assert!(!off.is_enabled());
        assert!(off.scenario().is_none());

        let on = ModeState::with_scenario(ScenarioName::new("sale").unwrap());
        assert!(on.is_enabled());
        assert_eq!(on.scenario().map(ScenarioName::as_str), Some("sale"));
    }

    #[test]
    fn mode_state_rejects_scenario_without_enabled() {
        let bad = serde_json::json!({"enabled": false, "scenario": "sale"});
        assert!(serde_json::from_value::<ModeState>(bad).is_err());

        let good = serde_json::json!({"enabled": true, "scenario": "sale"});
        let state: ModeState = serde_json::from_value(good).unwrap();
        assert_eq!(state.to_string(), "enabled (sale)");
    }

    #[test]
    fn operation_keys_distinguish_kind() {
        let q = OperationKey::query("createOrder");
        let m = OperationKey::mutation("createOrder");
        assert_ne!(q, m);
        assert_eq!(q.to_string(), "createOrder");
        assert_eq!(m.to_string(), "mutation:createOrder");
    }

    #[test]
    fn interception_record_serializes_latency_in_ms() {
        let record = InterceptionRecord {
            key: OperationKey::query("getUser"),
            matched: true,
            source: ResolutionSource::Fixture,
            latency: Duration::from_millis(250),
            scenario: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["latency_ms"], 250);
        assert_eq!(json["source"], "fixture");
    }
}
