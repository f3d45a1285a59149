//! Fixture files
//!
//! Declarative fixtures in JSON, YAML or TOML:
//!
//! ```yaml
//! fixtures:
//!   getUser: { id: "1", name: "Ann" }
//!   productById:
//!     $match:
//!       - args: { id: "42" }
//!         value: { id: "42", name: "Lamp" }
//!   checkout:
//!     $fail: { status: 402, message: "card declined" }
//! mutations:
//!   createOrder: { orderId: "o-1" }
//! scenarios:
//!   empty-cart:
//!     fixtures:
//!       getCart: { items: [] }
//! ```
//!
//! Reserved tags: `$fail`, `$match` (with optional `$default`) and `$value`,
//! the escape hatch for static values that would otherwise look tagged.

use crate::error::{FixtureFileError, SimulatedFailure};
use crate::registry::{DynamicFixture, FixtureEntry, FixtureRegistry, FixtureRegistryBuilder, FixtureSet};
use crate::types::{OperationKey, ScenarioName};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Supported fixture file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl FixtureFormat {
    /// Detect format from file extension
    ///
    /// # Errors
    /// Returns `FixtureFileError::UnsupportedExtension` for anything else.
    pub fn from_path(path: &Path) -> Result<Self, FixtureFileError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(FixtureFileError::UnsupportedExtension(ext)),
        }
    }

    fn parse(self, path: &Path, content: &str) -> Result<Value, FixtureFileError> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| FixtureFileError::syntax(path, e)),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| FixtureFileError::syntax(path, e)),
            Self::Toml => toml::from_str(content).map_err(|e| FixtureFileError::syntax(path, e)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOverlay {
    #[serde(default)]
    fixtures: Map<String, Value>,
    #[serde(default)]
    mutations: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFixtureFile {
    #[serde(default)]
    fixtures: Map<String, Value>,
    #[serde(default)]
    mutations: Map<String, Value>,
    #[serde(default)]
    scenarios: BTreeMap<String, RawOverlay>,
}

/// Fixtures decoded from one file
#[derive(Debug, Clone, Default)]
pub struct FixtureFile {
    /// Base fixtures
    pub base: FixtureSet,
    /// Scenario overlays
    pub scenarios: HashMap<ScenarioName, FixtureSet>,
}

impl FixtureFile {
    /// Read and decode a fixture file
    ///
    /// # Errors
    /// Returns `FixtureFileError` if the file cannot be read, has an unknown
    /// extension, does not parse, or misuses a reserved tag.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureFileError> {
        let path = path.as_ref();
        let format = FixtureFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| FixtureFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content, format)
    }

    /// Decode fixture file content; `path` is used in error messages only
    ///
    /// # Errors
    /// Same as [`FixtureFile::load`], minus IO.
    pub fn parse(path: &Path, content: &str, format: FixtureFormat) -> Result<Self, FixtureFileError> {
        let raw = format.parse(path, content)?;
        let raw: RawFixtureFile =
            serde_json::from_value(raw).map_err(|e| FixtureFileError::syntax(path, e))?;

        let mut file = Self {
            base: decode_set(path, raw.fixtures, raw.mutations)?,
            scenarios: HashMap::new(),
        };
        for (name, overlay) in raw.scenarios {
            let scenario = ScenarioName::new(name.clone()).map_err(|e| FixtureFileError::MalformedEntry {
                path: path.to_path_buf(),
                key: format!("scenarios.{name}"),
                message: e.to_string(),
            })?;
            file.scenarios
                .insert(scenario, decode_set(path, overlay.fixtures, overlay.mutations)?);
        }
        tracing::debug!(
            path = %path.display(),
            fixtures = file.base.len(),
            scenarios = file.scenarios.len(),
            "loaded fixture file"
        );
        Ok(file)
    }

    /// Merge into a registry builder; this file's entries win
    pub fn apply(self, builder: &mut FixtureRegistryBuilder) {
        builder.merge(self.base, self.scenarios);
    }
}

/// Load several fixture files into one registry, later files winning
///
/// # Errors
/// Returns the first file's error.
pub fn load_registry<P: AsRef<Path>>(paths: &[P]) -> Result<FixtureRegistry, FixtureFileError> {
    let mut builder = FixtureRegistry::builder();
    for path in paths {
        FixtureFile::load(path)?.apply(&mut builder);
    }
    Ok(builder.build())
}

fn decode_set(
    path: &Path,
    fixtures: Map<String, Value>,
    mutations: Map<String, Value>,
) -> Result<FixtureSet, FixtureFileError> {
    let mut set = FixtureSet::new();
    for (name, raw) in fixtures {
        let entry = decode_entry(path, &name, raw)?;
        set.insert(OperationKey::query(name), entry);
    }
    for (name, raw) in mutations {
        let entry = decode_entry(path, &name, raw)?;
        set.insert(OperationKey::mutation(name), entry);
    }
    Ok(set)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchRule {
    #[serde(default)]
    args: Map<String, Value>,
    value: Value,
}

fn decode_entry(path: &Path, key: &str, raw: Value) -> Result<FixtureEntry, FixtureFileError> {
    let malformed = |message: String| FixtureFileError::MalformedEntry {
        path: path.to_path_buf(),
        key: key.to_string(),
        message,
    };

    let mut object = match raw {
        Value::Object(object) => object,
        other => return Ok(FixtureEntry::Static(other)),
    };
    if !object.keys().any(|k| k.starts_with('$')) {
        return Ok(FixtureEntry::Static(Value::Object(object)));
    }

    let mut tags: Vec<String> = object.keys().cloned().collect();
    tags.sort_unstable();
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    match tags.as_slice() {
        ["$value"] => Ok(FixtureEntry::Static(object.remove("$value").unwrap_or_default())),
        ["$fail"] => {
            let failure: SimulatedFailure = serde_json::from_value(object.remove("$fail").unwrap_or_default())
                .map_err(|e| malformed(format!("$fail: {e}")))?;
            Ok(FixtureEntry::Failure(failure))
        }
        ["$match"] | ["$default", "$match"] => {
            let rules: Vec<MatchRule> = serde_json::from_value(object.remove("$match").unwrap_or_default())
                .map_err(|e| malformed(format!("$match: {e}")))?;
            let default = object.remove("$default");
            Ok(FixtureEntry::Dynamic(match_fixture(rules, default)))
        }
        other => Err(malformed(format!(
            "unexpected keys {other:?}; tagged entries take exactly one of $value, $fail, $match (+ $default)"
        ))),
    }
}

fn match_fixture(rules: Vec<MatchRule>, default: Option<Value>) -> DynamicFixture {
    DynamicFixture::infallible(move |args| {
        rules
            .iter()
            .find(|rule| args_match(&rule.args, args))
            .map(|rule| rule.value.clone())
            .or_else(|| default.clone())
    })
}

/// Every expected field must be present in the call arguments with an equal value
fn args_match(expected: &Map<String, Value>, args: &Value) -> bool {
    expected
        .iter()
        .all(|(field, want)| args.get(field).is_some_and(|got| got == want))
}

/// Resolve fixture paths relative to a base directory
#[must_use]
pub fn resolve_paths(base_dir: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { base_dir.join(p) })
        .collect()
}
