//! demokit configuration
//!
//! Loaded from a TOML file, then overridden by `DEMOKIT_*` environment
//! variables. Every field has a default, so an empty file is valid.

use crate::error::DemoError;
use crate::fixture_file::{load_registry, resolve_paths};
use crate::registry::FixtureRegistry;
use crate::storage::{FileStorage, ModeStorage, NoStorage};
use crate::types::ModeState;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default mode cookie name
pub const DEFAULT_COOKIE_NAME: &str = "demokit-mode";

/// Default cap on proxied request bodies (2 MiB)
pub const DEFAULT_MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// demokit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Cookie carrying the mode across the server/client boundary
    pub cookie_name: String,
    /// Artificial latency for fixture answers, in milliseconds
    pub latency_ms: u64,
    /// File backing the persistent mode key (none = not persisted)
    pub storage_path: Option<PathBuf>,
    /// Entry key inside the storage file
    pub storage_key: String,
    /// Fixture files, relative to the config file
    pub fixtures: Vec<PathBuf>,
    /// Real backend base URL
    pub upstream: Option<String>,
    /// Listen address for the demo server
    pub listen: SocketAddr,
    /// Default tracing filter (overridden by `RUST_LOG`)
    pub log_filter: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Explicit initial mode, winning over persisted state
    pub mode: Option<ModeState>,
    /// Largest request body the demo server accepts, in bytes
    pub max_body_bytes: u64,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            latency_ms: 0,
            storage_path: None,
            storage_key: FileStorage::DEFAULT_KEY.to_string(),
            fixtures: Vec::new(),
            upstream: None,
            listen: SocketAddr::from(([127, 0, 0, 1], 4500)),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            mode: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            base_dir: PathBuf::from("."),
        }
    }
}

impl DemoConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text; relative paths resolve against `base_dir`
    ///
    /// # Errors
    /// Returns `DemoError::Config` on syntax errors or unknown keys.
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, DemoError> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| DemoError::config(format!("invalid config: {e}")))?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    /// Load a TOML config file
    ///
    /// # Errors
    /// Returns `DemoError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DemoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DemoError::config(format!("cannot read {}: {e}", path.display())))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_toml_str(&text, base_dir)
    }

    /// Apply `DEMOKIT_*` overrides from the process environment
    ///
    /// # Errors
    /// Returns `DemoError::Config` if an override does not parse.
    pub fn with_env(self) -> Result<Self, DemoError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `DEMOKIT_*` overrides from a lookup function
    ///
    /// Recognised: `DEMOKIT_UPSTREAM`, `DEMOKIT_LATENCY_MS`,
    /// `DEMOKIT_LISTEN`, `DEMOKIT_COOKIE_NAME`, `DEMOKIT_MAX_BODY_BYTES`.
    ///
    /// # Errors
    /// Returns `DemoError::Config` if an override does not parse.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, DemoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(upstream) = lookup("DEMOKIT_UPSTREAM") {
            self.upstream = Some(upstream).filter(|u| !u.is_empty());
        }
        if let Some(latency) = lookup("DEMOKIT_LATENCY_MS") {
            self.latency_ms = latency
                .parse()
                .map_err(|e| DemoError::config(format!("DEMOKIT_LATENCY_MS: {e}")))?;
        }
        if let Some(listen) = lookup("DEMOKIT_LISTEN") {
            self.listen = listen
                .parse()
                .map_err(|e| DemoError::config(format!("DEMOKIT_LISTEN: {e}")))?;
        }
        if let Some(cookie) = lookup("DEMOKIT_COOKIE_NAME") {
            self.cookie_name = cookie;
        }
        if let Some(limit) = lookup("DEMOKIT_MAX_BODY_BYTES") {
            self.max_body_bytes = limit
                .parse()
                .map_err(|e| DemoError::config(format!("DEMOKIT_MAX_BODY_BYTES: {e}")))?;
        }
        Ok(self)
    }

    /// Check values that serde cannot
    ///
    /// # Errors
    /// Returns `DemoError::Config` describing the first problem.
    pub fn validate(&self) -> Result<(), DemoError> {
        if !is_cookie_name(&self.cookie_name) {
            return Err(DemoError::config(format!(
                "cookie_name {:?} is not a valid cookie name",
                self.cookie_name
            )));
        }
        if self.max_body_bytes == 0 {
            return Err(DemoError::config("max_body_bytes must be greater than zero"));
        }
        if let Some(upstream) = &self.upstream {
            if !(upstream.starts_with("http://") || upstream.starts_with("https://")) {
                return Err(DemoError::config(format!(
                    "upstream {upstream:?} must be an http(s) URL"
                )));
            }
        }
        Ok(())
    }

    /// With fixture files
    #[must_use]
    pub fn with_fixtures(mut self, fixtures: Vec<PathBuf>) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// With real backend URL
    #[must_use]
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    /// With artificial latency
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Artificial latency
    #[inline]
    #[must_use]
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Directory relative paths resolve against
    #[inline]
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Fixture file paths, resolved
    #[must_use]
    pub fn fixture_paths(&self) -> Vec<PathBuf> {
        resolve_paths(&self.base_dir, &self.fixtures)
    }

    /// Storage backend for the mode flag
    #[must_use]
    pub fn mode_storage(&self) -> Arc<dyn ModeStorage> {
        match &self.storage_path {
            Some(path) => {
                let path = resolve_paths(&self.base_dir, std::slice::from_ref(path))
                    .pop()
                    .unwrap_or_else(|| path.clone());
                Arc::new(FileStorage::new(path).with_key(self.storage_key.clone()))
            }
            None => Arc::new(NoStorage),
        }
    }

    /// Load every configured fixture file into one registry
    ///
    /// # Errors
    /// Returns `DemoError::FixtureFile` for the first file that fails.
    pub fn load_registry(&self) -> Result<FixtureRegistry, DemoError> {
        Ok(load_registry(&self.fixture_paths())?)
    }
}

/// Whether `name` is usable as a cookie name (an HTTP token)
#[must_use]
pub fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}
