//! Persistence backends for the mode flag
//!
//! The stored value uses the same grammar as the mode cookie: absent means
//! disabled, `"true"` means enabled without a scenario, and any other string
//! is the active scenario name.

use crate::error::StorageError;
use crate::types::{ModeState, ScenarioName};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Value written for "enabled, no scenario"
pub const ENABLED_VALUE: &str = "true";

/// Storage medium for the mode flag
///
/// Implement this trait to persist mode state somewhere new (a cookie jar,
/// browser-like local storage, a settings service).
pub trait ModeStorage: Send + Sync {
    /// Load persisted state; `Ok(None)` when nothing was persisted
    fn load(&self) -> Result<Option<ModeState>, StorageError>;

    /// Persist state
    fn save(&self, state: &ModeState) -> Result<(), StorageError>;
}

/// Encode state into the stored value grammar; `None` means "remove"
#[must_use]
pub fn encode_value(state: &ModeState) -> Option<String> {
    if !state.is_enabled() {
        return None;
    }
    Some(
        state
            .scenario()
            .map_or_else(|| ENABLED_VALUE.to_string(), |s| s.as_str().to_string()),
    )
}

/// Decode a stored value; presence alone means enabled
///
/// A value that is not a usable scenario name (empty, or containing
/// characters a cookie cannot carry) still enables demo mode, without a
/// scenario.
#[must_use]
pub fn decode_value(value: Option<&str>) -> ModeState {
    match value {
        None => ModeState::disabled(),
        Some(ENABLED_VALUE) => ModeState::enabled(),
        Some(raw) => match ScenarioName::new(raw) {
            Ok(name) => ModeState::with_scenario(name),
            Err(_) => {
                if !raw.is_empty() {
                    tracing::warn!(value = raw, "stored scenario name is not usable, ignoring it");
                }
                ModeState::enabled()
            }
        },
    }
}

/// Storage that never persists anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStorage;

impl ModeStorage for NoStorage {
    fn load(&self) -> Result<Option<ModeState>, StorageError> {
        Ok(None)
    }

    fn save(&self, _state: &ModeState) -> Result<(), StorageError> {
        Ok(())
    }
}

/// In-process storage
///
/// Useful for tests and for sessions that only need to survive a store
/// rebuild. Can be switched into a failing mode to exercise the
/// "storage unavailable" path.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
    fail_writes: Mutex<bool>,
    writes: Mutex<usize>,
}

impl MemoryStorage {
    /// Create empty storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage holding a raw value
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        let storage = Self::new();
        *storage.value.lock() = Some(value.into());
        storage
    }

    /// Make every subsequent save fail
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Raw stored value
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.value.lock().clone()
    }

    /// Number of successful saves
    #[must_use]
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }
}

impl ModeStorage for MemoryStorage {
    fn load(&self) -> Result<Option<ModeState>, StorageError> {
        Ok(self.value.lock().as_deref().map(|v| decode_value(Some(v))))
    }

    fn save(&self, state: &ModeState) -> Result<(), StorageError> {
        if *self.fail_writes.lock() {
            return Err(StorageError::Unavailable("memory storage is read-only".into()));
        }
        *self.value.lock() = encode_value(state);
        *self.writes.lock() += 1;
        Ok(())
    }
}

/// File-backed key-value storage
///
/// Holds a JSON object of string entries; the mode lives under one key, so
/// several tools can share a settings file. Writes go to a temporary sibling
/// file that is then renamed over the original.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    key: String,
}

impl FileStorage {
    /// Default entry key
    pub const DEFAULT_KEY: &'static str = "demokit-mode";

    /// Create storage at path, using the default key
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: Self::DEFAULT_KEY.to_string(),
        }
    }

    /// With a custom entry key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// File path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl ModeStorage for FileStorage {
    fn load(&self) -> Result<Option<ModeState>, StorageError> {
        let entries = self.read_entries()?;
        Ok(entries.get(&self.key).map(|v| decode_value(Some(v))))
    }

    fn save(&self, state: &ModeState) -> Result<(), StorageError> {
        let mut entries = self.read_entries()?;
        match encode_value(state) {
            Some(value) => entries.insert(self.key.clone(), value),
            None => entries.remove(&self.key),
        };
        self.write_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str) -> ScenarioName {
        ScenarioName::new(name).unwrap()
    }

    #[test]
    fn value_grammar() {
        assert_eq!(decode_value(None), ModeState::disabled());
        assert_eq!(decode_value(Some("true")), ModeState::enabled());
        assert_eq!(decode_value(Some("")), ModeState::enabled());
        assert_eq!(
            decode_value(Some("empty-cart")),
            ModeState::with_scenario(scenario("empty-cart"))
        );

        assert_eq!(encode_value(&ModeState::disabled()), None);
        assert_eq!(encode_value(&ModeState::enabled()).as_deref(), Some("true"));
        assert_eq!(
            encode_value(&ModeState::with_scenario(scenario("sale"))).as_deref(),
            Some("sale")
        );
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.load().unwrap().is_none());

        storage.save(&ModeState::enabled()).unwrap();
        assert_eq!(storage.raw().as_deref(), Some("true"));
        assert_eq!(storage.load().unwrap(), Some(ModeState::enabled()));

        storage.save(&ModeState::disabled()).unwrap();
        assert_eq!(storage.raw(), None);
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn memory_storage_failing_writes() {
        let storage = MemoryStorage::with_value("sale");
        storage.set_fail_writes(true);
        assert!(storage.save(&ModeState::disabled()).is_err());
        assert_eq!(storage.raw().as_deref(), Some("sale"));
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("settings.json"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn file_storage_keeps_foreign_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let storage = FileStorage::new(&path).with_key("mode");
        storage.save(&ModeState::with_scenario(scenario("sale"))).unwrap();
        assert_eq!(
            storage.load().unwrap(),
            Some(ModeState::with_scenario(scenario("sale")))
        );

        storage.save(&ModeState::disabled()).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("theme"));
        assert!(!raw.contains("mode"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn file_storage_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.load(), Err(StorageError::Corrupt { .. })));
    }
}
