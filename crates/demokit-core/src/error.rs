//! Error types for demokit core
//!
//! Provides error handling for:
//! - Configuration problems (missing endpoints, unreadable config)
//! - Fixture authoring problems (bad files, undecodable values)
//! - Fixtures that deliberately simulate a failed call
//! - Mode persistence failures

use crate::types::OperationKey;
use std::path::PathBuf;

/// Main demokit error type
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// Required endpoint or setting is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Scenario name cannot be carried over the wire
    #[error("invalid scenario name: {0:?}")]
    InvalidScenario(String),

    /// Fixture matched but its value does not fit the caller's type
    #[error("fixture for {key} does not decode: {source}")]
    FixtureDecode {
        /// Operation whose fixture failed to decode
        key: OperationKey,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// Fixture deliberately answers with a failure
    #[error("fixture for {key} rejected: {failure}")]
    FixtureRejected {
        /// Operation answered by the failing fixture
        key: OperationKey,
        /// The simulated failure
        failure: SimulatedFailure,
    },

    /// Fixture file could not be loaded
    #[error(transparent)]
    FixtureFile(#[from] FixtureFileError),

    /// Mode persistence failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DemoError {
    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if the error came from a fixture rather than the real backend
    #[inline]
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::FixtureRejected { .. })
    }

    /// HTTP-style status carried by a simulated failure
    #[must_use]
    pub fn simulated_status(&self) -> Option<u16> {
        match self {
            Self::FixtureRejected { failure, .. } => failure.status,
            _ => None,
        }
    }
}

/// Failure produced on purpose by a fixture entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{message}")]
pub struct SimulatedFailure {
    /// HTTP-style status, if the failure mimics one
    #[serde(default)]
    pub status: Option<u16>,
    /// Human-readable message
    pub message: String,
}

impl SimulatedFailure {
    /// Create failure with message
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// With HTTP-style status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Errors while loading fixture files
#[derive(Debug, thiserror::Error)]
pub enum FixtureFileError {
    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No format registered for file extension
    #[error("unsupported fixture file extension: '{0}'")]
    UnsupportedExtension(String),

    /// File content is not valid for its format
    #[error("syntax error in {path}: {message}")]
    Syntax {
        /// Offending file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Reserved `$` tag used incorrectly
    #[error("malformed fixture entry {key} in {path}: {message}")]
    MalformedEntry {
        /// File declaring the entry
        path: PathBuf,
        /// Fixture key of the entry
        key: String,
        /// What is wrong with the tag
        message: String,
    },
}

impl FixtureFileError {
    /// Create syntax error for path
    pub fn syntax(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Syntax {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Errors from mode storage backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend cannot be reached or written
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// IO error on file-backed storage
    #[error("io error on {path}: {source}")]
    Io {
        /// Storage file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Stored data is not in the expected shape
    #[error("corrupt storage at {path}: {message}")]
    Corrupt {
        /// Storage file
        path: PathBuf,
        /// What could not be read
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_error_display() {
        let err = DemoError::config("no backend url");
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn simulated_failure_classification() {
        let err = DemoError::FixtureRejected {
            key: OperationKey::query("getCart"),
            failure: SimulatedFailure::new("out of stock").with_status(409),
        };
        assert!(err.is_simulated());
        assert_eq!(err.simulated_status(), Some(409));
        assert!(err.to_string().contains("out of stock"));

        assert!(!DemoError::config("x").is_simulated());
        assert_eq!(DemoError::config("x").simulated_status(), None);
    }

    #[test]
    fn file_errors_name_their_path() {
        let err = FixtureFileError::MalformedEntry {
            path: PathBuf::from("fixtures/shop.yaml"),
            key: "getCart".into(),
            message: "$fail needs a message".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed fixture entry getCart in fixtures/shop.yaml: $fail needs a message"
        );

        let err = StorageError::Corrupt {
            path: PathBuf::from("mode.json"),
            message: "not an object".into(),
        };
        assert_eq!(err.to_string(), "corrupt storage at mode.json: not an object");
    }

    #[test]
    fn simulated_failure_deserializes_without_status() {
        let failure: SimulatedFailure =
            serde_json::from_value(serde_json::json!({"message": "boom"})).unwrap();
        assert_eq!(failure, SimulatedFailure::new("boom"));
    }
}
