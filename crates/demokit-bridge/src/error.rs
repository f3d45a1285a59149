//! Bridge error types

use demokit_core::DemoError;
use thiserror::Error;

/// Errors raised by the cookie bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Cookie name is not an HTTP token
    #[error("invalid cookie name: {0:?}")]
    InvalidCookieName(String),

    /// Error from the core layer
    #[error(transparent)]
    Demo(#[from] DemoError),
}

impl BridgeError {
    /// HTTP status a control route answers with for this error
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidCookieName(_) => 500,
            Self::Demo(DemoError::InvalidScenario(_)) => 400,
            Self::Demo(err) => err.simulated_status().unwrap_or(500),
        }
    }
}
