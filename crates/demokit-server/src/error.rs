//! Server error types

use demokit_core::DemoError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised while setting up or running the demo server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration or fixture problem
    #[error(transparent)]
    Demo(#[from] DemoError),

    /// Could not bind the listen address
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        /// Address that failed
        addr: SocketAddr,
        /// Underlying error
        source: warp::Error,
    },

    /// Tracing filter did not parse or a subscriber was already installed
    #[error("cannot initialise logging: {0}")]
    Telemetry(String),

    /// `--args` was not valid JSON
    #[error("invalid arguments JSON: {0}")]
    Args(#[from] serde_json::Error),
}
