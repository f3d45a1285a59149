//! demokit server - demo-mode reverse proxy and fixture tooling
//!
//! Puts fixtures in front of a real backend without touching the client:
//! requests are keyed `METHOD /path`, answered from fixtures while demo mode
//! is on, and forwarded upstream otherwise. The mode travels in the demo
//! cookie, so each browser can be in a different mode.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod proxy;
pub mod telemetry;

pub use cli::{Cli, Command};
pub use commands::{check, resolve, CheckReport, ResolveOutcome, ResolveRequest};
pub use error::ServerError;
pub use proxy::{DemoServer, SOURCE_HEADER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
