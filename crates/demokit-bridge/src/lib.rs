//! demokit bridge - mode transport between server and client
//!
//! When a host renders on both sides, the server and the client must agree
//! on the mode for the same request. The server reads and writes the mode
//! cookie ([`ModeCookie`], [`with_mode`], [`reply_with_mode`]); the client
//! reads it once at hydration ([`HydrationGate`]).
//!
//! [`control_routes`] exposes the mode to dashboards and scripts.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cookie;
pub mod error;
pub mod filter;
pub mod hydration;
pub mod routes;
pub mod storage;

pub use cookie::ModeCookie;
pub use error::BridgeError;
pub use filter::{reply_with_mode, with_mode, with_mode_or, RequestMode};
pub use hydration::{HydrationGate, ModeView};
pub use routes::{control_routes, ControlAction, CONTROL_PREFIX};
pub use storage::CookieStorage;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
