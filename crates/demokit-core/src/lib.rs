//! demokit core - demo mode interception
//!
//! The framework-agnostic heart of demokit:
//! - [`ModeStore`] holds whether demo mode is on and which scenario is active
//! - [`FixtureRegistry`] maps operation keys to fixture entries, with
//!   scenario overlays
//! - [`Interceptor`] decides, per call, between a fixture and the real
//!   operation
//!
//! Host-framework bindings live in `demokit-adapters`; the cookie bridge
//! between server and client lives in `demokit-bridge`.
//!
//! # Example
//!
//! ```rust
//! use demokit_core::prelude::*;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), DemoError> {
//! let store = ModeStore::with_state(ModeState::enabled());
//! let registry = FixtureRegistry::builder()
//!     .fixture("getUser", json!({"id": "1", "name": "Ann"}))
//!     .build();
//! let interceptor = Interceptor::new(store, Arc::new(registry));
//!
//! let user: Value = interceptor
//!     .intercept(&OperationKey::query("getUser"), json!({}), |_args| async {
//!         Ok::<Value, DemoError>(json!({"id": "live"}))
//!     })
//!     .await?;
//! assert_eq!(user["name"], "Ann");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod error;
pub mod fixture_file;
pub mod interceptor;
pub mod mode_store;
pub mod registry;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use config::{DemoConfig, LogFormat, DEFAULT_COOKIE_NAME, DEFAULT_MAX_BODY_BYTES};
pub use error::{DemoError, FixtureFileError, SimulatedFailure, StorageError};
pub use fixture_file::{FixtureFile, FixtureFormat};
pub use interceptor::{Decision, Interceptor, InterceptorBuilder};
pub use mode_store::{ModeStore, ModeStoreBuilder, Subscription};
pub use registry::{DynamicFixture, FixtureEntry, FixtureRegistry, FixtureRegistryBuilder, FixtureSet, Resolution};
pub use storage::{FileStorage, MemoryStorage, ModeStorage, NoStorage};
pub use types::{InterceptionRecord, ModeState, OperationKey, OperationKind, ResolutionSource, ScenarioName};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with demokit core
    pub use crate::{
        DemoError, DynamicFixture, FixtureEntry, FixtureRegistry, Interceptor, ModeState, ModeStore,
        OperationKey, ScenarioName, SimulatedFailure,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
