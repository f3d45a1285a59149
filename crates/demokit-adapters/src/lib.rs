//! demokit adapters - host-framework bindings
//!
//! Each binding wraps one kind of data-fetching primitive so that call sites
//! do not know interception is happening. A binding only:
//! - derives an [`OperationKey`] and JSON arguments from the host's call
//!   descriptor ([`CallDescriptor`])
//! - binds the real operation
//! - delegates to [`Interceptor::intercept`]
//!
//! Caching, retries and revalidation stay with the host.
//!
//! | Module | Host primitive | Key |
//! |---|---|---|
//! | [`query`] | keyed query function | query name |
//! | [`loader`] | route loader | route pattern |
//! | [`rpc`] | RPC procedure | dotted procedure path |
//! | [`mutation`] | write operation | demo name tag |
//! | [`http`] | JSON HTTP client | `METHOD /path` |

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod http;
pub mod loader;
pub mod mutation;
pub mod query;
pub mod rpc;

use demokit_core::{DemoError, Interceptor, OperationKey};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

pub use http::{DemoHttpClient, HttpError};
pub use loader::{LoaderArgs, LoaderBinding};
pub use mutation::{MutationBinding, MutationSpec};
pub use query::{QueryBinding, QueryKey};
pub use rpc::{procedure_path, DemoProcedure, Procedure, ProcedureKind};

/// Host call descriptor that can be turned into a key and arguments
pub trait CallDescriptor {
    /// Key correlating this call with a fixture
    fn operation_key(&self) -> OperationKey;

    /// Arguments handed to argument-aware fixtures
    fn operation_args(&self) -> Value;
}

/// Route one described call through the interceptor
///
/// `real` receives the descriptor back, so the host operation never sees the
/// JSON form of its own arguments.
///
/// # Errors
/// Whatever [`Interceptor::intercept`] returns.
pub async fn dispatch<D, T, E, F, Fut>(interceptor: &Interceptor, descriptor: D, real: F) -> Result<T, E>
where
    D: CallDescriptor,
    T: DeserializeOwned,
    E: From<DemoError>,
    F: FnOnce(D) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let key = descriptor.operation_key();
    let args = descriptor.operation_args();
    interceptor
        .intercept(&key, args, move |_args| real(descriptor))
        .await
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
