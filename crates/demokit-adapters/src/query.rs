//! Keyed query functions
//!
//! The shape used by query caches: a query is identified by a name plus a
//! parameter object, and fetched by a query function that receives its key.
//! The cache itself (staleness, invalidation, dedup) belongs to the host.

use crate::{dispatch, CallDescriptor};
use demokit_core::{DemoError, Interceptor, OperationKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;

/// Query key: operation name plus parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    name: String,
    params: Vec<(String, Value)>,
}

impl QueryKey {
    /// Key with no parameters
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter; a repeated name replaces the earlier value
    ///
    /// Values that cannot be represented as JSON become `null` (logged).
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let name = name.into();
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(query = %self.name, param = %name, %error, "query parameter is not representable as JSON");
                Value::Null
            }
        };
        self.params.retain(|(n, _)| *n != name);
        self.params.push((name, value));
        self
    }

    /// Query name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.name)?;
        for (name, value) in &self.params {
            write!(f, ", {name}={value}")?;
        }
        f.write_str("]")
    }
}

impl CallDescriptor for QueryKey {
    fn operation_key(&self) -> OperationKey {
        OperationKey::query(&self.name)
    }

    fn operation_args(&self) -> Value {
        Value::Object(self.params.iter().cloned().collect::<Map<_, _>>())
    }
}

/// Query function binding
#[derive(Debug, Clone)]
pub struct QueryBinding {
    interceptor: Interceptor,
}

impl QueryBinding {
    /// Bind to an interceptor
    #[inline]
    #[must_use]
    pub fn new(interceptor: Interceptor) -> Self {
        Self { interceptor }
    }

    /// Fetch a query, from a fixture or through `query_fn`
    ///
    /// # Errors
    /// Whatever `query_fn` returns, or a fixture error.
    pub async fn fetch<T, E, F, Fut>(&self, key: &QueryKey, query_fn: F) -> Result<T, E>
    where
        T: DeserializeOwned,
        E: From<DemoError>,
        F: FnOnce(QueryKey) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        dispatch(&self.interceptor, key.clone(), query_fn).await
    }
}
