//! Write operations
//!
//! Host frameworks identify mutations by generated ids or endpoints that are
//! not stable enough to key fixtures on. Every mutation therefore carries an
//! explicit demo name, and only that name is used for matching.

use demokit_core::{DemoError, Interceptor, OperationKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// Identity of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationSpec {
    demo_name: String,
    host_id: Option<String>,
}

impl MutationSpec {
    /// Mutation tagged with its demo name
    #[inline]
    #[must_use]
    pub fn new(demo_name: impl Into<String>) -> Self {
        Self {
            demo_name: demo_name.into(),
            host_id: None,
        }
    }

    /// Host framework's own identifier; logged, never matched
    #[inline]
    #[must_use]
    pub fn host_id(mut self, id: impl Into<String>) -> Self {
        self.host_id = Some(id.into());
        self
    }

    /// Demo name
    #[inline]
    #[must_use]
    pub fn demo_name(&self) -> &str {
        &self.demo_name
    }

    /// Key in the mutation namespace
    #[inline]
    #[must_use]
    pub fn operation_key(&self) -> OperationKey {
        OperationKey::mutation(&self.demo_name)
    }
}

/// Mutation binding
#[derive(Debug, Clone)]
pub struct MutationBinding {
    interceptor: Interceptor,
}

impl MutationBinding {
    /// Bind to an interceptor
    #[inline]
    #[must_use]
    pub fn new(interceptor: Interceptor) -> Self {
        Self { interceptor }
    }

    /// Run a mutation, from a fixture or through `mutate_fn`
    ///
    /// `variables` become the fixture arguments and are handed back to
    /// `mutate_fn` untouched on the real path.
    ///
    /// # Errors
    /// Whatever `mutate_fn` returns, or a fixture error.
    pub async fn mutate<V, T, E, F, Fut>(&self, spec: &MutationSpec, variables: V, mutate_fn: F) -> Result<T, E>
    where
        V: Serialize,
        T: DeserializeOwned,
        E: From<DemoError>,
        F: FnOnce(V) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = spec.operation_key();
        let args = match serde_json::to_value(&variables) {
            Ok(args) => args,
            Err(error) => {
                tracing::warn!(key = %key, %error, "mutation variables are not representable as JSON");
                Value::Null
            }
        };
        tracing::trace!(key = %key, host_id = spec.host_id.as_deref(), "dispatching mutation");
        self.interceptor
            .intercept(&key, args, move |_args| mutate_fn(variables))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_does_not_change_key() {
        let tagged = MutationSpec::new("createOrder").host_id("mutation-17");
        assert_eq!(tagged.operation_key(), MutationSpec::new("createOrder").operation_key());
        assert_eq!(tagged.operation_key(), OperationKey::mutation("createOrder"));
    }

    #[tokio::test]
    async fn unrepresentable_variables_still_resolve() {
        use demokit_core::{FixtureRegistry, ModeState, ModeStore};
        use serde_json::json;
        use std::collections::BTreeMap;
        use std::sync::Arc;

        let registry = FixtureRegistry::builder()
            .mutation("createOrder", json!({"orderId": "o-1"}))
            .build();
        let binding = MutationBinding::new(Interceptor::new(
            ModeStore::with_state(ModeState::enabled()),
            Arc::new(registry),
        ));
        let variables = BTreeMap::from([(vec![1u8], 1u8)]);

        let order: Value = binding
            .mutate(&MutationSpec::new("createOrder"), variables, |_| async {
                Err::<Value, DemoError>(DemoError::config("real path must not run"))
            })
            .await
            .unwrap();
        assert_eq!(order, json!({"orderId": "o-1"}));
    }
}
