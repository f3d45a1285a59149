//! Interceptor: the fixture-or-real decision point
//!
//! Every adapter calls [`Interceptor::intercept`] in place of its real
//! operation. The interceptor:
//! - reads the mode once, at call start
//! - passes straight through when demo mode is off (no lookup, no delay)
//! - answers from the registry when a fixture matches, after the configured
//!   artificial latency
//! - falls back to the real operation on a miss, after notifying `on_missing`
//!
//! Errors from the real operation and failures simulated by fixtures are
//! returned unchanged. Nothing is retried or suppressed.

use crate::error::DemoError;
use crate::mode_store::ModeStore;
use crate::registry::{FixtureRegistry, Resolution};
use crate::types::{InterceptionRecord, ModeState, OperationKey, ResolutionSource, ScenarioName};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type MissHook = Arc<dyn Fn(&OperationKey) + Send + Sync>;
type RecordHook = Arc<dyn Fn(&InterceptionRecord) + Send + Sync>;

/// What a call should do, decided before any real work happens
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Answer with this fixture value (latency already applied)
    Fixture(Value),
    /// Run the real operation
    PassThrough,
}

/// Cheap-to-clone interception handle
#[derive(Clone)]
pub struct Interceptor {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ModeStore>,
    registry: Arc<FixtureRegistry>,
    latency: Duration,
    on_missing: Option<MissHook>,
    on_record: Option<RecordHook>,
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("mode", &self.inner.store.state())
            .field("fixtures", &self.inner.registry.len())
            .field("latency", &self.inner.latency)
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    /// Start building an interceptor
    #[inline]
    #[must_use]
    pub fn builder(store: Arc<ModeStore>, registry: Arc<FixtureRegistry>) -> InterceptorBuilder {
        InterceptorBuilder {
            store,
            registry,
            latency: Duration::ZERO,
            on_missing: None,
            on_record: None,
        }
    }

    /// Interceptor with no latency and no hooks
    #[inline]
    #[must_use]
    pub fn new(store: Arc<ModeStore>, registry: Arc<FixtureRegistry>) -> Self {
        Self::builder(store, registry).build()
    }

    /// Run `real` or answer from a fixture
    ///
    /// The fixture value is decoded into `T`.
    ///
    /// # Errors
    /// - whatever `real` returns, unchanged
    /// - `DemoError::FixtureRejected` when the fixture simulates a failure
    /// - `DemoError::FixtureDecode` when the fixture does not fit `T`
    pub async fn intercept<T, E, F, Fut>(&self, key: &OperationKey, args: Value, real: F) -> Result<T, E>
    where
        T: DeserializeOwned,
        E: From<DemoError>,
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.decide(key, &args).await? {
            Decision::Fixture(value) => serde_json::from_value(value).map_err(|source| {
                E::from(DemoError::FixtureDecode {
                    key: key.clone(),
                    source,
                })
            }),
            Decision::PassThrough => real(args).await,
        }
    }

    /// Untyped variant of [`Interceptor::intercept`]
    ///
    /// # Errors
    /// Same as [`Interceptor::intercept`], minus decoding.
    pub async fn intercept_value<E, F, Fut>(&self, key: &OperationKey, args: Value, real: F) -> Result<Value, E>
    where
        E: From<DemoError>,
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        match self.decide(key, &args).await? {
            Decision::Fixture(value) => Ok(value),
            Decision::PassThrough => real(args).await,
        }
    }

    /// Decide fixture-vs-real without running anything real
    ///
    /// For hosts whose real path does not produce a JSON value (a proxied
    /// HTTP response, a stream). Latency is applied here on the fixture path.
    ///
    /// # Errors
    /// Returns `DemoError::FixtureRejected` when the fixture simulates a
    /// failure.
    pub async fn decide(&self, key: &OperationKey, args: &Value) -> Result<Decision, DemoError> {
        // One read per call; later mode changes do not affect this call.
        let mode = self.inner.store.state();
        if !mode.is_enabled() {
            self.emit(key, false, ResolutionSource::Real, Duration::ZERO, &mode);
            return Ok(Decision::PassThrough);
        }

        match self.inner.registry.resolve(key, args, mode.scenario()) {
            Ok(Resolution::Found(value)) => {
                self.delay().await;
                self.emit(key, true, ResolutionSource::Fixture, self.inner.latency, &mode);
                Ok(Decision::Fixture(value))
            }
            Err(failure) => {
                self.delay().await;
                self.emit(key, true, ResolutionSource::Fixture, self.inner.latency, &mode);
                Err(DemoError::FixtureRejected {
                    key: key.clone(),
                    failure,
                })
            }
            Ok(Resolution::Missing) => {
                tracing::warn!(
                    key = %key,
                    scenario = mode.scenario().map(ScenarioName::as_str),
                    "no fixture for operation, passing through"
                );
                if let Some(hook) = &self.inner.on_missing {
                    hook(key);
                }
                self.emit(key, false, ResolutionSource::Real, Duration::ZERO, &mode);
                Ok(Decision::PassThrough)
            }
        }
    }

    /// Mode store this interceptor reads
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ModeStore> {
        &self.inner.store
    }

    /// Registry this interceptor resolves against
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<FixtureRegistry> {
        &self.inner.registry
    }

    /// Artificial latency on the fixture path
    #[inline]
    #[must_use]
    pub fn latency(&self) -> Duration {
        self.inner.latency
    }

    async fn delay(&self) {
        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }
    }

    fn emit(&self, key: &OperationKey, matched: bool, source: ResolutionSource, latency: Duration, mode: &ModeState) {
        let record = InterceptionRecord {
            key: key.clone(),
            matched,
            source,
            latency,
            scenario: mode.scenario().cloned(),
        };
        tracing::debug!(
            key = %record.key,
            matched = record.matched,
            source = ?record.source,
            latency_ms = u64::try_from(record.latency.as_millis()).unwrap_or(u64::MAX),
            "intercepted operation"
        );
        if let Some(hook) = &self.inner.on_record {
            hook(&record);
        }
    }
}

/// Builder for [`Interceptor`]
pub struct InterceptorBuilder {
    store: Arc<ModeStore>,
    registry: Arc<FixtureRegistry>,
    latency: Duration,
    on_missing: Option<MissHook>,
    on_record: Option<RecordHook>,
}

impl fmt::Debug for InterceptorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorBuilder")
            .field("latency", &self.latency)
            .field("has_on_missing", &self.on_missing.is_some())
            .field("has_on_record", &self.on_record.is_some())
            .finish_non_exhaustive()
    }
}

impl InterceptorBuilder {
    /// Simulated network latency for fixture answers
    #[inline]
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Called with the key whenever demo mode is on but no fixture answers
    #[must_use]
    pub fn on_missing<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OperationKey) + Send + Sync + 'static,
    {
        self.on_missing = Some(Arc::new(hook));
        self
    }

    /// Called with every interception record
    #[must_use]
    pub fn on_record<F>(mut self, hook: F) -> Self
    where
        F: Fn(&InterceptionRecord) + Send + Sync + 'static,
    {
        self.on_record = Some(Arc::new(hook));
        self
    }

    /// Build the interceptor
    #[must_use]
    pub fn build(self) -> Interceptor {
        Interceptor {
            inner: Arc::new(Inner {
                store: self.store,
                registry: self.registry,
                latency: self.latency,
                on_missing: self.on_missing,
                on_record: self.on_record,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulatedFailure;
    use crate::registry::DynamicFixture;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Arc<FixtureRegistry> {
        Arc::new(
            FixtureRegistry::builder()
                .fixture("getUser", json!({"id": "1", "name": "Ann"}))
                .fixture("checkout", SimulatedFailure::new("card declined").with_status(402))
                .build(),
        )
    }

    #[tokio::test]
    async fn fixture_answers_when_enabled() {
        let interceptor = Interceptor::new(ModeStore::with_state(ModeState::enabled()), registry());
        let value: Value = interceptor
            .intercept(&OperationKey::query("getUser"), json!({}), |_| async {
                Err::<Value, DemoError>(DemoError::config("real path must not run"))
            })
            .await
            .unwrap();
        assert_eq!(value, json!({"id": "1", "name": "Ann"}));
    }

    #[tokio::test]
    async fn disabled_passes_through() {
        let interceptor = Interceptor::new(ModeStore::with_state(ModeState::disabled()), registry());
        let value: Value = interceptor
            .intercept(&OperationKey::query("getUser"), json!({}), |_| async {
                Ok::<_, DemoError>(json!({"id": "live"}))
            })
            .await
            .unwrap();
        assert_eq!(value, json!({"id": "live"}));
    }

    #[tokio::test]
    async fn simulated_failure_propagates() {
        let interceptor = Interceptor::new(ModeStore::with_state(ModeState::enabled()), registry());
        let err = interceptor
            .intercept_value(&OperationKey::query("checkout"), json!({}), |_| async {
                Ok::<_, DemoError>(json!("live"))
            })
            .await
            .unwrap_err();
        assert!(err.is_simulated());
        assert_eq!(err.simulated_status(), Some(402));
    }

    #[tokio::test]
    async fn miss_calls_hook_then_real() {
        let missed = Arc::new(Mutex::new(Vec::new()));
        let sink = missed.clone();
        let interceptor = Interceptor::builder(ModeStore::with_state(ModeState::enabled()), registry())
            .on_missing(move |key| sink.lock().push(key.clone()))
            .build();

        let value = interceptor
            .intercept_value(&OperationKey::query("getOrders"), json!({}), |_| async {
                Ok::<_, DemoError>(json!([]))
            })
            .await
            .unwrap();

        assert_eq!(value, json!([]));
        assert_eq!(*missed.lock(), vec![OperationKey::query("getOrders")]);
    }

    #[tokio::test]
    async fn undecodable_fixture_is_reported() {
        #[derive(Debug, serde::Deserialize)]
        struct User {
            #[allow(dead_code)]
            email: String,
        }

        let interceptor = Interceptor::new(ModeStore::with_state(ModeState::enabled()), registry());
        let err = interceptor
            .intercept::<User, DemoError, _, _>(&OperationKey::query("getUser"), json!({}), |_| async {
                Err(DemoError::config("unused"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DemoError::FixtureDecode { .. }));
    }

    #[tokio::test]
    async fn records_describe_the_path() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = evaluations.clone();
        let registry = Arc::new(
            FixtureRegistry::builder()
                .fixture(
                    "productById",
                    DynamicFixture::infallible(move |args| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        (args["id"] == "42").then(|| json!({"id": "42"}))
                    }),
                )
                .build(),
        );
        let store = ModeStore::with_state(ModeState::enabled());
        let interceptor = Interceptor::builder(store.clone(), registry)
            .on_record(move |record| sink.lock().push(record.clone()))
            .build();
        let key = OperationKey::query("productById");

        let decision = interceptor.decide(&key, &json!({"id": "42"})).await.unwrap();
        assert_eq!(decision, Decision::Fixture(json!({"id": "42"})));
        let decision = interceptor.decide(&key, &json!({"id": "7"})).await.unwrap();
        assert_eq!(decision, Decision::PassThrough);

        store.set_enabled(false);
        let decision = interceptor.decide(&key, &json!({"id": "42"})).await.unwrap();
        assert_eq!(decision, Decision::PassThrough);

        let sources: Vec<_> = records.lock().iter().map(|r| (r.matched, r.source)).collect();
        assert_eq!(
            sources,
            vec![
                (true, ResolutionSource::Fixture),
                (false, ResolutionSource::Real),
                (false, ResolutionSource::Real),
            ]
        );
        // Disabled mode never consults the registry.
        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
    }
}
