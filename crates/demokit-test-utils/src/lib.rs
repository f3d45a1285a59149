//! Testing utilities for demokit workspace
//!
//! Shared fixtures, a counting stand-in for real operations, and builders
//! for wired-up interceptors.

#![allow(missing_docs)]

use demokit_core::{
    DemoError, DynamicFixture, FixtureRegistry, InterceptionRecord, Interceptor, ModeState, ModeStore,
    ScenarioName, SimulatedFailure,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SALE: &str = "sale";
pub const EMPTY_CART: &str = "empty-cart";

pub fn scenario(name: &str) -> ScenarioName {
    ScenarioName::new(name).unwrap()
}

pub fn ann() -> Value {
    json!({"id": "1", "name": "Ann"})
}

pub fn lamp() -> Value {
    json!({"id": "42", "name": "Lamp", "price": 30})
}

/// Storefront registry used across test suites
///
/// - `getUser`: static
/// - `productById`: only knows id 42
/// - `getCart`: base cart, emptied by the `empty-cart` scenario
/// - `checkout`: fails with 402
/// - mutation `createOrder`
/// - `sale` scenario discounts product 42
pub fn storefront_registry() -> FixtureRegistry {
    FixtureRegistry::builder()
        .fixture("getUser", ann())
        .fixture(
            "productById",
            DynamicFixture::infallible(|args| (args["id"] == "42").then(lamp)),
        )
        .fixture("getCart", json!({"items": [{"id": "42", "qty": 1}]}))
        .fixture("checkout", SimulatedFailure::new("card declined").with_status(402))
        .mutation("createOrder", json!({"orderId": "o-1"}))
        .scenario_fixture(scenario(EMPTY_CART), "getCart", json!({"items": []}))
        .scenario_fixture(
            scenario(SALE),
            "productById",
            DynamicFixture::infallible(|args| {
                (args["id"] == "42").then(|| json!({"id": "42", "name": "Lamp", "price": 15}))
            }),
        )
        .build()
}

pub fn enabled_store() -> Arc<ModeStore> {
    ModeStore::with_state(ModeState::enabled())
}

pub fn disabled_store() -> Arc<ModeStore> {
    ModeStore::with_state(ModeState::disabled())
}

pub fn interceptor(store: Arc<ModeStore>) -> Interceptor {
    Interceptor::new(store, Arc::new(storefront_registry()))
}

pub fn interceptor_with_latency(store: Arc<ModeStore>, latency: Duration) -> Interceptor {
    Interceptor::builder(store, Arc::new(storefront_registry()))
        .latency(latency)
        .build()
}

/// Interceptor plus captured interception records
pub fn recording_interceptor(store: Arc<ModeStore>) -> (Interceptor, Arc<Mutex<Vec<InterceptionRecord>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    let interceptor = Interceptor::builder(store, Arc::new(storefront_registry()))
        .on_record(move |record| sink.lock().unwrap().push(record.clone()))
        .build();
    (interceptor, records)
}

/// Stand-in for a real backend call that counts invocations
#[derive(Debug, Clone)]
pub struct RealOp {
    calls: Arc<AtomicUsize>,
    response: Value,
}

impl RealOp {
    pub fn returning(response: Value) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            response,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Closure suitable for `Interceptor::intercept`
    pub fn op(
        &self,
    ) -> impl FnOnce(Value) -> std::future::Ready<Result<Value, DemoError>> + Send + 'static {
        let calls = self.calls.clone();
        let response = self.response.clone();
        move |_args| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(response))
        }
    }

    /// Closure that always fails with a configuration error
    pub fn failing(&self, message: &'static str) -> impl FnOnce(Value) -> std::future::Ready<Result<Value, DemoError>> {
        let calls = self.calls.clone();
        move |_args| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(DemoError::config(message)))
        }
    }
}
