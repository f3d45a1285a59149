//! Behavioural properties of the interception layer.
//!
//! Exercises ModeStore + FixtureRegistry + Interceptor together:
//! - pass-through when disabled, with no lookup and no delay
//! - fixture answers, scenario precedence and whole-value replacement
//! - misses fall through to the real operation exactly once
//! - the mode snapshot is taken once per call

use demokit_core::{DemoError, Interceptor, ModeState, ModeStore, OperationKey, ResolutionSource};
use demokit_test_utils::{
    ann, disabled_store, enabled_store, interceptor, interceptor_with_latency, lamp, recording_interceptor,
    scenario, storefront_registry, RealOp, EMPTY_CART, SALE,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const LATENCY: Duration = Duration::from_millis(300);

#[tokio::test]
async fn get_user_served_from_fixture_when_enabled() {
    let real = RealOp::returning(json!({"id": "live"}));
    let value = interceptor(enabled_store())
        .intercept_value(&OperationKey::query("getUser"), json!({}), real.op())
        .await
        .unwrap();

    assert_eq!(value, ann());
    assert_eq!(real.calls(), 0);
}

#[tokio::test]
async fn get_user_served_by_real_operation_when_disabled() {
    let real = RealOp::returning(json!({"id": "live"}));
    let value = interceptor(disabled_store())
        .intercept_value(&OperationKey::query("getUser"), json!({}), real.op())
        .await
        .unwrap();

    assert_eq!(value, json!({"id": "live"}));
    assert_eq!(real.calls(), 1);
}

#[tokio::test]
async fn declining_function_fixture_falls_through() {
    let real = RealOp::returning(json!({"id": "7", "source": "live"}));
    let value = interceptor(enabled_store())
        .intercept_value(&OperationKey::query("productById"), json!({"id": "7"}), real.op())
        .await
        .unwrap();

    assert_eq!(value, json!({"id": "7", "source": "live"}));
    assert_eq!(real.calls(), 1);
}

#[tokio::test]
async fn scenario_overlay_wins_over_base() {
    let store = ModeStore::with_state(ModeState::with_scenario(scenario(SALE)));
    let real = RealOp::returning(json!(null));
    let value = interceptor(store)
        .intercept_value(&OperationKey::query("productById"), json!({"id": "42"}), real.op())
        .await
        .unwrap();

    assert_eq!(value["price"], 15);
    assert_eq!(real.calls(), 0);
}

#[tokio::test]
async fn scenario_without_entries_behaves_like_no_scenario() {
    let with_scenario = interceptor(ModeStore::with_state(ModeState::with_scenario(scenario(EMPTY_CART))));
    let without = interceptor(enabled_store());

    for (key, args) in [("getUser", json!({})), ("productById", json!({"id": "42"}))] {
        let key = OperationKey::query(key);
        let a = with_scenario
            .intercept_value(&key, args.clone(), RealOp::returning(json!("live")).op())
            .await
            .unwrap();
        let b = without
            .intercept_value(&key, args, RealOp::returning(json!("live")).op())
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn real_errors_propagate_unchanged() {
    let real = RealOp::returning(json!(null));
    let err = interceptor(enabled_store())
        .intercept_value(&OperationKey::query("getOrders"), json!({}), real.failing("backend down"))
        .await
        .unwrap_err();

    assert!(matches!(err, DemoError::Config(ref m) if m == "backend down"));
    assert_eq!(real.calls(), 1);
}

#[tokio::test]
async fn mutations_resolve_by_demo_name() {
    let real = RealOp::returning(json!(null));
    let value = interceptor(enabled_store())
        .intercept_value(&OperationKey::mutation("createOrder"), json!({"sku": "42"}), real.op())
        .await
        .unwrap();

    assert_eq!(value, json!({"orderId": "o-1"}));
    assert_eq!(real.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn latency_applies_only_to_fixture_answers() {
    let key = OperationKey::query("getUser");

    let enabled = interceptor_with_latency(enabled_store(), LATENCY);
    let start = Instant::now();
    enabled
        .intercept_value(&key, json!({}), RealOp::returning(json!(null)).op())
        .await
        .unwrap();
    assert!(start.elapsed() >= LATENCY);

    let disabled = interceptor_with_latency(disabled_store(), LATENCY);
    let start = Instant::now();
    disabled
        .intercept_value(&key, json!({}), RealOp::returning(json!(null)).op())
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    let start = Instant::now();
    enabled
        .intercept_value(&OperationKey::query("unknown"), json!({}), RealOp::returning(json!(null)).op())
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn simulated_failures_also_wait() {
    let start = Instant::now();
    let err = interceptor_with_latency(enabled_store(), LATENCY)
        .intercept_value(&OperationKey::query("checkout"), json!({}), RealOp::returning(json!(null)).op())
        .await
        .unwrap_err();
    assert!(err.is_simulated());
    assert!(start.elapsed() >= LATENCY);
}

#[tokio::test(start_paused = true)]
async fn in_flight_call_keeps_its_mode_snapshot() {
    let store = enabled_store();
    let interceptor = interceptor_with_latency(store.clone(), LATENCY);
    let real = RealOp::returning(json!("live"));

    let in_flight = {
        let interceptor = interceptor.clone();
        tokio::spawn(async move {
            let key = OperationKey::query("getUser");
            interceptor
                .intercept_value(&key, json!({}), RealOp::returning(json!("late live")).op())
                .await
        })
    };
    // Let the spawned call take its snapshot and start waiting.
    tokio::task::yield_now().await;

    store.set_enabled(false);
    let after_toggle = interceptor
        .intercept_value(&OperationKey::query("getUser"), json!({}), real.op())
        .await
        .unwrap();

    assert_eq!(after_toggle, json!("live"));
    assert_eq!(in_flight.await.unwrap().unwrap(), ann());
}

#[tokio::test]
async fn same_call_takes_same_path_while_mode_is_unchanged() {
    let (interceptor, records) = recording_interceptor(enabled_store());
    let hit = OperationKey::query("getUser");
    let miss = OperationKey::query("productById");

    for _ in 0..2 {
        interceptor
            .intercept_value(&hit, json!({}), RealOp::returning(json!(null)).op())
            .await
            .unwrap();
        interceptor
            .intercept_value(&miss, json!({"id": "1"}), RealOp::returning(json!(null)).op())
            .await
            .unwrap();
    }

    let sources: Vec<_> = records.lock().unwrap().iter().map(|r| r.source).collect();
    assert_eq!(
        sources,
        vec![
            ResolutionSource::Fixture,
            ResolutionSource::Real,
            ResolutionSource::Fixture,
            ResolutionSource::Real,
        ]
    );
}

#[tokio::test]
async fn concurrent_calls_are_independent() {
    let interceptor = interceptor(enabled_store());
    let real = RealOp::returning(json!("live"));

    let calls = (0..64).map(|i| {
        let interceptor = interceptor.clone();
        let op = real.op();
        async move {
            let (key, args) = match i % 3 {
                0 => ("getUser", json!({})),
                1 => ("productById", json!({"id": "42"})),
                _ => ("productById", json!({"id": i.to_string()})),
            };
            interceptor
                .intercept_value(&OperationKey::query(key), args, op)
                .await
                .map(|v| (i, v))
        }
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        let (i, value) = result.unwrap();
        let expected: Value = match i % 3 {
            0 => ann(),
            1 => lamp(),
            _ => json!("live"),
        };
        assert_eq!(value, expected, "call {i}");
    }
    assert_eq!(real.calls(), 21);
}

#[test]
fn registry_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Interceptor>();
    assert_send_sync::<ModeStore>();

    let registry = Arc::new(storefront_registry());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry
                    .resolve(&OperationKey::query("getUser"), &json!({}), None)
                    .unwrap()
                    .is_found()
            })
        })
        .collect();
    assert!(handles.into_iter().all(|h| h.join().unwrap()));
}

proptest! {
    #[test]
    fn prop_unknown_keys_run_real_operation_once_without_delay(
        name in "[a-z]{1,12}",
        enabled in any::<bool>(),
    ) {
        prop_assume!(!storefront_registry().contains(&OperationKey::query(name.clone()), None));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let store = if enabled { enabled_store() } else { disabled_store() };
        let interceptor = interceptor_with_latency(store, LATENCY);
        let real = RealOp::returning(json!({"live": true}));

        let (value, elapsed) = runtime.block_on(async {
            let start = Instant::now();
            let value = interceptor
                .intercept_value(&OperationKey::query(name), json!({}), real.op())
                .await
                .unwrap();
            (value, start.elapsed())
        });

        prop_assert_eq!(value, json!({"live": true}));
        prop_assert_eq!(real.calls(), 1);
        prop_assert_eq!(elapsed, Duration::ZERO);
    }
}
