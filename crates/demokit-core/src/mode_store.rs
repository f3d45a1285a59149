//! Mode store: single source of truth for demo mode
//!
//! One store is built per process or session and shared by reference with
//! every adapter. Mutations happen only through explicit user actions; the
//! interceptor only ever reads.

use crate::storage::{ModeStorage, NoStorage};
use crate::types::{ModeState, ScenarioName};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn(&ModeState) + Send + Sync>;

/// Shared demo mode state with change notification
pub struct ModeStore {
    state: RwLock<ModeState>,
    // Held across a state change and its save so storage sees writes in memory order.
    commit: Mutex<()>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: Mutex<u64>,
    storage: Arc<dyn ModeStorage>,
}

impl fmt::Debug for ModeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeStore")
            .field("state", &*self.state.read())
            .field("listener_count", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl ModeStore {
    /// Start building a store
    #[inline]
    #[must_use]
    pub fn builder() -> ModeStoreBuilder {
        ModeStoreBuilder::default()
    }

    /// In-memory store starting from `state`
    #[must_use]
    pub fn with_state(state: ModeState) -> Arc<Self> {
        Self::builder().initial(state).build()
    }

    /// Current state snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> ModeState {
        self.state.read().clone()
    }

    /// Turn demo mode on or off
    ///
    /// Disabling also clears the active scenario. The new state is persisted
    /// (failures are logged and ignored) and every listener is notified.
    pub fn set_enabled(&self, enabled: bool) {
        let next = {
            let _commit = self.commit.lock();
            let next = {
                let mut state = self.state.write();
                let next = match (enabled, state.scenario()) {
                    (false, _) => ModeState::disabled(),
                    (true, Some(name)) => ModeState::with_scenario(name.clone()),
                    (true, None) => ModeState::enabled(),
                };
                *state = next.clone();
                next
            };
            self.persist(&next);
            next
        };
        tracing::info!(mode = %next, "demo mode changed");
        self.notify(&next);
    }

    /// Switch the active scenario
    ///
    /// Has no effect while demo mode is disabled: nothing is stored and no
    /// listener is called. Call [`ModeStore::set_enabled`] first.
    pub fn set_scenario(&self, scenario: Option<ScenarioName>) {
        let next = {
            let _commit = self.commit.lock();
            let next = {
                let mut state = self.state.write();
                if !state.is_enabled() {
                    tracing::debug!(
                        scenario = scenario.as_ref().map(ScenarioName::as_str),
                        "ignoring scenario change while demo mode is disabled"
                    );
                    return;
                }
                *state = scenario.map_or_else(ModeState::enabled, ModeState::with_scenario);
                state.clone()
            };
            self.persist(&next);
            next
        };
        tracing::info!(mode = %next, "demo scenario changed");
        self.notify(&next);
    }

    /// Register a listener called after every change
    ///
    /// The listener runs synchronously on the thread that made the change,
    /// after the state has been updated. Dropping the returned
    /// [`Subscription`] removes it.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&ModeState) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.next_listener.lock();
            *next += 1;
            *next
        };
        self.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    /// Number of registered listeners
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn persist(&self, next: &ModeState) {
        if let Err(e) = self.storage.save(next) {
            tracing::warn!(error = %e, "failed to persist demo mode, keeping in-memory state");
        }
    }

    fn notify(&self, next: &ModeState) {
        // Snapshot so listeners may subscribe, unsubscribe or mutate the store.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(next);
        }
    }

    fn remove_listener(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }
}

/// Disposer for a mode listener
#[derive(Debug)]
pub struct Subscription {
    store: Weak<ModeStore>,
    id: u64,
}

impl Subscription {
    /// Remove the listener now
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.remove_listener(self.id);
        }
    }
}

/// Builder for [`ModeStore`]
#[derive(Default)]
pub struct ModeStoreBuilder {
    storage: Option<Arc<dyn ModeStorage>>,
    initial: Option<ModeState>,
}

impl fmt::Debug for ModeStoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeStoreBuilder")
            .field("has_storage", &self.storage.is_some())
            .field("initial", &self.initial)
            .finish()
    }
}

impl ModeStoreBuilder {
    /// Persist through `storage`
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn ModeStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Explicit initial state; wins over anything persisted
    #[must_use]
    pub fn initial(mut self, state: ModeState) -> Self {
        self.initial = Some(state);
        self
    }

    /// Build the store
    ///
    /// Initial state: explicit override, else persisted value, else disabled.
    #[must_use]
    pub fn build(self) -> Arc<ModeStore> {
        let storage = self.storage.unwrap_or_else(|| Arc::new(NoStorage));
        let state = match self.initial {
            Some(state) => state,
            None => match storage.load() {
                Ok(persisted) => persisted.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load demo mode, starting disabled");
                    ModeState::disabled()
                }
            },
        };
        Arc::new(ModeStore {
            state: RwLock::new(state),
            commit: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            next_listener: Mutex::new(0),
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn scenario(name: &str) -> ScenarioName {
        ScenarioName::new(name).unwrap()
    }

    #[test]
    fn default_state_is_disabled() {
        let store = ModeStore::builder().build();
        assert_eq!(store.state(), ModeState::disabled());
    }

    #[test]
    fn initial_resolution_order() {
        let storage = Arc::new(MemoryStorage::with_value("sale"));

        let from_storage = ModeStore::builder().storage(storage.clone()).build();
        assert_eq!(from_storage.state(), ModeState::with_scenario(scenario("sale")));

        let overridden = ModeStore::builder()
            .storage(storage)
            .initial(ModeState::disabled())
            .build();
        assert_eq!(overridden.state(), ModeState::disabled());
    }

    #[test]
    fn enable_then_scenario_then_disable() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ModeStore::builder().storage(storage.clone()).build();

        store.set_enabled(true);
        store.set_scenario(Some(scenario("empty-cart")));
        assert_eq!(store.state(), ModeState::with_scenario(scenario("empty-cart")));
        assert_eq!(storage.raw().as_deref(), Some("empty-cart"));

        // Re-enabling keeps the scenario
        store.set_enabled(true);
        assert_eq!(store.state().scenario(), Some(&scenario("empty-cart")));

        store.set_enabled(false);
        assert_eq!(store.state(), ModeState::disabled());
        assert_eq!(storage.raw(), None);
    }

    #[test]
    fn scenario_ignored_while_disabled() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ModeStore::builder().storage(storage.clone()).build();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_scenario(Some(scenario("sale")));

        assert_eq!(store.state(), ModeState::disabled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn listeners_receive_new_state() {
        let store = ModeStore::builder().build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe(move |state| sink.lock().push(state.clone()));

        store.set_enabled(true);
        store.set_scenario(Some(scenario("sale")));
        store.set_scenario(None);

        assert_eq!(
            *seen.lock(),
            vec![
                ModeState::enabled(),
                ModeState::with_scenario(scenario("sale")),
                ModeState::enabled(),
            ]
        );
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = ModeStore::builder().build();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.listener_count(), 1);

        store.set_enabled(true);
        sub.unsubscribe();
        store.set_enabled(false);

        assert_eq!(store.listener_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_reenter_store() {
        let store = ModeStore::builder().build();
        let inner = Arc::downgrade(&store);
        let _sub = store.subscribe(move |state| {
            if let Some(store) = inner.upgrade() {
                // Reading inside a listener must not deadlock.
                assert_eq!(store.state(), *state);
            }
        });
        store.set_enabled(true);
    }

    /// Storage whose first save blocks until released
    struct GatedStorage {
        inner: MemoryStorage,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl ModeStorage for GatedStorage {
        fn load(&self) -> Result<Option<ModeState>, crate::error::StorageError> {
            self.inner.load()
        }

        fn save(&self, state: &ModeState) -> Result<(), crate::error::StorageError> {
            if let Some(entered) = self.entered.lock().take() {
                entered.send(()).unwrap();
                let release = self.release.lock().take();
                if let Some(release) = release {
                    release.recv().unwrap();
                }
            }
            self.inner.save(state)
        }
    }

    #[test]
    fn concurrent_writers_persist_in_memory_order() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let storage = Arc::new(GatedStorage {
            inner: MemoryStorage::new(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let store = ModeStore::builder()
            .storage(storage.clone())
            .initial(ModeState::enabled())
            .build();

        let first = {
            let store = store.clone();
            thread::spawn(move || store.set_scenario(Some(scenario("a"))))
        };
        entered_rx.recv().unwrap();
        let second = {
            let store = store.clone();
            thread::spawn(move || store.set_scenario(Some(scenario("b"))))
        };
        // Give the second writer time to reach the store while the first save is stuck.
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();
        first.join().unwrap();
        second.join().unwrap();

        assert_eq!(store.state(), ModeState::with_scenario(scenario("b")));
        assert_eq!(storage.inner.raw().as_deref(), Some("b"));
    }

    #[test]
    fn storage_failure_keeps_memory_state() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_fail_writes(true);
        let store = ModeStore::builder().storage(storage.clone()).build();

        store.set_enabled(true);

        assert!(store.state().is_enabled());
        assert_eq!(storage.raw(), None);
    }
}
