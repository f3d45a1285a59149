//! Client-side hydration
//!
//! Client code must not guess the mode before it has read the cookie the
//! server rendered with. [`HydrationGate`] holds no store until
//! [`HydrationGate::hydrate`] runs, and reports [`ModeView::Placeholder`]
//! meanwhile so mode-dependent UI renders a neutral state.

use crate::cookie::ModeCookie;
use demokit_core::{ModeState, ModeStorage, ModeStore, NoStorage};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// What mode-dependent UI should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeView {
    /// Not hydrated yet; render a neutral placeholder
    Placeholder,
    /// Hydrated; render for this state
    Ready(ModeState),
}

impl ModeView {
    /// State, once hydrated
    #[must_use]
    pub fn state(&self) -> Option<&ModeState> {
        match self {
            Self::Placeholder => None,
            Self::Ready(state) => Some(state),
        }
    }
}

/// One-shot client hydration from the mode cookie
pub struct HydrationGate {
    cookie: ModeCookie,
    storage: Arc<dyn ModeStorage>,
    store: OnceLock<Arc<ModeStore>>,
}

impl fmt::Debug for HydrationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationGate")
            .field("cookie", &self.cookie.name())
            .field("hydrated", &self.is_hydrated())
            .finish_non_exhaustive()
    }
}

impl HydrationGate {
    /// Gate whose store does not persist client-side changes
    #[inline]
    #[must_use]
    pub fn new(cookie: ModeCookie) -> Self {
        Self::with_storage(cookie, Arc::new(NoStorage))
    }

    /// Gate whose store persists client-side changes to `storage`
    #[must_use]
    pub fn with_storage(cookie: ModeCookie, storage: Arc<dyn ModeStorage>) -> Self {
        Self {
            cookie,
            storage,
            store: OnceLock::new(),
        }
    }

    /// Seed the store from the document's `Cookie` header
    ///
    /// Only the first call has an effect; later calls return the store built
    /// by the first.
    pub fn hydrate(&self, cookie_header: Option<&str>) -> Arc<ModeStore> {
        let mut seeded = false;
        let store = self.store.get_or_init(|| {
            seeded = true;
            let initial = self.cookie.read(cookie_header);
            tracing::debug!(mode = %initial, "hydrated demo mode from cookie");
            ModeStore::builder()
                .storage(self.storage.clone())
                .initial(initial)
                .build()
        });
        if !seeded {
            tracing::debug!("demo mode already hydrated, ignoring cookie");
        }
        store.clone()
    }

    /// Whether [`HydrationGate::hydrate`] has run
    #[inline]
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Store, once hydrated
    #[inline]
    #[must_use]
    pub fn store(&self) -> Option<&Arc<ModeStore>> {
        self.store.get()
    }

    /// What mode-dependent UI should render now
    #[must_use]
    pub fn view(&self) -> ModeView {
        self.store
            .get()
            .map_or(ModeView::Placeholder, |store| ModeView::Ready(store.state()))
    }
}
