//! Cookie-backed mode storage

use crate::cookie::ModeCookie;
use demokit_core::{ModeState, ModeStorage, StorageError};
use parking_lot::Mutex;

/// Storage reading the request cookie and recording the response cookie
///
/// Loading decodes the cookie the request carried; the opt-out marker alone
/// loads as disabled. Saving does not write anywhere; it records the
/// `Set-Cookie` values the response must carry.
#[derive(Debug)]
pub struct CookieStorage {
    cookie: ModeCookie,
    incoming: Option<String>,
    opted_out: bool,
    pending: Mutex<Vec<String>>,
}

impl CookieStorage {
    /// Storage for one request, from its `Cookie` header
    #[must_use]
    pub fn from_request(cookie: ModeCookie, header: Option<&str>) -> Self {
        let incoming = header.and_then(|h| cookie.find(h)).map(str::to_owned);
        let opted_out = header.is_some_and(|h| cookie.opted_out(h));
        Self {
            cookie,
            incoming,
            opted_out,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Whether the request carried the mode cookie
    #[inline]
    #[must_use]
    pub fn has_incoming(&self) -> bool {
        self.incoming.is_some()
    }

    /// Whether the request states a mode: the mode cookie or the opt-out marker
    #[inline]
    #[must_use]
    pub fn has_choice(&self) -> bool {
        self.incoming.is_some() || self.opted_out
    }

    /// `Set-Cookie` values recorded by the last save; empty when nothing changed
    #[must_use]
    pub fn pending_set_cookies(&self) -> Vec<String> {
        self.pending.lock().clone()
    }

    /// Cookie this storage reads and writes
    #[inline]
    #[must_use]
    pub fn cookie(&self) -> &ModeCookie {
        &self.cookie
    }
}

impl ModeStorage for CookieStorage {
    fn load(&self) -> Result<Option<ModeState>, StorageError> {
        Ok(match self.incoming.as_deref() {
            Some(value) => Some(self.cookie.decode(Some(value))),
            None if self.opted_out => Some(ModeState::disabled()),
            None => None,
        })
    }

    fn save(&self, state: &ModeState) -> Result<(), StorageError> {
        *self.pending.lock() = self.cookie.set_cookies(state).into();
        Ok(())
    }
}
