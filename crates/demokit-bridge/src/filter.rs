//! Per-request mode for warp services
//!
//! [`with_mode`] seeds a fresh [`ModeStore`] from the request cookie, so
//! server-side handlers see exactly what the client holds. Handlers that
//! change the mode pass their reply through [`reply_with_mode`] to send the
//! new cookie back.

use crate::cookie::ModeCookie;
use crate::storage::CookieStorage;
use demokit_core::{ModeState, ModeStore};
use std::sync::Arc;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Mode of one request
#[derive(Debug, Clone)]
pub struct RequestMode {
    store: Arc<ModeStore>,
    storage: Arc<CookieStorage>,
}

impl RequestMode {
    /// Mode from a `Cookie` header
    ///
    /// `fallback` applies only when the request states no mode: neither the
    /// mode cookie nor the opt-out marker.
    #[must_use]
    pub fn from_cookie_header(cookie: &ModeCookie, header: Option<&str>, fallback: Option<&ModeState>) -> Self {
        let storage = Arc::new(CookieStorage::from_request(cookie.clone(), header));
        let mut builder = ModeStore::builder().storage(storage.clone());
        if !storage.has_choice() {
            if let Some(fallback) = fallback {
                builder = builder.initial(fallback.clone());
            }
        }
        Self {
            store: builder.build(),
            storage,
        }
    }

    /// Store for this request
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ModeStore> {
        &self.store
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ModeState {
        self.store.state()
    }

    /// `Set-Cookie` values if this request changed the mode
    #[must_use]
    pub fn pending_set_cookies(&self) -> Vec<String> {
        self.storage.pending_set_cookies()
    }
}

/// Extract the request's mode from its cookie
pub fn with_mode(cookie: ModeCookie) -> impl Filter<Extract = (RequestMode,), Error = Rejection> + Clone {
    with_mode_or(cookie, None)
}

/// Like [`with_mode`], with a state for requests that never chose a mode
pub fn with_mode_or(
    cookie: ModeCookie,
    fallback: Option<ModeState>,
) -> impl Filter<Extract = (RequestMode,), Error = Rejection> + Clone {
    let cookie = Arc::new(cookie);
    let fallback = Arc::new(fallback);
    warp::header::optional::<String>("cookie").map(move |header: Option<String>| {
        RequestMode::from_cookie_header(&cookie, header.as_deref(), (*fallback).as_ref())
    })
}

/// Attach the mode cookies to a reply if the request changed the mode
pub fn reply_with_mode(reply: impl Reply, mode: &RequestMode) -> Response {
    let mut response = reply.into_response();
    for value in mode.pending_set_cookies() {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(error) => tracing::warn!(%error, "mode cookie is not a valid header value"),
        }
    }
    response
}
