//! Mode cookie wire format
//!
//! - absent: demo mode off
//! - `true`: on, no scenario
//! - anything else: on, with that scenario
//!
//! The same grammar is used by the persistent storage backends, so a value
//! can move between a cookie and a storage file unchanged.
//!
//! Turning demo mode off removes the mode cookie and sets a companion
//! opt-out marker (`<name>-off`). A request carrying neither has never chosen
//! a mode, which lets a server apply its own default to fresh clients only.

use crate::error::BridgeError;
use demokit_core::config::is_cookie_name;
use demokit_core::storage::{decode_value, encode_value};
use demokit_core::{ModeState, DEFAULT_COOKIE_NAME};

/// Named mode cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeCookie {
    name: String,
}

impl Default for ModeCookie {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_owned(),
        }
    }
}

impl ModeCookie {
    /// Cookie with a custom name
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidCookieName` when `name` is not a token.
    pub fn new(name: impl Into<String>) -> Result<Self, BridgeError> {
        let name = name.into();
        if !is_cookie_name(&name) {
            return Err(BridgeError::InvalidCookieName(name));
        }
        Ok(Self { name })
    }

    /// Cookie name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode a cookie value; `None` means the cookie is absent
    #[inline]
    #[must_use]
    pub fn decode(&self, value: Option<&str>) -> ModeState {
        decode_value(value)
    }

    /// Cookie value for a state; `None` means the cookie must be removed
    #[inline]
    #[must_use]
    pub fn encode(&self, state: &ModeState) -> Option<String> {
        encode_value(state)
    }

    /// `Set-Cookie` header value that makes the client hold `state`
    #[must_use]
    pub fn set_cookie(&self, state: &ModeState) -> String {
        match self.encode(state) {
            Some(value) => format!("{}={value}; Path=/; SameSite=Lax", self.name),
            None => format!("{}=; Path=/; Max-Age=0; SameSite=Lax", self.name),
        }
    }

    /// Name of the opt-out marker cookie
    #[must_use]
    pub fn opt_out_name(&self) -> String {
        format!("{}-off", self.name)
    }

    /// `Set-Cookie` values for `state`: the mode cookie, then the opt-out marker
    #[must_use]
    pub fn set_cookies(&self, state: &ModeState) -> [String; 2] {
        let marker = if state.is_enabled() {
            format!("{}=; Path=/; Max-Age=0; SameSite=Lax", self.opt_out_name())
        } else {
            format!("{}=1; Path=/; SameSite=Lax", self.opt_out_name())
        };
        [self.set_cookie(state), marker]
    }

    /// Whether a `Cookie` request header carries the opt-out marker
    #[must_use]
    pub fn opted_out(&self, header: &str) -> bool {
        let marker = self.opt_out_name();
        find_value(header, &marker).is_some_and(|value| !value.is_empty())
    }

    /// Value of this cookie in a `Cookie` request header
    #[must_use]
    pub fn find<'a>(&self, header: &'a str) -> Option<&'a str> {
        find_value(header, &self.name)
    }

    /// Mode carried by a `Cookie` request header
    #[must_use]
    pub fn read(&self, header: Option<&str>) -> ModeState {
        self.decode(header.and_then(|h| self.find(h)))
    }
}

fn find_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, value)| {
            let value = value.trim();
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use demokit_core::ScenarioName;
    use pretty_assertions::assert_eq;

    fn sale() -> ModeState {
        ModeState::with_scenario(ScenarioName::new("sale").unwrap())
    }

    #[test]
    fn wire_grammar() {
        let cookie = ModeCookie::default();
        assert_eq!(cookie.decode(None), ModeState::disabled());
        assert_eq!(cookie.decode(Some("true")), ModeState::enabled());
        assert_eq!(cookie.decode(Some("sale")), sale());
        assert_eq!(cookie.decode(Some("")), ModeState::enabled());

        assert_eq!(cookie.encode(&ModeState::disabled()), None);
        assert_eq!(cookie.encode(&ModeState::enabled()).as_deref(), Some("true"));
        assert_eq!(cookie.encode(&sale()).as_deref(), Some("sale"));
    }

    #[test]
    fn set_cookie_headers() {
        let cookie = ModeCookie::new("demo").unwrap();
        assert_eq!(cookie.set_cookie(&sale()), "demo=sale; Path=/; SameSite=Lax");
        assert_eq!(
            cookie.set_cookie(&ModeState::disabled()),
            "demo=; Path=/; Max-Age=0; SameSite=Lax"
        );
    }

    #[test]
    fn finds_cookie_among_others() {
        let cookie = ModeCookie::default();
        let header = "session=abc; demokit-mode=sale;theme=dark";
        assert_eq!(cookie.find(header), Some("sale"));
        assert_eq!(cookie.read(Some(header)), sale());
        assert_eq!(cookie.find("demokit-mode=\"true\""), Some("true"));
        assert_eq!(cookie.find("demokit-mode-old=sale"), None);
        assert_eq!(cookie.read(Some("session=abc")), ModeState::disabled());
        assert_eq!(cookie.read(None), ModeState::disabled());
    }

    #[test]
    fn opt_out_marker() {
        let cookie = ModeCookie::default();
        assert_eq!(
            cookie.set_cookies(&ModeState::disabled()),
            [
                "demokit-mode=; Path=/; Max-Age=0; SameSite=Lax".to_owned(),
                "demokit-mode-off=1; Path=/; SameSite=Lax".to_owned(),
            ]
        );
        assert_eq!(
            cookie.set_cookies(&sale())[1],
            "demokit-mode-off=; Path=/; Max-Age=0; SameSite=Lax"
        );
        assert!(cookie.opted_out("theme=dark; demokit-mode-off=1"));
        assert!(!cookie.opted_out("demokit-mode=true"));
        assert!(!cookie.opted_out("demokit-mode-off="));
        // The marker never reads as the mode cookie itself.
        assert_eq!(cookie.find("demokit-mode-off=1"), None);
    }

    #[test]
    fn rejects_bad_names() {
        assert!(ModeCookie::new("").is_err());
        assert!(ModeCookie::new("demo mode").is_err());
        assert!(ModeCookie::new("demo;mode").is_err());
    }
}
