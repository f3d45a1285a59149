//! Route loaders
//!
//! A loader belongs to a route pattern such as `/products/:id` and receives
//! the matched path parameters plus the search parameters of the request.
//! The route pattern is the key; fixtures see
//! `{"params": {...}, "search": {...}}` as their arguments.

use crate::{dispatch, CallDescriptor};
use demokit_core::{DemoError, Interceptor, OperationKey};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;

const PLACEHOLDER_ORIGIN: &str = "http://loader.invalid";

/// Arguments of one loader invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoaderArgs {
    route: String,
    params: BTreeMap<String, String>,
    search: BTreeMap<String, String>,
}

impl LoaderArgs {
    /// Arguments for a route pattern, with nothing matched yet
    #[inline]
    #[must_use]
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    /// Set a path parameter
    #[inline]
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set a search parameter
    #[inline]
    #[must_use]
    pub fn search(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.search.insert(name.into(), value.into());
        self
    }

    /// Match a request target (`/products/42?tab=reviews`) against a route
    /// pattern
    ///
    /// Pattern segments starting with `:` capture one path segment; a final
    /// `*` captures the rest under the name `*`. Captured segments and search
    /// parameters are percent-decoded; literal segments are compared as
    /// written. Returns `None` when the path does not fit the pattern.
    #[must_use]
    pub fn match_target(route: &str, target: &str) -> Option<Self> {
        let url = Url::parse(PLACEHOLDER_ORIGIN).ok()?.join(target).ok()?;
        let mut args = Self::new(route);

        let mut path = url.path_segments()?.filter(|s| !s.is_empty());
        let mut pattern = route.split('/').filter(|s| !s.is_empty());
        loop {
            match (pattern.next(), path.next()) {
                (None, None) => break,
                (Some("*"), Some(first)) => {
                    let rest: Vec<String> = std::iter::once(first).chain(path.by_ref()).map(decode_segment).collect();
                    args.params.insert("*".to_owned(), rest.join("/"));
                    break;
                }
                (Some(p), Some(segment)) => {
                    if let Some(name) = p.strip_prefix(':') {
                        args.params.insert(name.to_owned(), decode_segment(segment));
                    } else if p != segment {
                        return None;
                    }
                }
                _ => return None,
            }
        }

        for (name, value) in url.query_pairs() {
            args.search.insert(name.into_owned(), value.into_owned());
        }
        Some(args)
    }

    /// Route pattern
    #[inline]
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Path parameter
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Search parameter
    #[must_use]
    pub fn get_search(&self, name: &str) -> Option<&str> {
        self.search.get(name).map(String::as_str)
    }
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn to_object(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<_, _>>(),
    )
}

impl CallDescriptor for LoaderArgs {
    fn operation_key(&self) -> OperationKey {
        OperationKey::query(&self.route)
    }

    fn operation_args(&self) -> Value {
        json!({
            "params": to_object(&self.params),
            "search": to_object(&self.search),
        })
    }
}

/// Route loader binding
#[derive(Debug, Clone)]
pub struct LoaderBinding {
    interceptor: Interceptor,
}

impl LoaderBinding {
    /// Bind to an interceptor
    #[inline]
    #[must_use]
    pub fn new(interceptor: Interceptor) -> Self {
        Self { interceptor }
    }

    /// Run a loader, from a fixture or through `loader`
    ///
    /// # Errors
    /// Whatever `loader` returns, or a fixture error.
    pub async fn load<T, E, F, Fut>(&self, args: LoaderArgs, loader: F) -> Result<T, E>
    where
        T: DeserializeOwned,
        E: From<DemoError>,
        F: FnOnce(LoaderArgs) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        dispatch(&self.interceptor, args, loader).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_params_and_search() {
        let args = LoaderArgs::match_target("/products/:id", "/products/42?tab=reviews&q=desk%20lamp").unwrap();
        assert_eq!(args.get_param("id"), Some("42"));
        assert_eq!(args.get_search("tab"), Some("reviews"));
        assert_eq!(args.get_search("q"), Some("desk lamp"));
        assert_eq!(
            args.operation_args(),
            json!({"params": {"id": "42"}, "search": {"q": "desk lamp", "tab": "reviews"}})
        );
        assert_eq!(args.operation_key(), OperationKey::query("/products/:id"));
    }

    #[test]
    fn literal_segments_must_match() {
        assert!(LoaderArgs::match_target("/products/:id", "/orders/42").is_none());
        assert!(LoaderArgs::match_target("/products/:id", "/products").is_none());
        assert!(LoaderArgs::match_target("/products/:id", "/products/42/extra").is_none());
    }

    #[test]
    fn splat_captures_rest() {
        let args = LoaderArgs::match_target("/docs/*", "/docs/guide/intro").unwrap();
        assert_eq!(args.get_param("*"), Some("guide/intro"));
    }

    #[test]
    fn captured_segments_are_decoded() {
        let args = LoaderArgs::match_target("/products/:id", "/products/a%20b").unwrap();
        assert_eq!(args.get_param("id"), Some("a b"));

        let args = LoaderArgs::match_target("/docs/*", "/docs/getting%20started/caf%C3%A9").unwrap();
        assert_eq!(args.get_param("*"), Some("getting started/café"));
    }

    #[test]
    fn root_route() {
        let args = LoaderArgs::match_target("/", "/").unwrap();
        assert_eq!(args.operation_args(), json!({"params": {}, "search": {}}));
    }
}
