//! JSON HTTP client
//!
//! Plain `fetch`-style calls against a backend. Requests are keyed by method
//! and path (`GET /users/1`, query string excluded). Reads live in the query
//! namespace; writes (anything other than GET and HEAD) live in the mutation
//! namespace, under the same `METHOD /path` name unless a demo name is given.
//!
//! Fixtures see `{"query": {...}, "body": ...}` as their arguments.

use demokit_core::{DemoError, Interceptor, OperationKey};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

const PLACEHOLDER_ORIGIN: &str = "http://backend.invalid";

/// Errors from [`DemoHttpClient`]
#[derive(Debug, Error)]
pub enum HttpError {
    /// Demo-layer error: simulated failure, bad fixture, missing backend
    #[error(transparent)]
    Demo(#[from] DemoError),

    /// Transport-level failure talking to the backend
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Request target could not be parsed
    #[error("invalid request target: {0}")]
    InvalidTarget(String),
}

impl HttpError {
    /// Status code this error stands for, real or simulated
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Demo(err) => err.simulated_status(),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Status { status, .. } => Some(*status),
            Self::InvalidTarget(_) => None,
        }
    }

    /// True if the failure came from a fixture rather than a backend
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Demo(err) if err.is_simulated())
    }
}

/// Parsed request target
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    path: String,
    query: Map<String, Value>,
}

impl Target {
    fn parse(target: &str) -> Result<Self, HttpError> {
        let url = Url::parse(PLACEHOLDER_ORIGIN)
            .and_then(|origin| origin.join(target))
            .map_err(|err| HttpError::InvalidTarget(format!("{target}: {err}")))?;
        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        Ok(Self {
            path: url.path().to_owned(),
            query,
        })
    }
}

/// Operation key for a request
///
/// # Errors
/// Returns `HttpError::InvalidTarget` when `target` is not a path.
pub fn request_key(method: &Method, target: &str) -> Result<OperationKey, HttpError> {
    let name = format!("{method} {}", Target::parse(target)?.path);
    Ok(if is_read(method) {
        OperationKey::query(name)
    } else {
        OperationKey::mutation(name)
    })
}

/// Fixture arguments for a request: `{"query": {...}, "body": ...}`
///
/// # Errors
/// Returns `HttpError::InvalidTarget` when `target` is not a path.
pub fn request_args(target: &str, body: Option<Value>) -> Result<Value, HttpError> {
    let target = Target::parse(target)?;
    Ok(json!({
        "query": Value::Object(target.query),
        "body": body.unwrap_or(Value::Null),
    }))
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// HTTP client whose calls go through the interceptor
#[derive(Debug, Clone)]
pub struct DemoHttpClient {
    client: Client,
    base_url: Option<Url>,
    interceptor: Interceptor,
}

impl DemoHttpClient {
    /// Client without a backend; only fixtures can answer
    #[inline]
    #[must_use]
    pub fn new(interceptor: Interceptor) -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            interceptor,
        }
    }

    /// Set the backend base URL
    ///
    /// Request targets are resolved below the base path, so
    /// `http://api.local/v1` plus `/users` is `http://api.local/v1/users`.
    ///
    /// # Errors
    /// Returns `DemoError::Config` when `base_url` is not an absolute URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, HttpError> {
        let mut url =
            Url::parse(base_url).map_err(|err| DemoError::config(format!("invalid base url {base_url}: {err}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = Some(url);
        Ok(self)
    }

    /// Use a preconfigured reqwest client
    #[inline]
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Backend base URL
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// GET a JSON resource
    ///
    /// # Errors
    /// See [`DemoHttpClient::send`].
    pub async fn get<T: DeserializeOwned>(&self, target: &str) -> Result<T, HttpError> {
        self.send::<(), T>(Method::GET, target, None).await
    }

    /// POST a JSON body
    ///
    /// # Errors
    /// See [`DemoHttpClient::send`].
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, target: &str, body: &B) -> Result<T, HttpError> {
        self.send(Method::POST, target, Some(body)).await
    }

    /// Send a request keyed by `METHOD /path`
    ///
    /// # Errors
    /// - `HttpError::Demo` for simulated failures, undecodable fixtures, or a
    ///   pass-through with no backend configured
    /// - `HttpError::Transport` / `HttpError::Status` from the backend
    pub async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        target: &str,
        body: Option<&B>,
    ) -> Result<T, HttpError> {
        let key = request_key(&method, target)?;
        self.dispatch(key, method, target, body).await
    }

    /// Send a write keyed by an explicit demo name
    ///
    /// # Errors
    /// See [`DemoHttpClient::send`].
    pub async fn mutate<B: Serialize, T: DeserializeOwned>(
        &self,
        demo_name: &str,
        method: Method,
        target: &str,
        body: Option<&B>,
    ) -> Result<T, HttpError> {
        self.dispatch(OperationKey::mutation(demo_name), method, target, body)
            .await
    }

    async fn dispatch<B: Serialize, T: DeserializeOwned>(
        &self,
        key: OperationKey,
        method: Method,
        target: &str,
        body: Option<&B>,
    ) -> Result<T, HttpError> {
        let body = body.map(serde_json::to_value).transpose().map_err(|err| {
            HttpError::Demo(DemoError::config(format!("request body is not JSON: {err}")))
        })?;
        let args = request_args(target, body.clone())?;

        self.interceptor
            .intercept(&key, args, move |_args| self.fetch(method, target, body))
            .await
    }

    async fn fetch<T: DeserializeOwned>(&self, method: Method, target: &str, body: Option<Value>) -> Result<T, HttpError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| DemoError::config("no backend base url configured"))?;
        let url = base
            .join(target.trim_start_matches('/'))
            .map_err(|err| HttpError::InvalidTarget(format!("{target}: {err}")))?;

        let mut request = self.client.request(method, url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
