//! Demo-mode reverse proxy
//!
//! Every request is keyed `METHOD /path` and decided by the interceptor
//! against the mode carried by the request cookie (or the server default):
//! - fixture hit: answered with the fixture JSON
//! - simulated failure: answered with its status (500 when it has none)
//! - miss or demo mode off: forwarded to the upstream backend
//!
//! Request bodies are buffered up to a configured cap; larger ones get 413.
//!
//! The control routes from `demokit-bridge` are mounted alongside.

use crate::error::ServerError;
use demokit_adapters::http::{request_args, request_key};
use demokit_bridge::{control_routes, reply_with_mode, ModeCookie, RequestMode};
use demokit_core::{DemoConfig, DemoError, Decision, FixtureRegistry, Interceptor, ModeStore, DEFAULT_MAX_BODY_BYTES};
use futures::{Stream, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use warp::http::{HeaderMap, Method, StatusCode};
use warp::hyper::body::{Body, Buf, Bytes};
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection};

/// Response header telling clients where an answer came from
pub const SOURCE_HEADER: &str = "x-demokit-source";

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// One incoming request, as the proxy sees it
#[derive(Debug)]
struct ProxyRequest {
    method: Method,
    path: FullPath,
    query: String,
    headers: HeaderMap,
    body: Bytes,
}

/// Why a request body was not read
#[derive(Debug)]
enum BodyError {
    TooLarge(usize),
    Read(warp::Error),
}

async fn read_body<S, B>(stream: S, limit: usize) -> Result<Bytes, BodyError>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let mut chunk = chunk.map_err(BodyError::Read)?;
        if body.len().saturating_add(chunk.remaining()) > limit {
            return Err(BodyError::TooLarge(limit));
        }
        while chunk.has_remaining() {
            let part = chunk.chunk();
            let len = part.len();
            body.extend_from_slice(part);
            chunk.advance(len);
        }
    }
    Ok(Bytes::from(body))
}

impl ProxyRequest {
    fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.as_str().to_owned()
        } else {
            format!("{}?{}", self.path.as_str(), self.query)
        }
    }

    fn json_body(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Demo server state shared by all requests
#[derive(Debug)]
pub struct DemoServer {
    store: Arc<ModeStore>,
    registry: Arc<FixtureRegistry>,
    latency: Duration,
    cookie: ModeCookie,
    upstream: Option<Url>,
    max_body: usize,
    client: reqwest::Client,
}

impl DemoServer {
    /// Server over a default mode store and a registry, with no upstream
    #[must_use]
    pub fn new(store: Arc<ModeStore>, registry: Arc<FixtureRegistry>) -> Self {
        Self {
            store,
            registry,
            latency: Duration::ZERO,
            cookie: ModeCookie::default(),
            upstream: None,
            max_body: body_limit(DEFAULT_MAX_BODY_BYTES),
            client: reqwest::Client::new(),
        }
    }

    /// Server as described by a configuration
    ///
    /// # Errors
    /// Returns `ServerError::Demo` when fixtures fail to load or a value is
    /// unusable.
    pub fn from_config(config: &DemoConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let registry = Arc::new(config.load_registry()?);
        let mut store = ModeStore::builder().storage(config.mode_storage());
        if let Some(mode) = &config.mode {
            store = store.initial(mode.clone());
        }
        let cookie = ModeCookie::new(config.cookie_name.clone()).map_err(|e| DemoError::config(e.to_string()))?;

        let server = Self::new(store.build(), registry)
            .with_cookie(cookie)
            .with_latency(config.latency())
            .with_max_body(body_limit(config.max_body_bytes));
        match &config.upstream {
            Some(upstream) => server.with_upstream(upstream),
            None => Ok(server),
        }
    }

    /// Cookie carrying the per-client mode
    #[inline]
    #[must_use]
    pub fn with_cookie(mut self, cookie: ModeCookie) -> Self {
        self.cookie = cookie;
        self
    }

    /// Artificial latency for fixture answers
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Largest request body accepted, in bytes
    #[inline]
    #[must_use]
    pub fn with_max_body(mut self, bytes: usize) -> Self {
        self.max_body = bytes;
        self
    }

    /// Backend that misses are forwarded to
    ///
    /// # Errors
    /// Returns `DemoError::Config` when `upstream` is not an absolute URL.
    pub fn with_upstream(mut self, upstream: &str) -> Result<Self, ServerError> {
        let mut url = Url::parse(upstream).map_err(|e| DemoError::config(format!("upstream {upstream:?}: {e}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.upstream = Some(url);
        Ok(self)
    }

    /// Default mode, used for clients that never chose one
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ModeStore> {
        &self.store
    }

    /// Fixtures served
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<FixtureRegistry> {
        &self.registry
    }

    fn mode(self: &Arc<Self>) -> impl Filter<Extract = (RequestMode,), Error = Rejection> + Clone {
        let server = Arc::clone(self);
        warp::header::optional::<String>("cookie").map(move |header: Option<String>| {
            let fallback = server.store.state();
            RequestMode::from_cookie_header(&server.cookie, header.as_deref(), Some(&fallback))
        })
    }

    /// Control routes plus the catch-all proxy
    pub fn routes(self: &Arc<Self>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        let query = warp::query::raw()
            .or(warp::any().map(String::new))
            .unify();
        let limit = self.max_body;
        let body = warp::body::stream().then(move |stream| read_body(stream, limit));
        let server = Arc::clone(self);
        let proxy = warp::method()
            .and(warp::path::full())
            .and(query)
            .and(warp::header::headers_cloned())
            .and(body)
            .and(self.mode())
            .then(
                move |method: Method,
                      path: FullPath,
                      query: String,
                      headers: HeaderMap,
                      body: Result<Bytes, BodyError>,
                      mode: RequestMode| {
                    let server = Arc::clone(&server);
                    async move {
                        let body = match body {
                            Ok(body) => body,
                            Err(BodyError::TooLarge(limit)) => {
                                tracing::warn!(path = path.as_str(), limit, "request body too large");
                                let response = error_reply(
                                    StatusCode::PAYLOAD_TOO_LARGE,
                                    &format!("request body exceeds {limit} bytes"),
                                );
                                return reply_with_mode(response, &mode);
                            }
                            Err(BodyError::Read(error)) => {
                                let response = error_reply(StatusCode::BAD_REQUEST, &error.to_string());
                                return reply_with_mode(response, &mode);
                            }
                        };
                        let request = ProxyRequest {
                            method,
                            path,
                            query,
                            headers,
                            body,
                        };
                        let response = server.answer(request, &mode).await;
                        reply_with_mode(response, &mode)
                    }
                },
            );

        control_routes(self.mode()).or(proxy).unify()
    }

    /// Listen on `addr` until `shutdown` resolves
    ///
    /// # Errors
    /// Returns `ServerError::Bind` when the address cannot be bound.
    pub async fn serve<S>(self: Arc<Self>, addr: SocketAddr, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let routes = self.routes().with(warp::trace::request());
        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(
            addr = %bound,
            upstream = self.upstream.as_ref().map(Url::as_str),
            fixtures = self.registry.len(),
            mode = %self.store.state(),
            "demo server listening"
        );
        server.await;
        tracing::info!("demo server stopped");
        Ok(())
    }

    async fn answer(&self, request: ProxyRequest, mode: &RequestMode) -> Response {
        let target = request.target();
        let Ok(method) = reqwest::Method::from_bytes(request.method.as_str().as_bytes()) else {
            return error_reply(StatusCode::BAD_REQUEST, "unsupported method");
        };
        let (key, args) = match request_key(&method, &target)
            .and_then(|key| Ok((key, request_args(&target, request.json_body())?)))
        {
            Ok(pair) => pair,
            Err(err) => return error_reply(StatusCode::BAD_REQUEST, &err.to_string()),
        };

        let interceptor = Interceptor::builder(Arc::clone(mode.store()), Arc::clone(&self.registry))
            .latency(self.latency)
            .build();
        match interceptor.decide(&key, &args).await {
            Ok(Decision::Fixture(value)) => fixture_reply(&value),
            Ok(Decision::PassThrough) => self.forward(method, &target, &request.headers, request.body).await,
            Err(DemoError::FixtureRejected { failure, .. }) => {
                let status = failure
                    .status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let mut response = error_reply(status, &failure.message);
                response
                    .headers_mut()
                    .insert(SOURCE_HEADER, HeaderValue::from_static("fixture"));
                response
            }
            Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        }
    }

    async fn forward(&self, method: reqwest::Method, target: &str, headers: &HeaderMap, body: Bytes) -> Response {
        let Some(upstream) = &self.upstream else {
            return error_reply(StatusCode::BAD_GATEWAY, "no upstream configured");
        };
        let url = match upstream.join(target.trim_start_matches('/')) {
            Ok(url) => url,
            Err(err) => return error_reply(StatusCode::BAD_REQUEST, &format!("{target}: {err}")),
        };

        let mut request = self.client.request(method, url).body(body);
        for (name, value) in headers {
            if !is_hop_by_hop(name.as_str()) {
                request = request.header(name.as_str(), value.as_bytes());
            }
        }

        let upstream_response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, target, "upstream request failed");
                return error_reply(StatusCode::BAD_GATEWAY, &format!("upstream request failed: {error}"));
            }
        };
        relay(upstream_response).await
    }
}

async fn relay(upstream: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers: Vec<(String, Vec<u8>)> = upstream
        .headers()
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .map(|(name, value)| (name.as_str().to_owned(), value.as_bytes().to_vec()))
        .collect();
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(error) => {
            tracing::warn!(%error, "upstream body could not be read");
            return error_reply(StatusCode::BAD_GATEWAY, "upstream body could not be read");
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_bytes(&value)) {
            response.headers_mut().append(name, value);
        }
    }
    response
        .headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static("upstream"));
    response
}

fn body_limit(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

fn fixture_reply(value: &Value) -> Response {
    let mut response = json_reply(StatusCode::OK, value);
    response
        .headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static("fixture"));
    response
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    json_reply(status, &json!({ "error": message }))
}

fn json_reply(status: StatusCode, value: &Value) -> Response {
    let mut response = Response::new(Body::from(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
