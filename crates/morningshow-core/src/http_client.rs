use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default per-request timeout; upstreams are expected to answer within seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// GET request issued by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Raw upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timed_out: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Transport used by every strategy.
pub trait HttpClient: Send + Sync {
    fn execute(&self, request: HttpRequest) -> ExecuteFuture<'_>;
}

/// Production HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("morningshow/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute(&self, request: HttpRequest) -> ExecuteFuture<'_> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("body read timeout: {e}"))
                } else {
                    HttpError::new(format!("failed to read response body: {e}"))
                }
            })?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Transport that fails every request; the digest then renders placeholders only.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineHttpClient;

impl HttpClient for OfflineHttpClient {
    fn execute(&self, request: HttpRequest) -> ExecuteFuture<'_> {
        Box::pin(async move { Err(HttpError::new(format!("offline: {}", request.url))) })
    }
}

/// Canned reply for a [`MockHttpClient`] route.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(HttpResponse),
    Fail(HttpError),
    /// Never answers before the request timeout elapses.
    Hang,
}

/// Deterministic offline transport keyed by URL prefix.
///
/// The first route whose prefix matches the request URL answers; unmatched URLs
/// get a 404. Every requested URL is recorded.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Vec<(String, MockReply)>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: impl Into<String>, reply: MockReply) -> Self {
        self.routes.push((prefix.into(), reply));
        self
    }

    pub fn json(self, prefix: impl Into<String>, body: impl Into<String>) -> Self {
        self.route(prefix, MockReply::Respond(HttpResponse::ok_json(body)))
    }

    pub fn status(self, prefix: impl Into<String>, status: u16) -> Self {
        self.route(
            prefix,
            MockReply::Respond(HttpResponse {
                status,
                body: String::new(),
            }),
        )
    }

    pub fn fail(self, prefix: impl Into<String>, error: HttpError) -> Self {
        self.route(prefix, MockReply::Fail(error))
    }

    pub fn hang(self, prefix: impl Into<String>) -> Self {
        self.route(prefix, MockReply::Hang)
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn hits(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }

    fn reply_for(&self, url: &str) -> MockReply {
        self.routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or(MockReply::Respond(HttpResponse {
                status: 404,
                body: String::new(),
            }))
    }
}

impl HttpClient for MockHttpClient {
    fn execute(&self, request: HttpRequest) -> ExecuteFuture<'_> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.url.clone());
        let reply = self.reply_for(&request.url);

        Box::pin(async move {
            match reply {
                MockReply::Respond(response) => Ok(response),
                MockReply::Fail(error) => Err(error),
                MockReply::Hang => {
                    tokio::time::sleep(request.timeout).await;
                    Err(HttpError::timeout(format!(
                        "no answer from {} within {:?}",
                        request.url, request.timeout
                    )))
                }
            }
        })
    }
}
