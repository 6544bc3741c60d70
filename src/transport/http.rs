//! `reqwest`-backed transport. Requires the `http` feature.
//!
//! ## Example
//!
//! ```no_run
//! use sourced_streams::{Client, HttpTransport};
//!
//! let transport = HttpTransport::new("http://127.0.0.1:2113")
//!     .with_basic_auth("admin", "changeit")
//!     .with_header("X-Tenant", "acme");
//! let client = Client::new(transport);
//! ```

use async_trait::async_trait;
use tracing::debug;

use super::{Method, Request, Response, Transport};
use crate::error::Error;

pub const DEFAULT_HOST: &str = "http://127.0.0.1:2113";

/// Basic-auth credentials applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    /// The event store's out-of-the-box admin account.
    fn default() -> Self {
        Self::new("admin", "changeit")
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: String,
    credentials: Option<Credentials>,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

impl HttpTransport {
    /// Create a transport for `host`, e.g. `http://127.0.0.1:2113`.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            base: host.trim_end_matches('/').to_string(),
            credentials: None,
            headers: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with_credentials(Credentials::new(username, password))
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Use a preconfigured `reqwest::Client` (timeouts, TLS, proxies, ...).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn host(&self) -> &str {
        &self.base
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        let url = format!("{}{}", self.base, request.path);
        debug!(method = request.method.as_str(), %url, "sending request");

        let mut builder = self.client.request(to_reqwest(request.method), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        for (name, value) in self.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?
            .to_vec();

        debug!(%url, status, bytes = body.len(), "received response");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
