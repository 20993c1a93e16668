//! Outbound fetches to the origin.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode};
use url::Url;

use crate::config::GatewayConfig;
use crate::error::{RelayError, RelayResult};

/// A GET the gateway wants to issue
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub url: Url,
    /// Already filtered down to the request header allowlist
    pub headers: HeaderMap,
}

/// What the origin answered, with the body still streaming
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, RelayResult<Bytes>>,
}

impl OriginResponse {
    /// Response with a fully buffered body
    pub fn buffered(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            headers,
            body: futures::stream::once(async move { Ok(body) }).boxed(),
        }
    }
}

impl fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Something that can fetch an origin URL
///
/// Implementations must not follow redirects: a 3xx is handed back as is.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Issue one GET
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] when no response could be obtained.
    async fn fetch(&self, request: OriginRequest) -> RelayResult<OriginResponse>;
}

/// [`Relay`] over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
}

impl HttpRelay {
    /// Client with the configured timeouts, redirects disabled
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] when the TLS backend cannot be
    /// initialised.
    pub fn new(config: &GatewayConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.fetch_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("pixgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::from_reqwest(&e))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client; it must not follow redirects
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn fetch(&self, request: OriginRequest) -> RelayResult<OriginResponse> {
        let response = self
            .client
            .get(request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(&e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| RelayError::Forward(e.to_string()))
            .boxed();

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
