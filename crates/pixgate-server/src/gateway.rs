//! One proxied request, from token to relayed bytes.
//!
//! ```text
//! /i/<token> ─► method check ─► TokenCodec::decode ─► subject URL check
//!                                                          │
//!        client ◄── ResponseMediator ◄── origin GET ◄──────┘
//! ```
//!
//! Every step is terminal on failure. Error responses carry only a status
//! text or one of two fixed token messages.

use std::sync::Arc;

use futures::StreamExt;
use http::header::{ALLOW, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use pixgate_token::{MOUNT_PREFIX, TokenCodec, TokenError};
use tracing::{debug, error, warn};
use url::Url;

use crate::context::RequestContext;
use crate::error::{RelayError, SinkError};
use crate::headers::{REQUEST_HEADER_ALLOWLIST, SERVER_NAME, copy_allowed, emit_common_headers};
use crate::mediator::{ResponseMediator, write_error, write_error_message};
use crate::policy::ContentPolicy;
use crate::relay::{OriginRequest, Relay};
use crate::sink::ResponseSink;

const ALLOWED_METHODS: &str = "GET,HEAD,OPTIONS";

/// Answer OPTIONS and unsupported methods; `true` when a response was written
async fn reject_method(method: &Method, sink: &mut dyn ResponseSink) -> Result<bool, SinkError> {
    if method == Method::GET || method == Method::HEAD {
        return Ok(false);
    }
    sink.headers_mut()
        .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    if method == Method::OPTIONS {
        sink.write_head(StatusCode::NO_CONTENT).await?;
    } else {
        write_error(sink, StatusCode::METHOD_NOT_ALLOWED).await?;
    }
    Ok(true)
}

/// Status and optional fixed message for a token that failed to decode
fn token_rejection(err: &TokenError) -> (StatusCode, Option<&'static str>) {
    if err.is_malformed() {
        (StatusCode::NOT_FOUND, None)
    } else if err.is_not_yet_valid() {
        (StatusCode::NOT_FOUND, Some("URL not valid yet"))
    } else if err.is_expired() {
        (StatusCode::GONE, Some("URL expired"))
    } else {
        (StatusCode::BAD_REQUEST, None)
    }
}

/// Subject must be an absolute http(s) URL
fn origin_url(subject: &str) -> Option<Url> {
    Url::parse(subject)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// The relay gateway
///
/// Shared across requests; holds no per-request state.
pub struct Gateway {
    codec: TokenCodec,
    relay: Arc<dyn Relay>,
    policy: ContentPolicy,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("codec", &self.codec)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(codec: TokenCodec, relay: Arc<dyn Relay>, policy: ContentPolicy) -> Self {
        Self {
            codec,
            relay,
            policy,
        }
    }

    pub fn policy(&self) -> &ContentPolicy {
        &self.policy
    }

    /// Plain-text banner for `/`
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub async fn serve_home(&self, method: &Method, sink: &mut dyn ResponseSink) -> Result<(), SinkError> {
        emit_common_headers(sink.headers_mut());
        if reject_method(method, sink).await? {
            return Ok(());
        }
        sink.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        sink.write_head(StatusCode::OK).await?;
        sink.write_body(format!("Hello, this is {SERVER_NAME}!\n").into())
            .await?;
        Ok(())
    }

    /// Serve `/i/<token>`: validate the token and relay its subject
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the client side went away. Origin failures
    /// are answered with an error response, not returned.
    pub async fn serve_proxy(
        &self,
        ctx: &RequestContext,
        request: &Parts,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), SinkError> {
        emit_common_headers(sink.headers_mut());
        let Some(token) = request.uri.path().strip_prefix(MOUNT_PREFIX) else {
            return write_error(sink, StatusCode::NOT_FOUND).await;
        };
        if reject_method(&request.method, sink).await? {
            return Ok(());
        }
        if token.is_empty() {
            return write_error(sink, StatusCode::NOT_FOUND).await;
        }

        let subject = match self.codec.decode(token, ctx.received_at).await {
            Ok(subject) => subject,
            Err(err) => {
                let (status, message) = token_rejection(&err);
                debug!(error = %err, status = status.as_u16(), "token rejected");
                return match message {
                    Some(message) => write_error_message(sink, status, message).await,
                    None => write_error(sink, status).await,
                };
            }
        };

        let Some(url) = origin_url(&subject) else {
            warn!("token subject is not an http(s) URL");
            return write_error(sink, StatusCode::BAD_REQUEST).await;
        };

        let mut headers = HeaderMap::new();
        copy_allowed(&mut headers, &request.headers, &REQUEST_HEADER_ALLOWLIST);

        let head_only = request.method == Method::HEAD;
        self.relay_to(OriginRequest { url, headers }, head_only, sink)
            .await
    }

    async fn relay_to(
        &self,
        request: OriginRequest,
        head_only: bool,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), SinkError> {
        let mut mediator = ResponseMediator::new(sink, &self.policy);
        let host = request.url.host_str().unwrap_or_default().to_owned();

        let response = match self.relay.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, origin = %host, "origin fetch failed");
                return write_error(&mut mediator, err.status()).await;
            }
        };

        let status = response.status;
        match status {
            StatusCode::OK => {
                mediator.headers_mut().extend(response.headers);
                mediator.write_head(status).await?;
                if head_only {
                    debug!(origin = %host, "relayed head only");
                    return Ok(());
                }

                let mut body = response.body;
                let mut relayed = 0usize;
                while let Some(chunk) = body.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            error!(error = %err, origin = %host, relayed, "relay interrupted mid-stream");
                            mediator.abort().await;
                            return Ok(());
                        }
                    };
                    match mediator.write_body(chunk).await {
                        Ok(n) => relayed += n,
                        Err(err) => {
                            debug!(error = %err, origin = %host, relayed, "client went away mid-stream");
                            return Err(err);
                        }
                    }
                }
                debug!(origin = %host, relayed, discarded = mediator.is_discarding(), "relayed origin response");
                Ok(())
            }
            StatusCode::NOT_MODIFIED => {
                mediator.headers_mut().extend(response.headers);
                mediator.write_head(status).await?;
                debug!(origin = %host, "relayed not-modified");
                Ok(())
            }
            status if status.is_redirection() => {
                let err = RelayError::Redirect(status);
                warn!(error = %err, origin = %host, "refusing to follow origin redirect");
                write_error(&mut mediator, err.status()).await
            }
            status => {
                let err = RelayError::UnexpectedStatus(status);
                warn!(error = %err, origin = %host, "origin answered with unexpected status");
                write_error(&mut mediator, err.status()).await
            }
        }
    }
}
