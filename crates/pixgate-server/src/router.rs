//! HTTP surface of the gateway.
//!
//! | Path          | Handler                    |
//! |---------------|----------------------------|
//! | `/`           | [`Gateway::serve_home`]    |
//! | `/i/`         | 404 through the gateway    |
//! | `/i/{token}`  | [`Gateway::serve_proxy`]   |
//! | anything else | 404                        |
//!
//! Non-canonical paths never reach a handler: they are answered with a
//! `308 Permanent Redirect` to the cleaned path, query preserved.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::any;
use http::StatusCode;
use pixgate_token::MOUNT_PREFIX;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, info_span, warn};

use crate::context::RequestContext;
use crate::gateway::Gateway;
use crate::headers::emit_common_headers;
use crate::mediator::write_error;
use crate::sink::{ChannelSink, RecordedResponse};

/// Lexically clean a request path
///
/// Duplicate slashes, `.` and `..` segments and trailing slashes are removed,
/// and the result always starts with `/`. The bare mount point (`/i`) maps to
/// the mount prefix (`/i/`).
pub fn canonical_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut clean = String::with_capacity(path.len() + 1);
    for segment in &segments {
        clean.push('/');
        clean.push_str(segment);
    }
    if clean.is_empty() || clean == MOUNT_PREFIX.trim_end_matches('/') {
        clean.push('/');
    }
    clean
}

async fn redirect_to_canonical(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let clean = canonical_path(path);
    if clean == path {
        return next.run(request).await;
    }

    let location = match request.uri().query() {
        Some(query) => format!("{clean}?{query}"),
        None => clean,
    };
    debug!(from = %request.uri(), to = %location, "redirecting to canonical path");
    Redirect::permanent(&location).into_response()
}

async fn home(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    let mut out = RecordedResponse::new();
    if let Err(err) = gateway.serve_home(request.method(), &mut out).await {
        debug!(error = %err, "home page not delivered");
    }
    out.into_response()
}

async fn proxy(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let ctx = RequestContext::new();
    let span = info_span!("relay", request_id = %ctx.request_id, method = %parts.method);

    let (mut sink, head) = ChannelSink::new();
    tokio::spawn(
        async move {
            if let Err(err) = gateway.serve_proxy(&ctx, &parts, &mut sink).await {
                debug!(error = %err, "client went away");
            }
        }
        .instrument(span),
    );

    match head.await {
        Ok(response) => response,
        Err(_) => {
            warn!("relay task ended without a response");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR).await
        }
    }
}

/// Error response carrying the security headers
async fn plain_error(status: StatusCode) -> Response {
    let mut out = RecordedResponse::new();
    emit_common_headers(&mut out.headers);
    // a RecordedResponse never fails
    let _ = write_error(&mut out, status).await;
    out.into_response()
}

async fn not_found() -> Response {
    plain_error(StatusCode::NOT_FOUND).await
}

/// Router serving the gateway, with canonical-path redirects and request tracing
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", any(home))
        .route(MOUNT_PREFIX, any(proxy))
        .route("/i/{token}", any(proxy))
        .fallback(not_found)
        .layer(middleware::from_fn(redirect_to_canonical))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}
