//! Response mediation between the origin and the client.
//!
//! [`ResponseMediator`] sits in front of a [`ResponseSink`] and decides, at
//! the moment the head is committed, what the client actually receives:
//!
//! 1. security headers are stamped on the real sink
//! 2. allow-listed staged headers are copied over
//! 3. the content type is checked against the [`ContentPolicy`]
//! 4. the status is written exactly once
//!
//! A disallowed payload is replaced by `502 Bad Gateway`. Its body is then
//! swallowed: writes report the bytes as consumed but nothing reaches the
//! client.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::warn;

use crate::error::SinkError;
use crate::headers::{RESPONSE_HEADER_ALLOWLIST, copy_allowed, emit_common_headers};
use crate::policy::{ContentPolicy, parse_media_type};
use crate::sink::ResponseSink;

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Write a plain-text error response (`<status text>\n`) into `sink`
///
/// Framing headers left over from a relayed response are dropped so they
/// cannot describe the error body.
///
/// # Errors
///
/// Propagates sink failures.
pub async fn write_error(sink: &mut dyn ResponseSink, status: StatusCode) -> Result<(), SinkError> {
    let reason = status.canonical_reason().unwrap_or_default();
    write_error_message(sink, status, reason).await
}

/// Write a plain-text error response with a fixed message
///
/// # Errors
///
/// Propagates sink failures.
pub async fn write_error_message(
    sink: &mut dyn ResponseSink,
    status: StatusCode,
    message: &str,
) -> Result<(), SinkError> {
    let headers = sink.headers_mut();
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_ENCODING);
    headers.remove(TRANSFER_ENCODING);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    sink.write_head(status).await?;
    sink.write_body(Bytes::from(format!("{message}\n"))).await?;
    Ok(())
}

/// Per-response gatekeeper around a [`ResponseSink`]
///
/// Headers set through [`ResponseSink::headers_mut`] are staged and only the
/// allow-listed ones survive the commit. [`ResponseMediator::raw_headers_mut`]
/// reaches the underlying sink directly; values set there are kept unless the
/// security headers or staged allow-listed headers overwrite them.
pub struct ResponseMediator<'a> {
    sink: &'a mut dyn ResponseSink,
    policy: &'a ContentPolicy,
    staged: HeaderMap,
    committed: bool,
    discard: bool,
}

impl<'a> ResponseMediator<'a> {
    pub fn new(sink: &'a mut dyn ResponseSink, policy: &'a ContentPolicy) -> Self {
        Self {
            sink,
            policy,
            staged: HeaderMap::new(),
            committed: false,
            discard: false,
        }
    }

    /// Headers of the underlying sink, bypassing the staging area
    pub fn raw_headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Whether body writes are being swallowed
    pub fn is_discarding(&self) -> bool {
        self.discard
    }

    async fn commit(&mut self, status: StatusCode) -> Result<(), SinkError> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;

        let dest = self.sink.headers_mut();
        emit_common_headers(dest);
        copy_allowed(dest, &self.staged, &RESPONSE_HEADER_ALLOWLIST);

        let content_type = dest
            .get(CONTENT_TYPE)
            .map(|value| value.to_str().unwrap_or("\u{fffd}"))
            .unwrap_or_default()
            .to_owned();
        let media_type = parse_media_type(&content_type);

        if status == StatusCode::NOT_MODIFIED {
            // 304 never carries a body.
            self.discard = true;
        }

        let allowed = media_type
            .as_deref()
            .is_some_and(|media_type| self.policy.is_allowed(media_type));
        if !allowed {
            let plain_error = media_type.as_deref() == Some("text/plain") && status.as_u16() >= 400;
            let bare_not_modified = content_type.is_empty() && status == StatusCode::NOT_MODIFIED;

            if bare_not_modified {
                dest.remove(CONTENT_LENGTH);
            } else if !plain_error {
                warn!(content_type = %content_type, status = status.as_u16(), "refusing origin content type");
                self.discard = true;
                dest.remove(CONTENT_LENGTH);
                return write_error(&mut *self.sink, StatusCode::BAD_GATEWAY).await;
            }
        }

        self.sink.write_head(status).await
    }
}

#[async_trait]
impl ResponseSink for ResponseMediator<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.staged
    }

    async fn write_head(&mut self, status: StatusCode) -> Result<(), SinkError> {
        self.commit(status).await
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<usize, SinkError> {
        self.commit(StatusCode::OK).await?;
        if self.discard {
            return Ok(chunk.len());
        }
        self.sink.write_body(chunk).await
    }

    async fn abort(&mut self) {
        self.sink.abort().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordedResponse;
    use http::header::{CONTENT_DISPOSITION, SERVER, X_FRAME_OPTIONS};
    use pretty_assertions::assert_eq;

    struct Case {
        status_in: StatusCode,
        status_out: StatusCode,
        type_in: &'static str,
        type_out: Option<&'static str>,
        text_in: &'static str,
        text_out: &'static str,
    }

    async fn mediate(policy: &ContentPolicy, case: &Case) -> RecordedResponse {
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, policy);
            let staged = mediator.headers_mut();
            staged.insert(CONTENT_TYPE, HeaderValue::from_static(case.type_in));
            staged.insert(CONTENT_LENGTH, HeaderValue::from(case.text_in.len()));
            mediator.write_head(case.status_in).await.unwrap();
            let written = mediator
                .write_body(Bytes::from_static(case.text_in.as_bytes()))
                .await
                .unwrap();
            assert_eq!(written, case.text_in.len());
        }
        out
    }

    #[tokio::test]
    async fn commit_applies_content_policy() {
        let policy = ContentPolicy::new().with_content_types(["image/jpeg"]);
        let cases = [
            Case {
                status_in: StatusCode::OK,
                status_out: StatusCode::OK,
                type_in: "image/jpeg",
                type_out: Some("image/jpeg"),
                text_in: "response",
                text_out: "response",
            },
            Case {
                status_in: StatusCode::OK,
                status_out: StatusCode::BAD_GATEWAY,
                type_in: "text/html",
                type_out: Some(TEXT_PLAIN_UTF8),
                text_in: "response",
                text_out: "Bad Gateway\n",
            },
            Case {
                status_in: StatusCode::BAD_REQUEST,
                status_out: StatusCode::BAD_REQUEST,
                type_in: "text/plain; charset=US-ASCII",
                type_out: Some("text/plain; charset=US-ASCII"),
                text_in: "error message",
                text_out: "error message",
            },
            Case {
                status_in: StatusCode::BAD_REQUEST,
                status_out: StatusCode::BAD_GATEWAY,
                type_in: "text/html",
                type_out: Some(TEXT_PLAIN_UTF8),
                text_in: "HTML error",
                text_out: "Bad Gateway\n",
            },
            Case {
                status_in: StatusCode::NOT_MODIFIED,
                status_out: StatusCode::NOT_MODIFIED,
                type_in: "",
                type_out: Some(""),
                text_in: "",
                text_out: "",
            },
            Case {
                status_in: StatusCode::NOT_MODIFIED,
                status_out: StatusCode::NOT_MODIFIED,
                type_in: "image/jpeg",
                type_out: Some("image/jpeg"),
                text_in: "",
                text_out: "",
            },
            Case {
                status_in: StatusCode::NOT_MODIFIED,
                status_out: StatusCode::BAD_GATEWAY,
                type_in: "text/html",
                type_out: Some(TEXT_PLAIN_UTF8),
                text_in: "",
                text_out: "Bad Gateway\n",
            },
            Case {
                status_in: StatusCode::OK,
                status_out: StatusCode::BAD_GATEWAY,
                type_in: "image/jpeg; broken",
                type_out: Some(TEXT_PLAIN_UTF8),
                text_in: "response",
                text_out: "Bad Gateway\n",
            },
        ];

        for case in &cases {
            let out = mediate(&policy, case).await;
            let label = format!("{} {:?}", case.status_in, case.type_in);

            assert_eq!(out.status(), case.status_out, "{label}");
            assert_eq!(
                out.headers.get(CONTENT_TYPE).map(|v| v.to_str().unwrap()),
                case.type_out,
                "{label}"
            );
            assert_eq!(out.body_str(), case.text_out, "{label}");

            let length = out.headers.get(CONTENT_LENGTH);
            if case.status_out == StatusCode::NOT_MODIFIED {
                assert!(
                    length.is_none_or(|l| l == "0"),
                    "{label}: Content-Length must be removed"
                );
            } else if case.text_in == case.text_out {
                assert!(length.is_some(), "{label}: Content-Length must be retained");
            } else {
                assert!(length.is_none(), "{label}: Content-Length must be removed");
            }
            assert_eq!(out.headers[X_CONTENT_TYPE_OPTIONS], "nosniff", "{label}");
        }
    }

    #[tokio::test]
    async fn staged_headers_outside_allowlist_are_dropped() {
        let policy = ContentPolicy::new().with_content_types(["image/jpeg"]);
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, &policy);
            let staged = mediator.headers_mut();
            staged.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
            staged.insert(CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
            staged.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
            mediator.write_head(StatusCode::OK).await.unwrap();
        }

        let mut expected = HeaderMap::new();
        emit_common_headers(&mut expected);
        expected.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
        assert_eq!(out.headers, expected);
    }

    #[tokio::test]
    async fn raw_headers_survive_commit() {
        let policy = ContentPolicy::new().with_content_types(["image/jpeg"]);
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, &policy);
            mediator
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
            let raw = mediator.raw_headers_mut();
            raw.insert(CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
            raw.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
            raw.insert(SERVER, HeaderValue::from_static("origin"));
            mediator.write_head(StatusCode::OK).await.unwrap();
        }

        let mut expected = HeaderMap::new();
        expected.insert(CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
        emit_common_headers(&mut expected);
        expected.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
        assert_eq!(out.headers, expected);
    }

    #[tokio::test]
    async fn status_is_committed_once() {
        let policy = ContentPolicy::new();
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, &policy);
            mediator
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
            assert!(!mediator.is_committed());
            mediator.write_body(Bytes::from_static(b"png")).await.unwrap();
            assert!(mediator.is_committed());
            mediator.write_head(StatusCode::NOT_FOUND).await.unwrap();
            // staged changes after commit go nowhere
            mediator
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        }

        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.headers[CONTENT_TYPE], "image/png");
        assert_eq!(out.body_str(), "png");
    }

    #[tokio::test]
    async fn discarding_swallows_every_chunk() {
        let policy = ContentPolicy::new();
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, &policy);
            mediator
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/javascript"));
            for _ in 0..3 {
                let n = mediator
                    .write_body(Bytes::from_static(b"alert(1)"))
                    .await
                    .unwrap();
                assert_eq!(n, 8);
            }
            assert!(mediator.is_discarding());
        }

        assert_eq!(out.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(out.body_str(), "Bad Gateway\n");
    }

    #[tokio::test]
    async fn missing_content_type_is_refused() {
        let policy = ContentPolicy::new();
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, &policy);
            mediator.write_head(StatusCode::OK).await.unwrap();
        }
        assert_eq!(out.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn abort_reaches_the_sink() {
        let policy = ContentPolicy::new();
        let mut out = RecordedResponse::new();
        {
            let mut mediator = ResponseMediator::new(&mut out, &policy);
            mediator.abort().await;
        }
        assert!(out.aborted);
    }
}
