//! Destinations a relayed response is written into.
//!
//! [`ResponseSink`] is the seam between the relay logic and the HTTP server:
//! the gateway writes a status, headers and body chunks into a sink, and the
//! sink turns them into whatever the transport needs.
//!
//! - [`ChannelSink`] streams into an axum [`Response`] through channels
//! - [`RecordedResponse`] buffers everything in memory

use async_trait::async_trait;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::SinkError;

/// Body chunks buffered between the relay task and the client connection
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Write side of one HTTP response
///
/// Headers are mutable until the head is written. The first body write sends
/// a `200 OK` head if none was written yet; later `write_head` calls are
/// ignored.
#[async_trait]
pub trait ResponseSink: Send {
    /// Headers that will be sent with the head
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the status line and headers
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the client is gone.
    async fn write_head(&mut self, status: StatusCode) -> Result<(), SinkError>;

    /// Send a body chunk, returning the number of bytes consumed
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the client is gone.
    async fn write_body(&mut self, chunk: Bytes) -> Result<usize, SinkError>;

    /// Tear the response down so the client sees a broken transfer
    async fn abort(&mut self) {}
}

/// Sink that hands the head to an axum handler and streams the body
///
/// The handler awaits the receiver returned by [`ChannelSink::new`]; the body
/// of the delivered [`Response`] is fed chunk by chunk from this sink.
#[derive(Debug)]
pub struct ChannelSink {
    headers: HeaderMap,
    head: Option<oneshot::Sender<Response>>,
    body: Option<mpsc::Sender<Result<Bytes, SinkError>>>,
}

impl ChannelSink {
    pub fn new() -> (Self, oneshot::Receiver<Response>) {
        let (head_tx, head_rx) = oneshot::channel();
        let sink = Self {
            headers: HeaderMap::new(),
            head: Some(head_tx),
            body: None,
        };
        (sink, head_rx)
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn write_head(&mut self, status: StatusCode) -> Result<(), SinkError> {
        let Some(head) = self.head.take() else {
            return Ok(());
        };

        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let mut response = Response::new(Body::from_stream(ReceiverStream::new(body_rx)));
        *response.status_mut() = status;
        *response.headers_mut() = std::mem::take(&mut self.headers);

        head.send(response).map_err(|_| SinkError::Closed)?;
        self.body = Some(body_tx);
        Ok(())
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<usize, SinkError> {
        self.write_head(StatusCode::OK).await?;
        let Some(body) = &self.body else {
            return Err(SinkError::Closed);
        };
        let len = chunk.len();
        body.send(Ok(chunk)).await.map_err(|_| SinkError::Closed)?;
        Ok(len)
    }

    async fn abort(&mut self) {
        if let Some(body) = self.body.take() {
            // The error makes hyper reset the connection instead of ending the body cleanly.
            let _ = body.send(Err(SinkError::Aborted)).await;
        }
        self.head = None;
    }
}

/// In-memory sink, used for short fixed responses and in tests
#[derive(Debug, Default)]
pub struct RecordedResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: BytesMut,
    pub aborted: bool,
}

impl RecordedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written, or `200 OK` if only a body was written
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }
}

#[async_trait]
impl ResponseSink for RecordedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn write_head(&mut self, status: StatusCode) -> Result<(), SinkError> {
        self.status.get_or_insert(status);
        Ok(())
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<usize, SinkError> {
        self.write_head(StatusCode::OK).await?;
        self.body.extend_from_slice(&chunk);
        Ok(chunk.len())
    }

    async fn abort(&mut self) {
        self.aborted = true;
    }
}

impl IntoResponse for RecordedResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use http::HeaderValue;
    use http::header::CONTENT_TYPE;

    #[tokio::test]
    async fn recorded_response_writes_head_once() {
        let mut sink = RecordedResponse::new();
        sink.write_head(StatusCode::NOT_FOUND).await.unwrap();
        sink.write_head(StatusCode::OK).await.unwrap();
        sink.write_body(Bytes::from_static(b"gone")).await.unwrap();

        assert_eq!(sink.status(), StatusCode::NOT_FOUND);
        assert_eq!(sink.body_str(), "gone");
    }

    #[tokio::test]
    async fn channel_sink_streams_into_response() {
        let (mut sink, head) = ChannelSink::new();
        sink.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));

        let writer = tokio::spawn(async move {
            sink.write_body(Bytes::from_static(b"chunk-1,")).await.unwrap();
            sink.write_body(Bytes::from_static(b"chunk-2")).await.unwrap();
        });

        let response = head.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");

        writer.await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"chunk-1,chunk-2");
    }

    #[tokio::test]
    async fn aborted_channel_sink_fails_the_body() {
        let (mut sink, head) = ChannelSink::new();
        sink.write_head(StatusCode::OK).await.unwrap();
        sink.write_body(Bytes::from_static(b"partial")).await.unwrap();
        sink.abort().await;
        drop(sink);

        let response = head.await.unwrap();
        assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn dropped_handler_closes_the_sink() {
        let (mut sink, head) = ChannelSink::new();
        drop(head);
        assert!(matches!(
            sink.write_head(StatusCode::OK).await,
            Err(SinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn recorded_response_converts_into_response() {
        let mut recorded = RecordedResponse::new();
        recorded
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        recorded.write_head(StatusCode::GONE).await.unwrap();
        recorded.write_body(Bytes::from_static(b"URL expired\n")).await.unwrap();

        let response = recorded.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"URL expired\n");
    }
}
