//! Error types for pixgate-server
//!
//! Two layers:
//! - [`SinkError`]: the client side of a response went away or was torn down
//! - [`RelayError`]: fetching from the origin failed or the origin misbehaved
//!
//! Neither is ever rendered into a response body. Clients only see a status
//! text derived from [`RelayError::status`].

use http::StatusCode;
use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Failure writing to a response sink
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SinkError {
    /// The receiving side (client connection) is gone
    #[error("response sink closed")]
    Closed,

    /// The response was deliberately torn down mid-stream
    #[error("response aborted")]
    Aborted,
}

/// Failure talking to the origin
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    /// The outbound request could not be constructed
    #[error("invalid origin request: {0}")]
    InvalidRequest(String),

    /// Connecting to the origin failed or timed out
    #[error("origin transport error: {0}")]
    Transport(String),

    /// Any other client-side failure while fetching
    #[error("origin fetch failed: {0}")]
    Fetch(String),

    /// The origin answered with a redirect; redirects are never followed
    #[error("origin redirected with {0}")]
    Redirect(StatusCode),

    /// The origin answered with a status the relay does not forward
    #[error("origin answered with unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    /// Reading the origin body failed mid-stream
    #[error("failed to forward origin body: {0}")]
    Forward(String),
}

impl RelayError {
    /// Classify a `reqwest` failure
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else if err.is_connect() || err.is_timeout() {
            Self::Transport(err.to_string())
        } else {
            Self::Fetch(err.to_string())
        }
    }

    /// Status presented to the client for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) | Self::Redirect(_) => StatusCode::BAD_GATEWAY,
            Self::UnexpectedStatus(status) => *status,
            Self::Fetch(_) | Self::Forward(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_failure_class() {
        let cases = [
            (RelayError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (RelayError::Transport("x".into()), StatusCode::BAD_GATEWAY),
            (RelayError::Fetch("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (RelayError::Redirect(StatusCode::FOUND), StatusCode::BAD_GATEWAY),
            (
                RelayError::UnexpectedStatus(StatusCode::FORBIDDEN),
                StatusCode::FORBIDDEN,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }
}
