//! Listener lifecycle with cooperative shutdown.

use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn join_result(result: Result<io::Result<()>, JoinError>) -> io::Result<()> {
    result.map_err(io::Error::other)?
}

/// Serve `router` on `listener` until `shutdown` is cancelled
///
/// Once cancelled, the listener stops accepting and in-flight requests get
/// `grace` to finish; whatever is still running after that is aborted.
///
/// # Errors
///
/// Returns the listener's I/O error if serving fails before shutdown.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> io::Result<()> {
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "pixgate listening");

    let drain = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .await
    });

    tokio::select! {
        result = &mut server => return join_result(result),
        () = shutdown.cancelled() => {}
    }

    info!(grace_secs = grace.as_secs(), "shutdown requested, draining in-flight requests");
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => join_result(result),
        Err(_) => {
            warn!("grace period elapsed, aborting remaining requests");
            server.abort();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn returns_after_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let router = Router::new().route("/", get(|| async { "ok" }));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(serve(listener, router, shutdown.clone(), Duration::from_secs(1)));
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), task).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
