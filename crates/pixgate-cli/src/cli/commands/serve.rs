//! Run the gateway until Ctrl+C or SIGTERM

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use pixgate_server::config::DEFAULT_LISTEN;
use pixgate_server::{Gateway, GatewayConfig, HttpRelay, router, serve};
use pixgate_token::TokenCodec;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::KeyArgs;
use crate::cli::error::{CliError, CliResult};

/// Run the gateway with one issuer and a shared HMAC secret
///
/// # Examples
///
///   PIXGATE_SECRET=s3cret pixgate serve --listen 127.0.0.1:8080
///
/// Allow AVIF on top of the default image types:
///   pixgate serve --secret s3cret --extra-content-types image/avif
#[derive(Debug, Args)]
pub struct ServeCommand {
    #[command(flatten)]
    pub keys: KeyArgs,

    /// Address to listen on
    #[arg(long, env = "PIXGATE_LISTEN", default_value_t = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Upper bound for one origin fetch, in seconds
    #[arg(long, env = "PIXGATE_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Time in-flight requests get to finish after a shutdown signal, in seconds
    #[arg(long, env = "PIXGATE_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Content types allowed on top of the default image types
    #[arg(long, env = "PIXGATE_EXTRA_CONTENT_TYPES", value_delimiter = ',')]
    pub extra_content_types: Vec<String>,
}

impl ServeCommand {
    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new()
            .with_listen(self.listen)
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
            .with_extra_content_types(
                self.extra_content_types
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty()),
            )
    }

    pub async fn execute(self) -> CliResult<()> {
        let config = self.config();
        let relay = HttpRelay::new(&config).map_err(|e| CliError::Gateway(e.to_string()))?;
        let gateway = Gateway::new(
            TokenCodec::new(self.keys.key_store()?),
            Arc::new(relay),
            config.content_policy(),
        );

        info!(
            issuer = %self.keys.issuer,
            key_id = self.keys.key_id.as_deref().unwrap_or("-"),
            fetch_timeout_secs = self.fetch_timeout_secs,
            "starting gateway"
        );

        let listener = tokio::net::TcpListener::bind(config.listen)
            .await
            .map_err(|e| CliError::Gateway(format!("failed to bind to {}: {e}", config.listen)))?;

        let shutdown = CancellationToken::new();
        tokio::spawn(watch_signals(shutdown.clone()));

        serve(listener, router(Arc::new(gateway)), shutdown, config.shutdown_grace).await?;
        info!("gateway stopped");
        Ok(())
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
        () = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
