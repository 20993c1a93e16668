//! Command-line interface
//!
//! ```text
//! cli/
//! ├── args.rs       # Issuer and secret flags shared by subcommands
//! ├── commands/     # serve, encode, decode
//! └── error.rs      # CliError and its display
//! ```

pub mod args;
pub mod commands;
pub mod error;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::cli::error::CliResult;

/// pixgate - signed-URL image relay
#[derive(Parser, Debug)]
#[command(
    name = "pixgate",
    version,
    about = "Signed-URL image relay",
    long_about = "Relays remote images only for URLs carrying a valid signed token.\n\
                  Run the gateway, or sign and verify gateway URLs.",
    author
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: commands::Command,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the command fails.
    pub async fn execute(self) -> CliResult<()> {
        self.init_tracing();
        self.command.execute().await
    }

    fn level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// `RUST_LOG` wins over the verbosity flags
    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str().to_ascii_lowercase()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
