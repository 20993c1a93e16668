//! Subcommands

pub mod decode;
pub mod encode;
pub mod serve;

use clap::Subcommand;

use crate::cli::error::CliResult;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway
    #[command(visible_alias = "s")]
    Serve(serve::ServeCommand),

    /// Sign an image URL
    #[command(visible_alias = "e")]
    Encode(encode::EncodeCommand),

    /// Verify a token and print the URL it carries
    #[command(visible_alias = "d")]
    Decode(decode::DecodeCommand),
}

impl Command {
    pub async fn execute(self) -> CliResult<()> {
        match self {
            Command::Serve(cmd) => cmd.execute().await,
            Command::Encode(cmd) => cmd.execute().await,
            Command::Decode(cmd) => cmd.execute().await,
        }
    }
}
