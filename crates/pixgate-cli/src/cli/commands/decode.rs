//! Verify a token

use chrono::{DateTime, Utc};
use clap::Args;
use pixgate_token::{MOUNT_PREFIX, TokenCodec};

use crate::cli::args::KeyArgs;
use crate::cli::error::CliResult;

/// Verify a token at the current time and print its URL
///
/// A full signed URL is accepted as well; everything up to the mount prefix
/// is ignored.
#[derive(Debug, Args)]
pub struct DecodeCommand {
    #[command(flatten)]
    pub keys: KeyArgs,

    /// Token or signed URL
    #[arg(long, value_name = "TOKEN")]
    pub token: String,
}

impl DecodeCommand {
    fn token(&self) -> &str {
        match self.token.rsplit_once(MOUNT_PREFIX) {
            Some((_, token)) => token,
            None => &self.token,
        }
    }

    /// # Errors
    ///
    /// Returns the codec's rejection when the token does not verify.
    pub async fn subject(&self, now: DateTime<Utc>) -> CliResult<String> {
        let codec = TokenCodec::new(self.keys.key_store()?);
        Ok(codec.decode(self.token(), now).await?)
    }

    pub async fn execute(self) -> CliResult<()> {
        println!("{}", self.subject(Utc::now()).await?);
        Ok(())
    }
}
