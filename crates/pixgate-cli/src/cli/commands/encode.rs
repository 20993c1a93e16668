//! Sign an image URL

use chrono::{DateTime, TimeDelta, Utc};
use clap::Args;
use pixgate_token::{Claims, SignOptions, SignedUrlBuilder, TokenCodec};

use crate::cli::args::KeyArgs;
use crate::cli::error::{CliError, CliResult};

/// `now + secs`, or a configuration error naming `flag` when out of range
fn offset(now: DateTime<Utc>, secs: i64, flag: &str) -> CliResult<DateTime<Utc>> {
    TimeDelta::try_seconds(secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| CliError::configuration(format!("{flag} {secs} is out of range")))
}

/// Sign an image URL
///
/// Prints the bare token, or the full gateway URL when `--base-url` is given.
///
/// # Examples
///
///   pixgate encode --secret s3cret --url https://example.net/cat.jpeg \
///     --base-url https://img.example.com --expires-in 3600
#[derive(Debug, Args)]
pub struct EncodeCommand {
    #[command(flatten)]
    pub keys: KeyArgs,

    /// URL of the image to relay
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// Public base URL of the gateway
    #[arg(long, value_name = "BASE")]
    pub base_url: Option<String>,

    /// Seconds from now until the URL expires
    #[arg(long, value_name = "SECS")]
    pub expires_in: Option<i64>,

    /// Seconds from now before the URL becomes usable
    #[arg(long, value_name = "SECS")]
    pub not_before_in: Option<i64>,
}

impl EncodeCommand {
    fn options(&self, now: DateTime<Utc>) -> CliResult<SignOptions> {
        Ok(SignOptions {
            key_id: self.keys.key_id.clone(),
            not_before: self
                .not_before_in
                .map(|secs| offset(now, secs, "--not-before-in"))
                .transpose()?,
            expires_at: self
                .expires_in
                .map(|secs| offset(now, secs, "--expires-in"))
                .transpose()?,
        })
    }

    /// Token or signed URL for the given time
    ///
    /// # Errors
    ///
    /// Fails on an unusable secret, base URL or signing error.
    pub async fn render(&self, now: DateTime<Utc>) -> CliResult<String> {
        let store = self.keys.key_store()?;
        let options = self.options(now)?;

        if let Some(base_url) = &self.base_url {
            let builder = SignedUrlBuilder::new(base_url, self.keys.issuer.clone(), store)?;
            return Ok(builder.sign(&self.url, &options).await?);
        }

        let mut claims = Claims::new(self.keys.issuer.clone(), self.url.clone());
        claims.not_before = options.not_before;
        claims.expires_at = options.expires_at;
        Ok(TokenCodec::new(store)
            .encode(&claims, options.key_id.as_deref())
            .await?)
    }

    pub async fn execute(self) -> CliResult<()> {
        println!("{}", self.render(Utc::now()).await?);
        Ok(())
    }
}
