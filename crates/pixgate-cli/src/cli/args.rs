//! Arguments shared by every subcommand that touches keys

use std::sync::Arc;

use clap::Args;
use pixgate_token::{Key, MemoryKeyStore};
use secrecy::{ExposeSecret, SecretString};

use crate::cli::error::CliResult;

/// Issuer used when none is configured
pub const DEFAULT_ISSUER: &str = "https://pixgate.example.com";

/// Issuer identity and the shared HMAC secret
#[derive(Debug, Clone, Args)]
pub struct KeyArgs {
    /// Issuer the tokens are signed for
    #[arg(long, env = "PIXGATE_ISSUER", default_value = DEFAULT_ISSUER)]
    pub issuer: String,

    /// Shared HMAC secret
    #[arg(long, env = "PIXGATE_SECRET", hide_env_values = true, value_parser = parse_secret)]
    pub secret: SecretString,

    /// Key id; tokens carrying it resolve to the same secret
    #[arg(long, env = "PIXGATE_KEY_ID")]
    pub key_id: Option<String>,
}

fn parse_secret(raw: &str) -> Result<SecretString, String> {
    Ok(SecretString::from(raw.to_owned()))
}

impl KeyArgs {
    /// In-memory store holding the secret for the issuer, with and without the key id
    ///
    /// # Errors
    ///
    /// Returns [`crate::cli::error::CliError::Key`] for an empty secret.
    pub fn key_store(&self) -> CliResult<Arc<MemoryKeyStore>> {
        let secret = self.secret.expose_secret().as_bytes();
        let store = MemoryKeyStore::fixed(&self.issuer, Key::hmac(secret)?);
        if let Some(key_id) = &self.key_id {
            store.insert(&self.issuer, Some(key_id), Key::hmac(secret)?);
        }
        Ok(Arc::new(store))
    }
}
