//! Issuing side: turn origin URLs into signed gateway URLs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::MOUNT_PREFIX;
use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::error::Result;
use crate::store::KeyStore;

/// Rejected gateway base URLs
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BaseUrlError {
    #[error("invalid base URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("base URL cannot carry a path")]
    CannotBeABase,

    #[error("base URL must not contain a query or fragment")]
    QueryOrFragment,
}

/// Per-URL signing options
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Key id placed in the token header
    pub key_id: Option<String>,
    /// Earliest instant the URL may be used
    pub not_before: Option<DateTime<Utc>>,
    /// Instant after which the URL stops working
    pub expires_at: Option<DateTime<Utc>>,
}

/// Builds signed gateway URLs for one issuer
///
/// ```rust
/// use std::sync::Arc;
/// use pixgate_token::{Key, MemoryKeyStore, SignOptions, SignedUrlBuilder};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryKeyStore::fixed("issuer", Key::hmac("secret")?));
/// let builder = SignedUrlBuilder::new("https://img.example.com", "issuer", store)?;
///
/// let url = builder
///     .sign("https://example.net/cat.jpeg", &SignOptions::default())
///     .await?;
/// assert!(url.starts_with("https://img.example.com/i/"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct SignedUrlBuilder {
    base_url: String,
    issuer: String,
    codec: TokenCodec,
}

impl SignedUrlBuilder {
    /// Validate `base_url` and append the gateway mount point to its path
    ///
    /// # Errors
    ///
    /// Returns [`BaseUrlError`] when the base URL is not absolute, cannot
    /// carry a path, or has a query or fragment.
    pub fn new(
        base_url: &str,
        issuer: impl Into<String>,
        store: Arc<dyn KeyStore>,
    ) -> std::result::Result<Self, BaseUrlError> {
        let mut url = Url::parse(base_url)?;
        if url.cannot_be_a_base() {
            return Err(BaseUrlError::CannotBeABase);
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(BaseUrlError::QueryOrFragment);
        }

        let path = format!("{}{}", url.path().trim_end_matches('/'), MOUNT_PREFIX);
        url.set_path(&path);

        Ok(Self {
            base_url: url.into(),
            issuer: issuer.into(),
            codec: TokenCodec::new(store),
        })
    }

    /// Base every signed URL starts with, ending in the mount prefix
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign `url` and return the full gateway URL
    ///
    /// # Errors
    ///
    /// Propagates [`TokenCodec::encode`] failures.
    pub async fn sign(&self, url: &str, options: &SignOptions) -> Result<String> {
        let mut claims = Claims::new(self.issuer.clone(), url);
        claims.not_before = options.not_before;
        claims.expires_at = options.expires_at;

        let token = self.codec.encode(&claims, options.key_id.as_deref()).await?;
        Ok(format!("{}{}", self.base_url, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::store::MemoryKeyStore;
    use chrono::TimeDelta;

    fn store() -> Arc<dyn KeyStore> {
        Arc::new(MemoryKeyStore::fixed("issuer", Key::hmac("secret").unwrap()))
    }

    #[test]
    fn mount_prefix_is_appended_to_base_path() {
        let cases = [
            ("https://img.example.com", "https://img.example.com/i/"),
            ("https://img.example.com/", "https://img.example.com/i/"),
            ("https://example.com/assets", "https://example.com/assets/i/"),
            ("https://example.com/assets/", "https://example.com/assets/i/"),
            ("http://localhost:8080", "http://localhost:8080/i/"),
        ];
        for (input, expected) in cases {
            let builder = SignedUrlBuilder::new(input, "issuer", store()).unwrap();
            assert_eq!(builder.base_url(), expected, "{input}");
        }
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(
            SignedUrlBuilder::new("/relative", "issuer", store()),
            Err(BaseUrlError::Parse(_))
        ));
        assert!(matches!(
            SignedUrlBuilder::new("mailto:someone@example.com", "issuer", store()),
            Err(BaseUrlError::CannotBeABase)
        ));
        assert!(matches!(
            SignedUrlBuilder::new("https://example.com/?a=b", "issuer", store()),
            Err(BaseUrlError::QueryOrFragment)
        ));
        assert!(matches!(
            SignedUrlBuilder::new("https://example.com/#top", "issuer", store()),
            Err(BaseUrlError::QueryOrFragment)
        ));
    }

    #[tokio::test]
    async fn signed_url_decodes_back_to_origin() {
        let store = store();
        let builder = SignedUrlBuilder::new("https://img.example.com", "issuer", Arc::clone(&store))
            .unwrap();
        let now = Utc::now();
        let options = SignOptions {
            expires_at: Some(now + TimeDelta::minutes(5)),
            ..SignOptions::default()
        };

        let signed = builder
            .sign("https://example.net/cat.jpeg", &options)
            .await
            .unwrap();
        let token = signed
            .strip_prefix("https://img.example.com/i/")
            .expect("gateway prefix");

        let subject = TokenCodec::new(store).decode(token, now).await.unwrap();
        assert_eq!(subject, "https://example.net/cat.jpeg");
    }
}
