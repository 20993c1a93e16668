//! # pixgate-token - Signed URL Tokens
//!
//! Time-bounded, signed authorization tokens that embed the origin URL the
//! pixgate relay is allowed to fetch. A token is a JWS in compact form, so it
//! is a single URL path segment.
//!
//! ## Architecture
//!
//! - [`claims`] - `iss` / `sub` / `nbf` / `exp` and their validity window
//! - [`key`] - Key material (HMAC, RSA, EC on P-256/384/521)
//! - [`store`] - `KeyStore` trait and the in-memory implementation
//! - [`codec`] - Encoding and the ordered decode pipeline
//! - [`client`] - `SignedUrlBuilder` for issuers
//!
//! ## Supported Algorithms
//!
//! HS256, HS384, HS512, RS256, RS384, RS512, ES256, ES384 and ES512. The
//! verifying key decides which of them a token may use; the header alone
//! never does.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use pixgate_token::{Key, MemoryKeyStore, SignOptions, SignedUrlBuilder, TokenCodec};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryKeyStore::fixed("https://app.example.com", Key::hmac("secret")?));
//!
//! let builder = SignedUrlBuilder::new("https://img.example.com", "https://app.example.com", store.clone())?;
//! let url = builder.sign("https://example.net/cat.jpeg", &SignOptions::default()).await?;
//!
//! let token = url.rsplit('/').next().unwrap_or_default();
//! let subject = TokenCodec::new(store).decode(token, Utc::now()).await?;
//! assert_eq!(subject, "https://example.net/cat.jpeg");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod algorithm;
pub mod claims;
pub mod client;
pub mod codec;
pub mod error;
mod es512;
pub mod key;
pub mod store;

pub use algorithm::SignatureAlgorithm;
pub use claims::{Claims, ValidityErrors};
pub use client::{BaseUrlError, SignOptions, SignedUrlBuilder};
pub use codec::{DEFAULT_LEEWAY, TokenCodec};
pub use error::{Result, TokenError};
pub use key::{EcCurve, Key, KeyError, KeyKind};
pub use store::{KeyStore, KeyStoreError, MemoryKeyStore};

/// Path prefix the gateway serves signed URLs under
pub const MOUNT_PREFIX: &str = "/i/";
