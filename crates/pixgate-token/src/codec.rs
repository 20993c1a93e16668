//! JWS compact encoding and validation of signed URL tokens.
//!
//! Decoding checks a token in a fixed order and stops at the first failure:
//!
//! 1. structure, base64url and JSON of header and payload ([`TokenError::Malformed`])
//! 2. declared `alg` against the accepted set ([`TokenError::AlgorithmMismatch`])
//! 3. key lookup by the unverified `iss` and `kid` ([`TokenError::KeyResolution`])
//! 4. key family against the declared `alg` ([`TokenError::IncompatibleKeyAlgorithm`])
//! 5. signature ([`TokenError::InvalidSignature`])
//! 6. `nbf` / `exp` with leeway ([`TokenError::Validity`])
//!
//! The algorithm is never taken from the token alone: step 4 ties it to the
//! key the store returned, which rules out HS/RS confusion and `alg: none`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Header, Validation};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::SignatureAlgorithm;
use crate::claims::Claims;
use crate::error::{Result, TokenError};
use crate::es512;
use crate::key::{EcCurve, Key};
use crate::store::KeyStore;

/// Clock skew tolerated on `nbf` and `exp`
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);

/// JOSE header as it appears on the wire
#[derive(Debug, Serialize, Deserialize)]
struct JoseHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

/// The three segments of a compact token
struct CompactParts<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactParts<'a> {
    fn split(token: &'a str) -> Result<Self> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::malformed("expected three dot-separated segments"));
        };
        if header.is_empty() || payload.is_empty() {
            return Err(TokenError::malformed("empty header or payload segment"));
        }
        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    /// `header.payload`, the bytes the signature covers
    fn signing_input(&self, token: &'a str) -> &'a str {
        &token[..self.header.len() + 1 + self.payload.len()]
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::malformed(format_args!("{what} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::malformed(format_args!("{what} is not valid JSON: {e}")))
}

/// Signs claims into tokens and validates tokens back into subjects
///
/// Cloning is cheap; clones share the key store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chrono::{TimeDelta, Utc};
/// use pixgate_token::{Claims, Key, MemoryKeyStore, TokenCodec};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryKeyStore::fixed("issuer", Key::hmac("secret")?));
/// let codec = TokenCodec::new(store);
///
/// let claims = Claims::new("issuer", "https://example.net/cat.jpeg")
///     .with_expires_at(Utc::now() + TimeDelta::hours(1));
/// let token = codec.encode(&claims, None).await?;
///
/// let subject = codec.decode(&token, Utc::now()).await?;
/// assert_eq!(subject, "https://example.net/cat.jpeg");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone)]
pub struct TokenCodec {
    store: Arc<dyn KeyStore>,
    leeway: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("store", &"<dyn KeyStore>")
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            leeway: DEFAULT_LEEWAY,
        }
    }

    /// Override the clock skew tolerance (default 60 seconds)
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Sign `claims` with the key registered for `claims.issuer` and `key_id`
    ///
    /// The algorithm follows the key: HS256 for HMAC secrets, RS256 for RSA
    /// keys and the curve's algorithm for EC keys.
    ///
    /// # Errors
    ///
    /// - [`TokenError::KeyResolution`] when the store has no signing key
    /// - [`TokenError::UnsupportedAlgorithm`] when the key is a public key
    /// - [`TokenError::Signing`] when the crypto backend fails
    pub async fn encode(&self, claims: &Claims, key_id: Option<&str>) -> Result<String> {
        let key_id = key_id.filter(|kid| !kid.is_empty());
        let key = self
            .store
            .signing_key(&claims.issuer, key_id)
            .await
            .map_err(|source| TokenError::KeyResolution {
                issuer: claims.issuer.clone(),
                source,
            })?;
        let algorithm = key
            .signing_algorithm()
            .ok_or_else(|| TokenError::UnsupportedAlgorithm(key.kind()))?;

        let token = match algorithm.to_jsonwebtoken() {
            Some(jwt_algorithm) => {
                let mut header = Header::new(jwt_algorithm);
                header.kid = key_id.map(str::to_owned);
                let encoding_key = key.encoding_key().map_err(TokenError::signing)?;
                jsonwebtoken::encode(&header, claims, &encoding_key)
                    .map_err(TokenError::signing)?
            }
            None => Self::encode_es512(&key, claims, key_id)?,
        };

        debug!(issuer = %claims.issuer, algorithm = %algorithm, "token signed");
        Ok(token)
    }

    fn encode_es512(key: &Key, claims: &Claims, key_id: Option<&str>) -> Result<String> {
        let Key::EcPrivate {
            curve: EcCurve::P521,
            pem,
        } = key
        else {
            return Err(TokenError::UnsupportedAlgorithm(key.kind()));
        };

        let header = JoseHeader {
            typ: Some("JWT".to_owned()),
            alg: SignatureAlgorithm::ES512.name().to_owned(),
            kid: key_id.map(str::to_owned),
        };
        let header = serde_json::to_vec(&header).map_err(TokenError::signing)?;
        let payload = serde_json::to_vec(claims).map_err(TokenError::signing)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature =
            es512::sign(pem.expose_secret(), signing_input.as_bytes()).map_err(TokenError::signing)?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Validate `token` at instant `now` and return its subject
    ///
    /// # Errors
    ///
    /// See the module documentation for the order in which checks run.
    pub async fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<String> {
        self.decode_claims(token, now).await.map(|claims| claims.subject)
    }

    /// Validate `token` at instant `now` and return all of its claims
    ///
    /// # Errors
    ///
    /// Same as [`TokenCodec::decode`].
    pub async fn decode_claims(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let parts = CompactParts::split(token)?;
        let header: JoseHeader = decode_segment(parts.header, "header")?;
        let algorithm = SignatureAlgorithm::from_name(&header.alg)
            .ok_or_else(|| TokenError::AlgorithmMismatch(header.alg.clone()))?;
        let claims: Claims = decode_segment(parts.payload, "payload")?;
        let signature = URL_SAFE_NO_PAD
            .decode(parts.signature)
            .map_err(|e| TokenError::malformed(format_args!("signature is not base64url: {e}")))?;

        let key_id = header.kid.as_deref().filter(|kid| !kid.is_empty());
        let key = self
            .store
            .verifying_key(&claims.issuer, key_id)
            .await
            .map_err(|source| TokenError::KeyResolution {
                issuer: claims.issuer.clone(),
                source,
            })?;
        if !key.accepts(algorithm) {
            return Err(TokenError::IncompatibleKeyAlgorithm {
                algorithm,
                key: key.kind(),
            });
        }

        Self::verify_signature(token, &parts, &signature, algorithm, &key)?;

        claims
            .validate_at(now, self.leeway)
            .map_err(TokenError::Validity)?;

        debug!(issuer = %claims.issuer, algorithm = %algorithm, "token verified");
        Ok(claims)
    }

    fn verify_signature(
        token: &str,
        parts: &CompactParts<'_>,
        signature: &[u8],
        algorithm: SignatureAlgorithm,
        key: &Key,
    ) -> Result<()> {
        let Some(jwt_algorithm) = algorithm.to_jsonwebtoken() else {
            let Key::EcPublic { pem, .. } = key else {
                return Err(TokenError::IncompatibleKeyAlgorithm {
                    algorithm,
                    key: key.kind(),
                });
            };
            return if es512::verify(pem, parts.signing_input(token).as_bytes(), signature) {
                Ok(())
            } else {
                Err(TokenError::InvalidSignature)
            };
        };

        let decoding_key = key.decoding_key().map_err(|e| {
            debug!(error = %e, key = %key.kind(), "verifying key unusable");
            TokenError::InvalidSignature
        })?;

        // Signature only: temporal claims are checked with our own leeway rules.
        let mut validation = Validation::new(jwt_algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<serde_json::Value>(token, &decoding_key, &validation)
            .map(|_| ())
            .map_err(|e| {
                debug!(error = %e, algorithm = %algorithm, "signature rejected");
                TokenError::InvalidSignature
            })
    }
}
