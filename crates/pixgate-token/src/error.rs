//! Error types for pixgate-token

use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;
use crate::claims::ValidityErrors;
use crate::key::KeyKind;
use crate::store::KeyStoreError;

/// Result type for token operations
pub type Result<T> = std::result::Result<T, TokenError>;

/// Why a token could not be produced or accepted
///
/// The variants follow the order in which decoding checks a token, so the
/// first failing stage decides the error.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TokenError {
    /// Wrong number of segments, bad base64url or bad JSON
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The key store had no usable key for the token's issuer
    #[error("key resolution failed for issuer {issuer:?}: {source}")]
    KeyResolution {
        issuer: String,
        #[source]
        source: KeyStoreError,
    },

    /// The header declares an algorithm outside the accepted set
    #[error("algorithm {0:?} is not accepted")]
    AlgorithmMismatch(String),

    /// The declared algorithm does not belong to the resolved key's family
    #[error("{algorithm} cannot be verified with a {key}")]
    IncompatibleKeyAlgorithm {
        algorithm: SignatureAlgorithm,
        key: KeyKind,
    },

    /// Signature did not verify
    #[error("signature verification failed")]
    InvalidSignature,

    /// The signing backend failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// `nbf`/`exp` bounds violated
    #[error("{0}")]
    Validity(ValidityErrors),

    /// The resolved signing key cannot sign (it is a public key)
    #[error("a {0} cannot sign tokens")]
    UnsupportedAlgorithm(KeyKind),
}

impl TokenError {
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::Malformed(reason.to_string())
    }

    pub fn signing(reason: impl std::fmt::Display) -> Self {
        Self::Signing(reason.to_string())
    }

    /// `true` when the token is structurally broken
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// `true` when the token's `exp` has passed
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Validity(errors) if errors.expired)
    }

    /// `true` when the token's `nbf` is still in the future
    pub fn is_not_yet_valid(&self) -> bool {
        matches!(self, Self::Validity(errors) if errors.not_yet_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_predicates_read_flags() {
        let both = TokenError::Validity(ValidityErrors {
            not_yet_valid: true,
            expired: true,
        });
        assert!(both.is_expired());
        assert!(both.is_not_yet_valid());

        let expired = TokenError::Validity(ValidityErrors {
            not_yet_valid: false,
            expired: true,
        });
        assert!(expired.is_expired());
        assert!(!expired.is_not_yet_valid());

        assert!(!TokenError::InvalidSignature.is_expired());
        assert!(TokenError::malformed("x").is_malformed());
    }

    #[test]
    fn messages_do_not_leak_key_material() {
        let err = TokenError::IncompatibleKeyAlgorithm {
            algorithm: SignatureAlgorithm::HS256,
            key: KeyKind::RsaPublic,
        };
        assert_eq!(err.to_string(), "HS256 cannot be verified with a RSA public key");
    }
}
