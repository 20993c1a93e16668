//! Key material used to sign and verify signed URL tokens.
//!
//! A [`Key`] is a closed union over the key shapes the codec understands. The
//! constructors validate the material up front, so a `Key` that exists is
//! always usable for the operation its kind implies.

use std::fmt;

use jsonwebtoken::{DecodingKey, EncodingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use thiserror::Error;

use crate::algorithm::{AlgorithmFamily, SignatureAlgorithm};
use crate::es512;

/// Elliptic curves supported for ECDSA keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// NIST P-256 (ES256)
    P256,
    /// NIST P-384 (ES384)
    P384,
    /// NIST P-521 (ES512)
    P521,
}

impl EcCurve {
    /// The single algorithm keys on this curve sign and verify with
    pub const fn algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::P256 => SignatureAlgorithm::ES256,
            Self::P384 => SignatureAlgorithm::ES384,
            Self::P521 => SignatureAlgorithm::ES512,
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        })
    }
}

/// Shape of a key, without its material
///
/// This is what shows up in logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Hmac,
    RsaPrivate,
    RsaPublic,
    EcPrivate(EcCurve),
    EcPublic(EcCurve),
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hmac => f.write_str("HMAC secret"),
            Self::RsaPrivate => f.write_str("RSA private key"),
            Self::RsaPublic => f.write_str("RSA public key"),
            Self::EcPrivate(curve) => write!(f, "{curve} private key"),
            Self::EcPublic(curve) => write!(f, "{curve} public key"),
        }
    }
}

/// Errors raised while loading key material
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// HMAC secrets must carry at least one byte
    #[error("HMAC secret must not be empty")]
    EmptySecret,

    /// PEM input could not be parsed as the requested key kind
    #[error("invalid {kind}: {reason}")]
    InvalidPem { kind: KeyKind, reason: String },
}

impl KeyError {
    fn invalid_pem(kind: KeyKind, reason: impl fmt::Display) -> Self {
        Self::InvalidPem {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Signing or verifying key material
///
/// Private material is held in [`secrecy`] wrappers and the `Debug` output
/// only names the key kind.
pub enum Key {
    /// Shared HMAC secret, used for both signing and verifying
    Hmac(SecretSlice<u8>),
    /// PKCS#1 or PKCS#8 PEM RSA private key
    RsaPrivate(SecretString),
    /// PKCS#1 or SPKI PEM RSA public key
    RsaPublic(String),
    /// PKCS#8 PEM EC private key
    EcPrivate { curve: EcCurve, pem: SecretString },
    /// SPKI PEM EC public key
    EcPublic { curve: EcCurve, pem: String },
}

impl Key {
    /// Build an HMAC key from raw secret bytes
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::EmptySecret`] when `secret` is empty.
    pub fn hmac(secret: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(KeyError::EmptySecret);
        }
        Ok(Self::Hmac(SecretSlice::from(secret)))
    }

    /// Load an RSA private key from PEM
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidPem`] when the PEM is not an RSA private key.
    pub fn rsa_private_pem(pem: &str) -> Result<Self, KeyError> {
        EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| KeyError::invalid_pem(KeyKind::RsaPrivate, e))?;
        Ok(Self::RsaPrivate(SecretString::from(pem.to_owned())))
    }

    /// Load an RSA public key from PEM
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidPem`] when the PEM is not an RSA public key.
    pub fn rsa_public_pem(pem: &str) -> Result<Self, KeyError> {
        DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| KeyError::invalid_pem(KeyKind::RsaPublic, e))?;
        Ok(Self::RsaPublic(pem.to_owned()))
    }

    /// Load an EC private key on `curve` from PKCS#8 PEM
    ///
    /// The curve named in the PEM must be `curve`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidPem`] when the PEM is not an EC private key
    /// on `curve`.
    pub fn ec_private_pem(curve: EcCurve, pem: &str) -> Result<Self, KeyError> {
        let kind = KeyKind::EcPrivate(curve);
        match curve {
            EcCurve::P256 => {
                p256::SecretKey::from_pkcs8_pem(pem).map_err(|e| KeyError::invalid_pem(kind, e))?;
            }
            EcCurve::P384 => {
                p384::SecretKey::from_pkcs8_pem(pem).map_err(|e| KeyError::invalid_pem(kind, e))?;
            }
            EcCurve::P521 => {
                es512::signing_key(pem).map_err(|e| KeyError::invalid_pem(kind, e))?;
            }
        }
        if curve != EcCurve::P521 {
            EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| KeyError::invalid_pem(kind, e))?;
        }
        Ok(Self::EcPrivate {
            curve,
            pem: SecretString::from(pem.to_owned()),
        })
    }

    /// Load an EC public key on `curve` from SPKI PEM
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidPem`] when the PEM is not an EC public key
    /// on `curve`.
    pub fn ec_public_pem(curve: EcCurve, pem: &str) -> Result<Self, KeyError> {
        let kind = KeyKind::EcPublic(curve);
        match curve {
            EcCurve::P256 => {
                p256::PublicKey::from_public_key_pem(pem).map_err(|e| KeyError::invalid_pem(kind, e))?;
            }
            EcCurve::P384 => {
                p384::PublicKey::from_public_key_pem(pem).map_err(|e| KeyError::invalid_pem(kind, e))?;
            }
            EcCurve::P521 => {
                es512::verifying_key(pem).map_err(|e| KeyError::invalid_pem(kind, e))?;
            }
        }
        if curve != EcCurve::P521 {
            DecodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| KeyError::invalid_pem(kind, e))?;
        }
        Ok(Self::EcPublic {
            curve,
            pem: pem.to_owned(),
        })
    }

    /// Shape of this key
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Hmac(_) => KeyKind::Hmac,
            Self::RsaPrivate(_) => KeyKind::RsaPrivate,
            Self::RsaPublic(_) => KeyKind::RsaPublic,
            Self::EcPrivate { curve, .. } => KeyKind::EcPrivate(*curve),
            Self::EcPublic { curve, .. } => KeyKind::EcPublic(*curve),
        }
    }

    /// Algorithm used when signing with this key, `None` for public keys
    pub fn signing_algorithm(&self) -> Option<SignatureAlgorithm> {
        match self {
            Self::Hmac(_) => Some(SignatureAlgorithm::HS256),
            Self::RsaPrivate(_) => Some(SignatureAlgorithm::RS256),
            Self::EcPrivate { curve, .. } => Some(curve.algorithm()),
            Self::RsaPublic(_) | Self::EcPublic { .. } => None,
        }
    }

    /// Whether a token declaring `algorithm` may be verified with this key
    pub fn accepts(&self, algorithm: SignatureAlgorithm) -> bool {
        match self {
            Self::Hmac(_) => algorithm.family() == AlgorithmFamily::Hmac,
            Self::RsaPublic(_) => algorithm.family() == AlgorithmFamily::Rsa,
            Self::EcPublic { curve, .. } => curve.algorithm() == algorithm,
            Self::RsaPrivate(_) | Self::EcPrivate { .. } => false,
        }
    }

    pub(crate) fn encoding_key(&self) -> jsonwebtoken::errors::Result<EncodingKey> {
        match self {
            Self::Hmac(secret) => Ok(EncodingKey::from_secret(secret.expose_secret())),
            Self::RsaPrivate(pem) => EncodingKey::from_rsa_pem(pem.expose_secret().as_bytes()),
            Self::EcPrivate { pem, .. } => EncodingKey::from_ec_pem(pem.expose_secret().as_bytes()),
            Self::RsaPublic(_) | Self::EcPublic { .. } => {
                Err(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into())
            }
        }
    }

    pub(crate) fn decoding_key(&self) -> jsonwebtoken::errors::Result<DecodingKey> {
        match self {
            Self::Hmac(secret) => Ok(DecodingKey::from_secret(secret.expose_secret())),
            Self::RsaPublic(pem) => DecodingKey::from_rsa_pem(pem.as_bytes()),
            Self::EcPublic { pem, .. } => DecodingKey::from_ec_pem(pem.as_bytes()),
            Self::RsaPrivate(_) | Self::EcPrivate { .. } => {
                Err(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into())
            }
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EC_P256_PRIVATE: &str = include_str!("../tests/fixtures/ec_p256_private.pem");
    const EC_P256_PUBLIC: &str = include_str!("../tests/fixtures/ec_p256_public.pem");
    const EC_P384_PRIVATE: &str = include_str!("../tests/fixtures/ec_p384_private.pem");
    const EC_P384_PUBLIC: &str = include_str!("../tests/fixtures/ec_p384_public.pem");
    const EC_P521_PRIVATE: &str = include_str!("../tests/fixtures/ec_p521_private.pem");
    const EC_P521_PUBLIC: &str = include_str!("../tests/fixtures/ec_p521_public.pem");
    const RSA_PUBLIC: &str = include_str!("../tests/fixtures/rsa_public.pem");

    #[test]
    fn empty_hmac_secret_is_rejected() {
        assert!(matches!(Key::hmac(Vec::new()), Err(KeyError::EmptySecret)));
    }

    #[test]
    fn debug_output_never_contains_material() {
        let key = Key::hmac("super-secret-value").unwrap();
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "Key(Hmac)");
        assert!(!rendered.contains("super-secret-value"));
    }

    #[test]
    fn signing_algorithm_follows_key_kind() {
        assert_eq!(
            Key::hmac("s").unwrap().signing_algorithm(),
            Some(SignatureAlgorithm::HS256)
        );
        assert_eq!(
            Key::ec_private_pem(EcCurve::P256, EC_P256_PRIVATE)
                .unwrap()
                .signing_algorithm(),
            Some(SignatureAlgorithm::ES256)
        );
        assert_eq!(
            Key::ec_private_pem(EcCurve::P521, EC_P521_PRIVATE)
                .unwrap()
                .signing_algorithm(),
            Some(SignatureAlgorithm::ES512)
        );
        assert_eq!(
            Key::rsa_public_pem(RSA_PUBLIC).unwrap().signing_algorithm(),
            None
        );
    }

    #[test]
    fn verifying_keys_accept_only_their_family() {
        let hmac = Key::hmac("s").unwrap();
        assert!(hmac.accepts(SignatureAlgorithm::HS512));
        assert!(!hmac.accepts(SignatureAlgorithm::RS256));

        let rsa = Key::rsa_public_pem(RSA_PUBLIC).unwrap();
        assert!(rsa.accepts(SignatureAlgorithm::RS384));
        assert!(!rsa.accepts(SignatureAlgorithm::HS256));

        let p521 = Key::ec_public_pem(EcCurve::P521, EC_P521_PUBLIC).unwrap();
        assert!(p521.accepts(SignatureAlgorithm::ES512));
        assert!(!p521.accepts(SignatureAlgorithm::ES256));
    }

    #[test]
    fn garbage_pem_is_rejected_with_kind() {
        let err = Key::rsa_private_pem("not a key").unwrap_err();
        assert!(matches!(
            err,
            KeyError::InvalidPem {
                kind: KeyKind::RsaPrivate,
                ..
            }
        ));

        let err = Key::ec_public_pem(EcCurve::P521, RSA_PUBLIC).unwrap_err();
        assert!(matches!(
            err,
            KeyError::InvalidPem {
                kind: KeyKind::EcPublic(EcCurve::P521),
                ..
            }
        ));
    }

    #[test]
    fn ec_keys_must_be_on_the_declared_curve() {
        let cases = [
            (EcCurve::P256, EC_P384_PRIVATE, EC_P384_PUBLIC),
            (EcCurve::P384, EC_P256_PRIVATE, EC_P256_PUBLIC),
            (EcCurve::P521, EC_P256_PRIVATE, EC_P256_PUBLIC),
            (EcCurve::P256, EC_P521_PRIVATE, EC_P521_PUBLIC),
        ];
        for (curve, private, public) in cases {
            assert!(
                matches!(
                    Key::ec_private_pem(curve, private),
                    Err(KeyError::InvalidPem { kind: KeyKind::EcPrivate(c), .. }) if c == curve
                ),
                "private key labelled {curve}"
            );
            assert!(
                matches!(
                    Key::ec_public_pem(curve, public),
                    Err(KeyError::InvalidPem { kind: KeyKind::EcPublic(c), .. }) if c == curve
                ),
                "public key labelled {curve}"
            );
        }

        assert!(Key::ec_private_pem(EcCurve::P384, EC_P384_PRIVATE).is_ok());
        assert!(Key::ec_public_pem(EcCurve::P256, EC_P256_PUBLIC).is_ok());
    }
}
