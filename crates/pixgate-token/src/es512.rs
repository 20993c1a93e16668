//! ECDSA P-521 / SHA-512 signatures.
//!
//! `jsonwebtoken` does not ship ES512, so tokens on the P-521 curve are signed
//! and verified here with RustCrypto. Signatures use the fixed-width `r || s`
//! encoding JWS requires (132 bytes).

use p521::ecdsa::signature::{Signer, Verifier};
use p521::ecdsa::{Signature, SigningKey, VerifyingKey};
use p521::elliptic_curve::sec1::ToEncodedPoint;
use p521::pkcs8::{DecodePrivateKey, DecodePublicKey};

/// Parse a PKCS#8 PEM private key on P-521
pub(crate) fn signing_key(pem: &str) -> Result<SigningKey, String> {
    let secret = p521::SecretKey::from_pkcs8_pem(pem).map_err(|e| e.to_string())?;
    SigningKey::from_bytes(&secret.to_bytes()).map_err(|e| e.to_string())
}

/// Parse an SPKI PEM public key on P-521
pub(crate) fn verifying_key(pem: &str) -> Result<VerifyingKey, String> {
    let public = p521::PublicKey::from_public_key_pem(pem).map_err(|e| e.to_string())?;
    VerifyingKey::from_sec1_bytes(public.to_encoded_point(false).as_bytes())
        .map_err(|e| e.to_string())
}

pub(crate) fn sign(pem: &str, message: &[u8]) -> Result<Vec<u8>, String> {
    let key = signing_key(pem)?;
    let signature: Signature = key.sign(message);
    Ok(signature.to_bytes().to_vec())
}

pub(crate) fn verify(pem: &str, message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = verifying_key(pem) else {
        return false;
    };
    Signature::from_slice(signature).is_ok_and(|signature| key.verify(message, &signature).is_ok())
}
