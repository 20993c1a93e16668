//! Key resolution by `(issuer, key id)`.
//!
//! The codec never owns key material: it asks a [`KeyStore`] for the key that
//! belongs to an issuer (and optional key id) once per sign or verify call.
//! [`MemoryKeyStore`] is the in-process implementation used by the gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::key::Key;

/// Errors a key store may report
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyStoreError {
    /// No key is registered under the requested address
    #[error("no key registered for issuer {issuer:?} (kid {key_id:?})")]
    NotFound {
        issuer: String,
        key_id: Option<String>,
    },

    /// The backing store failed
    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

impl KeyStoreError {
    pub fn not_found(issuer: &str, key_id: Option<&str>) -> Self {
        Self::NotFound {
            issuer: issuer.to_owned(),
            key_id: key_id.map(str::to_owned),
        }
    }
}

/// Source of signing and verifying keys
///
/// Implementations must be cheap to call concurrently; the gateway consults
/// the store on every request.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Key used to sign tokens for `issuer`
    async fn signing_key(&self, issuer: &str, key_id: Option<&str>)
    -> Result<Arc<Key>, KeyStoreError>;

    /// Key used to verify tokens claiming to come from `issuer`
    async fn verifying_key(
        &self,
        issuer: &str,
        key_id: Option<&str>,
    ) -> Result<Arc<Key>, KeyStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyAddress {
    issuer: String,
    key_id: Option<String>,
}

impl KeyAddress {
    fn new(issuer: &str, key_id: Option<&str>) -> Self {
        Self {
            issuer: issuer.to_owned(),
            key_id: key_id.map(str::to_owned),
        }
    }
}

type KeyMap = HashMap<KeyAddress, Arc<Key>>;

/// Read-mostly in-memory key store
///
/// Signing and verifying keys live in separate tables so asymmetric pairs can
/// be registered under the same address. HMAC secrets go into both through
/// [`MemoryKeyStore::insert`].
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    signing: RwLock<KeyMap>,
    verifying: RwLock<KeyMap>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding a single key for `issuer` with no key id
    ///
    /// This is the configuration the gateway binary runs with: one issuer, one
    /// shared HMAC secret.
    pub fn fixed(issuer: &str, key: Key) -> Self {
        let store = Self::new();
        store.insert(issuer, None, key);
        store
    }

    /// Register `key` for both signing and verifying
    pub fn insert(&self, issuer: &str, key_id: Option<&str>, key: Key) {
        let key = Arc::new(key);
        let address = KeyAddress::new(issuer, key_id);
        self.signing.write().insert(address.clone(), Arc::clone(&key));
        self.verifying.write().insert(address, key);
    }

    pub fn insert_signing_key(&self, issuer: &str, key_id: Option<&str>, key: Key) {
        self.signing
            .write()
            .insert(KeyAddress::new(issuer, key_id), Arc::new(key));
    }

    pub fn insert_verifying_key(&self, issuer: &str, key_id: Option<&str>, key: Key) {
        self.verifying
            .write()
            .insert(KeyAddress::new(issuer, key_id), Arc::new(key));
    }

    /// Drop every key registered at the address; returns whether any existed
    pub fn remove(&self, issuer: &str, key_id: Option<&str>) -> bool {
        let address = KeyAddress::new(issuer, key_id);
        let signing = self.signing.write().remove(&address).is_some();
        let verifying = self.verifying.write().remove(&address).is_some();
        signing || verifying
    }

    fn lookup(table: &RwLock<KeyMap>, issuer: &str, key_id: Option<&str>) -> Result<Arc<Key>, KeyStoreError> {
        table
            .read()
            .get(&KeyAddress::new(issuer, key_id))
            .cloned()
            .ok_or_else(|| KeyStoreError::not_found(issuer, key_id))
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn signing_key(
        &self,
        issuer: &str,
        key_id: Option<&str>,
    ) -> Result<Arc<Key>, KeyStoreError> {
        Self::lookup(&self.signing, issuer, key_id)
    }

    async fn verifying_key(
        &self,
        issuer: &str,
        key_id: Option<&str>,
    ) -> Result<Arc<Key>, KeyStoreError> {
        Self::lookup(&self.verifying, issuer, key_id)
    }
}
