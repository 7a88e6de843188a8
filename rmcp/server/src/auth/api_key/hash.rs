//! Salted one-way hashing of API key secrets.
//!
//! Stored secrets take the form `{sha256}<salt>$<hash>`, where `hash` is
//! `SHA256(salt || secret)` and both parts are base64 encoded. The scheme
//! prefix lets a hasher refuse hashes it did not produce.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SHA256_PREFIX: &str = "{sha256}";
const SALT_LEN: usize = 16;

/// One-way hashing of credential secrets.
pub trait SecretHasher: Send + Sync + 'static {
    /// Hash a plaintext secret for storage.
    fn hash(&self, secret: &str) -> String;

    /// Whether `secret` hashes to `hashed`. Never compares plaintext.
    fn matches(&self, secret: &str, hashed: &str) -> bool;
}

/// Salted SHA-256 hasher with constant-time verification.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256SecretHasher;

impl Sha256SecretHasher {
    fn digest(salt: &[u8], secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::digest(&salt, secret);
        format!(
            "{SHA256_PREFIX}{}${}",
            BASE64.encode(salt),
            BASE64.encode(digest)
        )
    }

    fn matches(&self, secret: &str, hashed: &str) -> bool {
        let Some((salt, expected)) = hashed
            .strip_prefix(SHA256_PREFIX)
            .and_then(|rest| rest.split_once('$'))
        else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (BASE64.decode(salt), BASE64.decode(expected)) else {
            return false;
        };
        let computed = Self::digest(&salt, secret);
        computed.len() == expected.len() && bool::from(computed.as_slice().ct_eq(expected.as_slice()))
    }
}
