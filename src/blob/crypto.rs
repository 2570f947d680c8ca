//! HMAC provider used for shared-key signing
//!
//! The signer only needs "HMAC-SHA256 over a buffer with a binary key", so the
//! provider is a one-method trait handed to the service at construction.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub trait HmacProvider: Send + Sync {
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Vec<u8>;
}

/// Default provider backed by the `hmac` and `sha2` crates
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hmac;

impl HmacProvider for Sha256Hmac {
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
