//! Password and API-key secret hashing.
//!
//! PBKDF2 at this work factor is CPU-bound; handlers run it through
//! `tokio::task::spawn_blocking` so request workers stay free.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Contractual work factor; tests may override at the call site, the
/// production path never does.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

pub const SALT_LEN: usize = 32;
pub const HASH_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 of a secret under a salt. Deterministic.
pub fn hash_secret(secret: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    out
}

/// Hash the candidate under the stored salt and compare in constant time.
pub fn verify_secret(secret: &str, salt: &[u8], expected_hash: &[u8]) -> bool {
    let hash = hash_secret(secret, salt);
    hash[..].ct_eq(expected_hash).into()
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Fresh API-key secret: 32 random bytes, URL-safe base64 without padding.
pub fn generate_api_key_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
