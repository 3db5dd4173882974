//! Password transform expected by the device broker.
//!
//! The broker on the fan does not accept the password printed on the sticker.
//! It wants the base64 (standard alphabet, padded) encoding of its SHA-512
//! digest. No salt, no rounds.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha512};

/// Hashes a plaintext device password into the broker credential.
pub fn hash_password(plaintext: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(plaintext.as_bytes());
    STANDARD.encode(hasher.finalize())
}
