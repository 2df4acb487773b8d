//! Cryptographic primitives for easy-ssh
//!
//! This module provides:
//! - The persisted installation key (`CipherKey`)
//! - Argon2id stretching of the raw key into a cipher key
//! - ChaCha20-Poly1305 sealing of stored passwords
//! - Secure memory handling with automatic zeroing

mod argon;
mod chacha;
mod cipher_key;
mod secure_bytes;

pub use chacha::{decrypt, encrypt};
pub use cipher_key::{CipherKey, KEY_LEN_CHARS};
pub use secure_bytes::SecureBytes;

/// Current version of the sealed password format
pub const FORMAT_VERSION: u8 = 1;
