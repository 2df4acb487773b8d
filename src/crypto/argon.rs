//! Argon2id stretching of the raw key file
//!
//! The key file holds arbitrary bytes (normally 32 alphanumeric characters).
//! ChaCha20-Poly1305 needs exactly 32 bytes, so the raw material is run
//! through Argon2id once per process to get a key of the right shape.

use argon2::{Algorithm, Argon2, Params, Version};

use super::SecureBytes;
use crate::error::{EasySshError, Result};

/// Derived key length in bytes (256 bits for ChaCha20)
pub const KEY_LEN: usize = 32;

/// Fixed domain-separation salt. The input is already random, so the salt
/// only needs to tie derived keys to this tool.
const DOMAIN_SALT: &[u8] = b"easy-ssh/servers.conf/v1";

/// Argon2id parameters (OWASP minimum profile)
/// - Memory: 19 MB (19456 KB)
/// - Iterations: 2
/// - Parallelism: 1
const MEMORY_COST: u32 = 19456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

/// Stretch raw key-file bytes into a 32-byte cipher key
pub fn derive_cipher_key(raw: &[u8]) -> Result<SecureBytes> {
    if raw.is_empty() {
        return Err(EasySshError::Config("Key material is empty".into()));
    }

    let params = Params::new(MEMORY_COST, TIME_COST, PARALLELISM, Some(KEY_LEN))
        .map_err(|e| EasySshError::Other(format!("Argon2 params error: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key_bytes = vec![0u8; KEY_LEN];
    argon2
        .hash_password_into(raw, DOMAIN_SALT, &mut key_bytes)
        .map_err(|e| EasySshError::Other(format!("Key derivation failed: {}", e)))?;

    Ok(SecureBytes::new(key_bytes))
}
