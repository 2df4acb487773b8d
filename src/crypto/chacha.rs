//! ChaCha20-Poly1305 authenticated encryption of stored passwords
//!
//! Stored values are text, so the sealed blob is base64-encoded:
//! [1 byte: format version][12 bytes: nonce][N bytes: ciphertext + 16-byte tag]
//!
//! The Poly1305 tag makes a ciphertext from a different key (for example after
//! the key file was regenerated) fail loudly instead of decrypting to garbage.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use super::{CipherKey, SecureBytes, FORMAT_VERSION};
use crate::error::{EasySshError, Result};

/// Nonce length for ChaCha20-Poly1305 (96 bits)
const NONCE_LEN: usize = 12;

/// Authentication tag length (128 bits)
const TAG_LEN: usize = 16;

const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Encrypt `plaintext` under `key` and return the base64 text form
///
/// A fresh random nonce is used on every call, so encrypting the same
/// password twice never yields the same text.
pub fn encrypt(plaintext: &[u8], key: &CipherKey) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(key.cipher_bytes())
        .map_err(|e| EasySshError::EncryptionFailed(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| EasySshError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.push(FORMAT_VERSION);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(sealed))
}

/// Decrypt the base64 text produced by [`encrypt`]
///
/// # Errors
/// Returns `DecryptionFailed` if:
/// - the text is not valid base64
/// - the version byte is unknown or the blob is too short
/// - authentication tag verification fails (wrong key or tampered data)
pub fn decrypt(ciphertext: &str, key: &CipherKey) -> Result<SecureBytes> {
    let sealed = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| EasySshError::DecryptionFailed)?;

    if sealed.len() < HEADER_LEN + TAG_LEN || sealed[0] != FORMAT_VERSION {
        return Err(EasySshError::DecryptionFailed);
    }

    let nonce = Nonce::from_slice(&sealed[1..HEADER_LEN]);

    let cipher = ChaCha20Poly1305::new_from_slice(key.cipher_bytes())
        .map_err(|_| EasySshError::DecryptionFailed)?;

    let plaintext = cipher
        .decrypt(nonce, &sealed[HEADER_LEN..])
        .map_err(|_| EasySshError::DecryptionFailed)?;

    Ok(SecureBytes::new(plaintext))
}
