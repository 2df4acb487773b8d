//! The installation-wide symmetric key
//!
//! Generated once on first run and persisted verbatim to the key file.
//! Subsequent loads only read it; nothing in the crate rotates or rewrites it.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use tracing::{debug, info};

use super::{argon, SecureBytes};
use crate::error::{EasySshError, Result};

/// Length of a freshly generated key, in characters
pub const KEY_LEN_CHARS: usize = 32;

/// Raw key-file bytes plus the cipher key stretched from them
pub struct CipherKey {
    raw: SecureBytes,
    cipher: SecureBytes,
}

impl CipherKey {
    /// Build a key from raw key-file bytes
    pub fn from_raw(raw: Vec<u8>) -> Result<Self> {
        let raw = SecureBytes::new(raw);
        let cipher = argon::derive_cipher_key(&raw)?;
        Ok(Self { raw, cipher })
    }

    /// The bytes exactly as stored in the key file
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The 32-byte key handed to ChaCha20-Poly1305
    pub(crate) fn cipher_bytes(&self) -> &[u8] {
        &self.cipher
    }

    /// Load the key at `path`, generating and persisting one if it is absent
    ///
    /// The existing file is returned verbatim; the only check is that it is
    /// not empty. A new key is written with `create_new`, so a concurrent or
    /// repeated load can never overwrite a key that already exists.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(raw) => {
                if raw.is_empty() {
                    return Err(EasySshError::Config(format!(
                        "Key file {} is empty",
                        path.display()
                    )));
                }
                debug!(path = %path.display(), "loaded cipher key");
                Self::from_raw(raw)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let raw = generate_key_material();
                match write_new_key(path, &raw) {
                    Ok(()) => {
                        info!(path = %path.display(), "generated new cipher key");
                        Self::from_raw(raw)
                    }
                    // Another process won the race; use its key
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => Self::load(path),
                    Err(e) => Err(EasySshError::Config(format!(
                        "Cannot write key file {}: {}",
                        path.display(),
                        e
                    ))),
                }
            }
            Err(e) => Err(EasySshError::Config(format!(
                "Cannot read key file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("raw_len", &self.raw.len())
            .finish_non_exhaustive()
    }
}

/// 32 alphanumeric characters drawn from the OS CSPRNG
fn generate_key_material() -> Vec<u8> {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN_CHARS)
        .collect()
}

fn write_new_key(path: &Path, raw: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(raw)?;
    file.sync_all()
}
