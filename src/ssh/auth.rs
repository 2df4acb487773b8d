//! Authentication strategies

use std::path::Path;
use std::sync::Arc;

use russh::client;
use russh_keys::key::KeyPair;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::SshClient;
use crate::error::{EasySshError, Result};

/// How to authenticate against the remote host
pub enum AuthStrategy {
    /// Password authentication (the default flow)
    Password(SecretString),
    /// Public-key authentication with a decoded private key
    PublicKey(Arc<KeyPair>),
}

impl AuthStrategy {
    /// Read and decode a private key file for public-key authentication
    ///
    /// `passphrase` is only called when the key turns out to be encrypted.
    /// A key that cannot be decoded fails here, before any network activity.
    pub fn from_key_file(
        path: &Path,
        passphrase: impl FnOnce() -> Result<SecretString>,
    ) -> Result<Self> {
        let key_pem = SecretString::new(std::fs::read_to_string(path).map_err(|e| {
            EasySshError::Config(format!("Cannot read identity {}: {}", path.display(), e))
        })?);

        let keypair = match russh_keys::decode_secret_key(key_pem.expose_secret(), None) {
            Ok(keypair) => keypair,
            Err(russh_keys::Error::KeyIsEncrypted) => {
                let passphrase = passphrase()?;
                russh_keys::decode_secret_key(
                    key_pem.expose_secret(),
                    Some(passphrase.expose_secret().as_str()),
                )
                .map_err(|e| invalid_key(path, e))?
            }
            Err(e) => return Err(invalid_key(path, e)),
        };

        Ok(Self::PublicKey(Arc::new(keypair)))
    }

    /// The password to persist after the session, if this is password auth
    pub fn password(&self) -> Option<&SecretString> {
        match self {
            Self::Password(secret) => Some(secret),
            Self::PublicKey(_) => None,
        }
    }

    /// Run this strategy on an established transport
    pub(super) async fn authenticate(
        &self,
        session: &mut client::Handle<SshClient>,
        user: &str,
    ) -> Result<()> {
        let accepted = match self {
            Self::Password(password) => {
                debug!(user, "authenticating with password");
                session
                    .authenticate_password(user, password.expose_secret().as_str())
                    .await
                    .map_err(|e| EasySshError::Connection(e.to_string()))?
            }
            Self::PublicKey(keypair) => {
                debug!(user, "authenticating with public key");
                session
                    .authenticate_publickey(user, Arc::clone(keypair))
                    .await
                    .map_err(|e| EasySshError::Connection(e.to_string()))?
            }
        };

        if !accepted {
            return Err(EasySshError::AuthRejected);
        }
        Ok(())
    }
}

fn invalid_key(path: &Path, e: russh_keys::Error) -> EasySshError {
    EasySshError::Config(format!("Invalid private key {}: {}", path.display(), e))
}
