//! SSH client handler and connection setup

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use tracing::{debug, info};

use super::{AuthStrategy, RusshSession, Target};
use crate::error::{EasySshError, Result};

/// Bound on dial + handshake + authentication
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SSH client handler
pub struct SshClient;

impl SshClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SshClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl client::Handler for SshClient {
    type Error = russh::Error;

    /// Host keys are accepted without verification
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // TODO: check against ~/.ssh/known_hosts once hostnames are supported as targets
        debug!(fingerprint = %server_public_key.fingerprint(), "accepting server key");
        Ok(true)
    }
}

/// Connect and authenticate, then open a session channel
///
/// The whole attempt is bounded by `timeout`. Any failure is returned as a
/// connection error and nothing is left open.
pub async fn connect(target: &Target, auth: &AuthStrategy, timeout: Duration) -> Result<RusshSession> {
    info!(target = %target, "connecting");

    let attempt = async {
        let config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        });

        let mut session = client::connect(config, target.socket_addr(), SshClient::new())
            .await
            .map_err(|e| EasySshError::Connection(e.to_string()))?;

        debug!("SSH handshake completed");

        auth.authenticate(&mut session, &target.user).await?;

        debug!("authenticated");

        RusshSession::open(session).await
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| EasySshError::Timeout(timeout.as_secs()))?
}
