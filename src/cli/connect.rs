//! Connecting to a stored or literal target

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::config::{AppContext, CredentialRegistry};
use crate::crypto::{self, CipherKey};
use crate::error::{EasySshError, Result};
use crate::ssh::{self, AuthStrategy, RawModeGuard, RemoteSession, ShellExit, Target};

use super::{list, prompt_index, prompt_secret};

/// Which server to connect to
pub enum Selection {
    /// List stored servers and ask for an index
    Interactive,
    /// A `[user@]host[:port]` literal from `--add`
    Literal(String),
}

pub struct ConnectOptions {
    /// Private key file; selects public-key instead of password auth
    pub identity: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            identity: None,
            timeout: ssh::CONNECT_TIMEOUT,
        }
    }
}

/// A target together with its registry alias and stored ciphertext
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target: Target,
    pub alias: String,
    pub stored: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    Stored,
    Prompted,
}

pub struct ResolvedPassword {
    pub secret: SecretString,
    pub source: PasswordSource,
}

pub fn run(ctx: &mut AppContext, selection: Selection, options: ConnectOptions) -> Result<()> {
    let resolved = match selection {
        Selection::Interactive => {
            if ctx.registry.is_empty() {
                println!(
                    "No servers stored yet. Connect with {} to add one.",
                    "easy-ssh --add user@host:port".cyan()
                );
                return Ok(());
            }
            list::print(&ctx.registry);
            let index = prompt_index()?;
            resolve_index(&ctx.registry, index)?
        }
        Selection::Literal(literal) => resolve_literal(&ctx.registry, &literal)?,
    };

    let auth = match &options.identity {
        Some(path) => AuthStrategy::from_key_file(path, || prompt_secret("Key passphrase: "))?,
        None => {
            let password = resolve_password(resolved.stored.as_deref(), &ctx.key, || {
                prompt_secret("Password: ")
            })?;
            debug!(source = ?password.source, "password resolved");
            AuthStrategy::Password(password.secret)
        }
    };

    println!("{} {}", "Connecting to".cyan(), resolved.target.alias().bold());

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| EasySshError::Other(format!("Failed to create async runtime: {}", e)))?;

    let shell_result = runtime.block_on(launch(
        &mut ctx.registry,
        &ctx.key,
        &resolved.alias,
        &auth,
        ssh::connect(&resolved.target, &auth, options.timeout),
        RawModeGuard::enable,
    ));

    match shell_result {
        Ok(exit) => {
            debug!(?exit, "session ended");
            println!();
            println!(
                "{}",
                format!("Connection to {} closed.", resolved.target.alias()).green()
            );
            Ok(())
        }
        Err(EasySshError::Cancelled) => {
            println!();
            println!("{}", "Session terminated.".yellow());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Connect, run the interactive shell, then save the password that was used
///
/// A failed connect returns before anything is saved. Once connected, the
/// password is saved whatever the shell outcome; if saving fails after a
/// shell error, the shell error is the one returned.
pub async fn launch<S, G>(
    registry: &mut CredentialRegistry,
    key: &CipherKey,
    alias: &str,
    auth: &AuthStrategy,
    connect: impl Future<Output = Result<S>>,
    enter_raw_mode: impl FnOnce() -> Result<G>,
) -> Result<ShellExit>
where
    S: RemoteSession,
{
    let mut session = connect.await?;
    let shell_result = ssh::run_interactive_shell(&mut session, enter_raw_mode).await;

    if let Some(password) = auth.password() {
        if let Err(e) = save_on_exit(registry, key, alias, password) {
            if shell_result.is_ok() {
                return Err(e);
            }
            warn!(alias, "could not save password: {}", e);
        }
    }

    shell_result
}

/// Target for the entry at `index`, keeping its stored alias
pub fn resolve_index(registry: &CredentialRegistry, index: usize) -> Result<ResolvedTarget> {
    let (alias, stored) = registry.resolve_by_index(index)?;
    let target = ssh::parse_target_literal(alias)?;

    Ok(ResolvedTarget {
        target,
        alias: alias.to_string(),
        stored: Some(stored.to_string()).filter(|s| !s.is_empty()),
    })
}

/// Target for an `--add` literal
///
/// An entry stored under the literal itself wins; otherwise the canonical
/// `user@host:port` alias is used for both lookup and saving.
pub fn resolve_literal(registry: &CredentialRegistry, literal: &str) -> Result<ResolvedTarget> {
    let target = ssh::parse_target_literal(literal)?;

    let (alias, stored) = match registry.lookup(literal) {
        Some(stored) => (literal.to_string(), Some(stored)),
        None => {
            let alias = target.alias();
            let stored = registry.lookup(&alias);
            (alias, stored)
        }
    };

    Ok(ResolvedTarget {
        target,
        alias,
        stored: stored.filter(|s| !s.is_empty()).map(str::to_owned),
    })
}

/// Decrypt the stored password, falling back to `prompt`
///
/// A ciphertext that fails to decrypt (corrupted, or sealed under a previous
/// key) is not fatal; the user is simply asked again.
pub fn resolve_password(
    stored: Option<&str>,
    key: &CipherKey,
    prompt: impl FnOnce() -> Result<SecretString>,
) -> Result<ResolvedPassword> {
    if let Some(sealed) = stored {
        match crypto::decrypt(sealed, key) {
            Ok(plaintext) => match plaintext.to_utf8_string() {
                Some(password) => {
                    return Ok(ResolvedPassword {
                        secret: SecretString::new(password),
                        source: PasswordSource::Stored,
                    })
                }
                None => warn!("stored password is not valid UTF-8, prompting"),
            },
            Err(e) if e.is_crypto() => warn!("stored password unusable ({}), prompting", e),
            Err(e) => return Err(e),
        }
    }

    Ok(ResolvedPassword {
        secret: prompt()?,
        source: PasswordSource::Prompted,
    })
}

/// Re-encrypt the password that was used and store it under `alias`
pub fn save_on_exit(
    registry: &mut CredentialRegistry,
    key: &CipherKey,
    alias: &str,
    password: &SecretString,
) -> Result<()> {
    let sealed = crypto::encrypt(password.expose_secret().as_bytes(), key)?;
    registry.upsert(alias, &sealed)
}
