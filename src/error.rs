use thiserror::Error;

pub type Result<T> = std::result::Result<T, EasySshError>;

#[derive(Debug, Error)]
pub enum EasySshError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid target '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    #[error("Invalid index '{0}'")]
    InvalidIndex(String),

    #[error("No server with index {0}")]
    NotFound(usize),

    #[error("Decryption failed: stored data is corrupted or was encrypted under another key")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("SSH connection failed: {0}")]
    Connection(String),

    #[error("SSH connection timed out after {0}s")]
    Timeout(u64),

    #[error("SSH authentication rejected")]
    AuthRejected,

    #[error("Remote server can run neither bash nor sh")]
    ShellUnavailable,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl EasySshError {
    pub(crate) fn invalid_target(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Decryption failures are recovered by prompting instead of aborting.
    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::DecryptionFailed | Self::EncryptionFailed(_))
    }
}
