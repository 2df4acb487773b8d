//! Configuration management for easy-ssh
//!
//! Everything lives in one work directory:
//! - `servers.conf`: aliases and their encrypted passwords
//! - `.key`: the installation cipher key

mod registry;
mod store;

use std::path::PathBuf;

pub use registry::CredentialRegistry;
pub use store::{FlatFileStore, KeyValueStore};

use crate::crypto::CipherKey;
use crate::error::{EasySshError, Result};

pub const SERVERS_FILE: &str = "servers.conf";
pub const KEY_FILE: &str = ".key";
const WORK_DIR_NAME: &str = ".easy-ssh";

/// Default work directory: `$HOME/.easy-ssh`
pub fn default_work_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(WORK_DIR_NAME))
        .ok_or_else(|| EasySshError::Config("Cannot determine home directory".into()))
}

/// Process-wide state, built once in `main` and passed down explicitly
pub struct AppContext {
    pub work_dir: PathBuf,
    pub key: CipherKey,
    pub registry: CredentialRegistry,
}

impl AppContext {
    /// Open the registry (creating the work dir and store if needed) and
    /// load or generate the cipher key
    pub fn open(work_dir: impl Into<PathBuf>) -> Result<Self> {
        let work_dir = work_dir.into();
        let registry = CredentialRegistry::open(&work_dir)?;
        let key = CipherKey::load(&work_dir.join(KEY_FILE))?;

        Ok(Self {
            work_dir,
            key,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use tempfile::tempdir;

    #[test]
    fn test_fresh_work_dir() {
        let temp = tempdir().unwrap();
        let work_dir = temp.path().join(WORK_DIR_NAME);

        let ctx = AppContext::open(&work_dir).unwrap();

        assert!(work_dir.join(SERVERS_FILE).is_file());
        assert_eq!(std::fs::read(ctx.work_dir.join(KEY_FILE)).unwrap().len(), 32);
        assert_eq!(ctx.registry.list().count(), 0);
    }

    #[test]
    fn test_upsert_then_reopen() {
        let temp = tempdir().unwrap();

        let mut ctx = AppContext::open(temp.path()).unwrap();
        let sealed = crypto::encrypt(b"s3cret", &ctx.key).unwrap();
        ctx.registry.upsert("root@10.0.0.1:22", &sealed).unwrap();
        drop(ctx);

        let ctx = AppContext::open(temp.path()).unwrap();
        let listed: Vec<_> = ctx.registry.list().collect();
        assert_eq!(listed, [(0, "root@10.0.0.1:22")]);

        let (_, stored) = ctx.registry.resolve_by_index(0).unwrap();
        assert_eq!(stored, sealed);
        assert_eq!(&*crypto::decrypt(stored, &ctx.key).unwrap(), b"s3cret");
    }
}
