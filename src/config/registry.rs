//! Indexed registry of encrypted host passwords
//!
//! Indices are a presentation-only ordinal: the position of an alias in the
//! backing store's current enumeration. They are recomputed on every load and
//! are not a durable identifier.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::store::{self, FlatFileStore, KeyValueStore};
use super::SERVERS_FILE;
use crate::error::{EasySshError, Result};

/// In-memory mirror of `servers.conf`
#[derive(Debug)]
pub struct CredentialRegistry<S: KeyValueStore = FlatFileStore> {
    path: PathBuf,
    store: S,
}

impl<S: KeyValueStore> CredentialRegistry<S> {
    /// Ensure `work_dir` and its store file exist, then load every entry
    pub fn open(work_dir: &Path) -> Result<Self> {
        fs::create_dir_all(work_dir).map_err(|e| {
            EasySshError::Config(format!(
                "Cannot create work directory {}: {}",
                work_dir.display(),
                e
            ))
        })?;

        let path = work_dir.join(SERVERS_FILE);
        if !path.exists() {
            fs::File::create(&path)?;
            info!(path = %path.display(), "created empty server store");
        }

        let store = S::load(&path)?;
        debug!(path = %path.display(), "loaded server store");

        Ok(Self { path, store })
    }

    /// Path of the backing store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(index, alias)` pairs in enumeration order
    ///
    /// Lazy and restartable: call again for a fresh pass.
    pub fn list(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.store.keys().enumerate()
    }

    pub fn len(&self) -> usize {
        self.store.keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.keys().next().is_none()
    }

    /// Alias and encrypted password at `index` in the current enumeration
    pub fn resolve_by_index(&self, index: usize) -> Result<(&str, &str)> {
        let alias = self
            .list()
            .find(|(i, _)| *i == index)
            .map(|(_, alias)| alias)
            .ok_or(EasySshError::NotFound(index))?;

        let encrypted = self.store.get(alias).unwrap_or_default();
        Ok((alias, encrypted))
    }

    /// Encrypted password stored for `alias`
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.store.get(alias)
    }

    /// Insert or replace `alias`, then durably save the whole store
    ///
    /// On a failed save the in-memory state is rolled back so it never
    /// diverges from the file.
    pub fn upsert(&mut self, alias: &str, encrypted: &str) -> Result<()> {
        let previous = self.store.get(alias).map(str::to_owned);
        self.store.set(alias, encrypted);

        if let Err(e) = self.store.save_to(&self.path) {
            match previous {
                Some(value) => self.store.set(alias, &value),
                None => {
                    self.store.remove(alias);
                }
            }
            return Err(e);
        }

        debug!(alias, "saved credential");
        Ok(())
    }
}

impl CredentialRegistry {
    /// Append one `alias encrypted` line to `target_dir/servers.conf`
    ///
    /// Bypasses loading entirely, so duplicates may accumulate as separate
    /// lines. On the next load the alias is listed at its first position and
    /// carries the value of its last line.
    pub fn append_raw(alias: &str, encrypted: &str, target_dir: &Path) -> Result<()> {
        if alias.is_empty() || alias.contains(char::is_whitespace) {
            return Err(EasySshError::Other(format!(
                "Alias '{}' must be a single non-empty token",
                alias
            )));
        }

        let path = target_dir.join(SERVERS_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut line = String::new();
        if !ends_with_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(&store::format_line(alias, encrypted));

        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        debug!(alias, path = %path.display(), "appended raw credential line");
        Ok(())
    }
}

fn ends_with_newline(file: &mut fs::File) -> Result<bool> {
    let len = file.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path) -> CredentialRegistry {
        CredentialRegistry::open(dir).unwrap()
    }

    #[test]
    fn test_open_creates_dir_and_empty_store() {
        let temp = tempdir().unwrap();
        let work_dir = temp.path().join("nested").join(".easy-ssh");

        let registry = open(&work_dir);

        assert!(work_dir.join(SERVERS_FILE).is_file());
        assert_eq!(registry.list().count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_persists_across_reopen() {
        let temp = tempdir().unwrap();

        let mut registry = open(temp.path());
        registry.upsert("root@10.0.0.1:22", "ZW5jMQ==").unwrap();

        let reopened = open(temp.path());
        let listed: Vec<_> = reopened.list().collect();
        assert_eq!(listed, [(0, "root@10.0.0.1:22")]);
        assert_eq!(
            reopened.resolve_by_index(0).unwrap(),
            ("root@10.0.0.1:22", "ZW5jMQ==")
        );
    }

    #[test]
    fn test_upsert_replaces_existing_password() {
        let temp = tempdir().unwrap();

        let mut registry = open(temp.path());
        registry.upsert("a@1.1.1.1:22", "old").unwrap();
        registry.upsert("b@2.2.2.2:22", "other").unwrap();
        registry.upsert("a@1.1.1.1:22", "new").unwrap();

        let reopened = open(temp.path());
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.lookup("a@1.1.1.1:22"), Some("new"));
        assert_eq!(reopened.resolve_by_index(0).unwrap().0, "a@1.1.1.1:22");
    }

    #[test]
    fn test_resolve_missing_index() {
        let temp = tempdir().unwrap();
        let mut registry = open(temp.path());
        registry.upsert("a@1.1.1.1:22", "x").unwrap();

        assert!(matches!(
            registry.resolve_by_index(1),
            Err(EasySshError::NotFound(1))
        ));
    }

    #[test]
    fn test_indices_follow_current_enumeration() {
        let temp = tempdir().unwrap();
        let mut registry = open(temp.path());
        registry.upsert("b@2.2.2.2:22", "x").unwrap();
        assert_eq!(registry.resolve_by_index(0).unwrap().0, "b@2.2.2.2:22");

        // An out-of-band edit puts a new alias first; every index shifts
        fs::write(
            registry.path(),
            "a@1.1.1.1:22 y\nb@2.2.2.2:22 x\n",
        )
        .unwrap();

        let reopened = open(temp.path());
        assert_eq!(reopened.resolve_by_index(0).unwrap().0, "a@1.1.1.1:22");
        assert_eq!(reopened.resolve_by_index(1).unwrap().0, "b@2.2.2.2:22");
    }

    #[test]
    fn test_append_raw_and_duplicates() {
        let temp = tempdir().unwrap();

        CredentialRegistry::append_raw("root@10.0.0.1:22", "first", temp.path()).unwrap();
        CredentialRegistry::append_raw("root@10.0.0.2:22", "other", temp.path()).unwrap();
        CredentialRegistry::append_raw("root@10.0.0.1:22", "second", temp.path()).unwrap();

        let registry = open(temp.path());
        let listed: Vec<_> = registry.list().collect();
        assert_eq!(listed, [(0, "root@10.0.0.1:22"), (1, "root@10.0.0.2:22")]);
        assert_eq!(registry.lookup("root@10.0.0.1:22"), Some("second"));
    }

    #[test]
    fn test_append_raw_after_unterminated_line() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(SERVERS_FILE), "a@1.1.1.1:22 x").unwrap();

        CredentialRegistry::append_raw("b@2.2.2.2:22", "y", temp.path()).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join(SERVERS_FILE)).unwrap(),
            "a@1.1.1.1:22 x\nb@2.2.2.2:22 y\n"
        );
    }

    #[test]
    fn test_append_raw_rejects_bad_alias() {
        let temp = tempdir().unwrap();
        assert!(CredentialRegistry::append_raw("two words", "x", temp.path()).is_err());
        assert!(CredentialRegistry::append_raw("", "x", temp.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_save_rolls_back() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let mut registry = open(temp.path());
        registry.upsert("a@1.1.1.1:22", "kept").unwrap();

        // Saving needs a temp file next to the store
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o500)).unwrap();
        let marker = temp.path().join("marker");
        if fs::File::create(&marker).is_ok() {
            // Running as root; permissions are not enforced
            fs::remove_file(&marker).ok();
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o700)).unwrap();
            return;
        }

        assert!(registry.upsert("a@1.1.1.1:22", "lost").is_err());
        assert!(registry.upsert("b@2.2.2.2:22", "lost").is_err());
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o700)).unwrap();

        assert_eq!(registry.lookup("a@1.1.1.1:22"), Some("kept"));
        assert_eq!(registry.lookup("b@2.2.2.2:22"), None);
        assert_eq!(registry.len(), 1);
    }
}
