//! Flat key/value backing store
//!
//! File format, one record per line:
//! ```text
//! # comment
//! root@10.0.0.1:22 AXN0b3JlZC1jaXBoZXJ0ZXh0...
//! admin@[::1]:2222 = AXN0b3JlZC1jaXBoZXJ0ZXh0...
//! ```
//! The key is the first whitespace-delimited token, the value is the rest of
//! the line (a leading `=` is tolerated). Blank lines and `#`/`;` comments
//! are skipped.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Minimal key/value persistence the credential registry is built on
pub trait KeyValueStore: Sized {
    /// Parse the store at `path`
    fn load(path: &Path) -> Result<Self>;

    /// Keys in enumeration order
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    fn get(&self, key: &str) -> Option<&str>;

    /// Insert or replace; new keys go to the end of the enumeration
    fn set(&mut self, key: &str, value: &str);

    fn remove(&mut self, key: &str) -> Option<String>;

    /// Write the whole store to `path`
    fn save_to(&self, path: &Path) -> Result<()>;
}

/// Line-oriented store preserving first-occurrence order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatFileStore {
    entries: Vec<(String, String)>,
}

impl FlatFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse store contents
    ///
    /// A key that occurs more than once keeps the position of its first
    /// line and the value of its last one.
    pub fn parse(content: &str) -> Self {
        let mut store = Self::new();
        for line in content.lines() {
            if let Some((key, value)) = parse_line(line) {
                store.set(key, value);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(&format_line(key, value));
        }
        out
    }
}

impl KeyValueStore for FlatFileStore {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.entries.iter().map(|(k, _)| k.as_str()))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Write to a sibling temp file, fsync, then rename over `path`
    fn save_to(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path);

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(self.render().as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        };

        write().map_err(|e| {
            fs::remove_file(&tmp).ok();
            e.into()
        })
    }
}

/// Split one line into `(key, value)`; `None` for blanks and comments
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return None;
    }

    match line.split_once(char::is_whitespace) {
        Some((key, rest)) => {
            let rest = rest.trim_start();
            let value = rest.strip_prefix('=').unwrap_or(rest).trim();
            Some((key, value))
        }
        None => Some((line, "")),
    }
}

/// Render one record as a line, including the trailing newline
pub fn format_line(key: &str, value: &str) -> String {
    format!("{} {}\n", key, value)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_line_forms() {
        assert_eq!(parse_line("root@1.2.3.4:22 abc=="), Some(("root@1.2.3.4:22", "abc==")));
        assert_eq!(parse_line("  k \t v w  "), Some(("k", "v w")));
        assert_eq!(parse_line("k = v"), Some(("k", "v")));
        assert_eq!(parse_line("lonely"), Some(("lonely", "")));
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("; comment"), None);
    }

    #[test]
    fn test_parse_keeps_file_order() {
        let store = FlatFileStore::parse("b 2\na 1\nc 3\n");
        let keys: Vec<_> = store.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_keys_first_position_last_value() {
        let store = FlatFileStore::parse("dup first\nother x\ndup second\n");

        let keys: Vec<_> = store.keys().collect();
        assert_eq!(keys, ["dup", "other"]);
        assert_eq!(store.get("dup"), Some("second"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut store = FlatFileStore::parse("a 1\nb 2\n");
        store.set("a", "9");
        store.set("c", "3");

        let keys: Vec<_> = store.keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(store.get("a"), Some("9"));
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("servers.conf");

        let mut store = FlatFileStore::new();
        store.set("root@10.0.0.1:22", "c2VjcmV0");
        store.set("admin@[::1]:2222", "b3RoZXI=");
        store.save_to(&path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "root@10.0.0.1:22 c2VjcmV0\nadmin@[::1]:2222 b3RoZXI=\n"
        );
        assert_eq!(FlatFileStore::load(&path).unwrap(), store);
        assert!(!temp.path().join("servers.conf.tmp").exists());
    }

    #[test]
    fn test_save_to_missing_dir_fails() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing").join("servers.conf");

        assert!(FlatFileStore::new().save_to(&path).is_err());
    }
}
