//! Cursor persistence.
//!
//! The progress file holds one decimal number: the largest row id exported
//! so far. It is truncated and rewritten on every checkpoint. A missing or
//! unreadable file is a recovered condition (the export starts from 0); a
//! failed write is fatal, since losing the checkpoint risks duplicate
//! export on the next run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

/// File-backed store for the export cursor.
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Last persisted cursor, or 0 if the file is missing, empty or not a
    /// number. Never fails.
    pub fn load(&self) -> u64 {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                info!(
                    "No valid progress file found at '{}', starting from 0",
                    self.path.display()
                );
                return 0;
            }
        };

        match content.trim().parse() {
            Ok(cursor) => cursor,
            Err(_) => {
                info!(
                    "Progress file '{}' does not contain a number, starting from 0",
                    self.path.display()
                );
                0
            }
        }
    }

    /// Overwrite the file with the decimal form of `cursor`.
    pub fn save(&self, cursor: u64) -> Result<()> {
        std::fs::write(&self.path, cursor.to_string()).with_context(|| {
            format!(
                "failed to persist progress to '{}' (cursor {cursor})",
                self.path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_zero() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("missing.progress"));
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn corrupt_file_loads_as_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.progress");

        std::fs::write(&path, "not a number").unwrap();
        assert_eq!(ProgressStore::new(&path).load(), 0);

        std::fs::write(&path, "").unwrap();
        assert_eq!(ProgressStore::new(&path).load(), 0);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("coord-dump.progress"));

        store.save(2500).unwrap();
        assert_eq!(store.load(), 2500);

        // A later checkpoint overwrites, no trailing structure.
        store.save(4000).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "4000");
    }

    #[test]
    fn load_tolerates_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p");
        std::fs::write(&path, "500\n").unwrap();
        assert_eq!(ProgressStore::new(&path).load(), 500);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("no-such-dir").join("p"));
        assert!(store.save(1).is_err());
    }
}
