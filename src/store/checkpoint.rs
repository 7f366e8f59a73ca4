// src/store/checkpoint.rs
// =============================================================================
// Completion ledgers for the catalog traversal.
//
// Each traversal level has its own text file with one name per line. A name
// is appended only once the node's whole subtree has been processed, so
// finding it on the next run means the subtree can be skipped.
//
// Ledgers are never rewritten. Duplicate lines are harmless because lookups
// only test membership.
// =============================================================================

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

// The traversal levels that keep a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Site,
    Group,
    Category,
    Subcategory,
}

impl Level {
    /// File name of the level's ledger under the output root
    pub fn ledger_name(self) -> &'static str {
        match self {
            Level::Site => "site.txt",
            Level::Group => "group_categories.txt",
            Level::Category => "categories.txt",
            Level::Subcategory => "sub_categories.txt",
        }
    }
}

pub trait CheckpointStore {
    /// Whether `name` has been fully processed at `level`
    fn is_finished(&self, level: Level, name: &str) -> Result<bool>;

    /// Records `name` as fully processed at `level`
    fn mark_finished(&self, level: Level, name: &str) -> Result<()>;
}

// Ledgers stored as text files under the output root
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileCheckpointStore { root: root.into() }
    }

    fn ledger(&self, level: Level) -> PathBuf {
        self.root.join(level.ledger_name())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn is_finished(&self, level: Level, name: &str) -> Result<bool> {
        let path = self.ledger(level);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            // No ledger yet: nothing finished at this level
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        Ok(contents.lines().any(|line| line.trim() == name))
    }

    fn mark_finished(&self, level: Level, name: &str) -> Result<()> {
        append_line(&self.ledger(level), name)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}", line).with_context(|| format!("Failed to append to {}", path.display()))?;
    Ok(())
}

// In-memory ledgers for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: std::sync::Mutex<Vec<(Level, String)>>,
}

#[cfg(test)]
impl MemoryCheckpointStore {
    /// Names recorded at a level, in completion order
    pub fn finished(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

#[cfg(test)]
impl CheckpointStore for MemoryCheckpointStore {
    fn is_finished(&self, level: Level, name: &str) -> Result<bool> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().any(|(l, n)| *l == level && n == name))
    }

    fn mark_finished(&self, level: Level, name: &str) -> Result<()> {
        self.entries.lock().unwrap().push((level, name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_is_not_finished() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(!store.is_finished(Level::Group, "/garden").unwrap());
    }

    #[test]
    fn test_mark_then_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.mark_finished(Level::Category, "/garden-tables").unwrap();

        assert!(store.is_finished(Level::Category, "/garden-tables").unwrap());
        // Levels do not share ledgers
        assert!(!store.is_finished(Level::Subcategory, "/garden-tables").unwrap());
        // Membership is exact, not a prefix match
        assert!(!store.is_finished(Level::Category, "/garden").unwrap());
    }

    #[test]
    fn test_ledger_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.mark_finished(Level::Subcategory, "/sofas").unwrap();
        store.mark_finished(Level::Subcategory, "/chairs").unwrap();
        store.mark_finished(Level::Subcategory, "/sofas").unwrap();

        let ledger = fs::read_to_string(dir.path().join("sub_categories.txt")).unwrap();
        assert_eq!(ledger, "/sofas\n/chairs\n/sofas\n");
        assert!(store.is_finished(Level::Subcategory, "/sofas").unwrap());
    }

    #[test]
    fn test_state_survives_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        FileCheckpointStore::new(dir.path())
            .mark_finished(Level::Group, "/pools")
            .unwrap();

        let reopened = FileCheckpointStore::new(dir.path());
        assert!(reopened.is_finished(Level::Group, "/pools").unwrap());
    }
}
