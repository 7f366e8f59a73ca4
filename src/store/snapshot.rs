// src/store/snapshot.rs
// =============================================================================
// Raw listing payloads, one file per (subcategory, page).
//
// The file name is derived from the subcategory path and the page number:
//   "/garden-tables/teak", page 3  ->  data/garden-tables%2Fteak-page-3.json
//
// A snapshot that exists is complete (files are written atomically), so its
// presence alone tells the crawler the page was already fetched.
// =============================================================================

use crate::config::write_atomic;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use url::form_urlencoded;

pub trait SnapshotStore {
    /// Whether the page has already been saved
    fn exists(&self, subcategory: &str, page: u32) -> bool;

    /// Saves the raw payload of a page
    fn save(&self, subcategory: &str, page: u32, payload: &str) -> Result<()>;
}

// Builds the snapshot file name for a subcategory page
//
// The leading '/' is dropped ("/sofas" and "sofas" are the same page) and
// the rest is form-urlencoded. The encoding is reversible, so two different
// paths never share a file.
pub fn snapshot_file_name(subcategory: &str, page: u32) -> String {
    let slug: String =
        form_urlencoded::byte_serialize(subcategory.trim_start_matches('/').as_bytes()).collect();
    format!("{}-page-{}.json", slug, page)
}

// Snapshots stored as files in the data/ directory
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSnapshotStore { dir: dir.into() }
    }

    fn path(&self, subcategory: &str, page: u32) -> PathBuf {
        self.dir.join(snapshot_file_name(subcategory, page))
    }

    // Lists every snapshot file, sorted by name for a deterministic order
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            // Leftovers of an interrupted write are not snapshots
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn exists(&self, subcategory: &str, page: u32) -> bool {
        self.path(subcategory, page).exists()
    }

    fn save(&self, subcategory: &str, page: u32, payload: &str) -> Result<()> {
        write_atomic(&self.path(subcategory, page), payload.as_bytes())
    }
}

// In-memory snapshots for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemorySnapshotStore {
    pages: std::sync::Mutex<std::collections::BTreeMap<(String, u32), String>>,
}

#[cfg(test)]
impl MemorySnapshotStore {
    /// Page numbers saved for a subcategory, ascending
    pub fn pages(&self, subcategory: &str) -> Vec<u32> {
        self.pages
            .lock()
            .unwrap()
            .keys()
            .filter(|(sub, _)| sub == subcategory)
            .map(|(_, page)| *page)
            .collect()
    }
}

#[cfg(test)]
impl SnapshotStore for MemorySnapshotStore {
    fn exists(&self, subcategory: &str, page: u32) -> bool {
        self.pages
            .lock()
            .unwrap()
            .contains_key(&(subcategory.to_string(), page))
    }

    fn save(&self, subcategory: &str, page: u32, payload: &str) -> Result<()> {
        self.pages
            .lock()
            .unwrap()
            .insert((subcategory.to_string(), page), payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_path() {
        assert_eq!(snapshot_file_name("/sofas", 1), "sofas-page-1.json");
        assert_eq!(
            snapshot_file_name("/garden-tables/teak", 3),
            "garden-tables%2Fteak-page-3.json"
        );
        assert_eq!(
            snapshot_file_name("/chairs?color=red", 2),
            "chairs%3Fcolor%3Dred-page-2.json"
        );
    }

    #[test]
    fn test_similar_paths_get_distinct_files() {
        let paths = ["/chairs/red", "/chairs?red", "/chairs_red", "/chairs%2Fred", "/chairs red"];
        let names: std::collections::HashSet<String> =
            paths.iter().map(|p| snapshot_file_name(p, 1)).collect();
        assert_eq!(names.len(), paths.len());

        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store.save("/chairs/red", 1, "red chairs").unwrap();
        assert!(store.exists("/chairs/red", 1));
        assert!(!store.exists("/chairs?red", 1));
        assert!(!store.exists("/chairs_red", 1));
    }

    #[test]
    fn test_save_marks_page_as_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        assert!(!store.exists("/sofas", 1));
        store.save("/sofas", 1, "payload").unwrap();
        assert!(store.exists("/sofas", 1));
        assert!(!store.exists("/sofas", 2));

        let saved = fs::read_to_string(dir.path().join("sofas-page-1.json")).unwrap();
        assert_eq!(saved, "payload");
    }

    #[test]
    fn test_list_is_sorted_and_skips_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store.save("/sofas", 2, "b").unwrap();
        store.save("/chairs", 1, "a").unwrap();
        fs::write(dir.path().join("sofas-page-3.json.tmp"), "partial").unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["chairs-page-1.json", "sofas-page-2.json"]);
    }
}
