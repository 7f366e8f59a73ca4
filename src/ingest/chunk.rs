// src/ingest/chunk.rs
// =============================================================================
// Converts saved snapshots into partial tables, one chunk at a time.
//
// How it works:
// 1. Sort the snapshot files and cut them into chunks of CHUNK_SIZE
// 2. Skip every chunk whose output already exists
// 3. Otherwise repair and decode each file, drop the files that fail,
//    project the records, deduplicate, and save the chunk's table
//
// After a crash at most one chunk is redone, and a corrupt file only costs
// its own records.
// =============================================================================

use super::record::{ProjectedRecord, RawRecord};
use super::repair::repair;
use super::table::Table;
use crate::config::{OutputLayout, CHUNK_SIZE};
use anyhow::Result;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

// What a run did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks_processed: usize,
    pub chunks_skipped: usize,
    pub files_decoded: usize,
    pub files_failed: usize,
}

pub struct ChunkedIngestor {
    layout: OutputLayout,
    chunk_size: usize,
}

impl ChunkedIngestor {
    pub fn new(layout: OutputLayout) -> Self {
        ChunkedIngestor {
            layout,
            chunk_size: CHUNK_SIZE,
        }
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    // Processes every chunk that has no output yet
    pub fn run(&self, files: &[PathBuf]) -> Result<IngestReport> {
        let mut files = files.to_vec();
        files.sort();

        let mut report = IngestReport::default();
        for (index, chunk) in files.chunks(self.chunk_size.max(1)).enumerate() {
            let output = self.layout.chunk_file(index);
            if output.exists() {
                info!("---- Chunk {} (done)", index);
                report.chunks_skipped += 1;
                continue;
            }
            info!("---- Chunk {} ({} files)", index, chunk.len());

            let mut rows = Vec::new();
            for file in chunk {
                match decode_file(file) {
                    Some(records) => {
                        report.files_decoded += 1;
                        rows.extend(records);
                    }
                    None => report.files_failed += 1,
                }
            }

            let table = Table::new(rows);
            table.save(&output)?;
            info!("     {} records", table.len());
            report.chunks_processed += 1;
        }

        Ok(report)
    }
}

// Reads one snapshot and returns its records, None if the file is unusable
fn decode_file(path: &Path) -> Option<Vec<ProjectedRecord>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    let Some(payload) = repair(&raw) else {
        error!("Skipping {}: payload could not be repaired", path.display());
        return None;
    };

    let Some(hits) = take_hits(payload) else {
        warn!("Skipping {}: no hits in payload", path.display());
        return None;
    };

    Some(
        hits.into_iter()
            .filter_map(RawRecord::from_hit)
            .filter_map(RawRecord::project)
            .collect(),
    )
}

// The hits array of the first result set
fn take_hits(mut payload: Value) -> Option<Vec<Value>> {
    match payload.get_mut(0)?.get_mut("hits")?.take() {
        Value::Array(hits) => Some(hits),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(ids: &[&str]) -> String {
        let hits: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"objectID":"{}","title":"Chair {}"}}"#, id, id))
            .collect();
        format!(
            r#"<script>{{"rawResults":[{{"hits":[{}]}}],"state":{{"page":1}}}}</script>"#,
            hits.join(",")
        )
    }

    fn write_pages(layout: &OutputLayout, pages: &[(&str, String)]) -> Vec<PathBuf> {
        pages
            .iter()
            .map(|(name, body)| {
                let path = layout.data_dir().join(name);
                fs::write(&path, body).unwrap();
                path
            })
            .collect()
    }

    fn setup() -> (tempfile::TempDir, OutputLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.ensure_dirs().unwrap();
        (dir, layout)
    }

    #[test]
    fn test_chunks_are_written_and_deduplicated() {
        let (_dir, layout) = setup();
        let files = write_pages(
            &layout,
            &[
                ("a-page-1.json", page(&["1", "2"])),
                ("a-page-2.json", page(&["2", "3"])),
                ("b-page-1.json", page(&["4"])),
            ],
        );

        let report = ChunkedIngestor::new(layout.clone())
            .with_chunk_size(2)
            .run(&files)
            .unwrap();

        assert_eq!(report.chunks_processed, 2);
        assert_eq!(report.files_decoded, 3);
        let first = Table::load(&layout.chunk_file(0)).unwrap();
        let ids: Vec<&str> = first.rows.iter().map(|r| r.object_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(Table::load(&layout.chunk_file(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_rerun_decodes_nothing() {
        let (_dir, layout) = setup();
        let files = write_pages(
            &layout,
            &[
                ("a-page-1.json", page(&["1"])),
                ("a-page-2.json", page(&["2"])),
                ("b-page-1.json", page(&["3"])),
            ],
        );
        let ingestor = ChunkedIngestor::new(layout.clone()).with_chunk_size(1);
        ingestor.run(&files).unwrap();

        let report = ingestor.run(&files).unwrap();

        assert_eq!(
            report,
            IngestReport {
                chunks_processed: 0,
                chunks_skipped: 3,
                files_decoded: 0,
                files_failed: 0,
            }
        );
    }

    #[test]
    fn test_deleted_chunk_is_the_only_one_redone() {
        let (_dir, layout) = setup();
        let files = write_pages(
            &layout,
            &[
                ("a-page-1.json", page(&["1"])),
                ("a-page-2.json", page(&["2"])),
                ("b-page-1.json", page(&["3"])),
                ("b-page-2.json", page(&["4"])),
            ],
        );
        let ingestor = ChunkedIngestor::new(layout.clone()).with_chunk_size(2);
        ingestor.run(&files).unwrap();
        fs::remove_file(layout.chunk_file(1)).unwrap();

        let report = ingestor.run(&files).unwrap();

        assert_eq!(report.chunks_processed, 1);
        assert_eq!(report.chunks_skipped, 1);
        assert_eq!(report.files_decoded, 2);
        let redone = Table::load(&layout.chunk_file(1)).unwrap();
        let ids: Vec<&str> = redone.rows.iter().map(|r| r.object_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[test]
    fn test_one_corrupt_file_in_a_full_chunk() {
        let (_dir, layout) = setup();
        let mut pages: Vec<(String, String)> = (0..999)
            .map(|i| (format!("p-page-{:04}.json", i), page(&[&i.to_string()])))
            .collect();
        pages.push((
            "p-page-9999.json".to_string(),
            r#"{"rawResults":[{"hits":[{"objectID":}]}],"state":{}}"#.to_string(),
        ));
        let pages: Vec<(&str, String)> = pages
            .iter()
            .map(|(name, body)| (name.as_str(), body.clone()))
            .collect();
        let files = write_pages(&layout, &pages);

        let report = ChunkedIngestor::new(layout.clone()).run(&files).unwrap();

        assert_eq!(report.chunks_processed, 1);
        assert_eq!(report.files_decoded, 999);
        assert_eq!(report.files_failed, 1);
        assert_eq!(Table::load(&layout.chunk_file(0)).unwrap().len(), 999);
    }

    #[test]
    fn test_payload_without_hits_is_skipped() {
        let (_dir, layout) = setup();
        let files = write_pages(
            &layout,
            &[("a-page-1.json", r#"{"rawResults":[{"nbHits":0}],"state":{}}"#.to_string())],
        );

        let report = ChunkedIngestor::new(layout.clone()).run(&files).unwrap();

        assert_eq!(report.files_failed, 1);
        assert_eq!(Table::load(&layout.chunk_file(0)).unwrap().len(), 0);
    }
}
