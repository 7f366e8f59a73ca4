// src/ingest/mod.rs
// =============================================================================
// This module turns the saved listing pages into one dataset.
//
// Submodules:
// - repair:  Extracts and fixes the JSON payload of a saved page
// - record:  Flattens one product hit into the canonical columns
// - table:   The typed, deduplicated table stored on disk
// - chunk:   Processes the snapshots in resumable chunks
// - dataset: Merges the chunks and caches the result
//
// Pipeline:
//   data/*.json -> chunk_<i>.json (one per 1000 files) -> cache.json
// Every arrow is skipped when its output already exists.
// =============================================================================

mod chunk;
mod dataset;
mod record;
mod repair;
mod table;

pub use table::Table;

use chunk::ChunkedIngestor;
use crate::config::OutputLayout;
use crate::store::FileSnapshotStore;
use anyhow::Result;
use dataset::DatasetAssembler;
use tracing::info;

// Returns the dataset for a harvest, doing only the work still missing
pub fn build_dataset(layout: &OutputLayout) -> Result<Table> {
    let assembler = DatasetAssembler::new(layout.clone());
    if let Some(dataset) = assembler.cached()? {
        info!("Using cached dataset ({} records)", dataset.len());
        return Ok(dataset);
    }

    let files = FileSnapshotStore::new(layout.data_dir()).list()?;
    info!("{} snapshot file(s) to ingest", files.len());

    let report = ChunkedIngestor::new(layout.clone()).run(&files)?;
    info!(
        "Chunks: {} processed, {} already done; files: {} decoded, {} failed",
        report.chunks_processed, report.chunks_skipped, report.files_decoded, report.files_failed
    );

    assembler.assemble()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn page(ids: &[&str]) -> String {
        let hits: Vec<String> = ids
            .iter()
            .map(|id| {
                format!(
                    r#"{{"objectID":"{}","title":" Lampe \x82 poser "}}"#,
                    id
                )
            })
            .collect();
        format!(
            r#"{{"rawResults":[{{"hits":[{}]}}],"state":{{}}}}"#,
            hits.join(",")
        )
    }

    #[test]
    fn test_build_dataset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.ensure_dirs().unwrap();
        fs::write(layout.data_dir().join("lamps-page-1.json"), page(&["1", "2"])).unwrap();
        fs::write(layout.data_dir().join("lamps-page-2.json"), page(&["2", "3"])).unwrap();
        fs::write(layout.data_dir().join("broken-page-1.json"), "<html></html>").unwrap();

        let dataset = build_dataset(&layout).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.rows[0].title.as_deref(), Some("Lampe é poser"));
        assert!(layout.chunk_file(0).exists());
        assert!(layout.cache_file().exists());

        // A second call is served from the cache
        fs::remove_file(layout.chunk_file(0)).unwrap();
        assert_eq!(build_dataset(&layout).unwrap().len(), 3);
        assert!(!layout.chunk_file(0).exists());
    }

    #[test]
    fn test_build_dataset_without_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.ensure_dirs().unwrap();

        let dataset = build_dataset(&layout).unwrap();

        assert_eq!(dataset.len(), 0);
    }
}
