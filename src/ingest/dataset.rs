// src/ingest/dataset.rs
// =============================================================================
// Merges the chunk outputs into the final dataset.
//
// The merged dataset is cached in cache.json. While the cache exists it is
// returned as-is; delete it to rebuild from the chunks.
// =============================================================================

use super::table::Table;
use crate::config::OutputLayout;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub struct DatasetAssembler {
    layout: OutputLayout,
}

impl DatasetAssembler {
    pub fn new(layout: OutputLayout) -> Self {
        DatasetAssembler { layout }
    }

    // The cached dataset, if one has been built
    pub fn cached(&self) -> Result<Option<Table>> {
        let cache = self.layout.cache_file();
        if cache.exists() {
            Ok(Some(Table::load(&cache)?))
        } else {
            Ok(None)
        }
    }

    // Returns the dataset, building and caching it from the chunks if needed
    pub fn assemble(&self) -> Result<Table> {
        if let Some(dataset) = self.cached()? {
            info!("Dataset loaded from {}", self.layout.cache_file().display());
            return Ok(dataset);
        }

        let chunks = self
            .chunk_files()?
            .iter()
            .map(|path| Table::load(path))
            .collect::<Result<Vec<_>>>()?;
        info!("Merging {} chunk(s)", chunks.len());

        let dataset = Table::concat(chunks).with_categoricals();
        dataset.save(&self.layout.cache_file())?;
        info!("Dataset built: {} records", dataset.len());
        Ok(dataset)
    }

    // Chunk outputs in ascending chunk index
    fn chunk_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.layout.processed_dir();
        let mut chunks = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            let index = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(chunk_index);
            if let Some(index) = index {
                chunks.push((index, path));
            }
        }

        chunks.sort();
        Ok(chunks.into_iter().map(|(_, path)| path).collect())
    }
}

// "chunk_12.json" -> Some(12)
fn chunk_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("chunk_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
