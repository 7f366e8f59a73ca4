// src/store/mod.rs
// =============================================================================
// This module holds the durable state that makes a crawl resumable.
//
// Submodules:
// - checkpoint: Append-only ledgers of fully processed catalog nodes
// - snapshot:   One file per (subcategory, page) holding the raw listing payload
//
// Both stores are traits with a filesystem implementation. The crawler gets
// them injected, and tests swap in the in-memory versions below.
// =============================================================================

mod checkpoint;
mod snapshot;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, Level};
pub use snapshot::{FileSnapshotStore, SnapshotStore};

#[cfg(test)]
pub use checkpoint::MemoryCheckpointStore;
#[cfg(test)]
pub use snapshot::MemorySnapshotStore;
