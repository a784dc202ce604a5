//! # Dataset Crate
//!
//! This crate prepares raw rating logs for autoencoder training: it ingests
//! `(user, entity, rating)` events, partitions them into train/test/validation
//! files of sparse instance rows, and indexes every user's latest row for
//! O(1) lookup. The prepared state survives process restarts through a JSON
//! snapshot with a backup mirror.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (RatingEvent, UserInstance, RatingDataset)
//! - **parser**: Parse `::`-separated raw files into rating events
//! - **indexer**: First-sight assignment of entities to embedding columns
//! - **partition**: Split files, the instance row format, append-only writers
//! - **pointer**: Per-user (directory, file, offset) index with O(1) lookup
//! - **builder**: The ingest pass that turns events into a prepared dataset
//! - **snapshot**: Persistence, backup restore and integrity checking
//! - **config**: On-disk layout under a full/ or debug/ data root
//! - **error**: Error types for dataset preparation
//!
//! ## Example Usage
//!
//! ```ignore
//! use dataset::{BuildOptions, DataPaths, RatingDataset};
//! use std::path::Path;
//!
//! // Reuse an existing snapshot, or ingest the raw files if there is none
//! let paths = DataPaths::new(Path::new("data"), false);
//! let dataset = RatingDataset::open(
//!     paths,
//!     Path::new("raw/ratings.dat"),
//!     Path::new("raw/movies.dat"),
//!     BuildOptions::default(),
//! )?;
//!
//! // O(1) lookup of a user's latest dense rating row
//! let row = dataset.resolve_user(42)?;
//! println!("user 42 rated {} entities", dataset.distinct_entities());
//! ```
//!
//! ## Learning Goals
//!
//! This crate demonstrates several key Rust concepts:
//!
//! 1. **Ownership and Borrowing**: RatingDataset owns the indices, methods return references
//! 2. **Error Handling**: Using Result<T> and custom error types instead of exits
//! 3. **Type Safety**: Type aliases (UserId, EntityId) prevent mixing up IDs
//! 4. **Collections**: HashMap-backed indices for O(1) lookups
//! 5. **Iterators**: Streaming ingestion without loading files into memory
//! 6. **Modules**: Organizing code into logical units
//! 7. **Parallel Processing**: Using Rayon for batched pointer resolution

// Public modules
pub mod builder;
pub mod config;
pub mod error;
pub mod indexer;
pub mod parser;
pub mod partition;
pub mod pointer;
pub mod snapshot;
pub mod types;

// Re-export commonly used types for convenience
pub use builder::{BuildOptions, DatasetBuilder, DEBUG_ENTITY_CUTOFF, DEFAULT_SEED};
pub use config::DataPaths;
pub use error::{DatasetError, Result};
pub use indexer::EntityIndexer;
pub use partition::{PartitionFile, Split};
pub use pointer::{FilePointer, UserPointerIndex};
pub use snapshot::{DatasetSnapshot, SnapshotStore};
pub use types::{
    // Type aliases
    EntityId,
    UserId,
    // Core types
    EntityNames,
    RatingDataset,
    RatingEvent,
    UserInstance,
    // Rating scale helpers
    denormalize_rating,
    normalize_rating,
    RATING_SCALE_MAX,
    RATING_SCALE_MIN,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_indexer_reserves_the_zero_column() {
        let indexer = EntityIndexer::new();

        assert_eq!(indexer.distinct_entities(), 0);
        assert_eq!(
            indexer.embedding_width(),
            1,
            "column 0 is reserved even before any entity is seen"
        );
    }

    #[test]
    fn test_empty_dataset_handle() {
        let paths = DataPaths::new(std::path::Path::new("data"), false);
        let dataset = RatingDataset::from_parts(
            paths,
            EntityIndexer::new(),
            UserPointerIndex::new(),
            Vec::new(),
            EntityNames::new(),
        );

        assert_eq!(dataset.counts(), (0, 0, 0));
        assert_eq!(dataset.instance_count(Split::Train), 0);
    }

    #[test]
    fn test_split_names_round_trip() {
        for split in Split::ALL {
            let parsed: Split = split.to_string().parse().unwrap();
            assert_eq!(parsed, split);
        }
        assert_eq!("val".parse::<Split>().unwrap(), Split::Validation);
        assert!("ship".parse::<Split>().is_err());
    }
}
