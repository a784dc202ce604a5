//! Core domain types for rating ingestion and the prepared dataset.
//!
//! This module defines the fundamental data structures used throughout the system.
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (UserId, EntityId)
//! - Structs with controlled field visibility
//! - Parallel vectors for sparse row data
//! - Derive macros for common traits
//! - HashMap for efficient lookups

use crate::config::DataPaths;
use crate::indexer::EntityIndexer;
use crate::partition::{PartitionFile, Split};
use crate::pointer::UserPointerIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with entity IDs

/// Unique identifier for a user, exactly as it appears in the raw source
pub type UserId = u32;

/// Unique identifier for a rated entity, exactly as it appears in the raw source
///
/// Raw entity ids are sparse; the indexer maps them to contiguous embedding
/// columns
pub type EntityId = u32;

// =============================================================================
// Rating Scale
// =============================================================================

/// Lower bound of the raw rating scale
pub const RATING_SCALE_MIN: f32 = 0.0;

/// Upper bound of the raw rating scale
pub const RATING_SCALE_MAX: f32 = 5.0;

/// Shift a raw rating so the scale is centered on zero.
///
/// A rating of 5.0 becomes 2.5 and a rating of 1.0 becomes -1.5. Centered
/// values are what the partition files store and what the model trains on.
pub fn normalize_rating(rating: f32) -> f32 {
    rating - (RATING_SCALE_MIN + RATING_SCALE_MAX) / 2.0
}

/// Map a stored value back onto the raw rating scale
pub fn denormalize_rating(value: f32) -> f32 {
    value + (RATING_SCALE_MIN + RATING_SCALE_MAX) / 2.0
}

// =============================================================================
// Raw Events and Instances
// =============================================================================

/// A single (user, entity, rating) observation from the raw ratings source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingEvent {
    pub user_id: UserId,
    pub entity_id: EntityId,
    /// Raw rating value on the [`RATING_SCALE_MIN`, `RATING_SCALE_MAX`] scale
    pub rating: f32,
    /// 1-based line number in the source file, carried for error reporting
    pub line: usize,
}

/// One training instance: a contiguous run of same-user events, re-indexed.
///
/// Columns and values are parallel vectors; `columns[i]` is the embedding
/// column that holds `values[i]`. The run is what gets written to a partition
/// as a single row.
///
/// Rust concept: keeping the vectors private and growing them only through
/// `push` guarantees they stay the same length
#[derive(Debug, Clone, PartialEq)]
pub struct UserInstance {
    pub user_id: UserId,
    columns: Vec<usize>,
    values: Vec<f32>,
}

impl UserInstance {
    /// Start an empty instance for `user_id`
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append one (column, normalized value) pair to the run
    pub fn push(&mut self, column: usize, value: f32) {
        self.columns.push(column);
        self.values.push(value);
    }

    /// Number of events in the run
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

// =============================================================================
// Entity Names
// =============================================================================

/// Human-readable names for embedding columns, in both directions.
///
/// Only entities that were actually seen during ingestion get an entry, so a
/// debug run over a slice of the data carries a correspondingly small table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityNames {
    by_name: HashMap<String, usize>,
    by_column: HashMap<usize, String>,
}

impl EntityNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for an embedding column (both directions)
    pub fn insert(&mut self, name: String, column: usize) {
        self.by_name.insert(name.clone(), column);
        self.by_column.insert(column, name);
    }

    /// Embedding column for a name, if the entity was seen
    pub fn column_for(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Name for an embedding column, if the entity was named
    pub fn name_for(&self, column: usize) -> Option<&str> {
        self.by_column.get(&column).map(|s| s.as_str())
    }

    /// Number of named entities
    pub fn len(&self) -> usize {
        self.by_column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }
}

// =============================================================================
// RatingDataset - The Prepared Dataset Handle
// =============================================================================

/// Handle to a fully prepared dataset.
///
/// This is the heart of the dataset crate: everything a training run needs to
/// know about the prepared data lives behind this handle, and every consumer
/// gets its own explicitly constructed value instead of sharing hidden
/// process-wide state.
///
/// Rust concepts demonstrated:
/// - HashMap-backed indices for O(1) lookups
/// - Borrowing: accessors return `&T` (references) not `T` (owned values)
/// - Construction through `build`/`open`/`load` (see the builder module)
#[derive(Debug)]
pub struct RatingDataset {
    pub(crate) paths: DataPaths,
    pub(crate) indexer: EntityIndexer,
    pub(crate) pointers: UserPointerIndex,
    pub(crate) partitions: Vec<PartitionFile>,
    pub(crate) names: EntityNames,
}

impl RatingDataset {
    /// Assemble a handle from already-built parts
    pub fn from_parts(
        paths: DataPaths,
        indexer: EntityIndexer,
        pointers: UserPointerIndex,
        partitions: Vec<PartitionFile>,
        names: EntityNames,
    ) -> Self {
        Self {
            paths,
            indexer,
            pointers,
            partitions,
            names,
        }
    }

    // Getters - Note: These return references (&T) not owned values (T)

    /// Width of the dense embedding rows (distinct entities plus the reserved
    /// zero column)
    pub fn embedding_width(&self) -> usize {
        self.indexer.embedding_width()
    }

    /// Number of distinct entities seen during ingestion
    pub fn distinct_entities(&self) -> usize {
        self.indexer.distinct_entities()
    }

    /// Number of users with a recorded instance pointer
    pub fn user_count(&self) -> usize {
        self.pointers.len()
    }

    /// The sealed partition records, in train/test/validation order
    pub fn partitions(&self) -> &[PartitionFile] {
        &self.partitions
    }

    /// Number of instances written to one partition
    pub fn instance_count(&self, split: Split) -> u64 {
        self.partitions
            .iter()
            .find(|p| p.split == split)
            .map(|p| p.instances)
            .unwrap_or(0)
    }

    /// Number of instances written across all partitions
    pub fn total_instances(&self) -> u64 {
        self.partitions.iter().map(|p| p.instances).sum()
    }

    /// Entity name dictionaries (name to column and back)
    pub fn names(&self) -> &EntityNames {
        &self.names
    }

    /// The data paths this dataset lives under
    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// On-disk location of one partition file
    pub fn partition_path(&self, split: Split) -> PathBuf {
        self.paths.partition_path(split)
    }

    /// The user pointer index
    pub fn pointers(&self) -> &UserPointerIndex {
        &self.pointers
    }

    /// The entity column map
    pub fn indexer(&self) -> &EntityIndexer {
        &self.indexer
    }

    /// Reconstruct the dense rating row for one user
    ///
    /// Returns `UnknownUser` if the user was never ingested
    pub fn resolve_user(&self, user_id: UserId) -> crate::error::Result<Vec<f32>> {
        self.pointers.resolve(user_id, self.embedding_width())
    }

    /// Reconstruct dense rating rows for several users at once
    pub fn resolve_users(&self, user_ids: &[UserId]) -> crate::error::Result<Vec<Vec<f32>>> {
        self.pointers.resolve_many(user_ids, self.embedding_width())
    }

    /// Get counts for summaries and validation: (users, entities, instances)
    pub fn counts(&self) -> (usize, usize, u64) {
        (
            self.pointers.len(),
            self.indexer.distinct_entities(),
            self.total_instances(),
        )
    }
}
