//! Entity re-indexing: raw ids to contiguous embedding columns.
//!
//! Raw entity ids in the source are sparse and can be arbitrarily large. The
//! indexer hands out embedding columns in first-sight order, so the column
//! space stays dense no matter how the raw id space looks.
//!
//! Rust concepts you'll see here:
//! - HashMap as a bijective assignment table
//! - The Entry API for insert-if-absent
//! - Rebuilding state from its persisted form

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Assigns contiguous embedding columns to raw entity ids in first-sight order.
///
/// Column 0 is reserved and never assigned, so assigned columns run from 1 to
/// the number of distinct entities and the embedding width is that count plus
/// one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityIndexer {
    columns: HashMap<EntityId, usize>,
}

impl EntityIndexer {
    /// Creates a new, empty indexer
    pub fn new() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    /// Rebuild an indexer from a persisted column map
    pub fn from_columns(columns: HashMap<EntityId, usize>) -> Self {
        Self { columns }
    }

    /// Column for `entity_id`, assigning the next free column on first sight.
    ///
    /// Calling this again with the same id always returns the same column.
    pub fn resolve(&mut self, entity_id: EntityId) -> usize {
        let next = self.columns.len() + 1;
        *self.columns.entry(entity_id).or_insert(next)
    }

    /// Column for `entity_id` if it has been seen, without assigning one
    pub fn column_of(&self, entity_id: EntityId) -> Option<usize> {
        self.columns.get(&entity_id).copied()
    }

    /// Number of distinct entities seen so far
    pub fn distinct_entities(&self) -> usize {
        self.columns.len()
    }

    /// Width of the dense embedding rows: distinct entities plus the reserved
    /// zero column
    pub fn embedding_width(&self) -> usize {
        self.columns.len() + 1
    }

    /// The raw-id-to-column assignment table
    pub fn columns(&self) -> &HashMap<EntityId, usize> {
        &self.columns
    }

    /// Consume the indexer and take its assignment table
    pub fn into_columns(self) -> HashMap<EntityId, usize> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_assignment_starts_at_one() {
        let mut indexer = EntityIndexer::new();

        assert_eq!(indexer.resolve(10), 1);
        assert_eq!(indexer.resolve(20), 2);
        assert_eq!(indexer.resolve(10), 1, "repeat lookups must not reassign");
        assert_eq!(indexer.distinct_entities(), 2);
        assert_eq!(indexer.embedding_width(), 3);
    }

    #[test]
    fn test_columns_are_a_bijection_onto_one_through_n() {
        let mut indexer = EntityIndexer::new();
        let raw_ids = [907_u32, 3, 55_000, 12, 42];
        for &id in &raw_ids {
            indexer.resolve(id);
        }

        let mut seen: Vec<usize> = indexer.columns().values().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(indexer.embedding_width(), raw_ids.len() + 1);
    }

    #[test]
    fn test_column_of_does_not_assign() {
        let mut indexer = EntityIndexer::new();
        assert_eq!(indexer.column_of(99), None);
        assert_eq!(indexer.distinct_entities(), 0);

        indexer.resolve(99);
        assert_eq!(indexer.column_of(99), Some(1));
    }

    #[test]
    fn test_rebuilt_indexer_resumes_after_the_highest_column() {
        let mut indexer = EntityIndexer::new();
        indexer.resolve(10);
        indexer.resolve(20);

        let rebuilt = EntityIndexer::from_columns(indexer.clone().into_columns());
        assert_eq!(rebuilt, indexer);

        let mut rebuilt = rebuilt;
        assert_eq!(rebuilt.resolve(30), 3);
    }
}
