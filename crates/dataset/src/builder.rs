//! The ingest pass: raw rating events to partitioned instance rows.
//!
//! This module is the write side of the system. It consumes a stream of
//! rating events, groups contiguous same-user runs into instances, routes
//! each instance to train/test/validation by a weighted random draw, and
//! records a file pointer per user. The read side (pointer lookups, batch
//! streaming) never touches raw data again.
//!
//! ## Algorithm
//! 1. For each event, resolve the entity to its embedding column and
//!    normalize the rating
//! 2. A change of user id closes the current run: the finished instance is
//!    appended to a randomly drawn partition and its byte offset recorded
//! 3. If an entity cutoff is set and exceeded, ingestion stops right after
//!    that flush and reads no further events
//! 4. After the last event, the final run is flushed, the writers are sealed
//!    with the now-known embedding width, and the snapshot plus its backup
//!    mirror are written
//!
//! Rust concepts you'll see here:
//! - Ownership-driven state transitions (builder consumes itself)
//! - Generic functions over `IntoIterator`
//! - Seeded RNG for reproducible randomness

use crate::config::DataPaths;
use crate::error::{DatasetError, Result};
use crate::indexer::EntityIndexer;
use crate::parser;
use crate::partition::{split_for_draw, PartitionFile, PartitionWriter, Split};
use crate::pointer::{FilePointer, UserPointerIndex};
use crate::snapshot::{DatasetSnapshot, SnapshotStore};
use crate::types::{normalize_rating, RatingDataset, RatingEvent, UserInstance};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Partition draw seed used when none is configured
pub const DEFAULT_SEED: u64 = 42;

/// Entity cutoff applied by debug runs that don't set their own
pub const DEBUG_ENTITY_CUTOFF: usize = 500;

/// Options for one ingest run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Stop ingesting once more than this many distinct entities were seen
    pub entity_cutoff: Option<usize>,
    /// Seed for the partition draw; the same seed over the same input gives
    /// the same assignment
    pub seed: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entity_cutoff: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl BuildOptions {
    /// Configure the entity cutoff (default: none)
    pub fn with_entity_cutoff(mut self, cutoff: usize) -> Self {
        self.entity_cutoff = Some(cutoff);
        self
    }

    /// Configure the partition draw seed (default: [`DEFAULT_SEED`])
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Streams rating events into partition files.
///
/// The builder owns the three open partition writers; `ingest` consumes it
/// and hands back the sealed state, so a builder can never be reused after
/// its files are closed.
pub struct DatasetBuilder {
    paths: DataPaths,
    options: BuildOptions,
    indexer: EntityIndexer,
    pointers: UserPointerIndex,
    writers: Vec<PartitionWriter>,
    rng: StdRng,
    instances: u64,
}

impl DatasetBuilder {
    /// Open fresh partition writers under the data root (truncating any
    /// previous run's files)
    pub fn create(paths: DataPaths, options: BuildOptions) -> Result<Self> {
        paths.ensure_root()?;
        let mut writers = Vec::with_capacity(Split::ALL.len());
        for split in Split::ALL {
            writers.push(PartitionWriter::create(paths.root(), split)?);
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(options.seed),
            paths,
            options,
            indexer: EntityIndexer::new(),
            pointers: UserPointerIndex::new(),
            writers,
            instances: 0,
        })
    }

    /// Run the ingest pass over `events`.
    ///
    /// Returns the populated entity indexer, the user pointer index and the
    /// sealed partition records.
    #[instrument(skip_all, fields(root = %self.paths.root().display()))]
    pub fn ingest<I>(
        mut self,
        events: I,
    ) -> Result<(EntityIndexer, UserPointerIndex, Vec<PartitionFile>)>
    where
        I: IntoIterator<Item = Result<RatingEvent>>,
    {
        let mut current: Option<UserInstance> = None;
        let mut events_seen: u64 = 0;

        for event in events {
            let event = event?;
            events_seen += 1;

            // A change of user id closes the current run
            if current
                .as_ref()
                .is_some_and(|instance| instance.user_id != event.user_id)
            {
                if let Some(finished) = current.take() {
                    self.flush_instance(finished)?;
                }
            }

            let column = self.indexer.resolve(event.entity_id);
            let value = normalize_rating(event.rating);
            current
                .get_or_insert_with(|| UserInstance::new(event.user_id))
                .push(column, value);

            // Once the vocabulary outgrows the cutoff, flush what is in
            // flight and read no further
            if self.cutoff_reached() {
                if let Some(finished) = current.take() {
                    self.flush_instance(finished)?;
                }
                info!(
                    distinct = self.indexer.distinct_entities(),
                    stopped_at_line = event.line,
                    "entity cutoff exceeded, stopping ingest"
                );
                break;
            }
        }

        // Close the final run
        if let Some(finished) = current.take() {
            self.flush_instance(finished)?;
        }

        let width = self.indexer.embedding_width();
        info!(
            events = events_seen,
            instances = self.instances,
            users = self.pointers.len(),
            entities = self.indexer.distinct_entities(),
            width,
            "ingest pass complete"
        );

        let DatasetBuilder {
            indexer,
            pointers,
            writers,
            ..
        } = self;

        // The width is only known now, after the whole vocabulary was seen
        let mut partitions = Vec::with_capacity(writers.len());
        for writer in writers {
            partitions.push(writer.finish(width)?);
        }
        Ok((indexer, pointers, partitions))
    }

    /// Route one finished instance to a partition and record its pointer
    fn flush_instance(&mut self, instance: UserInstance) -> Result<()> {
        let draw: f64 = self.rng.random();
        let split = split_for_draw(draw);

        // Writers were created in Split::ALL order
        let writer = &mut self.writers[split as usize];
        let offset = writer.append(instance.columns(), instance.values())?;

        self.pointers.record(
            instance.user_id,
            FilePointer::new(
                self.paths.root().to_path_buf(),
                split.file_name().to_string(),
                offset,
            ),
        );
        self.instances += 1;
        Ok(())
    }

    fn cutoff_reached(&self) -> bool {
        self.options
            .entity_cutoff
            .is_some_and(|cutoff| self.indexer.distinct_entities() > cutoff)
    }
}

impl RatingDataset {
    /// Run the full preparation pass and persist the result.
    ///
    /// ## Steps
    /// 1. Check both raw inputs exist (missing inputs are fatal here)
    /// 2. Stream rating events through the ingest pass
    /// 3. Attach names for the entities actually seen
    /// 4. Persist the snapshot and refresh the backup mirror
    /// 5. Verify every essential file is present and non-empty
    #[instrument(skip_all, fields(root = %paths.root().display()))]
    pub fn build(
        paths: DataPaths,
        ratings: &Path,
        names: &Path,
        options: BuildOptions,
    ) -> Result<Self> {
        require_input(ratings)?;
        require_input(names)?;

        let events = parser::stream_ratings(ratings)?;
        let builder = DatasetBuilder::create(paths.clone(), options)?;
        let (indexer, pointers, partitions) = builder.ingest(events)?;

        let names = parser::read_entity_names(names, &indexer)?;
        let dataset = RatingDataset::from_parts(paths, indexer, pointers, partitions, names);

        let store = SnapshotStore::new(dataset.paths.clone());
        store.save(&DatasetSnapshot::from_dataset(&dataset))?;
        store.mirror_to_backup()?;
        store.verify_complete()?;

        Ok(dataset)
    }

    /// Load a previously prepared dataset, never ingesting.
    ///
    /// Errors if any essential file is missing or empty.
    pub fn load(paths: DataPaths) -> Result<Self> {
        let store = SnapshotStore::new(paths.clone());
        let snapshot = store.load()?;
        Ok(snapshot.into_dataset(paths))
    }

    /// Open the prepared dataset, reusing a complete snapshot when one exists
    /// and rebuilding from the raw sources otherwise
    pub fn open(
        paths: DataPaths,
        ratings: &Path,
        names: &Path,
        options: BuildOptions,
    ) -> Result<Self> {
        let store = SnapshotStore::new(paths.clone());
        if store.exists_and_complete() {
            info!(root = %paths.root().display(), "reusing existing snapshot");
            return Self::load(paths);
        }
        info!(root = %paths.root().display(), "no usable snapshot, ingesting raw sources");
        Self::build(paths, ratings, names, options)
    }
}

/// Check a raw input exists before opening anything for writing
fn require_input(path: &Path) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    Err(DatasetError::MissingInput {
        path: path.to_path_buf(),
        cwd,
    })
}
