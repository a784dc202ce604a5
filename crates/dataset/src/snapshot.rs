//! Snapshot persistence: the prepared dataset as one JSON blob, plus a backup
//! mirror of every essential file.
//!
//! The snapshot is what lets later runs skip ingestion entirely: if it and
//! the three partition files are present and non-empty, the dataset handle is
//! rebuilt straight from disk. The backup mirror holds a second copy of all
//! four files and is used to restore a damaged primary before the
//! completeness verdict is made.

use crate::config::DataPaths;
use crate::error::{DatasetError, Result};
use crate::indexer::EntityIndexer;
use crate::partition::PartitionFile;
use crate::pointer::UserPointerIndex;
use crate::types::{EntityId, EntityNames, RatingDataset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything needed to reopen a prepared dataset without re-ingesting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Raw entity id to embedding column assignment
    pub entity_columns: HashMap<EntityId, usize>,
    /// Per-user pointers into the partition files
    pub pointers: UserPointerIndex,
    /// Width of the dense embedding rows
    pub embedding_width: usize,
    /// Sealed partition records with their instance counts
    pub partitions: Vec<PartitionFile>,
    /// Entity name dictionaries, filtered to seen entities
    pub names: EntityNames,
}

impl DatasetSnapshot {
    /// Capture the persistable state of a dataset handle
    pub fn from_dataset(dataset: &RatingDataset) -> Self {
        Self {
            entity_columns: dataset.indexer.columns().clone(),
            pointers: dataset.pointers.clone(),
            embedding_width: dataset.embedding_width(),
            partitions: dataset.partitions.clone(),
            names: dataset.names.clone(),
        }
    }

    /// Rebuild the dataset handle under `paths`
    pub fn into_dataset(self, paths: DataPaths) -> RatingDataset {
        RatingDataset::from_parts(
            paths,
            EntityIndexer::from_columns(self.entity_columns),
            self.pointers,
            self.partitions,
            self.names,
        )
    }
}

/// Reads and writes the snapshot blob and keeps the backup mirror in sync
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: DataPaths,
}

impl SnapshotStore {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }

    /// True when the snapshot and every partition file exist and are
    /// non-empty.
    ///
    /// A missing or empty primary is first restored from the backup mirror
    /// when the mirror holds a usable copy; only then is the verdict made.
    pub fn exists_and_complete(&self) -> bool {
        let mut complete = true;
        for (file_name, path) in self.paths.essential_files() {
            if !is_usable(&path) {
                let backup = self.paths.backup_path(file_name);
                if is_usable(&backup) {
                    match fs::copy(&backup, &path) {
                        Ok(_) => {
                            info!(file = file_name, "restored from backup mirror");
                        }
                        Err(e) => {
                            warn!(file = file_name, error = %e, "backup restore failed");
                        }
                    }
                }
            }
            if !is_usable(&path) {
                debug!(path = %path.display(), "essential file missing or empty");
                complete = false;
            }
        }
        complete
    }

    /// Persist the snapshot blob
    pub fn save(&self, snapshot: &DatasetSnapshot) -> Result<()> {
        let path = self.paths.snapshot_path();
        let json = serde_json::to_string(snapshot)?;
        fs::write(&path, json)?;
        info!(
            path = %path.display(),
            users = snapshot.pointers.len(),
            width = snapshot.embedding_width,
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot blob, rebasing its pointers onto this store's root.
    ///
    /// Errors with `IncompleteSnapshot` if any essential file is missing or
    /// empty; call `exists_and_complete` first to attempt a backup restore.
    pub fn load(&self) -> Result<DatasetSnapshot> {
        for (_, path) in self.paths.essential_files() {
            if !is_usable(&path) {
                return Err(DatasetError::IncompleteSnapshot { path });
            }
        }

        let json = fs::read_to_string(self.paths.snapshot_path())?;
        let mut snapshot: DatasetSnapshot = serde_json::from_str(&json)?;
        snapshot.pointers.rebase_all(self.paths.root());

        let derived = snapshot.entity_columns.len() + 1;
        if snapshot.embedding_width != derived {
            warn!(
                stored = snapshot.embedding_width,
                derived, "snapshot width disagrees with its entity map"
            );
        }
        Ok(snapshot)
    }

    /// Copy every essential file into the backup mirror, replacing stale
    /// copies
    pub fn mirror_to_backup(&self) -> Result<()> {
        fs::create_dir_all(self.paths.backup_dir())?;
        for (file_name, path) in self.paths.essential_files() {
            fs::copy(&path, self.paths.backup_path(file_name))?;
        }
        debug!(dir = %self.paths.backup_dir().display(), "backup mirror refreshed");
        Ok(())
    }

    /// Error with the first missing or empty essential file, if any.
    ///
    /// Run right after a build: a build that leaves an essential file absent
    /// or zero-length must not be reported as a success.
    pub fn verify_complete(&self) -> Result<()> {
        for (_, path) in self.paths.essential_files() {
            if !is_usable(&path) {
                return Err(DatasetError::IncompleteBuild { path });
            }
        }
        Ok(())
    }
}

/// A file is usable when it exists and has at least one byte
fn is_usable(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
