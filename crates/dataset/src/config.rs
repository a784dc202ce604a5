//! Data directory layout for prepared datasets.
//!
//! All on-disk artifacts live under a single root: the three partition files,
//! the snapshot blob, and a `backup/` mirror of all four. A debug flag picks
//! an entirely separate root with the same layout, so debug artifacts and
//! full-run artifacts never mix.

use crate::partition::Split;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted snapshot blob
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Directory under the data root holding the backup mirror
pub const BACKUP_DIR: &str = "backup";

/// Subdirectory of the base data directory used for full runs
pub const FULL_ROOT: &str = "full";

/// Subdirectory of the base data directory used for debug runs
pub const DEBUG_ROOT: &str = "debug";

/// Resolved locations of every file the prepared dataset touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Select the data root under `base`: `full/` normally, `debug/` when the
    /// debug flag is set
    pub fn new(base: &Path, debug: bool) -> Self {
        let sub = if debug { DEBUG_ROOT } else { FULL_ROOT };
        Self {
            root: base.join(sub),
        }
    }

    /// The selected data root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the snapshot blob
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    /// Location of one partition file
    pub fn partition_path(&self, split: Split) -> PathBuf {
        self.root.join(split.file_name())
    }

    /// The backup mirror directory
    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// Location of one file's copy inside the backup mirror
    pub fn backup_path(&self, file_name: &str) -> PathBuf {
        self.backup_dir().join(file_name)
    }

    /// Every file that must exist and be non-empty for the dataset to be
    /// loadable, as (file name, primary path) pairs
    pub fn essential_files(&self) -> Vec<(&'static str, PathBuf)> {
        let mut files = vec![(SNAPSHOT_FILE, self.snapshot_path())];
        for split in Split::ALL {
            files.push((split.file_name(), self.partition_path(split)));
        }
        files
    }

    /// Create the data root if it does not exist yet
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}
