//! User pointer index: O(1) jumps from a user id to its instance row.
//!
//! During ingestion every flushed instance reports the byte offset it was
//! written at; the pointer index remembers (directory, file, offset) per user
//! so a single row can be re-read later without scanning the partition.
//!
//! Rust concepts you'll see here:
//! - Short-lived file handles for stateless positioned reads
//! - Rayon for fanning independent lookups across threads
//! - HashMap with replace-on-insert semantics

use crate::error::{DatasetError, Result};
use crate::partition;
use crate::types::UserId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable location of one instance row: directory, file name, byte offset.
///
/// Reading through a pointer opens its own short-lived file handle, seeks and
/// reads exactly one line. No cursor state is shared, so any number of
/// pointers can be read at the same time without coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePointer {
    dir: PathBuf,
    file_name: String,
    offset: u64,
}

impl FilePointer {
    pub fn new(dir: PathBuf, file_name: String, offset: u64) -> Self {
        Self {
            dir,
            file_name,
            offset,
        }
    }

    /// Full path of the partition file this pointer refers into
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// File name of the partition (without the directory)
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Byte offset the instance row starts at
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Re-root the pointer onto another directory, keeping file and offset
    pub fn rebase(&mut self, dir: &Path) {
        self.dir = dir.to_path_buf();
    }

    /// Read the single row this pointer refers to
    pub fn read_row(&self) -> Result<String> {
        let mut file = File::open(self.path())?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);
        let mut row = String::new();
        reader.read_line(&mut row)?;
        Ok(row.trim_end().to_string())
    }
}

/// Maps every ingested user to the location of their most recent instance.
///
/// Recording the same user twice keeps the later pointer (last write wins),
/// which matches how a user id that reappears later in the source is ingested
/// as a separate instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPointerIndex {
    pointers: HashMap<UserId, FilePointer>,
}

impl UserPointerIndex {
    pub fn new() -> Self {
        Self {
            pointers: HashMap::new(),
        }
    }

    /// Record where `user_id`'s instance row starts; replaces any earlier entry
    pub fn record(&mut self, user_id: UserId, pointer: FilePointer) {
        self.pointers.insert(user_id, pointer);
    }

    /// Pointer for `user_id`, or `UnknownUser` if never recorded
    pub fn lookup(&self, user_id: UserId) -> Result<&FilePointer> {
        self.pointers
            .get(&user_id)
            .ok_or(DatasetError::UnknownUser { user_id })
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.pointers.contains_key(&user_id)
    }

    /// Number of users with a recorded pointer
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Re-root every pointer onto `dir`.
    ///
    /// Used after loading a snapshot: the data directory may have moved since
    /// the pointers were recorded.
    pub fn rebase_all(&mut self, dir: &Path) {
        for pointer in self.pointers.values_mut() {
            pointer.rebase(dir);
        }
    }

    /// Reconstruct the dense rating row for one user.
    ///
    /// ## Steps
    /// 1. Look the user up (`UnknownUser` if absent)
    /// 2. Read the single row at the stored offset
    /// 3. Parse it and scatter the values into a zeroed row of `width`
    pub fn resolve(&self, user_id: UserId, width: usize) -> Result<Vec<f32>> {
        let pointer = self.lookup(user_id)?;
        let row = pointer.read_row()?;
        let (columns, values) =
            partition::parse_instance(&row).ok_or_else(|| DatasetError::CorruptInstance {
                file: pointer.file_name().to_string(),
                offset: pointer.offset(),
            })?;

        let mut dense = vec![0.0; width];
        for (&column, &value) in columns.iter().zip(values.iter()) {
            if column >= width {
                return Err(DatasetError::CorruptInstance {
                    file: pointer.file_name().to_string(),
                    offset: pointer.offset(),
                });
            }
            dense[column] = value;
        }
        Ok(dense)
    }

    /// Reconstruct dense rows for several users at once.
    ///
    /// Pointer reads are stateless, so the lookups fan out across the rayon
    /// pool; results come back in input order.
    pub fn resolve_many(&self, user_ids: &[UserId], width: usize) -> Result<Vec<Vec<f32>>> {
        debug!(users = user_ids.len(), "resolving user rows");
        user_ids
            .par_iter()
            .map(|&user_id| self.resolve(user_id, width))
            .collect()
    }
}
