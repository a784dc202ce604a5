//! Sequential batch streaming over one partition file.
//!
//! A [`BatchReader`] walks a partition file from top to bottom, turning each
//! run of instance rows into a [`RatingBatch`]. When it reaches the end of
//! the file it simply starts over on the next call, so a training loop can
//! run as many epochs as it likes against one reader.
//!
//! Rust concepts demonstrated:
//! - `Option<T>` as an explicit open/closed state machine (`take` to borrow
//!   the cursor out, put it back only while mid-file)
//! - Loops over recursion for the wrap-to-start path
//! - Builder-style configuration (`with_corruption`, `with_seed`)

use crate::batch::RatingBatch;
use dataset::partition::parse_instance;
use dataset::{RatingDataset, Split};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors raised while streaming batches
#[derive(Error, Debug)]
pub enum BatchError {
    /// Wraps file open and read failures
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A wraparound refill found the partition file itself empty
    #[error("partition file {path} is empty")]
    EmptyPartition { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// Streams fixed-size batches from a partition file, wrapping around at the
/// end of the file.
///
/// Each call reads up to `batch_size` lines; lines that fail to parse, or
/// that reference a column outside the embedding width, are skipped with a
/// warning, so a batch can come back with fewer rows than slots. With a
/// corruption count configured, that many present entries per batch are
/// zeroed in the input tensor while the target keeps every value.
pub struct BatchReader {
    path: PathBuf,
    embedding_width: usize,
    batch_size: usize,
    corruption: usize,
    reader: Option<BufReader<File>>,
    line_no: usize,
    rng: StdRng,
}

impl BatchReader {
    /// Create a reader over one partition file.
    ///
    /// The file is not opened until the first `next_batch` call. A batch size
    /// of zero is treated as one.
    pub fn new(path: impl Into<PathBuf>, embedding_width: usize, batch_size: usize) -> Self {
        Self {
            path: path.into(),
            embedding_width,
            batch_size: batch_size.max(1),
            corruption: 0,
            reader: None,
            line_no: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a reader over one of a prepared dataset's partitions
    pub fn for_split(dataset: &RatingDataset, split: Split, batch_size: usize) -> Self {
        Self::new(
            dataset.partition_path(split),
            dataset.embedding_width(),
            batch_size,
        )
    }

    /// Zero this many present entries per batch in the input tensor,
    /// sampled without replacement across all rows (default: none). Batches
    /// with fewer entries lose all of them.
    pub fn with_corruption(mut self, entries: usize) -> Self {
        self.corruption = entries;
        self
    }

    /// Seed the corruption draw for reproducible batches
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The partition file this reader walks
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured number of row slots per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// True while a cursor is parked mid-file between calls
    pub fn is_streaming(&self) -> bool {
        self.reader.is_some()
    }

    /// Read the next batch of instance rows.
    ///
    /// Reads up to `batch_size` lines from the cursor. When the cursor was
    /// already at end of file, the file is closed and reopened at the start
    /// once, so epochs follow each other without the caller doing anything.
    /// The only error conditions are IO failures and an empty partition
    /// file discovered on that wrap.
    #[instrument(skip(self), fields(path = %self.path.display(), batch_size = self.batch_size))]
    pub fn next_batch(&mut self) -> Result<RatingBatch> {
        let mut rows: Vec<(Vec<usize>, Vec<f32>)> = Vec::with_capacity(self.batch_size);
        let mut reopened = false;

        loop {
            let mut reader = match self.reader.take() {
                Some(open) => open,
                None => {
                    self.line_no = 0;
                    debug!(path = %self.path.display(), "opening partition for streaming");
                    BufReader::new(File::open(&self.path)?)
                }
            };

            let mut lines_read = 0usize;
            let mut line = String::new();
            while lines_read < self.batch_size {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    break;
                }
                lines_read += 1;
                self.line_no += 1;
                if let Some(parsed) = self.parse_row(line.trim_end()) {
                    rows.push(parsed);
                }
            }

            if lines_read > 0 {
                // The cursor stays parked for the next call, even at end of
                // file; the wrap happens when a read comes up empty
                self.reader = Some(reader);
                break;
            }

            // The cursor was already at the end: close it and wrap around,
            // a single reopen per call
            drop(reader);
            if reopened {
                return Err(BatchError::EmptyPartition {
                    path: self.path.clone(),
                });
            }
            if fs::metadata(&self.path)?.len() == 0 {
                return Err(BatchError::EmptyPartition {
                    path: self.path.clone(),
                });
            }
            reopened = true;
        }

        Ok(self.assemble(rows))
    }

    /// Parse one row, skipping anything malformed or out of range
    fn parse_row(&self, row: &str) -> Option<(Vec<usize>, Vec<f32>)> {
        match parse_instance(row) {
            Some((columns, values)) => {
                if columns.iter().all(|&c| c < self.embedding_width) {
                    Some((columns, values))
                } else {
                    warn!(
                        path = %self.path.display(),
                        line = self.line_no,
                        "row references columns outside the embedding width, skipping"
                    );
                    None
                }
            }
            None => {
                warn!(
                    path = %self.path.display(),
                    line = self.line_no,
                    "malformed instance row, skipping"
                );
                None
            }
        }
    }

    /// Scatter parsed rows into the batch tensors and apply corruption
    fn assemble(&mut self, rows: Vec<(Vec<usize>, Vec<f32>)>) -> RatingBatch {
        let shape = (self.batch_size, self.embedding_width);
        let mut target = Array2::<f32>::zeros(shape);
        let mut presence_mask = Array2::<f32>::zeros(shape);

        for (row, (columns, values)) in rows.iter().enumerate() {
            for (&column, &value) in columns.iter().zip(values) {
                target[[row, column]] = value;
                presence_mask[[row, column]] = 1.0;
            }
        }

        let mut input = target.clone();
        if self.corruption > 0 {
            // Corruption picks entries across the whole batch, not per row
            let positions: Vec<(usize, usize)> = rows
                .iter()
                .enumerate()
                .flat_map(|(row, (columns, _))| columns.iter().map(move |&column| (row, column)))
                .collect();
            let hide = self.corruption.min(positions.len());
            for picked in rand::seq::index::sample(&mut self.rng, positions.len(), hide) {
                let (row, column) = positions[picked];
                input[[row, column]] = 0.0;
            }
        }

        RatingBatch {
            input,
            target,
            presence_mask,
            rows: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_partition(dir: &Path, rows: &[&str]) -> PathBuf {
        let path = dir.join("train.dat");
        let mut body = String::new();
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_batches_stream_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["1 0.5", "2 1.5", "3 -0.5"]);
        let mut reader = BatchReader::new(&path, 4, 2);

        let first = reader.next_batch().unwrap();
        assert_eq!(first.rows, 2);
        assert!(first.is_full());
        assert_eq!(first.target[[0, 1]], 0.5);
        assert_eq!(first.target[[1, 2]], 1.5);
        assert_eq!(first.presence_mask[[0, 2]], 0.0);
        assert!(reader.is_streaming(), "cursor stays parked mid-file");

        let second = reader.next_batch().unwrap();
        assert_eq!(second.rows, 1, "the pass ends with a short batch");
        assert_eq!(second.target[[0, 3]], -0.5);

        // The padded slot carries no data and no mask
        assert_eq!(second.target.row(1).sum(), 0.0);
        assert_eq!(second.presence_mask.row(1).sum(), 0.0);
    }

    #[test]
    fn test_wraparound_restarts_from_the_top() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["1 0.5", "2 1.5"]);
        let mut reader = BatchReader::new(&path, 3, 1);

        let mut seen = Vec::new();
        for _ in 0..4 {
            let batch = reader.next_batch().unwrap();
            assert_eq!(batch.rows, 1);
            let column = (0..3).find(|&c| batch.target[[0, c]] != 0.0).unwrap();
            seen.push(column);
        }
        assert_eq!(seen, vec![1, 2, 1, 2], "file order repeats across passes");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(
            dir.path(),
            &["1 0.5", "not a row", "1 2 0.5", "9 0.5", "2 1.5"],
        );
        // "1 2 0.5" has an odd field count, "9 0.5" points past the width
        let mut reader = BatchReader::new(&path, 4, 8);

        let batch = reader.next_batch().unwrap();
        assert_eq!(batch.rows, 2, "only the two well-formed rows survive");
        assert_eq!(batch.target[[0, 1]], 0.5);
        assert_eq!(batch.target[[1, 2]], 1.5);
    }

    #[test]
    fn test_corruption_hides_entries_in_the_input_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["1 2 3 1.0 1.5 -0.5"]);
        let mut reader = BatchReader::new(&path, 5, 1).with_corruption(2).with_seed(11);

        let batch = reader.next_batch().unwrap();

        let target_entries = batch.target.iter().filter(|&&v| v != 0.0).count();
        let input_entries = batch.input.iter().filter(|&&v| v != 0.0).count();
        assert_eq!(target_entries, 3, "the target keeps the full row");
        assert_eq!(input_entries, 1, "two of three entries are hidden");
        assert_eq!(batch.present_entries(), 3, "the mask follows the target");

        // Whatever survives in the input must match the target exactly
        for (input, target) in batch.input.iter().zip(batch.target.iter()) {
            if *input != 0.0 {
                assert_eq!(input, target);
            }
        }
    }

    #[test]
    fn test_corruption_is_sampled_across_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["1 2 1.0 -1.0", "3 0.5", "1 3 2.0 1.5"]);
        let mut reader = BatchReader::new(&path, 4, 3).with_corruption(4).with_seed(3);

        let batch = reader.next_batch().unwrap();

        // 5 entries across three rows, 4 hidden batch-wide: exactly 1 left
        let input_entries = batch.input.iter().filter(|&&v| v != 0.0).count();
        assert_eq!(input_entries, 1);
        assert_eq!(batch.present_entries(), 5, "targets and mask stay intact");
    }

    #[test]
    fn test_corruption_is_clamped_to_the_entries_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["1 2 1.0 -1.0"]);
        let mut reader = BatchReader::new(&path, 4, 1).with_corruption(10).with_seed(3);

        let batch = reader.next_batch().unwrap();
        assert!(batch.input.iter().all(|&v| v == 0.0));
        assert_eq!(batch.present_entries(), 2);
    }

    #[test]
    fn test_empty_partition_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &[]);
        let mut reader = BatchReader::new(&path, 4, 2);

        let err = reader.next_batch().unwrap_err();
        assert!(matches!(err, BatchError::EmptyPartition { .. }));
    }

    #[test]
    fn test_partition_of_only_garbage_yields_empty_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["nope", "still nope"]);
        let mut reader = BatchReader::new(&path, 4, 2);

        // Lines were read, so this is not the empty-partition case; the
        // batch just has nothing usable in it
        let batch = reader.next_batch().unwrap();
        assert_eq!(batch.rows, 0);
        assert_eq!(batch.present_entries(), 0);
    }

    #[test]
    fn test_small_partition_fills_what_it_can_every_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_partition(dir.path(), &["1 0.5", "2 1.5", "3 2.5"]);
        let mut reader = BatchReader::new(&path, 4, 8);

        for _ in 0..3 {
            let batch = reader.next_batch().unwrap();
            assert_eq!(batch.rows, 3);
            assert_eq!(batch.capacity(), 8);
            assert!(!batch.is_full());
        }
    }
}
