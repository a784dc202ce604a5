//! Partition files and the instance row format.
//!
//! Each partition (train, test, validation) is a plain text file with one
//! ingested instance per line:
//!
//! ```text
//! <col_1> <col_2> ... <col_k> <value_1> <value_2> ... <value_k>
//! ```
//!
//! Columns come first, then the same number of normalized rating values fixed
//! to one decimal place. The byte offset of every appended row is reported
//! back to the caller so a pointer index can jump straight to it later.
//!
//! Rust concepts you'll see here:
//! - BufWriter for buffered appends with manual offset tracking
//! - Consuming `self` to model a one-way state transition (writer to sealed
//!   file)
//! - FromStr and Display for a small vocabulary enum

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// Splits
// =============================================================================

/// The three output partitions of an ingest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Test,
    Validation,
}

impl Split {
    /// All partitions, in the order their cumulative weights stack
    pub const ALL: [Split; 3] = [Split::Train, Split::Test, Split::Validation];

    /// Fraction of instances routed to this partition
    pub fn weight(self) -> f64 {
        match self {
            Split::Train => 0.70,
            Split::Test => 0.20,
            Split::Validation => 0.10,
        }
    }

    /// File name of this partition inside the data root
    pub fn file_name(self) -> &'static str {
        match self {
            Split::Train => "train.dat",
            Split::Test => "test.dat",
            Split::Validation => "validation.dat",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Test => "test",
            Split::Validation => "validation",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            "validation" | "val" => Ok(Split::Validation),
            other => Err(format!("unknown partition: {}", other)),
        }
    }
}

/// Pick a partition from a uniform draw in [0, 1).
///
/// Cumulative thresholds: [0, 0.70) goes to train, [0.70, 0.90) to test and
/// [0.90, 1.0) to validation.
pub fn split_for_draw(draw: f64) -> Split {
    if draw < 0.70 {
        Split::Train
    } else if draw < 0.90 {
        Split::Test
    } else {
        Split::Validation
    }
}

// =============================================================================
// Row Format
// =============================================================================

/// Render one instance as a partition row.
///
/// The row grammar is k columns followed by k values; values are written with
/// one decimal place, which is exact for ratings on a half-point scale.
pub fn format_instance(columns: &[usize], values: &[f32]) -> String {
    let fields: Vec<String> = columns
        .iter()
        .map(|c| c.to_string())
        .chain(values.iter().map(|v| format!("{:.1}", v)))
        .collect();
    fields.join(" ")
}

/// Parse one partition row back into (columns, values).
///
/// Returns `None` when the row does not match the grammar: an empty line, an
/// odd field count, or a field that fails to parse.
pub fn parse_instance(row: &str) -> Option<(Vec<usize>, Vec<f32>)> {
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.is_empty() || fields.len() % 2 != 0 {
        return None;
    }

    let k = fields.len() / 2;
    let mut columns = Vec::with_capacity(k);
    for field in &fields[..k] {
        columns.push(field.parse::<usize>().ok()?);
    }
    let mut values = Vec::with_capacity(k);
    for field in &fields[k..] {
        values.push(field.parse::<f32>().ok()?);
    }
    Some((columns, values))
}

// =============================================================================
// Writer and Sealed Record
// =============================================================================

/// Append-only writer for one partition file.
///
/// Tracks the byte offset of every appended row so callers can record it in a
/// pointer index. `finish` flushes and seals the writer into a read-only
/// `PartitionFile`; after that the file is only ever opened by readers.
#[derive(Debug)]
pub struct PartitionWriter {
    split: Split,
    writer: BufWriter<File>,
    offset: u64,
    instances: u64,
}

impl PartitionWriter {
    /// Create (truncating) the partition file for `split` under `dir`
    pub fn create(dir: &Path, split: Split) -> Result<Self> {
        let path = dir.join(split.file_name());
        let file = File::create(&path)?;
        Ok(Self {
            split,
            writer: BufWriter::new(file),
            offset: 0,
            instances: 0,
        })
    }

    /// Append one instance row and return the byte offset it starts at.
    ///
    /// The rows are ASCII, so the byte offset advances by the rendered length
    /// plus the newline.
    pub fn append(&mut self, columns: &[usize], values: &[f32]) -> Result<u64> {
        let row_offset = self.offset;
        let mut row = format_instance(columns, values);
        row.push('\n');
        self.writer.write_all(row.as_bytes())?;
        self.offset += row.len() as u64;
        self.instances += 1;
        Ok(row_offset)
    }

    /// Number of rows appended so far
    pub fn instances(&self) -> u64 {
        self.instances
    }

    /// The partition this writer feeds
    pub fn split(&self) -> Split {
        self.split
    }

    /// Flush and seal the writer into its read-only record.
    ///
    /// The embedding width is passed in here because it is only known once the
    /// whole entity vocabulary has been seen, after every row is written.
    pub fn finish(mut self, embedding_width: usize) -> Result<PartitionFile> {
        self.writer.flush()?;
        Ok(PartitionFile {
            split: self.split,
            file_name: self.split.file_name().to_string(),
            instances: self.instances,
            embedding_width,
        })
    }
}

/// A sealed partition: identity, row count and row width, persisted in the
/// snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionFile {
    pub split: Split,
    pub file_name: String,
    pub instances: u64,
    pub embedding_width: usize,
}

impl PartitionFile {
    /// Resolve this partition's path under `root`
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_split_for_draw_thresholds() {
        assert_eq!(split_for_draw(0.0), Split::Train);
        assert_eq!(split_for_draw(0.6999), Split::Train);
        assert_eq!(split_for_draw(0.70), Split::Test);
        assert_eq!(split_for_draw(0.8999), Split::Test);
        assert_eq!(split_for_draw(0.90), Split::Validation);
        assert_eq!(split_for_draw(0.9999), Split::Validation);
    }

    #[test]
    fn test_split_weights_sum_to_one() {
        let total: f64 = Split::ALL.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_parses_from_cli_names() {
        assert_eq!("train".parse::<Split>(), Ok(Split::Train));
        assert_eq!("VALIDATION".parse::<Split>(), Ok(Split::Validation));
        assert_eq!("val".parse::<Split>(), Ok(Split::Validation));
        assert!("holdout".parse::<Split>().is_err());
    }

    #[test]
    fn test_row_format_round_trip() {
        let columns = vec![1, 2, 7];
        let values = vec![2.5, -1.5, 0.5];

        let row = format_instance(&columns, &values);
        assert_eq!(row, "1 2 7 2.5 -1.5 0.5");

        let (parsed_columns, parsed_values) = parse_instance(&row).unwrap();
        assert_eq!(parsed_columns, columns);
        assert_eq!(parsed_values, values);
    }

    #[test]
    fn test_malformed_rows_parse_to_none() {
        assert!(parse_instance("").is_none());
        assert!(parse_instance("   ").is_none());
        assert!(parse_instance("1 2 2.5").is_none(), "odd field count");
        assert!(parse_instance("a b 1.0 2.0").is_none(), "non-numeric column");
        assert!(parse_instance("1 2 x y").is_none(), "non-numeric value");
    }

    #[test]
    fn test_writer_reports_exact_byte_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PartitionWriter::create(dir.path(), Split::Train).unwrap();

        let first = writer.append(&[1, 2], &[2.5, 0.5]).unwrap();
        let second = writer.append(&[3], &[-1.5]).unwrap();
        let third = writer.append(&[1], &[0.5]).unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, "1 2 2.5 0.5\n".len() as u64);
        assert_eq!(third, second + "3 -1.5\n".len() as u64);
        assert_eq!(writer.instances(), 3);

        let partition = writer.finish(4).unwrap();
        assert_eq!(partition.instances, 3);
        assert_eq!(partition.embedding_width, 4);
        assert_eq!(
            partition.path_under(dir.path()),
            dir.path().join("train.dat"),
            "the sealed record locates its own file"
        );

        let content = fs::read_to_string(partition.path_under(dir.path())).unwrap();
        assert_eq!(content, "1 2 2.5 0.5\n3 -1.5\n1 0.5\n");
    }
}
