//! Error types for the dataset crate.
//!
//! Rust error handling concepts demonstrated:
//! - thiserror for defining custom error types
//! - Enum variants for different error cases
//! - Error messages with context
//! - Automatic `Display` and `Error` trait implementations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or reading the prepared dataset
///
/// Rust concept: Using an enum for errors lets us handle different cases
/// The `#[derive(Error)]` macro from thiserror automatically implements
/// the `std::error::Error` trait and `Display` based on our `#[error(...)]` attributes
#[derive(Error, Debug)]
pub enum DatasetError {
    /// A required raw input file could not be found
    ///
    /// Input paths are usually relative, so the working directory is part of
    /// the message
    #[error("Missing input file {path} (working directory: {cwd})")]
    MissingInput { path: PathBuf, cwd: PathBuf },

    /// I/O error occurred while reading or writing dataset files
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in a raw source file couldn't be parsed
    ///
    /// This variant stores context about where the error occurred
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// A user id that was never recorded during ingestion
    #[error("Unknown user id: {user_id}")]
    UnknownUser { user_id: u32 },

    /// A partition row read back through a pointer did not match the row grammar
    #[error("Corrupt instance row in {file} at byte offset {offset}")]
    CorruptInstance { file: String, offset: u64 },

    /// Snapshot load was attempted while an essential file is missing or empty
    #[error("Incomplete snapshot: {path} is missing or empty")]
    IncompleteSnapshot { path: PathBuf },

    /// A freshly built dataset failed its completeness check
    #[error("Post-build check failed: {path} is missing or empty")]
    IncompleteBuild { path: PathBuf },

    /// Snapshot blob could not be serialized or deserialized
    #[error("Snapshot format error: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

/// Convenience type alias for Results in this crate
///
/// Rust concept: Type aliases make code more readable
/// Instead of writing `Result<T, DatasetError>` everywhere,
/// we can write `Result<T>`
pub type Result<T> = std::result::Result<T, DatasetError>;
