//! Parsers for the raw MovieLens-style data files.
//!
//! Two grammars, both `::`-separated and ISO-8859-1 encoded:
//! - ratings: `userId::entityId::rating[::timestamp]` (trailing fields ignored)
//! - names:   `entityId::name[::genres]` (trailing fields ignored)
//!
//! The ratings file can hold millions of lines, so it is streamed one line at
//! a time instead of slurped; the ingest pass consumes an iterator of events
//! and never sees the file itself.
//!
//! Rust concepts you'll learn here:
//! - Implementing Iterator over a fallible line stream
//! - Error handling with the `?` operator and `ok_or_else`
//! - Byte-level I/O with per-line character decoding

use crate::error::{DatasetError, Result};
use crate::indexer::EntityIndexer;
use crate::types::{EntityNames, RatingEvent, RATING_SCALE_MAX, RATING_SCALE_MIN};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Decode one ISO-8859-1 line.
///
/// ISO-8859-1 is a single-byte encoding where each byte directly maps to a
/// Unicode code point, so the conversion is a plain byte-to-char cast.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Display name of a file for error messages
fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("<input>")
        .to_string()
}

/// Streaming iterator over the rating events of one source file.
///
/// Each call decodes and parses a single line; blank lines are skipped. A
/// line that does not match the grammar ends the stream with a `ParseError`
/// carrying the file name and line number.
pub struct RatingEvents {
    file_name: String,
    reader: BufReader<File>,
    line_no: usize,
    buf: Vec<u8>,
}

impl RatingEvents {
    fn next_event(&mut self) -> Result<Option<RatingEvent>> {
        loop {
            self.buf.clear();
            let bytes = self.reader.read_until(b'\n', &mut self.buf)?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = latin1_to_string(&self.buf);
            let line = line.trim();
            if line.is_empty() {
                continue; // Skip empty lines
            }
            return parse_rating_line(&self.file_name, self.line_no, line).map(Some);
        }
    }
}

impl Iterator for RatingEvents {
    type Item = Result<RatingEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Open a streaming parser over the ratings file
pub fn stream_ratings(path: &Path) -> Result<RatingEvents> {
    let file = File::open(path)?;
    Ok(RatingEvents {
        file_name: display_name(path),
        reader: BufReader::new(file),
        line_no: 0,
        buf: Vec::new(),
    })
}

/// Parse one `userId::entityId::rating[::timestamp]` line
fn parse_rating_line(file: &str, line_no: usize, line: &str) -> Result<RatingEvent> {
    let mut parts = line.split("::");

    let user_id = parts.next().ok_or_else(|| DatasetError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: "Missing userId".to_string(),
    })?;
    let entity_id = parts.next().ok_or_else(|| DatasetError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: "Missing entityId".to_string(),
    })?;
    let rating = parts.next().ok_or_else(|| DatasetError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: "Missing rating".to_string(),
    })?;
    // Anything after the rating (usually a timestamp) is ignored

    let rating: f32 = rating.parse().map_err(|e| DatasetError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: format!("Invalid rating: {}", e),
    })?;
    if !(RATING_SCALE_MIN..=RATING_SCALE_MAX).contains(&rating) {
        return Err(DatasetError::InvalidValue {
            field: "rating".to_string(),
            value: rating.to_string(),
        });
    }

    Ok(RatingEvent {
        user_id: user_id.parse().map_err(|e| DatasetError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: format!("Invalid userId: {}", e),
        })?,
        entity_id: entity_id.parse().map_err(|e| DatasetError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: format!("Invalid entityId: {}", e),
        })?,
        rating,
        line: line_no,
    })
}

/// Read the entity-name file and keep names for entities the indexer has seen.
///
/// The names file usually lists the full catalog while a debug ingest only
/// touches a slice of it, so unseen entities are skipped rather than errors.
pub fn read_entity_names(path: &Path, indexer: &EntityIndexer) -> Result<EntityNames> {
    let file_name = display_name(path);
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut names = EntityNames::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = latin1_to_string(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue; // Skip empty lines
        }

        let mut parts = line.split("::");
        let entity_id = parts.next().ok_or_else(|| DatasetError::ParseError {
            file: file_name.clone(),
            line: line_no,
            reason: "Missing entityId".to_string(),
        })?;
        let name = parts.next().ok_or_else(|| DatasetError::ParseError {
            file: file_name.clone(),
            line: line_no,
            reason: "Missing name".to_string(),
        })?;

        let entity_id: u32 = entity_id.parse().map_err(|e| DatasetError::ParseError {
            file: file_name.clone(),
            line: line_no,
            reason: format!("Invalid entityId: {}", e),
        })?;

        if let Some(column) = indexer.column_of(entity_id) {
            names.insert(name.to_string(), column);
        }
    }

    debug!(named = names.len(), "entity names attached");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rating_line_with_timestamp() {
        let event = parse_rating_line("ratings.dat", 1, "1::1193::5::978300760").unwrap();
        assert_eq!(event.user_id, 1);
        assert_eq!(event.entity_id, 1193);
        assert_eq!(event.rating, 5.0);
        assert_eq!(event.line, 1);
    }

    #[test]
    fn test_rating_line_without_timestamp() {
        let event = parse_rating_line("ratings.dat", 3, "42::7::3.5").unwrap();
        assert_eq!(event.user_id, 42);
        assert_eq!(event.rating, 3.5);
        assert_eq!(event.line, 3);
    }

    #[test]
    fn test_missing_fields_are_parse_errors() {
        let err = parse_rating_line("ratings.dat", 2, "1::1193").unwrap_err();
        assert!(matches!(err, DatasetError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_out_of_scale_rating_is_invalid() {
        let err = parse_rating_line("ratings.dat", 1, "1::2::9").unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { .. }));
    }

    #[test]
    fn test_stream_skips_blank_lines_and_counts_all_of_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.dat");
        fs::write(&path, "1::10::5::978300760\n\n2::20::3::978300760\n").unwrap();

        let events: Vec<RatingEvent> = stream_ratings(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].line, 1);
        assert_eq!(events[1].line, 3, "blank lines still advance the counter");
    }

    #[test]
    fn test_names_are_filtered_to_seen_entities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.dat");
        fs::write(
            &path,
            "10::Toy Story (1995)::Animation|Comedy\n20::Jumanji (1995)::Adventure\n",
        )
        .unwrap();

        let mut indexer = EntityIndexer::new();
        indexer.resolve(10);

        let names = read_entity_names(&path, &indexer).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.column_for("Toy Story (1995)"), Some(1));
        assert_eq!(names.column_for("Jumanji (1995)"), None);
    }

    #[test]
    fn test_latin1_names_survive_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.dat");
        // "Les Misérables" with é as the single ISO-8859-1 byte 0xE9
        fs::write(&path, b"7::Les Mis\xe9rables (1995)::Drama\n").unwrap();

        let mut indexer = EntityIndexer::new();
        indexer.resolve(7);

        let names = read_entity_names(&path, &indexer).unwrap();
        assert_eq!(names.column_for("Les Misérables (1995)"), Some(1));
    }
}
