//! # Batching Crate
//!
//! This crate turns prepared partition files into training batches for an
//! autoencoder.
//!
//! ## Components
//!
//! ### BatchReader
//! Sequential streaming over one partition file:
//! - Reads instance rows in file order, batch by batch
//! - Wraps around at end of file for multi-epoch training
//! - Skips malformed rows instead of aborting the run
//!
//! ### RatingBatch
//! The tensor bundle for one training step:
//! - Input (optionally corrupted), target, and presence mask
//! - All three share the shape `(batch_size, embedding_width)`
//!
//! ## Example Usage
//!
//! ```ignore
//! use batching::BatchReader;
//! use dataset::Split;
//!
//! let mut reader = BatchReader::for_split(&dataset, Split::Train, 128)
//!     .with_corruption(3)
//!     .with_seed(42);
//!
//! for _ in 0..steps {
//!     let batch = reader.next_batch()?;
//!     train_step(&batch.input, &batch.target, &batch.presence_mask);
//! }
//! ```
//!
//! ## Learning Goals - Phase 2
//!
//! This phase teaches:
//!
//! 1. **Buffered IO**: Streaming large files without loading them whole
//! 2. **Ndarray**: Building 2-D tensors and scattering sparse rows into them
//! 3. **State Machines**: `Option<BufReader>` as an explicit open/closed cursor
//! 4. **Randomness**: Seeded sampling for reproducible input corruption

// Public modules
pub mod batch;
pub mod reader;

// Re-export commonly used types
pub use batch::RatingBatch;
pub use reader::{BatchError, BatchReader, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_reader_creation_defers_the_open() {
        let reader = BatchReader::new(Path::new("nowhere/train.dat"), 8, 32);

        // Nothing is opened until the first batch is requested
        assert!(!reader.is_streaming());
        assert_eq!(reader.batch_size(), 32);
        assert_eq!(reader.path(), Path::new("nowhere/train.dat"));
    }

    #[test]
    fn test_zero_batch_size_is_bumped_to_one() {
        let reader = BatchReader::new(Path::new("nowhere/train.dat"), 8, 0);
        assert_eq!(reader.batch_size(), 1);
    }
}
