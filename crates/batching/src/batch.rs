//! The tensor bundle handed to a training step.

use ndarray::Array2;

/// One batch of dense rating rows, ready for an autoencoder step.
///
/// All three tensors share the shape `(batch_size, embedding_width)`. When a
/// partition pass ends mid-batch, the batch comes back short: only the first
/// [`rows`](RatingBatch::rows) rows carry data and the rest stay zero, which
/// the presence mask already accounts for.
#[derive(Debug, Clone)]
pub struct RatingBatch {
    /// Model input. Equal to `target` except for entries hidden by the
    /// corruption step.
    pub input: Array2<f32>,
    /// Reconstruction target, exactly as read from the partition file
    pub target: Array2<f32>,
    /// 1.0 wherever `target` holds a real rating, 0.0 elsewhere
    pub presence_mask: Array2<f32>,
    /// Number of instance rows actually read into this batch
    pub rows: usize,
}

impl RatingBatch {
    /// Number of row slots in the batch (the configured batch size)
    pub fn capacity(&self) -> usize {
        self.input.nrows()
    }

    /// Embedding width of each row
    pub fn width(&self) -> usize {
        self.input.ncols()
    }

    /// True when every row slot holds a real instance
    pub fn is_full(&self) -> bool {
        self.rows == self.capacity()
    }

    /// Total number of real rating entries in the batch
    pub fn present_entries(&self) -> usize {
        self.presence_mask.iter().filter(|&&v| v != 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_entries_counts_the_mask() {
        let mut presence_mask = Array2::<f32>::zeros((2, 4));
        presence_mask[[0, 1]] = 1.0;
        presence_mask[[0, 3]] = 1.0;
        presence_mask[[1, 2]] = 1.0;

        let batch = RatingBatch {
            input: Array2::zeros((2, 4)),
            target: Array2::zeros((2, 4)),
            presence_mask,
            rows: 2,
        };

        assert_eq!(batch.present_entries(), 3);
        assert_eq!(batch.capacity(), 2);
        assert_eq!(batch.width(), 4);
        assert!(batch.is_full());
    }
}
