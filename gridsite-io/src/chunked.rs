//! Chunked time-series reads.
//!
//! A full-extent read of a fine-resolution variable at one location can be
//! slow and memory hungry against remote or service-backed stores. The reader
//! instead walks the time axis in bounded batches and concatenates them.

use crate::store::{AxisSlice, DataStore};
use crate::{Error, Result};
use gridsite_core::GridIndex;
use ndarray::{Array1, ArrayD};
use rayon::prelude::*;
use std::ops::Range;

/// Default number of time steps per batch.
pub const DEFAULT_BATCH_SIZE: usize = 8000;

/// Configuration for chunked reads.
#[derive(Clone, Debug)]
pub struct ChunkConfig {
    /// Maximum time steps per read.
    pub batch_size: usize,
    /// Optional number of worker threads for concurrent batch reads.
    pub parallelism: Option<usize>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: None,
        }
    }
}

impl ChunkConfig {
    /// Set the batch size.
    ///
    /// Values less than 1 are clamped to 1. Use [`Self::try_with_batch_size`]
    /// to surface invalid values as an error instead.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the number of worker threads.
    ///
    /// Values less than 1 are clamped to 1.
    #[must_use]
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads.max(1));
        self
    }

    /// Fallible variant of [`Self::with_batch_size`].
    ///
    /// # Errors
    /// Returns an error if `batch_size` is 0.
    pub fn try_with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidInput(
                "batch_size must be at least 1".to_string(),
            ));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Fallible variant of [`Self::with_parallelism`].
    ///
    /// # Errors
    /// Returns an error if `threads` is 0.
    pub fn try_with_parallelism(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidInput(
                "parallelism must be at least 1".to_string(),
            ));
        }
        self.parallelism = Some(threads);
        Ok(self)
    }

    /// Return the configured worker thread count, clamped to at least 1.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or(1).max(1)
    }
}

/// Batch ranges covering `0..extent`, each at most `batch_size` long.
///
/// The last range is clipped to the extent; there is never an empty range.
/// A `batch_size` of 0 is treated as 1.
pub fn batch_ranges(extent: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..extent)
        .step_by(batch_size)
        .map(move |start| start..(start + batch_size).min(extent))
}

/// Fixed spatial location of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialIndex {
    /// Cell of a `(time, row, col)` variable.
    Grid(GridIndex),
    /// Site of a `(time, site)` variable.
    Site(usize),
}

impl SpatialIndex {
    /// Rank of the variables this index addresses.
    #[must_use]
    pub fn expected_rank(&self) -> usize {
        match self {
            Self::Grid(_) => 3,
            Self::Site(_) => 2,
        }
    }

    /// Per-axis selection for one batch of time steps.
    fn selection(&self, time: &Range<usize>, spatial: &[usize]) -> Vec<AxisSlice> {
        let mut selection = vec![AxisSlice::range(time.start, time.end)];
        selection.extend(spatial.iter().map(|&i| AxisSlice::index(i)));
        selection
    }

    /// Validates against a variable shape, returning unsigned spatial indices.
    fn checked(&self, variable: &str, shape: &[usize]) -> Result<Vec<usize>> {
        if shape.len() != self.expected_rank() {
            return Err(Error::DimensionMismatch {
                variable: variable.to_string(),
                expected: self.expected_rank(),
                actual: shape.len(),
            });
        }
        let out_of_range = || {
            Error::InvalidInput(format!(
                "{self:?} is outside {variable} with shape {shape:?}"
            ))
        };
        match *self {
            Self::Grid(idx) => {
                let (row, col) = idx.checked((shape[1], shape[2])).ok_or_else(out_of_range)?;
                Ok(vec![row, col])
            }
            Self::Site(site) => {
                if site >= shape[1] {
                    return Err(out_of_range());
                }
                Ok(vec![site])
            }
        }
    }
}

/// Reads complete time series in bounded batches.
#[derive(Clone, Debug, Default)]
pub struct ChunkedReader {
    config: ChunkConfig,
}

impl ChunkedReader {
    /// Create a reader with the given configuration.
    #[must_use]
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Reads the full time series of `variable` at `index`.
    ///
    /// Batches are read sequentially unless parallelism above 1 is
    /// configured, in which case they run on a rayon pool. Either way the
    /// result is in chronological order.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] for a rank the index cannot
    /// address, [`Error::InvalidInput`] for an out-of-extent index, and the
    /// first failing batch read otherwise. Nothing is retried.
    pub fn read<S: DataStore + ?Sized>(
        &self,
        store: &S,
        variable: &str,
        index: SpatialIndex,
    ) -> Result<Array1<f64>> {
        let shape = store.shape(variable)?;
        let spatial = index.checked(variable, &shape)?;
        let extent = shape[0];
        let ranges: Vec<Range<usize>> = batch_ranges(extent, self.config.batch_size).collect();
        log::debug!(
            "reading {variable} at {index:?}: {extent} steps in {} batches",
            ranges.len()
        );

        let read_batch = |range: &Range<usize>| -> Result<ArrayD<f64>> {
            let selection = index.selection(range, &spatial);
            store.read_slice(variable, &selection).map_err(|e| match e {
                Error::Read { reason, .. } => Error::Read {
                    variable: format!("{variable}[{}..{}]", range.start, range.end),
                    reason,
                },
                other => other,
            })
        };

        let threads = self.config.effective_parallelism();
        let batches: Vec<ArrayD<f64>> = if threads > 1 && ranges.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::InvalidInput(format!("failed to build thread pool: {e}")))?;
            pool.install(|| ranges.par_iter().map(read_batch).collect::<Result<_>>())?
        } else {
            ranges.iter().map(read_batch).collect::<Result<_>>()?
        };

        let mut series = Vec::with_capacity(extent);
        for batch in batches {
            series.extend(batch.iter().copied());
        }
        if series.len() != extent {
            return Err(Error::read(
                variable,
                format!("expected {extent} values, got {}", series.len()),
            ));
        }
        Ok(Array1::from(series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ranges_split() {
        let ranges: Vec<_> = batch_ranges(20_000, 8000).collect();
        assert_eq!(ranges, vec![0..8000, 8000..16_000, 16_000..20_000]);
    }

    #[test]
    fn test_batch_ranges_exact_multiple_has_no_empty_tail() {
        let ranges: Vec<_> = batch_ranges(16_000, 8000).collect();
        assert_eq!(ranges, vec![0..8000, 8000..16_000]);
    }

    #[test]
    fn test_batch_ranges_edge_cases() {
        assert_eq!(batch_ranges(0, 8000).count(), 0);
        assert_eq!(batch_ranges(5, 8000).collect::<Vec<_>>(), vec![0..5]);
        assert_eq!(batch_ranges(3, 1).count(), 3);
        assert_eq!(batch_ranges(3, 0).count(), 3);
    }

    #[test]
    fn test_chunk_config_builders() {
        assert!(ChunkConfig::default().try_with_batch_size(0).is_err());
        assert!(ChunkConfig::default().try_with_parallelism(0).is_err());
        let config = ChunkConfig::default()
            .with_batch_size(0)
            .with_parallelism(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.effective_parallelism(), 1);
    }

    #[test]
    fn test_spatial_index_checked() {
        let grid = SpatialIndex::Grid(GridIndex::new(1, 2));
        assert_eq!(grid.checked("wind", &[10, 3, 3]).unwrap(), vec![1, 2]);
        assert!(matches!(
            grid.checked("wind", &[10, 3]),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
        assert!(matches!(
            SpatialIndex::Grid(GridIndex::new(-1, 0)).checked("wind", &[10, 3, 3]),
            Err(Error::InvalidInput(_))
        ));
        assert!(SpatialIndex::Site(4).checked("ghi", &[10, 4]).is_err());
    }
}
