//! Backing-store abstraction.
//!
//! Everything above this module talks to data through [`DataStore`]: a local
//! HDF5 file, an in-memory staging store, or any remote array service that
//! implements the trait.

use crate::{Error, Result};
use gridsite_core::SiteMeta;
use ndarray::ArrayD;
use std::fmt;
use std::ops::Range;

/// Per-axis `(start, stop, step)` selection, stop exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSlice {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl AxisSlice {
    /// A contiguous range with unit step.
    #[must_use]
    pub const fn range(start: usize, stop: usize) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    /// A strided range.
    #[must_use]
    pub const fn strided(start: usize, stop: usize, step: usize) -> Self {
        Self { start, stop, step }
    }

    /// A single index.
    #[must_use]
    pub const fn index(i: usize) -> Self {
        Self::range(i, i + 1)
    }

    /// The whole axis.
    #[must_use]
    pub const fn full() -> Self {
        Self::range(0, usize::MAX)
    }

    /// Clips the selection to an axis of length `len`.
    #[must_use]
    pub fn clip(self, len: usize) -> Self {
        let stop = self.stop.min(len);
        Self {
            start: self.start.min(stop),
            stop,
            step: self.step,
        }
    }

    /// Number of selected elements (after clipping).
    #[must_use]
    pub fn count(&self) -> usize {
        if self.stop <= self.start || self.step == 0 {
            0
        } else {
            (self.stop - self.start).div_ceil(self.step)
        }
    }
}

impl From<Range<usize>> for AxisSlice {
    fn from(r: Range<usize>) -> Self {
        Self::range(r.start, r.end)
    }
}

/// Validates a selection against a variable shape and clips it to bounds.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the selection rank differs from
/// the variable rank and [`Error::InvalidInput`] for zero steps.
pub fn clip_selection(
    variable: &str,
    shape: &[usize],
    selection: &[AxisSlice],
) -> Result<Vec<AxisSlice>> {
    if selection.len() != shape.len() {
        return Err(Error::DimensionMismatch {
            variable: variable.to_string(),
            expected: shape.len(),
            actual: selection.len(),
        });
    }
    selection
        .iter()
        .zip(shape)
        .map(|(s, &len)| {
            if s.step == 0 {
                Err(Error::InvalidInput(format!(
                    "zero step in selection of {variable}"
                )))
            } else {
                Ok(s.clip(len))
            }
        })
        .collect()
}

/// Read access to a dataset resource.
///
/// Implementations must be shareable across threads: the chunked reader may
/// issue independent batch reads in parallel.
pub trait DataStore: Send + Sync {
    /// Returns true if `name` is a variable of this resource.
    fn contains(&self, name: &str) -> bool;

    /// Names of all top-level variables.
    ///
    /// # Errors
    /// Returns an error if the listing fails.
    fn variables(&self) -> Result<Vec<String>>;

    /// Shape of a variable.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for unknown variables.
    fn shape(&self, name: &str) -> Result<Vec<usize>>;

    /// Reads a rectangular, possibly strided, slice.
    ///
    /// Bounds are clipped to the variable's extent.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`], [`Error::DimensionMismatch`] or
    /// [`Error::Read`].
    fn read_slice(&self, name: &str, selection: &[AxisSlice]) -> Result<ArrayD<f64>>;

    /// Reads a whole variable.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] or [`Error::Read`].
    fn read_all(&self, name: &str) -> Result<ArrayD<f64>>;

    /// Reads a 1-d string variable.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] or [`Error::Read`].
    fn read_strings(&self, name: &str) -> Result<Vec<String>>;

    /// Reads a metadata table.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] or [`Error::Read`].
    fn read_table(&self, name: &str) -> Result<SiteMeta>;

    /// Reads a numeric scalar attribute of a variable, `None` if absent.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the variable does not exist.
    fn attr_f64(&self, name: &str, attr: &str) -> Result<Option<f64>>;

    /// Rank of a variable.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for unknown variables.
    fn rank(&self, name: &str) -> Result<usize> {
        Ok(self.shape(name)?.len())
    }
}

impl<S: DataStore + ?Sized> DataStore for &S {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
    fn variables(&self) -> Result<Vec<String>> {
        (**self).variables()
    }
    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        (**self).shape(name)
    }
    fn read_slice(&self, name: &str, selection: &[AxisSlice]) -> Result<ArrayD<f64>> {
        (**self).read_slice(name, selection)
    }
    fn read_all(&self, name: &str) -> Result<ArrayD<f64>> {
        (**self).read_all(name)
    }
    fn read_strings(&self, name: &str) -> Result<Vec<String>> {
        (**self).read_strings(name)
    }
    fn read_table(&self, name: &str) -> Result<SiteMeta> {
        (**self).read_table(name)
    }
    fn attr_f64(&self, name: &str, attr: &str) -> Result<Option<f64>> {
        (**self).attr_f64(name, attr)
    }
}

impl<S: DataStore + ?Sized> DataStore for Box<S> {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
    fn variables(&self) -> Result<Vec<String>> {
        (**self).variables()
    }
    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        (**self).shape(name)
    }
    fn read_slice(&self, name: &str, selection: &[AxisSlice]) -> Result<ArrayD<f64>> {
        (**self).read_slice(name, selection)
    }
    fn read_all(&self, name: &str) -> Result<ArrayD<f64>> {
        (**self).read_all(name)
    }
    fn read_strings(&self, name: &str) -> Result<Vec<String>> {
        (**self).read_strings(name)
    }
    fn read_table(&self, name: &str) -> Result<SiteMeta> {
        (**self).read_table(name)
    }
    fn attr_f64(&self, name: &str, attr: &str) -> Result<Option<f64>> {
        (**self).attr_f64(name, attr)
    }
}

/// Where a resource lives, classified by path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Local file read through the HDF5 library.
    Posix(String),
    /// `hdf5://` domain on a distributed HDF5 service.
    Hsds(String),
    /// `s3://` object.
    S3(String),
    /// `http://` or `https://` object (read-only S3 over HTTP).
    Http(String),
}

impl StoreLocation {
    /// Classifies a path by its prefix.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        if path.starts_with("hdf5://") {
            Self::Hsds(path.to_string())
        } else if path.starts_with("s3://") {
            Self::S3(path.to_string())
        } else if path.starts_with("http://") || path.starts_with("https://") {
            Self::Http(path.to_string())
        } else {
            Self::Posix(path.to_string())
        }
    }

    /// The raw path or URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Posix(p) | Self::Hsds(p) | Self::S3(p) | Self::Http(p) => p,
        }
    }

    /// Driver name.
    #[must_use]
    pub fn driver(&self) -> &'static str {
        match self {
            Self::Posix(_) => "posix",
            Self::Hsds(_) => "hsds",
            Self::S3(_) => "s3fs",
            Self::Http(_) => "ros3",
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.driver())
    }
}
