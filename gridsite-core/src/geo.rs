//! Geographic coordinates and grid index types.

use crate::{Error, Result};
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatLon {
    /// Latitude (degrees north).
    pub lat: f64,
    /// Longitude (degrees east).
    pub lon: f64,
}

impl LatLon {
    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Checks that the coordinate is finite and inside the geographic domain.
    ///
    /// Longitudes up to 360 are accepted so that 0..360 conventions pass.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] otherwise.
    pub fn validate(self) -> Result<Self> {
        if !self.lat.is_finite()
            || !self.lon.is_finite()
            || self.lat.abs() > 90.0
            || self.lon.abs() > 360.0
        {
            return Err(Error::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            });
        }
        Ok(self)
    }

    /// Linearly interpolates between `self` and `other` (`t` in `[0, 1]`).
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// A point in projected (planar) coordinates, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Signed (row, col) index on a regular grid.
///
/// Signed so that points outside the grid extent are still representable;
/// callers clip when they need to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridIndex {
    /// Row (projected y axis).
    pub row: i64,
    /// Column (projected x axis).
    pub col: i64,
}

impl GridIndex {
    /// Creates a new grid index.
    #[must_use]
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Converts to unsigned indices if both lie inside `shape` (rows, cols).
    #[must_use]
    pub fn checked(self, shape: (usize, usize)) -> Option<(usize, usize)> {
        let row = usize::try_from(self.row).ok()?;
        let col = usize::try_from(self.col).ok()?;
        (row < shape.0 && col < shape.1).then_some((row, col))
    }

    /// Elementwise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self {
            row: self.row.min(other.row),
            col: self.col.min(other.col),
        }
    }

    /// Elementwise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            row: self.row.max(other.row),
            col: self.col.max(other.col),
        }
    }
}

/// Inclusive rectangle of grid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridBounds {
    pub min: GridIndex,
    pub max: GridIndex,
}

impl GridBounds {
    /// Bounds covering a single cell.
    #[must_use]
    pub const fn point(index: GridIndex) -> Self {
        Self {
            min: index,
            max: index,
        }
    }

    /// Grows the bounds to include `index`.
    pub fn include(&mut self, index: GridIndex) {
        self.min = self.min.min(index);
        self.max = self.max.max(index);
    }

    /// Inclusive row range.
    #[must_use]
    pub fn rows(&self) -> RangeInclusive<i64> {
        self.min.row..=self.max.row
    }

    /// Inclusive column range.
    #[must_use]
    pub fn cols(&self) -> RangeInclusive<i64> {
        self.min.col..=self.max.col
    }

    /// Number of (rows, cols) covered.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn shape(&self) -> (usize, usize) {
        (
            (self.max.row - self.min.row + 1) as usize,
            (self.max.col - self.min.col + 1) as usize,
        )
    }

    /// Returns true when the bounds cover exactly one cell.
    #[must_use]
    pub fn is_point(&self) -> bool {
        self.min == self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_out_of_domain() {
        assert!(LatLon::new(91.0, 0.0).validate().is_err());
        assert!(LatLon::new(0.0, f64::NAN).validate().is_err());
        assert!(LatLon::new(40.0, -105.0).validate().is_ok());
        assert!(LatLon::new(40.0, 255.0).validate().is_ok());
    }

    #[test]
    fn test_grid_index_checked() {
        let idx = GridIndex::new(3, 4);
        assert_eq!(idx.checked((10, 10)), Some((3, 4)));
        assert_eq!(idx.checked((3, 10)), None);
        assert_eq!(GridIndex::new(-1, 0).checked((10, 10)), None);
    }

    #[test]
    fn test_bounds_include() {
        let mut bounds = GridBounds::point(GridIndex::new(5, 5));
        assert!(bounds.is_point());
        bounds.include(GridIndex::new(2, 8));
        bounds.include(GridIndex::new(7, 6));
        assert_eq!(bounds.min, GridIndex::new(2, 5));
        assert_eq!(bounds.max, GridIndex::new(7, 8));
        assert_eq!(bounds.shape(), (6, 4));
        assert_eq!(bounds.rows(), 2..=7);
    }
}
