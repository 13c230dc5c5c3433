//! Grid coordinate resolution.
//!
//! Maps geographic coordinates onto the (row, col) indices of a regular grid
//! laid out in a conformal projection. Rather than searching the (very large)
//! per-cell coordinate table, the point is projected and its offset from the
//! projected grid origin divided by the grid spacing.

use gridsite_core::{
    Error, GridBounds, GridIndex, LambertConformal, LatLon, ProjectedPoint, Result,
};
use rayon::prelude::*;

/// Grid spacing of the wind toolkit CONUS grid (meters).
pub const DEFAULT_GRID_SPACING_M: f64 = 2000.0;

/// Default edge sampling density for bounding box resolution.
pub const DEFAULT_SAMPLES_PER_EDGE: usize = 5000;

/// Bounding box resolution configuration.
#[derive(Clone, Debug)]
pub struct BoundsConfig {
    /// Points sampled along each rectangle edge, endpoints included.
    pub samples_per_edge: usize,
    /// Resolve edge samples in parallel.
    pub parallel: bool,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            samples_per_edge: DEFAULT_SAMPLES_PER_EDGE,
            parallel: true,
        }
    }
}

impl BoundsConfig {
    /// Set the number of samples per edge.
    #[must_use]
    pub fn with_samples_per_edge(mut self, samples: usize) -> Self {
        self.samples_per_edge = samples;
        self
    }

    /// Enable or disable parallel edge resolution.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Resolves geographic coordinates to grid indices.
///
/// Holds the projection and the projected grid origin, both immutable after
/// construction, so a resolver can be shared freely across threads.
#[derive(Clone, Debug)]
pub struct GridResolver {
    projection: LambertConformal,
    origin: ProjectedPoint,
    spacing_m: f64,
}

impl GridResolver {
    /// Create a resolver from the geographic coordinate stored at grid
    /// index (0, 0).
    ///
    /// # Errors
    /// Returns an error if the origin is not a valid coordinate or the
    /// spacing is not positive.
    pub fn new(projection: LambertConformal, origin: LatLon, spacing_m: f64) -> Result<Self> {
        let origin = projection.project(origin.validate()?);
        Self::from_projected_origin(projection, origin, spacing_m)
    }

    /// Create a resolver from an origin already in projected space.
    ///
    /// # Errors
    /// Returns an error if the spacing is not a positive finite number.
    pub fn from_projected_origin(
        projection: LambertConformal,
        origin: ProjectedPoint,
        spacing_m: f64,
    ) -> Result<Self> {
        if !(spacing_m.is_finite() && spacing_m > 0.0) {
            return Err(Error::InvalidInput(format!(
                "grid spacing must be positive, got {spacing_m}"
            )));
        }
        Ok(Self {
            projection,
            origin,
            spacing_m,
        })
    }

    /// The projection in use.
    #[must_use]
    pub fn projection(&self) -> &LambertConformal {
        &self.projection
    }

    /// Projected grid origin.
    #[must_use]
    pub fn origin(&self) -> ProjectedPoint {
        self.origin
    }

    /// Grid spacing (meters).
    #[must_use]
    pub fn spacing_m(&self) -> f64 {
        self.spacing_m
    }

    /// Nearest grid index of a geographic coordinate.
    ///
    /// No bounds checking: coordinates outside the grid yield out-of-range
    /// (possibly negative) indices.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] for non-finite or out-of-domain
    /// coordinates.
    pub fn resolve(&self, point: LatLon) -> Result<GridIndex> {
        Ok(self.locate(point.validate()?))
    }

    /// Nearest grid index of a point already in projected space.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for non-finite coordinates.
    pub fn resolve_projected(&self, point: ProjectedPoint) -> Result<GridIndex> {
        if !(point.x.is_finite() && point.y.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "projected point ({}, {}) is not finite",
                point.x, point.y
            )));
        }
        Ok(self.snap(point))
    }

    fn locate(&self, point: LatLon) -> GridIndex {
        self.snap(self.projection.project(point))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn snap(&self, point: ProjectedPoint) -> GridIndex {
        let dx = point.x - self.origin.x;
        let dy = point.y - self.origin.y;
        // Row follows projected y, column projected x.
        GridIndex {
            row: (dy / self.spacing_m).round() as i64,
            col: (dx / self.spacing_m).round() as i64,
        }
    }

    /// Geographic coordinate at the center of a grid cell.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, index: GridIndex) -> LatLon {
        self.projection.unproject(ProjectedPoint {
            x: self.origin.x + index.col as f64 * self.spacing_m,
            y: self.origin.y + index.row as f64 * self.spacing_m,
        })
    }

    /// Grid index rectangle enclosing a geographic rectangle.
    ///
    /// Rectangle edges are not straight lines in grid space, so every edge is
    /// sampled densely and the elementwise min/max of all resolved samples is
    /// returned.
    ///
    /// # Errors
    /// Returns an error for invalid corners or fewer than two samples per
    /// edge.
    pub fn resolve_bounds(
        &self,
        sw: LatLon,
        ne: LatLon,
        config: &BoundsConfig,
    ) -> Result<GridBounds> {
        let sw = sw.validate()?;
        let ne = ne.validate()?;
        if config.samples_per_edge < 2 {
            return Err(Error::InvalidInput(format!(
                "samples_per_edge must be at least 2, got {}",
                config.samples_per_edge
            )));
        }

        let nw = LatLon::new(ne.lat, sw.lon);
        let se = LatLon::new(sw.lat, ne.lon);
        let edges = [(sw, nw), (se, ne), (sw, se), (nw, ne)];
        let n = config.samples_per_edge;
        let first = self.locate(sw);

        let sample = |k: usize| {
            let (a, b) = edges[k / n];
            self.locate(linspace_point(a, b, k % n, n))
        };
        let merge = |mut acc: GridBounds, idx: GridIndex| {
            acc.include(idx);
            acc
        };

        let bounds = if config.parallel {
            (0..edges.len() * n)
                .into_par_iter()
                .map(sample)
                .fold(|| GridBounds::point(first), merge)
                .reduce(
                    || GridBounds::point(first),
                    |mut a, b| {
                        a.include(b.min);
                        a.include(b.max);
                        a
                    },
                )
        } else {
            (0..edges.len() * n)
                .map(sample)
                .fold(GridBounds::point(first), merge)
        };
        Ok(bounds)
    }

    /// Grid index rectangle from projected lower-left / upper-right corners.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if either corner is not finite.
    pub fn resolve_projected_bounds(
        &self,
        ll: ProjectedPoint,
        ur: ProjectedPoint,
    ) -> Result<GridBounds> {
        let mut bounds = GridBounds::point(self.resolve_projected(ll)?);
        bounds.include(self.resolve_projected(ur)?);
        Ok(bounds)
    }
}

/// `k`-th of `n` evenly spaced points from `a` to `b`, endpoints included.
#[allow(clippy::cast_precision_loss)]
fn linspace_point(a: LatLon, b: LatLon, k: usize, n: usize) -> LatLon {
    if k + 1 == n {
        return b;
    }
    a.lerp(b, k as f64 / (n - 1) as f64)
}
