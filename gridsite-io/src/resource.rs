//! Resource handles for grid and site datasets.
//!
//! A handle is loaded once: the coordinate lookup structures and the site
//! metadata are read up front, after which every query is answered against
//! that immutable state plus slice reads from the backing store.

use crate::chunked::{ChunkConfig, ChunkedReader, SpatialIndex};
use crate::store::{AxisSlice, DataStore};
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use gridsite_algorithms::{
    conus_indices, nearest_timestep, region_indices, BoundsConfig, GridResolver, NearestSite,
    SiteIndex, DEFAULT_GRID_SPACING_M,
};
use gridsite_core::{GridBounds, GridIndex, LambertConformal, LatLon, SiteMeta, TimeIndex};
use ndarray::{Array1, Array2, ArrayD, Axis, Ix2};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the time variable used when the configured one is absent.
pub const FALLBACK_TIME_VARIABLE: &str = "datetime";

/// Attribute holding the integer scaling of stored values.
pub const SCALE_FACTOR_ATTR: &str = "scale_factor";

/// Configuration for [`GridResource::load`].
#[derive(Clone, Debug)]
pub struct GridConfig {
    /// Variable holding `(row, col, 2)` cell coordinates.
    pub coordinates: String,
    /// Grid spacing in meters.
    pub spacing_m: f64,
    /// Projection the grid is regular in.
    pub projection: LambertConformal,
    /// Chunked read settings.
    pub chunk: ChunkConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            coordinates: "coordinates".to_string(),
            spacing_m: DEFAULT_GRID_SPACING_M,
            projection: LambertConformal::wind_toolkit(),
            chunk: ChunkConfig::default(),
        }
    }
}

impl GridConfig {
    /// Set the coordinate variable name.
    #[must_use]
    pub fn with_coordinates<S: Into<String>>(mut self, name: S) -> Self {
        self.coordinates = name.into();
        self
    }

    /// Set the grid spacing.
    #[must_use]
    pub fn with_spacing_m(mut self, spacing_m: f64) -> Self {
        self.spacing_m = spacing_m;
        self
    }

    /// Set the projection.
    #[must_use]
    pub fn with_projection(mut self, projection: LambertConformal) -> Self {
        self.projection = projection;
        self
    }

    /// Set the chunked read settings.
    #[must_use]
    pub fn with_chunk(mut self, chunk: ChunkConfig) -> Self {
        self.chunk = chunk;
        self
    }
}

/// Time range and strides of a bounding-box extract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxSelection {
    /// Time steps, stop exclusive; clipped to the variable.
    pub time: Range<usize>,
    /// Time stride.
    pub tskip: usize,
    /// Spatial stride, applied to rows and columns.
    pub skip: usize,
}

impl Default for BoxSelection {
    fn default() -> Self {
        Self {
            time: 0..usize::MAX,
            tskip: 1,
            skip: 1,
        }
    }
}

impl BoxSelection {
    /// Set the time range.
    #[must_use]
    pub fn with_time(mut self, time: Range<usize>) -> Self {
        self.time = time;
        self
    }

    /// Set the time stride. Values less than 1 are clamped to 1.
    #[must_use]
    pub fn with_tskip(mut self, tskip: usize) -> Self {
        self.tskip = tskip.max(1);
        self
    }

    /// Set the spatial stride. Values less than 1 are clamped to 1.
    #[must_use]
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip.max(1);
        self
    }
}

/// Handle on a gridded `(time, row, col)` dataset.
pub struct GridResource<S> {
    store: S,
    coordinates: String,
    shape: (usize, usize),
    resolver: GridResolver,
    reader: ChunkedReader,
}

impl<S: DataStore> GridResource<S> {
    /// Loads the handle: reads the origin cell and builds the resolver.
    ///
    /// # Errors
    /// Returns an error if the coordinate variable is missing, is not shaped
    /// `(row, col, 2)`, or holds an invalid origin.
    pub fn load(store: S, config: &GridConfig) -> Result<Self> {
        let shape = store.shape(&config.coordinates)?;
        if shape.len() != 3 {
            return Err(Error::DimensionMismatch {
                variable: config.coordinates.clone(),
                expected: 3,
                actual: shape.len(),
            });
        }
        if shape[2] != 2 || shape[0] == 0 || shape[1] == 0 {
            return Err(Error::InvalidInput(format!(
                "{} must be shaped (row, col, 2), got {shape:?}",
                config.coordinates
            )));
        }

        let cell = store.read_slice(
            &config.coordinates,
            &[AxisSlice::index(0), AxisSlice::index(0), AxisSlice::range(0, 2)],
        )?;
        let origin = lat_lon(&cell, &config.coordinates)?;
        let resolver = GridResolver::new(config.projection, origin, config.spacing_m)?;
        log::info!(
            "loaded grid {}x{} with origin ({:.5}, {:.5})",
            shape[0],
            shape[1],
            origin.lat,
            origin.lon
        );

        Ok(Self {
            store,
            coordinates: config.coordinates.clone(),
            shape: (shape[0], shape[1]),
            resolver,
            reader: ChunkedReader::new(config.chunk.clone()),
        })
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The grid resolver.
    pub fn resolver(&self) -> &GridResolver {
        &self.resolver
    }

    /// Grid extent as `(rows, cols)`.
    pub fn grid_shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Resolves a coordinate to its grid cell. The result may lie outside
    /// the grid.
    ///
    /// # Errors
    /// Returns an error for non-finite or out-of-domain coordinates.
    pub fn resolve(&self, point: LatLon) -> Result<GridIndex> {
        Ok(self.resolver.resolve(point)?)
    }

    /// Index rectangle enclosing a lat/lon rectangle.
    ///
    /// # Errors
    /// See [`GridResolver::resolve_bounds`].
    pub fn resolve_bounds(
        &self,
        sw: LatLon,
        ne: LatLon,
        config: &BoundsConfig,
    ) -> Result<GridBounds> {
        Ok(self.resolver.resolve_bounds(sw, ne, config)?)
    }

    /// Coordinate stored for a grid cell.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for cells outside the grid.
    pub fn coordinate(&self, index: GridIndex) -> Result<LatLon> {
        let (row, col) = self.checked(index)?;
        let cell = self.store.read_slice(
            &self.coordinates,
            &[AxisSlice::index(row), AxisSlice::index(col), AxisSlice::range(0, 2)],
        )?;
        lat_lon(&cell, &self.coordinates)
    }

    /// Full time series of `variable` at the cell nearest `point`, read in
    /// batches.
    ///
    /// # Errors
    /// Returns an error if the point resolves outside the grid or a read
    /// fails.
    pub fn timeseries(&self, variable: &str, point: LatLon) -> Result<Array1<f64>> {
        let index = self.resolve(point)?;
        self.reader
            .read(&self.store, variable, SpatialIndex::Grid(index))
    }

    /// Values of `variable` at the cell nearest `point` over a time range.
    ///
    /// # Errors
    /// Returns an error if the point resolves outside the grid or the read
    /// fails.
    pub fn point_window(
        &self,
        variable: &str,
        point: LatLon,
        time: Range<usize>,
    ) -> Result<Array1<f64>> {
        let (row, col) = self.checked(self.resolve(point)?)?;
        let window = self.store.read_slice(
            variable,
            &[
                AxisSlice::from(time),
                AxisSlice::index(row),
                AxisSlice::index(col),
            ],
        )?;
        Ok(window.iter().copied().collect())
    }

    /// Reads a `(time, row, col)` block covering `bounds`.
    ///
    /// Bounds are inclusive and clipped to the grid.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the bounds miss the grid entirely.
    pub fn extract_box(
        &self,
        variable: &str,
        bounds: &GridBounds,
        selection: &BoxSelection,
    ) -> Result<ArrayD<f64>> {
        let (rows, cols) = self.bounds_slices(bounds, selection.skip)?;
        let time = AxisSlice::strided(
            selection.time.start,
            selection.time.end,
            selection.tskip.max(1),
        );
        log::debug!("extracting {variable} rows {rows:?} cols {cols:?} time {time:?}");
        self.store.read_slice(variable, &[time, rows, cols])
    }

    /// Reads the `(row, col, 2)` coordinates covering `bounds`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the bounds miss the grid entirely.
    pub fn coordinates_box(&self, bounds: &GridBounds, skip: usize) -> Result<ArrayD<f64>> {
        let (rows, cols) = self.bounds_slices(bounds, skip)?;
        self.store
            .read_slice(&self.coordinates, &[rows, cols, AxisSlice::full()])
    }

    fn checked(&self, index: GridIndex) -> Result<(usize, usize)> {
        index.checked(self.shape).ok_or_else(|| {
            Error::InvalidInput(format!(
                "cell ({}, {}) is outside the {}x{} grid",
                index.row, index.col, self.shape.0, self.shape.1
            ))
        })
    }

    fn bounds_slices(&self, bounds: &GridBounds, skip: usize) -> Result<(AxisSlice, AxisSlice)> {
        let rows = clip_axis(bounds.min.row, bounds.max.row, self.shape.0, skip);
        let cols = clip_axis(bounds.min.col, bounds.max.col, self.shape.1, skip);
        match (rows, cols) {
            (Some(rows), Some(cols)) => Ok((rows, cols)),
            _ => Err(Error::InvalidInput(format!(
                "bounds {:?}..={:?} do not intersect the {}x{} grid",
                bounds.min, bounds.max, self.shape.0, self.shape.1
            ))),
        }
    }
}

/// Inclusive `lo..=hi` clipped to `0..len`, or `None` if nothing remains.
fn clip_axis(lo: i64, hi: i64, len: usize, skip: usize) -> Option<AxisSlice> {
    let start = usize::try_from(lo.max(0)).ok()?;
    let stop = usize::try_from(hi.saturating_add(1).max(0)).ok()?.min(len);
    (start < stop).then(|| AxisSlice::strided(start, stop, skip.max(1)))
}

fn lat_lon(cell: &ArrayD<f64>, variable: &str) -> Result<LatLon> {
    let mut values = cell.iter().copied();
    match (values.next(), values.next()) {
        (Some(lat), Some(lon)) => Ok(LatLon::new(lat, lon).validate()?),
        _ => Err(Error::read(variable, "coordinate cell holds fewer than 2 values")),
    }
}

/// Configuration for [`SiteResource::load`].
#[derive(Clone, Debug)]
pub struct SiteConfig {
    /// Variable holding `(site, 2)` coordinates.
    pub coordinates: String,
    /// Site metadata table.
    pub meta: String,
    /// Time variable; [`FALLBACK_TIME_VARIABLE`] is tried when absent.
    pub time_index: String,
    /// Chunked read settings.
    pub chunk: ChunkConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            coordinates: "coordinates".to_string(),
            meta: "meta".to_string(),
            time_index: "time_index".to_string(),
            chunk: ChunkConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Set the coordinate variable name.
    #[must_use]
    pub fn with_coordinates<S: Into<String>>(mut self, name: S) -> Self {
        self.coordinates = name.into();
        self
    }

    /// Set the metadata table name.
    #[must_use]
    pub fn with_meta<S: Into<String>>(mut self, name: S) -> Self {
        self.meta = name.into();
        self
    }

    /// Set the time variable name.
    #[must_use]
    pub fn with_time_index<S: Into<String>>(mut self, name: S) -> Self {
        self.time_index = name.into();
        self
    }

    /// Set the chunked read settings.
    #[must_use]
    pub fn with_chunk(mut self, chunk: ChunkConfig) -> Self {
        self.chunk = chunk;
        self
    }
}

/// A scaled time series at one site.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    /// Site the series was read from.
    pub site: usize,
    /// Time of every value, shifted to local time if requested.
    pub times: TimeIndex,
    /// Values divided by the variable's scale factor.
    pub values: Array1<f64>,
}

/// Summary statistics of a series.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesStats {
    /// Number of non-NaN values.
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SeriesStats {
    /// Statistics over `values`, ignoring NaNs. `None` if nothing is left.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values.into_iter().filter(|v| !v.is_nan()) {
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        (count > 0).then(|| Self {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

impl TimeSeries {
    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the series is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Summary statistics, `None` for an empty or all-NaN series.
    #[must_use]
    pub fn stats(&self) -> Option<SeriesStats> {
        SeriesStats::from_values(&self.values)
    }
}

/// One time step of a variable over the contiguous US.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    /// Position of the step on the time axis.
    pub step: usize,
    /// Timestamp of the step (UTC).
    pub time: NaiveDateTime,
    /// Site indices.
    pub sites: Vec<usize>,
    /// Coordinates of each site.
    pub coordinates: Vec<LatLon>,
    /// Scaled value at each site.
    pub values: Vec<f64>,
}

/// Every time step of one calendar day over the contiguous US.
#[derive(Clone, Debug)]
pub struct DayExtract {
    /// Positions on the time axis.
    pub steps: Range<usize>,
    /// Timestamp of each step, shifted to local time if requested.
    pub times: Vec<NaiveDateTime>,
    /// Site indices (columns of `values`).
    pub sites: Vec<usize>,
    /// Scaled `(step, site)` values.
    pub values: Array2<f64>,
}

/// Handle on a site-based `(time, site)` dataset.
pub struct SiteResource<S> {
    store: S,
    time_index: TimeIndex,
    meta: SiteMeta,
    index: SiteIndex,
    reader: ChunkedReader,
}

impl<S: DataStore> SiteResource<S> {
    /// Loads the time index, metadata and coordinates and builds the site
    /// tree.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if a required variable is missing, or an
    /// error if the coordinate table is malformed or its size disagrees with
    /// the metadata.
    pub fn load(store: S, config: &SiteConfig) -> Result<Self> {
        let time_variable = if store.contains(&config.time_index) {
            config.time_index.as_str()
        } else if store.contains(FALLBACK_TIME_VARIABLE) {
            log::debug!(
                "{} not found, using {FALLBACK_TIME_VARIABLE}",
                config.time_index
            );
            FALLBACK_TIME_VARIABLE
        } else {
            return Err(Error::NotFound(config.time_index.clone()));
        };
        let stamps = store.read_strings(time_variable)?;
        let time_index = TimeIndex::parse(stamps.as_slice())?;

        let meta = store.read_table(&config.meta)?;

        let coordinates = store
            .read_all(&config.coordinates)?
            .into_dimensionality::<Ix2>()
            .map_err(|_| {
                Error::InvalidInput(format!("{} must be shaped (site, 2)", config.coordinates))
            })?;
        if coordinates.ncols() != 2 {
            return Err(Error::InvalidInput(format!(
                "{} must be shaped (site, 2), got {:?}",
                config.coordinates,
                coordinates.shape()
            )));
        }
        let coordinates: Vec<LatLon> = coordinates
            .outer_iter()
            .map(|row| LatLon::new(row[0], row[1]))
            .collect();
        // A table with columns must describe every site, even if it has no rows.
        let has_columns = meta.column_names().next().is_some();
        if has_columns && meta.len() != coordinates.len() {
            return Err(Error::InvalidInput(format!(
                "{} has {} rows but {} has {} sites",
                config.meta,
                meta.len(),
                config.coordinates,
                coordinates.len()
            )));
        }
        let index = SiteIndex::build(&coordinates)?;
        log::info!(
            "loaded {} sites and {} time steps",
            index.len(),
            time_index.len()
        );

        Ok(Self {
            store,
            time_index,
            meta,
            index,
            reader: ChunkedReader::new(config.chunk.clone()),
        })
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parsed time index (UTC).
    pub fn time_index(&self) -> &TimeIndex {
        &self.time_index
    }

    /// Site metadata.
    pub fn meta(&self) -> &SiteMeta {
        &self.meta
    }

    /// Site coordinate tree.
    pub fn site_index(&self) -> &SiteIndex {
        &self.index
    }

    /// Nearest site to `point`.
    ///
    /// # Errors
    /// Returns an error for non-finite coordinates.
    pub fn nearest_site(&self, point: LatLon) -> Result<NearestSite> {
        Ok(self.index.nearest(point)?)
    }

    /// Position of the time step closest to `at`.
    ///
    /// # Errors
    /// Returns an error if the time index is empty.
    pub fn nearest_timestep(&self, at: NaiveDateTime) -> Result<usize> {
        Ok(nearest_timestep(&self.time_index, at)?)
    }

    /// Sites whose metadata `column` equals `value`.
    ///
    /// # Errors
    /// Returns an error naming the column if it does not exist.
    pub fn region_indices(&self, value: &str, column: &str) -> Result<Vec<usize>> {
        Ok(region_indices(&self.meta, column, value)?)
    }

    /// Sites in the contiguous United States.
    ///
    /// # Errors
    /// Returns an error if the `country` or `state` column is missing.
    pub fn conus_indices(&self) -> Result<Vec<usize>> {
        Ok(conus_indices(&self.meta)?)
    }

    /// Scale factor of `variable`, 1 when the attribute is absent.
    ///
    /// # Errors
    /// Returns an error if the variable is missing or the factor is zero.
    pub fn scale_factor(&self, variable: &str) -> Result<f64> {
        let factor = self
            .store
            .attr_f64(variable, SCALE_FACTOR_ATTR)?
            .unwrap_or(1.0);
        if factor == 0.0 || !factor.is_finite() {
            return Err(Error::InvalidInput(format!(
                "{variable} has unusable {SCALE_FACTOR_ATTR} {factor}"
            )));
        }
        Ok(factor)
    }

    /// Full time series of `variable` at the site nearest `point`.
    ///
    /// With `local`, timestamps are shifted by the site's `timezone` offset.
    ///
    /// # Errors
    /// Returns an error if the read fails, or `local` is set and the
    /// metadata has no `timezone` column.
    pub fn timeseries(&self, variable: &str, point: LatLon, local: bool) -> Result<TimeSeries> {
        let site = self.nearest_site(point)?.index;
        let scale = self.scale_factor(variable)?;
        let mut values = self
            .reader
            .read(&self.store, variable, SpatialIndex::Site(site))?;
        values.mapv_inplace(|v| v / scale);

        let times = if local {
            self.time_index.shifted(self.timezone(&[site])?)?
        } else {
            self.time_index.clone()
        };
        if times.len() != values.len() {
            return Err(Error::InvalidInput(format!(
                "{variable} has {} steps but the time index has {}",
                values.len(),
                times.len()
            )));
        }
        Ok(TimeSeries {
            site,
            times,
            values,
        })
    }

    /// Values of `variable` at every CONUS site for the step nearest `at`.
    ///
    /// # Errors
    /// Returns an error if the metadata lacks region columns or the read
    /// fails.
    pub fn timestep_snapshot(&self, variable: &str, at: NaiveDateTime) -> Result<Snapshot> {
        self.check_site_variable(variable)?;
        let sites = self.conus_indices()?;
        let step = self.nearest_timestep(at)?;
        let scale = self.scale_factor(variable)?;

        let row = self
            .store
            .read_slice(variable, &[AxisSlice::index(step), AxisSlice::full()])?;
        let row: Vec<f64> = row.iter().copied().collect();
        let values = sites.iter().map(|&s| row[s] / scale).collect();
        let coordinates = sites
            .iter()
            .filter_map(|&s| self.index.coordinate(s))
            .collect();
        let time = self
            .time_index
            .get(step)
            .ok_or_else(|| Error::InvalidInput(format!("step {step} outside time index")))?;

        Ok(Snapshot {
            step,
            time,
            sites,
            coordinates,
            values,
        })
    }

    /// Every step of `date` at every CONUS site.
    ///
    /// With `local`, the time index is shifted by the mean CONUS timezone
    /// offset before selecting the day.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if no step falls on `date`.
    pub fn day(&self, variable: &str, date: NaiveDate, local: bool) -> Result<DayExtract> {
        self.check_site_variable(variable)?;
        let sites = self.conus_indices()?;
        let times = if local && !sites.is_empty() {
            self.time_index.shifted(self.timezone(&sites)?)?
        } else {
            self.time_index.clone()
        };
        let range = times
            .day_range(date)
            .ok_or_else(|| Error::InvalidInput(format!("no time steps on {date}")))?;
        let steps = *range.start()..*range.end() + 1;
        let scale = self.scale_factor(variable)?;

        let block = self
            .store
            .read_slice(variable, &[AxisSlice::from(steps.clone()), AxisSlice::full()])?
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::read(variable, e))?;
        let mut values = block.select(Axis(1), &sites);
        values.mapv_inplace(|v| v / scale);
        log::debug!(
            "{variable} on {date}: {} steps x {} sites",
            values.nrows(),
            values.ncols()
        );

        Ok(DayExtract {
            times: times.as_slice()[steps.clone()].to_vec(),
            steps,
            sites,
            values,
        })
    }

    /// Mean `timezone` offset (hours) over `sites`.
    #[allow(clippy::cast_precision_loss)]
    fn timezone(&self, sites: &[usize]) -> Result<f64> {
        let offsets = self.meta.numeric("timezone")?;
        let sum = sites
            .iter()
            .map(|&s| {
                offsets.get(s).copied().ok_or_else(|| {
                    Error::InvalidInput(format!("no timezone for site {s}"))
                })
            })
            .sum::<Result<f64>>()?;
        Ok(sum / sites.len() as f64)
    }

    fn check_site_variable(&self, variable: &str) -> Result<()> {
        let shape = self.store.shape(variable)?;
        if shape.len() != 2 {
            return Err(Error::DimensionMismatch {
                variable: variable.to_string(),
                expected: 2,
                actual: shape.len(),
            });
        }
        if shape[1] != self.index.len() {
            return Err(Error::InvalidInput(format!(
                "{variable} has {} sites, expected {}",
                shape[1],
                self.index.len()
            )));
        }
        if shape[0] != self.time_index.len() {
            return Err(Error::InvalidInput(format!(
                "{variable} has {} steps but the time index has {}",
                shape[0],
                self.time_index.len()
            )));
        }
        Ok(())
    }
}
