//! gridsite-algorithms: Coordinate and time resolvers.
//!
//! This crate provides the lookups that turn user coordinates into dataset
//! indices:
//! - **Grid** - closed-form (row, col) lookup on a projected regular grid
//! - **Site** - k-d tree nearest-site lookup over irregular sites
//! - **Timestep** - nearest entry of a time index
//! - **Region** - site membership filters over the metadata table
//!
#![warn(missing_docs)]

pub mod grid;
pub mod region;
pub mod site;
pub mod timestep;

pub use grid::{BoundsConfig, GridResolver, DEFAULT_GRID_SPACING_M, DEFAULT_SAMPLES_PER_EDGE};
pub use region::{conus_indices, region_indices};
pub use site::{NearestSite, SiteIndex};
pub use timestep::nearest_timestep;
