//! gridsite-core: Core types for coordinate resolution over meteorological
//! HDF5 datasets.
//!
//! This crate provides the data model shared by the resolvers and the I/O
//! layer: geographic coordinates, grid indices, the Lambert Conformal Conic
//! projection, the time index and the site metadata table.
//!

pub mod error;
pub mod geo;
pub mod meta;
pub mod projection;
pub mod time;

pub use error::{Error, Result};
pub use geo::{GridBounds, GridIndex, LatLon, ProjectedPoint};
pub use meta::{MetaColumn, SiteMeta};
pub use projection::LambertConformal;
pub use time::{parse_timestamp, TimeIndex};
