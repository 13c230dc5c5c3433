//! gridsite-io: Dataset access for gridsite.
//!
//! This crate provides the store abstraction over HDF5-style resources, the
//! chunked time-series reader, and the grid and site resource handles that
//! combine stores with the resolvers from `gridsite-algorithms`.
//!

pub mod chunked;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod memory;
pub mod resource;
pub mod store;

pub use chunked::{batch_ranges, ChunkConfig, ChunkedReader, SpatialIndex, DEFAULT_BATCH_SIZE};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{write_subset, Hdf5Store};
pub use memory::MemoryStore;
pub use resource::{
    BoxSelection, DayExtract, GridConfig, GridResource, SeriesStats, SiteConfig, SiteResource,
    Snapshot, TimeSeries,
};
pub use store::{clip_selection, AxisSlice, DataStore, StoreLocation};
