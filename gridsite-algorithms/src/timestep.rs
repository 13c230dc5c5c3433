//! Nearest-timestep resolution.

use chrono::NaiveDateTime;
use gridsite_core::{Error, Result, TimeIndex};

/// Index of the time step closest to `target`.
///
/// Distance is the absolute time difference; ties go to the earliest index.
///
/// # Errors
/// Returns [`Error::InvalidInput`] for an empty time index.
pub fn nearest_timestep(index: &TimeIndex, target: NaiveDateTime) -> Result<usize> {
    index
        .iter()
        .map(|t| (*t - target).abs())
        .enumerate()
        .min_by_key(|&(_, delta)| delta)
        .map(|(i, _)| i)
        .ok_or_else(|| Error::InvalidInput("time index is empty".to_string()))
}
