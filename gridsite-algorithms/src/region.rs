//! Regional membership filters over site metadata.

use gridsite_core::{Result, SiteMeta};

/// Country value of sites inside the United States.
pub const UNITED_STATES: &str = "United States";

/// State values excluded from the contiguous United States, by name or
/// abbreviation, plus the sentinel for unset states.
pub const NON_CONUS_STATES: [&str; 5] = ["Alaska", "Hawaii", "AK", "HI", "None"];

/// Indices of sites whose decoded `column` value equals `value` exactly.
///
/// A value that never occurs yields an empty vector.
///
/// # Errors
/// Returns [`gridsite_core::Error::MissingColumn`] if `column` does not exist.
pub fn region_indices(meta: &SiteMeta, column: &str, value: &str) -> Result<Vec<usize>> {
    Ok(meta
        .text(column)?
        .iter()
        .enumerate()
        .filter_map(|(i, v)| (v.as_ref() == value).then_some(i))
        .collect())
}

/// Indices of sites in the contiguous United States.
///
/// # Errors
/// Returns an error if the `country` or `state` column is missing.
pub fn conus_indices(meta: &SiteMeta) -> Result<Vec<usize>> {
    let countries = meta.text("country")?;
    let states = meta.text("state")?;
    Ok(countries
        .iter()
        .zip(states.iter())
        .enumerate()
        .filter_map(|(i, (country, state))| {
            (country.as_ref() == UNITED_STATES && !NON_CONUS_STATES.contains(&state.as_ref()))
                .then_some(i)
        })
        .collect())
}
