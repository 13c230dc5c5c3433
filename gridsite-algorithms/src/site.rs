//! Nearest-site resolution over irregularly spaced sites.
//!
//! The search runs in raw (lat, lon) degree space with Euclidean distance.
//! This is only a fair approximation of geographic nearness over compact
//! regions; it is kept as-is so indices agree with existing tooling built on
//! the same lookup.

use gridsite_core::{Error, LatLon, Result};
use kd_tree::KdTree2;
use ordered_float::OrderedFloat;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of a nearest-site query.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NearestSite {
    /// Site index (row in the coordinate table and every co-indexed variable).
    pub index: usize,
    /// Euclidean distance in degrees.
    pub distance: f64,
}

/// k-d tree over all site coordinates.
///
/// Built once from the full coordinate table; immutable afterwards.
pub struct SiteIndex {
    tree: KdTree2<(usize, [f64; 2])>,
    coordinates: Vec<LatLon>,
}

impl SiteIndex {
    /// Build the index. Item `i` of the tree is row `i` of `coordinates`.
    ///
    /// # Errors
    /// Returns [`Error::EmptySiteTable`] for an empty table and
    /// [`Error::InvalidCoordinate`] for non-finite coordinates.
    pub fn build(coordinates: &[LatLon]) -> Result<Self> {
        if coordinates.is_empty() {
            return Err(Error::EmptySiteTable);
        }
        if let Some(bad) = coordinates
            .iter()
            .find(|c| !(c.lat.is_finite() && c.lon.is_finite()))
        {
            return Err(Error::InvalidCoordinate {
                lat: bad.lat,
                lon: bad.lon,
            });
        }

        let items: Vec<(usize, [f64; 2])> = coordinates
            .iter()
            .enumerate()
            .map(|(i, c)| (i, [c.lat, c.lon]))
            .collect();
        let tree = KdTree2::build_by_key(items, |item, k| OrderedFloat(item.1[k]));

        Ok(Self {
            tree,
            coordinates: coordinates.to_vec(),
        })
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Always false: construction rejects empty tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Stored coordinate of site `index`.
    #[must_use]
    pub fn coordinate(&self, index: usize) -> Option<LatLon> {
        self.coordinates.get(index).copied()
    }

    /// Nearest site to `point`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] for non-finite input.
    pub fn nearest(&self, point: LatLon) -> Result<NearestSite> {
        let query = query_point(point)?;
        self.tree
            .nearest_by(&query, |item, k| item.1[k])
            .map(|found| NearestSite {
                index: found.item.0,
                distance: found.squared_distance.sqrt(),
            })
            .ok_or(Error::EmptySiteTable)
    }

    /// The `count` nearest sites to `point`, closest first.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] for non-finite input.
    pub fn nearest_k(&self, point: LatLon, count: usize) -> Result<Vec<NearestSite>> {
        let query = query_point(point)?;
        Ok(self
            .tree
            .nearests_by(&query, count, |item, k| item.1[k])
            .into_iter()
            .map(|found| NearestSite {
                index: found.item.0,
                distance: found.squared_distance.sqrt(),
            })
            .collect())
    }
}

impl std::fmt::Debug for SiteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteIndex")
            .field("sites", &self.coordinates.len())
            .finish_non_exhaustive()
    }
}

fn query_point(point: LatLon) -> Result<[f64; 2]> {
    if !(point.lat.is_finite() && point.lon.is_finite()) {
        return Err(Error::InvalidCoordinate {
            lat: point.lat,
            lon: point.lon,
        });
    }
    Ok([point.lat, point.lon])
}
