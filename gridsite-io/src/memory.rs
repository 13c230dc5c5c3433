//! In-memory store.
//!
//! Holds variables as dense arrays. Used as a staging area for extracted
//! subsets and as a stand-in for real files in tests.

use crate::store::{clip_selection, AxisSlice, DataStore};
use crate::{Error, Result};
use gridsite_core::SiteMeta;
use ndarray::{ArrayD, Slice};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
enum Entry {
    Array(ArrayD<f64>),
    Strings(Vec<String>),
    Table(SiteMeta),
}

/// Dataset resource held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Entry>,
    attrs: HashMap<(String, String), f64>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a numeric variable.
    pub fn insert_array<S: Into<String>>(&mut self, name: S, data: ArrayD<f64>) -> &mut Self {
        self.entries.insert(name.into(), Entry::Array(data));
        self
    }

    /// Adds a 1-d string variable.
    pub fn insert_strings<S: Into<String>>(&mut self, name: S, data: Vec<String>) -> &mut Self {
        self.entries.insert(name.into(), Entry::Strings(data));
        self
    }

    /// Adds a metadata table.
    pub fn insert_table<S: Into<String>>(&mut self, name: S, table: SiteMeta) -> &mut Self {
        self.entries.insert(name.into(), Entry::Table(table));
        self
    }

    /// Sets a scalar attribute on a variable.
    pub fn set_attr<S: Into<String>, A: Into<String>>(
        &mut self,
        name: S,
        attr: A,
        value: f64,
    ) -> &mut Self {
        self.attrs.insert((name.into(), attr.into()), value);
        self
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn array(&self, name: &str) -> Result<&ArrayD<f64>> {
        match self.entry(name)? {
            Entry::Array(a) => Ok(a),
            _ => Err(Error::read(name, "not a numeric variable")),
        }
    }
}

impl DataStore for MemoryStore {
    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn variables(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        match self.entry(name)? {
            Entry::Array(a) => Ok(a.shape().to_vec()),
            Entry::Strings(s) => Ok(vec![s.len()]),
            Entry::Table(t) => Ok(vec![t.len()]),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn read_slice(&self, name: &str, selection: &[AxisSlice]) -> Result<ArrayD<f64>> {
        let array = self.array(name)?;
        let selection = clip_selection(name, array.shape(), selection)?;
        let view = array.slice_each_axis(|ax| {
            let s = selection[ax.axis.index()];
            Slice::new(s.start as isize, Some(s.stop as isize), s.step as isize)
        });
        Ok(view.to_owned())
    }

    fn read_all(&self, name: &str) -> Result<ArrayD<f64>> {
        self.array(name).cloned()
    }

    fn read_strings(&self, name: &str) -> Result<Vec<String>> {
        match self.entry(name)? {
            Entry::Strings(s) => Ok(s.clone()),
            _ => Err(Error::read(name, "not a string variable")),
        }
    }

    fn read_table(&self, name: &str) -> Result<SiteMeta> {
        match self.entry(name)? {
            Entry::Table(t) => Ok(t.clone()),
            _ => Err(Error::read(name, "not a table")),
        }
    }

    fn attr_f64(&self, name: &str, attr: &str) -> Result<Option<f64>> {
        self.entry(name)?;
        Ok(self
            .attrs
            .get(&(name.to_string(), attr.to_string()))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn store() -> MemoryStore {
        let data = Array::from_shape_fn(IxDyn(&[6, 3, 4]), |ix| {
            (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
        });
        let mut store = MemoryStore::new();
        store
            .insert_array("wind", data)
            .set_attr("wind", "scale_factor", 100.0);
        store
    }

    #[test]
    fn test_strided_slice() {
        let out = store()
            .read_slice(
                "wind",
                &[
                    AxisSlice::strided(0, 6, 2),
                    AxisSlice::index(1),
                    AxisSlice::range(1, 3),
                ],
            )
            .unwrap();
        assert_eq!(out.shape(), &[3, 1, 2]);
        assert_eq!(out[[1, 0, 1]], 212.0);
    }

    #[test]
    fn test_slice_clipped() {
        let out = store()
            .read_slice(
                "wind",
                &[AxisSlice::range(4, 100), AxisSlice::full(), AxisSlice::full()],
            )
            .unwrap();
        assert_eq!(out.shape(), &[2, 3, 4]);
    }

    #[test]
    fn test_missing_variable() {
        assert!(matches!(
            store().read_all("solar"),
            Err(Error::NotFound(name)) if name == "solar"
        ));
    }

    #[test]
    fn test_attrs() {
        let s = store();
        assert_eq!(s.attr_f64("wind", "scale_factor").unwrap(), Some(100.0));
        assert_eq!(s.attr_f64("wind", "units").unwrap(), None);
        assert!(s.attr_f64("solar", "scale_factor").is_err());
    }
}
