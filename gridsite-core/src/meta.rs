//! Site metadata table.
//!
//! Site datasets ship a `meta` table with one row per site (latitude,
//! longitude, timezone, country, state, ...). String columns frequently
//! arrive as raw byte strings, so text access goes through a decoding step.

use crate::{Error, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A single metadata column.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaColumn {
    /// Already decoded strings.
    Text(Vec<String>),
    /// Encoded byte strings (UTF-8, possibly NUL padded).
    Bytes(Vec<Vec<u8>>),
    /// Numeric values.
    Numeric(Vec<f64>),
}

impl MetaColumn {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Numeric(v) => v.len(),
        }
    }

    /// Returns true if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Columnar site metadata. Row `i` describes site `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteMeta {
    columns: BTreeMap<String, MetaColumn>,
    rows: usize,
}

impl SiteMeta {
    /// Builds a table from named columns.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the columns differ in length.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, MetaColumn)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (name, column) in columns {
            table.insert(name, column)?;
        }
        Ok(table)
    }

    /// Adds (or replaces) a column.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the length differs from the
    /// existing columns.
    pub fn insert<S: Into<String>>(&mut self, name: S, column: MetaColumn) -> Result<()> {
        let name = name.into();
        let others = self.columns.keys().any(|k| *k != name);
        if others && column.len() != self.rows {
            return Err(Error::InvalidInput(format!(
                "meta column {name} has {} rows, expected {}",
                column.len(),
                self.rows
            )));
        }
        self.rows = column.len();
        self.columns.insert(name, column);
        Ok(())
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Returns true if the named column exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Looks up a raw column.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if the column does not exist.
    pub fn column(&self, name: &str) -> Result<&MetaColumn> {
        self.columns
            .get(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Decoded text values of a column.
    ///
    /// Byte strings are decoded as UTF-8 with trailing NUL padding removed.
    /// Numeric columns are rendered with their `Display` form.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] for unknown columns and
    /// [`Error::InvalidInput`] for bytes that are not valid UTF-8.
    pub fn text(&self, name: &str) -> Result<Vec<Cow<'_, str>>> {
        match self.column(name)? {
            MetaColumn::Text(values) => Ok(values
                .iter()
                .map(|s| Cow::Borrowed(s.as_str()))
                .collect()),
            MetaColumn::Bytes(values) => values
                .iter()
                .map(|raw| decode_bytes(name, raw).map(Cow::Borrowed))
                .collect(),
            MetaColumn::Numeric(values) => {
                Ok(values.iter().map(|v| Cow::Owned(v.to_string())).collect())
            }
        }
    }

    /// Numeric values of a column.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] for unknown columns and
    /// [`Error::InvalidInput`] when the column is not numeric.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            MetaColumn::Numeric(values) => Ok(values),
            _ => Err(Error::InvalidInput(format!(
                "meta column {name} is not numeric"
            ))),
        }
    }
}

fn decode_bytes<'a>(column: &str, raw: &'a [u8]) -> Result<&'a str> {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    std::str::from_utf8(&raw[..end]).map_err(|e| {
        Error::InvalidInput(format!("meta column {column} is not valid utf-8: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SiteMeta {
        SiteMeta::new([
            (
                "state",
                MetaColumn::Bytes(vec![b"Colorado".to_vec(), b"Utah\0\0".to_vec()]),
            ),
            ("timezone", MetaColumn::Numeric(vec![-7.0, -7.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_text_decodes_bytes() {
        let meta = sample();
        let states = meta.text("state").unwrap();
        assert_eq!(states, vec!["Colorado", "Utah"]);
    }

    #[test]
    fn test_missing_column() {
        let meta = sample();
        let err = meta.text("county").unwrap_err();
        assert_eq!(err, Error::MissingColumn("county".to_string()));
        assert_eq!(err.to_string(), "county is not a valid column in meta");
    }

    #[test]
    fn test_length_mismatch() {
        let mut meta = sample();
        let err = meta
            .insert("elevation", MetaColumn::Numeric(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        // Replacing a column with the same length is fine.
        meta.insert("timezone", MetaColumn::Numeric(vec![-6.0, -6.0]))
            .unwrap();
        assert_eq!(meta.numeric("timezone").unwrap(), &[-6.0, -6.0]);
    }

    #[test]
    fn test_invalid_utf8() {
        let meta = SiteMeta::new([("state", MetaColumn::Bytes(vec![vec![0xff, 0xfe]]))]).unwrap();
        assert!(matches!(meta.text("state"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_numeric_rejects_text() {
        let meta = sample();
        assert!(meta.numeric("state").is_err());
    }
}
