//! Time index: parsed timestamps aligned with the first axis of every
//! time-varying variable.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y%m%d%H%M%S",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Parses a single timestamp into UTC.
///
/// Offsets are honoured and folded into UTC; naive timestamps are taken as
/// UTC already.
///
/// # Errors
/// Returns [`Error::InvalidTimestamp`] if no supported format matches.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let value = raw.trim().trim_end_matches('\0');

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.naive_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    Err(Error::InvalidTimestamp(raw.to_string()))
}

/// Converts fractional hours to a [`TimeDelta`], rounded to the second.
///
/// # Errors
/// Returns [`Error::InvalidInput`] for non-finite or out-of-range offsets.
#[allow(clippy::cast_possible_truncation)]
pub fn hours(offset: f64) -> Result<TimeDelta> {
    let seconds = (offset * 3600.0).round();
    let delta = if seconds.is_finite() {
        // The cast saturates; try_seconds rejects anything that large.
        TimeDelta::try_seconds(seconds as i64)
    } else {
        None
    };
    delta.ok_or_else(|| Error::InvalidInput(format!("time offset of {offset} hours")))
}

/// Ordered sequence of timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeIndex {
    steps: Vec<NaiveDateTime>,
}

impl TimeIndex {
    /// Wraps already parsed timestamps.
    #[must_use]
    pub fn new(steps: Vec<NaiveDateTime>) -> Self {
        Self { steps }
    }

    /// Parses raw timestamp strings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTimestamp`] naming the first bad entry.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let steps = raw
            .iter()
            .map(|s| parse_timestamp(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    /// Number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if there are no time steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Timestamp at position `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<NaiveDateTime> {
        self.steps.get(i).copied()
    }

    /// Timestamps as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[NaiveDateTime] {
        &self.steps
    }

    /// Iterates over timestamps in order.
    pub fn iter(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.steps.iter()
    }

    /// Returns a copy with every step offset by `offset_hours`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the offset is not a usable duration
    /// or moves a step outside the representable date range.
    pub fn shifted(&self, offset_hours: f64) -> Result<Self> {
        let delta = hours(offset_hours)?;
        let steps = self
            .steps
            .iter()
            .map(|t| {
                t.checked_add_signed(delta).ok_or_else(|| {
                    Error::InvalidInput(format!("{t} shifted by {offset_hours} hours"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    /// Positions whose calendar date equals `date`, as first..=last.
    ///
    /// Matches need not be contiguous; everything between the first and last
    /// match is included.
    #[must_use]
    pub fn day_range(&self, date: NaiveDate) -> Option<RangeInclusive<usize>> {
        let first = self.steps.iter().position(|t| t.date() == date)?;
        let last = self.steps.iter().rposition(|t| t.date() == date)?;
        Some(first..=last)
    }
}

impl From<Vec<NaiveDateTime>> for TimeIndex {
    fn from(steps: Vec<NaiveDateTime>) -> Self {
        Self::new(steps)
    }
}
