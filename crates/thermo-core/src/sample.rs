//! Raw and normalized sample types

use alloc::string::String;
use alloc::vec::Vec;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// A single field as handed over by the retrieval layer
///
/// Retrieval never coerces: a CSV cell arrives as `Text`, a JSON number as
/// `Number`, an absent cell as `Null`. The normalizer decides what each means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawField {
    Text(String),
    Number(f64),
    Null,
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        Self::Text(String::from(value))
    }
}

impl From<String> for RawField {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawField {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl<T: Into<RawField>> From<Option<T>> for RawField {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row of raw input
///
/// A well-formed record holds exactly two fields, `[timestamp, value]`. Any
/// other arity is a structural defect of the input, not a bad reading.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    fields: Vec<RawField>,
}

impl RawRecord {
    /// Wrap an arbitrary row of fields
    pub fn new(fields: Vec<RawField>) -> Self {
        Self { fields }
    }

    /// Build a well-formed `(timestamp, value)` record
    pub fn pair(timestamp: impl Into<RawField>, value: impl Into<RawField>) -> Self {
        Self {
            fields: alloc::vec![timestamp.into(), value.into()],
        }
    }

    pub fn fields(&self) -> &[RawField] {
        &self.fields
    }

    /// The `(timestamp, value)` fields, or `None` when the record is not a pair
    pub fn as_pair(&self) -> Option<(&RawField, &RawField)> {
        match self.fields.as_slice() {
            [timestamp, value] => Some((timestamp, value)),
            _ => None,
        }
    }
}

/// A validated reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Local wall-clock time of the reading
    pub timestamp: NaiveDateTime,
    /// Temperature in °C, always finite and inside the plausible range
    pub value: f64,
}

impl Sample {
    pub const fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Why a raw record was dropped during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Timestamp field was null or blank
    MissingTimestamp,
    /// Timestamp field did not match any accepted format
    InvalidTimestamp,
    /// Value field was null or blank
    MissingValue,
    /// Value field did not contain a number
    InvalidValue,
    /// Value parsed to NaN or infinity
    NonFinite,
    /// Value fell outside the plausible physical range
    OutOfRange,
}

impl RejectReason {
    /// Get a short label for diagnostics output
    pub const fn label(self) -> &'static str {
        match self {
            Self::MissingTimestamp => "missing timestamp",
            Self::InvalidTimestamp => "invalid timestamp",
            Self::MissingValue => "missing value",
            Self::InvalidValue => "invalid value",
            Self::NonFinite => "non-finite value",
            Self::OutOfRange => "out of range",
        }
    }
}

/// Tagged outcome of parsing one raw record
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReading {
    Valid(Sample),
    Rejected { index: usize, reason: RejectReason },
}

/// Time-ordered readings of exactly one sensor
///
/// Samples are strictly increasing by timestamp. A `Series` can only be built
/// by the normalizer, so holding one means the ordering invariant holds.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Wrap samples that are already sorted and free of duplicate timestamps
    pub(crate) fn from_sorted(samples: Vec<Sample>) -> Self {
        debug_assert!(
            samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp),
            "series samples must be strictly increasing"
        );
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Iterate over sample values in time order
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Time span covered by the series, `None` when empty
    pub fn coverage(&self) -> Option<Coverage> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some(Coverage {
            first: first.timestamp,
            last: last.timestamp,
        })
    }
}

/// First and last timestamp of a non-empty series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

impl Coverage {
    pub fn span(&self) -> TimeDelta {
        self.last - self.first
    }

    /// Covered span in fractional hours
    pub fn span_hours(&self) -> f64 {
        self.span().num_seconds() as f64 / 3600.0
    }

    /// Whole days covered, truncated
    pub fn days(&self) -> i64 {
        self.span().num_days()
    }
}
