//! Series normalization
//!
//! Turns the raw records handed over by retrieval into a clean [`Series`]:
//!
//! 1. every record is parsed into a tagged [`ParsedReading`]
//! 2. rejected readings are counted per [`RejectReason`], never coerced
//! 3. valid samples are sorted by timestamp and duplicate timestamps collapse
//!    to the later-appearing record (the feed's last-value-wins semantics)
//!
//! An empty result is valid output. Only records that are not pairs at all
//! abort normalization, with a [`StructuralError`].

use alloc::vec::Vec;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use log::{debug, trace};
use serde::Serialize;

use crate::config::{AnalysisConfig, PlausibleRange};
use crate::error::StructuralError;
use crate::sample::{ParsedReading, RawField, RawRecord, RejectReason, Sample, Series};

/// Accepted textual timestamp layouts, tried in order
///
/// The first is the PRTG historic-data export format.
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// PRTG exports averaging intervals as `<start> - <end>`; the start is kept
const INTERVAL_SEPARATOR: &str = " - ";

/// Per-reason rejection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectCounts {
    pub missing_timestamp: usize,
    pub invalid_timestamp: usize,
    pub missing_value: usize,
    pub invalid_value: usize,
    pub non_finite: usize,
    pub out_of_range: usize,
}

impl RejectCounts {
    fn record(&mut self, reason: RejectReason) {
        let counter = match reason {
            RejectReason::MissingTimestamp => &mut self.missing_timestamp,
            RejectReason::InvalidTimestamp => &mut self.invalid_timestamp,
            RejectReason::MissingValue => &mut self.missing_value,
            RejectReason::InvalidValue => &mut self.invalid_value,
            RejectReason::NonFinite => &mut self.non_finite,
            RejectReason::OutOfRange => &mut self.out_of_range,
        };
        *counter += 1;
    }

    pub fn get(&self, reason: RejectReason) -> usize {
        match reason {
            RejectReason::MissingTimestamp => self.missing_timestamp,
            RejectReason::InvalidTimestamp => self.invalid_timestamp,
            RejectReason::MissingValue => self.missing_value,
            RejectReason::InvalidValue => self.invalid_value,
            RejectReason::NonFinite => self.non_finite,
            RejectReason::OutOfRange => self.out_of_range,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_timestamp
            + self.invalid_timestamp
            + self.missing_value
            + self.invalid_value
            + self.non_finite
            + self.out_of_range
    }

    /// Non-zero counters with their reasons, for display
    pub fn iter(&self) -> impl Iterator<Item = (RejectReason, usize)> + '_ {
        [
            RejectReason::MissingTimestamp,
            RejectReason::InvalidTimestamp,
            RejectReason::MissingValue,
            RejectReason::InvalidValue,
            RejectReason::NonFinite,
            RejectReason::OutOfRange,
        ]
        .into_iter()
        .map(|reason| (reason, self.get(reason)))
        .filter(|&(_, count)| count > 0)
    }
}

/// Data-quality report of one normalization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Records seen
    pub total: usize,
    /// Samples in the resulting series
    pub retained: usize,
    /// Valid samples replaced by a later record with the same timestamp
    pub superseded: usize,
    /// Records dropped as invalid
    pub rejected: RejectCounts,
}

impl Diagnostics {
    /// Number of records dropped as invalid
    pub fn invalid(&self) -> usize {
        self.rejected.total()
    }

    /// Number of records that parsed into a valid sample
    pub fn valid(&self) -> usize {
        self.total - self.invalid()
    }

    /// Whether anything was dropped or replaced
    pub fn has_issues(&self) -> bool {
        self.invalid() > 0 || self.superseded > 0
    }
}

/// Parser for raw records under one value domain and UTC offset
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    range: PlausibleRange,
    utc_offset_secs: i32,
}

impl Normalizer {
    pub const fn new(range: PlausibleRange, utc_offset_secs: i32) -> Self {
        Self {
            range,
            utc_offset_secs,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.plausible_range, config.utc_offset_secs)
    }

    /// Parse one record into a tagged reading
    ///
    /// Timestamp problems are reported before value problems.
    pub fn parse(&self, index: usize, timestamp: &RawField, value: &RawField) -> ParsedReading {
        let parsed = self
            .parse_timestamp(timestamp)
            .and_then(|timestamp| Ok(Sample::new(timestamp, self.parse_value(value)?)));

        match parsed {
            Ok(sample) => ParsedReading::Valid(sample),
            Err(reason) => {
                trace!("Rejected record {}: {}", index, reason.label());
                ParsedReading::Rejected { index, reason }
            }
        }
    }

    /// Parse a timestamp field into local wall-clock time
    ///
    /// Text accepts the PRTG export layout (with or without an interval
    /// suffix) and ISO-like layouts. Numbers are Unix epoch seconds.
    pub fn parse_timestamp(&self, field: &RawField) -> Result<NaiveDateTime, RejectReason> {
        match field {
            RawField::Null => Err(RejectReason::MissingTimestamp),
            RawField::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(RejectReason::MissingTimestamp);
                }

                let start = text
                    .split_once(INTERVAL_SEPARATOR)
                    .map_or(text, |(start, _)| start)
                    .trim();

                TIMESTAMP_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(start, format).ok())
                    .ok_or(RejectReason::InvalidTimestamp)
            }
            RawField::Number(secs) => {
                if !secs.is_finite() || libm::trunc(*secs) != *secs {
                    return Err(RejectReason::InvalidTimestamp);
                }

                let offset = TimeDelta::try_seconds(i64::from(self.utc_offset_secs))
                    .ok_or(RejectReason::InvalidTimestamp)?;

                DateTime::from_timestamp(*secs as i64, 0)
                    .and_then(|utc| utc.naive_utc().checked_add_signed(offset))
                    .ok_or(RejectReason::InvalidTimestamp)
            }
        }
    }

    /// Parse a value field into a plausible, finite reading
    ///
    /// Text such as `"22.5 °C"` is accepted: when the text does not parse as a
    /// number directly, everything except digits, `.` and `-` is stripped.
    pub fn parse_value(&self, field: &RawField) -> Result<f64, RejectReason> {
        let value = match field {
            RawField::Null => return Err(RejectReason::MissingValue),
            RawField::Number(value) => *value,
            RawField::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(RejectReason::MissingValue);
                }
                match text.parse::<f64>() {
                    Ok(value) => value,
                    Err(_) => parse_decorated_number(text)?,
                }
            }
        };

        if !value.is_finite() {
            return Err(RejectReason::NonFinite);
        }
        if !self.range.contains(value) {
            return Err(RejectReason::OutOfRange);
        }
        Ok(value)
    }

    /// Normalize raw records into a series plus diagnostics
    pub fn normalize(
        &self,
        records: &[RawRecord],
    ) -> Result<(Series, Diagnostics), StructuralError> {
        let mut rejected = RejectCounts::default();
        let mut samples = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let (timestamp, value) = record.as_pair().ok_or(StructuralError::MalformedRecord {
                index,
                fields: record.fields().len(),
            })?;

            match self.parse(index, timestamp, value) {
                ParsedReading::Valid(sample) => samples.push(sample),
                ParsedReading::Rejected { reason, .. } => rejected.record(reason),
            }
        }

        let (series, superseded) = sort_and_dedup(samples);
        let diagnostics = Diagnostics {
            total: records.len(),
            retained: series.len(),
            superseded,
            rejected,
        };

        debug!(
            "Normalized {} of {} records ({} invalid, {} superseded)",
            diagnostics.retained,
            diagnostics.total,
            diagnostics.invalid(),
            diagnostics.superseded
        );

        Ok((series, diagnostics))
    }
}

/// Re-normalize already-parsed samples
///
/// Applies the same value checks and ordering rules as [`Normalizer::normalize`].
/// Normalizing the samples of an existing [`Series`] returns an identical series.
pub fn normalize_samples(samples: Vec<Sample>, range: PlausibleRange) -> (Series, Diagnostics) {
    let total = samples.len();
    let mut rejected = RejectCounts::default();

    let kept: Vec<Sample> = samples
        .into_iter()
        .filter(|sample| {
            let reason = if !sample.value.is_finite() {
                Some(RejectReason::NonFinite)
            } else if !range.contains(sample.value) {
                Some(RejectReason::OutOfRange)
            } else {
                None
            };

            if let Some(reason) = reason {
                rejected.record(reason);
            }
            reason.is_none()
        })
        .collect();

    let (series, superseded) = sort_and_dedup(kept);
    let diagnostics = Diagnostics {
        total,
        retained: series.len(),
        superseded,
        rejected,
    };

    (series, diagnostics)
}

/// Stable sort by timestamp, keeping the later-appearing sample on collision
fn sort_and_dedup(mut samples: Vec<Sample>) -> (Series, usize) {
    samples.sort_by_key(|sample| sample.timestamp);

    let mut superseded = 0;
    let mut unique: Vec<Sample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match unique.last_mut() {
            Some(last) if last.timestamp == sample.timestamp => {
                *last = sample;
                superseded += 1;
            }
            _ => unique.push(sample),
        }
    }

    (Series::from_sorted(unique), superseded)
}

/// Strip unit suffixes and separators, then parse what is left
fn parse_decorated_number(text: &str) -> Result<f64, RejectReason> {
    let mut cleaned = alloc::string::String::with_capacity(text.len());
    cleaned.extend(
        text.chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-'),
    );

    if cleaned.is_empty() {
        return Err(RejectReason::InvalidValue);
    }
    cleaned
        .parse::<f64>()
        .map_err(|_| RejectReason::InvalidValue)
}
