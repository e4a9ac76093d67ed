//! Temporal pattern aggregation
//!
//! Groups samples by hour-of-day (merged across all days of the window) and by
//! calendar date. Only keys with at least one sample produce a bucket; a
//! dense 0-23 grid is a rendering concern.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;

use crate::sample::Series;

const HOURS_PER_DAY: usize = 24;

/// Aggregate of the samples in one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Samples observed at one hour of the day, across all days
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyBucket {
    /// Local hour of day, 0..=23
    pub hour: u8,
    pub stats: BucketStats,
}

/// Samples observed on one calendar date
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub stats: BucketStats,
}

/// Running sum/min/max for one bucket
#[derive(Debug, Clone, Copy)]
struct BucketAccumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: usize,
}

impl BucketAccumulator {
    fn new(value: f64) -> Self {
        Self {
            sum: value,
            min: value,
            max: value,
            count: 1,
        }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }

    fn finish(self) -> BucketStats {
        let mean = if self.min == self.max {
            self.min
        } else {
            self.sum / self.count as f64
        };

        BucketStats {
            mean,
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }
}

/// Hour-of-day and per-day pattern tables of one series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemporalPatterns {
    /// Ordered by hour, 0 first
    pub hourly: Vec<HourlyBucket>,
    /// Ordered chronologically
    pub daily: Vec<DailyBucket>,
}

impl TemporalPatterns {
    /// Aggregate a series into hourly and daily buckets
    pub fn aggregate(series: &Series) -> Self {
        let mut hours: [Option<BucketAccumulator>; HOURS_PER_DAY] = [None; HOURS_PER_DAY];
        let mut days: BTreeMap<NaiveDate, BucketAccumulator> = BTreeMap::new();

        for sample in series.samples() {
            let hour = sample.timestamp.hour() as usize;
            match &mut hours[hour] {
                Some(bucket) => bucket.add(sample.value),
                slot => *slot = Some(BucketAccumulator::new(sample.value)),
            }

            days.entry(sample.timestamp.date())
                .and_modify(|bucket| bucket.add(sample.value))
                .or_insert_with(|| BucketAccumulator::new(sample.value));
        }

        let hourly = hours
            .iter()
            .enumerate()
            .filter_map(|(hour, bucket)| {
                bucket.map(|bucket| HourlyBucket {
                    hour: hour as u8,
                    stats: bucket.finish(),
                })
            })
            .collect();

        let daily = days
            .into_iter()
            .map(|(date, bucket)| DailyBucket {
                date,
                stats: bucket.finish(),
            })
            .collect();

        Self { hourly, daily }
    }

    /// Bucket for one hour of day, if any sample fell into it
    pub fn hour(&self, hour: u8) -> Option<&HourlyBucket> {
        self.hourly.iter().find(|bucket| bucket.hour == hour)
    }

    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty() && self.daily.is_empty()
    }
}
