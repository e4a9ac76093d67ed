//! Descriptive statistics over a normalized series

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use serde::Serialize;

use crate::sample::Series;

/// Summary of a non-empty series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Number of valid samples
    pub count: usize,
    /// Value of the latest sample
    pub current: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// `max - min`
    pub range: f64,
    /// Population standard deviation (denominator = count)
    pub stddev: f64,
    /// Interpolated percentiles keyed by rank (0..=100)
    pub percentiles: BTreeMap<u8, f64>,
}

impl Summary {
    pub fn percentile(&self, rank: u8) -> Option<f64> {
        self.percentiles.get(&rank).copied()
    }

    /// Whether every sample carried the same value
    pub fn is_flat(&self) -> bool {
        self.range == 0.0
    }
}

/// Statistics of a series, with an explicit state for "no valid samples"
///
/// `Empty` keeps the engine from ever presenting NaN as a real mean or
/// deviation; consumers must match on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statistics {
    Empty,
    Computed(Summary),
}

impl Statistics {
    /// Compute statistics, reporting the given percentile ranks
    ///
    /// Ranks above 100 are ignored; duplicates collapse into one entry.
    pub fn compute(series: &Series, ranks: &[u8]) -> Self {
        let Some(latest) = series.latest() else {
            return Self::Empty;
        };

        let mut sorted: Vec<f64> = series.values().collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let min = sorted[0];
        let max = sorted[count - 1];

        // A flat series reports its exact value, free of summation error
        let (mean, stddev) = if min == max {
            (min, 0.0)
        } else {
            let mean = mean(&sorted);
            (mean, population_stddev(&sorted, mean))
        };

        let percentiles = ranks
            .iter()
            .filter_map(|&rank| percentile(&sorted, rank).map(|value| (rank, value)))
            .collect();

        Self::Computed(Summary {
            count,
            current: latest.value,
            mean,
            min,
            max,
            range: max - min,
            stddev,
            percentiles,
        })
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Self::Empty => None,
            Self::Computed(summary) => Some(summary),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn count(&self) -> usize {
        self.summary().map_or(0, |summary| summary.count)
    }
}

/// Arithmetic mean of a non-empty slice
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a known mean
fn population_stddev(values: &[f64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|value| {
            let delta = value - mean;
            delta * delta
        })
        .sum::<f64>()
        / values.len() as f64;

    libm::sqrt(variance)
}

/// Linear-interpolation percentile over sorted values (R type 7)
///
/// `idx = rank / 100 * (n - 1)`, interpolating between the order statistics at
/// `floor(idx)` and `ceil(idx)`. Returns `None` for an empty slice or a rank
/// above 100.
pub fn percentile(sorted: &[f64], rank: u8) -> Option<f64> {
    if sorted.is_empty() || rank > 100 {
        return None;
    }

    let idx = f64::from(rank) / 100.0 * (sorted.len() - 1) as f64;
    let lower_idx = libm::floor(idx);
    let lower = sorted[lower_idx as usize];
    let upper = sorted[libm::ceil(idx) as usize];

    // Interpolation can overshoot the upper order statistic by one ulp
    let value = lower + (idx - lower_idx) * (upper - lower);
    Some(value.clamp(lower, upper))
}
