//! Trend detection
//!
//! A trend compares the recent window `(anchor - window_hours, anchor]` with
//! what came before it, or measures the change across the window itself. The
//! anchor defaults to the latest sample.

use core::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sample::{Sample, Series};
use crate::stats::Statistics;

/// Direction of a trend signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }

    /// Single-character indicator for compact tables
    pub const fn arrow(self) -> char {
        match self {
            Self::Rising => '↑',
            Self::Falling => '↓',
            Self::Stable => '→',
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the magnitude of a trend is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMethod {
    /// Mean of the recent window minus the mean of all earlier samples
    #[default]
    BaselineShift,
    /// Least-squares slope inside the recent window, scaled to the window length
    WindowSlope,
}

/// Magnitude below which a trend is reported as stable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseBand {
    /// Fixed band in °C
    Absolute(f64),
    /// Fraction of the population stddev of the whole series
    StddevFraction(f64),
}

impl NoiseBand {
    fn raw(self) -> f64 {
        match self {
            Self::Absolute(value) | Self::StddevFraction(value) => value,
        }
    }

    /// Band in °C; a stddev fraction of flat or empty statistics is zero
    fn resolve(self, statistics: &Statistics) -> f64 {
        match self {
            Self::Absolute(band) => band,
            Self::StddevFraction(fraction) => {
                let stddev = statistics.summary().map_or(0.0, |summary| summary.stddev);
                fraction * stddev
            }
        }
    }
}

impl Default for NoiseBand {
    fn default() -> Self {
        Self::Absolute(0.3)
    }
}

/// Trend detector settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Length of the recent window
    pub window_hours: u32,
    pub noise_band: NoiseBand,
    pub method: TrendMethod,
    /// End of the recent window, inclusive; the latest sample when unset
    pub anchor: Option<NaiveDateTime>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            noise_band: NoiseBand::default(),
            method: TrendMethod::default(),
            anchor: None,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_hours == 0 {
            return Err(ConfigError::InvalidTrendWindow);
        }

        let band = self.noise_band.raw();
        if !band.is_finite() || band < 0.0 {
            return Err(ConfigError::InvalidNoiseBand);
        }

        Ok(())
    }
}

/// Directional trend of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSignal {
    pub direction: TrendDirection,
    /// Change in °C; positive means warming
    pub magnitude: f64,
    pub window_hours: u32,
    /// Resolved noise band in °C
    pub noise_band: f64,
    /// Set when the window or its baseline held too few samples
    pub insufficient_data: bool,
}

impl TrendSignal {
    fn insufficient(window_hours: u32, noise_band: f64) -> Self {
        Self {
            direction: TrendDirection::Stable,
            magnitude: 0.0,
            window_hours,
            noise_band,
            insufficient_data: true,
        }
    }
}

/// Detect the trend of a series
///
/// `statistics` must describe the same series; it supplies the stddev for
/// [`NoiseBand::StddevFraction`].
pub fn detect(series: &Series, statistics: &Statistics, config: &TrendConfig) -> TrendSignal {
    let noise_band = config.noise_band.resolve(statistics);

    let latest = series.latest().map(|s| s.timestamp);
    let Some(anchor) = config.anchor.or(latest) else {
        return TrendSignal::insufficient(config.window_hours, noise_band);
    };

    // Everything after the anchor is outside the analysis horizon
    let history = series.samples();
    let end = history.partition_point(|s| s.timestamp <= anchor);
    let history = &history[..end];

    let split = TimeDelta::try_hours(i64::from(config.window_hours))
        .and_then(|window| anchor.checked_sub_signed(window))
        .map_or(0, |start| history.partition_point(|s| s.timestamp <= start));
    let (baseline, recent) = history.split_at(split);

    let magnitude = match config.method {
        TrendMethod::BaselineShift => baseline_shift(baseline, recent),
        TrendMethod::WindowSlope => window_slope(recent, config.window_hours),
    };

    let Some(magnitude) = magnitude else {
        trace!(
            "Insufficient data for trend ({} recent, {} baseline samples)",
            recent.len(),
            baseline.len()
        );
        return TrendSignal::insufficient(config.window_hours, noise_band);
    };

    let direction = if magnitude > noise_band {
        TrendDirection::Rising
    } else if magnitude < -noise_band {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    };

    TrendSignal {
        direction,
        magnitude,
        window_hours: config.window_hours,
        noise_band,
        insufficient_data: false,
    }
}

/// Mean distance of the samples from `reference`
///
/// Equal values contribute exact zeros, so a flat series never picks up
/// summation error.
fn mean_offset(samples: &[Sample], reference: f64) -> f64 {
    samples.iter().map(|s| s.value - reference).sum::<f64>() / samples.len() as f64
}

fn baseline_shift(baseline: &[Sample], recent: &[Sample]) -> Option<f64> {
    let reference = baseline.first()?.value;
    if recent.is_empty() {
        return None;
    }

    Some(mean_offset(recent, reference) - mean_offset(baseline, reference))
}

/// Least-squares slope in °C/hour, scaled to the full window
fn window_slope(recent: &[Sample], window_hours: u32) -> Option<f64> {
    let first = recent.first()?;
    if recent.len() < 2 {
        return None;
    }

    let hours = |sample: &Sample| {
        (sample.timestamp - first.timestamp).num_milliseconds() as f64 / 3_600_000.0
    };

    let n = recent.len() as f64;
    let mean_x = recent.iter().map(hours).sum::<f64>() / n;
    let mean_y = mean_offset(recent, first.value);

    let (covariance, variance) = recent.iter().fold((0.0, 0.0), |(cov, var), sample| {
        let dx = hours(sample) - mean_x;
        let dy = (sample.value - first.value) - mean_y;
        (cov + dx * dy, var + dx * dx)
    });

    if variance == 0.0 {
        return None;
    }

    Some(covariance / variance * f64::from(window_hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlausibleRange;
    use crate::normalize::normalize_samples;
    use alloc::vec::Vec;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn run(series: &Series, config: &TrendConfig) -> TrendSignal {
        detect(series, &Statistics::compute(series, &[]), config)
    }

    fn hourly(values: &[f64]) -> Series {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(start() + TimeDelta::hours(i as i64), v))
            .collect();
        normalize_samples(samples, PlausibleRange::default()).0
    }

    /// 20 -> 30 over 24 hours in 5-minute steps, then flat at 30 for 24 hours
    fn ramp_then_flat() -> Series {
        let samples: Vec<Sample> = (0..=576)
            .map(|step| {
                let minutes = 5 * step;
                let value = if minutes <= 24 * 60 {
                    20.0 + 10.0 * minutes as f64 / (24.0 * 60.0)
                } else {
                    30.0
                };
                Sample::new(start() + TimeDelta::minutes(minutes), value)
            })
            .collect();
        normalize_samples(samples, PlausibleRange::default()).0
    }

    #[test]
    fn test_flat_series_is_stable() {
        let signal = run(&hourly(&[22.0; 100]), &TrendConfig::default());

        assert_eq!(signal.direction, TrendDirection::Stable);
        assert_eq!(signal.magnitude, 0.0);
        assert!(!signal.insufficient_data);
    }

    #[test]
    fn test_flat_series_with_inexact_values() {
        let bands = [NoiseBand::Absolute(0.3), NoiseBand::StddevFraction(0.5)];
        let methods = [TrendMethod::BaselineShift, TrendMethod::WindowSlope];

        for value in [22.1, 22.3, 19.7, 23.45, 21.9, 18.2, 24.6] {
            for noise_band in bands {
                for method in methods {
                    let config = TrendConfig {
                        noise_band,
                        method,
                        ..TrendConfig::default()
                    };
                    let signal = run(&hourly(&[value; 100]), &config);

                    assert_eq!(
                        signal.direction,
                        TrendDirection::Stable,
                        "{value} {config:?}"
                    );
                    assert_eq!(signal.magnitude, 0.0, "{value} {config:?}");
                }
            }
        }
    }

    #[test]
    fn test_baseline_shift_rising_and_falling() {
        let mut values = [20.0; 48];
        values[24..].fill(21.0);
        let signal = run(&hourly(&values), &TrendConfig::default());
        assert_eq!(signal.direction, TrendDirection::Rising);
        // The window (anchor - 24h, anchor] holds hours 24..=47
        assert_eq!(signal.magnitude, 1.0);

        values[24..].fill(19.5);
        let signal = run(&hourly(&values), &TrendConfig::default());
        assert_eq!(signal.direction, TrendDirection::Falling);
        assert_eq!(signal.magnitude, -0.5);
    }

    #[test]
    fn test_shift_within_noise_band_is_stable() {
        let mut values = [20.0; 48];
        values[24..].fill(20.25);
        let signal = run(&hourly(&values), &TrendConfig::default());

        assert_eq!(signal.direction, TrendDirection::Stable);
        assert_eq!(signal.magnitude, 0.25);
    }

    #[test]
    fn test_baseline_shift_after_ramp() {
        // Recent window is flat at 30, the baseline is the ramp averaging 25
        let signal = run(&ramp_then_flat(), &TrendConfig::default());

        assert_eq!(signal.direction, TrendDirection::Rising);
        assert!((signal.magnitude - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_slope_after_ramp_is_stable() {
        let config = TrendConfig {
            method: TrendMethod::WindowSlope,
            ..TrendConfig::default()
        };
        let signal = run(&ramp_then_flat(), &config);

        assert_eq!(signal.direction, TrendDirection::Stable);
        assert!(signal.magnitude.abs() < 1e-9);
        assert!(!signal.insufficient_data);
    }

    #[test]
    fn test_window_slope_on_ramp() {
        let config = TrendConfig {
            method: TrendMethod::WindowSlope,
            anchor: Some(start() + TimeDelta::hours(24)),
            ..TrendConfig::default()
        };
        let signal = run(&ramp_then_flat(), &config);

        assert_eq!(signal.direction, TrendDirection::Rising);
        assert!((signal.magnitude - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_stddev_fraction_band() {
        let mut values = [20.0; 48];
        values[24..].fill(21.0);
        // Whole-series stddev is 0.5, so a fraction of 3 gives a 1.5 band
        let config = TrendConfig {
            noise_band: NoiseBand::StddevFraction(3.0),
            ..TrendConfig::default()
        };
        let signal = run(&hourly(&values), &config);

        assert_eq!(signal.noise_band, 1.5);
        assert_eq!(signal.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_insufficient_data() {
        // Everything falls inside the recent window, no baseline
        let signal = run(&hourly(&[20.0, 25.0, 30.0]), &TrendConfig::default());
        assert!(signal.insufficient_data);
        assert_eq!(signal.direction, TrendDirection::Stable);
        assert_eq!(signal.magnitude, 0.0);

        let signal = run(&Series::default(), &TrendConfig::default());
        assert!(signal.insufficient_data);

        let config = TrendConfig {
            method: TrendMethod::WindowSlope,
            ..TrendConfig::default()
        };
        assert!(run(&hourly(&[21.0]), &config).insufficient_data);
    }

    #[test]
    fn test_validate() {
        let config = TrendConfig {
            window_hours: 0,
            ..TrendConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTrendWindow));

        let config = TrendConfig {
            noise_band: NoiseBand::Absolute(-0.1),
            ..TrendConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidNoiseBand));
        assert_eq!(TrendConfig::default().validate(), Ok(()));
    }
}
