//! Per-sensor analysis pipeline

use alloc::string::String;
use core::fmt;

use heapless::Vec as HeaplessVec;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, MAX_PERCENTILE_RANKS};
use crate::error::AnalysisError;
use crate::normalize::{Diagnostics, Normalizer};
use crate::patterns::{DailyBucket, HourlyBucket, TemporalPatterns};
use crate::sample::{Coverage, RawRecord, Series};
use crate::stability::{self, StabilityClass};
use crate::stats::{Statistics, Summary};
use crate::thresholds::{self, ThresholdSuggestion};
use crate::trend::{self, TrendSignal};

/// Who a result belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorIdentity {
    pub id: String,
    pub name: String,
}

impl SensorIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Everything the engine derived for one sensor
///
/// Built once by [`analyze`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    identity: SensorIdentity,
    diagnostics: Diagnostics,
    coverage: Option<Coverage>,
    statistics: Statistics,
    patterns: TemporalPatterns,
    trend: TrendSignal,
    stability: StabilityClass,
    thresholds: Option<ThresholdSuggestion>,
    series: Series,
}

impl AnalysisResult {
    pub fn identity(&self) -> &SensorIdentity {
        &self.identity
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Normalized samples the result was derived from
    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Shorthand for `statistics().summary()`
    pub fn summary(&self) -> Option<&Summary> {
        self.statistics.summary()
    }

    pub fn coverage(&self) -> Option<Coverage> {
        self.coverage
    }

    pub fn patterns(&self) -> &TemporalPatterns {
        &self.patterns
    }

    pub fn hourly(&self) -> &[HourlyBucket] {
        &self.patterns.hourly
    }

    pub fn daily(&self) -> &[DailyBucket] {
        &self.patterns.daily
    }

    pub fn trend(&self) -> &TrendSignal {
        &self.trend
    }

    pub fn stability(&self) -> StabilityClass {
        self.stability
    }

    /// Preliminary thresholds, `None` without valid samples
    pub fn thresholds(&self) -> Option<&ThresholdSuggestion> {
        self.thresholds.as_ref()
    }

    /// Whether no valid sample survived normalization
    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty()
    }
}

/// Analyze the raw readings of one sensor
///
/// Fails only on an invalid configuration or on input that is not a list of
/// `(timestamp, value)` pairs. Empty or sparse input yields a result with the
/// explicit empty markers set.
pub fn analyze(
    identity: SensorIdentity,
    records: &[RawRecord],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    config.validate()?;

    let (series, diagnostics) = Normalizer::from_config(config).normalize(records)?;
    let coverage = series.coverage();

    let ranks = statistics_ranks(config);
    let statistics = Statistics::compute(&series, &ranks);
    let patterns = TemporalPatterns::aggregate(&series);
    let trend = trend::detect(&series, &statistics, &config.trend);

    let stability = stability::classify(&statistics, &config.stability_bands);
    let thresholds = thresholds::recommend(&statistics, coverage, &config.thresholds);

    debug!(
        "Analyzed {}: {} samples, {}, trend {} ({:+.2})",
        identity,
        statistics.count(),
        stability,
        trend.direction,
        trend.magnitude
    );

    Ok(AnalysisResult {
        identity,
        diagnostics,
        coverage,
        statistics,
        patterns,
        trend,
        stability,
        thresholds,
        series,
    })
}

/// Configured percentile ranks plus whatever the threshold policy reads
fn statistics_ranks(config: &AnalysisConfig) -> HeaplessVec<u8, { MAX_PERCENTILE_RANKS + 4 }> {
    let mut ranks: HeaplessVec<u8, { MAX_PERCENTILE_RANKS + 4 }> = HeaplessVec::new();
    let required = config.thresholds.policy.required_ranks();

    for &rank in config.percentile_ranks.iter().chain(required.iter()) {
        if !ranks.contains(&rank) {
            let _ = ranks.push(rank);
        }
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::{ThresholdBasis, ThresholdPolicy};
    use alloc::format;
    use alloc::vec::Vec;

    fn records(values: &[f64]) -> Vec<RawRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let timestamp = format!("14.03.2025 {:02}:{:02}:00", i / 12, (i % 12) * 5);
                RawRecord::pair(timestamp, value)
            })
            .collect()
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(
            format!("{}", SensorIdentity::new("2041", "Rack A")),
            "Rack A (2041)"
        );
    }

    #[test]
    fn test_analyze_collects_every_part() {
        let values: Vec<f64> = (0..120).map(|i| 21.0 + (i % 5) as f64 * 0.2).collect();
        let result = analyze(
            SensorIdentity::new("2041", "Rack A"),
            &records(&values),
            &AnalysisConfig::default(),
        )
        .unwrap();

        assert_eq!(result.identity().id, "2041");
        assert_eq!(result.diagnostics().retained, 120);
        assert_eq!(result.summary().unwrap().count, 120);
        assert_eq!(result.hourly().len(), 10);
        assert_eq!(result.daily().len(), 1);
        assert_eq!(result.stability(), StabilityClass::VeryStable);
        assert_eq!(
            result.thresholds().unwrap().basis,
            ThresholdBasis::StddevMultiplier
        );
        assert!(!result.is_empty());
    }

    #[test]
    fn test_policy_ranks_are_computed() {
        let mut config = AnalysisConfig::default();
        config.percentile_ranks.clear();
        config.thresholds.policy = ThresholdPolicy::Percentile {
            warn_rank: 90,
            err_rank: 98,
        };

        let values: Vec<f64> = (0..50).map(|i| 18.0 + i as f64 * 0.1).collect();
        let result = analyze(SensorIdentity::new("1", "a"), &records(&values), &config).unwrap();
        let summary = result.summary().unwrap();

        for rank in [90, 10, 98, 2] {
            assert!(summary.percentile(rank).is_some(), "rank {rank} missing");
        }
        assert_eq!(
            result.thresholds().unwrap().basis,
            ThresholdBasis::Percentile
        );
    }

    #[test]
    fn test_invalid_config_is_error() {
        let mut config = AnalysisConfig::default();
        config.trend.window_hours = 0;

        let err = analyze(SensorIdentity::new("1", "a"), &records(&[20.0]), &config).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_input_is_not_error() {
        let result = analyze(
            SensorIdentity::new("1", "a"),
            &[],
            &AnalysisConfig::default(),
        )
        .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.stability(), StabilityClass::Unknown);
        assert!(result.thresholds().is_none());
        assert!(result.trend().insufficient_data);
        assert!(result.coverage().is_none());
    }
}
