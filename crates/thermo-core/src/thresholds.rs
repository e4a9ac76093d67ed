//! Alert threshold recommendation
//!
//! Suggests warning/error bounds around a sensor's typical value. The result
//! is always preliminary: it describes what the history looked like, not what
//! the equipment tolerates.

use core::fmt;

use heapless::Vec as HeaplessVec;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sample::Coverage;
use crate::stats::{Statistics, Summary};

const DEFAULT_K_WARN: f64 = 2.0;
const DEFAULT_K_ERR: f64 = 3.0;

/// How thresholds are derived from the statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// `mean ± k * stddev`
    StddevMultiplier { k_warn: f64, k_err: f64 },
    /// Upper bounds at `p[rank]`, lower bounds at `p[100 - rank]`
    Percentile { warn_rank: u8, err_rank: u8 },
    /// `mean ± offset`
    FixedOffset { warn: f64, err: f64 },
    /// Fixed offsets while the history is short, percentiles once it is not
    Adaptive {
        min_history_hours: u32,
        warn_offset: f64,
        err_offset: f64,
        warn_rank: u8,
        err_rank: u8,
    },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::StddevMultiplier {
            k_warn: DEFAULT_K_WARN,
            k_err: DEFAULT_K_ERR,
        }
    }
}

impl ThresholdPolicy {
    /// Policy used when the available history is unknown or too short to judge
    pub const fn adaptive() -> Self {
        Self::Adaptive {
            min_history_hours: 7 * 24,
            warn_offset: 2.0,
            err_offset: 3.0,
            warn_rank: 95,
            err_rank: 99,
        }
    }

    /// Percentile ranks this policy may read from the summary
    pub fn required_ranks(&self) -> HeaplessVec<u8, 4> {
        let mut ranks = HeaplessVec::new();
        if let Self::Percentile {
            warn_rank,
            err_rank,
        }
        | Self::Adaptive {
            warn_rank,
            err_rank,
            ..
        } = *self
        {
            for rank in [warn_rank, err_rank] {
                let _ = ranks.push(rank);
                let _ = ranks.push(100u8.saturating_sub(rank));
            }
        }
        ranks
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::StddevMultiplier { k_warn, k_err } => {
                if !(k_warn.is_finite() && k_err.is_finite() && 0.0 < k_warn && k_warn < k_err) {
                    return Err(ConfigError::InvalidMultipliers { k_warn, k_err });
                }
            }
            Self::Percentile {
                warn_rank,
                err_rank,
            } => validate_ranks(warn_rank, err_rank)?,
            Self::FixedOffset { warn, err } => validate_offsets(warn, err)?,
            Self::Adaptive {
                warn_offset,
                err_offset,
                warn_rank,
                err_rank,
                ..
            } => {
                validate_offsets(warn_offset, err_offset)?;
                validate_ranks(warn_rank, err_rank)?;
            }
        }

        Ok(())
    }
}

fn validate_ranks(warn: u8, err: u8) -> Result<(), ConfigError> {
    if 50 < warn && warn < err && err <= 100 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThresholdRanks { warn, err })
    }
}

fn validate_offsets(warn: f64, err: f64) -> Result<(), ConfigError> {
    if warn.is_finite() && err.is_finite() && 0.0 < warn && warn < err {
        Ok(())
    } else {
        Err(ConfigError::InvalidOffsets { warn, err })
    }
}

/// Threshold recommender settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub policy: ThresholdPolicy,
    /// Half-width of the warning band around a flat series, and the step
    /// used to separate bounds that would otherwise coincide
    pub degenerate_epsilon: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            policy: ThresholdPolicy::default(),
            degenerate_epsilon: 0.1,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.degenerate_epsilon.is_finite() && self.degenerate_epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon);
        }
        self.policy.validate()
    }
}

/// Severity of a reading relative to a threshold set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    Warning,
    Error,
}

impl AlertLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Four alert bounds, `lower_error < lower_warning < upper_warning < upper_error`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSet {
    pub upper_error: f64,
    pub upper_warning: f64,
    pub lower_warning: f64,
    pub lower_error: f64,
}

impl ThresholdSet {
    fn around(mean: f64, warn: f64, err: f64) -> Self {
        Self {
            upper_error: mean + err,
            upper_warning: mean + warn,
            lower_warning: mean - warn,
            lower_error: mean - err,
        }
    }

    /// Classify a reading; bounds themselves count as crossed
    pub fn classify(&self, value: f64) -> AlertLevel {
        if value >= self.upper_error || value <= self.lower_error {
            AlertLevel::Error
        } else if value >= self.upper_warning || value <= self.lower_warning {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.lower_error < self.lower_warning
            && self.lower_warning < self.upper_warning
            && self.upper_warning < self.upper_error
    }

    /// Push bounds outward in `epsilon` steps until they strictly bracket `mean`
    fn widen_around(&mut self, mean: f64, epsilon: f64) {
        if self.lower_warning >= mean {
            self.lower_warning = mean - epsilon;
        }
        if self.lower_error >= self.lower_warning {
            self.lower_error = self.lower_warning - epsilon;
        }
        if self.upper_warning <= mean {
            self.upper_warning = mean + epsilon;
        }
        if self.upper_error <= self.upper_warning {
            self.upper_error = self.upper_warning + epsilon;
        }
    }
}

/// Where a threshold set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBasis {
    StddevMultiplier,
    Percentile,
    FixedOffset,
    /// The series was flat; bounds are `mean ± epsilon` and `mean ± 2 * epsilon`
    Degenerate,
}

impl ThresholdBasis {
    pub const fn note(self) -> &'static str {
        match self {
            Self::StddevMultiplier | Self::Percentile => {
                "Preliminary: based on statistical analysis"
            }
            Self::FixedOffset => "Preliminary: conservative estimates (limited data)",
            Self::Degenerate => "Preliminary: flat series, bounds placed around the mean",
        }
    }
}

/// A threshold set together with how it was derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSuggestion {
    pub set: ThresholdSet,
    pub basis: ThresholdBasis,
    note: &'static str,
}

impl ThresholdSuggestion {
    fn new(set: ThresholdSet, basis: ThresholdBasis) -> Self {
        Self {
            set,
            basis,
            note: basis.note(),
        }
    }

    /// Human-readable caveat; every suggestion is preliminary
    pub fn note(&self) -> &'static str {
        self.note
    }

    pub fn classify(&self, value: f64) -> AlertLevel {
        self.set.classify(value)
    }
}

/// Recommend thresholds from a statistics summary
///
/// Returns `None` for empty statistics. `coverage` is only consulted by the
/// adaptive policy.
pub fn recommend(
    statistics: &Statistics,
    coverage: Option<Coverage>,
    config: &ThresholdConfig,
) -> Option<ThresholdSuggestion> {
    let summary = statistics.summary()?;
    let epsilon = config.degenerate_epsilon;

    if summary.is_flat() {
        debug!(
            "Flat series, using degenerate thresholds around {}",
            summary.mean
        );
        let set = ThresholdSet::around(summary.mean, epsilon, 2.0 * epsilon);
        return Some(ThresholdSuggestion::new(set, ThresholdBasis::Degenerate));
    }

    let (mut set, basis) = match ResolvedPolicy::new(config.policy, coverage) {
        ResolvedPolicy::Percentile {
            warn_rank,
            err_rank,
        } => match percentile_set(summary, warn_rank, err_rank) {
            Some(set) => (set, ThresholdBasis::Percentile),
            None => {
                warn!("Percentile ranks {warn_rank}/{err_rank} missing, using stddev multipliers");
                (
                    multiplier_set(summary, DEFAULT_K_WARN, DEFAULT_K_ERR),
                    ThresholdBasis::StddevMultiplier,
                )
            }
        },
        ResolvedPolicy::FixedOffset { warn, err } => (
            ThresholdSet::around(summary.mean, warn, err),
            ThresholdBasis::FixedOffset,
        ),
        ResolvedPolicy::StddevMultiplier { k_warn, k_err } => (
            multiplier_set(summary, k_warn, k_err),
            ThresholdBasis::StddevMultiplier,
        ),
    };

    let brackets_mean = set.lower_warning < summary.mean && summary.mean < set.upper_warning;
    if !set.is_ordered() || !brackets_mean {
        debug!("Widening unordered thresholds {set:?}");
        set.widen_around(summary.mean, epsilon);
    }

    Some(ThresholdSuggestion::new(set, basis))
}

/// A policy with the adaptive choice already made for one series
#[derive(Debug, Clone, Copy, PartialEq)]
enum ResolvedPolicy {
    StddevMultiplier { k_warn: f64, k_err: f64 },
    Percentile { warn_rank: u8, err_rank: u8 },
    FixedOffset { warn: f64, err: f64 },
}

impl ResolvedPolicy {
    /// Adaptive policies pick fixed offsets until the history spans
    /// `min_history_hours`, percentiles afterwards
    fn new(policy: ThresholdPolicy, coverage: Option<Coverage>) -> Self {
        match policy {
            ThresholdPolicy::StddevMultiplier { k_warn, k_err } => {
                Self::StddevMultiplier { k_warn, k_err }
            }
            ThresholdPolicy::Percentile {
                warn_rank,
                err_rank,
            } => Self::Percentile {
                warn_rank,
                err_rank,
            },
            ThresholdPolicy::FixedOffset { warn, err } => Self::FixedOffset { warn, err },
            ThresholdPolicy::Adaptive {
                min_history_hours,
                warn_offset,
                err_offset,
                warn_rank,
                err_rank,
            } => {
                let history_hours = coverage.map_or(0.0, |coverage| coverage.span_hours());
                if history_hours < f64::from(min_history_hours) {
                    Self::FixedOffset {
                        warn: warn_offset,
                        err: err_offset,
                    }
                } else {
                    Self::Percentile {
                        warn_rank,
                        err_rank,
                    }
                }
            }
        }
    }
}

fn multiplier_set(summary: &Summary, k_warn: f64, k_err: f64) -> ThresholdSet {
    ThresholdSet::around(
        summary.mean,
        k_warn * summary.stddev,
        k_err * summary.stddev,
    )
}

fn percentile_set(summary: &Summary, warn_rank: u8, err_rank: u8) -> Option<ThresholdSet> {
    Some(ThresholdSet {
        upper_error: summary.percentile(err_rank)?,
        upper_warning: summary.percentile(warn_rank)?,
        lower_warning: summary.percentile(100 - warn_rank)?,
        lower_error: summary.percentile(100 - err_rank)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use chrono::{NaiveDate, TimeDelta};

    fn summary(mean: f64, stddev: f64, percentiles: &[(u8, f64)]) -> Statistics {
        Statistics::Computed(Summary {
            count: 100,
            current: mean,
            mean,
            min: mean - 4.0 * stddev,
            max: mean + 4.0 * stddev,
            range: 8.0 * stddev,
            stddev,
            percentiles: percentiles.iter().copied().collect::<BTreeMap<_, _>>(),
        })
    }

    fn coverage(hours: i64) -> Option<Coverage> {
        let first = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Some(Coverage {
            first,
            last: first + TimeDelta::hours(hours),
        })
    }

    #[test]
    fn test_stddev_multiplier() {
        let config = ThresholdConfig::default();
        let suggestion = recommend(&summary(22.0, 0.5, &[]), coverage(48), &config).unwrap();

        assert_eq!(suggestion.basis, ThresholdBasis::StddevMultiplier);
        assert_eq!(suggestion.set.upper_error, 23.5);
        assert_eq!(suggestion.set.upper_warning, 23.0);
        assert_eq!(suggestion.set.lower_warning, 21.0);
        assert_eq!(suggestion.set.lower_error, 20.5);
        assert!(suggestion.set.is_ordered());
    }

    #[test]
    fn test_percentile_policy() {
        let config = ThresholdConfig {
            policy: ThresholdPolicy::Percentile {
                warn_rank: 95,
                err_rank: 99,
            },
            ..ThresholdConfig::default()
        };
        let stats = summary(22.0, 1.0, &[(1, 19.0), (5, 20.5), (95, 23.0), (99, 25.0)]);
        let suggestion = recommend(&stats, coverage(48), &config).unwrap();

        assert_eq!(suggestion.basis, ThresholdBasis::Percentile);
        assert_eq!(suggestion.set.upper_error, 25.0);
        assert_eq!(suggestion.set.upper_warning, 23.0);
        assert_eq!(suggestion.set.lower_warning, 20.5);
        assert_eq!(suggestion.set.lower_error, 19.0);
    }

    #[test]
    fn test_missing_percentiles_fall_back() {
        let config = ThresholdConfig {
            policy: ThresholdPolicy::Percentile {
                warn_rank: 90,
                err_rank: 99,
            },
            ..ThresholdConfig::default()
        };
        let suggestion = recommend(&summary(22.0, 1.0, &[]), None, &config).unwrap();
        assert_eq!(suggestion.basis, ThresholdBasis::StddevMultiplier);
    }

    #[test]
    fn test_adaptive_switches_on_history() {
        let config = ThresholdConfig {
            policy: ThresholdPolicy::adaptive(),
            ..ThresholdConfig::default()
        };
        let stats = summary(22.0, 1.0, &[(1, 19.0), (5, 20.5), (95, 23.0), (99, 25.0)]);

        let short = recommend(&stats, coverage(48), &config).unwrap();
        assert_eq!(short.basis, ThresholdBasis::FixedOffset);
        assert_eq!(short.set.upper_warning, 24.0);
        assert_eq!(short.set.lower_error, 19.0);
        assert_eq!(
            short.note(),
            "Preliminary: conservative estimates (limited data)"
        );

        let long = recommend(&stats, coverage(8 * 24), &config).unwrap();
        assert_eq!(long.basis, ThresholdBasis::Percentile);
        assert_eq!(long.set.upper_error, 25.0);
    }

    #[test]
    fn test_adaptive_resolves_to_concrete_policy() {
        let policy = ThresholdPolicy::adaptive();

        assert_eq!(
            ResolvedPolicy::new(policy, None),
            ResolvedPolicy::FixedOffset {
                warn: 2.0,
                err: 3.0
            }
        );
        assert_eq!(
            ResolvedPolicy::new(policy, coverage(7 * 24)),
            ResolvedPolicy::Percentile {
                warn_rank: 95,
                err_rank: 99
            }
        );
        assert_eq!(
            ResolvedPolicy::new(ThresholdPolicy::default(), None),
            ResolvedPolicy::StddevMultiplier {
                k_warn: 2.0,
                k_err: 3.0
            }
        );
    }

    #[test]
    fn test_flat_series_is_degenerate() {
        let config = ThresholdConfig::default();
        let suggestion = recommend(&summary(22.0, 0.0, &[]), coverage(99), &config).unwrap();

        assert_eq!(suggestion.basis, ThresholdBasis::Degenerate);
        assert_eq!(suggestion.set.upper_warning, 22.1);
        assert_eq!(suggestion.set.lower_warning, 21.9);
        assert!(suggestion.set.is_ordered());
        assert!(suggestion.note().starts_with("Preliminary"));
    }

    #[test]
    fn test_collapsed_percentiles_are_widened() {
        let config = ThresholdConfig {
            policy: ThresholdPolicy::Percentile {
                warn_rank: 95,
                err_rank: 99,
            },
            ..ThresholdConfig::default()
        };
        // Mostly flat series with one spike: p95 equals the mean
        let stats = summary(22.0, 0.2, &[(1, 22.0), (5, 22.0), (95, 22.0), (99, 22.0)]);
        let set = recommend(&stats, None, &config).unwrap().set;

        assert!(set.is_ordered());
        assert!(set.lower_warning < 22.0 && 22.0 < set.upper_warning);
    }

    #[test]
    fn test_empty_statistics_have_no_suggestion() {
        assert!(recommend(&Statistics::Empty, None, &ThresholdConfig::default()).is_none());
    }

    #[test]
    fn test_classify() {
        let set = ThresholdSet::around(22.0, 2.0, 3.0);

        assert_eq!(set.classify(22.0), AlertLevel::Normal);
        assert_eq!(set.classify(24.0), AlertLevel::Warning);
        assert_eq!(set.classify(19.5), AlertLevel::Warning);
        assert_eq!(set.classify(25.0), AlertLevel::Error);
        assert_eq!(set.classify(-3.0), AlertLevel::Error);
    }

    #[test]
    fn test_policy_validation() {
        let invalid = [
            ThresholdPolicy::Percentile {
                warn_rank: 99,
                err_rank: 95,
            },
            ThresholdPolicy::Percentile {
                warn_rank: 40,
                err_rank: 99,
            },
            ThresholdPolicy::FixedOffset {
                warn: 0.0,
                err: 1.0,
            },
            ThresholdPolicy::StddevMultiplier {
                k_warn: f64::NAN,
                k_err: 3.0,
            },
        ];
        for policy in invalid {
            let config = ThresholdConfig {
                policy,
                ..ThresholdConfig::default()
            };
            assert!(config.validate().is_err(), "{policy:?} should be rejected");
        }

        let config = ThresholdConfig {
            degenerate_epsilon: 0.0,
            ..ThresholdConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidEpsilon));

        let adaptive = ThresholdConfig {
            policy: ThresholdPolicy::adaptive(),
            ..ThresholdConfig::default()
        };
        assert!(adaptive.validate().is_ok());
    }

    #[test]
    fn test_required_ranks() {
        let ranks = ThresholdPolicy::adaptive().required_ranks();
        assert_eq!(ranks.as_slice(), &[95, 5, 99, 1]);
        assert!(ThresholdPolicy::default().required_ranks().is_empty());
    }

    #[test]
    fn test_policy_json_shape() {
        let policy: ThresholdPolicy =
            serde_json::from_str(r#"{ "mode": "percentile", "warn_rank": 90, "err_rank": 98 }"#)
                .unwrap();
        assert_eq!(
            policy,
            ThresholdPolicy::Percentile {
                warn_rank: 90,
                err_rank: 98
            }
        );
    }
}
