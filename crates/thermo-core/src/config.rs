//! Engine configuration
//!
//! Every policy knob of the analysis engine lives here. The engine never reads
//! configuration from anywhere itself: callers build an [`AnalysisConfig`]
//! (usually `Default` plus a few overrides) and pass it into each call.

use heapless::Vec as HeaplessVec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stability::{StabilityBand, StabilityClass};
use crate::thresholds::ThresholdConfig;
use crate::trend::TrendConfig;

/// Maximum number of percentile ranks reported per sensor
pub const MAX_PERCENTILE_RANKS: usize = 16;

/// Maximum number of stability bands
pub const MAX_STABILITY_BANDS: usize = 8;

/// Percentile ranks reported when none are configured
pub const DEFAULT_PERCENTILE_RANKS: [u8; 7] = [1, 5, 25, 50, 75, 95, 99];

/// Seconds in one day, the bound for [`AnalysisConfig::utc_offset_secs`]
const SECONDS_PER_DAY: i32 = 86_400;

/// Physically plausible value domain, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for PlausibleRange {
    /// Indoor/outdoor temperature sensors, °C
    fn default() -> Self {
        Self::new(-50.0, 100.0)
    }
}

/// Complete policy for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Values outside this range are dropped by the normalizer
    pub plausible_range: PlausibleRange,
    /// Percentile ranks (0..=100) reported in the statistics summary
    pub percentile_ranks: HeaplessVec<u8, MAX_PERCENTILE_RANKS>,
    /// Ordered stddev bands mapping dispersion to a stability class
    pub stability_bands: HeaplessVec<StabilityBand, MAX_STABILITY_BANDS>,
    /// Trend window and noise band
    pub trend: TrendConfig,
    /// Threshold policy
    pub thresholds: ThresholdConfig,
    /// Offset applied when converting epoch-second timestamps to local time
    pub utc_offset_secs: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut percentile_ranks = HeaplessVec::new();
        for rank in DEFAULT_PERCENTILE_RANKS {
            let _ = percentile_ranks.push(rank);
        }

        let mut stability_bands = HeaplessVec::new();
        for band in [
            StabilityBand::new(0.5, StabilityClass::VeryStable),
            StabilityBand::new(1.0, StabilityClass::Stable),
            StabilityBand::new(2.0, StabilityClass::Moderate),
        ] {
            let _ = stability_bands.push(band);
        }

        Self {
            plausible_range: PlausibleRange::default(),
            percentile_ranks,
            stability_bands,
            trend: TrendConfig::default(),
            thresholds: ThresholdConfig::default(),
            utc_offset_secs: 0,
        }
    }
}

impl AnalysisConfig {
    /// Check every invariant the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let PlausibleRange { min, max } = self.plausible_range;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(ConfigError::InvalidPlausibleRange { min, max });
        }

        if let Some(&rank) = self.percentile_ranks.iter().find(|&&rank| rank > 100) {
            return Err(ConfigError::InvalidPercentileRank { rank });
        }

        let mut previous = 0.0;
        let mut previous_class = StabilityClass::VeryStable;
        for (index, band) in self.stability_bands.iter().enumerate() {
            if !band.is_valid() {
                return Err(ConfigError::InvalidStabilityBand { index });
            }
            if band.stddev_below <= previous || band.class < previous_class {
                return Err(ConfigError::UnorderedStabilityBands { index });
            }
            previous = band.stddev_below;
            previous_class = band.class;
        }

        if self.utc_offset_secs.abs() >= SECONDS_PER_DAY {
            return Err(ConfigError::InvalidUtcOffset {
                secs: self.utc_offset_secs,
            });
        }

        self.trend.validate()?;
        self.thresholds.validate()
    }
}
