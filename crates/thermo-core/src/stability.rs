//! Stability classification
//!
//! Maps the dispersion of a sensor's readings to a discrete class. The cut
//! points are configuration; see [`crate::AnalysisConfig::stability_bands`].

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::stats::Statistics;

/// Discrete stability category of a sensor
///
/// `VeryStable` through `Volatile` are ordered from least to most dispersed.
/// `Unknown` is reserved for sensors without valid readings and sorts last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityClass {
    VeryStable,
    Stable,
    Moderate,
    Volatile,
    Unknown,
}

impl StabilityClass {
    /// Get the display label for this class
    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryStable => "VERY STABLE",
            Self::Stable => "STABLE",
            Self::Moderate => "MODERATE",
            Self::Volatile => "VOLATILE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One cut point of the classifier
///
/// A summary falls into the band when its stddev is below `stddev_below` and,
/// if `range_below` is set, its range is below that too. The range check
/// demotes series whose stddev looks calm but that contain a wide excursion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityBand {
    pub stddev_below: f64,
    #[serde(default)]
    pub range_below: Option<f64>,
    pub class: StabilityClass,
}

impl StabilityBand {
    pub const fn new(stddev_below: f64, class: StabilityClass) -> Self {
        Self {
            stddev_below,
            range_below: None,
            class,
        }
    }

    pub const fn with_range_below(mut self, range_below: f64) -> Self {
        self.range_below = Some(range_below);
        self
    }

    pub(crate) fn is_valid(&self) -> bool {
        let range_ok = self
            .range_below
            .is_none_or(|range| range.is_finite() && range > 0.0);

        self.stddev_below.is_finite()
            && self.stddev_below > 0.0
            && range_ok
            && self.class != StabilityClass::Unknown
    }

    fn matches(&self, stddev: f64, range: f64) -> bool {
        stddev < self.stddev_below && self.range_below.is_none_or(|limit| range < limit)
    }
}

/// Classify a statistics summary against ordered bands
///
/// Empty statistics are `Unknown`; anything past the last band is `Volatile`.
pub fn classify(statistics: &Statistics, bands: &[StabilityBand]) -> StabilityClass {
    let Some(summary) = statistics.summary() else {
        return StabilityClass::Unknown;
    };

    bands
        .iter()
        .find(|band| band.matches(summary.stddev, summary.range))
        .map_or(StabilityClass::Volatile, |band| band.class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Summary;
    use alloc::collections::BTreeMap;

    fn bands() -> [StabilityBand; 3] {
        [
            StabilityBand::new(0.5, StabilityClass::VeryStable),
            StabilityBand::new(1.0, StabilityClass::Stable),
            StabilityBand::new(2.0, StabilityClass::Moderate),
        ]
    }

    fn summary(stddev: f64, range: f64) -> Statistics {
        Statistics::Computed(Summary {
            count: 10,
            current: 22.0,
            mean: 22.0,
            min: 22.0 - range / 2.0,
            max: 22.0 + range / 2.0,
            range,
            stddev,
            percentiles: BTreeMap::new(),
        })
    }

    #[test]
    fn test_classify_by_stddev() {
        assert_eq!(
            classify(&summary(0.0, 0.0), &bands()),
            StabilityClass::VeryStable
        );
        assert_eq!(
            classify(&summary(0.49, 1.0), &bands()),
            StabilityClass::VeryStable
        );
        assert_eq!(
            classify(&summary(0.5, 1.0), &bands()),
            StabilityClass::Stable
        );
        assert_eq!(
            classify(&summary(1.5, 4.0), &bands()),
            StabilityClass::Moderate
        );
        assert_eq!(
            classify(&summary(2.0, 6.0), &bands()),
            StabilityClass::Volatile
        );
    }

    #[test]
    fn test_range_demotes_band() {
        let bands = [
            StabilityBand::new(0.5, StabilityClass::VeryStable).with_range_below(2.0),
            StabilityBand::new(1.0, StabilityClass::Stable),
        ];

        assert_eq!(
            classify(&summary(0.3, 1.0), &bands),
            StabilityClass::VeryStable
        );
        assert_eq!(classify(&summary(0.3, 5.0), &bands), StabilityClass::Stable);
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(
            classify(&Statistics::Empty, &bands()),
            StabilityClass::Unknown
        );
    }

    #[test]
    fn test_classes_are_ordered() {
        assert!(StabilityClass::VeryStable < StabilityClass::Stable);
        assert!(StabilityClass::Stable < StabilityClass::Moderate);
        assert!(StabilityClass::Moderate < StabilityClass::Volatile);
        assert_eq!(
            bands().iter().map(|band| band.class).max(),
            Some(StabilityClass::Moderate)
        );
    }

    #[test]
    fn test_no_bands_means_volatile() {
        assert_eq!(classify(&summary(0.1, 0.2), &[]), StabilityClass::Volatile);
    }
}
