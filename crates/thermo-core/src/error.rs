//! Error types for the analysis engine
//!
//! Only two things can stop an analysis: raw input that is not a collection of
//! `(timestamp, value)` pairs, and a configuration that breaks its own
//! invariants. Bad individual readings are not errors; they are counted in
//! [`crate::Diagnostics`].

use thiserror_no_std::Error;

/// Raw input that cannot be interpreted as readings at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// A record is not a `(timestamp, value)` pair
    #[error("Record {index} has {fields} field(s), expected a (timestamp, value) pair")]
    MalformedRecord {
        /// Position of the record in the raw input
        index: usize,
        /// Number of fields the record actually carried
        fields: usize,
    },
}

/// Configuration that violates its own invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Plausible range is empty or not finite (min: {min}, max: {max})")]
    InvalidPlausibleRange { min: f64, max: f64 },

    #[error("Percentile rank {rank} is outside 0..=100")]
    InvalidPercentileRank { rank: u8 },

    #[error("Stability band {index} has an invalid bound")]
    InvalidStabilityBand { index: usize },

    #[error("Stability bands must have increasing stddev bounds and classes (band {index})")]
    UnorderedStabilityBands { index: usize },

    #[error("Trend window must be at least one hour")]
    InvalidTrendWindow,

    #[error("Trend noise band must be finite and non-negative")]
    InvalidNoiseBand,

    #[error("Threshold multipliers must satisfy 0 < k_warn < k_err (got {k_warn}, {k_err})")]
    InvalidMultipliers { k_warn: f64, k_err: f64 },

    #[error("Threshold ranks must satisfy 50 < warn < err <= 100 (got {warn}, {err})")]
    InvalidThresholdRanks { warn: u8, err: u8 },

    #[error("Threshold offsets must satisfy 0 < warn < err (got {warn}, {err})")]
    InvalidOffsets { warn: f64, err: f64 },

    #[error("Degenerate epsilon must be finite and positive")]
    InvalidEpsilon,

    #[error("UTC offset {secs}s is outside one day")]
    InvalidUtcOffset { secs: i32 },
}

/// Reasons a single sensor's analysis could not run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
