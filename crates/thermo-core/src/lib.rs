//! Platform-independent analysis engine for thermo-rs
//!
//! This crate turns the raw readings of one temperature sensor into an
//! immutable [`AnalysisResult`]: descriptive statistics, hour-of-day and
//! per-day pattern tables, a trend signal, a stability class and preliminary
//! alert-threshold suggestions.
//!
//! It performs no I/O. Retrieval of readings and rendering of results belong
//! to the caller, and every policy knob arrives through [`AnalysisConfig`].
//!
//! It is `#![no_std]` with `extern crate alloc` so the same engine can run on
//! a desktop host or an embedded target.
//!
//! ```rust,ignore
//! let identity = SensorIdentity::new("2041", "Rack A");
//! let records = [RawRecord::pair("14.03.2025 10:00:00", "22.5 °C")];
//! let result = analyze(identity, &records, &AnalysisConfig::default())?;
//! ```

#![no_std]

extern crate alloc;

pub mod analysis;
pub mod config;
pub mod error;
pub mod normalize;
pub mod patterns;
pub mod sample;
pub mod stability;
pub mod stats;
pub mod thresholds;
pub mod trend;

pub use analysis::{AnalysisResult, SensorIdentity, analyze};
pub use config::{AnalysisConfig, PlausibleRange};
pub use error::{AnalysisError, ConfigError, StructuralError};
pub use normalize::{Diagnostics, Normalizer, RejectCounts};
pub use patterns::{BucketStats, DailyBucket, HourlyBucket, TemporalPatterns};
pub use sample::{Coverage, ParsedReading, RawField, RawRecord, RejectReason, Sample, Series};
pub use stability::{StabilityBand, StabilityClass};
pub use stats::{Statistics, Summary};
pub use thresholds::{
    AlertLevel, ThresholdBasis, ThresholdConfig, ThresholdPolicy, ThresholdSet, ThresholdSuggestion,
};
pub use trend::{NoiseBand, TrendConfig, TrendDirection, TrendMethod, TrendSignal};
