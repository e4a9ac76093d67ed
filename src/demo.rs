//! Synthetic sensor histories
//!
//! Produces PRTG-shaped raw records so the whole pipeline can run without
//! real exports. Output is a pure function of its inputs.

use std::f64::consts::TAU;

use chrono::{NaiveDateTime, TimeDelta};
use thermo_core::{RawField, RawRecord, SensorIdentity};

use crate::batch::RecordSource;
use crate::error::ReportResult;

/// Spacing of generated readings, matching PRTG's 5-minute averages
pub const SAMPLE_INTERVAL_MINUTES: i64 = 5;

/// Longest history a demo sensor generates
pub const MAX_DAYS: u32 = 3650;

/// Demo sensors get distinct rack letters up to this count
pub const MAX_SENSORS: u16 = 26;

/// Every Nth reading arrives without a value
const GAP_EVERY: usize = 211;
/// Every Nth reading is re-sent with a corrected value
const RESEND_EVERY: usize = 389;
/// Index of the single implausible spike
const SPIKE_AT: usize = 150;

/// Generates a daily temperature cycle with a slow drift for one sensor
#[derive(Debug, Clone, Copy)]
pub struct MockSensorGenerator {
    /// Mean temperature in °C
    base: f64,
    /// Half-height of the daily cycle in °C
    amplitude: f64,
    /// Shift of the daily peak, as a fraction of a day
    phase: f64,
}

impl MockSensorGenerator {
    /// Generator for the `index`-th demo sensor; each one is a little warmer
    /// and more variable than the last
    pub fn for_sensor(index: usize) -> Self {
        let i = index as f64;
        Self {
            base: 21.0 + 1.5 * i,
            amplitude: 0.4 + 0.8 * i,
            phase: 0.1 * i,
        }
    }

    /// Temperature at `hours` after the start of the history
    pub fn value_at(&self, hours: f64) -> f64 {
        let daily = (TAU * (hours / 24.0 + self.phase)).sin();
        let wobble = (hours / 3.7).cos();
        self.base + self.amplitude * daily + 0.15 * wobble
    }

    /// Generate `days` of history ending at `end`, as raw export records
    ///
    /// The history contains a few missing values, re-sent readings with
    /// duplicate timestamps and one implausible spike. `days` is capped at
    /// [`MAX_DAYS`].
    pub fn generate(&self, days: u32, end: NaiveDateTime) -> Vec<RawRecord> {
        let count = sample_count(days);
        let interval = TimeDelta::minutes(SAMPLE_INTERVAL_MINUTES);
        let start = end - TimeDelta::minutes(count * SAMPLE_INTERVAL_MINUTES);

        let capacity = count as usize;
        let mut records = Vec::with_capacity(capacity + capacity / RESEND_EVERY);
        for (i, step) in (0..count).enumerate() {
            let elapsed = TimeDelta::minutes(step * SAMPLE_INTERVAL_MINUTES);
            let timestamp = start + elapsed;
            let hours = elapsed.num_minutes() as f64 / 60.0;
            let label = interval_label(timestamp, interval);

            let value = if i == SPIKE_AT {
                RawField::from("999.00 °C")
            } else if i > 0 && i % GAP_EVERY == 0 {
                RawField::Null
            } else {
                RawField::from(format!("{:.2} °C", self.value_at(hours)))
            };
            records.push(RawRecord::pair(label.as_str(), value));

            if i > 0 && i % RESEND_EVERY == 0 {
                let corrected = self.value_at(hours) + 0.05;
                records.push(RawRecord::pair(label, format!("{corrected:.2} °C")));
            }
        }

        records
    }
}

/// Readings in `days` of history, with `days` capped at [`MAX_DAYS`]
fn sample_count(days: u32) -> i64 {
    i64::from(days.min(MAX_DAYS)) * 24 * 60 / SAMPLE_INTERVAL_MINUTES
}

fn interval_label(start: NaiveDateTime, interval: TimeDelta) -> String {
    const FORMAT: &str = "%d.%m.%Y %H:%M:%S";
    let end = start + interval;
    format!("{} - {}", start.format(FORMAT), end.format(FORMAT))
}

/// A named sensor backed by generated history
#[derive(Debug, Clone)]
pub struct DemoSensor {
    identity: SensorIdentity,
    generator: MockSensorGenerator,
    days: u32,
    end: NaiveDateTime,
}

impl DemoSensor {
    pub fn new(index: usize, days: u32, end: NaiveDateTime) -> Self {
        Self {
            identity: SensorIdentity::new(
                format!("{}", 2041 + index),
                format!("Demo Rack {}", (b'A' + (index % 26) as u8) as char),
            ),
            generator: MockSensorGenerator::for_sensor(index),
            days,
            end,
        }
    }
}

impl RecordSource for DemoSensor {
    fn identity(&self) -> SensorIdentity {
        self.identity.clone()
    }

    fn load(&self) -> ReportResult<Vec<RawRecord>> {
        Ok(self.generator.generate(self.days, self.end))
    }
}

/// `count` demo sensors with `days` of history ending at `end`
pub fn demo_sensors(count: usize, days: u32, end: NaiveDateTime) -> Vec<DemoSensor> {
    (0..count)
        .map(|index| DemoSensor::new(index, days, end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn end() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = MockSensorGenerator::for_sensor(1);
        assert_eq!(generator.generate(2, end()), generator.generate(2, end()));
    }

    #[test]
    fn test_record_count_includes_resends() {
        let records = MockSensorGenerator::for_sensor(0).generate(2, end());
        // 576 readings plus one re-send at index 389
        assert_eq!(records.len(), 577);
    }

    #[test]
    fn test_days_are_capped() {
        assert_eq!(sample_count(2), 576);
        assert_eq!(sample_count(u32::MAX), sample_count(MAX_DAYS));
    }

    #[test]
    fn test_interval_label() {
        let label = interval_label(end(), TimeDelta::minutes(5));
        assert_eq!(label, "14.03.2025 12:00:00 - 14.03.2025 12:05:00");
    }

    #[test]
    fn test_demo_identities() {
        let sensors = demo_sensors(3, 1, end());
        assert_eq!(sensors[2].identity().to_string(), "Demo Rack C (2043)");
    }
}
