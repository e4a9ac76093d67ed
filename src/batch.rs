//! Multi-sensor analysis runs
//!
//! Each sensor is loaded and analyzed on its own scoped thread. Only the
//! analysis config is shared, read-only. A failing sensor never stops the
//! others; it is reported as [`SensorOutcome::Failed`].

use std::thread;

use chrono::{NaiveDateTime, TimeDelta};
use log::{error, info, warn};
use serde::Serialize;
use thermo_core::{
    AnalysisConfig, AnalysisResult, Normalizer, RawRecord, SensorIdentity, analyze,
};

use crate::config::{ReportConfig, SensorSource};
use crate::error::{ReportError, ReportResult, RetrievalError};
use crate::prtg::PrtgClient;
use crate::{report, retrieval};

/// Something that can produce the raw records of one sensor
pub trait RecordSource: Sync {
    fn identity(&self) -> SensorIdentity;

    fn load(&self) -> ReportResult<Vec<RawRecord>>;
}

/// A configured sensor bound to where its history is read from
///
/// Sensors with a CSV export read that file. The others fetch
/// `days_to_analyze` days up to `end` from the PRTG server.
#[derive(Debug, Clone, Copy)]
pub struct SensorFeed<'a> {
    pub source: &'a SensorSource,
    pub client: Option<&'a PrtgClient>,
    pub days: u32,
    pub end: NaiveDateTime,
}

impl RecordSource for SensorFeed<'_> {
    fn identity(&self) -> SensorIdentity {
        self.source.identity()
    }

    fn load(&self) -> ReportResult<Vec<RawRecord>> {
        let export = match (&self.source.csv, self.client) {
            (Some(csv), _) => retrieval::read_export(csv)?,
            (None, Some(client)) => {
                let body = client.fetch_history(&self.source.id, self.days, self.end)?;
                retrieval::parse_export(&body)?
            }
            (None, None) => return Err(RetrievalError::NoSource.into()),
        };

        Ok(export.records)
    }
}

/// Bind every sensor of a config to its feed
pub fn sensor_feeds<'a>(
    config: &'a ReportConfig,
    client: Option<&'a PrtgClient>,
    end: NaiveDateTime,
) -> Vec<SensorFeed<'a>> {
    config
        .sensors
        .iter()
        .map(|source| SensorFeed {
            source,
            client,
            days: config.days_to_analyze,
            end,
        })
        .collect()
}

/// Result of one sensor within a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SensorOutcome {
    Analyzed(AnalysisResult),
    Failed {
        identity: SensorIdentity,
        reason: String,
    },
}

impl SensorOutcome {
    pub fn identity(&self) -> &SensorIdentity {
        match self {
            Self::Analyzed(result) => result.identity(),
            Self::Failed { identity, .. } => identity,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Analyzed(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Analyze every source, returning outcomes in input order
pub fn run_batch<S: RecordSource>(
    sources: &[S],
    analysis: &AnalysisConfig,
    days_to_analyze: u32,
) -> Vec<SensorOutcome> {
    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let handle =
                    scope.spawn(move || analyze_source(source, analysis, days_to_analyze));
                (source, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(source, handle)| {
                let identity = source.identity();
                let outcome = match handle.join() {
                    Ok(Ok(result)) => SensorOutcome::Analyzed(result),
                    Ok(Err(err)) => SensorOutcome::Failed {
                        identity,
                        reason: err.to_string(),
                    },
                    Err(_) => SensorOutcome::Failed {
                        identity,
                        reason: "analysis thread panicked".to_string(),
                    },
                };

                if let SensorOutcome::Failed { identity, reason } = &outcome {
                    error!("[{}] {}", identity, reason);
                }
                outcome
            })
            .collect()
    })
}

/// Load, trim and analyze a single source
pub fn analyze_source<S: RecordSource + ?Sized>(
    source: &S,
    analysis: &AnalysisConfig,
    days_to_analyze: u32,
) -> Result<AnalysisResult, ReportError> {
    let identity = source.identity();
    info!("[{}] Loading readings", identity);

    let records = source.load()?;
    let records = recent_records(records, analysis, days_to_analyze);
    let result = analyze(identity, &records, analysis)?;

    let diagnostics = result.diagnostics();
    if diagnostics.has_issues() {
        warn!(
            "[{}] Dropped {} invalid and {} superseded reading(s)",
            result.identity(),
            diagnostics.invalid(),
            diagnostics.superseded
        );
    }
    info!(
        "[{}] {} valid readings  |  {}",
        result.identity(),
        diagnostics.retained,
        report::quick_line(&result)
    );

    Ok(result)
}

/// Keep records within `days` of the latest parseable timestamp
///
/// Records whose timestamp does not parse are kept so the engine can count
/// them. Zero days keeps everything.
pub fn recent_records(
    records: Vec<RawRecord>,
    analysis: &AnalysisConfig,
    days: u32,
) -> Vec<RawRecord> {
    let normalizer = Normalizer::from_config(analysis);
    let timestamp = |record: &RawRecord| {
        let (timestamp, _) = record.as_pair()?;
        normalizer.parse_timestamp(timestamp).ok()
    };

    let cutoff = TimeDelta::try_days(i64::from(days))
        .filter(|_| days > 0)
        .and_then(|window| {
            let latest = records.iter().filter_map(timestamp).max()?;
            latest.checked_sub_signed(window)
        });

    let Some(cutoff) = cutoff else {
        return records;
    };

    records
        .into_iter()
        .filter(|record| timestamp(record).is_none_or(|ts| ts >= cutoff))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, hour: u32, value: f64) -> RawRecord {
        RawRecord::pair(format!("{day:02}.03.2025 {hour:02}:00:00"), value)
    }

    #[test]
    fn test_recent_records_window() {
        let records = vec![
            record(1, 0, 20.0),
            record(2, 12, 21.0),
            RawRecord::pair("not a time", 22.0),
            record(3, 0, 22.0),
            record(4, 0, 23.0),
        ];

        let kept = recent_records(records.clone(), &AnalysisConfig::default(), 2);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0], records[1]);

        let all = recent_records(records.clone(), &AnalysisConfig::default(), 0);
        assert_eq!(all, records);
    }

    #[test]
    fn test_feed_without_source_fails() {
        let config = ReportConfig {
            sensors: vec![SensorSource {
                id: "5".into(),
                name: "Loose".into(),
                csv: None,
            }],
            ..ReportConfig::default()
        };
        let end = chrono::NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let feeds = sensor_feeds(&config, None, end);
        let err = feeds[0].load().unwrap_err();
        assert!(matches!(err, ReportError::Retrieval(RetrievalError::NoSource)));
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = SensorOutcome::Failed {
            identity: SensorIdentity::new("9", "Spare"),
            reason: "no data".into(),
        };
        assert!(failed.is_failed());
        assert!(failed.result().is_none());
        assert_eq!(failed.identity().id, "9");
    }
}
