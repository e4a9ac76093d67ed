//! Report rendering
//!
//! Reads finished [`SensorOutcome`]s only; nothing here reaches back into raw
//! readings or recomputes statistics.

use core::fmt::Write as _;
use std::io;

use chrono::NaiveDateTime;
use serde::Serialize;
use thermo_core::{AlertLevel, AnalysisResult, Summary, TrendSignal};

use crate::batch::SensorOutcome;
use crate::error::ReportResult;

const RULE_WIDTH: usize = 70;
const HOURS_PER_DAY: u8 = 24;

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Json,
}

/// Presentation switches for the text report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    /// Show all 24 hours in hourly tables, marking hours without samples
    pub zero_fill_hours: bool,
    /// Append every normalized sample to each detail view
    pub include_samples: bool,
}

/// Everything a rendered report is made of
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub title: &'a str,
    pub generated_at: NaiveDateTime,
    pub outcomes: &'a [SensorOutcome],
}

#[derive(Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    generated_at: NaiveDateTime,
    analyzed: usize,
    failed: usize,
    sensors: &'a [SensorOutcome],
}

impl<'a> Report<'a> {
    pub fn new(title: &'a str, generated_at: NaiveDateTime, outcomes: &'a [SensorOutcome]) -> Self {
        Self {
            title,
            generated_at,
            outcomes,
        }
    }

    fn analyzed(&self) -> impl Iterator<Item = &'a AnalysisResult> {
        self.outcomes.iter().filter_map(SensorOutcome::result)
    }

    fn failed(&self) -> impl Iterator<Item = &'a SensorOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failed())
    }

    /// Write the report in the requested format
    pub fn write(
        &self,
        out: &mut dyn io::Write,
        format: Format,
        options: RenderOptions,
    ) -> ReportResult<()> {
        let rendered = match format {
            Format::Text => self.render_text(options),
            Format::Json => self.render_json().map_err(io::Error::from)?,
        };

        out.write_all(rendered.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        let report = JsonReport {
            title: self.title,
            generated_at: self.generated_at,
            analyzed: self.analyzed().count(),
            failed: self.failed().count(),
            sensors: self.outcomes,
        };

        let mut json = serde_json::to_string_pretty(&report)?;
        json.push('\n');
        Ok(json)
    }

    pub fn render_text(&self, options: RenderOptions) -> String {
        let mut out = String::new();
        let rule = "=".repeat(RULE_WIDTH);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", self.generated_at.format("%B %d, %Y  %H:%M"));
        let _ = writeln!(out, "{rule}");

        self.write_summary(&mut out);
        self.write_failures(&mut out);

        for result in self.analyzed() {
            write_detail(&mut out, result, options);
        }

        let _ = writeln!(out, "{rule}");
        out
    }

    fn write_summary(&self, out: &mut String) {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<28} {:>8} {:>6} {:>6} {:>6} {:>6} {:>7}  {:<12} {:<6} {:>9} {:>10} {:>10} {:>9}",
            "Sensor",
            "Current",
            "Avg",
            "Min",
            "Max",
            "Range",
            "Std Dev",
            "Stability",
            "Trend",
            "Upper Err",
            "Upper Warn",
            "Lower Warn",
            "Lower Err"
        );

        for result in self.analyzed() {
            let name = result.identity().to_string();
            let Some(summary) = result.summary() else {
                let _ = writeln!(
                    out,
                    "{:<28} {:>8}  no valid readings ({})",
                    name,
                    "-",
                    result.stability()
                );
                continue;
            };

            let level = result
                .thresholds()
                .map_or(AlertLevel::Normal, |t| t.classify(summary.current));
            let current = format!("{:.1}{}", summary.current, alert_marker(level));

            let _ = write!(
                out,
                "{:<28} {:>8} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>7.2}  {:<12} {:<6}",
                name,
                current,
                summary.mean,
                summary.min,
                summary.max,
                summary.range,
                summary.stddev,
                result.stability().label(),
                trend_cell(result.trend()),
            );

            match result.thresholds() {
                Some(suggestion) => {
                    let set = suggestion.set;
                    let _ = writeln!(
                        out,
                        " {:>9.1} {:>10.1} {:>10.1} {:>9.1}",
                        set.upper_error, set.upper_warning, set.lower_warning, set.lower_error
                    );
                }
                None => {
                    let _ = writeln!(out, " {:>9} {:>10} {:>10} {:>9}", "-", "-", "-", "-");
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} sensor(s) analyzed, {} failed  |  * warning, ! error",
            self.analyzed().count(),
            self.failed().count()
        );
    }

    fn write_failures(&self, out: &mut String) {
        let mut failed = self.failed().peekable();
        if failed.peek().is_none() {
            return;
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "FAILED SENSORS");
        for outcome in failed {
            if let SensorOutcome::Failed { identity, reason } = outcome {
                let _ = writeln!(out, "  {identity}: {reason}");
            }
        }
    }
}

/// One console line per sensor, as printed while a batch runs
pub fn quick_line(result: &AnalysisResult) -> String {
    match result.summary() {
        Some(summary) => format!(
            "Current: {:.1}°C  |  Avg: {:.1}°C  |  Range: {:.1}-{:.1}°C  |  {}",
            summary.current,
            summary.mean,
            summary.min,
            summary.max,
            result.stability()
        ),
        None => format!("No valid readings  |  {}", result.stability()),
    }
}

fn alert_marker(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Normal => "",
        AlertLevel::Warning => "*",
        AlertLevel::Error => "!",
    }
}

fn trend_cell(trend: &TrendSignal) -> String {
    if trend.insufficient_data {
        return "n/a".to_string();
    }
    format!("{} {:+.1}", trend.direction.arrow(), trend.magnitude)
}

/// English ordinal suffix for a percentile rank
fn ordinal(rank: u8) -> String {
    let suffix = match (rank % 10, rank % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{rank}{suffix}")
}

fn write_detail(out: &mut String, result: &AnalysisResult, options: RenderOptions) {
    let identity = result.identity();
    let diagnostics = result.diagnostics();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "{} (Sensor {})", identity.name, identity.id);
    let days = result.coverage().map_or(0, |coverage| coverage.days());
    let _ = writeln!(out, "{days} days  |  {} readings", diagnostics.retained);

    match result.summary() {
        Some(summary) => write_statistics(out, result, summary),
        None => {
            let stability = result.stability();
            let _ = writeln!(out);
            let _ = writeln!(out, "  No valid readings. Stability: {}", stability);
        }
    }

    write_trend(out, result.trend());
    write_hourly(out, result, options.zero_fill_hours);
    write_daily(out, result);
    write_diagnostics(out, result);

    if options.include_samples {
        write_samples(out, result);
    }
}

fn write_statistics(out: &mut String, result: &AnalysisResult, summary: &Summary) {
    let _ = writeln!(out);
    let level = result
        .thresholds()
        .map_or(AlertLevel::Normal, |t| t.classify(summary.current));

    let rows = [
        ("Current Temperature", summary.current),
        ("Average", summary.mean),
        ("Minimum", summary.min),
        ("Maximum", summary.max),
        ("Range", summary.range),
        ("Standard Deviation", summary.stddev),
    ];
    for (label, value) in rows {
        let _ = write!(out, "  {label:<26} {value:>8.2}°C");
        if label == "Current Temperature" && level != AlertLevel::Normal {
            let _ = write!(out, "  [{level}]");
        }
        let _ = writeln!(out);
    }
    let stability = result.stability().label();
    let _ = writeln!(out, "  {:<26} {:>10}", "Stability", stability);

    let _ = writeln!(out);
    let _ = writeln!(out, "PERCENTILES");
    for (&rank, value) in &summary.percentiles {
        let mut label = format!("{} percentile", ordinal(rank));
        if rank == 50 {
            label.push_str(" (median)");
        }
        let _ = writeln!(out, "  {label:<26} {value:>8.2}°C");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "THRESHOLDS");
    if let Some(suggestion) = result.thresholds() {
        let set = suggestion.set;
        let rows = [
            ("Upper Error", set.upper_error),
            ("Upper Warning", set.upper_warning),
            ("Lower Warning", set.lower_warning),
            ("Lower Error", set.lower_error),
        ];
        for (label, value) in rows {
            let _ = writeln!(out, "  {label:<26} {value:>8.1}°C");
        }
        let _ = writeln!(out, "  {:<26} {}", "Note", suggestion.note());
    }
}

fn write_trend(out: &mut String, trend: &TrendSignal) {
    let _ = writeln!(out);
    let _ = writeln!(out, "TREND (last {}h)", trend.window_hours);
    if trend.insufficient_data {
        let _ = writeln!(out, "  Not enough history for a trend");
        return;
    }
    let _ = writeln!(
        out,
        "  {} {} {:+.2}°C (noise band {:.2}°C)",
        trend.direction.arrow(),
        trend.direction,
        trend.magnitude,
        trend.noise_band
    );
}

fn write_hourly(out: &mut String, result: &AnalysisResult, zero_fill: bool) {
    let _ = writeln!(out);
    let _ = writeln!(out, "HOURLY AVERAGES");
    let _ = writeln!(
        out,
        "  {:<6} {:>7} {:>7} {:>7} {:>7}",
        "Hour", "Avg", "Min", "Max", "Count"
    );

    for hour in 0..HOURS_PER_DAY {
        match result.patterns().hour(hour) {
            Some(bucket) => {
                let stats = bucket.stats;
                let _ = writeln!(
                    out,
                    "  {:02}:00  {:>7.1} {:>7.1} {:>7.1} {:>7}",
                    hour, stats.mean, stats.min, stats.max, stats.count
                );
            }
            None if zero_fill => {
                let _ = writeln!(
                    out,
                    "  {:02}:00  {:>7} {:>7} {:>7} {:>7}",
                    hour, "-", "-", "-", 0
                );
            }
            None => {}
        }
    }
}

fn write_daily(out: &mut String, result: &AnalysisResult) {
    if result.daily().is_empty() {
        return;
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "DAILY");
    let _ = writeln!(
        out,
        "  {:<10} {:>7} {:>7} {:>7} {:>7}",
        "Date", "Avg", "Min", "Max", "Count"
    );
    for bucket in result.daily() {
        let stats = bucket.stats;
        let _ = writeln!(
            out,
            "  {} {:>7.1} {:>7.1} {:>7.1} {:>7}",
            bucket.date.format("%Y-%m-%d"),
            stats.mean,
            stats.min,
            stats.max,
            stats.count
        );
    }
}

fn write_diagnostics(out: &mut String, result: &AnalysisResult) {
    let diagnostics = result.diagnostics();

    let _ = writeln!(out);
    let _ = writeln!(out, "DATA QUALITY");
    let _ = writeln!(
        out,
        "  {} records, {} valid, {} invalid, {} superseded",
        diagnostics.total,
        diagnostics.valid(),
        diagnostics.invalid(),
        diagnostics.superseded
    );
    for (reason, count) in diagnostics.rejected.iter() {
        let _ = writeln!(out, "    {:<22} {count}", reason.label());
    }
}

fn write_samples(out: &mut String, result: &AnalysisResult) {
    let _ = writeln!(out);
    let _ = writeln!(out, "RAW DATA");
    let _ = writeln!(out, "  {:<19} {:>11}", "DateTime", "Temperature");
    for sample in result.series().samples() {
        let _ = writeln!(
            out,
            "  {} {:>9.2}°C",
            sample.timestamp.format("%Y-%m-%d %H:%M:%S"),
            sample.value
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(5), "5th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(50), "50th");
        assert_eq!(ordinal(99), "99th");
        assert_eq!(ordinal(100), "100th");
    }

    #[test]
    fn test_alert_marker() {
        assert_eq!(alert_marker(AlertLevel::Normal), "");
        assert_eq!(alert_marker(AlertLevel::Warning), "*");
        assert_eq!(alert_marker(AlertLevel::Error), "!");
    }
}
