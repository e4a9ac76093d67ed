//! `thermo-rs` command line
//!
//! ```text
//! thermo-rs report --config sensors.json [--format text|json] [--output FILE]
//! thermo-rs demo [--sensors N] [--days D]
//! ```
//!
//! Exit status is 0 when every sensor was analyzed, 1 when any sensor failed
//! (or none succeeded) and 2 for configuration, setup or usage errors.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDateTime, Timelike};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use thermo_core::AnalysisConfig;
use thermo_rs::demo::{self, demo_sensors};
use thermo_rs::{
    Format, PrtgClient, RenderOptions, Report, ReportConfig, ReportError, SensorOutcome,
    run_batch, sensor_feeds,
};

const EXIT_SENSOR_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(
    name = "thermo-rs",
    version,
    about = "Temperature sensor history analysis and reporting"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the sensors listed in a config file
    Report {
        /// Path to the report configuration (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        #[command(flatten)]
        render: OutputArgs,
    },
    /// Analyze generated sensor histories
    Demo {
        /// Number of demo sensors
        #[arg(long, default_value_t = 3)]
        #[arg(value_parser = clap::value_parser!(u16).range(1..=i64::from(demo::MAX_SENSORS)))]
        sensors: u16,

        /// Days of history per sensor
        #[arg(long, default_value_t = 2)]
        #[arg(value_parser = clap::value_parser!(u32).range(1..=i64::from(demo::MAX_DAYS)))]
        days: u32,

        #[command(flatten)]
        render: OutputArgs,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// List all 24 hours in hourly tables, marking hours without samples
    #[arg(long)]
    zero_fill_hours: bool,

    /// Append every normalized sample to the sensor details
    #[arg(long)]
    samples: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Format::Text,
            OutputFormat::Json => Format::Json,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let now = Local::now().naive_local();

    let (title, outcomes, render) = match cli.command {
        Command::Report { config, render } => match run_report(&config, now) {
            Ok((title, outcomes)) => (title, outcomes, render),
            Err(err) => {
                error!("{}", err);
                return ExitCode::from(EXIT_CONFIG);
            }
        },
        Command::Demo {
            sensors,
            days,
            render,
        } => {
            let sources = demo_sensors(usize::from(sensors), days, round_to_interval(now));
            info!("Analyzing {} demo sensor(s)", sources.len());
            // Generated histories are already exactly `days` long
            let outcomes = run_batch(&sources, &AnalysisConfig::default(), 0);
            ("Demo Temperature Report".to_string(), outcomes, render)
        }
    };

    let report = Report::new(&title, now, &outcomes);
    if let Err(err) = write_report(&report, &render) {
        error!("{}", err);
        return ExitCode::from(EXIT_CONFIG);
    }

    exit_status(&outcomes)
}

/// Load the config and analyze every sensor in it
///
/// Errors here are setup failures; a sensor that cannot be loaded becomes a
/// failed outcome instead.
fn run_report(
    path: &Path,
    now: NaiveDateTime,
) -> Result<(String, Vec<SensorOutcome>), ReportError> {
    let config = ReportConfig::load(path)?;
    let client = config.prtg.as_ref().map(PrtgClient::new).transpose()?;

    info!("Analyzing {} sensor(s)", config.sensors.len());
    let outcomes = run_batch(
        &sensor_feeds(&config, client.as_ref(), now),
        &config.analysis,
        config.days_to_analyze,
    );

    Ok((config.title, outcomes))
}

fn write_report(report: &Report<'_>, args: &OutputArgs) -> Result<(), ReportError> {
    let options = RenderOptions {
        zero_fill_hours: args.zero_fill_hours,
        include_samples: args.samples,
    };

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            report.write(&mut file, args.format.into(), options)?;
            info!("Report saved: {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            report.write(&mut lock, args.format.into(), options)?;
            lock.flush()?;
        }
    }

    Ok(())
}

fn exit_status(outcomes: &[SensorOutcome]) -> ExitCode {
    let failed = outcomes
        .iter()
        .filter(|outcome| outcome.is_failed())
        .count();
    if outcomes.is_empty() || failed == outcomes.len() {
        error!("No sensor data analyzed");
        return ExitCode::from(EXIT_SENSOR_FAILURE);
    }
    if failed > 0 {
        error!("{} of {} sensor(s) failed", failed, outcomes.len());
        return ExitCode::from(EXIT_SENSOR_FAILURE);
    }
    ExitCode::SUCCESS
}

/// Truncate to the 5-minute grid PRTG averages are reported on
fn round_to_interval(now: NaiveDateTime) -> NaiveDateTime {
    let minute = now.minute() - now.minute() % 5;
    now.with_minute(minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}
