//! Error types for report generation

use std::io;

use thermo_core::AnalysisError;
use thiserror_no_std::Error;

/// Problems with the report configuration file
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config {path}: {error}")]
    Io { path: String, error: io::Error },

    #[error("Failed to parse config {path}: {error}")]
    Parse {
        path: String,
        error: serde_json::Error,
    },

    #[error("Invalid analysis settings: {0}")]
    Analysis(#[from] thermo_core::ConfigError),

    #[error("No sensors configured")]
    NoSensors,

    #[error("Sensor id {id} is configured more than once")]
    DuplicateSensor { id: String },

    #[error("Sensor {id} has no CSV export and no PRTG server is configured")]
    NoSource { id: String },

    #[error("PRTG server URL '{url}' must start with http:// or https://")]
    InvalidServerUrl { url: String },

    #[error("PRTG averaging interval and timeout must be positive")]
    InvalidServerTiming,
}

/// Problems turning a sensor export into raw records
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to read export {path}: {error}")]
    Io { path: String, error: io::Error },

    #[error("Export has no header row")]
    MissingHeader,

    #[error("Export has no 'Date Time' column")]
    MissingDateTimeColumn,

    #[error("No temperature column found")]
    MissingTemperatureColumn,

    #[error("No CSV export or PRTG server for this sensor")]
    NoSource,

    #[error("Invalid PRTG request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to set up HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Connection error: {0}")]
    Connection(reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Top-level error of a report run
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigFileError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Render error: {0}")]
    Render(#[from] io::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;
