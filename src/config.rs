//! Report configuration file
//!
//! ```json
//! {
//!   "title": "Temperature Sensor Report",
//!   "days_to_analyze": 2,
//!   "prtg": { "url": "https://prtg.example.net", "username": "reports", "password": "..." },
//!   "sensors": [
//!     { "id": "2041", "name": "Rack A" },
//!     { "id": "2042", "name": "Rack B", "csv": "exports/2042.csv" }
//!   ],
//!   "analysis": { "trend": { "window_hours": 12 } }
//! }
//! ```
//!
//! A sensor with a `csv` path is read from that export; every other sensor is
//! fetched from the `prtg` server.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thermo_core::{AnalysisConfig, SensorIdentity};

use crate::error::ConfigFileError;

pub const DEFAULT_TITLE: &str = "Temperature Sensor Report";

/// Averaging interval requested from the historic-data API, in seconds
pub const DEFAULT_AVERAGE_SECS: u32 = 300;

/// Request timeout for the historic-data API, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// PRTG server the sensor histories are fetched from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrtgServer {
    /// Base URL, e.g. `https://prtg.example.net`
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_average_secs")]
    pub average_secs: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Accept self-signed server certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_average_secs() -> u32 {
    DEFAULT_AVERAGE_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl PrtgServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            average_secs: DEFAULT_AVERAGE_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: false,
        }
    }

    fn validate(&self) -> Result<(), ConfigFileError> {
        let url = self.url.trim();
        let has_host = ["http://", "https://"]
            .iter()
            .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme));
        if !has_host {
            return Err(ConfigFileError::InvalidServerUrl {
                url: self.url.clone(),
            });
        }
        if self.average_secs == 0 || self.timeout_secs == 0 {
            return Err(ConfigFileError::InvalidServerTiming);
        }
        Ok(())
    }
}

/// One sensor and where its history comes from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SensorSource {
    pub id: String,
    pub name: String,
    /// Historic-data CSV export, relative paths resolve against the config
    /// file. Without one the history is fetched from the PRTG server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
}

impl SensorSource {
    pub fn identity(&self) -> SensorIdentity {
        SensorIdentity::new(self.id.clone(), self.name.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Only the trailing `days_to_analyze` days of each export are analyzed,
    /// measured back from its latest reading. Zero keeps everything.
    pub days_to_analyze: u32,
    pub prtg: Option<PrtgServer>,
    pub sensors: Vec<SensorSource>,
    pub analysis: AnalysisConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            days_to_analyze: 2,
            prtg: None,
            sensors: Vec::new(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Read, parse and validate a config file
    ///
    /// Relative export paths are rebased onto the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|error| ConfigFileError::Io {
            path: display.clone(),
            error,
        })?;

        let mut config = Self::from_json(&text).map_err(|error| ConfigFileError::Parse {
            path: display,
            error,
        })?;

        if let Some(base) = path.parent() {
            for csv in config.sensors.iter_mut().filter_map(|s| s.csv.as_mut()) {
                if csv.is_relative() {
                    *csv = base.join(&*csv);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.sensors.is_empty() {
            return Err(ConfigFileError::NoSensors);
        }

        if let Some(server) = &self.prtg {
            server.validate()?;
        }

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(sensor.id.as_str()) {
                return Err(ConfigFileError::DuplicateSensor {
                    id: sensor.id.clone(),
                });
            }
            if sensor.csv.is_none() && self.prtg.is_none() {
                return Err(ConfigFileError::NoSource {
                    id: sensor.id.clone(),
                });
            }
        }

        self.analysis.validate()?;
        Ok(())
    }
}
