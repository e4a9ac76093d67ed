//! Temperature sensor history reports
//!
//! Glue around the `thermo-core` engine: reads PRTG exports from disk or the
//! historic-data API, runs the engine for every configured sensor in parallel
//! and renders the results.

pub mod batch;
pub mod config;
pub mod demo;
pub mod error;
pub mod prtg;
pub mod report;
pub mod retrieval;

pub use batch::{RecordSource, SensorFeed, SensorOutcome, run_batch, sensor_feeds};
pub use config::{PrtgServer, ReportConfig, SensorSource};
pub use error::{ConfigFileError, ReportError, ReportResult, RetrievalError};
pub use prtg::PrtgClient;
pub use report::{Format, RenderOptions, Report};
