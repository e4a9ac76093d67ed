//! PRTG historic-data CSV exports
//!
//! An export has a `Date Time` column holding `dd.mm.yyyy HH:MM:SS` (often as
//! an averaging interval `<start> - <end>`), one or more channel columns, and
//! trailing summary rows such as `Averages` or `Sums`. Only the timestamp and
//! the temperature column are handed to the engine, uncoerced.

use std::fs;
use std::path::Path;

use log::{debug, info};
use thermo_core::{RawField, RawRecord};

use crate::error::RetrievalError;

const DATE_TIME_COLUMN: &str = "Date Time";

/// Raw records of one export plus what was skipped on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    /// Header of the column the values were taken from
    pub column: String,
    pub records: Vec<RawRecord>,
    /// Summary and blank rows that were not handed to the engine
    pub skipped_rows: usize,
}

/// Read and parse an export file
pub fn read_export(path: &Path) -> Result<Export, RetrievalError> {
    let text = fs::read_to_string(path).map_err(|error| RetrievalError::Io {
        path: path.display().to_string(),
        error,
    })?;

    parse_export(&text)
}

/// Parse export text into `(timestamp, value)` records
pub fn parse_export(text: &str) -> Result<Export, RetrievalError> {
    let mut lines = text
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}'))
        .filter(|line| !line.trim().is_empty());

    let header = split_row(lines.next().ok_or(RetrievalError::MissingHeader)?);

    let time_idx = header
        .iter()
        .position(|column| column.trim() == DATE_TIME_COLUMN)
        .ok_or(RetrievalError::MissingDateTimeColumn)?;
    let value_idx = temperature_column(&header).ok_or(RetrievalError::MissingTemperatureColumn)?;
    let column = header[value_idx].trim().to_string();
    info!("Using column '{}'", column);

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for line in lines {
        let cells = split_row(line);
        let timestamp = cells.get(time_idx).map(|cell| cell.trim()).unwrap_or("");

        // Data rows start with the day of month; summary rows carry a label
        if !timestamp.starts_with(|c: char| c.is_ascii_digit()) {
            skipped_rows += 1;
            continue;
        }

        let value = match cells.get(value_idx).map(|cell| cell.trim()) {
            Some(cell) if !cell.is_empty() => RawField::from(cell),
            _ => RawField::Null,
        };

        records.push(RawRecord::pair(timestamp, value));
    }

    debug!("Parsed {} rows, skipped {}", records.len(), skipped_rows);

    Ok(Export {
        column,
        records,
        skipped_rows,
    })
}

/// Pick the temperature channel
///
/// A `tempc` channel that is not the `(RAW)` variant wins. Otherwise the first
/// column mentioning `temperature` or `(c)` is used.
pub fn temperature_column(header: &[String]) -> Option<usize> {
    let lower: Vec<String> = header.iter().map(|column| column.to_lowercase()).collect();

    lower
        .iter()
        .position(|column| column.contains("tempc") && !column.contains("(raw)"))
        .or_else(|| {
            lower
                .iter()
                .position(|column| column.contains("temperature") || column.contains("(c)"))
        })
}

/// Split one CSV row, honouring double quotes and `""` escapes
pub fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);

    cells
}
