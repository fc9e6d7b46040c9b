//! CSV sources with date coercion.
//!
//! Declared date columns are parsed into `Value::Date`. Every other cell is
//! inferred: empty cells become NULL, then integer, then decimal, then text.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use profitlens_shared::PipelineError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::rows::{RowSet, Value};

/// Errors raised while reading a CSV source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV is malformed (ragged rows, bad encoding, ...).
    #[error("malformed CSV in {origin}: {source}")]
    Malformed {
        /// File path or other origin label.
        origin: String,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The header row is missing.
    #[error("{origin} has no header row")]
    MissingHeader {
        /// File path or other origin label.
        origin: String,
    },

    /// A declared date column does not exist in the header.
    #[error("{origin} has no column `{column}` to parse as a date")]
    MissingDateColumn {
        /// File path or other origin label.
        origin: String,
        /// Column name.
        column: String,
    },

    /// A date cell could not be parsed.
    #[error("{origin} line {line}: column `{column}` value {value:?} is not a date")]
    InvalidDate {
        /// File path or other origin label.
        origin: String,
        /// 1-based line number in the file, header included.
        line: u64,
        /// Column name.
        column: String,
        /// Raw cell value.
        value: String,
    },
}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        Self::Source(err.to_string())
    }
}

/// Reads a CSV file, coercing `date_columns` to dates.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed, or a date cell
/// cannot be parsed.
pub fn read_csv(path: &Path, date_columns: &[&str]) -> Result<RowSet, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_from(file, &path.display().to_string(), date_columns)
}

/// Reads CSV from any reader. `origin` labels errors.
///
/// # Errors
///
/// Same as [`read_csv`], minus the open failure.
pub fn read_csv_from<R: Read>(
    reader: R,
    origin: &str,
    date_columns: &[&str],
) -> Result<RowSet, SourceError> {
    let malformed = |source| SourceError::Malformed {
        origin: origin.to_string(),
        source,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(malformed)?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(SourceError::MissingHeader {
            origin: origin.to_string(),
        });
    }

    let mut is_date = vec![false; headers.len()];
    for column in date_columns {
        let idx = headers.iter().position(|h| h == *column).ok_or_else(|| {
            SourceError::MissingDateColumn {
                origin: origin.to_string(),
                column: (*column).to_string(),
            }
        })?;
        is_date[idx] = true;
    }

    let mut rows = RowSet::new(headers.iter());
    for record in csv_reader.records() {
        let record = record.map_err(malformed)?;
        let line = record.position().map_or(0, csv::Position::line);

        let mut row = Vec::with_capacity(record.len());
        for (idx, raw) in record.iter().enumerate() {
            let value = if is_date[idx] {
                coerce_date(raw).ok_or_else(|| SourceError::InvalidDate {
                    origin: origin.to_string(),
                    line,
                    column: headers[idx].to_string(),
                    value: raw.to_string(),
                })?
            } else {
                infer_value(raw)
            };
            row.push(value);
        }
        // Width is guaranteed by the non-flexible reader.
        rows.push(row).map_err(|e| SourceError::Malformed {
            origin: origin.to_string(),
            source: csv::Error::from(std::io::Error::other(e.to_string())),
        })?;
    }

    Ok(rows)
}

/// Parses a date cell. Empty cells are NULL; unparseable cells are `None`.
fn coerce_date(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Value::Null);
    }
    parse_date(trimmed).map(Value::Date)
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`, the `T`-separated form
/// and RFC 3339 timestamps, keeping the calendar date.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Infers the type of a non-date cell.
#[must_use]
pub fn infer_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::Int(v);
    }
    if let Ok(v) = Decimal::from_str(trimmed) {
        return Value::Decimal(v);
    }
    Value::Text(trimmed.to_string())
}
