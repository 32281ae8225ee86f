//! Read the static poster and judge tables.

use crate::{JUDGES_FILE_NAME, POSTERS_FILE_NAME, Result, StoreError};
use chrono::NaiveDate;
use log::info;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One row of the poster table, keyed by column header.
pub type PosterRow = Map<String, Value>;

const DATE_COLUMN: &str = "Date";
const NAME_COLUMN: &str = "Name";
const JUDGE_COLUMN: &str = "Judge";
// two-digit years first, "%Y" would happily read "25" as year 25
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

/// Locations of the reference CSV files.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    posters_path: PathBuf,
    judges_path: PathBuf,
}

impl ReferenceData {
    #[must_use]
    pub fn new(posters_path: impl Into<PathBuf>, judges_path: impl Into<PathBuf>) -> Self {
        Self {
            posters_path: posters_path.into(),
            judges_path: judges_path.into(),
        }
    }

    /// Use the default file names inside a data directory.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(
            data_dir.join(POSTERS_FILE_NAME),
            data_dir.join(JUDGES_FILE_NAME),
        )
    }

    /// Every poster, sorted by date and then presenter name.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the poster file is missing, or a CSV error if
    /// it cannot be parsed.
    pub fn posters(&self) -> Result<Vec<PosterRow>> {
        let path = &self.posters_path;
        info!("Reading poster details from {}", path.display());
        let mut reader = open_reader(path, "poster details")?;

        let headers = reader
            .headers()
            .map_err(|e| StoreError::csv(path, e))?
            .clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| StoreError::csv(path, e))?;
            let row: PosterRow = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| {
                    let value = if header == DATE_COLUMN {
                        parse_date(cell).map_or_else(|| infer_value(cell), date_value)
                    } else {
                        infer_value(cell)
                    };
                    (header.to_string(), value)
                })
                .collect();
            rows.push(row);
        }

        rows.sort_by(compare_posters);
        Ok(rows)
    }

    /// Every judge name in file order.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the judge file is missing or
    /// `StoreError::MissingColumn` if it has no `Judge` column.
    pub fn judges(&self) -> Result<Vec<String>> {
        let path = &self.judges_path;
        info!("Reading judges from {}", path.display());
        let mut reader = open_reader(path, "judges")?;

        let column = reader
            .headers()
            .map_err(|e| StoreError::csv(path, e))?
            .iter()
            .position(|h| h.trim() == JUDGE_COLUMN)
            .ok_or_else(|| StoreError::MissingColumn {
                column: JUDGE_COLUMN,
                path: path.clone(),
            })?;

        let mut judges = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| StoreError::csv(path, e))?;
            if let Some(name) = record.get(column).map(str::trim)
                && !name.is_empty()
            {
                judges.push(name.to_string());
            }
        }
        Ok(judges)
    }
}

fn open_reader(path: &Path, what: &'static str) -> Result<csv::Reader<std::fs::File>> {
    match std::fs::File::open(path) {
        Ok(file) => Ok(csv::ReaderBuilder::new().flexible(true).from_reader(file)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
            what,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Turn a raw cell into the closest JSON value.
fn infer_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(float) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(float);
    }
    Value::String(cell.to_string())
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    let trimmed = cell.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn date_value(date: NaiveDate) -> Value {
    Value::String(format!("{}T00:00:00", date.format("%Y-%m-%d")))
}

/// Dated rows first in date order, then by name. Undated rows go last, also by name.
fn compare_posters(a: &PosterRow, b: &PosterRow) -> Ordering {
    let date = |row: &PosterRow| {
        row.get(DATE_COLUMN)
            .and_then(Value::as_str)
            .and_then(|s| s.strip_suffix("T00:00:00"))
            .and_then(parse_date)
    };
    let name = |row: &PosterRow| {
        row.get(NAME_COLUMN)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    };

    match (date(a), date(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| name(a).cmp(&name(b))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => name(a).cmp(&name(b)),
    }
}
