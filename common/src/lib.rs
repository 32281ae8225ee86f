//! A library with common utilities for collecting and serving poster judging scores.

pub mod consolidator;
pub mod error;
pub mod record_writer;
pub mod reference;

pub use error::{Result, StoreError};

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Prefix shared by every individual score record file.
pub const RECORD_FILE_PREFIX: &str = "score_";
/// Extension shared by every individual score record file.
pub const RECORD_FILE_EXTENSION: &str = "csv";
/// File name of the consolidated snapshot inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "scores.csv";
/// File name of the poster reference table inside the data directory.
pub const POSTERS_FILE_NAME: &str = "poster-details.csv";
/// File name of the judge roster inside the data directory.
pub const JUDGES_FILE_NAME: &str = "judges.csv";
/// Message returned to the client after a successful submission.
pub const SUBMIT_SUCCESS_MESSAGE: &str = "Score submitted successfully!";

/// How the consolidator treats a record file it cannot parse.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CorruptRecordPolicy {
    /// Fail the whole listing.
    #[default]
    Abort,
    /// Log the file and leave it out of the table.
    Skip,
}

/// A score as submitted by a judge. Used as input for the record writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    #[serde(rename = "Judge")]
    pub judge: String,
    #[serde(rename = "Poster_Title")]
    pub poster_title: String,
    #[serde(rename = "Scientific_Clarity")]
    pub scientific_clarity: i32,
    #[serde(rename = "Data_Presentation")]
    pub data_presentation: i32,
    #[serde(rename = "Visual_Design")]
    pub visual_design: i32,
    #[serde(rename = "Impact")]
    pub impact: i32,
    #[serde(rename = "Tiebreaker")]
    pub tiebreaker: i32,
    #[serde(rename = "Comment", default)]
    pub comment: Option<String>,
}

impl ScoreSubmission {
    /// Sum of the four rubric scores and the tiebreaker.
    #[must_use]
    pub fn total(&self) -> i64 {
        [
            self.scientific_clarity,
            self.data_presentation,
            self.visual_design,
            self.impact,
            self.tiebreaker,
        ]
        .iter()
        .map(|&v| i64::from(v))
        .sum()
    }

    /// Check the fields serde cannot check for us.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidSubmission` if the judge or poster title is blank.
    pub fn validate(&self) -> Result<()> {
        if self.judge.trim().is_empty() {
            return Err(StoreError::InvalidSubmission(
                "Judge must not be empty".to_string(),
            ));
        }
        if self.poster_title.trim().is_empty() {
            return Err(StoreError::InvalidSubmission(
                "Poster_Title must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One stored score. This is both the on-disk row and the listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(rename = "Timestamp", with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "Judge")]
    pub judge: String,
    #[serde(rename = "Poster_Title")]
    pub poster_title: String,
    #[serde(rename = "Scientific_Clarity")]
    pub scientific_clarity: i32,
    #[serde(rename = "Data_Presentation")]
    pub data_presentation: i32,
    #[serde(rename = "Visual_Design")]
    pub visual_design: i32,
    #[serde(rename = "Impact")]
    pub impact: i32,
    #[serde(rename = "Tiebreaker")]
    pub tiebreaker: i32,
    #[serde(rename = "Total")]
    pub total: i64,
    #[serde(rename = "Comment")]
    pub comment: Option<String>,
}

impl ScoreRecord {
    /// Stamp a submission with the current local time and its computed total.
    #[must_use]
    pub fn from_submission(submission: &ScoreSubmission) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            judge: submission.judge.clone(),
            poster_title: submission.poster_title.clone(),
            scientific_clarity: submission.scientific_clarity,
            data_presentation: submission.data_presentation,
            visual_design: submission.visual_design,
            impact: submission.impact,
            tiebreaker: submission.tiebreaker,
            total: submission.total(),
            comment: submission
                .comment
                .clone()
                .filter(|comment| !comment.is_empty()),
        }
    }
}

/// The unique token embedded in every record file name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The final name of the record file, e.g. `score_<uuid>.csv`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{RECORD_FILE_PREFIX}{}.{RECORD_FILE_EXTENSION}", self.0)
    }

    /// The hidden name the record is written under before it is renamed into place.
    #[must_use]
    pub fn temp_file_name(&self) -> String {
        format!(".{}.tmp", self.file_name())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Check whether a file name matches the score record pattern `score_*.csv`.
#[must_use]
pub fn is_record_file_name(name: &str) -> bool {
    name.strip_prefix(RECORD_FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(RECORD_FILE_EXTENSION))
        .is_some_and(|stem| stem.ends_with('.'))
}

/// Returned to the client after a score is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub message: String,
    pub filename: String,
}

/// Locations of the score records and the consolidated snapshot.
#[derive(Debug, Clone)]
pub struct ScoreStore {
    records_dir: PathBuf,
    snapshot_path: PathBuf,
    corrupt_policy: CorruptRecordPolicy,
}

impl ScoreStore {
    #[must_use]
    pub fn new(
        records_dir: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
        corrupt_policy: CorruptRecordPolicy,
    ) -> Self {
        Self {
            records_dir: records_dir.into(),
            snapshot_path: snapshot_path.into(),
            corrupt_policy,
        }
    }

    #[must_use]
    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    #[must_use]
    pub fn corrupt_policy(&self) -> CorruptRecordPolicy {
        self.corrupt_policy
    }
}

/// Timestamps are stored the way the results page expects: date, a space, then the time.
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
    const READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    #[must_use]
    pub fn format(timestamp: &NaiveDateTime) -> String {
        timestamp.format(WRITE_FORMAT).to_string()
    }

    /// # Errors
    /// Returns an error if the string is not a `YYYY-MM-DD HH:MM:SS[.fff]` timestamp.
    pub fn parse(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s.trim(), READ_FORMAT)
    }

    /// # Errors
    /// Never fails on its own; errors come from the serializer.
    pub fn serialize<S: Serializer>(
        timestamp: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(timestamp))
    }

    /// # Errors
    /// Returns an error if the value is not a valid timestamp string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }
}
