//! Process configuration, read once at startup.

use clap::Parser;
use judging_common::reference::ReferenceData;
use judging_common::{CorruptRecordPolicy, SNAPSHOT_FILE_NAME, ScoreStore};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The origin allowed to call the API from a browser
    #[arg(
        long,
        default_value = "http://localhost:3000",
        env = "JUDGING_ALLOWED_ORIGIN"
    )]
    pub allowed_origin: String,

    /// Directory holding the poster and judge tables and the score snapshot
    #[arg(long, default_value = "../data", env = "JUDGING_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Directory for individual score records (defaults to `<data-dir>/scores`)
    #[arg(long, env = "JUDGING_RECORDS_DIR")]
    pub records_dir: Option<PathBuf>,

    /// Path prefix every route is mounted under
    #[arg(long, default_value = "/", env = "JUDGING_MOUNT_PREFIX")]
    pub mount_prefix: String,

    /// What to do with a score record that cannot be parsed
    #[arg(
        long,
        value_enum,
        default_value = "abort",
        env = "JUDGING_CORRUPT_RECORDS"
    )]
    pub corrupt_records: CorruptRecordPolicy,
}

impl Cli {
    pub fn score_store(&self) -> ScoreStore {
        let records_dir = self
            .records_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("scores"));
        ScoreStore::new(
            records_dir,
            self.data_dir.join(SNAPSHOT_FILE_NAME),
            self.corrupt_records,
        )
    }

    pub fn reference_data(&self) -> ReferenceData {
        ReferenceData::in_dir(&self.data_dir)
    }

    /// The mount prefix as Rocket expects it: leading slash, no trailing slash.
    pub fn mount_base(&self) -> String {
        let trimmed = self.mount_prefix.trim().trim_matches('/');
        format!("/{trimmed}")
    }
}
