//! Store each submitted score as its own uniquely named record file.
//!
//! No existing file is opened for writing here, so any number of submissions can
//! land at the same time without coordinating with each other or with the consolidator.

use crate::{
    RecordId, Result, SUBMIT_SUCCESS_MESSAGE, ScoreRecord, ScoreStore, ScoreSubmission,
    StoreError, SubmitReceipt,
};
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

impl ScoreStore {
    /// Validate a submission and write it to a brand-new record file.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidSubmission` before touching the disk if the submission
    /// is incomplete, or an I/O error if the record could not be written.
    pub fn submit(&self, submission: &ScoreSubmission) -> Result<SubmitReceipt> {
        submission.validate()?;
        info!(
            "Received score from {} for {}",
            submission.judge, submission.poster_title
        );

        let record = ScoreRecord::from_submission(submission);
        let id = RecordId::generate();
        let filename = self.write_record(id, &record)?;

        Ok(SubmitReceipt {
            message: SUBMIT_SUCCESS_MESSAGE.to_string(),
            filename,
        })
    }

    /// Write one record under the name derived from `id` and return that name.
    pub(crate) fn write_record(&self, id: RecordId, record: &ScoreRecord) -> Result<String> {
        let dir = self.records_dir();
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let filename = id.file_name();
        let final_path = dir.join(&filename);
        let temp_path = dir.join(id.temp_file_name());

        let contents = encode_records(&final_path, std::slice::from_ref(record))?;
        write_file_atomic(&temp_path, &final_path, &contents)?;

        debug!("Wrote score record {}", final_path.display());
        Ok(filename)
    }
}

/// Render rows as CSV with a header line.
pub(crate) fn encode_records(path: &Path, records: &[ScoreRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| StoreError::csv(path, e))?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::io(path, e.into_error()))
}

/// Write `contents` to a fresh temporary file, flush it to disk, then rename it over `path`.
/// Readers see either the old file, no file, or the complete new one.
pub(crate) fn write_file_atomic(temp_path: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let result = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(temp_path, path));

    result.map_err(|e| {
        // the temp file may or may not exist depending on where we failed
        let _ = fs::remove_file(temp_path);
        StoreError::io(path, e)
    })
}
