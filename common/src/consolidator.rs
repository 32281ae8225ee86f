//! Rebuild the consolidated score table from the individual record files.
//!
//! The record files are the source of truth. The snapshot is rewritten in full on
//! every listing and removed when there is nothing to list. Two listings racing each
//! other leave whichever snapshot was renamed into place last.

use crate::record_writer::{encode_records, write_file_atomic};
use crate::{CorruptRecordPolicy, Result, ScoreRecord, ScoreStore, StoreError, is_record_file_name};
use log::{debug, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

impl ScoreStore {
    /// Scan the records directory, rebuild the snapshot and return every row.
    ///
    /// Rows come back in directory enumeration order, which is not necessarily
    /// chronological.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be scanned, the snapshot cannot be
    /// written or removed, or (with `CorruptRecordPolicy::Abort`) a record cannot be parsed.
    pub fn list_all(&self) -> Result<Vec<ScoreRecord>> {
        let record_paths = self.discover_records()?;

        if record_paths.is_empty() {
            info!("No score records found in {}", self.records_dir().display());
            self.remove_snapshot()?;
            return Ok(Vec::new());
        }

        let mut table = Vec::with_capacity(record_paths.len());
        for path in &record_paths {
            match read_record_file(path) {
                Ok(rows) => table.extend(rows),
                Err(e) => match self.corrupt_policy() {
                    CorruptRecordPolicy::Abort => return Err(e),
                    CorruptRecordPolicy::Skip => {
                        warn!("Skipping unreadable score record: {e}");
                    }
                },
            }
        }

        self.write_snapshot(&table)?;
        info!(
            "Consolidated {} rows from {} record files",
            table.len(),
            record_paths.len()
        );

        Ok(table.into_iter().map(normalize_row).collect())
    }

    /// One pass over the records directory, keeping only finished record files.
    fn discover_records(&self) -> Result<Vec<PathBuf>> {
        let dir = self.records_dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let is_match = entry
                .file_name()
                .to_str()
                .is_some_and(is_record_file_name);
            if is_match {
                paths.push(entry.path());
            }
        }
        debug!("Discovered {} score record files", paths.len());
        Ok(paths)
    }

    fn write_snapshot(&self, table: &[ScoreRecord]) -> Result<()> {
        let path = self.snapshot_path();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let contents = encode_records(path, table)?;
        // unique temp name so two concurrent listings never share one
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(format!(".{}.tmp", Uuid::new_v4()));
        write_file_atomic(Path::new(&temp_name), path, &contents)
    }

    fn remove_snapshot(&self) -> Result<()> {
        let path = self.snapshot_path();
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Removed stale score snapshot {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// Parse every row of a single record file.
fn read_record_file(path: &Path) -> Result<Vec<ScoreRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| StoreError::csv(path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| StoreError::csv(path, e)))
        .collect()
}

/// Blank comments become `None` so they serialize as `null` instead of `""`.
fn normalize_row(mut row: ScoreRecord) -> ScoreRecord {
    if row.comment.as_deref().is_some_and(str::is_empty) {
        row.comment = None;
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScoreSubmission;
    use std::collections::HashSet;

    fn test_store(dir: &Path, policy: CorruptRecordPolicy) -> ScoreStore {
        ScoreStore::new(dir.join("scores"), dir.join("scores.csv"), policy)
    }

    fn test_submission(judge: &str, poster: &str, comment: &str) -> ScoreSubmission {
        ScoreSubmission {
            judge: judge.to_string(),
            poster_title: poster.to_string(),
            scientific_clarity: 5,
            data_presentation: 4,
            visual_design: 3,
            impact: 5,
            tiebreaker: 0,
            comment: Some(comment.to_string()),
        }
    }

    #[test_log::test]
    fn test_list_all_empty_returns_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);

        assert_eq!(store.list_all().unwrap(), vec![]);
        assert!(!store.snapshot_path().exists());
    }

    #[test_log::test]
    fn test_list_all_empty_removes_stale_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        fs::create_dir_all(store.records_dir()).unwrap();
        fs::write(store.snapshot_path(), "Timestamp,Judge\nold,data\n").unwrap();

        assert_eq!(store.list_all().unwrap(), vec![]);
        assert!(!store.snapshot_path().exists());
    }

    #[test_log::test]
    fn test_list_all_example_submission() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        store.submit(&test_submission("A", "P1", "")).unwrap();

        let rows = store.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].judge, "A");
        assert_eq!(rows[0].poster_title, "P1");
        assert_eq!(rows[0].total, 17);
        assert_eq!(rows[0].comment, None);

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["Total"], 17);
        assert!(json["Comment"].is_null());
    }

    #[test_log::test]
    fn test_list_all_returns_every_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);

        // duplicates are kept, not merged
        store.submit(&test_submission("A", "P1", "first")).unwrap();
        store.submit(&test_submission("A", "P1", "second")).unwrap();
        store.submit(&test_submission("B", "P2", "has, a comma")).unwrap();

        let rows = store.list_all().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.total == 17));
        let comments: HashSet<&str> = rows.iter().filter_map(|r| r.comment.as_deref()).collect();
        assert_eq!(comments, HashSet::from(["first", "second", "has, a comma"]));

        // the snapshot holds the same table
        let snapshot = read_record_file(store.snapshot_path()).unwrap();
        assert_eq!(snapshot, rows);
    }

    #[test_log::test]
    fn test_list_all_twice_gives_same_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        for judge in ["A", "B", "C", "D"] {
            store.submit(&test_submission(judge, "P1", "ok")).unwrap();
        }

        let first: HashSet<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| (r.timestamp, r.judge))
            .collect();
        let second: HashSet<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| (r.timestamp, r.judge))
            .collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[test_log::test]
    fn test_list_all_header_only_and_multi_row_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        store.submit(&test_submission("A", "P1", "")).unwrap();

        let header = "Timestamp,Judge,Poster_Title,Scientific_Clarity,Data_Presentation,\
                      Visual_Design,Impact,Tiebreaker,Total,Comment\n";
        fs::write(store.records_dir().join("score_empty.csv"), header).unwrap();
        fs::write(
            store.records_dir().join("score_batch.csv"),
            format!(
                "{header}\
                 2025-06-02 09:00:00.000000,X1,P2,1,1,1,1,1,5,\n\
                 2025-06-02 09:00:01.000000,X2,P2,2,2,2,2,2,10,late\n"
            ),
        )
        .unwrap();

        let rows = store.list_all().unwrap();
        assert_eq!(rows.len(), 3);

        let judges: Vec<&str> = rows.iter().map(|r| r.judge.as_str()).collect();
        let batch_start = judges.iter().position(|&j| j == "X1").unwrap();
        assert_eq!(judges[batch_start + 1], "X2");
        assert_eq!(rows[batch_start].comment, None);
        assert_eq!(rows[batch_start + 1].total, 10);
    }

    #[test_log::test]
    fn test_list_all_ignores_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        store.submit(&test_submission("A", "P1", "")).unwrap();
        fs::write(store.records_dir().join("notes.txt"), "hello").unwrap();
        fs::write(store.records_dir().join(".score_x.csv.tmp"), "half a rec").unwrap();

        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test_log::test]
    fn test_list_all_snapshot_is_replaced_not_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        store.submit(&test_submission("A", "P1", "")).unwrap();
        store.list_all().unwrap();
        store.list_all().unwrap();

        let snapshot = fs::read_to_string(store.snapshot_path()).unwrap();
        assert_eq!(snapshot.lines().count(), 2);
    }

    #[test_log::test]
    fn test_corrupt_record_aborts_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Abort);
        store.submit(&test_submission("A", "P1", "")).unwrap();
        let bad = store.records_dir().join("score_broken.csv");
        fs::write(&bad, "Timestamp,Judge\nnot a time,A\n").unwrap();

        let err = store.list_all().unwrap_err();
        match err {
            StoreError::Csv { path, .. } => assert_eq!(path, bad),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test_log::test]
    fn test_corrupt_record_skipped_when_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path(), CorruptRecordPolicy::Skip);
        store.submit(&test_submission("A", "P1", "")).unwrap();
        fs::write(
            store.records_dir().join("score_broken.csv"),
            "Timestamp,Judge\nnot a time,A\n",
        )
        .unwrap();

        let rows = store.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].judge, "A");
    }

    #[test_log::test]
    fn test_read_record_file_accepts_pandas_style_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("score_legacy.csv");
        fs::write(
            &path,
            "Timestamp,Judge,Poster_Title,Scientific_Clarity,Data_Presentation,\
             Visual_Design,Impact,Tiebreaker,Total,Comment\n\
             2025-06-02 14:03:11.52,A,\"P1, revisited\",5,4,3,5,0,17,\n",
        )
        .unwrap();

        let rows = read_record_file(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].poster_title, "P1, revisited");
        assert_eq!(normalize_row(rows[0].clone()).comment, None);
    }
}
