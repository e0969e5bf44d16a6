//! Submission upsert: one row per identity, overwritten wholesale.
//!
//! The identity column is scanned linearly on every call. Classroom-sized
//! sheets make this cheap; a larger deployment could keep an identity → row
//! index beside the store without changing the contract below.
//!
//! There is no locking: two concurrent first submissions for the same
//! identity can both miss in the scan and both append.

use thiserror::Error;
use tracing::{debug, info};

use crate::errors::ErrorCode;
use crate::store::{StoreError, TabularStore};
use crate::types::{Submission, UpsertOutcome};

/// Column holding the identity key.
pub const IDENTITY_COLUMN: usize = 1;

/// Absolute row index of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// A store failure, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("reading identity column of {store}: {source}")]
    Read {
        store: String,
        #[source]
        source: StoreError,
    },

    #[error("writing row for '{identity}' to {store}: {source}")]
    Write {
        store: String,
        identity: String,
        #[source]
        source: StoreError,
    },
}

impl UpsertError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { source, .. } => source.code(false),
            Self::Write { source, .. } => source.code(true),
        }
    }
}

/// Absolute row index of `identity` among the column-1 values, header
/// included in `column`.
pub fn find_identity_row(column: &[String], identity: &str) -> Option<usize> {
    column
        .iter()
        .skip(FIRST_DATA_ROW - 1)
        .position(|value| value == identity)
        .map(|offset| offset + FIRST_DATA_ROW)
}

/// Write `[identity, fields..., timestamp]` to the identity's existing row,
/// or append it when the identity has no row yet.
pub fn upsert(
    store: &dyn TabularStore,
    identity: &str,
    fields: &[String],
    timestamp: &str,
) -> Result<UpsertOutcome, UpsertError> {
    let submission = Submission::new(identity, fields.to_vec(), timestamp);
    upsert_submission(store, &submission)
}

/// [`upsert`] for an already assembled [`Submission`].
pub fn upsert_submission(
    store: &dyn TabularStore,
    submission: &Submission,
) -> Result<UpsertOutcome, UpsertError> {
    let column = store
        .column_values(IDENTITY_COLUMN)
        .map_err(|source| UpsertError::Read {
            store: store.describe(),
            source,
        })?;
    let row = submission.row();
    let existing = find_identity_row(&column, &submission.identity);
    debug!(
        store = %store.describe(),
        identity = %submission.identity,
        scanned = column.len().saturating_sub(1),
        row = ?existing,
        "Scanned identity column"
    );

    let write_error = |source| UpsertError::Write {
        store: store.describe(),
        identity: submission.identity.clone(),
        source,
    };

    let outcome = match existing {
        Some(index) => {
            store.update_row(index, &row).map_err(write_error)?;
            UpsertOutcome::Overwritten
        }
        None => {
            store.append_row(&row).map_err(write_error)?;
            UpsertOutcome::Created
        }
    };

    info!(
        store = %store.describe(),
        identity = %submission.identity,
        outcome = outcome.as_str(),
        "Submission stored"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn course_store() -> MemoryStore {
        MemoryStore::with_header(
            "141b",
            strings(&["login", "repo", "shiny", "remark", "timestamp"]),
        )
    }

    #[test]
    fn test_find_identity_row_skips_header() {
        let column = strings(&["login", "alice", "bob"]);
        assert_eq!(find_identity_row(&column, "alice"), Some(2));
        assert_eq!(find_identity_row(&column, "bob"), Some(3));
        assert_eq!(find_identity_row(&column, "login"), None);
        assert_eq!(find_identity_row(&column, "carol"), None);
        assert_eq!(find_identity_row(&[], "alice"), None);
    }

    #[test]
    fn test_find_identity_row_returns_first_duplicate() {
        let column = strings(&["login", "x", "alice", "alice"]);
        assert_eq!(find_identity_row(&column, "alice"), Some(3));
    }

    #[test]
    fn test_new_identity_is_created() {
        let store = course_store();
        let outcome = upsert(&store, "alice", &strings(&["r", "s", "m"]), "t1").unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(store.data_row_count(), 1);
    }

    #[test]
    fn test_existing_identity_is_overwritten_in_place() {
        let store = course_store();
        upsert(&store, "alice", &strings(&["r1", "s1", "m1"]), "t1").unwrap();
        upsert(&store, "bob", &strings(&["r", "s", "m"]), "t1").unwrap();

        let outcome = upsert(&store, "alice", &strings(&["r2", "s2", "m2"]), "t2").unwrap();

        assert_eq!(outcome, UpsertOutcome::Overwritten);
        assert_eq!(store.data_row_count(), 2);
        let rows = store.rows();
        assert_eq!(rows[1], strings(&["alice", "r2", "s2", "m2", "t2"]));
        assert_eq!(rows[2][0], "bob");
    }

    #[test]
    fn test_repeated_upserts_leave_one_row_with_last_content() {
        let store = course_store();
        for i in 0..10 {
            let remark = format!("v{i}");
            upsert(&store, "alice", &strings(&["r", "s", &remark]), "ts").unwrap();
        }
        assert_eq!(store.data_row_count(), 1);
        assert_eq!(store.rows()[1][3], "v9");
    }

    #[test]
    fn test_alice_end_to_end() {
        let store = course_store();
        let first = upsert(
            &store,
            "alice",
            &strings(&["github.com/alice/proj", "alice.shinyapps.io", "v1"]),
            "2024/09/30 12:00:00",
        )
        .unwrap();
        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(
            store.rows()[1],
            strings(&[
                "alice",
                "github.com/alice/proj",
                "alice.shinyapps.io",
                "v1",
                "2024/09/30 12:00:00"
            ])
        );

        let second = upsert(
            &store,
            "alice",
            &strings(&["github.com/alice/proj", "alice.shinyapps.io", "v2"]),
            "2024/09/30 12:10:00",
        )
        .unwrap();
        assert_eq!(second, UpsertOutcome::Overwritten);
        assert_eq!(store.data_row_count(), 1);
        assert_eq!(store.rows()[1][3], "v2");
        assert_eq!(store.rows()[1][4], "2024/09/30 12:10:00");
    }

    #[test]
    fn test_identity_matching_is_exact() {
        let store = course_store();
        upsert(&store, "Alice", &strings(&["r", "s", "m"]), "t").unwrap();
        let outcome = upsert(&store, "alice", &strings(&["r", "s", "m"]), "t").unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(store.data_row_count(), 2);
    }

    /// Records calls and fails on demand.
    struct ScriptedStore {
        column: Vec<String>,
        fail_read: bool,
        fail_write: bool,
        writes: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn new(column: &[&str]) -> Self {
            Self {
                column: strings(column),
                fail_read: false,
                fail_write: false,
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    impl TabularStore for ScriptedStore {
        fn column_values(&self, column: usize) -> Result<Vec<String>, StoreError> {
            assert_eq!(column, IDENTITY_COLUMN);
            if self.fail_read {
                return Err(StoreError::Transport("connection reset".into()));
            }
            Ok(self.column.clone())
        }

        fn update_row(&self, row: usize, values: &[String]) -> Result<(), StoreError> {
            if self.fail_write {
                return Err(StoreError::Api {
                    status: 429,
                    body: "quota".into(),
                });
            }
            self.writes
                .lock()
                .unwrap()
                .push(format!("update {row} width {}", values.len()));
            Ok(())
        }

        fn append_row(&self, values: &[String]) -> Result<(), StoreError> {
            if self.fail_write {
                return Err(StoreError::Auth("revoked".into()));
            }
            self.writes
                .lock()
                .unwrap()
                .push(format!("append width {}", values.len()));
            Ok(())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[test]
    fn test_single_range_write_at_offset_plus_two() {
        let store = ScriptedStore::new(&["login", "a", "b", "c"]);
        upsert(&store, "c", &strings(&["r", "m"]), "t").unwrap();
        assert_eq!(*store.writes.lock().unwrap(), vec!["update 4 width 4"]);
    }

    #[test]
    fn test_read_failure_means_no_write() {
        let mut store = ScriptedStore::new(&["login"]);
        store.fail_read = true;
        let err = upsert(&store, "alice", &strings(&["r"]), "t").unwrap_err();
        assert!(matches!(err, UpsertError::Read { .. }));
        assert_eq!(err.code(), ErrorCode::StoreReadFailed);
        assert!(store.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_write_failures_map_to_codes() {
        let mut store = ScriptedStore::new(&["login", "alice"]);
        store.fail_write = true;

        let update = upsert(&store, "alice", &strings(&["r"]), "t").unwrap_err();
        assert_eq!(update.code(), ErrorCode::StoreWriteFailed);

        let append = upsert(&store, "bob", &strings(&["r"]), "t").unwrap_err();
        assert_eq!(append.code(), ErrorCode::StoreAuthFailed);
        assert!(append.to_string().contains("bob"));
    }
}
