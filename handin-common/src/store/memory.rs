//! In-process store used by the development profile and tests.

use std::sync::RwLock;

use super::{StoreError, TabularStore};

/// Rows kept in memory behind a lock. Row 1 is the header.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    rows: RwLock<Vec<Vec<String>>>,
}

impl MemoryStore {
    /// Create a store holding only the given header row.
    pub fn with_header(name: impl Into<String>, header: Vec<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(vec![header]),
        }
    }

    /// Snapshot of every row, header included.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of data rows (header excluded).
    pub fn data_row_count(&self) -> usize {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
            .saturating_sub(1)
    }
}

impl TabularStore for MemoryStore {
    fn column_values(&self, column: usize) -> Result<Vec<String>, StoreError> {
        if column == 0 {
            return Err(StoreError::Config("columns are 1-based".to_string()));
        }
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut values: Vec<String> = rows
            .iter()
            .map(|row| row.get(column - 1).cloned().unwrap_or_default())
            .collect();
        while values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        Ok(values)
    }

    fn update_row(&self, row: usize, values: &[String]) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let total = rows.len();
        let target = row
            .checked_sub(1)
            .and_then(|idx| rows.get_mut(idx))
            .ok_or(StoreError::RowOutOfRange { row, rows: total })?;

        if target.len() < values.len() {
            target.resize(values.len(), String::new());
        }
        target[..values.len()].clone_from_slice(values);
        Ok(())
    }

    fn append_row(&self, values: &[String]) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.push(values.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_store_has_only_header() {
        let store = MemoryStore::with_header("141c", strings(&["login", "repo"]));
        assert_eq!(store.data_row_count(), 0);
        assert_eq!(store.column_values(1).unwrap(), vec!["login"]);
        assert_eq!(store.describe(), "memory:141c");
    }

    #[test]
    fn test_append_then_update_in_place() {
        let store = MemoryStore::with_header("t", strings(&["login", "repo", "timestamp"]));
        store.append_row(&strings(&["alice", "a", "t1"])).unwrap();
        store.append_row(&strings(&["bob", "b", "t1"])).unwrap();

        store.update_row(2, &strings(&["alice", "a2", "t2"])).unwrap();

        let rows = store.rows();
        assert_eq!(rows[1], strings(&["alice", "a2", "t2"]));
        assert_eq!(rows[2], strings(&["bob", "b", "t1"]));
        assert_eq!(store.data_row_count(), 2);
    }

    #[test]
    fn test_update_widens_short_rows_and_keeps_extra_columns() {
        let store = MemoryStore::with_header("t", strings(&["login"]));
        store.append_row(&strings(&["alice", "x", "y", "note"])).unwrap();

        store.update_row(2, &strings(&["alice", "1", "2"])).unwrap();
        assert_eq!(store.rows()[1], strings(&["alice", "1", "2", "note"]));

        store
            .update_row(2, &strings(&["alice", "1", "2", "3", "4"]))
            .unwrap();
        assert_eq!(store.rows()[1].len(), 5);
    }

    #[test]
    fn test_update_out_of_range() {
        let store = MemoryStore::with_header("t", strings(&["login"]));
        let err = store.update_row(5, &strings(&["x"])).unwrap_err();
        assert!(matches!(err, StoreError::RowOutOfRange { row: 5, rows: 1 }));
        assert!(store.update_row(0, &strings(&["x"])).is_err());
    }

    #[test]
    fn test_column_values_trims_trailing_blanks() {
        let store = MemoryStore::with_header("t", strings(&["login", "repo"]));
        store.append_row(&strings(&["alice", "r"])).unwrap();
        store.append_row(&strings(&["", "orphan"])).unwrap();
        assert_eq!(store.column_values(1).unwrap(), vec!["login", "alice"]);
        assert_eq!(store.column_values(2).unwrap(), vec!["repo", "r", "orphan"]);
        assert!(store.column_values(0).is_err());
    }
}
