//! Row-oriented tabular stores holding submissions.
//!
//! A store is a sequence of rows with a header at row 1; column 1 of every
//! data row is the identity key. Rows and columns are 1-based, matching
//! spreadsheet A1 notation.

pub mod memory;
pub mod sheets;

pub use memory::MemoryStore;
pub use sheets::{ServiceAccountAuth, ServiceAccountKey, SheetsStore};

use thiserror::Error;

use crate::errors::ErrorCode;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(String),

    #[error("store returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("store authentication failed: {0}")]
    Auth(String),

    #[error("malformed store response: {0}")]
    Decode(String),

    #[error("row {row} is outside the store ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the failure was the backend refusing our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
            || matches!(self, Self::Api { status, .. } if *status == 401 || *status == 403)
    }

    /// Catalog code for a failure during a read or a write.
    pub fn code(&self, writing: bool) -> ErrorCode {
        if self.is_auth() {
            ErrorCode::StoreAuthFailed
        } else if writing {
            ErrorCode::StoreWriteFailed
        } else {
            ErrorCode::StoreReadFailed
        }
    }
}

/// A row-oriented store such as a spreadsheet worksheet.
///
/// Implementations perform blocking I/O; async callers should run them on a
/// blocking thread.
pub trait TabularStore: Send + Sync {
    /// All values of a 1-based column, header included. Trailing empty cells
    /// may be omitted.
    fn column_values(&self, column: usize) -> Result<Vec<String>, StoreError>;

    /// Overwrite columns `1..=values.len()` of a 1-based row in one write.
    fn update_row(&self, row: usize, values: &[String]) -> Result<(), StoreError>;

    /// Append a row after the last non-empty row.
    fn append_row(&self, values: &[String]) -> Result<(), StoreError>;

    /// Short human-readable name for logs.
    fn describe(&self) -> String;
}

/// Spreadsheet column letters for a 1-based column index (1 → A, 27 → AA).
pub fn column_letter(column: usize) -> String {
    let mut n = column.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// A1 range covering columns `1..=width` of a single row, e.g. `A7:E7`.
pub fn row_range(row: usize, width: usize) -> String {
    format!("A{row}:{}{row}", column_letter(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(4), "D");
        assert_eq!(column_letter(5), "E");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_row_range() {
        assert_eq!(row_range(2, 5), "A2:E2");
        assert_eq!(row_range(14, 4), "A14:D14");
    }

    #[test]
    fn test_error_codes() {
        let read = StoreError::Transport("timed out".into());
        assert_eq!(read.code(false), ErrorCode::StoreReadFailed);
        assert_eq!(read.code(true), ErrorCode::StoreWriteFailed);

        let denied = StoreError::Api {
            status: 403,
            body: "PERMISSION_DENIED".into(),
        };
        assert!(denied.is_auth());
        assert_eq!(denied.code(true), ErrorCode::StoreAuthFailed);

        let quota = StoreError::Api {
            status: 429,
            body: "RESOURCE_EXHAUSTED".into(),
        };
        assert!(!quota.is_auth());
    }
}
