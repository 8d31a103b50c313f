use chrono::{DateTime, Utc};
use geoquiz_core::RecordError;

#[derive(Debug)]
pub enum StoreError {
    /// SQLite error
    Sqlite(String),
    /// File I/O error
    Io(String),
    /// A stored row could not be decoded
    Corrupt { table: &'static str, key: String, message: String },
    /// A canonical record's JSON could not be read
    Record(RecordError),
    /// Another run holds the run lock
    LockHeld { holder: String, since: DateTime<Utc> },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(msg) => write!(f, "SQLite error: {}", msg),
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            StoreError::Corrupt { table, key, message } => {
                write!(f, "corrupt row in {} ({}): {}", table, key, message)
            }
            StoreError::Record(e) => write!(f, "{}", e),
            StoreError::LockHeld { holder, since } => {
                write!(f, "run lock held by {} since {}", holder, since.to_rfc3339())
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e.to_string())
    }
}

impl From<RecordError> for StoreError {
    fn from(e: RecordError) -> Self {
        StoreError::Record(e)
    }
}
