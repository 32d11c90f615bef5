//! Key-value persistence for drafts.

mod memory;
mod schema;
mod sqlite;

pub use memory::*;
pub use schema::*;
pub use sqlite::*;

use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StorageError::LockPoisoned
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String-keyed, string-valued persistent store.
///
/// Each draft store owns exactly one key and is its only writer.
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;
}
