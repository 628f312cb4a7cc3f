pub mod sqlite;
pub mod repository;

pub use sqlite::*;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

/// Shared handle to the SQLite connection, safe to use from async tasks.
///
/// rusqlite is synchronous; all repository operations hold the lock only for
/// the duration of one statement batch, so contention stays short. A
/// poisoned lock is treated as the persistence dependency being unavailable,
/// which is pipeline-fatal per the error taxonomy.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = sqlite::open_database(path)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = sqlite::open_memory_database()?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run a repository operation against the connection.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| DatabaseError::Unavailable("connection lock poisoned".into()))?;
        f(&guard)
    }
}
