//! Relational store of the sync engine.
//!
//! A single SQLite database holds projects, locales, resources, entities,
//! translations, translation memory, pending-sync markers and the
//! denormalized stats. All data access goes through [`Db`], handed out by
//! [`Store::read`] or, for writes, by [`Store::transaction`], which commits
//! only when the closure succeeds.

mod entities;
mod lock;
mod projects;
mod schema;
mod stats;
mod translations;

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags};

pub use entities::{EntityRow, ResourceRow};
pub use lock::SyncLock;
pub use projects::{LocaleRow, ProjectRow, RepositoryRow, UserRow};
pub use schema::SCHEMA_VERSION;
pub use translations::{NewTranslation, TranslationRow, TranslationState};

const BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("unsupported store schema version {0}")]
    VersionMismatch(i64),
    #[error("invalid stored data: {0}")]
    Invalid(String),
    #[error("store connection poisoned by a panicked writer")]
    Poisoned,
}

/// Shared handle to the database. Cloning is cheap; all clones use the same
/// connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Invalid(format!("{}: {e}", parent.display())))?;
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    /// Private database that lives as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        schema::initialize(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` outside of an explicit transaction. Every statement commits on
    /// its own.
    pub fn read<T>(&self, f: impl FnOnce(&Db<'_>) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&Db { conn: &guard })
    }

    /// Run `f` inside one transaction, committed when `f` returns `Ok` and
    /// rolled back otherwise.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Db<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = guard.transaction().map_err(StoreError::from)?;
        let value = f(&Db { conn: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// Borrowed connection (plain or inside a transaction) carrying every query
/// of the store.
pub struct Db<'c> {
    conn: &'c Connection,
}

/// Timestamp format stored in TEXT columns; sorts chronologically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn flag(value: bool) -> i64 {
    i64::from(value)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_transaction_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        let res: Result<(), StoreError> = store.transaction(|db| {
            db.upsert_project("gone", "Gone")?;
            Err(StoreError::Invalid("boom".into()))
        });
        assert!(res.is_err());
        let found = store.read(|db| db.project_by_slug("gone")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn reopening_a_file_database_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.sqlite3");
        {
            let store = Store::open(&path).unwrap();
            store
                .transaction(|db| db.upsert_project("keep", "Keep").map(|_| ()))
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        let p = store.read(|db| db.project_by_slug("keep")).unwrap().unwrap();
        assert_eq!(p.name, "Keep");
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        drop(Store::open(&path).unwrap());
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("UPDATE store_meta SET version = 99", []).unwrap();
        }
        let err = Store::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch(99)));
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let a = timestamp(test_support::now());
        let b = timestamp(test_support::now() + chrono::Duration::milliseconds(5));
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }
}
