//! Append-only event log backed by SQLite.
//!
//! Two flat tables, one per event kind. Rows are only ever inserted; reads are
//! full scans in insertion (rowid) order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::StorageError;
use crate::models::{PredictionEvent, VisitEvent};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS page_visits (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    page_name     TEXT NOT NULL,
    time_of_visit TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS emotion_predictions (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    raw_text      TEXT NOT NULL,
    prediction    TEXT NOT NULL,
    probability   REAL NOT NULL,
    time_of_visit TEXT NOT NULL
);
";

pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    /// Open (or create) the database file and make sure both tables exist.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(StorageError::sqlite("opening database"))?;
        match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        }) {
            Ok(mode) => tracing::debug!(%mode, "journal mode set"),
            Err(err) => tracing::warn!(error = %err, "failed to enable WAL mode"),
        }

        let store = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "event store ready");
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(StorageError::sqlite("opening database"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-written; SQLite rolls back.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create both tables if absent. Safe to call repeatedly.
    pub fn init_schema(&self) -> Result<(), StorageError> {
        self.conn()
            .execute_batch(SCHEMA)
            .map_err(StorageError::sqlite("creating schema"))
    }

    pub fn record_visit(&self, page: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.conn()
            .execute(
                "INSERT INTO page_visits (page_name, time_of_visit) VALUES (?1, ?2)",
                params![page, at],
            )
            .map_err(StorageError::sqlite("recording visit"))?;
        tracing::debug!(page, "visit recorded");
        Ok(())
    }

    pub fn record_prediction(
        &self,
        text: &str,
        label: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.conn()
            .execute(
                "INSERT INTO emotion_predictions (raw_text, prediction, probability, time_of_visit)
                 VALUES (?1, ?2, ?3, ?4)",
                params![text, label, confidence, at],
            )
            .map_err(StorageError::sqlite("recording prediction"))?;
        tracing::debug!(label, confidence, "prediction recorded");
        Ok(())
    }

    pub fn list_visits(&self) -> Result<Vec<VisitEvent>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT page_name, time_of_visit FROM page_visits ORDER BY id ASC")
            .map_err(StorageError::sqlite("listing visits"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(VisitEvent {
                    page_name: row.get(0)?,
                    time_of_visit: row.get(1)?,
                })
            })
            .map_err(StorageError::sqlite("listing visits"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::sqlite("listing visits"))
    }

    pub fn list_predictions(&self) -> Result<Vec<PredictionEvent>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT raw_text, prediction, probability, time_of_visit
                 FROM emotion_predictions
                 ORDER BY id ASC",
            )
            .map_err(StorageError::sqlite("listing predictions"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PredictionEvent {
                    raw_text: row.get(0)?,
                    prediction: row.get(1)?,
                    probability: row.get(2)?,
                    time_of_visit: row.get(3)?,
                })
            })
            .map_err(StorageError::sqlite("listing predictions"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::sqlite("listing predictions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let store = EventStore::open_in_memory().unwrap();
        store.record_visit("Home", at(0)).unwrap();
        store.init_schema().unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.list_visits().unwrap().len(), 1);
    }

    #[test]
    fn test_visits_in_insertion_order() {
        let store = EventStore::open_in_memory().unwrap();
        store.record_visit("Home", at(0)).unwrap();
        store.record_visit("Monitor", at(1)).unwrap();
        store.record_visit("About", at(2)).unwrap();

        let visits = store.list_visits().unwrap();
        let pages: Vec<&str> = visits.iter().map(|v| v.page_name.as_str()).collect();
        assert_eq!(pages, vec!["Home", "Monitor", "About"]);
        assert_eq!(visits[1].time_of_visit, at(1));
    }

    #[test]
    fn test_prediction_round_trip() {
        let store = EventStore::open_in_memory().unwrap();
        store.record_prediction("first", "joy", 91.5, at(0)).unwrap();

        let when = Utc::now();
        store
            .record_prediction(":grinning_face: yay", "Others", 33.333333333333336, when)
            .unwrap();

        let predictions = store.list_predictions().unwrap();
        assert_eq!(predictions.len(), 2);
        let last = predictions.last().unwrap();
        assert_eq!(
            last,
            &PredictionEvent {
                raw_text: ":grinning_face: yay".to_string(),
                prediction: "Others".to_string(),
                probability: 33.333333333333336,
                time_of_visit: when,
            }
        );
    }

    #[test]
    fn test_empty_store_lists_nothing() {
        let store = EventStore::open_in_memory().unwrap();
        assert!(store.list_visits().unwrap().is_empty());
        assert!(store.list_predictions().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("events.db");

        {
            let store = EventStore::open(&path).unwrap();
            store.record_visit("Home", at(0)).unwrap();
            store.record_prediction("sad day", "sadness", 77.0, at(1)).unwrap();
        }

        let reopened = EventStore::open(&path).unwrap();
        assert_eq!(reopened.list_visits().unwrap().len(), 1);
        assert_eq!(reopened.list_predictions().unwrap()[0].prediction, "sadness");
    }

    #[test]
    fn test_log_append_only() {
        // Earlier rows are never touched by later writes
        let store = EventStore::open_in_memory().unwrap();
        store.record_visit("Home", at(0)).unwrap();
        let before = store.list_visits().unwrap();

        store.record_visit("Monitor", at(1)).unwrap();
        let after = store.list_visits().unwrap();

        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
    }
}
