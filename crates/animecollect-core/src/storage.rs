use std::path::Path;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, Connection, ErrorCode};

use crate::error::CollectError;

mod categories;
mod collection;
mod watched;
mod watchlist;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");

/// SQLite-backed storage for the collection, watch state, watchlist and tags.
///
/// One `Storage` owns the only connection to the database file. All
/// repositories are method groups on this type, split by table under
/// `storage/`.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, CollectError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "Opened collection database");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CollectError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Probe the connection with a trivial query.
    pub fn is_ready(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
            .is_ok()
    }

    /// Delete every row from every table, children before parents.
    pub fn clear_all(&self) -> Result<(), CollectError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM watched_episodes", [])?;
        tx.execute("DELETE FROM categories", [])?;
        tx.execute("DELETE FROM watchlist", [])?;
        tx.execute("DELETE FROM collection", [])?;
        tx.commit()?;
        tracing::info!("Cleared all collection data");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> &Connection {
        &self.conn
    }
}

// ── Migrations ──────────────────────────────────────────────────

/// Run schema migrations using `PRAGMA user_version` for version tracking.
fn run_migrations(conn: &Connection) -> Result<(), CollectError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

/// Current time at the precision we persist, so values read back compare equal.
fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339, so text ordering matches time ordering.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read back a timestamp written by [`format_timestamp`].
///
/// Text that does not parse is reported as a conversion failure on `column`.
fn parse_datetime(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// A write rejected by a primary key or unique index.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCollectionEntry, NewWatchlistEntry, WatchedOrder};

    #[test]
    fn test_open_memory_is_ready() {
        let db = Storage::open_memory().unwrap();
        assert!(db.is_ready());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Storage::open_memory().unwrap();
        run_migrations(&db.conn).unwrap();
        let version: i32 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_timestamps_roundtrip_exactly() {
        let now = timestamp();
        assert_eq!(parse_datetime(0, &format_timestamp(&now)).unwrap(), now);
        assert!(format_timestamp(&now).ends_with('Z'));
    }

    #[test]
    fn test_unparseable_timestamp_is_an_error() {
        let err = parse_datetime(4, "garbage").unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, _)
        ));
    }

    #[test]
    fn test_corrupt_timestamp_fails_the_read() {
        let db = Storage::open_memory().unwrap();
        db.add_to_collection(&NewCollectionEntry::new("anime-1", "Frieren"))
            .unwrap();
        db.conn
            .execute("UPDATE collection SET added_at = 'yesterday'", [])
            .unwrap();
        assert!(matches!(
            db.get_collection_entry("anime-1"),
            Err(CollectError::Storage(_))
        ));
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.db");
        {
            let db = Storage::open(&path).unwrap();
            db.add_to_collection(&NewCollectionEntry::new("anime-1", "Frieren"))
                .unwrap();
            db.mark_watched("anime-1", 1, None).unwrap();
        }
        let db = Storage::open(&path).unwrap();
        assert!(db.collection_exists("anime-1").unwrap());
        assert!(db.is_watched("anime-1", 1).unwrap());
    }

    #[test]
    fn test_clear_all() {
        let db = Storage::open_memory().unwrap();
        db.add_to_collection(&NewCollectionEntry::new("anime-1", "Frieren"))
            .unwrap();
        db.mark_watched("anime-1", 1, None).unwrap();
        db.add_to_watchlist(&NewWatchlistEntry::new("anime-2", "Dandadan"))
            .unwrap();
        db.add_categories("anime-1", &["Fantasy"]).unwrap();

        db.clear_all().unwrap();

        assert!(db.list_collection(Default::default()).unwrap().is_empty());
        assert!(db
            .list_watched("anime-1", WatchedOrder::EpisodeNumber)
            .unwrap()
            .is_empty());
        assert!(db.list_watchlist().unwrap().is_empty());
        assert!(db.list_categories("anime-1").unwrap().is_empty());
    }
}
