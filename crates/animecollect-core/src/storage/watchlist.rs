use rusqlite::params;
use tracing::{debug, info};

use super::{format_timestamp, parse_datetime, timestamp, Storage};
use crate::error::CollectError;
use crate::models::{NewWatchlistEntry, Priority, RemoveOutcome, WatchlistEntry};
use crate::validate;

impl Storage {
    // ── Watchlist ───────────────────────────────────────────────

    /// Append an item to the watchlist, returning its row id.
    ///
    /// No uniqueness is enforced here; callers that want one row per title
    /// check [`Storage::watchlist_contains`] first.
    pub fn add_to_watchlist(&self, entry: &NewWatchlistEntry) -> Result<i64, CollectError> {
        let entry = validate::watchlist_entry(entry)?;
        self.conn.execute(
            "INSERT INTO watchlist (anime_id, title, poster_url, added_at, priority)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.anime_id,
                entry.title,
                entry.poster_url,
                format_timestamp(&timestamp()),
                entry.priority.as_db_value(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(anime_id = %entry.anime_id, id, priority = %entry.priority, "Added to watchlist");
        Ok(id)
    }

    /// Delete a watchlist row by its row id.
    pub fn remove_from_watchlist(&self, id: i64) -> Result<RemoveOutcome, CollectError> {
        let deleted = self
            .conn
            .execute("DELETE FROM watchlist WHERE id = ?1", params![id])?;
        if deleted > 0 {
            debug!(id, "Removed from watchlist");
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::NotPresent)
        }
    }

    pub fn watchlist_contains(&self, anime_id: &str) -> Result<bool, CollectError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM watchlist WHERE anime_id = ?1",
            params![anime_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Highest priority first, then most recently added.
    pub fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>, CollectError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, anime_id, title, poster_url, added_at, priority FROM watchlist
             ORDER BY priority DESC, added_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let added_str: String = row.get(4)?;
                let priority: i64 = row.get(5)?;
                Ok(WatchlistEntry {
                    id: row.get(0)?,
                    anime_id: row.get(1)?,
                    title: row.get(2)?,
                    poster_url: row.get(3)?,
                    added_at: parse_datetime(4, &added_str)?,
                    priority: Priority::try_from(priority).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_watchlist(&self) -> Result<u32, CollectError> {
        let count: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM watchlist", [], |row| row.get(0))?;
        Ok(count)
    }
}
