use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use super::{format_timestamp, is_unique_violation, parse_datetime, timestamp, Storage};
use crate::error::CollectError;
use crate::models::{AddOutcome, CollectionEntry, CollectionOrder, NewCollectionEntry, RemoveOutcome};
use crate::validate;

const COLLECTION_COLUMNS: &str = "id, title, original_title, synopsis, poster_url, api_rating,
     status, total_episode_count, added_at, modified_at";

impl Storage {
    // ── Collection ──────────────────────────────────────────────

    /// Add a title to the collection.
    ///
    /// An existing row with the same catalog id is never overwritten: the call
    /// reports [`AddOutcome::AlreadyPresent`] and writes nothing.
    pub fn add_to_collection(&self, entry: &NewCollectionEntry) -> Result<AddOutcome, CollectError> {
        let entry = validate::collection_entry(entry)?;

        if self.collection_exists(&entry.id)? {
            debug!(anime_id = %entry.id, "Already in collection");
            return Ok(AddOutcome::AlreadyPresent);
        }

        let now = format_timestamp(&timestamp());
        let inserted = self.conn.execute(
            "INSERT INTO collection (id, title, original_title, synopsis, poster_url, api_rating,
             status, total_episode_count, added_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                entry.id,
                entry.title,
                entry.original_title,
                entry.synopsis,
                entry.poster_url,
                entry.api_rating,
                entry.status,
                entry.total_episode_count,
                now,
            ],
        );

        match inserted {
            Ok(_) => {
                info!(anime_id = %entry.id, title = %entry.title, "Added to collection");
                Ok(AddOutcome::Added)
            }
            // Lost a race with another insert of the same id.
            Err(e) if is_unique_violation(&e) => {
                warn!(anime_id = %entry.id, "Duplicate insert rejected by primary key");
                Ok(AddOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a title and everything that hangs off it.
    ///
    /// Watched episodes and categories are deleted before the entry itself,
    /// all in one transaction. Removing an unknown id is not an error.
    pub fn remove_from_collection(&self, id: &str) -> Result<RemoveOutcome, CollectError> {
        validate::catalog_id(id)?;

        let tx = self.conn.unchecked_transaction()?;
        let episodes = tx.execute("DELETE FROM watched_episodes WHERE anime_id = ?1", params![id])?;
        let tags = tx.execute("DELETE FROM categories WHERE anime_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM collection WHERE id = ?1", params![id])?;
        tx.commit()?;

        if removed > 0 {
            info!(anime_id = %id, episodes, tags, "Removed from collection");
            Ok(RemoveOutcome::Removed)
        } else {
            debug!(anime_id = %id, episodes, "Not in collection, nothing to remove");
            Ok(RemoveOutcome::NotPresent)
        }
    }

    /// Get a collection entry by catalog id.
    pub fn get_collection_entry(&self, id: &str) -> Result<Option<CollectionEntry>, CollectError> {
        self.conn
            .query_row(
                &format!("SELECT {COLLECTION_COLUMNS} FROM collection WHERE id = ?1"),
                params![id],
                row_to_collection_entry,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All entries in a stable order. Ties fall back to insertion order.
    pub fn list_collection(
        &self,
        order: CollectionOrder,
    ) -> Result<Vec<CollectionEntry>, CollectError> {
        let order_by = match order {
            CollectionOrder::RecentlyAdded => "added_at DESC, rowid DESC",
            CollectionOrder::RecentlyModified => "modified_at DESC, rowid DESC",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collection ORDER BY {order_by}"
        ))?;
        let rows = stmt
            .query_map([], row_to_collection_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn collection_exists(&self, id: &str) -> Result<bool, CollectError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM collection WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Bump `modified_at`. Returns false when the entry does not exist.
    pub(crate) fn touch_collection_entry(&self, id: &str, at: &str) -> Result<bool, CollectError> {
        let updated = self.conn.execute(
            "UPDATE collection SET modified_at = ?1 WHERE id = ?2",
            params![at, id],
        )?;
        Ok(updated > 0)
    }
}

fn row_to_collection_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectionEntry> {
    let added_str: String = row.get(8)?;
    let modified_str: String = row.get(9)?;

    Ok(CollectionEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        original_title: row.get(2)?,
        synopsis: row.get(3)?,
        poster_url: row.get(4)?,
        api_rating: row.get(5)?,
        status: row.get(6)?,
        total_episode_count: row.get(7)?,
        added_at: parse_datetime(8, &added_str)?,
        modified_at: parse_datetime(9, &modified_str)?,
    })
}
