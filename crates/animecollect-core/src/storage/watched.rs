use rusqlite::params;
use tracing::{debug, info, warn};

use super::{format_timestamp, is_unique_violation, parse_datetime, timestamp, Storage};
use crate::error::CollectError;
use crate::models::{MarkOutcome, UnmarkOutcome, WatchedEpisode, WatchedOrder};
use crate::validate;

impl Storage {
    // ── Watch state ─────────────────────────────────────────────

    /// Mark an episode as watched.
    ///
    /// Re-marking is a no-op that keeps the original `watched_at`. The owning
    /// collection entry's `modified_at` is bumped when it exists; a missing
    /// entry does not prevent the watch record from being kept.
    pub fn mark_watched(
        &self,
        anime_id: &str,
        episode: u32,
        episode_title: Option<&str>,
    ) -> Result<MarkOutcome, CollectError> {
        validate::catalog_id(anime_id)?;
        let episode = validate::episode_number(i64::from(episode))?;

        if self.is_watched(anime_id, episode)? {
            debug!(anime_id = %anime_id, episode, "Episode already watched");
            return Ok(MarkOutcome::AlreadyWatched);
        }

        let episode_title = episode_title
            .map(|t| validate::sanitize_truncated(t, validate::MAX_TITLE_LEN))
            .filter(|t| !t.is_empty());
        let watched_at = timestamp();
        let ts = format_timestamp(&watched_at);

        let inserted = self.conn.execute(
            "INSERT INTO watched_episodes (anime_id, episode_number, episode_title, watched_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![anime_id, episode, episode_title, ts],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                warn!(anime_id = %anime_id, episode, "Duplicate mark rejected by unique index");
                return Ok(MarkOutcome::AlreadyWatched);
            }
            Err(e) => return Err(e.into()),
        }

        match self.touch_collection_entry(anime_id, &ts) {
            Ok(true) => {}
            Ok(false) => debug!(anime_id = %anime_id, "No collection entry to bump"),
            Err(e) => warn!(anime_id = %anime_id, "Failed to bump modified_at: {e}"),
        }

        info!(anime_id = %anime_id, episode, "Marked episode watched");
        Ok(MarkOutcome::Marked { watched_at })
    }

    /// Clear a watched mark. Clearing a mark that does not exist changes nothing.
    pub fn mark_unwatched(&self, anime_id: &str, episode: u32) -> Result<UnmarkOutcome, CollectError> {
        validate::catalog_id(anime_id)?;
        let episode = validate::episode_number(i64::from(episode))?;

        let deleted = self.conn.execute(
            "DELETE FROM watched_episodes WHERE anime_id = ?1 AND episode_number = ?2",
            params![anime_id, episode],
        )?;
        if deleted == 0 {
            debug!(anime_id = %anime_id, episode, "Episode was not watched");
            return Ok(UnmarkOutcome::NotWatched);
        }

        let ts = format_timestamp(&timestamp());
        if let Err(e) = self.touch_collection_entry(anime_id, &ts) {
            warn!(anime_id = %anime_id, "Failed to bump modified_at: {e}");
        }

        info!(anime_id = %anime_id, episode, "Marked episode unwatched");
        Ok(UnmarkOutcome::Unmarked)
    }

    /// Set or clear the personal 1-10 rating of a watched episode.
    pub fn rate_episode(
        &self,
        anime_id: &str,
        episode: u32,
        rating: Option<u8>,
    ) -> Result<(), CollectError> {
        validate::catalog_id(anime_id)?;
        let episode = validate::episode_number(i64::from(episode))?;
        let rating = rating
            .map(|r| validate::personal_rating(i64::from(r)))
            .transpose()?;

        let updated = self.conn.execute(
            "UPDATE watched_episodes SET personal_rating = ?1
             WHERE anime_id = ?2 AND episode_number = ?3",
            params![rating, anime_id, episode],
        )?;
        if updated == 0 {
            return Err(CollectError::NotFound(format!(
                "episode {episode} of {anime_id} is not watched"
            )));
        }

        let ts = format_timestamp(&timestamp());
        if let Err(e) = self.touch_collection_entry(anime_id, &ts) {
            warn!(anime_id = %anime_id, "Failed to bump modified_at: {e}");
        }
        debug!(anime_id = %anime_id, episode, ?rating, "Rated episode");
        Ok(())
    }

    pub fn is_watched(&self, anime_id: &str, episode: u32) -> Result<bool, CollectError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM watched_episodes WHERE anime_id = ?1 AND episode_number = ?2",
            params![anime_id, episode],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All watched episodes of a title in the requested order.
    pub fn list_watched(
        &self,
        anime_id: &str,
        order: WatchedOrder,
    ) -> Result<Vec<WatchedEpisode>, CollectError> {
        let order_by = match order {
            WatchedOrder::EpisodeNumber => "episode_number ASC",
            WatchedOrder::RecentlyWatched => "watched_at DESC, id DESC",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, anime_id, episode_number, episode_title, watched_at, personal_rating
             FROM watched_episodes WHERE anime_id = ?1 ORDER BY {order_by}"
        ))?;
        let rows = stmt
            .query_map(params![anime_id], |row| {
                let watched_at_str: String = row.get(4)?;
                Ok(WatchedEpisode {
                    id: row.get(0)?,
                    anime_id: row.get(1)?,
                    episode_number: row.get(2)?,
                    episode_title: row.get(3)?,
                    watched_at: parse_datetime(4, &watched_at_str)?,
                    personal_rating: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fresh tally of watched episodes for a title.
    pub fn count_watched(&self, anime_id: &str) -> Result<u32, CollectError> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM watched_episodes WHERE anime_id = ?1",
            params![anime_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
