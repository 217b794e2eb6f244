use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record that one episode of one title has been seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedEpisode {
    pub id: i64,
    pub anime_id: String,
    pub episode_number: u32,
    pub episode_title: Option<String>,
    pub watched_at: DateTime<Utc>,
    pub personal_rating: Option<u8>,
}

/// Read-time ordering for watched episodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchedOrder {
    /// Ascending episode number, for a compact "viewed set".
    #[default]
    EpisodeNumber,
    /// Most recently watched first.
    RecentlyWatched,
}
