use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A title the user tracks, keyed by its catalog id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub synopsis: Option<String>,
    pub poster_url: Option<String>,
    /// Catalog rating on its native 0-100 scale.
    pub api_rating: Option<f64>,
    /// Catalog lifecycle state, e.g. "current", "finished", "upcoming".
    pub status: Option<String>,
    pub total_episode_count: Option<u32>,
    pub added_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl CollectionEntry {
    /// Known episode total, treating zero as unknown.
    pub fn known_total(&self) -> Option<u32> {
        self.total_episode_count.filter(|&n| n > 0)
    }
}

/// Metadata supplied when adding a title to the collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCollectionEntry {
    pub id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub synopsis: Option<String>,
    pub poster_url: Option<String>,
    pub api_rating: Option<f64>,
    pub status: Option<String>,
    pub total_episode_count: Option<u32>,
}

impl NewCollectionEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_total_episodes(mut self, total: u32) -> Self {
        self.total_episode_count = Some(total);
        self
    }
}

/// Read-time ordering for collection listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionOrder {
    /// Most recently added first.
    #[default]
    RecentlyAdded,
    /// Most recently touched by a watch-state change first.
    RecentlyModified,
}
