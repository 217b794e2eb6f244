use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of adding a title to the collection or watchlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddOutcome {
    Added,
    /// A row with this id already existed; nothing was written.
    AlreadyPresent,
}

/// Result of a delete that tolerates a missing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

/// Result of marking an episode as watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkOutcome {
    Marked { watched_at: DateTime<Utc> },
    /// The episode was already marked; its original timestamp is kept.
    AlreadyWatched,
}

/// Result of clearing a watched mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnmarkOutcome {
    Unmarked,
    NotWatched,
}

impl AddOutcome {
    pub fn is_noop(self) -> bool {
        self == Self::AlreadyPresent
    }
}

impl RemoveOutcome {
    pub fn is_noop(self) -> bool {
        self == Self::NotPresent
    }
}

impl MarkOutcome {
    pub fn is_noop(self) -> bool {
        self == Self::AlreadyWatched
    }
}

impl UnmarkOutcome {
    pub fn is_noop(self) -> bool {
        self == Self::NotWatched
    }
}
