use thiserror::Error;

/// Input that fails a format or range rule. Raised before any write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid catalog id {0:?}: expected 1-100 letters, digits or hyphens")]
    CatalogId(String),

    #[error("title must be 1-200 characters")]
    Title,

    #[error("synopsis exceeds {max} characters")]
    SynopsisTooLong { max: usize },

    #[error("poster url {0:?} is not an approved https image host")]
    PosterUrl(String),

    #[error("api rating {0} is outside 0-100")]
    ApiRating(f64),

    #[error("episode count {0} is outside 0-{max}", max = crate::validate::MAX_EPISODE)]
    EpisodeCount(i64),

    #[error("episode number {0} is outside 1-{max}", max = crate::validate::MAX_EPISODE)]
    EpisodeNumber(i64),

    #[error("personal rating {0} is outside 1-10")]
    PersonalRating(i64),

    #[error("watchlist priority {0} is not 1, 2 or 3")]
    Priority(i64),

    #[error("search query must be 1-100 characters")]
    SearchQuery,
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("catalog unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectError {
    /// True for failures of the persistence engine itself.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::StorageUnavailable(_))
    }
}
