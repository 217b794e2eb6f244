use thiserror::Error;

/// Errors from a catalog provider.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("catalog request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid catalog configuration: {0}")]
    Config(String),

    #[error("not found in catalog: {0}")]
    NotFound(String),
}

impl CatalogError {
    /// Whether the caller should fall back to local data.
    ///
    /// Only a definite "no such title" answer is not an outage.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}
