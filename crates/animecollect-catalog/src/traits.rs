//! The read-only catalog contract.
//!
//! The collection never writes back to a catalog. Providers hand out title
//! and episode metadata; the runtime decides what to keep.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A source of anime metadata (Kitsu, the offline demo set, or a test fake).
pub trait CatalogProvider: Send + Sync {
    /// Search titles by free text.
    fn search_anime(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CatalogAnime>, CatalogError>> + Send;

    /// Look up one title. `Ok(None)` when the catalog has no such id.
    fn get_anime(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CatalogAnime>, CatalogError>> + Send;

    /// Episodes of a title, ascending by number.
    fn list_episodes(
        &self,
        anime_id: &str,
    ) -> impl Future<Output = Result<Vec<CatalogEpisode>, CatalogError>> + Send;

    /// Titles currently airing, newest first.
    fn currently_airing(&self)
        -> impl Future<Output = Result<Vec<CatalogAnime>, CatalogError>> + Send;

    /// Announced titles, soonest first.
    fn upcoming(&self) -> impl Future<Output = Result<Vec<CatalogAnime>, CatalogError>> + Send;

    /// Browsable categories, alphabetically.
    fn list_categories(
        &self,
    ) -> impl Future<Output = Result<Vec<CatalogCategory>, CatalogError>> + Send;

    /// Titles filed under a category id. `NotFound` for an unknown category.
    fn anime_by_category(
        &self,
        category_id: &str,
    ) -> impl Future<Output = Result<Vec<CatalogAnime>, CatalogError>> + Send;

    /// Cheapest request that proves the catalog answers.
    fn check_connection(&self) -> impl Future<Output = Result<(), CatalogError>> + Send;
}

/// Title metadata as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAnime {
    pub id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub synopsis: Option<String>,
    /// Average rating on the catalog's 0-100 scale.
    pub rating: Option<f64>,
    pub episode_count: Option<u32>,
    pub status: Option<String>,
    pub poster_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// One episode as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEpisode {
    pub number: u32,
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub air_date: Option<String>,
    pub duration_minutes: Option<u32>,
    pub thumbnail_url: Option<String>,
}

/// A catalog genre or theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub id: String,
    pub title: String,
}
