//! Catalog-facing types: the provider chosen by configuration, the
//! fetch result that separates "no data" from "catalog unreachable", and the
//! mapping from catalog metadata to a collection entry.

use serde::Serialize;

use animecollect_catalog::{
    CatalogAnime, CatalogCategory, CatalogEpisode, CatalogError, CatalogProvider, DemoCatalog,
    KitsuCatalog,
};
use animecollect_core::config::CatalogConfig;
use animecollect_core::error::CollectError;
use animecollect_core::models::NewCollectionEntry;
use animecollect_core::validate;

/// Result of a catalog read.
///
/// An empty answer from a reachable catalog is `Fresh(vec![])`. Nothing is
/// ever substituted for an unreachable catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CatalogFetch<T> {
    Fresh(T),
    Unavailable { reason: String },
}

impl<T> CatalogFetch<T> {
    pub fn unavailable(err: &CatalogError) -> Self {
        Self::Unavailable {
            reason: err.to_string(),
        }
    }

    pub fn fresh(self) -> Option<T> {
        match self {
            Self::Fresh(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Where the episodes of an [`EpisodeGuide`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EpisodeSource {
    /// Listed by the catalog.
    Remote,
    /// Numbered `1..=total` from the stored episode total while the catalog
    /// was unreachable. Carries no titles or air dates.
    LocalPlaceholder,
}

/// One episode row with the user's watch state folded in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideEpisode {
    pub number: u32,
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub air_date: Option<String>,
    pub duration_minutes: Option<u32>,
    pub thumbnail_url: Option<String>,
    pub watched: bool,
    pub personal_rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeGuide {
    pub source: EpisodeSource,
    pub episodes: Vec<GuideEpisode>,
}

impl GuideEpisode {
    pub(crate) fn from_catalog(episode: CatalogEpisode) -> Self {
        Self {
            number: episode.number,
            title: episode.title,
            synopsis: episode.synopsis,
            air_date: episode.air_date,
            duration_minutes: episode.duration_minutes,
            thumbnail_url: episode.thumbnail_url,
            watched: false,
            personal_rating: None,
        }
    }

    pub(crate) fn placeholder(number: u32) -> Self {
        Self {
            number,
            title: None,
            synopsis: None,
            air_date: None,
            duration_minutes: None,
            thumbnail_url: None,
            watched: false,
            personal_rating: None,
        }
    }
}

/// Build a collection entry from catalog metadata.
///
/// Catalog text is sanitised and cut to the stored bounds. A poster on a
/// host we do not accept, an out-of-range rating or an absurd episode total
/// is dropped rather than failing the add.
pub fn entry_from_catalog(anime: &CatalogAnime) -> NewCollectionEntry {
    NewCollectionEntry {
        id: anime.id.clone(),
        title: validate::sanitize_truncated(&anime.title, validate::MAX_TITLE_LEN),
        original_title: anime
            .original_title
            .as_deref()
            .map(|t| validate::sanitize_truncated(t, validate::MAX_TITLE_LEN)),
        synopsis: anime
            .synopsis
            .as_deref()
            .map(|s| validate::sanitize_truncated(s, validate::MAX_SYNOPSIS_LEN)),
        poster_url: anime
            .poster_url
            .clone()
            .filter(|url| validate::poster_url(url).is_ok()),
        api_rating: anime.rating.filter(|r| validate::api_rating(*r).is_ok()),
        status: anime.status.clone(),
        total_episode_count: anime
            .episode_count
            .filter(|n| validate::episode_count(i64::from(*n)).is_ok()),
    }
}

/// The provider selected by `catalog.offline_demo`.
pub enum ConfiguredCatalog {
    Kitsu(KitsuCatalog),
    Demo(DemoCatalog),
}

impl ConfiguredCatalog {
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CollectError> {
        if config.offline_demo {
            tracing::info!("Using the offline demo catalog");
            return Ok(Self::Demo(DemoCatalog::new()));
        }
        KitsuCatalog::new(&config.base_url, config.timeout(), config.page_limit)
            .map(Self::Kitsu)
            .map_err(|e| CollectError::Config(e.to_string()))
    }
}

impl CatalogProvider for ConfiguredCatalog {
    async fn search_anime(&self, query: &str) -> Result<Vec<CatalogAnime>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.search_anime(query).await,
            Self::Demo(c) => c.search_anime(query).await,
        }
    }

    async fn get_anime(&self, id: &str) -> Result<Option<CatalogAnime>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.get_anime(id).await,
            Self::Demo(c) => c.get_anime(id).await,
        }
    }

    async fn list_episodes(&self, anime_id: &str) -> Result<Vec<CatalogEpisode>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.list_episodes(anime_id).await,
            Self::Demo(c) => c.list_episodes(anime_id).await,
        }
    }

    async fn currently_airing(&self) -> Result<Vec<CatalogAnime>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.currently_airing().await,
            Self::Demo(c) => c.currently_airing().await,
        }
    }

    async fn upcoming(&self) -> Result<Vec<CatalogAnime>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.upcoming().await,
            Self::Demo(c) => c.upcoming().await,
        }
    }

    async fn list_categories(&self) -> Result<Vec<CatalogCategory>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.list_categories().await,
            Self::Demo(c) => c.list_categories().await,
        }
    }

    async fn anime_by_category(&self, category_id: &str) -> Result<Vec<CatalogAnime>, CatalogError> {
        match self {
            Self::Kitsu(c) => c.anime_by_category(category_id).await,
            Self::Demo(c) => c.anime_by_category(category_id).await,
        }
    }

    async fn check_connection(&self) -> Result<(), CatalogError> {
        match self {
            Self::Kitsu(c) => c.check_connection().await,
            Self::Demo(c) => c.check_connection().await,
        }
    }
}
