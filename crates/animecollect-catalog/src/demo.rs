//! A fixed, in-process catalog for offline development.
//!
//! Only selected when the user opts in with `catalog.offline_demo`. A real
//! catalog outage never falls back to these titles.

use std::collections::BTreeSet;

use crate::error::CatalogError;
use crate::traits::{CatalogAnime, CatalogCategory, CatalogEpisode, CatalogProvider};

struct DemoTitle {
    id: &'static str,
    title: &'static str,
    original_title: &'static str,
    synopsis: &'static str,
    rating: f64,
    episodes: Option<u32>,
    status: &'static str,
    categories: &'static [&'static str],
}

const DEMO_TITLES: &[DemoTitle] = &[
    DemoTitle {
        id: "demo-frieren",
        title: "Frieren: Beyond Journey's End",
        original_title: "葬送のフリーレン",
        synopsis: "An elf mage outlives the party that defeated the Demon King and sets out to understand them.",
        rating: 88.5,
        episodes: Some(28),
        status: "finished",
        categories: &["Adventure", "Fantasy"],
    },
    DemoTitle {
        id: "demo-dandadan",
        title: "Dan Da Dan",
        original_title: "ダンダダン",
        synopsis: "A believer in ghosts and a believer in aliens discover both are real.",
        rating: 84.1,
        episodes: Some(12),
        status: "airing",
        categories: &["Comedy", "Supernatural"],
    },
    DemoTitle {
        id: "demo-apothecary",
        title: "The Apothecary Diaries",
        original_title: "薬屋のひとりごと",
        synopsis: "A palace maid with a pharmacist's training solves mysteries at court.",
        rating: 85.3,
        episodes: Some(24),
        status: "finished",
        categories: &["Drama", "Mystery"],
    },
    DemoTitle {
        id: "demo-untitled-sequel",
        title: "Untitled Sequel Project",
        original_title: "続編",
        synopsis: "An announced sequel with no episode count yet.",
        rating: 0.0,
        episodes: None,
        status: "upcoming",
        categories: &[],
    },
];

/// Sample titles served without network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoCatalog;

impl DemoCatalog {
    pub fn new() -> Self {
        Self
    }

    fn all(&self) -> impl Iterator<Item = CatalogAnime> {
        DEMO_TITLES.iter().map(DemoTitle::to_catalog_anime)
    }
}

/// Demo category ids are the lowercased titles.
fn category_id(title: &str) -> String {
    title.to_lowercase()
}

impl DemoTitle {
    fn to_catalog_anime(&self) -> CatalogAnime {
        CatalogAnime {
            id: self.id.to_string(),
            title: self.title.to_string(),
            original_title: Some(self.original_title.to_string()),
            synopsis: Some(self.synopsis.to_string()),
            rating: (self.rating > 0.0).then_some(self.rating),
            episode_count: self.episodes,
            status: Some(self.status.to_string()),
            poster_url: Some(format!(
                "https://via.placeholder.com/300x400?text={}",
                self.id
            )),
            categories: self.categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl CatalogProvider for DemoCatalog {
    async fn search_anime(&self, query: &str) -> Result<Vec<CatalogAnime>, CatalogError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .all()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a
                        .original_title
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&needle))
            })
            .collect())
    }

    async fn get_anime(&self, id: &str) -> Result<Option<CatalogAnime>, CatalogError> {
        Ok(self.all().find(|a| a.id == id))
    }

    async fn list_episodes(&self, anime_id: &str) -> Result<Vec<CatalogEpisode>, CatalogError> {
        let anime = self
            .all()
            .find(|a| a.id == anime_id)
            .ok_or_else(|| CatalogError::NotFound(anime_id.to_string()))?;

        Ok((1..=anime.episode_count.unwrap_or(0))
            .map(|number| CatalogEpisode {
                number,
                title: Some(format!("Episode {number}")),
                synopsis: None,
                air_date: None,
                duration_minutes: Some(24),
                thumbnail_url: None,
            })
            .collect())
    }

    async fn currently_airing(&self) -> Result<Vec<CatalogAnime>, CatalogError> {
        Ok(self
            .all()
            .filter(|a| a.status.as_deref() == Some("airing"))
            .collect())
    }

    async fn upcoming(&self) -> Result<Vec<CatalogAnime>, CatalogError> {
        Ok(self
            .all()
            .filter(|a| a.status.as_deref() == Some("upcoming"))
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<CatalogCategory>, CatalogError> {
        let titles: BTreeSet<&str> = DEMO_TITLES
            .iter()
            .flat_map(|t| t.categories.iter().copied())
            .collect();
        Ok(titles
            .into_iter()
            .map(|title| CatalogCategory {
                id: category_id(title),
                title: title.to_string(),
            })
            .collect())
    }

    async fn anime_by_category(&self, wanted: &str) -> Result<Vec<CatalogAnime>, CatalogError> {
        let hits: Vec<CatalogAnime> = self
            .all()
            .filter(|a| a.categories.iter().any(|c| category_id(c) == wanted))
            .collect();
        if hits.is_empty() {
            return Err(CatalogError::NotFound(wanted.to_string()));
        }
        Ok(hits)
    }

    async fn check_connection(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_matches_either_title() {
        let demo = DemoCatalog::new();
        let hits = demo.search_anime("frieren").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "demo-frieren");

        let hits = demo.search_anime("ダンダダン").await.unwrap();
        assert_eq!(hits[0].id, "demo-dandadan");

        assert!(demo.search_anime("  ").await.unwrap().is_empty());
        assert!(demo.search_anime("no such show").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_episodes_follow_episode_count() {
        let demo = DemoCatalog::new();
        let episodes = demo.list_episodes("demo-dandadan").await.unwrap();
        assert_eq!(episodes.len(), 12);
        assert_eq!(episodes[0].number, 1);
        assert_eq!(episodes[11].number, 12);

        assert!(demo
            .list_episodes("demo-untitled-sequel")
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            demo.list_episodes("missing").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lists_by_status() {
        let demo = DemoCatalog::new();
        let airing = demo.currently_airing().await.unwrap();
        assert!(airing.iter().all(|a| a.status.as_deref() == Some("airing")));
        let upcoming = demo.upcoming().await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].rating, None);
        assert!(demo.get_anime("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories() {
        let demo = DemoCatalog::new();
        let categories = demo.list_categories().await.unwrap();
        let titles: Vec<&str> = categories.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Adventure", "Comedy", "Drama", "Fantasy", "Mystery", "Supernatural"]
        );
        assert_eq!(categories[0].id, "adventure");

        let fantasy = demo.anime_by_category("fantasy").await.unwrap();
        assert_eq!(fantasy.len(), 1);
        assert_eq!(fantasy[0].id, "demo-frieren");
        assert!(matches!(
            demo.anime_by_category("mecha").await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(demo.check_connection().await.is_ok());
    }
}
