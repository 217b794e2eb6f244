use std::collections::HashMap;

use serde::Deserialize;

use crate::traits::{CatalogAnime, CatalogEpisode};

// ── JSON:API response types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JsonApiListResponse {
    pub data: Vec<JsonApiResource>,
    pub included: Option<Vec<JsonApiResource>>,
    pub links: Option<Links>,
}

#[derive(Debug, Deserialize)]
pub struct JsonApiSingleResourceResponse {
    pub data: JsonApiResource,
    pub included: Option<Vec<JsonApiResource>>,
}

#[derive(Debug, Deserialize)]
pub struct JsonApiResource {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub attributes: serde_json::Value,
    pub relationships: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Links {
    pub next: Option<String>,
}

// ── Kitsu-specific types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KitsuAnimeAttributes {
    pub canonical_title: Option<String>,
    pub titles: Option<KitsuTitles>,
    pub episode_count: Option<u32>,
    pub poster_image: Option<KitsuImage>,
    pub average_rating: Option<KitsuRating>,
    pub synopsis: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KitsuTitles {
    pub en: Option<String>,
    pub en_jp: Option<String>,
    pub ja_jp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KitsuImage {
    pub tiny: Option<String>,
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub original: Option<String>,
}

/// Kitsu sends `averageRating` as a decimal string; older payloads use a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KitsuRating {
    Text(String),
    Number(f64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KitsuEpisodeAttributes {
    pub canonical_title: Option<String>,
    pub titles: Option<KitsuTitles>,
    pub synopsis: Option<String>,
    pub number: Option<u32>,
    pub length: Option<u32>,
    pub airdate: Option<String>,
    pub thumbnail: Option<KitsuImage>,
}

#[derive(Debug, Deserialize)]
pub struct KitsuCategoryAttributes {
    pub title: String,
}

// ── Conversions ──────────────────────────────────────────────────

/// Map Kitsu lifecycle values onto the status words the collection stores.
fn map_kitsu_status(s: &str) -> String {
    match s {
        "current" => "airing".to_string(),
        "finished" => "finished".to_string(),
        "upcoming" | "unreleased" | "tba" => "upcoming".to_string(),
        other => other.to_lowercase(),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl KitsuRating {
    /// The rating on a 0-100 scale, or `None` when it is not a usable number.
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Number(n) => *n,
        };
        (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
    }
}

impl KitsuImage {
    /// Prefer the medium rendition, then whatever else exists.
    pub fn best_url(self) -> Option<String> {
        self.medium
            .or(self.large)
            .or(self.small)
            .or(self.original)
            .or(self.tiny)
    }
}

impl KitsuTitles {
    /// English, then romanised, then the canonical title, then Japanese.
    fn best(&self, canonical: Option<&str>) -> Option<String> {
        non_empty(self.en.clone())
            .or_else(|| non_empty(self.en_jp.clone()))
            .or_else(|| non_empty(canonical.map(str::to_string)))
            .or_else(|| non_empty(self.ja_jp.clone()))
    }
}

impl KitsuAnimeAttributes {
    /// `None` when the resource carries no usable title at all.
    pub fn into_catalog_anime(self, id: String, categories: Vec<String>) -> Option<CatalogAnime> {
        let title = match &self.titles {
            Some(titles) => titles.best(self.canonical_title.as_deref()),
            None => non_empty(self.canonical_title.clone()),
        }?;
        let original_title = self
            .titles
            .and_then(|t| non_empty(t.ja_jp))
            .filter(|t| *t != title);

        Some(CatalogAnime {
            id,
            title,
            original_title,
            synopsis: non_empty(self.synopsis),
            rating: self.average_rating.as_ref().and_then(KitsuRating::value),
            episode_count: self.episode_count,
            status: self.status.as_deref().map(map_kitsu_status),
            poster_url: self.poster_image.and_then(KitsuImage::best_url),
            categories,
        })
    }
}

impl KitsuEpisodeAttributes {
    /// Episodes without a number (recaps, specials) are skipped.
    pub fn into_catalog_episode(self) -> Option<CatalogEpisode> {
        let number = self.number.filter(|n| *n > 0)?;
        let title = match &self.titles {
            Some(titles) => titles.best(self.canonical_title.as_deref()),
            None => non_empty(self.canonical_title.clone()),
        };
        Some(CatalogEpisode {
            number,
            title,
            synopsis: non_empty(self.synopsis),
            air_date: non_empty(self.airdate),
            duration_minutes: self.length,
            thumbnail_url: self.thumbnail.and_then(KitsuImage::best_url),
        })
    }
}

// ── Included categories ─────────────────────────────────────────

/// Category titles from a compound document, keyed by category id.
pub fn category_titles(included: Option<&[JsonApiResource]>) -> HashMap<String, String> {
    included
        .unwrap_or_default()
        .iter()
        .filter(|r| r.type_ == "categories")
        .filter_map(|r| {
            let attrs: KitsuCategoryAttributes =
                serde_json::from_value(r.attributes.clone()).ok()?;
            Some((r.id.clone(), attrs.title))
        })
        .collect()
}

/// Resolve an anime's `relationships.categories.data` against the included titles.
pub fn categories_of(resource: &JsonApiResource, titles: &HashMap<String, String>) -> Vec<String> {
    let Some(linkage) = resource
        .relationships
        .as_ref()
        .and_then(|r| r.get("categories"))
        .and_then(|c| c.get("data"))
        .and_then(|d| d.as_array())
    else {
        return Vec::new();
    };

    let mut out: Vec<String> = linkage
        .iter()
        .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
        .filter_map(|id| titles.get(id).cloned())
        .collect();
    out.sort_by_key(|t| t.to_lowercase());
    out.dedup();
    out
}
