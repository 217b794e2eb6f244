use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::types::{
    categories_of, category_titles, JsonApiListResponse, JsonApiSingleResourceResponse,
    KitsuAnimeAttributes, KitsuCategoryAttributes, KitsuEpisodeAttributes,
};
use crate::error::CatalogError;
use crate::traits::{CatalogAnime, CatalogCategory, CatalogEpisode, CatalogProvider};

pub const DEFAULT_BASE_URL: &str = "https://kitsu.io/api/edge";

/// Kitsu serves at most 20 resources per page.
const MAX_PAGE_LIMIT: u32 = 20;

/// Kitsu allows a larger page for the category index.
const CATEGORY_PAGE_LIMIT: &str = "40";

/// Stop following `links.next` after this many episode pages.
const MAX_EPISODE_PAGES: usize = 50;

const ANIME_FIELDS: &str =
    "canonicalTitle,titles,episodeCount,posterImage,averageRating,synopsis,status,categories";
const EPISODE_FIELDS: &str = "canonicalTitle,titles,synopsis,number,length,airdate,thumbnail";
const JSON_API: &str = "application/vnd.api+json";

/// Read-only Kitsu JSON:API client. Every request is bounded by the client timeout.
pub struct KitsuCatalog {
    http: Client,
    base_url: Url,
    page_limit: u32,
}

impl KitsuCatalog {
    pub fn new(base_url: &str, timeout: Duration, page_limit: u32) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CatalogError::Config(format!("{base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "https" | "http") || base_url.cannot_be_a_base() {
            return Err(CatalogError::Config(format!(
                "{base_url}: expected an http(s) base url"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("animecollect/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            page_limit: page_limit.clamp(1, MAX_PAGE_LIMIT),
        })
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::Config(format!("{}: not a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(CatalogError::Api {
                status,
                message: body,
            })
        }
    }

    /// `GET /anime` with the given filter/sort, categories included.
    async fn list_anime(&self, params: &[(&str, &str)]) -> Result<Vec<CatalogAnime>, CatalogError> {
        self.list_anime_at(&["anime"], params).await
    }

    /// List anime from any collection endpoint. A 404 means the parent
    /// resource (for example a category) does not exist.
    async fn list_anime_at(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> Result<Vec<CatalogAnime>, CatalogError> {
        let url = self.endpoint(segments)?;
        let limit = self.page_limit.to_string();
        let resp = self
            .http
            .get(url)
            .header("Accept", JSON_API)
            .query(params)
            .query(&[
                ("page[limit]", limit.as_str()),
                ("include", "categories"),
                ("fields[anime]", ANIME_FIELDS),
                ("fields[categories]", "title"),
            ])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(segments.join("/")));
        }
        let resp = Self::check_response(resp).await?;
        let body: JsonApiListResponse = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        let titles = category_titles(body.included.as_deref());
        Ok(body
            .data
            .into_iter()
            .filter_map(|r| {
                let categories = categories_of(&r, &titles);
                let attrs: KitsuAnimeAttributes = match serde_json::from_value(r.attributes) {
                    Ok(attrs) => attrs,
                    Err(e) => {
                        warn!(anime_id = %r.id, error = %e, "Skipping unreadable catalog entry");
                        return None;
                    }
                };
                attrs.into_catalog_anime(r.id, categories)
            })
            .collect())
    }
}

impl CatalogProvider for KitsuCatalog {
    async fn search_anime(&self, query: &str) -> Result<Vec<CatalogAnime>, CatalogError> {
        debug!(query, "Searching catalog");
        self.list_anime(&[("filter[text]", query)]).await
    }

    async fn get_anime(&self, id: &str) -> Result<Option<CatalogAnime>, CatalogError> {
        let url = self.endpoint(&["anime", id])?;
        let resp = self
            .http
            .get(url)
            .header("Accept", JSON_API)
            .query(&[
                ("include", "categories"),
                ("fields[anime]", ANIME_FIELDS),
                ("fields[categories]", "title"),
            ])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(anime_id = %id, "Not in catalog");
            return Ok(None);
        }
        let resp = Self::check_response(resp).await?;
        let body: JsonApiSingleResourceResponse = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        let titles = category_titles(body.included.as_deref());
        let categories = categories_of(&body.data, &titles);
        let attrs: KitsuAnimeAttributes = serde_json::from_value(body.data.attributes)
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        attrs
            .into_catalog_anime(body.data.id, categories)
            .map(Some)
            .ok_or_else(|| CatalogError::Parse(format!("anime {id} has no title")))
    }

    async fn list_episodes(&self, anime_id: &str) -> Result<Vec<CatalogEpisode>, CatalogError> {
        let first = self.endpoint(&["anime", anime_id, "episodes"])?;
        let mut request = self.http.get(first).query(&[
            ("sort", "number"),
            ("page[limit]", "20"),
            ("fields[episodes]", EPISODE_FIELDS),
        ]);

        let mut episodes = Vec::new();
        for page in 1..=MAX_EPISODE_PAGES {
            let resp = request.header("Accept", JSON_API).send().await?;
            if resp.status() == StatusCode::NOT_FOUND {
                return Err(CatalogError::NotFound(anime_id.to_string()));
            }
            let resp = Self::check_response(resp).await?;
            let body: JsonApiListResponse = resp
                .json()
                .await
                .map_err(|e| CatalogError::Parse(e.to_string()))?;

            episodes.extend(
                body.data
                    .into_iter()
                    .filter_map(|r| serde_json::from_value::<KitsuEpisodeAttributes>(r.attributes).ok())
                    .filter_map(KitsuEpisodeAttributes::into_catalog_episode),
            );

            match body.links.and_then(|l| l.next) {
                Some(next_url) => request = self.http.get(next_url),
                None => break,
            }
            if page == MAX_EPISODE_PAGES {
                warn!(anime_id = %anime_id, pages = page, "Episode list truncated");
            }
        }

        episodes.sort_by_key(|e| e.number);
        episodes.dedup_by_key(|e| e.number);
        debug!(anime_id = %anime_id, count = episodes.len(), "Fetched episode list");
        Ok(episodes)
    }

    async fn currently_airing(&self) -> Result<Vec<CatalogAnime>, CatalogError> {
        self.list_anime(&[("filter[status]", "current"), ("sort", "-startDate")])
            .await
    }

    async fn upcoming(&self) -> Result<Vec<CatalogAnime>, CatalogError> {
        self.list_anime(&[("filter[status]", "upcoming"), ("sort", "startDate")])
            .await
    }

    async fn list_categories(&self) -> Result<Vec<CatalogCategory>, CatalogError> {
        let url = self.endpoint(&["categories"])?;
        let resp = self
            .http
            .get(url)
            .header("Accept", JSON_API)
            .query(&[
                ("page[limit]", CATEGORY_PAGE_LIMIT),
                ("sort", "title"),
                ("fields[categories]", "title"),
            ])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let body: JsonApiListResponse = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(body
            .data
            .into_iter()
            .filter_map(|r| {
                let attrs: KitsuCategoryAttributes = serde_json::from_value(r.attributes).ok()?;
                Some(CatalogCategory {
                    id: r.id,
                    title: attrs.title,
                })
            })
            .collect())
    }

    async fn anime_by_category(&self, category_id: &str) -> Result<Vec<CatalogAnime>, CatalogError> {
        debug!(category_id, "Listing category");
        self.list_anime_at(&["categories", category_id, "anime"], &[])
            .await
    }

    async fn check_connection(&self) -> Result<(), CatalogError> {
        let url = self.endpoint(&["anime"])?;
        let resp = self
            .http
            .get(url)
            .header("Accept", JSON_API)
            .query(&[("page[limit]", "1"), ("fields[anime]", "canonicalTitle")])
            .send()
            .await?;
        Self::check_response(resp).await?;
        Ok(())
    }
}
