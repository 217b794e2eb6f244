mod catalog;
mod db;
mod events;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use animecollect_catalog::{
    CatalogAnime, CatalogCategory, CatalogEpisode, CatalogError, CatalogProvider,
};
use animecollect_core::config::{AppConfig, CatalogConfig};
use animecollect_core::error::CollectError;
use animecollect_core::models::{
    AddOutcome, CollectionEntry, CollectionOrder, MarkOutcome, NewCollectionEntry,
    NewWatchlistEntry, RemoveOutcome, UnmarkOutcome, WatchedEpisode, WatchedOrder, WatchlistEntry,
};
use animecollect_core::progress::{CollectionRow, ProgressReport};
use animecollect_core::stats::OverallStats;
use animecollect_core::validate;

pub use catalog::{
    entry_from_catalog, CatalogFetch, ConfiguredCatalog, EpisodeGuide, EpisodeSource,
    GuideEpisode,
};
pub use db::DbHandle;
pub use events::{CollectionEvent, EventBus};

/// The operation surface handed to the presentation layer.
///
/// Owns the database handle, the catalog provider and the change
/// notification bus. Opened once at startup and closed at shutdown; reads
/// always go to the database, so there is no in-memory copy to keep in sync.
pub struct Runtime<C = ConfiguredCatalog> {
    db: DbHandle,
    catalog: C,
    timeout: Duration,
    page_limit: usize,
    events: EventBus,
}

impl Runtime<ConfiguredCatalog> {
    /// Open the configured database and catalog.
    pub fn open(config: &AppConfig) -> Result<Self, CollectError> {
        let db_path = config.ensure_db_path()?;
        let db = DbHandle::open(&db_path)?;
        let catalog = ConfiguredCatalog::from_config(&config.catalog)?;
        info!(path = %db_path.display(), "Runtime ready");
        Ok(Self::with_parts(db, catalog, &config.catalog))
    }
}

impl<C: CatalogProvider> Runtime<C> {
    pub fn with_parts(db: DbHandle, catalog: C, settings: &CatalogConfig) -> Self {
        Self {
            db,
            catalog,
            timeout: settings.timeout(),
            page_limit: settings.page_limit.max(1) as usize,
            events: EventBus::default(),
        }
    }

    /// Receive a [`CollectionEvent`] after every write that changed state.
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    pub async fn close(&self) -> Result<(), CollectError> {
        self.db.close().await
    }

    pub async fn is_ready(&self) -> bool {
        self.db.is_ready().await
    }

    pub async fn clear_all(&self) -> Result<(), CollectError> {
        self.db.clear_all().await?;
        self.events.publish(CollectionEvent::Cleared);
        Ok(())
    }

    // ── Collection ──────────────────────────────────────────────

    pub async fn add_to_collection(
        &self,
        entry: NewCollectionEntry,
    ) -> Result<AddOutcome, CollectError> {
        let anime_id = entry.id.clone();
        let outcome = self.db.add_to_collection(entry).await?;
        if outcome == AddOutcome::Added {
            self.events
                .publish(CollectionEvent::CollectionChanged { anime_id });
        }
        Ok(outcome)
    }

    /// Remove a title with its watched episodes and categories.
    pub async fn remove_from_collection(&self, id: &str) -> Result<RemoveOutcome, CollectError> {
        let outcome = self.db.remove_from_collection(id).await?;
        if outcome == RemoveOutcome::Removed {
            self.events.publish(CollectionEvent::CollectionChanged {
                anime_id: id.to_string(),
            });
        }
        Ok(outcome)
    }

    pub async fn is_in_collection(&self, id: &str) -> Result<bool, CollectError> {
        self.db.collection_exists(id).await
    }

    pub async fn get_collection_entry(
        &self,
        id: &str,
    ) -> Result<Option<CollectionEntry>, CollectError> {
        self.db.get_collection_entry(id).await
    }

    pub async fn list_collection(
        &self,
        order: CollectionOrder,
    ) -> Result<Vec<CollectionEntry>, CollectError> {
        self.db.list_collection(order).await
    }

    pub async fn list_collection_with_progress(
        &self,
        order: CollectionOrder,
    ) -> Result<Vec<CollectionRow>, CollectError> {
        self.db.list_collection_with_progress(order).await
    }

    // ── Watch state ─────────────────────────────────────────────

    pub async fn mark_episode_watched(
        &self,
        anime_id: &str,
        episode: u32,
        episode_title: Option<&str>,
    ) -> Result<MarkOutcome, CollectError> {
        let outcome = self
            .db
            .mark_watched(anime_id, episode, episode_title.map(str::to_string))
            .await?;
        if !outcome.is_noop() {
            self.events.publish(CollectionEvent::WatchStateChanged {
                anime_id: anime_id.to_string(),
                episode,
            });
        }
        Ok(outcome)
    }

    pub async fn mark_episode_unwatched(
        &self,
        anime_id: &str,
        episode: u32,
    ) -> Result<UnmarkOutcome, CollectError> {
        let outcome = self.db.mark_unwatched(anime_id, episode).await?;
        if !outcome.is_noop() {
            self.events.publish(CollectionEvent::WatchStateChanged {
                anime_id: anime_id.to_string(),
                episode,
            });
        }
        Ok(outcome)
    }

    pub async fn is_episode_watched(
        &self,
        anime_id: &str,
        episode: u32,
    ) -> Result<bool, CollectError> {
        self.db.is_watched(anime_id, episode).await
    }

    pub async fn list_watched_episodes(
        &self,
        anime_id: &str,
        order: WatchedOrder,
    ) -> Result<Vec<WatchedEpisode>, CollectError> {
        self.db.list_watched(anime_id, order).await
    }

    /// Set or clear the personal rating of a watched episode.
    pub async fn rate_episode(
        &self,
        anime_id: &str,
        episode: u32,
        rating: Option<u8>,
    ) -> Result<(), CollectError> {
        self.db.rate_episode(anime_id, episode, rating).await?;
        self.events.publish(CollectionEvent::WatchStateChanged {
            anime_id: anime_id.to_string(),
            episode,
        });
        Ok(())
    }

    /// Fresh progress for a title. Never fails: a storage problem is
    /// reported as [`ProgressReport::Unavailable`].
    pub async fn get_progress(&self, anime_id: &str, fallback_total: Option<u32>) -> ProgressReport {
        match self.db.compute_progress(anime_id, fallback_total).await {
            Ok(progress) => ProgressReport::Available(progress),
            Err(e) => {
                warn!(anime_id = %anime_id, "Progress unavailable: {e}");
                ProgressReport::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    // ── Watchlist ───────────────────────────────────────────────

    /// Always inserts a row, even when the title is already listed.
    pub async fn add_to_watchlist(&self, entry: NewWatchlistEntry) -> Result<i64, CollectError> {
        let id = self.db.add_to_watchlist(entry).await?;
        self.events.publish(CollectionEvent::WatchlistChanged);
        Ok(id)
    }

    /// Insert unless the title is already listed.
    pub async fn add_to_watchlist_if_absent(
        &self,
        entry: NewWatchlistEntry,
    ) -> Result<AddOutcome, CollectError> {
        let outcome = self.db.add_to_watchlist_if_absent(entry).await?;
        if outcome == AddOutcome::Added {
            self.events.publish(CollectionEvent::WatchlistChanged);
        }
        Ok(outcome)
    }

    /// Remove by watchlist row id.
    pub async fn remove_from_watchlist(&self, id: i64) -> Result<RemoveOutcome, CollectError> {
        let outcome = self.db.remove_from_watchlist(id).await?;
        if outcome == RemoveOutcome::Removed {
            self.events.publish(CollectionEvent::WatchlistChanged);
        }
        Ok(outcome)
    }

    pub async fn is_in_watchlist(&self, anime_id: &str) -> Result<bool, CollectError> {
        self.db.watchlist_contains(anime_id).await
    }

    pub async fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>, CollectError> {
        self.db.list_watchlist().await
    }

    // ── Statistics & categories ─────────────────────────────────

    pub async fn get_overall_statistics(&self) -> Result<OverallStats, CollectError> {
        self.db.overall_stats().await
    }

    pub async fn add_categories(
        &self,
        anime_id: &str,
        categories: Vec<String>,
    ) -> Result<usize, CollectError> {
        let added = self.db.add_categories(anime_id, categories).await?;
        if added > 0 {
            self.events.publish(CollectionEvent::CollectionChanged {
                anime_id: anime_id.to_string(),
            });
        }
        Ok(added)
    }

    pub async fn list_categories(&self, anime_id: &str) -> Result<Vec<String>, CollectError> {
        self.db.list_categories(anime_id).await
    }

    // ── Catalog ─────────────────────────────────────────────────

    /// Run a catalog call under the configured timeout. Dropping the future
    /// on expiry cancels the request.
    async fn fetch<T>(
        &self,
        call: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<T, CatalogError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout),
        }
    }

    pub async fn search_catalog(
        &self,
        query: &str,
    ) -> Result<CatalogFetch<Vec<CatalogAnime>>, CollectError> {
        let query = validate::search_query(query)?;
        Ok(into_fetch(
            "search",
            self.fetch(self.catalog.search_anime(&query)).await,
        ))
    }

    /// `Fresh(None)` when the catalog has no such title.
    pub async fn get_catalog_anime(
        &self,
        id: &str,
    ) -> Result<CatalogFetch<Option<CatalogAnime>>, CollectError> {
        validate::catalog_id(id)?;
        Ok(into_fetch(
            "get_anime",
            self.fetch(self.catalog.get_anime(id)).await,
        ))
    }

    pub async fn list_catalog_episodes(
        &self,
        anime_id: &str,
    ) -> Result<CatalogFetch<Vec<CatalogEpisode>>, CollectError> {
        validate::catalog_id(anime_id)?;
        Ok(into_fetch(
            "list_episodes",
            self.fetch(self.catalog.list_episodes(anime_id)).await,
        ))
    }

    pub async fn currently_airing(&self) -> CatalogFetch<Vec<CatalogAnime>> {
        into_fetch(
            "currently_airing",
            self.fetch(self.catalog.currently_airing()).await,
        )
    }

    pub async fn upcoming(&self) -> CatalogFetch<Vec<CatalogAnime>> {
        into_fetch("upcoming", self.fetch(self.catalog.upcoming()).await)
    }

    pub async fn catalog_categories(&self) -> CatalogFetch<Vec<CatalogCategory>> {
        into_fetch(
            "list_categories",
            self.fetch(self.catalog.list_categories()).await,
        )
    }

    /// Titles in a category. An unknown category is `Fresh(vec![])`.
    pub async fn catalog_by_category(
        &self,
        category_id: &str,
    ) -> Result<CatalogFetch<Vec<CatalogAnime>>, CollectError> {
        validate::catalog_id(category_id)?;
        Ok(into_fetch(
            "anime_by_category",
            self.fetch(self.catalog.anime_by_category(category_id)).await,
        ))
    }

    /// Whether the catalog answers within the timeout.
    pub async fn is_catalog_reachable(&self) -> bool {
        match self.fetch(self.catalog.check_connection()).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Catalog connection check failed");
                false
            }
        }
    }

    /// Airing titles followed by upcoming ones, capped at the page limit.
    ///
    /// Both lists are requested concurrently. One failing list still yields
    /// the other; only when both fail is the result unavailable.
    pub async fn latest(&self) -> CatalogFetch<Vec<CatalogAnime>> {
        let (airing, upcoming) = futures::future::join(
            self.fetch(self.catalog.currently_airing()),
            self.fetch(self.catalog.upcoming()),
        )
        .await;

        match (airing, upcoming) {
            (Err(e), Err(_)) => {
                warn!(error = %e, "Catalog unavailable for latest titles");
                CatalogFetch::unavailable(&e)
            }
            (airing, upcoming) => {
                for err in [airing.as_ref().err(), upcoming.as_ref().err()]
                    .into_iter()
                    .flatten()
                {
                    warn!(error = %err, "Partial latest list");
                }
                let mut titles = airing.unwrap_or_default();
                titles.extend(upcoming.unwrap_or_default());
                titles.truncate(self.page_limit);
                CatalogFetch::Fresh(titles)
            }
        }
    }

    /// Add a title using catalog metadata.
    ///
    /// A title already in the collection is reported as
    /// [`AddOutcome::AlreadyPresent`] without contacting the catalog. When
    /// the catalog is unreachable, `fallback` (metadata the caller already
    /// holds) is stored instead; without one the call fails with
    /// [`CollectError::RemoteUnavailable`].
    pub async fn add_from_catalog(
        &self,
        id: &str,
        fallback: Option<NewCollectionEntry>,
    ) -> Result<AddOutcome, CollectError> {
        validate::catalog_id(id)?;
        if self.db.collection_exists(id).await? {
            debug!(anime_id = %id, "Already in collection, skipping catalog lookup");
            return Ok(AddOutcome::AlreadyPresent);
        }

        let (entry, categories) = match self.fetch(self.catalog.get_anime(id)).await {
            Ok(Some(anime)) => {
                let entry = NewCollectionEntry {
                    id: id.to_string(),
                    ..entry_from_catalog(&anime)
                };
                (entry, anime.categories)
            }
            Ok(None) | Err(CatalogError::NotFound(_)) => {
                return Err(CollectError::NotFound(format!("{id} is not in the catalog")));
            }
            Err(e) => match fallback {
                Some(fallback) => {
                    warn!(anime_id = %id, error = %e, "Catalog unavailable, using caller metadata");
                    let entry = NewCollectionEntry {
                        id: id.to_string(),
                        ..fallback
                    };
                    (entry, Vec::new())
                }
                None => {
                    warn!(anime_id = %id, error = %e, "Catalog unavailable, nothing added");
                    return Err(CollectError::RemoteUnavailable(e.to_string()));
                }
            },
        };

        let outcome = self.add_to_collection(entry).await?;
        if outcome == AddOutcome::Added && !categories.is_empty() {
            if let Err(e) = self.db.add_categories(id, categories).await {
                warn!(anime_id = %id, "Failed to store catalog categories: {e}");
            }
        }
        Ok(outcome)
    }

    /// Episodes of a title with the user's watch state folded in.
    ///
    /// Uses the catalog listing when reachable. Otherwise, for a title in
    /// the collection with a known episode total, returns numbered
    /// placeholders so watch marking keeps working offline.
    pub async fn episode_guide(
        &self,
        anime_id: &str,
    ) -> Result<CatalogFetch<EpisodeGuide>, CollectError> {
        validate::catalog_id(anime_id)?;

        let watched: HashMap<u32, Option<u8>> = self
            .db
            .list_watched(anime_id, WatchedOrder::EpisodeNumber)
            .await?
            .into_iter()
            .map(|w| (w.episode_number, w.personal_rating))
            .collect();

        let guide = match self.fetch(self.catalog.list_episodes(anime_id)).await {
            Ok(episodes) => EpisodeGuide {
                source: EpisodeSource::Remote,
                episodes: episodes.into_iter().map(GuideEpisode::from_catalog).collect(),
            },
            // The catalog answered; it just has no episodes for this id.
            Err(e) if !e.is_unavailable() => {
                debug!(anime_id = %anime_id, error = %e, "Catalog has no episode list");
                EpisodeGuide {
                    source: EpisodeSource::Remote,
                    episodes: Vec::new(),
                }
            }
            Err(e) => {
                let total = self
                    .db
                    .get_collection_entry(anime_id)
                    .await?
                    .and_then(|entry| entry.known_total());
                match total {
                    Some(total) => {
                        info!(anime_id = %anime_id, total, error = %e, "Using placeholder episode list");
                        EpisodeGuide {
                            source: EpisodeSource::LocalPlaceholder,
                            episodes: (1..=total).map(GuideEpisode::placeholder).collect(),
                        }
                    }
                    None => {
                        warn!(anime_id = %anime_id, error = %e, "Episode list unavailable");
                        return Ok(CatalogFetch::unavailable(&e));
                    }
                }
            }
        };

        let episodes = guide
            .episodes
            .into_iter()
            .map(|mut ep| {
                if let Some(rating) = watched.get(&ep.number) {
                    ep.watched = true;
                    ep.personal_rating = *rating;
                }
                ep
            })
            .collect();
        Ok(CatalogFetch::Fresh(EpisodeGuide {
            source: guide.source,
            episodes,
        }))
    }
}

/// Map a catalog result, treating "no such title" as an empty answer.
fn into_fetch<T: Default>(operation: &str, result: Result<T, CatalogError>) -> CatalogFetch<T> {
    match result {
        Ok(value) => CatalogFetch::Fresh(value),
        Err(CatalogError::NotFound(id)) => {
            debug!(operation, anime_id = %id, "Not in catalog");
            CatalogFetch::Fresh(T::default())
        }
        Err(e) => {
            warn!(operation, error = %e, "Catalog unavailable");
            CatalogFetch::unavailable(&e)
        }
    }
}
