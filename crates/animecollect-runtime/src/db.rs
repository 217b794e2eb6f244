use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use animecollect_core::error::CollectError;
use animecollect_core::models::{
    AddOutcome, CollectionEntry, CollectionOrder, MarkOutcome, NewCollectionEntry,
    NewWatchlistEntry, RemoveOutcome, UnmarkOutcome, WatchedEpisode, WatchedOrder, WatchlistEntry,
};
use animecollect_core::progress::{self, CollectionRow, Progress};
use animecollect_core::stats::{self, OverallStats};
use animecollect_core::storage::Storage;

type Reply<T> = oneshot::Sender<Result<T, CollectError>>;

/// Async handle to the collection database.
///
/// The [`Storage`] lives on a dedicated `db-actor` thread and is only ever
/// touched there; every method sends a command and awaits the reply. Cloning
/// the handle shares the same actor. Commands are applied one at a time in
/// the order they are sent.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

enum DbCommand {
    IsReady {
        reply: oneshot::Sender<bool>,
    },
    ClearAll {
        reply: Reply<()>,
    },
    AddToCollection {
        entry: NewCollectionEntry,
        reply: Reply<AddOutcome>,
    },
    RemoveFromCollection {
        id: String,
        reply: Reply<RemoveOutcome>,
    },
    GetCollectionEntry {
        id: String,
        reply: Reply<Option<CollectionEntry>>,
    },
    CollectionExists {
        id: String,
        reply: Reply<bool>,
    },
    ListCollection {
        order: CollectionOrder,
        reply: Reply<Vec<CollectionEntry>>,
    },
    ListCollectionWithProgress {
        order: CollectionOrder,
        reply: Reply<Vec<CollectionRow>>,
    },
    MarkWatched {
        anime_id: String,
        episode: u32,
        episode_title: Option<String>,
        reply: Reply<MarkOutcome>,
    },
    MarkUnwatched {
        anime_id: String,
        episode: u32,
        reply: Reply<UnmarkOutcome>,
    },
    RateEpisode {
        anime_id: String,
        episode: u32,
        rating: Option<u8>,
        reply: Reply<()>,
    },
    IsWatched {
        anime_id: String,
        episode: u32,
        reply: Reply<bool>,
    },
    ListWatched {
        anime_id: String,
        order: WatchedOrder,
        reply: Reply<Vec<WatchedEpisode>>,
    },
    ComputeProgress {
        anime_id: String,
        fallback_total: Option<u32>,
        reply: Reply<Progress>,
    },
    AddToWatchlist {
        entry: NewWatchlistEntry,
        reply: Reply<i64>,
    },
    AddToWatchlistIfAbsent {
        entry: NewWatchlistEntry,
        reply: Reply<AddOutcome>,
    },
    RemoveFromWatchlist {
        id: i64,
        reply: Reply<RemoveOutcome>,
    },
    WatchlistContains {
        anime_id: String,
        reply: Reply<bool>,
    },
    ListWatchlist {
        reply: Reply<Vec<WatchlistEntry>>,
    },
    OverallStats {
        reply: Reply<OverallStats>,
    },
    AddCategories {
        anime_id: String,
        categories: Vec<String>,
        reply: Reply<usize>,
    },
    ListCategories {
        anime_id: String,
        reply: Reply<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

fn actor_closed() -> CollectError {
    CollectError::StorageUnavailable("DB actor closed".into())
}

impl DbHandle {
    /// Open (or create) the database file and start the actor.
    pub fn open(path: &Path) -> Result<Self, CollectError> {
        let storage = Storage::open(path).inspect_err(|e| {
            tracing::error!(path = %path.display(), "Failed to open database: {e}");
        })?;
        Self::spawn(storage)
    }

    /// Start an actor over an in-memory database.
    pub fn open_memory() -> Result<Self, CollectError> {
        Self::spawn(Storage::open_memory()?)
    }

    fn spawn(storage: Storage) -> Result<Self, CollectError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .inspect_err(|e| tracing::error!("Failed to spawn DB thread: {e}"))?;

        Ok(Self {
            tx,
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }

    /// Stop the actor after it has applied every command already sent.
    ///
    /// The connection is closed before this returns. Later calls on any clone
    /// of the handle fail with [`CollectError::StorageUnavailable`]. Closing
    /// twice is harmless.
    pub async fn close(&self) -> Result<(), CollectError> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(DbCommand::Shutdown { reply }).is_err() {
            return Ok(());
        }
        let _ = rx.await;

        let thread = self.thread.lock().ok().and_then(|mut guard| guard.take());
        if let Some(thread) = thread {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| CollectError::StorageUnavailable(format!("DB actor join: {e}")))?
                .map_err(|_| CollectError::StorageUnavailable("DB actor panicked".into()))?;
        }
        tracing::debug!("Database closed");
        Ok(())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> DbCommand,
    ) -> Result<T, CollectError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(command(reply)).map_err(|_| actor_closed())?;
        rx.await.unwrap_or_else(|_| Err(actor_closed()))
    }

    /// `false` when the probe query fails or the actor is gone.
    pub async fn is_ready(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(DbCommand::IsReady { reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn clear_all(&self) -> Result<(), CollectError> {
        self.request(|reply| DbCommand::ClearAll { reply }).await
    }

    // ── Collection ──────────────────────────────────────────────

    pub async fn add_to_collection(
        &self,
        entry: NewCollectionEntry,
    ) -> Result<AddOutcome, CollectError> {
        self.request(|reply| DbCommand::AddToCollection { entry, reply })
            .await
    }

    pub async fn remove_from_collection(&self, id: &str) -> Result<RemoveOutcome, CollectError> {
        let id = id.to_string();
        self.request(|reply| DbCommand::RemoveFromCollection { id, reply })
            .await
    }

    pub async fn get_collection_entry(
        &self,
        id: &str,
    ) -> Result<Option<CollectionEntry>, CollectError> {
        let id = id.to_string();
        self.request(|reply| DbCommand::GetCollectionEntry { id, reply })
            .await
    }

    pub async fn collection_exists(&self, id: &str) -> Result<bool, CollectError> {
        let id = id.to_string();
        self.request(|reply| DbCommand::CollectionExists { id, reply })
            .await
    }

    pub async fn list_collection(
        &self,
        order: CollectionOrder,
    ) -> Result<Vec<CollectionEntry>, CollectError> {
        self.request(|reply| DbCommand::ListCollection { order, reply })
            .await
    }

    pub async fn list_collection_with_progress(
        &self,
        order: CollectionOrder,
    ) -> Result<Vec<CollectionRow>, CollectError> {
        self.request(|reply| DbCommand::ListCollectionWithProgress { order, reply })
            .await
    }

    // ── Watch state ─────────────────────────────────────────────

    pub async fn mark_watched(
        &self,
        anime_id: &str,
        episode: u32,
        episode_title: Option<String>,
    ) -> Result<MarkOutcome, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::MarkWatched {
            anime_id,
            episode,
            episode_title,
            reply,
        })
        .await
    }

    pub async fn mark_unwatched(
        &self,
        anime_id: &str,
        episode: u32,
    ) -> Result<UnmarkOutcome, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::MarkUnwatched {
            anime_id,
            episode,
            reply,
        })
        .await
    }

    pub async fn rate_episode(
        &self,
        anime_id: &str,
        episode: u32,
        rating: Option<u8>,
    ) -> Result<(), CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::RateEpisode {
            anime_id,
            episode,
            rating,
            reply,
        })
        .await
    }

    pub async fn is_watched(&self, anime_id: &str, episode: u32) -> Result<bool, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::IsWatched {
            anime_id,
            episode,
            reply,
        })
        .await
    }

    pub async fn list_watched(
        &self,
        anime_id: &str,
        order: WatchedOrder,
    ) -> Result<Vec<WatchedEpisode>, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::ListWatched {
            anime_id,
            order,
            reply,
        })
        .await
    }

    pub async fn compute_progress(
        &self,
        anime_id: &str,
        fallback_total: Option<u32>,
    ) -> Result<Progress, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::ComputeProgress {
            anime_id,
            fallback_total,
            reply,
        })
        .await
    }

    // ── Watchlist ───────────────────────────────────────────────

    pub async fn add_to_watchlist(&self, entry: NewWatchlistEntry) -> Result<i64, CollectError> {
        self.request(|reply| DbCommand::AddToWatchlist { entry, reply })
            .await
    }

    /// Check and insert in one actor turn, so no other command interleaves.
    pub async fn add_to_watchlist_if_absent(
        &self,
        entry: NewWatchlistEntry,
    ) -> Result<AddOutcome, CollectError> {
        self.request(|reply| DbCommand::AddToWatchlistIfAbsent { entry, reply })
            .await
    }

    pub async fn remove_from_watchlist(&self, id: i64) -> Result<RemoveOutcome, CollectError> {
        self.request(|reply| DbCommand::RemoveFromWatchlist { id, reply })
            .await
    }

    pub async fn watchlist_contains(&self, anime_id: &str) -> Result<bool, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::WatchlistContains { anime_id, reply })
            .await
    }

    pub async fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>, CollectError> {
        self.request(|reply| DbCommand::ListWatchlist { reply }).await
    }

    // ── Stats & categories ──────────────────────────────────────

    pub async fn overall_stats(&self) -> Result<OverallStats, CollectError> {
        self.request(|reply| DbCommand::OverallStats { reply }).await
    }

    pub async fn add_categories(
        &self,
        anime_id: &str,
        categories: Vec<String>,
    ) -> Result<usize, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::AddCategories {
            anime_id,
            categories,
            reply,
        })
        .await
    }

    pub async fn list_categories(&self, anime_id: &str) -> Result<Vec<String>, CollectError> {
        let anime_id = anime_id.to_string();
        self.request(|reply| DbCommand::ListCategories { anime_id, reply })
            .await
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    let mut shutdown_reply = None;

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::IsReady { reply } => {
                let _ = reply.send(storage.is_ready());
            }
            DbCommand::ClearAll { reply } => {
                let _ = reply.send(storage.clear_all());
            }
            DbCommand::AddToCollection { entry, reply } => {
                let _ = reply.send(storage.add_to_collection(&entry));
            }
            DbCommand::RemoveFromCollection { id, reply } => {
                let _ = reply.send(storage.remove_from_collection(&id));
            }
            DbCommand::GetCollectionEntry { id, reply } => {
                let _ = reply.send(storage.get_collection_entry(&id));
            }
            DbCommand::CollectionExists { id, reply } => {
                let _ = reply.send(storage.collection_exists(&id));
            }
            DbCommand::ListCollection { order, reply } => {
                let _ = reply.send(storage.list_collection(order));
            }
            DbCommand::ListCollectionWithProgress { order, reply } => {
                let _ = reply.send(progress::collection_with_progress(&storage, order));
            }
            DbCommand::MarkWatched {
                anime_id,
                episode,
                episode_title,
                reply,
            } => {
                let _ = reply.send(storage.mark_watched(
                    &anime_id,
                    episode,
                    episode_title.as_deref(),
                ));
            }
            DbCommand::MarkUnwatched {
                anime_id,
                episode,
                reply,
            } => {
                let _ = reply.send(storage.mark_unwatched(&anime_id, episode));
            }
            DbCommand::RateEpisode {
                anime_id,
                episode,
                rating,
                reply,
            } => {
                let _ = reply.send(storage.rate_episode(&anime_id, episode, rating));
            }
            DbCommand::IsWatched {
                anime_id,
                episode,
                reply,
            } => {
                let _ = reply.send(storage.is_watched(&anime_id, episode));
            }
            DbCommand::ListWatched {
                anime_id,
                order,
                reply,
            } => {
                let _ = reply.send(storage.list_watched(&anime_id, order));
            }
            DbCommand::ComputeProgress {
                anime_id,
                fallback_total,
                reply,
            } => {
                let _ = reply.send(progress::try_compute_progress(
                    &storage,
                    &anime_id,
                    fallback_total,
                ));
            }
            DbCommand::AddToWatchlist { entry, reply } => {
                let _ = reply.send(storage.add_to_watchlist(&entry));
            }
            DbCommand::AddToWatchlistIfAbsent { entry, reply } => {
                let result = match storage.watchlist_contains(&entry.anime_id) {
                    Ok(true) => Ok(AddOutcome::AlreadyPresent),
                    Ok(false) => storage
                        .add_to_watchlist(&entry)
                        .map(|_| AddOutcome::Added),
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            DbCommand::RemoveFromWatchlist { id, reply } => {
                let _ = reply.send(storage.remove_from_watchlist(id));
            }
            DbCommand::WatchlistContains { anime_id, reply } => {
                let _ = reply.send(storage.watchlist_contains(&anime_id));
            }
            DbCommand::ListWatchlist { reply } => {
                let _ = reply.send(storage.list_watchlist());
            }
            DbCommand::OverallStats { reply } => {
                let _ = reply.send(stats::compute_overall_stats(&storage));
            }
            DbCommand::AddCategories {
                anime_id,
                categories,
                reply,
            } => {
                let _ = reply.send(storage.add_categories(&anime_id, categories.as_slice()));
            }
            DbCommand::ListCategories { anime_id, reply } => {
                let _ = reply.send(storage.list_categories(&anime_id));
            }
            DbCommand::Shutdown { reply } => {
                shutdown_reply = Some(reply);
                break;
            }
        }
    }

    // Commands still queued are dropped with the receiver; their callers
    // see the actor as closed.
    drop(rx);
    drop(storage);
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_round_trip_through_actor() {
        let db = DbHandle::open_memory().unwrap();
        assert!(db.is_ready().await);

        let outcome = db
            .add_to_collection(NewCollectionEntry::new("anime-1", "Frieren").with_total_episodes(4))
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert!(db.collection_exists("anime-1").await.unwrap());

        db.mark_watched("anime-1", 1, None).await.unwrap();
        let progress = db.compute_progress("anime-1", None).await.unwrap();
        assert_eq!(progress.watched, 1);
        assert_eq!(progress.percentage, 25);
    }

    #[tokio::test]
    async fn test_clones_share_one_actor() {
        let db = DbHandle::open_memory().unwrap();
        let other = db.clone();
        db.add_to_collection(NewCollectionEntry::new("anime-1", "Frieren"))
            .await
            .unwrap();
        assert!(other.collection_exists("anime-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_calls_after_close_are_unavailable() {
        let db = DbHandle::open_memory().unwrap();
        let other = db.clone();
        db.close().await.unwrap();

        assert!(!other.is_ready().await);
        let err = other.list_collection(CollectionOrder::RecentlyAdded).await.unwrap_err();
        assert!(matches!(err, CollectError::StorageUnavailable(_)));

        // Closing again is a no-op.
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_writes_survive_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.db");

        let db = DbHandle::open(&path).unwrap();
        db.add_to_collection(NewCollectionEntry::new("anime-1", "Frieren"))
            .await
            .unwrap();
        db.mark_watched("anime-1", 3, Some("Killing Magic".into()))
            .await
            .unwrap();
        db.close().await.unwrap();

        let reopened = DbHandle::open(&path).unwrap();
        assert!(reopened.collection_exists("anime-1").await.unwrap());
        let watched = reopened
            .list_watched("anime-1", WatchedOrder::EpisodeNumber)
            .await
            .unwrap();
        assert_eq!(watched[0].episode_title.as_deref(), Some("Killing Magic"));
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_if_absent_is_checked_in_one_turn() {
        let db = DbHandle::open_memory().unwrap();
        let entry = NewWatchlistEntry::new("anime-2", "Dandadan");
        assert_eq!(
            db.add_to_watchlist_if_absent(entry.clone()).await.unwrap(),
            AddOutcome::Added
        );
        assert_eq!(
            db.add_to_watchlist_if_absent(entry).await.unwrap(),
            AddOutcome::AlreadyPresent
        );
        assert_eq!(db.list_watchlist().await.unwrap().len(), 1);
    }
}
