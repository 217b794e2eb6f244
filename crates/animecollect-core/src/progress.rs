//! Derived watch progress for a single title.
//!
//! Nothing here is persisted: every call re-reads the collection entry and
//! re-counts watched rows, so the answer is always consistent with the
//! current tables.

use serde::Serialize;
use tracing::warn;

use crate::error::CollectError;
use crate::models::{CollectionEntry, CollectionOrder};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub watched: u32,
    /// Zero when the episode total is unknown.
    pub total: u32,
    /// Rounded and capped to 0-100 for display.
    pub percentage: u8,
    /// Raw watched/total ratio. Can exceed 1.0 when a total was revised down.
    pub ratio: f64,
    pub is_complete: bool,
}

impl Progress {
    pub fn from_counts(watched: u32, total: u32) -> Self {
        let ratio = if total > 0 {
            f64::from(watched) / f64::from(total)
        } else {
            0.0
        };
        Self {
            watched,
            total,
            percentage: percentage(u64::from(watched), u64::from(total)),
            ratio,
            is_complete: total > 0 && watched >= total,
        }
    }
}

/// Progress, or the reason it could not be computed. A freshly added title
/// reports `Available` with zero progress, never `Unavailable`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProgressReport {
    Available(Progress),
    Unavailable { reason: String },
}

impl ProgressReport {
    pub fn progress(&self) -> Option<&Progress> {
        match self {
            Self::Available(p) => Some(p),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Rounded percentage capped at 100. Zero when `total` is zero.
pub fn percentage(watched: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (watched as f64 / total as f64 * 100.0).round();
    pct.min(100.0) as u8
}

/// Compute progress for a title.
///
/// The stored episode total wins; when the entry is missing or its total is
/// unknown, `fallback_total` is used. Storage failures become
/// [`ProgressReport::Unavailable`] instead of an error.
pub fn compute_progress(
    storage: &Storage,
    anime_id: &str,
    fallback_total: Option<u32>,
) -> ProgressReport {
    match try_compute_progress(storage, anime_id, fallback_total) {
        Ok(progress) => ProgressReport::Available(progress),
        Err(e) => {
            warn!(anime_id = %anime_id, "Progress unavailable: {e}");
            ProgressReport::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}

pub fn try_compute_progress(
    storage: &Storage,
    anime_id: &str,
    fallback_total: Option<u32>,
) -> Result<Progress, CollectError> {
    let stored_total = storage
        .get_collection_entry(anime_id)?
        .and_then(|entry| entry.known_total());
    let total = stored_total
        .or(fallback_total.filter(|&n| n > 0))
        .unwrap_or(0);
    let watched = storage.count_watched(anime_id)?;
    Ok(Progress::from_counts(watched, total))
}

/// A collection entry with its freshly computed progress.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRow {
    pub entry: CollectionEntry,
    pub progress: Progress,
}

/// Every collection entry paired with its progress, in listing order.
pub fn collection_with_progress(
    storage: &Storage,
    order: CollectionOrder,
) -> Result<Vec<CollectionRow>, CollectError> {
    storage
        .list_collection(order)?
        .into_iter()
        .map(|entry| {
            let watched = storage.count_watched(&entry.id)?;
            let progress = Progress::from_counts(watched, entry.known_total().unwrap_or(0));
            Ok(CollectionRow { entry, progress })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCollectionEntry;

    #[test]
    fn test_from_counts() {
        let p = Progress::from_counts(6, 12);
        assert_eq!(p.percentage, 50);
        assert!(!p.is_complete);

        let p = Progress::from_counts(1, 3);
        assert_eq!(p.percentage, 33);

        let p = Progress::from_counts(2, 3);
        assert_eq!(p.percentage, 67);
    }

    #[test]
    fn test_zero_total_guard() {
        let p = Progress::from_counts(5, 0);
        assert_eq!(p.percentage, 0);
        assert_eq!(p.ratio, 0.0);
        assert!(!p.is_complete);
    }

    #[test]
    fn test_overflow_is_capped_but_complete() {
        let p = Progress::from_counts(14, 12);
        assert_eq!(p.percentage, 100);
        assert!(p.ratio > 1.0);
        assert!(p.is_complete);
    }

    #[test]
    fn test_percentage_always_in_range() {
        for total in 0..=30u32 {
            for watched in 0..=40u32 {
                let p = Progress::from_counts(watched, total);
                assert!(p.percentage <= 100);
                if p.is_complete {
                    assert_eq!(p.percentage, 100);
                }
            }
        }
    }

    #[test]
    fn test_twelve_episode_walkthrough() {
        let db = Storage::open_memory().unwrap();
        db.add_to_collection(&NewCollectionEntry::new("anime-42", "Dandadan").with_total_episodes(12))
            .unwrap();

        let initial = compute_progress(&db, "anime-42", None);
        assert_eq!(initial.progress().unwrap().watched, 0);

        for ep in 1..=12u32 {
            db.mark_watched("anime-42", ep, None).unwrap();
            let p = *compute_progress(&db, "anime-42", None).progress().unwrap();
            assert_eq!(p.watched, ep);
            assert_eq!(p.is_complete, ep == 12);
        }

        let done = *compute_progress(&db, "anime-42", None).progress().unwrap();
        assert_eq!(done.percentage, 100);
        assert!(done.is_complete);
    }

    #[test]
    fn test_unknown_total_uses_fallback() {
        let db = Storage::open_memory().unwrap();
        db.add_to_collection(&NewCollectionEntry::new("anime-7", "Ongoing").with_total_episodes(0))
            .unwrap();
        for ep in 1..=4u32 {
            db.mark_watched("anime-7", ep, None).unwrap();
        }

        let p = *compute_progress(&db, "anime-7", None).progress().unwrap();
        assert_eq!(p.percentage, 0);
        assert!(!p.is_complete);
        assert_eq!(p.watched, 4);

        let p = *compute_progress(&db, "anime-7", Some(0)).progress().unwrap();
        assert_eq!(p.percentage, 0);

        let p = *compute_progress(&db, "anime-7", Some(8)).progress().unwrap();
        assert_eq!(p.total, 8);
        assert_eq!(p.percentage, 50);
    }

    #[test]
    fn test_stored_total_beats_fallback() {
        let db = Storage::open_memory().unwrap();
        db.add_to_collection(&NewCollectionEntry::new("anime-1", "Known").with_total_episodes(10))
            .unwrap();
        let p = *compute_progress(&db, "anime-1", Some(99)).progress().unwrap();
        assert_eq!(p.total, 10);
    }

    #[test]
    fn test_missing_entry_is_zero_not_unavailable() {
        let db = Storage::open_memory().unwrap();
        let report = compute_progress(&db, "not-added", Some(24));
        let p = report.progress().copied().unwrap();
        assert_eq!(p.watched, 0);
        assert_eq!(p.total, 24);
    }

    #[test]
    fn test_storage_failure_is_unavailable() {
        let db = Storage::open_memory().unwrap();
        db.conn_for_tests()
            .execute_batch("DROP TABLE watched_episodes;")
            .unwrap();
        let report = compute_progress(&db, "anime-1", None);
        assert!(matches!(report, ProgressReport::Unavailable { .. }));
    }

    #[test]
    fn test_collection_with_progress() {
        let db = Storage::open_memory().unwrap();
        db.add_to_collection(&NewCollectionEntry::new("a-1", "One").with_total_episodes(2))
            .unwrap();
        db.add_to_collection(&NewCollectionEntry::new("a-2", "Two"))
            .unwrap();
        db.mark_watched("a-1", 1, None).unwrap();

        let rows = collection_with_progress(&db, CollectionOrder::RecentlyAdded).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry.id, "a-2");
        assert_eq!(rows[0].progress.total, 0);
        assert_eq!(rows[1].progress.percentage, 50);
    }
}
