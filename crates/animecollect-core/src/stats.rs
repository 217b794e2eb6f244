use serde::Serialize;

use crate::error::CollectError;
use crate::models::CollectionOrder;
use crate::progress::percentage;
use crate::storage::Storage;

/// Roll-up across the whole collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub collection_size: u32,
    pub watchlist_size: u32,
    pub total_watched: u64,
    /// Sum of known episode totals; titles with unknown totals add zero.
    pub total_available: u64,
    pub percentage: u8,
}

/// Walk every collection entry and sum watched and available episodes.
/// Linear in collection size.
pub fn compute_overall_stats(storage: &Storage) -> Result<OverallStats, CollectError> {
    let collection = storage.list_collection(CollectionOrder::RecentlyAdded)?;
    let watchlist_size = storage.count_watchlist()?;

    let mut total_watched = 0u64;
    let mut total_available = 0u64;
    for entry in &collection {
        total_watched += u64::from(storage.count_watched(&entry.id)?);
        total_available += u64::from(entry.total_episode_count.unwrap_or(0));
    }

    Ok(OverallStats {
        collection_size: collection.len() as u32,
        watchlist_size,
        total_watched,
        total_available,
        percentage: percentage(total_watched, total_available),
    })
}
