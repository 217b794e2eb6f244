mod collection;
mod outcome;
mod watch;
mod watchlist;

pub use collection::{CollectionEntry, CollectionOrder, NewCollectionEntry};
pub use outcome::{AddOutcome, MarkOutcome, RemoveOutcome, UnmarkOutcome};
pub use watch::{WatchedEpisode, WatchedOrder};
pub use watchlist::{NewWatchlistEntry, Priority, WatchlistEntry};
