use serde::Serialize;

use animecollect_catalog::{CatalogAnime, CatalogCategory, CatalogProvider};
use animecollect_core::config::AppConfig;
use animecollect_core::error::CollectError;
use animecollect_core::models::{
    CollectionOrder, MarkOutcome, NewCollectionEntry, NewWatchlistEntry, Priority,
};
use animecollect_core::progress::{CollectionRow, Progress, ProgressReport};
use animecollect_runtime::{CatalogFetch, EpisodeSource, Runtime};

use crate::cli::{Commands, WatchlistCommands};

/// Run one command and print its result.
pub async fn run<C: CatalogProvider>(
    rt: &Runtime<C>,
    config: &AppConfig,
    command: Commands,
    json: bool,
) -> Result<(), CollectError> {
    let out = Output { json };

    match command {
        Commands::Add {
            id,
            title,
            episodes,
        } => {
            let fallback = title.map(|title| NewCollectionEntry {
                total_episode_count: episodes,
                ..NewCollectionEntry::new(id.as_str(), title)
            });
            let outcome = rt.add_from_catalog(&id, fallback).await?;
            out.print(&outcome, || format!("{id}: {outcome:?}"))
        }
        Commands::Remove { id } => {
            let outcome = rt.remove_from_collection(&id).await?;
            out.print(&outcome, || format!("{id}: {outcome:?}"))
        }
        Commands::List { recent_activity } => {
            let order = if recent_activity {
                CollectionOrder::RecentlyModified
            } else {
                CollectionOrder::RecentlyAdded
            };
            let rows = rt.list_collection_with_progress(order).await?;
            out.print(&rows, || render_rows(&rows))
        }
        Commands::Watch {
            id,
            episodes,
            title,
        } => {
            let title = if episodes.len() == 1 { title } else { None };
            let mut results = Vec::with_capacity(episodes.len());
            for episode in episodes {
                let outcome = rt
                    .mark_episode_watched(&id, episode, title.as_deref())
                    .await?;
                results.push((episode, outcome));
            }
            out.print(&results, || {
                results
                    .iter()
                    .map(|(ep, outcome)| match outcome {
                        MarkOutcome::Marked { watched_at } => {
                            format!("{id} #{ep}: watched at {}", watched_at.to_rfc3339())
                        }
                        MarkOutcome::AlreadyWatched => format!("{id} #{ep}: already watched"),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Unwatch { id, episode } => {
            let outcome = rt.mark_episode_unwatched(&id, episode).await?;
            out.print(&outcome, || format!("{id} #{episode}: {outcome:?}"))
        }
        Commands::Rate {
            id,
            episode,
            rating,
        } => {
            rt.rate_episode(&id, episode, rating).await?;
            out.print(&rating, || match rating {
                Some(r) => format!("{id} #{episode}: rated {r}/10"),
                None => format!("{id} #{episode}: rating cleared"),
            })
        }
        Commands::Episodes { id } => {
            let guide = rt.episode_guide(&id).await?;
            out.print(&guide, || match &guide {
                CatalogFetch::Fresh(guide) => {
                    let mut lines: Vec<String> = Vec::new();
                    if guide.source == EpisodeSource::LocalPlaceholder {
                        lines.push("(catalog unreachable, showing stored episode count)".into());
                    }
                    lines.extend(guide.episodes.iter().map(|ep| {
                        let mark = if ep.watched { "x" } else { " " };
                        let rating = ep
                            .personal_rating
                            .map(|r| format!("  {r}/10"))
                            .unwrap_or_default();
                        format!(
                            "[{mark}] {:>4}  {}{rating}",
                            ep.number,
                            ep.title.as_deref().unwrap_or("")
                        )
                    }));
                    lines.join("\n")
                }
                CatalogFetch::Unavailable { reason } => format!("Episode list unavailable: {reason}"),
            })
        }
        Commands::Progress { id, total } => {
            let report = rt.get_progress(&id, total).await;
            out.print(&report, || match &report {
                ProgressReport::Available(p) => format!("{id}: {}", render_progress(p)),
                ProgressReport::Unavailable { reason } => {
                    format!("{id}: progress unavailable ({reason})")
                }
            })
        }
        Commands::Watchlist { command } => run_watchlist(rt, command, out).await,
        Commands::Stats => {
            let stats = rt.get_overall_statistics().await?;
            out.print(&stats, || {
                format!(
                    "Collection: {}\nWatchlist:  {}\nEpisodes:   {}/{} ({}%)",
                    stats.collection_size,
                    stats.watchlist_size,
                    stats.total_watched,
                    stats.total_available,
                    stats.percentage
                )
            })
        }
        Commands::Search { query } => {
            let results = rt.search_catalog(&query.join(" ")).await?;
            out.print(&results, || render_titles(&results))
        }
        Commands::Airing { which } => {
            let results = if which.upcoming {
                rt.upcoming().await
            } else if which.latest {
                rt.latest().await
            } else {
                rt.currently_airing().await
            };
            out.print(&results, || render_titles(&results))
        }
        Commands::Tag { id, tags } => {
            if !tags.is_empty() {
                rt.add_categories(&id, tags).await?;
            }
            let tags = rt.list_categories(&id).await?;
            out.print(&tags, || tags.join(", "))
        }
        Commands::Categories { id: Some(id) } => {
            let results = rt.catalog_by_category(&id).await?;
            out.print(&results, || render_titles(&results))
        }
        Commands::Categories { id: None } => {
            let categories = rt.catalog_categories().await;
            out.print(&categories, || render_categories(&categories))
        }
        Commands::Status => {
            let status = Status {
                database_ready: rt.is_ready().await,
                catalog_reachable: rt.is_catalog_reachable().await,
            };
            out.print(&status, || {
                let word = |ok: bool| if ok { "ok" } else { "unavailable" };
                format!(
                    "Database: {}\nCatalog:  {}",
                    word(status.database_ready),
                    word(status.catalog_reachable)
                )
            })
        }
        Commands::Config { save } => {
            let rendered = config.to_toml()?;
            if save {
                let path = config.save()?;
                tracing::info!(path = %path.display(), "Saved configuration");
            }
            out.print(config, || rendered)
        }
    }
}

#[derive(Serialize)]
struct Status {
    database_ready: bool,
    catalog_reachable: bool,
}

async fn run_watchlist<C: CatalogProvider>(
    rt: &Runtime<C>,
    command: WatchlistCommands,
    out: Output,
) -> Result<(), CollectError> {
    match command {
        WatchlistCommands::Add {
            id,
            title,
            priority,
            if_absent,
        } => {
            let priority = Priority::try_from(priority)?;
            let entry = NewWatchlistEntry::new(id.as_str(), title).with_priority(priority);
            if if_absent {
                let outcome = rt.add_to_watchlist_if_absent(entry).await?;
                out.print(&outcome, || format!("{id}: {outcome:?}"))
            } else {
                let row_id = rt.add_to_watchlist(entry).await?;
                out.print(&row_id, || format!("{id}: added as row {row_id}"))
            }
        }
        WatchlistCommands::Remove { row_id } => {
            let outcome = rt.remove_from_watchlist(row_id).await?;
            out.print(&outcome, || format!("row {row_id}: {outcome:?}"))
        }
        WatchlistCommands::List => {
            let entries = rt.list_watchlist().await?;
            out.print(&entries, || {
                entries
                    .iter()
                    .map(|e| format!("{:>5}  [{:<6}] {}  ({})", e.id, e.priority, e.title, e.anime_id))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn print<T: Serialize>(
        self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> Result<(), CollectError> {
        if self.json {
            let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
            println!("{rendered}");
        } else {
            let rendered = text();
            if !rendered.is_empty() {
                println!("{rendered}");
            }
        }
        Ok(())
    }
}

fn render_progress(p: &Progress) -> String {
    let total = if p.total > 0 {
        p.total.to_string()
    } else {
        "?".to_string()
    };
    let done = if p.is_complete { "  complete" } else { "" };
    format!("{}/{total} ({}%){done}", p.watched, p.percentage)
}

fn render_rows(rows: &[CollectionRow]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "{:<12} {:<40} {}",
                row.entry.id,
                row.entry.title,
                render_progress(&row.progress)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_titles(fetch: &CatalogFetch<Vec<CatalogAnime>>) -> String {
    match fetch {
        CatalogFetch::Fresh(titles) if titles.is_empty() => "No results".into(),
        CatalogFetch::Fresh(titles) => titles
            .iter()
            .map(|a| {
                let episodes = a
                    .episode_count
                    .map(|n| format!("{n} ep"))
                    .unwrap_or_else(|| "? ep".into());
                let status = a.status.as_deref().unwrap_or("unknown");
                format!("{:<8} {}  [{status}, {episodes}]", a.id, a.title)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        CatalogFetch::Unavailable { reason } => format!("Catalog unavailable: {reason}"),
    }
}

fn render_categories(fetch: &CatalogFetch<Vec<CatalogCategory>>) -> String {
    match fetch {
        CatalogFetch::Fresh(categories) if categories.is_empty() => "No categories".into(),
        CatalogFetch::Fresh(categories) => categories
            .iter()
            .map(|c| format!("{:<8} {}", c.id, c.title))
            .collect::<Vec<_>>()
            .join("\n"),
        CatalogFetch::Unavailable { reason } => format!("Catalog unavailable: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_progress() {
        assert_eq!(render_progress(&Progress::from_counts(3, 12)), "3/12 (25%)");
        assert_eq!(render_progress(&Progress::from_counts(2, 0)), "2/? (0%)");
        assert_eq!(
            render_progress(&Progress::from_counts(13, 12)),
            "13/12 (100%)  complete"
        );
    }

    #[test]
    fn test_render_titles_states() {
        assert_eq!(render_titles(&CatalogFetch::Fresh(Vec::new())), "No results");
        assert_eq!(
            render_titles(&CatalogFetch::Unavailable {
                reason: "catalog request timed out".into()
            }),
            "Catalog unavailable: catalog request timed out"
        );
    }

    #[test]
    fn test_render_categories() {
        let categories = CatalogFetch::Fresh(vec![CatalogCategory {
            id: "150".into(),
            title: "Fantasy".into(),
        }]);
        assert_eq!(render_categories(&categories), "150      Fantasy");
        assert_eq!(render_categories(&CatalogFetch::Fresh(Vec::new())), "No categories");
    }
}
