use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Track an anime collection and per-episode watch progress.
#[derive(Parser)]
#[command(name = "animecollect")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this database file instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Serve the built-in sample catalog instead of calling Kitsu
    #[arg(long, global = true)]
    pub demo: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a title to the collection using catalog metadata
    Add {
        /// Catalog id
        id: String,
        /// Title to store if the catalog cannot be reached
        #[arg(long)]
        title: Option<String>,
        /// Episode total to store if the catalog cannot be reached
        #[arg(long)]
        episodes: Option<u32>,
    },

    /// Remove a title with its watched episodes and tags
    #[command(alias = "rm")]
    Remove { id: String },

    /// List the collection with progress
    #[command(alias = "ls")]
    List {
        /// Order by latest watch activity instead of date added
        #[arg(long)]
        recent_activity: bool,
    },

    /// Mark episodes as watched
    Watch {
        id: String,
        #[arg(required = true)]
        episodes: Vec<u32>,
        /// Episode title (only with a single episode)
        #[arg(long)]
        title: Option<String>,
    },

    /// Clear a watched mark
    Unwatch { id: String, episode: u32 },

    /// Rate a watched episode 1-10; omit the rating to clear it
    Rate {
        id: String,
        episode: u32,
        rating: Option<u8>,
    },

    /// Show the episode list with watch state
    Episodes { id: String },

    /// Show progress for one title
    Progress {
        id: String,
        /// Total to use when the stored total is unknown
        #[arg(long)]
        total: Option<u32>,
    },

    /// Manage the plan-to-watch list
    Watchlist {
        #[command(subcommand)]
        command: WatchlistCommands,
    },

    /// Collection-wide totals
    Stats,

    /// Search the catalog
    #[command(alias = "s")]
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Titles airing now
    Airing {
        #[command(flatten)]
        which: AiringArgs,
    },

    /// Tag a title, or list its tags when none are given
    Tag { id: String, tags: Vec<String> },

    /// Browse catalog categories, or the titles filed under one
    Categories {
        /// Category id
        id: Option<String>,
    },

    /// Check the database and the catalog connection
    Status,

    /// Print the effective configuration
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args)]
#[group(multiple = false)]
pub struct AiringArgs {
    /// Announced titles instead
    #[arg(long)]
    pub upcoming: bool,
    /// Airing followed by upcoming
    #[arg(long)]
    pub latest: bool,
}

#[derive(Subcommand)]
pub enum WatchlistCommands {
    Add {
        id: String,
        title: String,
        /// 1 (low) to 3 (high)
        #[arg(long, default_value_t = 1)]
        priority: i64,
        /// Skip when the title is already listed
        #[arg(long)]
        if_absent: bool,
    },
    /// Remove by watchlist row id
    Remove { row_id: i64 },
    #[command(alias = "ls")]
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_global_json() {
        let cli = Cli::try_parse_from(["animecollect", "watch", "46474", "1", "2", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Watch { id, episodes, .. } => {
                assert_eq!(id, "46474");
                assert_eq!(episodes, vec![1, 2]);
            }
            _ => panic!("Expected Watch"),
        }
    }

    #[test]
    fn test_parse_categories_with_optional_id() {
        let cli = Cli::try_parse_from(["animecollect", "categories"]).unwrap();
        assert!(matches!(cli.command, Commands::Categories { id: None }));
        let cli = Cli::try_parse_from(["animecollect", "categories", "150"]).unwrap();
        assert!(matches!(cli.command, Commands::Categories { id: Some(ref id) } if id == "150"));
        let cli = Cli::try_parse_from(["animecollect", "config", "--save"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { save: true }));
    }

    #[test]
    fn test_airing_flags_conflict() {
        assert!(Cli::try_parse_from(["animecollect", "airing", "--upcoming", "--latest"]).is_err());
    }
}
