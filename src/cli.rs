use clap::{Parser, Subcommand};
use std::path::PathBuf;
use torrent_cli::site::types::MAX_LIMIT;
use torrent_cli::{Category, SearchQuery, SortField, SortOrder};

#[derive(Parser)]
#[command(name = "torrent-cli")]
#[command(about = "Search 1337x mirrors and hand magnet links to your torrent client")]
#[command(long_about = "
torrent-cli searches 1337x through a pool of mirror sites, failing over between
them when one is down or shows an anti-bot page. Results can be sorted and
filtered, and any result can be handed to the system torrent client or saved
as a .magnet file.

Examples:
  torrent-cli search \"ubuntu 22.04\" --sort-by seeders
  torrent-cli search debian --category apps --limit 50
  torrent-cli trending --category movies --week
  torrent-cli popular tv
  torrent-cli top --category games
  torrent-cli download \"magnet:?xt=urn:btih:...\" --dir ~/torrents
")]
#[command(version)]
pub struct Cli {
    /// Override config file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ignore cached responses (fresh responses are still cached)
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Never show the interactive result picker
    #[arg(long, global = true)]
    pub no_prompt: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search torrents by name
    #[command(visible_alias = "s")]
    Search {
        /// Search text (3 to 100 characters)
        query: String,

        /// Maximum number of results to show
        #[arg(short, long, value_name = "N")]
        #[arg(help = "Maximum number of results (1-100, default from config)")]
        limit: Option<usize>,

        /// Restrict results to one category
        #[arg(short, long, value_enum, value_name = "CATEGORY")]
        category: Option<Category>,

        /// Sort results by a column
        #[arg(short, long, value_enum, value_name = "FIELD")]
        sort_by: Option<SortField>,

        /// Sort direction
        #[arg(short, long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
    },

    /// Open or save a magnet link or torrent page
    #[command(visible_alias = "dl")]
    Download {
        /// Magnet URI, torrent page URL on any mirror, or torrent id
        target: String,

        /// Name for the download (defaults to the torrent's own name)
        #[arg(short, long, value_name = "NAME")]
        name: Option<String>,

        /// Destination directory
        #[arg(short, long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Write a .magnet file instead of opening the torrent client
        #[arg(long)]
        save: bool,
    },

    /// Show trending torrents
    #[command(visible_alias = "t")]
    Trending {
        #[arg(short, long, value_enum, value_name = "CATEGORY")]
        category: Option<Category>,

        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Trending this week instead of today
        #[arg(short, long)]
        week: bool,
    },

    /// Show popular torrents in a category
    #[command(visible_alias = "p")]
    Popular {
        #[arg(value_enum)]
        category: Category,

        /// Popular this week instead of today
        #[arg(short, long)]
        week: bool,

        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Show the top 100 torrents
    Top {
        #[arg(short, long, value_enum, value_name = "CATEGORY")]
        category: Option<Category>,

        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheAction {
    /// Delete every cached response
    Clear,
    /// Print the cache directory
    Path,
}

impl Cli {
    /// Validate CLI arguments and show helpful error messages
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Commands::Search { query, limit, .. } => {
                SearchQuery::new(query).map_err(|e| e.to_string())?;
                check_limit(*limit)?;
            }
            Commands::Download { target, .. } => {
                if target.trim().is_empty() {
                    return Err("Download target cannot be empty".to_string());
                }
            }
            Commands::Trending { limit, .. }
            | Commands::Popular { limit, .. }
            | Commands::Top { limit, .. } => check_limit(*limit)?,
            Commands::Cache { .. } => {}
        }
        Ok(())
    }

    /// Whether the command prints a result table the user can pick from
    pub fn lists_torrents(&self) -> bool {
        matches!(
            self.command,
            Commands::Search { .. }
                | Commands::Trending { .. }
                | Commands::Popular { .. }
                | Commands::Top { .. }
        )
    }
}

fn check_limit(limit: Option<usize>) -> Result<(), String> {
    match limit {
        Some(n) if n == 0 || n > MAX_LIMIT => {
            Err(format!("Limit must be between 1 and {}", MAX_LIMIT))
        }
        _ => Ok(()),
    }
}
