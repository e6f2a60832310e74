mod cli;
mod handlers;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use console::style;
use std::process;
use std::sync::Arc;
use torrent_cli::{
    ConfigManager, DispatchMode, DownloadDispatcher, Fetcher, SiteClient, SystemHandler,
};

const EXIT_GENERAL: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();

    // Validate CLI arguments first
    if let Err(e) = args.validate() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(EXIT_USAGE);
    }

    // Initialize logging based on verbosity
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let outcome = tokio::select! {
        result = run(args) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n{} Interrupted", style("⚠️").yellow());
            process::exit(EXIT_INTERRUPTED);
        }
    };

    if let Err(e) = outcome {
        report(&e);
        process::exit(exit_code(&e));
    }
}

async fn run(args: Cli) -> Result<()> {
    let config_manager = match &args.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };

    config_manager
        .validate()
        .with_context(|| format!("Invalid configuration in {}", config_manager.config_file().display()))?;

    if let Commands::Cache { action } = &args.command {
        return handlers::handle_cache(&config_manager, *action);
    }

    let config = config_manager.config();
    let fetcher = Fetcher::from_config(&config_manager).context("Could not set up the HTTP client")?;
    let site = SiteClient::new(fetcher).with_cache(!args.no_cache);

    let mode = match &args.command {
        Commands::Download { save: true, .. } => DispatchMode::Save,
        _ => config.download.mode,
    };
    let dispatcher =
        DownloadDispatcher::new(&site, Arc::new(SystemHandler), config_manager.download_dir())
            .with_mode(mode);

    let session = handlers::Session {
        site: &site,
        dispatcher,
        prompt: !args.no_prompt && args.lists_torrents(),
        default_limit: config.display.default_limit,
    };

    // Handle commands
    match args.command {
        Commands::Search {
            query,
            limit,
            category,
            sort_by,
            order,
        } => {
            handlers::handle_search(&session, query, limit, category, sort_by, order).await?;
        }
        Commands::Download {
            target, name, dir, ..
        } => {
            handlers::handle_download(&session, target, name, dir).await?;
        }
        Commands::Trending {
            category,
            limit,
            week,
        } => {
            handlers::handle_trending(&session, category, limit, week).await?;
        }
        Commands::Popular {
            category,
            week,
            limit,
        } => {
            handlers::handle_popular(&session, category, week, limit).await?;
        }
        Commands::Top { category, limit } => {
            handlers::handle_top(&session, category, limit).await?;
        }
        Commands::Cache { action } => handlers::handle_cache(&config_manager, action)?,
    }

    Ok(())
}

fn root_error(e: &anyhow::Error) -> Option<&torrent_cli::Error> {
    e.chain().find_map(|cause| cause.downcast_ref::<torrent_cli::Error>())
}

fn exit_code(e: &anyhow::Error) -> i32 {
    root_error(e).map_or(EXIT_GENERAL, torrent_cli::Error::exit_code)
}

fn report(e: &anyhow::Error) {
    eprintln!("{} {:#}", style("❌ Error:").red().bold(), e);
    if let Some(hint) = root_error(e).and_then(torrent_cli::Error::hint) {
        eprintln!("{} {}", style("💡").yellow(), hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torrent_cli::error::FailureReport;

    #[test]
    fn test_exit_code_follows_root_cause() {
        let e = anyhow::Error::new(torrent_cli::Error::ProxiesExhausted {
            failures: FailureReport::default(),
        })
        .context("Search for 'ubuntu' failed");
        assert_eq!(exit_code(&e), 3);

        let e = anyhow::Error::new(torrent_cli::Error::InvalidInput("x".into()));
        assert_eq!(exit_code(&e), EXIT_USAGE);

        let e = anyhow::anyhow!("config file unreadable");
        assert_eq!(exit_code(&e), EXIT_GENERAL);
    }

    #[test]
    fn test_cli_integration() {
        let cli = Cli::try_parse_from(["torrent-cli", "--no-prompt", "trending", "--week"]).unwrap();
        assert!(cli.no_prompt);
        assert!(cli.lists_torrents());

        let cli = Cli::try_parse_from(["torrent-cli", "download", "magnet:?xt=urn:btih:x"]).unwrap();
        assert!(!cli.lists_torrents());
    }
}
