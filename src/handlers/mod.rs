pub mod cache;
pub mod display;
pub mod download;
pub mod listing;
pub mod search;

use anyhow::Result;
use console::{Term, style};
use torrent_cli::{DownloadDispatcher, SiteClient, TorrentResult};

// Re-export all handlers
pub use cache::handle_cache;
pub use download::handle_download;
pub use listing::{handle_popular, handle_top, handle_trending};
pub use search::handle_search;

/// Everything a network command needs for one run.
pub struct Session<'a> {
    pub site: &'a SiteClient,
    pub dispatcher: DownloadDispatcher<'a>,
    /// Offer the interactive picker after listing results
    pub prompt: bool,
    pub default_limit: usize,
}

/// Print a listing and, on a terminal, offer to download one of the rows.
pub async fn show_results(session: &Session<'_>, results: &[TorrentResult]) -> Result<()> {
    let term = Term::stdout();

    if results.is_empty() {
        term.write_line(&format!("{} No torrents found", style("❌").red()))?;
        return Ok(());
    }

    term.write_line(&format!(
        "{} Found {} torrent(s):",
        style("📋").cyan(),
        style(results.len()).green().bold()
    ))?;
    display::print_results(&term, results)?;

    if !session.prompt || !term.is_term() {
        let mirror = session.site.fetcher().pool().primary();
        term.write_line(&format!(
            "\n{} Download one with: torrent-cli download {}",
            style("💡").yellow(),
            style(results[0].detail_url(&mirror)).cyan()
        ))?;
        return Ok(());
    }

    term.write_line("")?;
    let Some(index) = display::pick_result(results)? else {
        return Ok(());
    };

    let chosen = &results[index];
    let spinner = display::spinner(format!("Resolving {}...", chosen.name))?;
    let resolved = session.dispatcher.download(&chosen.link, None, None).await;
    spinner.finish_and_clear();

    display::print_target(&term, &resolved?, session.dispatcher.mode())
}
