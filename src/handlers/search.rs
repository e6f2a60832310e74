use super::{Session, display, show_results};
use anyhow::{Context, Result};
use console::{Term, style};
use torrent_cli::site::types::MAX_LIMIT;
use torrent_cli::{Category, SearchQuery, SortField, SortOrder};

pub async fn handle_search(
    session: &Session<'_>,
    query: String,
    limit: Option<usize>,
    category: Option<Category>,
    sort_by: Option<SortField>,
    order: SortOrder,
) -> Result<()> {
    let query = SearchQuery::new(&query)?
        .with_category(category)
        .with_sort(sort_by, order)
        .with_limit(limit.unwrap_or(session.default_limit))?;

    let term = Term::stdout();
    term.write_line(&format!(
        "{} Searching for torrents matching: '{}'",
        style("🔍").cyan(),
        style(query.text()).cyan().bold()
    ))?;
    if let Some(category) = query.category() {
        term.write_line(&format!("   {}: {}", style("Category").dim(), category))?;
    }
    if let Some(field) = query.sort() {
        term.write_line(&format!(
            "   {}: {} ({})",
            style("Sorted by").dim(),
            field,
            query.order()
        ))?;
    }

    let spinner = display::spinner("Fetching search results...")?;
    let results = session.site.search(&query).await;
    spinner.finish_and_clear();
    let results = results.with_context(|| format!("Search for '{}' failed", query.text()))?;

    show_results(session, &results).await?;

    if more_available(results.len(), query.limit()) {
        term.write_line(&format!(
            "\n{} Showing the first {} results. Use --limit to see more.",
            style("📋").cyan(),
            style(query.limit()).green()
        ))?;
    }

    Ok(())
}

/// Whether raising `--limit` could show more rows than this run did.
fn more_available(shown: usize, limit: usize) -> bool {
    shown == limit && limit < MAX_LIMIT
}
