use super::{Session, display, show_results};
use anyhow::{Context, Result};
use console::{Term, style};
use torrent_cli::Category;

fn heading(title: &str, category: Option<Category>, week: Option<bool>) -> String {
    let mut line = format!("{} {}", style("🔥").red(), style(title).bold());
    if let Some(category) = category {
        line.push_str(&format!(" in {}", style(category).cyan()));
    }
    match week {
        Some(true) => line.push_str(" this week"),
        Some(false) => line.push_str(" today"),
        None => {}
    }
    line
}

pub async fn handle_trending(
    session: &Session<'_>,
    category: Option<Category>,
    limit: Option<usize>,
    week: bool,
) -> Result<()> {
    Term::stdout().write_line(&heading("Trending torrents", category, Some(week)))?;

    let spinner = display::spinner("Fetching trending torrents...")?;
    let results = session
        .site
        .trending(category, week, limit.unwrap_or(session.default_limit))
        .await;
    spinner.finish_and_clear();

    show_results(session, &results.context("Could not load trending torrents")?).await
}

pub async fn handle_popular(
    session: &Session<'_>,
    category: Category,
    week: bool,
    limit: Option<usize>,
) -> Result<()> {
    Term::stdout().write_line(&heading("Popular torrents", Some(category), Some(week)))?;

    let spinner = display::spinner("Fetching popular torrents...")?;
    let results = session
        .site
        .popular(category, week, limit.unwrap_or(session.default_limit))
        .await;
    spinner.finish_and_clear();

    show_results(session, &results.context("Could not load popular torrents")?).await
}

pub async fn handle_top(
    session: &Session<'_>,
    category: Option<Category>,
    limit: Option<usize>,
) -> Result<()> {
    Term::stdout().write_line(&heading("Top 100", category, None))?;

    let spinner = display::spinner("Fetching top torrents...")?;
    let results = session
        .site
        .top(category, limit.unwrap_or(session.default_limit))
        .await;
    spinner.finish_and_clear();

    show_results(session, &results.context("Could not load the top 100")?).await
}
