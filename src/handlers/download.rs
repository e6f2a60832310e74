use super::{Session, display};
use anyhow::{Context, Result};
use console::{Term, style};
use std::path::PathBuf;

pub async fn handle_download(
    session: &Session<'_>,
    target: String,
    name: Option<String>,
    dir: Option<PathBuf>,
) -> Result<()> {
    let term = Term::stdout();
    term.write_line(&format!(
        "{} Preparing download...",
        style("⬇️").cyan()
    ))?;

    let spinner = display::spinner("Resolving magnet link...")?;
    let resolved = session
        .dispatcher
        .download(&target, name.as_deref(), dir.as_deref())
        .await;
    spinner.finish_and_clear();

    let resolved = resolved.context("Download failed")?;
    display::print_target(&term, &resolved, session.dispatcher.mode())
}
