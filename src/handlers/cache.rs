use crate::cli::CacheAction;
use anyhow::{Context, Result};
use console::{Term, style};
use torrent_cli::ConfigManager;
use torrent_cli::fetch::ResponseCache;

pub fn handle_cache(config_manager: &ConfigManager, action: CacheAction) -> Result<()> {
    let term = Term::stdout();
    let dir = config_manager.cache_dir();

    match action {
        CacheAction::Path => {
            term.write_line(&dir.display().to_string())?;
        }
        CacheAction::Clear => {
            let cache = ResponseCache::on_disk(dir.clone(), config_manager.config().cache.ttl());
            let removed = cache
                .clear()
                .with_context(|| format!("Could not clear {}", dir.display()))?;
            term.write_line(&format!(
                "{} Removed {} cached response(s) from {}",
                style("🧹").green(),
                style(removed).green().bold(),
                style(dir.display()).cyan()
            ))?;
        }
    }

    Ok(())
}
