use anyhow::Result;
use console::{Alignment, Term, pad_str, style, truncate_str};
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use torrent_cli::{DispatchMode, DownloadTarget, TorrentResult};

const SEEDERS_WIDTH: usize = 7;
const LEECHERS_WIDTH: usize = 7;
const SIZE_WIDTH: usize = 10;
const DATE_WIDTH: usize = 12;
const INDEX_WIDTH: usize = 4;
const MIN_NAME_WIDTH: usize = 20;

/// Spinner shown on stderr while the site is being fetched
pub fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.blue} {msg}")?);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn name_width(term_width: usize) -> usize {
    let fixed = INDEX_WIDTH + SEEDERS_WIDTH + LEECHERS_WIDTH + SIZE_WIDTH + DATE_WIDTH + 5;
    term_width.saturating_sub(fixed).max(MIN_NAME_WIDTH)
}

/// Print results as a table sized to the terminal
pub fn print_results(term: &Term, results: &[TorrentResult]) -> Result<()> {
    let (_, columns) = term.size();
    let width = name_width(columns as usize);

    term.write_line(&format!(
        "{} {} {} {} {} {}",
        pad_str("#", INDEX_WIDTH, Alignment::Right, None),
        style(pad_str("Name", width, Alignment::Left, None)).bold(),
        style(pad_str("Seeds", SEEDERS_WIDTH, Alignment::Right, None)).bold(),
        style(pad_str("Leech", LEECHERS_WIDTH, Alignment::Right, None)).bold(),
        style(pad_str("Size", SIZE_WIDTH, Alignment::Right, None)).bold(),
        style(pad_str("Uploaded", DATE_WIDTH, Alignment::Right, None)).bold(),
    ))?;

    for (index, result) in results.iter().enumerate() {
        let name = truncate_str(&result.name, width, "…");
        term.write_line(&format!(
            "{} {} {} {} {} {}",
            style(pad_str(&(index + 1).to_string(), INDEX_WIDTH, Alignment::Right, None)).dim(),
            style(pad_str(&name, width, Alignment::Left, None)).cyan(),
            style(pad_str(&result.seeders.to_string(), SEEDERS_WIDTH, Alignment::Right, None))
                .green(),
            style(pad_str(&result.leechers.to_string(), LEECHERS_WIDTH, Alignment::Right, None))
                .red(),
            pad_str(&format_bytes(result.size_bytes), SIZE_WIDTH, Alignment::Right, None),
            style(pad_str(
                result.uploaded.as_deref().unwrap_or("-"),
                DATE_WIDTH,
                Alignment::Right,
                None
            ))
            .dim(),
        ))?;
    }

    Ok(())
}

/// Ask which result to download; `None` when the user backs out
pub fn pick_result(results: &[TorrentResult]) -> Result<Option<usize>> {
    let items: Vec<String> = results
        .iter()
        .map(|r| format!("{} ({}, {} seeders)", r.name, format_bytes(r.size_bytes), r.seeders))
        .collect();

    let choice = Select::new()
        .with_prompt("Download which torrent? (Esc to skip)")
        .items(&items)
        .default(0)
        .interact_opt()?;

    Ok(choice)
}

pub fn print_target(term: &Term, target: &DownloadTarget, mode: DispatchMode) -> Result<()> {
    match &target.saved_path {
        Some(path) => term.write_line(&format!(
            "{} Saved magnet link for {} to {}",
            style("💾").green(),
            style(&target.name).cyan().bold(),
            style(path.display()).cyan()
        ))?,
        None => term.write_line(&format!(
            "{} Sent {} to your torrent client",
            style("✅").green(),
            style(&target.name).cyan().bold()
        ))?,
    }

    if mode == DispatchMode::Open && target.saved_path.is_some() {
        term.write_line(&format!(
            "{} No application is registered for magnet links; open the file with your client",
            style("💡").yellow()
        ))?;
    }

    term.write_line(&format!(
        "   {}: {}",
        style("Directory").dim(),
        target.directory.display()
    ))?;

    Ok(())
}
