//! Page parsers, one per page type.
//!
//! The site's markup is not a stable interface. Everything that depends on it
//! lives here so that a layout change touches one parser, not the client.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

use super::types::{Category, TorrentInfo, TorrentResult, parse_size};
use crate::error::{Error, Result};
use crate::fetch::Page;
use crate::magnet::Magnet;

const NO_RESULTS_MARKER: &str = "No results were returned";

pub trait PageParser {
    type Output;

    fn parse(&self, page: &Page) -> Result<Self::Output>;
}

/// Rows parsed from one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub results: Vec<TorrentResult>,
    /// Rows dropped because a required field was missing or malformed
    pub skipped: usize,
    pub has_next_page: bool,
}

pub struct SearchPageParser;
pub struct TrendingPageParser;
pub struct PopularPageParser;
pub struct TopPageParser;
pub struct DetailPageParser;

impl PageParser for SearchPageParser {
    type Output = Listing;

    fn parse(&self, page: &Page) -> Result<Listing> {
        parse_listing(page, true)
    }
}

impl PageParser for TrendingPageParser {
    type Output = Listing;

    fn parse(&self, page: &Page) -> Result<Listing> {
        parse_listing(page, false)
    }
}

impl PageParser for PopularPageParser {
    type Output = Listing;

    fn parse(&self, page: &Page) -> Result<Listing> {
        parse_listing(page, false)
    }
}

impl PageParser for TopPageParser {
    type Output = Listing;

    fn parse(&self, page: &Page) -> Result<Listing> {
        parse_listing(page, false)
    }
}

impl PageParser for DetailPageParser {
    type Output = TorrentInfo;

    fn parse(&self, page: &Page) -> Result<TorrentInfo> {
        let document = page.document();

        let heading = first_text(&document, ".box-info-heading h1")
            .or_else(|| first_text(&document, "div.torrent-detail-page h1"));

        let magnet = selector("a[href^='magnet:']")
            .and_then(|sel| {
                document
                    .select(&sel)
                    .filter_map(|a| a.value().attr("href"))
                    .find(|href| Magnet::parse(href).is_ok())
                    .map(str::to_string)
            });

        let Some(name) = heading.or_else(|| {
            magnet
                .as_deref()
                .and_then(|m| Magnet::parse(m).ok())
                .and_then(|m| m.display_name().map(str::to_string))
        }) else {
            return Err(Error::parse(&page.path, "no torrent heading on detail page"));
        };

        let mut info = TorrentInfo {
            name,
            info_hash: first_text(&document, ".infohash-box span")
                .map(|hash| hash.to_uppercase())
                .or_else(|| {
                    magnet
                        .as_deref()
                        .and_then(|m| Magnet::parse(m).ok())
                        .map(|m| m.info_hash().to_string())
                }),
            magnet,
            category: None,
            size: None,
            seeders: None,
            leechers: None,
            downloads: None,
            uploader: None,
            uploaded: None,
        };

        if let Some(items) = selector("ul.list li") {
            let label_sel = selector("strong");
            let value_sel = selector("span");
            for item in document.select(&items) {
                let label = label_sel
                    .as_ref()
                    .and_then(|sel| item.select(sel).next())
                    .map(|el| collapse(&el.text().collect::<String>()).to_lowercase());
                let value = value_sel
                    .as_ref()
                    .and_then(|sel| item.select(sel).next())
                    .map(|el| collapse(&el.text().collect::<String>()));
                let (Some(label), Some(value)) = (label, value) else {
                    continue;
                };

                match label.trim_end_matches(':').trim() {
                    "category" => info.category = Category::from_site_label(&value),
                    "total size" => info.size = Some(value),
                    "uploaded by" => info.uploader = Some(value),
                    "date uploaded" => info.uploaded = Some(value),
                    "seeders" => info.seeders = parse_peer_count(&value),
                    "leechers" => info.leechers = parse_peer_count(&value),
                    "downloads" => info.downloads = parse_count(&value),
                    _ => {}
                }
            }
        }

        Ok(info)
    }
}

fn parse_listing(page: &Page, paginated: bool) -> Result<Listing> {
    let document = page.document();
    if !has_element(&document, "table.table-list") {
        if page.body.contains(NO_RESULTS_MARKER) {
            return Ok(Listing::default());
        }
        return Err(Error::parse(&page.path, "no listing table found"));
    }

    let mut listing = Listing::default();
    let mut seen = HashSet::new();
    let rows = selector("table.table-list tbody tr");

    for row in rows.iter().flat_map(|sel| document.select(sel)) {
        match parse_row(row) {
            // Trending pages repeat rows across sections
            Some(result) => {
                if seen.insert(result.link.clone()) {
                    listing.results.push(result);
                }
            }
            None => listing.skipped += 1,
        }
    }

    if listing.skipped > 0 {
        debug!("Skipped {} malformed row(s) on {}", listing.skipped, page.path);
    }

    listing.has_next_page = paginated && has_next_page(&document);
    Ok(listing)
}

fn parse_row(row: ElementRef<'_>) -> Option<TorrentResult> {
    let name_cell = child(row, "td.name")?;
    let title = child(name_cell, "a[href^='/torrent/']")?;
    let link = title.value().attr("href")?.to_string();
    let name = collapse(&title.text().collect::<String>());
    if name.is_empty() {
        return None;
    }

    let seeders = cell_text(row, "td.seeds").and_then(|t| t.parse().ok())?;
    let leechers = cell_text(row, "td.leeches").and_then(|t| t.parse().ok())?;

    // The size cell also nests a seeders span for mobile layouts
    let size = child(row, "td.size")
        .and_then(|cell| cell.text().next())
        .map(collapse)?;
    let size_bytes = parse_size(&size)?;

    let category = child(name_cell, "a.icon i")
        .and_then(|icon| icon.value().attr("class"))
        .and_then(Category::from_site_label);

    Some(TorrentResult {
        name,
        link,
        size,
        size_bytes,
        seeders,
        leechers,
        uploaded: cell_text(row, "td.coll-date").filter(|t| !t.is_empty()),
        uploader: cell_text(row, "td.coll-5").filter(|t| !t.is_empty()),
        category,
    })
}

/// Pagination shows the active page and links to later ones; any linked page
/// number beyond the active one means there is more to walk.
fn has_next_page(document: &Html) -> bool {
    let Some(links) = selector(".pagination a") else {
        return false;
    };
    let current = first_text(document, ".pagination li.active")
        .and_then(|t| t.parse::<u32>().ok())
        .unwrap_or(1);

    document.select(&links).any(|a| {
        let text = collapse(&a.text().collect::<String>());
        let from_text = text.parse::<u32>().ok();
        let from_href = a.value().attr("href").and_then(|href| {
            href.trim_end_matches('/')
                .rsplit('/')
                .next()
                .and_then(|last| last.parse::<u32>().ok())
        });
        text == ">>" || from_text.or(from_href).is_some_and(|n| n > current)
    })
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn child<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    element.select(&sel).next()
}

fn cell_text(row: ElementRef<'_>, css: &str) -> Option<String> {
    child(row, css).map(|cell| collapse(&cell.text().collect::<String>()))
}

fn has_element(document: &Html, css: &str) -> bool {
    selector(css).is_some_and(|sel| document.select(&sel).next().is_some())
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .next()
        .map(|el| collapse(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_count(text: &str) -> Option<u64> {
    text.replace(',', "").trim().parse().ok()
}

fn parse_peer_count(text: &str) -> Option<u32> {
    parse_count(text).and_then(|n| u32::try_from(n).ok())
}
