use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;
pub const MIN_QUERY_LENGTH: usize = 3;
pub const MAX_QUERY_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movies,
    Tv,
    Games,
    Music,
    Apps,
    Anime,
    Documentaries,
    Xxx,
    Others,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Movies,
        Category::Tv,
        Category::Games,
        Category::Music,
        Category::Apps,
        Category::Anime,
        Category::Documentaries,
        Category::Xxx,
        Category::Others,
    ];

    /// Lowercase slug used by trending, popular and top paths
    pub fn slug(self) -> &'static str {
        match self {
            Category::Movies => "movies",
            Category::Tv => "tv",
            Category::Games => "games",
            Category::Music => "music",
            Category::Apps => "apps",
            Category::Anime => "anime",
            Category::Documentaries => "documentaries",
            Category::Xxx => "xxx",
            Category::Others => "other",
        }
    }

    /// Capitalized name used by category search paths
    pub fn search_name(self) -> &'static str {
        match self {
            Category::Movies => "Movies",
            Category::Tv => "TV",
            Category::Games => "Games",
            Category::Music => "Music",
            Category::Apps => "Apps",
            Category::Anime => "Anime",
            Category::Documentaries => "Documentaries",
            Category::Xxx => "XXX",
            Category::Others => "Other",
        }
    }

    /// Best-effort category from the listing icon class or a detail page label
    pub fn from_site_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        let category = if label.contains("movie") || label.contains("flaticon-hd") {
            Category::Movies
        } else if label.contains("tv") {
            Category::Tv
        } else if label.contains("game") {
            Category::Games
        } else if label.contains("music") {
            Category::Music
        } else if label.contains("app") {
            Category::Apps
        } else if label.contains("anime") {
            Category::Anime
        } else if label.contains("documentar") {
            Category::Documentaries
        } else if label.contains("xxx") {
            Category::Xxx
        } else if label.contains("other") {
            Category::Others
        } else {
            return None;
        };
        Some(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Others => write!(f, "others"),
            other => write!(f, "{}", other.slug()),
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.to_string() == wanted || c.slug() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Time,
    Size,
    Seeders,
    Leechers,
}

impl SortField {
    pub fn slug(self) -> &'static str {
        match self {
            SortField::Time => "time",
            SortField::Size => "size",
            SortField::Seeders => "seeders",
            SortField::Leechers => "leechers",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn slug(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    category: Option<Category>,
    sort: Option<SortField>,
    order: SortOrder,
    limit: usize,
}

impl SearchQuery {
    /// Whitespace is collapsed; the result must be 3..=100 characters.
    pub fn new(text: &str) -> Result<Self> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let length = text.chars().count();

        if length < MIN_QUERY_LENGTH {
            return Err(Error::InvalidInput(format!(
                "search query must be at least {} characters",
                MIN_QUERY_LENGTH
            )));
        }
        if length > MAX_QUERY_LENGTH {
            return Err(Error::InvalidInput(format!(
                "search query must not exceed {} characters",
                MAX_QUERY_LENGTH
            )));
        }

        Ok(Self {
            text,
            category: None,
            sort: None,
            order: SortOrder::Desc,
            limit: DEFAULT_LIMIT,
        })
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_sort(mut self, sort: Option<SortField>, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Result<Self> {
        self.limit = validate_limit(limit)?;
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn sort(&self) -> Option<SortField> {
        self.sort
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

pub fn validate_limit(limit: usize) -> Result<usize> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(Error::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}

/// One row of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentResult {
    pub name: String,
    /// Site path of the detail page, e.g. `/torrent/123/name/`
    pub link: String,
    pub size: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub leechers: u32,
    pub uploaded: Option<String>,
    pub uploader: Option<String>,
    pub category: Option<Category>,
}

impl TorrentResult {
    /// Absolute detail URL on the given mirror
    pub fn detail_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.link)
    }

    fn upload_date(&self) -> Option<NaiveDate> {
        self.uploaded
            .as_deref()
            .and_then(|raw| parse_upload_date(raw, Local::now().date_naive()))
    }

    fn compare_by(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::Time => self.upload_date().cmp(&other.upload_date()),
            SortField::Size => self.size_bytes.cmp(&other.size_bytes),
            SortField::Seeders => self.seeders.cmp(&other.seeders),
            SortField::Leechers => self.leechers.cmp(&other.leechers),
        }
    }
}

/// Stable sort: rows that compare equal keep their site order.
pub fn sort_results(results: &mut [TorrentResult], field: SortField, order: SortOrder) {
    match order {
        SortOrder::Asc => results.sort_by(|a, b| a.compare_by(b, field)),
        SortOrder::Desc => results.sort_by(|a, b| b.compare_by(a, field)),
    }
}

/// Everything the detail page exposes about one torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfo {
    pub name: String,
    pub magnet: Option<String>,
    pub info_hash: Option<String>,
    pub category: Option<Category>,
    pub size: Option<String>,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub downloads: Option<u64>,
    pub uploader: Option<String>,
    pub uploaded: Option<String>,
}

/// Parse a human size such as `1.4 GB` into bytes (binary multiples).
pub fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim().replace(',', "");
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.trim().parse().ok()?;

    let multiplier: u64 = match unit.trim().to_uppercase().as_str() {
        "" | "B" | "BYTES" => 1,
        "KB" | "KIB" => 1 << 10,
        "MB" | "MIB" => 1 << 20,
        "GB" | "GIB" => 1 << 30,
        "TB" | "TIB" => 1 << 40,
        _ => return None,
    };

    Some((value * multiplier as f64).round() as u64)
}

/// Listing dates come as `3pm` or `10:45am` for today, `Oct. 3rd` for this
/// year and `Oct. 3rd '23` for older rows.
pub fn parse_upload_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim();
    let lower = raw.to_lowercase();
    if lower.ends_with("am") || lower.ends_with("pm") {
        return Some(today);
    }

    let cleaned: String = raw.replace('.', "");
    let mut parts = cleaned.split_whitespace();
    let month = parts.next()?;
    let day: String = parts.next()?.chars().take_while(|c| c.is_ascii_digit()).collect();
    let year = match parts.next() {
        Some(year) => {
            let short: i32 = year.trim_start_matches('\'').parse().ok()?;
            if !(0..100).contains(&short) {
                return None;
            }
            2000 + short
        }
        None => today.year(),
    };

    NaiveDate::parse_from_str(&format!("{} {} {}", month, day, year), "%b %d %Y").ok()
}
