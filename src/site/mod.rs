pub mod parser;
pub mod types;

pub use parser::{
    DetailPageParser, Listing, PageParser, PopularPageParser, SearchPageParser, TopPageParser,
    TrendingPageParser,
};
pub use types::{
    Category, SearchQuery, SortField, SortOrder, TorrentInfo, TorrentResult, sort_results,
    validate_limit,
};

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::Result;
use crate::fetch::Fetcher;

/// Upper bound on listing pages walked for one request
pub const MAX_PAGES: u32 = 50;

/// Search and listing operations against the indexing site.
pub struct SiteClient {
    fetcher: Fetcher,
    use_cache: bool,
}

impl SiteClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            use_cache: true,
        }
    }

    /// Skip cache reads for this client's requests (responses are still stored)
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentResult>> {
        debug!(
            "Searching '{}' (category: {:?}, sort: {:?} {})",
            query.text(),
            query.category(),
            query.sort(),
            query.order()
        );

        let mut results = self
            .collect(&SearchPageParser, query.limit(), |page| {
                paths::search(query, page)
            })
            .await?;

        if let Some(field) = query.sort() {
            sort_results(&mut results, field, query.order());
        }
        results.truncate(query.limit());
        Ok(results)
    }

    pub async fn trending(
        &self,
        category: Option<Category>,
        week: bool,
        limit: usize,
    ) -> Result<Vec<TorrentResult>> {
        let limit = validate_limit(limit)?;
        let path = paths::trending(category, week);
        self.collect(&TrendingPageParser, limit, |_| path.clone())
            .await
    }

    pub async fn popular(
        &self,
        category: Category,
        week: bool,
        limit: usize,
    ) -> Result<Vec<TorrentResult>> {
        let limit = validate_limit(limit)?;
        let path = paths::popular(category, week);
        self.collect(&PopularPageParser, limit, |_| path.clone())
            .await
    }

    pub async fn top(&self, category: Option<Category>, limit: usize) -> Result<Vec<TorrentResult>> {
        let limit = validate_limit(limit)?;
        let path = paths::top(category);
        self.collect(&TopPageParser, limit, |_| path.clone()).await
    }

    /// Detail page for a site path such as `/torrent/123/name/`
    pub async fn info(&self, detail_path: &str) -> Result<TorrentInfo> {
        self.fetcher
            .fetch_with(detail_path, &[], self.use_cache, |page| {
                DetailPageParser.parse(page)
            })
            .await
    }

    /// Walk listing pages one at a time until `limit` rows or the last page.
    async fn collect<P, F>(&self, parser: &P, limit: usize, path_for_page: F) -> Result<Vec<TorrentResult>>
    where
        P: PageParser<Output = Listing>,
        F: Fn(u32) -> String,
    {
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for page_number in 1..=MAX_PAGES {
            let listing = self
                .fetcher
                .fetch_with(&path_for_page(page_number), &[], self.use_cache, |page| {
                    parser.parse(page)
                })
                .await?;
            let before = results.len();

            for result in listing.results {
                if seen.insert(result.link.clone()) {
                    results.push(result);
                }
            }

            let added = results.len() - before;
            if results.len() >= limit || !listing.has_next_page || added == 0 {
                break;
            }
            debug!("Page {} gave {} rows, walking to the next page", page_number, added);
        }

        results.truncate(limit);
        Ok(results)
    }
}

/// Site path of a detail page, from a URL on any mirror (scheme optional), a
/// bare path, or just the numeric torrent id.
pub fn detail_path(input: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:(?:https?://)?[A-Za-z0-9.-]+(?::\d+)?)?(/torrent/\d+(?:/[^?#\s]*)?)(?:[?#]\S*)?$",
        )
        .expect("valid detail path regex")
    });

    let input = input.trim();
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("/torrent/{}/", input));
    }

    let path = pattern.captures(input)?.get(1)?.as_str();
    Some(if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    })
}

/// Site paths for each listing type.
pub mod paths {
    use super::{Category, SearchQuery};

    pub fn search(query: &SearchQuery, page: u32) -> String {
        let text = urlencoding::encode(query.text());
        match (query.category(), query.sort()) {
            (None, None) => format!("/search/{}/{}/", text, page),
            (Some(category), None) => format!(
                "/category-search/{}/{}/{}/",
                text,
                category.search_name(),
                page
            ),
            (None, Some(field)) => format!(
                "/sort-search/{}/{}/{}/{}/",
                text,
                field.slug(),
                query.order().slug(),
                page
            ),
            (Some(category), Some(field)) => format!(
                "/sort-category-search/{}/{}/{}/{}/{}/",
                text,
                category.search_name(),
                field.slug(),
                query.order().slug(),
                page
            ),
        }
    }

    pub fn trending(category: Option<Category>, week: bool) -> String {
        let window = if week { "w" } else { "d" };
        match category {
            Some(category) => format!("/trending/{}/{}/", window, category.slug()),
            None if week => "/trending/w/".to_string(),
            None => "/trending".to_string(),
        }
    }

    pub fn popular(category: Category, week: bool) -> String {
        if week {
            format!("/popular-{}-week", category.slug())
        } else {
            format!("/popular-{}", category.slug())
        }
    }

    pub fn top(category: Option<Category>) -> String {
        match category {
            Some(category) => format!("/top-100-{}", category.slug()),
            None => "/top-100".to_string(),
        }
    }
}
