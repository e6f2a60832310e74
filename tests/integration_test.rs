use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use torrent_cli::fetch::{CacheEntry, CacheKey, FetchOptions};
use torrent_cli::{
    Category, DownloadDispatcher, Error, Fetcher, Magnet, MagnetHandler, ProxyPool, RawResponse,
    ResponseCache, SearchQuery, SiteClient, SortField, SortOrder, Transport,
};

const MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&dn=Ubuntu%2022.04&tr=udp%3A%2F%2Ftracker.example%3A1337";

/// A fake set of mirrors: fixed pages per URL, some hosts refusing connections
#[derive(Default)]
struct MockMirrors {
    pages: HashMap<String, String>,
    down: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl MockMirrors {
    fn page(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    fn down(mut self, host: &str) -> Self {
        self.down.insert(host.to_string());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockMirrors {
    async fn get(&self, url: &str) -> torrent_cli::Result<RawResponse> {
        self.requests.lock().unwrap().push(url.to_string());

        if self.down.iter().any(|host| url.starts_with(host.as_str())) {
            return Err(Error::Network {
                endpoint: url.to_string(),
                message: "connection refused".to_string(),
            });
        }
        match self.pages.get(url) {
            Some(body) => Ok(RawResponse::new(200, body.clone())),
            None => Ok(RawResponse::new(404, "<html>not found</html>")),
        }
    }
}

#[derive(Default)]
struct RecordingHandler {
    opened: Mutex<Vec<String>>,
}

impl MagnetHandler for RecordingHandler {
    fn open(&self, magnet: &Magnet) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(magnet.uri().to_string());
        Ok(())
    }
}

fn row(id: u32, seeders: u32) -> String {
    format!(
        r#"<tr>
<td class="coll-1 name"><a href="/sub/18/0/" class="icon"><i class="flaticon-apps"></i></a><a href="/torrent/{id}/Ubuntu-{id}/">Ubuntu {id}</a></td>
<td class="coll-2 seeds">{seeders}</td>
<td class="coll-3 leeches">{id}</td>
<td class="coll-date">Oct. 3rd '23</td>
<td class="coll-4 size mob-uploader">{id}.5 GB<span class="seeds">{seeders}</span></td>
<td class="coll-5 uploader"><a href="/user/canonical/">canonical</a></td>
</tr>"#
    )
}

fn broken_row() -> String {
    r#"<tr><td class="coll-1 name"><a href="/torrent/999/Broken/">Broken</a></td>
<td class="coll-2 seeds">-</td><td class="coll-3 leeches">1</td></tr>"#
        .to_string()
}

fn listing(rows: Vec<String>, next_page: Option<&str>) -> String {
    let pagination = next_page
        .map(|href| {
            format!(
                r#"<div class="pagination"><ul><li class="active"><a href="/search/ubuntu/1/">1</a></li><li><a href="{}">2</a></li></ul></div>"#,
                href
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><table class="table-list table"><thead><tr><th>name</th></tr></thead>
<tbody>{}</tbody></table>{}</body></html>"#,
        rows.join("\n"),
        pagination
    )
}

fn detail_page(magnet: &str) -> String {
    format!(
        r#"<html><body><div class="box-info-heading clearfix"><h1>Ubuntu 22.04 Desktop</h1></div>
<ul class="dropdown-menu"><li><a href="{}">Magnet Download</a></li></ul></body></html>"#,
        magnet
    )
}

fn fetcher(mirrors: Arc<MockMirrors>, hosts: &[&str], cache: ResponseCache) -> Result<Fetcher> {
    let pool = ProxyPool::new(hosts.iter().copied(), Duration::from_secs(300))?;
    Ok(Fetcher::new(mirrors, pool, cache).with_options(FetchOptions {
        challenge_wait: Duration::ZERO,
        ..FetchOptions::default()
    }))
}

fn site(mirrors: Arc<MockMirrors>, hosts: &[&str]) -> Result<SiteClient> {
    let cache = ResponseCache::in_memory(Duration::from_secs(300));
    Ok(SiteClient::new(fetcher(mirrors, hosts, cache)?))
}

#[tokio::test]
async fn test_search_limit_walks_pages_until_satisfied() -> Result<()> {
    let mirrors = Arc::new(
        MockMirrors::default()
            .page(
                "https://a.example/search/ubuntu/1/",
                listing((1..=3).map(|id| row(id, 10)).collect(), Some("/search/ubuntu/2/")),
            )
            .page(
                "https://a.example/search/ubuntu/2/",
                listing((4..=6).map(|id| row(id, 10)).collect(), None),
            ),
    );
    let site = site(mirrors.clone(), &["https://a.example"])?;

    let five = site.search(&SearchQuery::new("ubuntu")?.with_limit(5)?).await?;
    assert_eq!(five.len(), 5);
    assert_eq!(five[4].link, "/torrent/5/Ubuntu-5/");

    // More than the site has: every available row, and the walk stops at the last page
    let all = site.search(&SearchQuery::new("ubuntu")?.with_limit(50)?).await?;
    assert_eq!(all.len(), 6);

    let one = site.search(&SearchQuery::new("ubuntu")?.with_limit(1)?).await?;
    assert_eq!(one.len(), 1);

    assert_eq!(
        mirrors.requests(),
        vec![
            "https://a.example/search/ubuntu/1/",
            "https://a.example/search/ubuntu/2/"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_search_sorted_by_seeders_descending() -> Result<()> {
    let seeders = [5, 90, 12, 90, 0, 47];
    let rows = seeders
        .iter()
        .enumerate()
        .map(|(i, s)| row(i as u32 + 1, *s))
        .collect();
    let mirrors = Arc::new(MockMirrors::default().page(
        "https://a.example/sort-category-search/ubuntu/Apps/seeders/desc/1/",
        listing(rows, None),
    ));
    let site = site(mirrors, &["https://a.example"])?;

    let query = SearchQuery::new("ubuntu")?
        .with_category(Some(Category::Apps))
        .with_sort(Some(SortField::Seeders), SortOrder::Desc);
    let results = site.search(&query).await?;

    assert_eq!(results.len(), seeders.len());
    assert!(results.windows(2).all(|w| w[0].seeders >= w[1].seeders));
    // Ties keep the site's order
    assert_eq!(results[0].link, "/torrent/2/Ubuntu-2/");
    assert_eq!(results[1].link, "/torrent/4/Ubuntu-4/");
    Ok(())
}

#[tokio::test]
async fn test_cached_fetch_is_idempotent() -> Result<()> {
    let tmp = TempDir::new()?;
    let mirrors = Arc::new(
        MockMirrors::default().page("https://a.example/top-100", listing(vec![row(1, 3)], None)),
    );
    let cache = ResponseCache::on_disk(tmp.path().join("cache"), Duration::from_secs(300));
    let cached = fetcher(mirrors.clone(), &["https://a.example"], cache)?;

    let first = cached.fetch("/top-100", &[], true).await?;
    let second = cached.fetch("/top-100", &[], true).await?;

    assert_eq!(first.body, second.body);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(mirrors.requests().len(), 1);

    // A fresh process reading the same directory hits the disk copy
    let reopened = ResponseCache::on_disk(tmp.path().join("cache"), Duration::from_secs(300));
    let restarted = fetcher(mirrors.clone(), &["https://a.example"], reopened)?;
    let third = restarted.fetch("/top-100", &[], true).await?;
    assert_eq!(third.body, first.body);
    assert_eq!(mirrors.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_expired_entry_is_refetched_and_replaced() -> Result<()> {
    let tmp = TempDir::new()?;
    let cache_dir = tmp.path().join("cache");
    let key = CacheKey::new("/top-100", &[]);
    ResponseCache::on_disk(&cache_dir, Duration::from_secs(1))
        .store(&key, &RawResponse::new(200, "<html>stale</html>"))?;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let fresh = listing(vec![row(1, 3)], None);
    let mirrors = Arc::new(MockMirrors::default().page("https://a.example/top-100", fresh.clone()));
    let cache = ResponseCache::on_disk(&cache_dir, Duration::from_secs(300));
    let cached = fetcher(mirrors.clone(), &["https://a.example"], cache)?;

    let refreshed = cached.fetch("/top-100", &[], true).await?;
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.body, fresh);
    assert_eq!(mirrors.requests().len(), 1);

    let again = cached.fetch("/top-100", &[], true).await?;
    assert!(again.from_cache);
    assert_eq!(again.body, fresh);
    assert_eq!(mirrors.requests().len(), 1);

    // The stale file itself was replaced
    let reopened = ResponseCache::on_disk(&cache_dir, Duration::from_secs(300));
    assert_eq!(reopened.get_fresh(&key).map(|entry| entry.body), Some(fresh));
    Ok(())
}

#[tokio::test]
async fn test_placeholder_page_fails_over_and_is_never_cached() -> Result<()> {
    let tmp = TempDir::new()?;
    let cache_dir = tmp.path().join("cache");
    let real = listing(vec![row(1, 9), row(2, 4)], None);
    let mirrors = Arc::new(
        MockMirrors::default()
            .page(
                "https://a.example/top-100",
                "<html><body>This domain is parked</body></html>".to_string(),
            )
            .page("https://b.example/top-100", real.clone()),
    );
    let cache = ResponseCache::on_disk(&cache_dir, Duration::from_secs(300));
    let site = SiteClient::new(fetcher(
        mirrors.clone(),
        &["https://a.example", "https://b.example"],
        cache,
    )?);

    let first = site.top(None, 20).await?;
    let second = site.top(None, 20).await?;

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(
        mirrors.requests(),
        vec!["https://a.example/top-100", "https://b.example/top-100"]
    );

    let stored: Vec<CacheEntry> = fs::read_dir(&cache_dir)?
        .map(|entry| -> Result<CacheEntry> {
            Ok(serde_json::from_str(&fs::read_to_string(entry?.path())?)?)
        })
        .collect::<Result<_>>()?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body, real);
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_pages_everywhere_is_a_parse_error() -> Result<()> {
    let mirrors = Arc::new(
        MockMirrors::default()
            .page("https://a.example/trending", "<html>parked</html>".to_string())
            .page("https://b.example/trending", "<html>maintenance</html>".to_string()),
    );
    let site = site(mirrors.clone(), &["https://a.example", "https://b.example"])?;

    let err = site.trending(None, false, 20).await.unwrap_err();

    assert!(matches!(err, Error::Parse { .. }), "{err}");
    assert_eq!(err.exit_code(), 4);
    assert_eq!(mirrors.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failover_reaches_third_mirror() -> Result<()> {
    let mirrors = Arc::new(
        MockMirrors::default()
            .down("https://a.example")
            .down("https://b.example")
            .page(
                "https://c.example/trending",
                listing(vec![row(7, 70), row(8, 80)], None),
            ),
    );
    let site = site(
        mirrors.clone(),
        &["https://a.example", "https://b.example", "https://c.example"],
    )?;

    let results = site.trending(None, false, 20).await?;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "Ubuntu 7");
    assert_eq!(
        mirrors.requests(),
        vec![
            "https://a.example/trending",
            "https://b.example/trending",
            "https://c.example/trending"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_exhausted_pool_reports_every_mirror_and_caches_nothing() -> Result<()> {
    let tmp = TempDir::new()?;
    let cache_dir = tmp.path().join("cache");
    let mirrors = Arc::new(
        MockMirrors::default()
            .down("https://a.example")
            .down("https://b.example")
            .down("https://c.example"),
    );
    let cache = ResponseCache::on_disk(&cache_dir, Duration::from_secs(300));
    let site = SiteClient::new(fetcher(
        mirrors.clone(),
        &["https://a.example", "https://b.example", "https://c.example"],
        cache,
    )?);

    let err = site.top(Some(Category::Movies), 20).await.unwrap_err();

    let Error::ProxiesExhausted { failures } = &err else {
        panic!("expected exhaustion, got {err}");
    };
    let endpoints: Vec<&str> = failures.iter().map(|f| f.endpoint.as_str()).collect();
    assert_eq!(
        endpoints,
        vec!["https://a.example", "https://b.example", "https://c.example"]
    );
    assert_eq!(err.exit_code(), 3);

    let cached_files = match fs::read_dir(&cache_dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(cached_files, 0);
    Ok(())
}

#[tokio::test]
async fn test_download_from_detail_url_dispatches_its_magnet() -> Result<()> {
    let tmp = TempDir::new()?;
    let mirrors = Arc::new(
        MockMirrors::default().page("https://a.example/torrent/42/ubuntu/", detail_page(MAGNET)),
    );
    let site = site(mirrors.clone(), &["https://a.example"])?;
    let handler = Arc::new(RecordingHandler::default());
    let dispatcher = DownloadDispatcher::new(&site, handler.clone(), tmp.path().join("dl"));

    // The URL names another mirror; the page is still fetched through the pool
    let target = dispatcher
        .download("https://1337x.to/torrent/42/ubuntu/", None, None)
        .await?;

    assert_eq!(*handler.opened.lock().unwrap(), vec![MAGNET.to_string()]);
    assert_eq!(target.magnet, MAGNET);
    assert_eq!(target.name, "Ubuntu 22.04 Desktop");
    assert!(tmp.path().join("dl").is_dir());
    assert_eq!(
        mirrors.requests(),
        vec!["https://a.example/torrent/42/ubuntu/"]
    );
    Ok(())
}

#[tokio::test]
async fn test_download_by_bare_torrent_id() -> Result<()> {
    let tmp = TempDir::new()?;
    let mirrors = Arc::new(
        MockMirrors::default().page("https://a.example/torrent/42/", detail_page(MAGNET)),
    );
    let site = site(mirrors.clone(), &["https://a.example"])?;
    let handler = Arc::new(RecordingHandler::default());
    let dispatcher = DownloadDispatcher::new(&site, handler.clone(), tmp.path().to_path_buf());

    dispatcher.download("42", None, None).await?;

    assert_eq!(*handler.opened.lock().unwrap(), vec![MAGNET.to_string()]);
    assert_eq!(mirrors.requests(), vec!["https://a.example/torrent/42/"]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_download_target_makes_no_network_call() -> Result<()> {
    let tmp = TempDir::new()?;
    let mirrors = Arc::new(MockMirrors::default());
    let site = site(mirrors.clone(), &["https://a.example"])?;
    let handler = Arc::new(RecordingHandler::default());
    let dispatcher = DownloadDispatcher::new(&site, handler.clone(), tmp.path().to_path_buf());

    for input in ["not-a-magnet-or-url", "magnet:?xt=urn:btih:tooshort", ""] {
        let err = dispatcher.download(input, None, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{input}: {err}");
        assert_eq!(err.exit_code(), 2);
    }

    assert!(mirrors.requests().is_empty());
    assert!(handler.opened.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_one_malformed_row_among_ten_is_skipped() -> Result<()> {
    let mut rows: Vec<String> = (1..=9).map(|id| row(id, id * 3)).collect();
    rows.insert(6, broken_row());
    let mirrors = Arc::new(
        MockMirrors::default().page("https://a.example/top-100-apps", listing(rows, None)),
    );
    let site = site(mirrors, &["https://a.example"])?;

    let results = site.top(Some(Category::Apps), 100).await?;

    assert_eq!(results.len(), 9);
    assert!(results.iter().all(|r| r.name != "Broken"));
    Ok(())
}

#[test]
fn test_popular_week_listing() -> Result<()> {
    let mirrors = Arc::new(MockMirrors::default().page(
        "https://a.example/popular-tv-week",
        listing((1..=4).map(|id| row(id, 1)).collect(), None),
    ));
    let site = site(mirrors.clone(), &["https://a.example"])?;

    let results = tokio_test::block_on(site.popular(Category::Tv, true, 3))?;

    assert_eq!(results.len(), 3);
    assert_eq!(mirrors.requests(), vec!["https://a.example/popular-tv-week"]);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_limit_is_rejected_before_fetching() -> Result<()> {
    let mirrors = Arc::new(MockMirrors::default());
    let site = site(mirrors.clone(), &["https://a.example"])?;

    assert!(matches!(
        site.trending(None, true, 0).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        site.top(None, 101).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(mirrors.requests().is_empty());
    Ok(())
}
