use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Error, Result};

/// A mirror of the indexing site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub base_url: String,
    /// Position in the configured list, 0 is most preferred
    pub rank: usize,
    pub failures: u32,
    pub last_failure: Option<Instant>,
}

impl ProxyEndpoint {
    fn new(base_url: String, rank: usize) -> Self {
        Self {
            base_url,
            rank,
            failures: 0,
            last_failure: None,
        }
    }

    /// Absolute URL for a site path on this mirror
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    fn is_demoted(&self, now: Instant, penalty: Duration) -> bool {
        self.last_failure
            .is_some_and(|at| now.saturating_duration_since(at) < penalty)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

/// Ordered set of mirrors with in-process health tracking.
///
/// Failed mirrors are never removed. They sort behind healthy ones until the
/// penalty window passes or a later request succeeds through them.
#[derive(Debug)]
pub struct ProxyPool {
    endpoints: Mutex<Vec<ProxyEndpoint>>,
    penalty: Duration,
}

impl ProxyPool {
    pub fn new<I, S>(base_urls: I, penalty: Duration) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::new();

        for raw in base_urls {
            let Some(url) = normalize_base_url(raw.as_ref()) else {
                continue;
            };
            if seen.insert(url.clone()) {
                let rank = endpoints.len();
                endpoints.push(ProxyEndpoint::new(url, rank));
            }
        }

        if endpoints.is_empty() {
            return Err(Error::Config(
                "proxy pool needs at least one mirror".to_string(),
            ));
        }

        Ok(Self {
            endpoints: Mutex::new(endpoints),
            penalty,
        })
    }

    /// Best endpoint not yet tried for the current request.
    ///
    /// `exclude` holds base URLs that already failed this request.
    pub fn next_endpoint(&self, exclude: &HashSet<String>) -> Result<ProxyEndpoint> {
        let now = Instant::now();
        let endpoints = self.lock();

        endpoints
            .iter()
            .filter(|e| !exclude.contains(&e.base_url))
            .min_by_key(|e| self.preference(e, now))
            .cloned()
            .ok_or_else(|| Error::ProxiesExhausted {
                failures: Default::default(),
            })
    }

    pub fn mark_failed(&self, base_url: &str) {
        let mut endpoints = self.lock();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.base_url == base_url) {
            endpoint.failures += 1;
            endpoint.last_failure = Some(Instant::now());
            debug!(
                "Demoted {} after {} failure(s)",
                endpoint.base_url, endpoint.failures
            );
        }
    }

    pub fn mark_healthy(&self, base_url: &str) {
        let mut endpoints = self.lock();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.base_url == base_url) {
            endpoint.failures = 0;
            endpoint.last_failure = None;
        }
    }

    /// Snapshot of every endpoint in current preference order
    pub fn endpoints(&self) -> Vec<ProxyEndpoint> {
        let now = Instant::now();
        let mut snapshot = self.lock().clone();
        snapshot.sort_by_key(|e| self.preference(e, now));
        snapshot
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The configured first choice, used to render absolute links
    pub fn primary(&self) -> String {
        self.lock()
            .iter()
            .min_by_key(|e| e.rank)
            .map(|e| e.base_url.clone())
            .unwrap_or_default()
    }

    // Healthy before demoted, then fewer failures, then configured order
    fn preference(&self, endpoint: &ProxyEndpoint, now: Instant) -> (bool, u32, usize) {
        let demoted = endpoint.is_demoted(now, self.penalty);
        let failures = if demoted { endpoint.failures } else { 0 };
        (demoted, failures, endpoint.rank)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ProxyEndpoint>> {
        self.endpoints.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{}", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &[&str]) -> ProxyPool {
        ProxyPool::new(urls.iter().copied(), Duration::from_secs(300)).unwrap()
    }

    #[test]
    fn test_normalizes_and_dedupes_configured_urls() {
        let pool = pool(&["1337x.to", "https://1337x.to/", " https://x1337x.se ", ""]);
        let urls: Vec<String> = pool.endpoints().into_iter().map(|e| e.base_url).collect();
        assert_eq!(urls, vec!["https://1337x.to", "https://x1337x.se"]);
    }

    #[test]
    fn test_empty_pool_is_a_config_error() {
        let result = ProxyPool::new(Vec::<String>::new(), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_picks_configured_order_and_skips_excluded() {
        let pool = pool(&["https://a.example", "https://b.example", "https://c.example"]);
        let mut exclude = HashSet::new();

        assert_eq!(pool.next_endpoint(&exclude).unwrap().base_url, "https://a.example");

        exclude.insert("https://a.example".to_string());
        assert_eq!(pool.next_endpoint(&exclude).unwrap().base_url, "https://b.example");

        exclude.insert("https://b.example".to_string());
        exclude.insert("https://c.example".to_string());
        assert!(matches!(
            pool.next_endpoint(&exclude),
            Err(Error::ProxiesExhausted { .. })
        ));
    }

    #[test]
    fn test_failed_endpoint_is_demoted_not_removed() {
        let pool = pool(&["https://a.example", "https://b.example"]);
        pool.mark_failed("https://a.example");

        let exclude = HashSet::new();
        assert_eq!(pool.next_endpoint(&exclude).unwrap().base_url, "https://b.example");
        assert_eq!(pool.len(), 2);

        let mut exclude = HashSet::new();
        exclude.insert("https://b.example".to_string());
        assert_eq!(pool.next_endpoint(&exclude).unwrap().base_url, "https://a.example");
    }

    #[test]
    fn test_success_restores_preference() {
        let pool = pool(&["https://a.example", "https://b.example"]);
        pool.mark_failed("https://a.example");
        pool.mark_healthy("https://a.example");

        assert_eq!(
            pool.next_endpoint(&HashSet::new()).unwrap().base_url,
            "https://a.example"
        );
    }

    #[test]
    fn test_penalty_expires() {
        let pool = ProxyPool::new(["https://a.example", "https://b.example"], Duration::ZERO).unwrap();
        pool.mark_failed("https://a.example");

        assert_eq!(
            pool.next_endpoint(&HashSet::new()).unwrap().base_url,
            "https://a.example"
        );
    }

    #[test]
    fn test_more_failures_sort_later() {
        let pool = pool(&["https://a.example", "https://b.example", "https://c.example"]);
        pool.mark_failed("https://a.example");
        pool.mark_failed("https://a.example");
        pool.mark_failed("https://b.example");
        pool.mark_failed("https://c.example");

        let order: Vec<String> = pool.endpoints().into_iter().map(|e| e.base_url).collect();
        assert_eq!(
            order,
            vec!["https://b.example", "https://c.example", "https://a.example"]
        );
        assert_eq!(pool.primary(), "https://a.example");
    }
}
