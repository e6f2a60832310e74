pub mod cache;
pub mod challenge;
pub mod proxy;
pub mod transport;

pub use cache::{CacheEntry, CacheKey, ResponseCache};
pub use proxy::{ProxyEndpoint, ProxyPool};
pub use transport::{RawResponse, ReqwestTransport, Transport};

use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ConfigManager;
use crate::error::{Error, FailureReport, Result};

/// A successfully fetched site page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Request signature, identical whichever mirror served it
    pub path: String,
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
}

impl Page {
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub cache_enabled: bool,
    pub solve_challenges: bool,
    pub challenge_wait: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            solve_challenges: true,
            challenge_wait: Duration::from_secs(5),
        }
    }
}

/// Cache-first GET with sequential proxy failover.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    pool: ProxyPool,
    cache: ResponseCache,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, pool: ProxyPool, cache: ResponseCache) -> Self {
        Self {
            transport,
            pool,
            cache,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the production fetcher: reqwest transport, configured mirrors, disk cache
    pub fn from_config(manager: &ConfigManager) -> Result<Self> {
        let config = manager.config();
        let network = &config.network;

        let transport = ReqwestTransport::new(network.timeout(), &network.user_agent)?;
        let pool = ProxyPool::new(&network.proxies, network.failure_penalty())?;
        let cache = ResponseCache::on_disk(manager.cache_dir(), config.cache.ttl());

        Ok(Self::new(Arc::new(transport), pool, cache).with_options(FetchOptions {
            cache_enabled: config.cache.enabled,
            solve_challenges: network.solve_challenges,
            challenge_wait: network.challenge_wait(),
        }))
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch a site path through the first mirror that answers with real content.
    ///
    /// A fresh cache entry short-circuits the network when `use_cache` is set.
    /// Per-mirror failures are absorbed; only when every mirror has failed does
    /// this return [`Error::ProxiesExhausted`], and nothing is cached then.
    pub async fn fetch(&self, path: &str, params: &[(&str, &str)], use_cache: bool) -> Result<Page> {
        self.fetch_with(path, params, use_cache, |page| Ok(page.clone()))
            .await
    }

    /// Like [`Fetcher::fetch`], but a page only counts once `accept` takes it.
    ///
    /// A mirror that answers 200 with something `accept` rejects (a parked
    /// domain, a placeholder) is a failure of that mirror: the next one is
    /// tried and the page is never cached. A cached page `accept` rejects is a
    /// miss. When every mirror served a page `accept` rejected, the first
    /// rejection is returned as is.
    pub async fn fetch_with<T, F>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        use_cache: bool,
        accept: F,
    ) -> Result<T>
    where
        F: Fn(&Page) -> Result<T>,
    {
        let key = CacheKey::new(path, params);

        if use_cache && self.options.cache_enabled {
            if let Some(entry) = self.cache.get_fresh(&key) {
                let page = Page {
                    path: entry.key,
                    status: entry.status,
                    body: entry.body,
                    from_cache: true,
                };
                match accept(&page) {
                    Ok(value) => {
                        debug!("Cache hit for {}", key.as_str());
                        return Ok(value);
                    }
                    Err(e) => debug!("Ignoring cached {}: {}", key.as_str(), e),
                }
            }
        }

        let mut excluded = HashSet::new();
        let mut failures = FailureReport::default();

        loop {
            let endpoint = match self.pool.next_endpoint(&excluded) {
                Ok(endpoint) => endpoint,
                Err(_) => return Err(exhausted(failures)),
            };

            let outcome = match self.attempt(&endpoint, &key).await {
                Ok(response) => {
                    let page = Page {
                        path: key.as_str().to_string(),
                        status: response.status,
                        body: response.body.clone(),
                        from_cache: false,
                    };
                    accept(&page).map(|value| (response, value))
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok((response, value)) => {
                    self.pool.mark_healthy(&endpoint.base_url);

                    if self.options.cache_enabled {
                        if let Err(e) = self.cache.store(&key, &response) {
                            warn!("Could not cache {}: {}", key.as_str(), e);
                        }
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", endpoint, key.as_str(), e);
                    self.pool.mark_failed(&endpoint.base_url);
                    excluded.insert(endpoint.base_url.clone());
                    failures.push(endpoint.base_url, e);
                }
            }
        }
    }

    async fn attempt(&self, endpoint: &ProxyEndpoint, key: &CacheKey) -> Result<RawResponse> {
        let url = endpoint.url_for(key.as_str());
        debug!("GET {}", url);

        let mut response = self.transport.get(&url).await?;

        if challenge::is_challenge(&response) {
            if !self.options.solve_challenges {
                return Err(Error::Challenge {
                    endpoint: endpoint.base_url.clone(),
                });
            }

            // The interstitial sets clearance cookies after its delay; the
            // transport keeps them, so one retry is the whole solving step.
            debug!(
                "Challenge page from {}, retrying in {:?}",
                endpoint, self.options.challenge_wait
            );
            tokio::time::sleep(self.options.challenge_wait).await;
            response = self.transport.get(&url).await?;

            if challenge::is_challenge(&response) {
                return Err(Error::Challenge {
                    endpoint: endpoint.base_url.clone(),
                });
            }
        }

        if !response.is_success() {
            return Err(Error::Network {
                endpoint: endpoint.base_url.clone(),
                message: format!("unexpected HTTP status {}", response.status),
            });
        }

        Ok(response)
    }
}

/// Every mirror answered but none with a page the caller recognized: that is
/// a layout problem, not a connectivity one.
fn exhausted(failures: FailureReport) -> Error {
    let all_unrecognized = !failures.is_empty()
        && failures.iter().all(|f| matches!(f.error, Error::Parse { .. }));
    if !all_unrecognized {
        return Error::ProxiesExhausted { failures };
    }
    match failures.0.into_iter().next() {
        Some(first) => first.error,
        None => Error::ProxiesExhausted {
            failures: FailureReport::default(),
        },
    }
}
