//! Listing page cache, plus the startup warm-up for popular searches.
//!
//! The cache is strictly best-effort. Every cache operation is time-boxed, and a Redis
//! error or an elapsed bound is logged and the request falls through to the wrapped
//! fetcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::apply::fetcher::{FetchError, Fetcher};

/// Searches warmed at startup.
pub const POPULAR_SEARCHES: &[&str] = &[
    "software engineer",
    "software engineer intern",
    "data scientist",
    "product manager",
    "product manager intern",
    "frontend developer",
    "backend developer",
    "full stack developer",
    "machine learning engineer",
    "data analyst",
    "devops engineer",
    "nurse",
];

/// Key/value store for fetched listing pages.
#[async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn put(&self, key: &str, body: &str) -> anyhow::Result<()>;
}

/// Redis-backed pages with a fixed TTL. One multiplexed connection is opened on first
/// use and shared; it is dropped after a failed command and reopened on the next call.
pub struct RedisPageCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    ttl_secs: u64,
}

impl RedisPageCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
            ttl_secs,
        }
    }

    async fn connection(&self) -> redis::RedisResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }

    async fn run<T: redis::FromRedisValue + Send>(&self, cmd: redis::Cmd) -> anyhow::Result<T> {
        let mut conn = self.connection().await?;
        match cmd.query_async::<_, T>(&mut conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.reset().await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl PageCache for RedisPageCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run(cmd).await
    }

    async fn put(&self, key: &str, body: &str) -> anyhow::Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(body).arg("EX").arg(self.ttl_secs);
        self.run(cmd).await
    }
}

pub struct CachedFetcher {
    inner: Arc<dyn Fetcher>,
    cache: Arc<dyn PageCache>,
    /// Upper bound on any single cache read or write.
    op_timeout: Duration,
}

impl CachedFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, cache: Arc<dyn PageCache>, op_timeout: Duration) -> Self {
        Self {
            inner,
            cache,
            op_timeout,
        }
    }

    async fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        tokio::time::timeout(self.op_timeout, self.cache.get(key))
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {:?}", self.op_timeout))?
    }

    async fn write(&self, key: &str, body: &str) -> anyhow::Result<()> {
        tokio::time::timeout(self.op_timeout, self.cache.put(key, body))
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {:?}", self.op_timeout))?
    }
}

#[async_trait]
impl Fetcher for CachedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let key = cache_key(url);
        match self.read(&key).await {
            Ok(Some(body)) => {
                debug!("Listing cache hit for {url}");
                return Ok(body);
            }
            Ok(None) => debug!("Listing cache miss for {url}"),
            Err(e) => warn!("Listing cache read failed for {url}: {e}"),
        }

        // only successful fetches are cached
        let body = self.inner.fetch(url).await?;
        if let Err(e) = self.write(&key, &body).await {
            warn!("Listing cache write failed for {url}: {e}");
        }
        Ok(body)
    }
}

fn cache_key(url: &str) -> String {
    format!("listing:{}", url.trim())
}

/// Builds a search URL from a template containing a `{query}` placeholder.
pub fn search_url(template: &str, query: &str) -> String {
    let encoded = query.split_whitespace().collect::<Vec<_>>().join("%20");
    template.replace("{query}", &encoded)
}

/// Fetches each popular search once so later runs hit the cache. Individual failures are
/// logged and skipped. Returns how many searches were cached.
pub async fn warm_listing_cache(fetcher: Arc<dyn Fetcher>, template: String, pause: Duration) -> usize {
    info!(
        "Starting listing cache warm-up with {} popular searches",
        POPULAR_SEARCHES.len()
    );

    let mut cached = 0;
    for (i, query) in POPULAR_SEARCHES.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }
        match fetcher.fetch(&search_url(&template, query)).await {
            Ok(_) => {
                cached += 1;
                info!("Cached listing for '{query}'");
            }
            Err(e) => warn!("Failed to cache '{query}': {e}"),
        }
    }

    info!(
        "Listing cache warm-up complete: {cached}/{} searches cached",
        POPULAR_SEARCHES.len()
    );
    cached
}
