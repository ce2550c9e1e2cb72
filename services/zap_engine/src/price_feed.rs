//! USD price feed with an explicitly injected TTL cache
//!
//! The cache is an ordinary value owned by whoever builds the service, so
//! separate services (and tests) never share price state.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use types::Address;

use crate::logging::LogEmoji;
use crate::router_client::RouterClient;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price of one whole token
    async fn usd_price(&self, token: Address) -> Result<Decimal>;
}

/// Prices from the aggregator's price endpoint
pub struct RouterPriceSource {
    client: Arc<RouterClient>,
}

impl RouterPriceSource {
    pub fn new(client: Arc<RouterClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceSource for RouterPriceSource {
    async fn usd_price(&self, token: Address) -> Result<Decimal> {
        let price = self.client.token_price(token).await?;
        debug!("{} {:?} = ${}", LogEmoji::MONEY, token, price);
        Ok(price)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Decimal,
    fetched_at: Instant,
}

/// Thread-safe price cache with a fixed time-to-live
pub struct PriceCache {
    entries: DashMap<Address, CachedPrice>,
    ttl: Duration,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh entry, if any
    pub fn get(&self, token: Address) -> Option<Decimal> {
        let entry = self.entries.get(&token)?;
        if entry.fetched_at.elapsed() <= self.ttl {
            Some(entry.price)
        } else {
            None
        }
    }

    pub fn insert(&self, token: Address, price: Decimal) {
        self.entries.insert(
            token,
            CachedPrice {
                price,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.fetched_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Any [`PriceSource`] fronted by a [`PriceCache`]
pub struct CachedPriceSource {
    inner: Arc<dyn PriceSource>,
    cache: Arc<PriceCache>,
}

impl CachedPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>, cache: Arc<PriceCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl PriceSource for CachedPriceSource {
    async fn usd_price(&self, token: Address) -> Result<Decimal> {
        if let Some(price) = self.cache.get(token) {
            debug!("Using cached price for {:?}: {}", token, price);
            return Ok(price);
        }
        self.cache.purge_expired();
        // Failures are not cached; the next quote asks again
        let price = self.inner.usd_price(token).await?;
        self.cache.insert(token, price);
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn usd_price(&self, _token: Address) -> Result<Decimal> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Decimal::new(150, 2))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PriceSource for FailingSource {
        async fn usd_price(&self, token: Address) -> Result<Decimal> {
            anyhow::bail!("no price for {:?}", token)
        }
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_lookups() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(PriceCache::new(Duration::from_secs(60)));
        let cached = CachedPriceSource::new(source.clone(), cache.clone());

        let token = Address::repeat_byte(1);
        assert_eq!(cached.usd_price(token).await.unwrap(), Decimal::new(15, 1));
        assert_eq!(cached.usd_price(token).await.unwrap(), Decimal::new(15, 1));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(PriceCache::new(Duration::ZERO));
        let cached = CachedPriceSource::new(source.clone(), cache.clone());

        let token = Address::repeat_byte(1);
        cached.usd_price(token).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cached.usd_price(token).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_miss_evicts_stale_entries() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(PriceCache::new(Duration::ZERO));
        let cached = CachedPriceSource::new(source.clone(), cache.clone());

        cached.usd_price(Address::repeat_byte(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cached.usd_price(Address::repeat_byte(2)).await.unwrap();

        // Only the entry fetched on the second miss remains
        assert_eq!(cache.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = Arc::new(PriceCache::new(Duration::from_secs(60)));
        let cached = CachedPriceSource::new(Arc::new(FailingSource), cache.clone());
        assert!(cached.usd_price(Address::repeat_byte(1)).await.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_separate_caches_are_independent() {
        let a = PriceCache::new(Duration::from_secs(60));
        let b = PriceCache::new(Duration::from_secs(60));
        a.insert(Address::repeat_byte(1), Decimal::ONE);
        assert_eq!(a.get(Address::repeat_byte(1)), Some(Decimal::ONE));
        assert_eq!(b.get(Address::repeat_byte(1)), None);
    }
}
