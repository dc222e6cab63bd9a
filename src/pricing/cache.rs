use std::collections::HashMap;
use tokio::time::{Duration, Instant};

use super::PriceQuote;

/// Consecutive resolution misses for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureBackoffEntry {
    pub count: u32,
    pub last_failure: Instant,
}

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: PriceQuote,
    cached_at: Instant,
}

/// Process-local quote cache and failure backoff map
///
/// Uses tokio's clock so tests can drive time with `tokio::time::pause()`.
#[derive(Debug)]
pub struct PriceCache {
    quotes: HashMap<String, CachedQuote>,
    failures: HashMap<String, FailureBackoffEntry>,
    cache_ttl: Duration,
    failure_threshold: u32,
    failure_cooloff: Duration,
}

impl PriceCache {
    pub fn new(cache_ttl: Duration, failure_threshold: u32, failure_cooloff: Duration) -> Self {
        Self {
            quotes: HashMap::new(),
            failures: HashMap::new(),
            cache_ttl,
            failure_threshold,
            failure_cooloff,
        }
    }

    /// Cached quote younger than the TTL, returned verbatim
    pub fn get_fresh(&self, mint: &str) -> Option<PriceQuote> {
        self.quotes
            .get(mint)
            .filter(|c| c.cached_at.elapsed() < self.cache_ttl)
            .map(|c| c.quote.clone())
    }

    /// Last cached quote regardless of age; marked stale once past the TTL
    pub fn get_last(&self, mint: &str) -> Option<PriceQuote> {
        self.quotes.get(mint).map(|c| {
            let mut quote = c.quote.clone();
            if c.cached_at.elapsed() >= self.cache_ttl {
                quote.stale = true;
            }
            quote
        })
    }

    pub fn store(&mut self, quote: PriceQuote) {
        self.prune();
        self.quotes.insert(
            quote.mint.clone(),
            CachedQuote {
                quote,
                cached_at: Instant::now(),
            },
        );
    }

    /// Count a miss. Misses older than the cool-off window start a new streak.
    pub fn record_failure(&mut self, mint: &str) -> u32 {
        self.prune();
        let now = Instant::now();
        let cooloff = self.failure_cooloff;
        let entry = self
            .failures
            .entry(mint.to_string())
            .or_insert(FailureBackoffEntry {
                count: 0,
                last_failure: now,
            });
        if now.duration_since(entry.last_failure) >= cooloff {
            entry.count = 0;
        }
        entry.count += 1;
        entry.last_failure = now;
        entry.count
    }

    /// Drop quotes and failure streaks older than the cool-off window (or
    /// the TTL, if longer) so mints no longer tracked don't accumulate
    pub fn prune(&mut self) {
        let retention = self.cache_ttl.max(self.failure_cooloff);
        let cooloff = self.failure_cooloff;
        self.quotes.retain(|_, c| c.cached_at.elapsed() < retention);
        self.failures.retain(|_, f| f.last_failure.elapsed() < cooloff);
    }

    pub fn clear_failure(&mut self, mint: &str) {
        self.failures.remove(mint);
    }

    /// Threshold reached inside the cool-off window. Expired entries are dropped.
    pub fn is_suppressed(&mut self, mint: &str) -> bool {
        let Some(entry) = self.failures.get(mint).copied() else {
            return false;
        };
        if entry.last_failure.elapsed() >= self.failure_cooloff {
            self.failures.remove(mint);
            return false;
        }
        entry.count >= self.failure_threshold
    }

    pub fn failure_entry(&self, mint: &str) -> Option<FailureBackoffEntry> {
        self.failures.get(mint).copied()
    }

    pub fn clear(&mut self) {
        self.quotes.clear();
        self.failures.clear();
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceSourceTag;

    fn cache() -> PriceCache {
        PriceCache::new(Duration::from_secs(5), 3, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_ttl_and_stale_marking() {
        tokio::time::pause();
        let mut cache = cache();
        cache.store(PriceQuote::priced(
            "mint",
            0.5,
            PriceSourceTag::Aggregator,
            None,
            false,
        ));

        assert!(cache.get_fresh("mint").is_some());
        assert!(!cache.get_last("mint").unwrap().stale);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get_fresh("mint").is_none());
        assert!(cache.get_last("mint").unwrap().stale);
    }

    #[tokio::test]
    async fn test_failure_streak_and_cooloff() {
        tokio::time::pause();
        let mut cache = cache();

        assert_eq!(cache.record_failure("mint"), 1);
        assert_eq!(cache.record_failure("mint"), 2);
        assert!(!cache.is_suppressed("mint"));
        assert_eq!(cache.record_failure("mint"), 3);
        assert!(cache.is_suppressed("mint"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.is_suppressed("mint"));
        assert!(cache.failure_entry("mint").is_none());
    }

    #[tokio::test]
    async fn test_old_entries_pruned_on_write() {
        tokio::time::pause();
        let mut cache = cache();
        cache.store(PriceQuote::priced("old", 0.5, PriceSourceTag::Aggregator, None, false));
        cache.record_failure("gone");
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.store(PriceQuote::priced("mid", 0.5, PriceSourceTag::Aggregator, None, false));
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.store(PriceQuote::priced("new", 0.5, PriceSourceTag::Aggregator, None, false));
        assert!(cache.get_last("old").is_none());
        assert!(cache.get_last("mid").is_some());
        assert!(cache.failure_entry("gone").is_none());
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.record_failure("other");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_old_misses_start_new_streak() {
        tokio::time::pause();
        let mut cache = cache();
        cache.record_failure("mint");
        cache.record_failure("mint");
        tokio::time::advance(Duration::from_secs(70)).await;
        assert_eq!(cache.record_failure("mint"), 1);
    }
}
