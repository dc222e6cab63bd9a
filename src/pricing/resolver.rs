use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Duration;

use super::cache::PriceCache;
use super::sources::{
    AggregatorSource, BondingCurveSource, MarketDataSource, PriceSource, SourceOutcome,
};
use super::{PriceProvider, PriceQuote, PriceSourceTag};
use crate::arguments::is_debug_pricing_enabled;
use crate::config::PricingConfig;
use crate::errors::CopyTraderError;
use crate::logger::{self, LogTag};
use crate::rpc::RpcClient;
use crate::utils::short_mint;

/// Priority-ordered price resolution with caching and failure backoff
///
/// Owns its cache; nothing else reads or writes it. The lock is never held
/// across an await.
pub struct PriceResolver {
    sources: Vec<Arc<dyn PriceSource>>,
    cache: Mutex<PriceCache>,
}

impl PriceResolver {
    /// Sources are sorted by kind priority; an absent kind is simply skipped
    pub fn new(mut sources: Vec<Arc<dyn PriceSource>>, config: &PricingConfig) -> Self {
        sources.sort_by_key(|s| s.kind().priority());
        Self {
            sources,
            cache: Mutex::new(PriceCache::new(
                Duration::from_millis(config.cache_ttl_ms),
                config.failure_threshold,
                Duration::from_secs(config.failure_cooloff_secs),
            )),
        }
    }

    /// Production source chain: bonding curve, then the enabled HTTP sources
    pub fn from_config(
        rpc: Arc<dyn RpcClient>,
        config: &PricingConfig,
    ) -> Result<Self, CopyTraderError> {
        let mut sources: Vec<Arc<dyn PriceSource>> =
            vec![Arc::new(BondingCurveSource::new(rpc.clone()))];
        if config.aggregator_enabled {
            sources.push(Arc::new(AggregatorSource::new(config)?.with_rpc(rpc)));
        }
        if config.market_data_enabled {
            sources.push(Arc::new(MarketDataSource::new(config)?));
        }
        Ok(Self::new(sources, config))
    }

    /// Drop every cached quote and backoff entry
    pub fn reset(&self) {
        self.cache.lock().clear();
    }

    /// Peek the last cached quote without touching the network
    pub fn cached(&self, mint: &str) -> Option<PriceQuote> {
        self.cache.lock().get_last(mint)
    }

    pub async fn resolve_quote(&self, mint: &str, force_fresh: bool) -> PriceQuote {
        if !force_fresh {
            let mut cache = self.cache.lock();
            if cache.is_suppressed(mint) {
                if is_debug_pricing_enabled() {
                    logger::debug(
                        LogTag::Pricing,
                        &format!("{} suppressed by failure backoff", short_mint(mint)),
                    );
                }
                return match cache.get_last(mint) {
                    Some(mut quote) => {
                        quote.stale = true;
                        quote
                    }
                    None => PriceQuote::unpriced(
                        mint,
                        PriceSourceTag::Skipped,
                        "repeated resolution failures, backing off",
                    ),
                };
            }
            if let Some(quote) = cache.get_fresh(mint) {
                return quote;
            }
        }

        let mut graduated = false;
        let mut bonding_progress = None;
        let mut misses: Vec<String> = Vec::new();

        for source in &self.sources {
            let kind = source.kind();
            match source.fetch(mint).await {
                Ok(SourceOutcome::Price {
                    price,
                    bonding_progress: progress,
                }) if price.is_finite() && price > 0.0 => {
                    let quote = PriceQuote::priced(
                        mint,
                        price,
                        kind.tag(),
                        progress.or(bonding_progress),
                        graduated,
                    );
                    let mut cache = self.cache.lock();
                    cache.clear_failure(mint);
                    cache.store(quote.clone());
                    if is_debug_pricing_enabled() {
                        logger::debug(
                            LogTag::Pricing,
                            &format!(
                                "{} priced {:.12} SOL via {}{}",
                                short_mint(mint),
                                price,
                                kind.tag(),
                                if graduated { " (graduated)" } else { "" }
                            ),
                        );
                    }
                    return quote;
                }
                Ok(SourceOutcome::Price { price, .. }) => {
                    misses.push(format!("{}: unusable price {}", kind.tag(), price));
                }
                Ok(SourceOutcome::Graduated {
                    bonding_progress: progress,
                }) => {
                    graduated = true;
                    bonding_progress = progress;
                    if is_debug_pricing_enabled() {
                        logger::debug(
                            LogTag::Pricing,
                            &format!("{} curve complete, trying exchange sources", short_mint(mint)),
                        );
                    }
                }
                Ok(SourceOutcome::Miss(reason)) => {
                    misses.push(format!("{}: {}", kind.tag(), reason));
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Pricing,
                        &format!("{} source failed for {}: {}", kind.tag(), mint, e),
                    );
                    misses.push(format!("{}: {}", kind.tag(), e));
                }
            }
        }

        let mut cache = self.cache.lock();
        let failures = cache.record_failure(mint);
        if is_debug_pricing_enabled() {
            logger::debug(
                LogTag::Pricing,
                &format!(
                    "{} unresolved (failure #{}): {}",
                    short_mint(mint),
                    failures,
                    misses.join("; ")
                ),
            );
        }

        match cache.get_last(mint) {
            Some(mut quote) => {
                quote.stale = true;
                quote.graduated |= graduated;
                quote
            }
            None => {
                let mut quote =
                    PriceQuote::unpriced(mint, PriceSourceTag::None, "no source returned a price");
                quote.graduated = graduated;
                quote.bonding_progress = bonding_progress;
                quote
            }
        }
    }
}

#[async_trait]
impl PriceProvider for PriceResolver {
    async fn resolve(&self, mint: &str, force_fresh: bool) -> PriceQuote {
        self.resolve_quote(mint, force_fresh).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::sources::bonding_curve::{
        derive_bonding_curve_address, encode_curve_account, BondingCurveState,
    };
    use crate::pricing::sources::SourceKind;
    use crate::rpc::testing::MockRpcClient;
    use solana_sdk::pubkey::Pubkey;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        kind: SourceKind,
        outcomes: Mutex<VecDeque<SourceOutcome>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(kind: SourceKind, outcomes: Vec<SourceOutcome>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch(&self, _mint: &str) -> Result<SourceOutcome, CopyTraderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock();
            let outcome = if outcomes.len() > 1 {
                outcomes.pop_front()
            } else {
                outcomes.front().cloned()
            };
            Ok(outcome.unwrap_or_else(|| SourceOutcome::Miss("scripted".to_string())))
        }
    }

    fn curve_state(complete: bool) -> BondingCurveState {
        BondingCurveState {
            virtual_token_reserves: 1_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 700_000_000_000_000,
            real_sol_reserves: 2_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
            complete,
        }
    }

    fn resolver_with_curve(complete: bool) -> (PriceResolver, Arc<MockRpcClient>, String) {
        let rpc = Arc::new(MockRpcClient::new());
        let mint = Pubkey::new_unique();
        let curve = derive_bonding_curve_address(&mint).unwrap();
        rpc.set_account(curve, encode_curve_account(&curve_state(complete)));
        let resolver = PriceResolver::new(
            vec![Arc::new(BondingCurveSource::new(rpc.clone()))],
            &PricingConfig::default(),
        );
        (resolver, rpc, mint.to_string())
    }

    #[tokio::test]
    async fn test_bonding_curve_price() {
        let (resolver, _rpc, mint) = resolver_with_curve(false);
        let quote = resolver.resolve(&mint, false).await;
        assert_eq!(quote.source, PriceSourceTag::BondingCurve);
        assert!(!quote.graduated);
        assert!((quote.price.unwrap() - 30.0 / 1_000_000.0).abs() < 1e-15);
        let progress = quote.bonding_progress.unwrap();
        assert!(progress > 0.11 && progress < 0.12);
    }

    #[tokio::test]
    async fn test_graduated_curve_is_not_authoritative() {
        let (resolver, _rpc, mint) = resolver_with_curve(true);
        let quote = resolver.resolve(&mint, false).await;
        assert!(quote.graduated);
        assert_ne!(quote.source, PriceSourceTag::BondingCurve);
        assert!(quote.price.is_none());
        assert_eq!(quote.source, PriceSourceTag::None);
    }

    #[tokio::test]
    async fn test_graduated_curve_falls_through_to_aggregator() {
        let rpc = Arc::new(MockRpcClient::new());
        let mint = Pubkey::new_unique();
        let curve = derive_bonding_curve_address(&mint).unwrap();
        rpc.set_account(curve, encode_curve_account(&curve_state(true)));
        let aggregator = ScriptedSource::new(
            SourceKind::Aggregator,
            vec![SourceOutcome::Price {
                price: 0.0004,
                bonding_progress: None,
            }],
        );
        let resolver = PriceResolver::new(
            vec![aggregator.clone(), Arc::new(BondingCurveSource::new(rpc))],
            &PricingConfig::default(),
        );

        let quote = resolver.resolve(&mint.to_string(), false).await;
        assert_eq!(quote.source, PriceSourceTag::Aggregator);
        assert_eq!(quote.price, Some(0.0004));
        assert!(quote.graduated);
    }

    #[tokio::test]
    async fn test_cached_quote_is_returned_verbatim() {
        tokio::time::pause();
        let (resolver, rpc, mint) = resolver_with_curve(false);

        let first = resolver.resolve(&mint, false).await;
        let second = resolver.resolve(&mint, false).await;
        assert_eq!(first, second);
        assert_eq!(rpc.account_reads(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        resolver.resolve(&mint, false).await;
        assert_eq!(rpc.account_reads(), 2);

        resolver.resolve(&mint, true).await;
        assert_eq!(rpc.account_reads(), 3);
    }

    #[tokio::test]
    async fn test_backoff_suppresses_fourth_attempt() {
        tokio::time::pause();
        let curve = ScriptedSource::new(SourceKind::BondingCurve, vec![]);
        let aggregator = ScriptedSource::new(SourceKind::Aggregator, vec![]);
        let market = ScriptedSource::new(SourceKind::MarketData, vec![]);
        let resolver = PriceResolver::new(
            vec![curve.clone(), aggregator.clone(), market.clone()],
            &PricingConfig::default(),
        );

        for _ in 0..3 {
            let quote = resolver.resolve("dead", false).await;
            assert_eq!(quote.source, PriceSourceTag::None);
            assert!(quote.price.is_none());
            assert!(quote.error.is_some());
        }
        assert_eq!(curve.calls(), 3);

        let quote = resolver.resolve("dead", false).await;
        assert_eq!(quote.source, PriceSourceTag::Skipped);
        assert_eq!(curve.calls(), 3);
        assert_eq!(aggregator.calls(), 3);
        assert_eq!(market.calls(), 3);

        // force_fresh bypasses the backoff
        resolver.resolve("dead", true).await;
        assert_eq!(curve.calls(), 4);

        // cool-off expiry re-enables lookups
        tokio::time::advance(Duration::from_secs(61)).await;
        resolver.resolve("dead", false).await;
        assert_eq!(curve.calls(), 5);
    }

    #[tokio::test]
    async fn test_miss_after_success_returns_stale_cache() {
        tokio::time::pause();
        let market = ScriptedSource::new(
            SourceKind::MarketData,
            vec![
                SourceOutcome::Price {
                    price: 0.001,
                    bonding_progress: None,
                },
                SourceOutcome::Miss("gone".to_string()),
            ],
        );
        let resolver = PriceResolver::new(vec![market.clone()], &PricingConfig::default());

        let fresh = resolver.resolve("mint", false).await;
        assert!(!fresh.stale);

        tokio::time::advance(Duration::from_secs(10)).await;
        let stale = resolver.resolve("mint", false).await;
        assert!(stale.stale);
        assert_eq!(stale.price, Some(0.001));
        assert_eq!(stale.source, PriceSourceTag::MarketData);
    }

    #[tokio::test]
    async fn test_success_clears_backoff_and_reset_clears_cache() {
        let market = ScriptedSource::new(
            SourceKind::MarketData,
            vec![
                SourceOutcome::Miss("a".to_string()),
                SourceOutcome::Miss("b".to_string()),
                SourceOutcome::Price {
                    price: 0.002,
                    bonding_progress: None,
                },
            ],
        );
        let resolver = PriceResolver::new(vec![market], &PricingConfig::default());
        resolver.resolve("mint", false).await;
        resolver.resolve("mint", false).await;
        let quote = resolver.resolve("mint", false).await;
        assert_eq!(quote.price, Some(0.002));
        assert!(resolver.cache.lock().failure_entry("mint").is_none());

        assert!(resolver.cached("mint").is_some());
        resolver.reset();
        assert!(resolver.cached("mint").is_none());
    }
}
