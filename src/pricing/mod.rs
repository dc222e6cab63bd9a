/// Price resolution
///
/// A quote comes from the first source in a fixed priority order that answers:
/// bonding curve account, then the quote aggregator, then the market-data
/// fallback. Results are cached briefly and instruments that keep missing are
/// backed off.
pub mod cache;
pub mod graduation;
pub mod resolver;
pub mod sources;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::{FailureBackoffEntry, PriceCache};
pub use graduation::{
    BondingCurveVenueCheck, GraduationDetector, GraduationReason, GraduationStatus, VenueCheck,
};
pub use resolver::PriceResolver;
pub use sources::{PriceSource, SourceKind, SourceOutcome};

/// Where a quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceSourceTag {
    #[serde(rename = "pumpfun")]
    BondingCurve,
    #[serde(rename = "jupiter")]
    Aggregator,
    #[serde(rename = "dexscreener")]
    MarketData,
    /// Every source missed
    #[serde(rename = "none")]
    None,
    /// Suppressed by failure backoff; no network call was made
    #[serde(rename = "skipped")]
    Skipped,
}

impl PriceSourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSourceTag::BondingCurve => "pumpfun",
            PriceSourceTag::Aggregator => "jupiter",
            PriceSourceTag::MarketData => "dexscreener",
            PriceSourceTag::None => "none",
            PriceSourceTag::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for PriceSourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one resolution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub mint: String,
    /// SOL per whole token
    pub price: Option<f64>,
    pub source: PriceSourceTag,
    /// Bonding curve completion fraction in [0, 1], when the curve was read
    pub bonding_progress: Option<f64>,
    pub graduated: bool,
    pub timestamp: DateTime<Utc>,
    /// Served from cache past its freshness window
    pub stale: bool,
    /// Why `price` is missing
    pub error: Option<String>,
}

impl PriceQuote {
    pub fn priced(
        mint: &str,
        price: f64,
        source: PriceSourceTag,
        bonding_progress: Option<f64>,
        graduated: bool,
    ) -> Self {
        Self {
            mint: mint.to_string(),
            price: Some(price),
            source,
            bonding_progress,
            graduated,
            timestamp: Utc::now(),
            stale: false,
            error: None,
        }
    }

    pub fn unpriced(mint: &str, source: PriceSourceTag, error: impl Into<String>) -> Self {
        Self {
            mint: mint.to_string(),
            price: None,
            source,
            bonding_progress: None,
            graduated: false,
            timestamp: Utc::now(),
            stale: false,
            error: Some(error.into()),
        }
    }

    /// Usable price (present, finite, positive)
    pub fn usable_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Usable price from a quote that is not stale; what exit rules act on
    pub fn fresh_price(&self) -> Option<f64> {
        if self.stale {
            return None;
        }
        self.usable_price()
    }
}

/// Anything that can hand out quotes; implemented by `PriceResolver`
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn resolve(&self, mint: &str, force_fresh: bool) -> PriceQuote;
}
