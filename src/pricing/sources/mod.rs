/// Price sources
///
/// Each source answers with a price, a "graduated" notice (bonding curve only)
/// or a soft miss. Transport failures are errors; the resolver logs them and
/// treats them as a miss for that attempt.
pub mod aggregator;
pub mod bonding_curve;
pub mod market_data;

use async_trait::async_trait;

use super::PriceSourceTag;
use crate::errors::CopyTraderError;

pub use aggregator::AggregatorSource;
pub use bonding_curve::{BondingCurveSource, BondingCurveState, CurveLookup};
pub use market_data::MarketDataSource;

/// Source capability, in resolution priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    BondingCurve,
    Aggregator,
    MarketData,
}

impl SourceKind {
    pub fn priority(&self) -> u8 {
        match self {
            SourceKind::BondingCurve => 1,
            SourceKind::Aggregator => 2,
            SourceKind::MarketData => 3,
        }
    }

    pub fn tag(&self) -> PriceSourceTag {
        match self {
            SourceKind::BondingCurve => PriceSourceTag::BondingCurve,
            SourceKind::Aggregator => PriceSourceTag::Aggregator,
            SourceKind::MarketData => PriceSourceTag::MarketData,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Price {
        /// SOL per whole token
        price: f64,
        bonding_progress: Option<f64>,
    },
    /// The curve completed; its price is no longer authoritative
    Graduated { bonding_progress: Option<f64> },
    /// No answer from this source (no account, no route, no listing)
    Miss(String),
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, mint: &str) -> Result<SourceOutcome, CopyTraderError>;
}

/// Shared HTTP client builder for the HTTP-backed sources
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, CopyTraderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| CopyTraderError::network(format!("Failed to build HTTP client: {}", e)))
}
