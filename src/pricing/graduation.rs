/// Graduation detection
///
/// An instrument graduates when its bonding curve completes and trading moves
/// to general exchanges. The direct curve check is preferred; the latest quote
/// is the fallback.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::sources::{BondingCurveSource, CurveLookup};
use super::{PriceProvider, PriceSourceTag};
use crate::errors::CopyTraderError;
use crate::logger::{self, LogTag};
use crate::rpc::RpcClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraduationReason {
    /// Venue membership check reported the curve complete
    VenueCheck,
    /// Latest quote carried the graduated flag
    QuoteFlag,
    /// Latest quote came from the exchange aggregator
    AggregatorSource,
    NotGraduated,
    /// No check could decide (no curve account and no price)
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraduationStatus {
    pub graduated: bool,
    pub reason: GraduationReason,
}

impl GraduationStatus {
    fn new(graduated: bool, reason: GraduationReason) -> Self {
        Self { graduated, reason }
    }
}

/// Dedicated venue-membership check
#[async_trait]
pub trait VenueCheck: Send + Sync {
    /// `Some(true)` graduated, `Some(false)` still on the curve, `None` undecided
    async fn is_graduated(&self, mint: &str) -> Result<Option<bool>, CopyTraderError>;
}

/// Reads the curve account's completion flag directly
pub struct BondingCurveVenueCheck {
    curve: BondingCurveSource,
}

impl BondingCurveVenueCheck {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self {
            curve: BondingCurveSource::new(rpc),
        }
    }
}

#[async_trait]
impl VenueCheck for BondingCurveVenueCheck {
    async fn is_graduated(&self, mint: &str) -> Result<Option<bool>, CopyTraderError> {
        Ok(match self.curve.lookup(mint).await? {
            CurveLookup::Found(state) => Some(state.complete),
            CurveLookup::Absent(_) => None,
        })
    }
}

pub struct GraduationDetector {
    venue_check: Option<Arc<dyn VenueCheck>>,
    prices: Arc<dyn PriceProvider>,
}

impl GraduationDetector {
    pub fn new(venue_check: Option<Arc<dyn VenueCheck>>, prices: Arc<dyn PriceProvider>) -> Self {
        Self {
            venue_check,
            prices,
        }
    }

    pub async fn has_graduated(&self, mint: &str) -> GraduationStatus {
        if let Some(check) = &self.venue_check {
            match check.is_graduated(mint).await {
                Ok(Some(true)) => {
                    return GraduationStatus::new(true, GraduationReason::VenueCheck)
                }
                Ok(Some(false)) => {
                    return GraduationStatus::new(false, GraduationReason::NotGraduated)
                }
                Ok(None) => {}
                Err(e) => {
                    logger::warning(
                        LogTag::Graduation,
                        &format!("Venue check failed for {}: {}", mint, e),
                    );
                }
            }
        }

        let quote = self.prices.resolve(mint, false).await;
        if quote.graduated {
            GraduationStatus::new(true, GraduationReason::QuoteFlag)
        } else if quote.source == PriceSourceTag::Aggregator {
            GraduationStatus::new(true, GraduationReason::AggregatorSource)
        } else if quote.usable_price().is_none() {
            GraduationStatus::new(false, GraduationReason::Unknown)
        } else {
            GraduationStatus::new(false, GraduationReason::NotGraduated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::sources::bonding_curve::{
        derive_bonding_curve_address, encode_curve_account, BondingCurveState,
    };
    use crate::pricing::PriceQuote;
    use crate::rpc::testing::MockRpcClient;
    use solana_sdk::pubkey::Pubkey;

    struct FixedPrices(PriceQuote);

    #[async_trait]
    impl PriceProvider for FixedPrices {
        async fn resolve(&self, _mint: &str, _force_fresh: bool) -> PriceQuote {
            self.0.clone()
        }
    }

    fn prices(source: PriceSourceTag, graduated: bool) -> Arc<dyn PriceProvider> {
        Arc::new(FixedPrices(PriceQuote::priced(
            "mint", 0.001, source, None, graduated,
        )))
    }

    #[tokio::test]
    async fn test_quote_fallback() {
        let detector = GraduationDetector::new(None, prices(PriceSourceTag::Aggregator, false));
        assert_eq!(
            detector.has_graduated("mint").await,
            GraduationStatus::new(true, GraduationReason::AggregatorSource)
        );

        let detector = GraduationDetector::new(None, prices(PriceSourceTag::MarketData, true));
        assert_eq!(
            detector.has_graduated("mint").await.reason,
            GraduationReason::QuoteFlag
        );

        let detector = GraduationDetector::new(None, prices(PriceSourceTag::BondingCurve, false));
        assert!(!detector.has_graduated("mint").await.graduated);
    }

    #[tokio::test]
    async fn test_venue_check_preferred() {
        let rpc = Arc::new(MockRpcClient::new());
        let mint = Pubkey::new_unique();
        rpc.set_account(
            derive_bonding_curve_address(&mint).unwrap(),
            encode_curve_account(&BondingCurveState {
                virtual_token_reserves: 1,
                virtual_sol_reserves: 1,
                real_token_reserves: 0,
                real_sol_reserves: 0,
                token_total_supply: 1,
                complete: true,
            }),
        );
        let check: Arc<dyn VenueCheck> = Arc::new(BondingCurveVenueCheck::new(rpc));
        let detector =
            GraduationDetector::new(Some(check), prices(PriceSourceTag::BondingCurve, false));

        let status = detector.has_graduated(&mint.to_string()).await;
        assert_eq!(status, GraduationStatus::new(true, GraduationReason::VenueCheck));

        // No curve account: falls back to the quote
        let status = detector.has_graduated(&Pubkey::new_unique().to_string()).await;
        assert_eq!(status.reason, GraduationReason::NotGraduated);
    }
}
