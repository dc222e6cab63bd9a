use chrono::{DateTime, Utc};

use super::types::Position;
use crate::swaps::Venue;

/// Mutations applied to an open position between entry and close
#[derive(Debug, Clone, PartialEq)]
pub enum PositionTransition {
    /// A monitoring tick priced the position
    PriceObserved { price: f64, pnl_percent: f64 },
    /// Bonding curve completed; exits move to the exchange venue
    Graduated {
        at: DateTime<Utc>,
        price: Option<f64>,
    },
}

impl PositionTransition {
    /// Apply to `position`; returns whether anything changed
    pub fn apply(&self, position: &mut Position) -> bool {
        match self {
            Self::PriceObserved { price, pnl_percent } => {
                let mut changed = false;
                if *price > position.max_price {
                    position.max_price = *price;
                    changed = true;
                }
                if *pnl_percent > position.max_pnl_percent {
                    position.max_pnl_percent = *pnl_percent;
                    changed = true;
                }
                changed
            }
            Self::Graduated { at, price } => {
                // Only the first detection is recorded
                if position.graduated {
                    return false;
                }
                position.graduated = true;
                position.graduated_at = Some(*at);
                position.graduation_price = *price;
                position.venue = Venue::Exchange;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::open(
            "mint", "wallet", "copy", 0.001, 1.0, 1_000.0, Venue::BondingCurve, None, 1, false,
        )
    }

    #[test]
    fn test_price_observed_tracks_maxima() {
        let mut p = position();
        assert!(PositionTransition::PriceObserved {
            price: 0.002,
            pnl_percent: 90.0
        }
        .apply(&mut p));
        assert!(!PositionTransition::PriceObserved {
            price: 0.0015,
            pnl_percent: 40.0
        }
        .apply(&mut p));
        assert_eq!(p.max_price, 0.002);
        assert_eq!(p.max_pnl_percent, 90.0);
    }

    #[test]
    fn test_graduation_recorded_once() {
        let mut p = position();
        let first = Utc::now();
        assert!(PositionTransition::Graduated {
            at: first,
            price: Some(0.003)
        }
        .apply(&mut p));
        assert_eq!(p.venue, Venue::Exchange);

        assert!(!PositionTransition::Graduated {
            at: Utc::now(),
            price: Some(0.009)
        }
        .apply(&mut p));
        assert_eq!(p.graduated_at, Some(first));
        assert_eq!(p.graduation_price, Some(0.003));
    }
}
