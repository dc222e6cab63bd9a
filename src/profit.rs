/// Fee-aware profit and loss
///
/// Deductions from gross proceeds always run in the same order:
/// round-trip venue fee (2 x per-side percent), then slippage on the
/// remainder, then the fixed network and priority fees in SOL. Percent
/// outputs are rounded to 4 decimals and SOL outputs to 9.
use serde::{Deserialize, Serialize};

use crate::arguments::is_debug_positions_enabled;
use crate::config::FeesConfig;
use crate::logger::{self, LogTag};
use crate::positions::Position;
use crate::swaps::Venue;
use crate::utils::{round_to, short_mint};

const PERCENT_DECIMALS: u32 = 4;
const SOL_DECIMALS: u32 = 9;

/// Each deduction between gross and net proceeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    pub gross_proceeds_sol: f64,
    /// Round-trip venue fee percent (both sides)
    pub venue_fee_percent: f64,
    pub venue_fee_sol: f64,
    pub slippage_percent: f64,
    pub slippage_sol: f64,
    pub fixed_fee_sol: f64,
    pub priority_fee_sol: f64,
    pub total_fees_sol: f64,
    pub net_proceeds_sol: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlResult {
    pub pnl_sol: f64,
    pub pnl_percent: f64,
    /// Raw exit/entry move, before any fee
    pub price_change_percent: f64,
    /// Total deductions as a percent of SOL spent
    pub fee_impact_percent: f64,
    pub breakdown: PnlBreakdown,
}

/// Realized PnL strays from the price move by more than fees explain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlDiscrepancy {
    pub price_change_percent: f64,
    pub pnl_percent: f64,
    pub fee_impact_percent: f64,
    /// Divergence left after subtracting the fee impact
    pub unexplained_percent: f64,
}

pub struct PnlAccountant {
    fees: FeesConfig,
}

impl PnlAccountant {
    pub fn new(fees: FeesConfig) -> Self {
        Self { fees }
    }

    /// Per-side fee percent for a venue. The construction endpoint on the
    /// bonding curve charges more than exchange routing.
    pub fn venue_fee_percent(&self, venue: Venue) -> f64 {
        match venue {
            Venue::BondingCurve => self.fees.bonding_curve_fee_percent,
            Venue::Exchange => self.fees.exchange_fee_percent,
        }
    }

    /// Realized PnL of a round trip. None when inputs can't be priced
    /// (non-positive or non-finite prices, quantity or spend).
    #[allow(clippy::too_many_arguments)]
    pub fn realized_pnl(
        &self,
        entry_price: f64,
        exit_price: f64,
        quantity: f64,
        sol_spent: f64,
        venue: Venue,
        slippage_percent: f64,
        fixed_fee_sol: f64,
        priority_fee_sol: f64,
    ) -> Option<PnlResult> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(entry_price) || !valid(exit_price) || !valid(quantity) || !valid(sol_spent) {
            return None;
        }

        let gross = exit_price * quantity;

        let venue_fee_percent = 2.0 * self.venue_fee_percent(venue);
        let venue_fee_sol = gross * venue_fee_percent / 100.0;
        let after_venue = gross - venue_fee_sol;

        let slippage_percent = slippage_percent.max(0.0);
        let slippage_sol = after_venue * slippage_percent / 100.0;
        let after_slippage = after_venue - slippage_sol;

        let fixed_fee_sol = fixed_fee_sol.max(0.0);
        let priority_fee_sol = priority_fee_sol.max(0.0);
        let net = after_slippage - fixed_fee_sol - priority_fee_sol;

        let total_fees = venue_fee_sol + slippage_sol + fixed_fee_sol + priority_fee_sol;
        let pnl_sol = net - sol_spent;

        Some(PnlResult {
            pnl_sol: round_to(pnl_sol, SOL_DECIMALS),
            pnl_percent: round_to(pnl_sol / sol_spent * 100.0, PERCENT_DECIMALS),
            price_change_percent: round_to(
                (exit_price - entry_price) / entry_price * 100.0,
                PERCENT_DECIMALS,
            ),
            fee_impact_percent: round_to(total_fees / sol_spent * 100.0, PERCENT_DECIMALS),
            breakdown: PnlBreakdown {
                gross_proceeds_sol: round_to(gross, SOL_DECIMALS),
                venue_fee_percent: round_to(venue_fee_percent, PERCENT_DECIMALS),
                venue_fee_sol: round_to(venue_fee_sol, SOL_DECIMALS),
                slippage_percent: round_to(slippage_percent, PERCENT_DECIMALS),
                slippage_sol: round_to(slippage_sol, SOL_DECIMALS),
                fixed_fee_sol: round_to(fixed_fee_sol, SOL_DECIMALS),
                priority_fee_sol: round_to(priority_fee_sol, SOL_DECIMALS),
                total_fees_sol: round_to(total_fees, SOL_DECIMALS),
                net_proceeds_sol: round_to(net, SOL_DECIMALS),
            },
        })
    }

    /// PnL of selling everything now at `current_price`, with the configured
    /// estimated slippage and network fee
    pub fn unrealized_pnl(
        &self,
        entry_price: f64,
        current_price: f64,
        quantity: f64,
        sol_spent: f64,
        venue: Venue,
        priority_fee_sol: f64,
    ) -> Option<PnlResult> {
        self.realized_pnl(
            entry_price,
            current_price,
            quantity,
            sol_spent,
            venue,
            self.fees.estimated_slippage_percent,
            self.fees.network_fee_sol,
            priority_fee_sol,
        )
    }

    pub fn unrealized_for_position(
        &self,
        position: &Position,
        current_price: f64,
        priority_fee_sol: f64,
    ) -> Option<PnlResult> {
        let result = self.unrealized_pnl(
            position.entry_price,
            current_price,
            position.quantity,
            position.sol_spent,
            position.venue,
            priority_fee_sol,
        );
        if result.is_none() && is_debug_positions_enabled() {
            logger::debug(
                LogTag::Profit,
                &format!(
                    "Cannot price {}: entry {} current {} qty {} spent {}",
                    short_mint(&position.mint),
                    position.entry_price,
                    current_price,
                    position.quantity,
                    position.sol_spent
                ),
            );
        }
        result
    }

    /// Diagnostic only. Flags a result whose price move and PnL differ by
    /// more than the fee impact plus the configured tolerance.
    pub fn check_discrepancy(&self, result: &PnlResult) -> Option<PnlDiscrepancy> {
        let divergence = (result.price_change_percent - result.pnl_percent).abs();
        let unexplained = divergence - result.fee_impact_percent;
        if unexplained.abs() <= self.fees.discrepancy_tolerance_percent {
            return None;
        }
        Some(PnlDiscrepancy {
            price_change_percent: result.price_change_percent,
            pnl_percent: result.pnl_percent,
            fee_impact_percent: result.fee_impact_percent,
            unexplained_percent: round_to(unexplained, PERCENT_DECIMALS),
        })
    }

    /// PnL from settled amounts (SOL in vs SOL out)
    pub fn settled_pnl(&self, sol_spent: f64, sol_received: f64) -> (f64, f64) {
        if !(sol_spent.is_finite() && sol_spent > 0.0) {
            return (0.0, 0.0);
        }
        let pnl = sol_received - sol_spent;
        (
            round_to(pnl, SOL_DECIMALS),
            round_to(pnl / sol_spent * 100.0, PERCENT_DECIMALS),
        )
    }

    /// Log a warning when a close's PnL needs a second look
    pub fn report_discrepancy(&self, mint: &str, result: &PnlResult) {
        if let Some(d) = self.check_discrepancy(result) {
            logger::warning(
                LogTag::Profit,
                &format!(
                    "PnL discrepancy on {}: price {:+.2}% vs pnl {:+.2}% (fees {:.2}%, unexplained {:+.2}%)",
                    short_mint(mint),
                    d.price_change_percent,
                    d.pnl_percent,
                    d.fee_impact_percent,
                    d.unexplained_percent
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accountant() -> PnlAccountant {
        PnlAccountant::new(FeesConfig::default())
    }

    #[test]
    fn test_round_trip_reference_value() {
        // gross 150, round-trip fee 3.5% = 5.25, net 144.75 against 100 spent
        let result = accountant()
            .realized_pnl(0.0001, 0.00015, 1_000_000.0, 100.0, Venue::BondingCurve, 0.0, 0.0, 0.0)
            .unwrap();
        assert_eq!(result.pnl_percent, 44.75);
        assert_eq!(result.pnl_sol, 44.75);
        assert_eq!(result.price_change_percent, 50.0);
        assert_eq!(result.fee_impact_percent, 5.25);
        assert_eq!(result.breakdown.venue_fee_percent, 3.5);
        assert_eq!(result.breakdown.net_proceeds_sol, 144.75);
        assert!(accountant().check_discrepancy(&result).is_none());
    }

    #[test]
    fn test_fee_order() {
        // 100 gross, 1% round trip -> 99, 2% slippage -> 97.02, minus 0.02 fixed
        let result = accountant()
            .realized_pnl(1.0, 1.0, 100.0, 100.0, Venue::Exchange, 2.0, 0.01, 0.01)
            .unwrap();
        assert_eq!(result.breakdown.venue_fee_sol, 1.0);
        assert_eq!(result.breakdown.slippage_sol, 1.98);
        assert_eq!(result.breakdown.net_proceeds_sol, 97.0);
        assert_eq!(result.pnl_percent, -3.0);
        assert_eq!(result.fee_impact_percent, 3.0);
    }

    #[test]
    fn test_unrealized_uses_estimates() {
        let acc = accountant();
        let unrealized = acc
            .unrealized_pnl(1.0, 1.0, 10.0, 10.0, Venue::Exchange, 0.0)
            .unwrap();
        assert!(unrealized.breakdown.slippage_percent > 0.0);
        assert!(unrealized.breakdown.fixed_fee_sol > 0.0);
        assert!(unrealized.pnl_percent < 0.0);
    }

    #[test]
    fn test_discrepancy_flagged() {
        // spent far more than entry_price * quantity: price flat, PnL deeply negative
        let result = accountant()
            .realized_pnl(1.0, 1.0, 100.0, 150.0, Venue::Exchange, 0.0, 0.0, 0.0)
            .unwrap();
        let d = accountant().check_discrepancy(&result).unwrap();
        assert!(d.unexplained_percent > 2.0);
    }

    #[test]
    fn test_invalid_inputs() {
        let acc = accountant();
        assert!(acc
            .realized_pnl(0.0, 1.0, 1.0, 1.0, Venue::Exchange, 0.0, 0.0, 0.0)
            .is_none());
        assert!(acc
            .realized_pnl(1.0, f64::NAN, 1.0, 1.0, Venue::Exchange, 0.0, 0.0, 0.0)
            .is_none());
        assert_eq!(acc.settled_pnl(0.0, 1.0), (0.0, 0.0));
        assert_eq!(acc.settled_pnl(1.0, 1.5), (0.5, 50.0));
    }
}
