/// Exit triggers, checked in rank order; the first match wins
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::positions::CloseReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub reason: CloseReason,
    pub pnl_percent: f64,
    pub description: String,
    /// Lower wins: profit target 1 through max hold 5
    pub priority: u8,
}

impl ExitDecision {
    fn new(reason: CloseReason, pnl_percent: f64, description: String) -> Self {
        Self {
            reason,
            pnl_percent,
            description,
            priority: reason.priority(),
        }
    }
}

/// One tick's view of an open position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitInputs {
    pub price: f64,
    /// Fee-aware unrealized PnL
    pub pnl_percent: f64,
    /// Highest PnL ever observed, this tick included
    pub max_pnl_percent: f64,
    pub max_price: f64,
    pub sellers: usize,
    pub hold_secs: i64,
}

pub fn evaluate_exit(inputs: &ExitInputs, config: &StrategyConfig) -> Option<ExitDecision> {
    let pnl = inputs.pnl_percent;

    if pnl >= config.profit_target_percent {
        return Some(ExitDecision::new(
            CloseReason::ProfitTarget,
            pnl,
            format!(
                "profit {:.2}% reached target {:.2}%",
                pnl, config.profit_target_percent
            ),
        ));
    }

    // Armed only once the position has been in profit
    if inputs.max_pnl_percent > 0.0 && inputs.max_price > 0.0 {
        let stop_price = inputs.max_price * (1.0 - config.trailing_stop_percent / 100.0);
        if inputs.price <= stop_price {
            return Some(ExitDecision::new(
                CloseReason::TrailingStop,
                pnl,
                format!(
                    "price {:.10} fell {:.2}% below peak {:.10}",
                    inputs.price, config.trailing_stop_percent, inputs.max_price
                ),
            ));
        }
    }

    if pnl <= -config.stop_loss_percent {
        return Some(ExitDecision::new(
            CloseReason::StopLoss,
            pnl,
            format!("loss {:.2}% hit stop {:.2}%", pnl, config.stop_loss_percent),
        ));
    }

    if config.signal_follow_min_sellers > 0 && inputs.sellers >= config.signal_follow_min_sellers {
        return Some(ExitDecision::new(
            CloseReason::SignalFollow,
            pnl,
            format!("{} tracked wallets sold", inputs.sellers),
        ));
    }

    if let Some(max_hold) = config.max_hold_secs {
        if inputs.hold_secs > max_hold as i64 {
            return Some(ExitDecision::new(
                CloseReason::MaxHold,
                pnl,
                format!("held {}s, limit {}s", inputs.hold_secs, max_hold),
            ));
        }
    }

    None
}
