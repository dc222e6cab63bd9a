/// Entry evaluation
///
/// Rules run in a fixed order and the first rejection wins: corroboration
/// (live only), rebuy block, cooldown, already open, open-position cap.
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::errors::CopyTraderError;
use crate::logger::{self, LogTag};
use crate::positions::{ClosedTradeRecord, Position, PositionStore};
use crate::signals::TradeSignal;
use crate::utils::short_mint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RebuyBlock {
    /// We already hold this mint on this wallet's signal
    OpenFromWallet,
    /// This wallet's trade on this mint was closed too recently
    RecentClose { secs_ago: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryRejection {
    InvalidSignal(String),
    BelowMinUpvotes { upvotes: u32, required: u32 },
    RebuyBlocked(RebuyBlock),
    Cooldown { remaining_secs: u64 },
    AlreadyOpen,
    MaxOpenPositions { open: usize, max: usize },
    /// A buy or sell for the mint is still running
    InFlight,
}

impl std::fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryRejection::InvalidSignal(reason) => write!(f, "invalid signal: {}", reason),
            EntryRejection::BelowMinUpvotes { upvotes, required } => {
                write!(f, "{} upvotes, {} required", upvotes, required)
            }
            EntryRejection::RebuyBlocked(RebuyBlock::OpenFromWallet) => {
                write!(f, "rebuy blocked: position from this wallet is open")
            }
            EntryRejection::RebuyBlocked(RebuyBlock::RecentClose { secs_ago }) => {
                write!(f, "rebuy blocked: closed {}s ago", secs_ago)
            }
            EntryRejection::Cooldown { remaining_secs } => {
                write!(f, "cooldown active ({}s left)", remaining_secs)
            }
            EntryRejection::AlreadyOpen => write!(f, "position already open"),
            EntryRejection::MaxOpenPositions { open, max } => {
                write!(f, "open positions at limit ({}/{})", open, max)
            }
            EntryRejection::InFlight => write!(f, "trade already in flight"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryApproval {
    /// 0-100, from corroborating wallets
    pub confidence: u8,
    pub sol_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Approved(EntryApproval),
    Rejected(EntryRejection),
}

/// Everything the rules look at, gathered by the engine
pub struct EntryContext<'a> {
    pub signal: &'a TradeSignal,
    pub simulation: bool,
    pub open_positions: &'a [Position],
    pub recent_history: &'a [ClosedTradeRecord],
    pub cooldown_remaining_secs: Option<u64>,
    pub now: DateTime<Utc>,
}

pub fn entry_confidence(upvotes: u32) -> u8 {
    match upvotes {
        1 => 30,
        2 => 70,
        n if n >= 3 => 95,
        _ => 50,
    }
}

/// Signal amount when it is in SOL, clamped to the configured bounds;
/// otherwise the default trade size
pub fn buy_size(signal: &TradeSignal, config: &StrategyConfig) -> f64 {
    match signal.amount_sol() {
        Some(amount) => amount.clamp(config.min_trade_sol, config.max_trade_sol),
        None => config.default_trade_sol,
    }
}

pub fn find_rebuy_block(
    mint: &str,
    wallet: &str,
    open_positions: &[Position],
    recent_history: &[ClosedTradeRecord],
    now: DateTime<Utc>,
    window_secs: i64,
) -> Option<RebuyBlock> {
    if open_positions
        .iter()
        .any(|p| p.is_open() && p.mint == mint && p.wallet == wallet)
    {
        return Some(RebuyBlock::OpenFromWallet);
    }

    recent_history
        .iter()
        .filter(|r| r.mint == mint && r.wallet == wallet)
        .map(|r| now.signed_duration_since(r.closed_at).num_seconds())
        .filter(|secs_ago| *secs_ago >= 0 && *secs_ago < window_secs)
        .min()
        .map(|secs_ago| RebuyBlock::RecentClose { secs_ago })
}

pub fn evaluate_entry(ctx: &EntryContext<'_>, config: &StrategyConfig) -> EntryDecision {
    let signal = ctx.signal;

    if signal.mint.trim().is_empty() || signal.wallet.trim().is_empty() {
        return EntryDecision::Rejected(EntryRejection::InvalidSignal(
            "missing mint or wallet".to_string(),
        ));
    }

    if signal.upvotes < config.min_upvotes {
        if ctx.simulation {
            logger::info(
                LogTag::Strategy,
                &format!(
                    "[SIMULATION] {} has {} upvotes (< {}), entering anyway",
                    short_mint(&signal.mint),
                    signal.upvotes,
                    config.min_upvotes
                ),
            );
        } else {
            return EntryDecision::Rejected(EntryRejection::BelowMinUpvotes {
                upvotes: signal.upvotes,
                required: config.min_upvotes,
            });
        }
    }

    if let Some(block) = find_rebuy_block(
        &signal.mint,
        &signal.wallet,
        ctx.open_positions,
        ctx.recent_history,
        ctx.now,
        config.rebuy_window_secs,
    ) {
        return EntryDecision::Rejected(EntryRejection::RebuyBlocked(block));
    }

    if let Some(remaining_secs) = ctx.cooldown_remaining_secs {
        return EntryDecision::Rejected(EntryRejection::Cooldown { remaining_secs });
    }

    if ctx
        .open_positions
        .iter()
        .any(|p| p.is_open() && p.mint == signal.mint)
    {
        return EntryDecision::Rejected(EntryRejection::AlreadyOpen);
    }

    let open = ctx.open_positions.iter().filter(|p| p.is_open()).count();
    if open >= config.max_open_positions {
        return EntryDecision::Rejected(EntryRejection::MaxOpenPositions {
            open,
            max: config.max_open_positions,
        });
    }

    EntryDecision::Approved(EntryApproval {
        confidence: entry_confidence(signal.upvotes),
        sol_amount: buy_size(signal, config),
    })
}

/// Close history for today plus `prior_days` earlier UTC days
pub async fn load_recent_history(
    store: &dyn PositionStore,
    now: DateTime<Utc>,
    prior_days: u32,
) -> Result<Vec<ClosedTradeRecord>, CopyTraderError> {
    let today: NaiveDate = now.date_naive();
    let mut records = Vec::new();
    for offset in 0..=i64::from(prior_days) {
        let day = today - Duration::days(offset);
        records.extend(store.history_for_day(day).await?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::CloseReason;
    use crate::swaps::Venue;

    fn record(mint: &str, wallet: &str, closed_at: DateTime<Utc>) -> ClosedTradeRecord {
        ClosedTradeRecord {
            mint: mint.to_string(),
            wallet: wallet.to_string(),
            strategy: "copy".to_string(),
            close_reason: CloseReason::StopLoss,
            entry_time: closed_at - Duration::seconds(60),
            closed_at,
            entry_price: 0.0001,
            exit_price: 0.00009,
            quantity: 1_000.0,
            sol_spent: 0.1,
            sol_received: 0.09,
            pnl_sol: -0.01,
            pnl_percent: -10.0,
            entry_signature: None,
            exit_signature: None,
            venue: Venue::BondingCurve,
            simulated: false,
        }
    }

    fn open(mint: &str, wallet: &str) -> Position {
        Position::open(mint, wallet, "copy", 0.0001, 0.1, 1_000.0, Venue::BondingCurve, None, 2, false)
    }

    fn decide(
        signal: &TradeSignal,
        open_positions: &[Position],
        history: &[ClosedTradeRecord],
        cooldown: Option<u64>,
        simulation: bool,
    ) -> EntryDecision {
        let ctx = EntryContext {
            signal,
            simulation,
            open_positions,
            recent_history: history,
            cooldown_remaining_secs: cooldown,
            now: Utc::now(),
        };
        evaluate_entry(&ctx, &StrategyConfig::default())
    }

    #[test]
    fn test_rebuy_window() {
        let now = Utc::now();
        let signal = TradeSignal::buy("X", "W", Some(0.05), 3);

        let recent = [record("X", "W", now - Duration::seconds(30))];
        assert!(matches!(
            decide(&signal, &[], &recent, None, false),
            EntryDecision::Rejected(EntryRejection::RebuyBlocked(RebuyBlock::RecentClose { .. }))
        ));

        let old = [record("X", "W", now - Duration::seconds(400))];
        assert!(matches!(
            decide(&signal, &[], &old, None, false),
            EntryDecision::Approved(_)
        ));

        // other wallet on the same mint is not a rebuy
        let other = [record("X", "V", now - Duration::seconds(30))];
        assert!(matches!(
            decide(&signal, &[], &other, None, false),
            EntryDecision::Approved(_)
        ));
    }

    #[test]
    fn test_rejection_order() {
        let signal = TradeSignal::buy("X", "W", None, 1);
        assert!(matches!(
            decide(&signal, &[], &[], None, false),
            EntryDecision::Rejected(EntryRejection::BelowMinUpvotes { upvotes: 1, required: 2 })
        ));
        // simulation ignores corroboration
        assert!(matches!(
            decide(&signal, &[], &[], None, true),
            EntryDecision::Approved(EntryApproval { confidence: 30, .. })
        ));

        let signal = TradeSignal::buy("X", "W", None, 2);
        assert!(matches!(
            decide(&signal, &[open("X", "W")], &[], Some(5), false),
            EntryDecision::Rejected(EntryRejection::RebuyBlocked(RebuyBlock::OpenFromWallet))
        ));
        assert!(matches!(
            decide(&signal, &[open("X", "V")], &[], Some(5), false),
            EntryDecision::Rejected(EntryRejection::Cooldown { remaining_secs: 5 })
        ));
        assert!(matches!(
            decide(&signal, &[open("X", "V")], &[], None, false),
            EntryDecision::Rejected(EntryRejection::AlreadyOpen)
        ));

        let full: Vec<Position> = (0..5).map(|i| open(&format!("M{}", i), "V")).collect();
        assert!(matches!(
            decide(&signal, &full, &[], None, false),
            EntryDecision::Rejected(EntryRejection::MaxOpenPositions { open: 5, max: 5 })
        ));
    }

    #[test]
    fn test_confidence_and_size() {
        assert_eq!(entry_confidence(0), 50);
        assert_eq!(entry_confidence(1), 30);
        assert_eq!(entry_confidence(2), 70);
        assert_eq!(entry_confidence(7), 95);

        let config = StrategyConfig::default();
        assert_eq!(buy_size(&TradeSignal::buy("X", "W", Some(5.0), 2), &config), 0.1);
        assert_eq!(buy_size(&TradeSignal::buy("X", "W", Some(0.001), 2), &config), 0.005);
        assert_eq!(buy_size(&TradeSignal::buy("X", "W", Some(0.02), 2), &config), 0.02);
        assert_eq!(buy_size(&TradeSignal::buy("X", "W", None, 2), &config), 0.01);
    }
}
