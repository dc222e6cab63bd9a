use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PositionError;
use crate::swaps::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(PositionStatus::Open),
            "closed" => Some(PositionStatus::Closed),
            _ => None,
        }
    }
}

/// Why a position was closed. Exit triggers carry their evaluation rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ProfitTarget,
    TrailingStop,
    StopLoss,
    SignalFollow,
    MaxHold,
    /// Operator action
    Manual,
}

impl CloseReason {
    /// Lower wins when several triggers fire together
    pub fn priority(&self) -> u8 {
        match self {
            CloseReason::ProfitTarget => 1,
            CloseReason::TrailingStop => 2,
            CloseReason::StopLoss => 3,
            CloseReason::SignalFollow => 4,
            CloseReason::MaxHold => 5,
            CloseReason::Manual => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ProfitTarget => "profit_target",
            CloseReason::TrailingStop => "trailing_stop",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::SignalFollow => "signal_follow",
            CloseReason::MaxHold => "max_hold",
            CloseReason::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "profit_target" => Some(CloseReason::ProfitTarget),
            "trailing_stop" => Some(CloseReason::TrailingStop),
            "stop_loss" => Some(CloseReason::StopLoss),
            "signal_follow" => Some(CloseReason::SignalFollow),
            "max_hold" => Some(CloseReason::MaxHold),
            "manual" => Some(CloseReason::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trade tracked per instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Option<i64>,
    pub mint: String,
    /// Tracked wallet whose buy opened this position
    pub wallet: String,
    pub strategy: String,

    pub entry_price: f64,
    pub sol_spent: f64,
    /// Whole tokens held
    pub quantity: f64,
    pub max_price: f64,
    /// Highest fee-aware PnL percent seen while open
    pub max_pnl_percent: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_signature: Option<String>,
    pub upvotes: u32,
    pub simulated: bool,

    pub venue: Venue,
    pub graduated: bool,
    pub graduated_at: Option<DateTime<Utc>>,
    pub graduation_price: Option<f64>,

    pub status: PositionStatus,
    pub close_reason: Option<CloseReason>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Sell verified on-chain but the close not yet written
    pub pending_close: Option<ClosedTradeRecord>,
}

impl Position {
    /// New open position from a verified fill
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        mint: &str,
        wallet: &str,
        strategy: &str,
        entry_price: f64,
        sol_spent: f64,
        quantity: f64,
        venue: Venue,
        entry_signature: Option<String>,
        upvotes: u32,
        simulated: bool,
    ) -> Self {
        Self {
            id: None,
            mint: mint.to_string(),
            wallet: wallet.to_string(),
            strategy: strategy.to_string(),
            entry_price,
            sol_spent,
            quantity,
            max_price: entry_price,
            max_pnl_percent: 0.0,
            entry_time: Utc::now(),
            entry_signature,
            upvotes,
            simulated,
            venue,
            graduated: venue == Venue::Exchange,
            graduated_at: None,
            graduation_price: None,
            status: PositionStatus::Open,
            close_reason: None,
            closed_at: None,
            pending_close: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn hold_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.entry_time)
            .num_seconds()
            .max(0)
    }

    /// Open positions always hold a positive quantity bought with positive SOL
    pub fn validate_open(&self) -> Result<(), PositionError> {
        let invalid = |reason: &str| PositionError::Invalid {
            mint: self.mint.clone(),
            reason: reason.to_string(),
        };
        if !self.is_open() {
            return Err(invalid("position is not open"));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(invalid("quantity must be > 0"));
        }
        if !(self.sol_spent.is_finite() && self.sol_spent > 0.0) {
            return Err(invalid("sol_spent must be > 0"));
        }
        if !(self.entry_price.is_finite() && self.entry_price > 0.0) {
            return Err(invalid("entry_price must be > 0"));
        }
        Ok(())
    }
}

/// Append-only history entry written on every verified close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTradeRecord {
    pub mint: String,
    pub wallet: String,
    pub strategy: String,
    pub close_reason: CloseReason,
    pub entry_time: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub sol_spent: f64,
    pub sol_received: f64,
    pub pnl_sol: f64,
    pub pnl_percent: f64,
    pub entry_signature: Option<String>,
    pub exit_signature: Option<String>,
    pub venue: Venue,
    pub simulated: bool,
}
