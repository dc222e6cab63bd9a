/// Engine events
///
/// The strategy engine reports what it did through an injected sink. Sinks
/// must not block; delivery is best effort and never affects trading.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logger::{self, LogTag};
use crate::positions::CloseReason;
use crate::utils::short_mint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    PositionOpened {
        mint: String,
        wallet: String,
        sol_spent: f64,
        entry_price: f64,
        simulated: bool,
    },
    PositionClosed {
        mint: String,
        reason: CloseReason,
        pnl_sol: f64,
        pnl_percent: f64,
        simulated: bool,
    },
    Graduated {
        mint: String,
        price: Option<f64>,
        at: DateTime<Utc>,
    },
    /// A triggered exit could not be verified; the position stays open
    ExitFailed {
        mint: String,
        reason: CloseReason,
        error: String,
    },
}

impl EngineEvent {
    pub fn mint(&self) -> &str {
        match self {
            EngineEvent::PositionOpened { mint, .. }
            | EngineEvent::PositionClosed { mint, .. }
            | EngineEvent::Graduated { mint, .. }
            | EngineEvent::ExitFailed { mint, .. } => mint,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Writes events to the structured log
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: EngineEvent) {
        match &event {
            EngineEvent::PositionOpened {
                mint,
                wallet,
                sol_spent,
                entry_price,
                simulated,
            } => logger::info(
                LogTag::Positions,
                &format!(
                    "📈 Opened {} copying {} | {:.4} SOL @ {:.10}{}",
                    short_mint(mint),
                    short_mint(wallet),
                    sol_spent,
                    entry_price,
                    if *simulated { " (dry run)" } else { "" }
                ),
            ),
            EngineEvent::PositionClosed {
                mint,
                reason,
                pnl_sol,
                pnl_percent,
                simulated,
            } => logger::info(
                LogTag::Positions,
                &format!(
                    "📉 Closed {} ({}) | P&L {:+.6} SOL ({:+.2}%){}",
                    short_mint(mint),
                    reason,
                    pnl_sol,
                    pnl_percent,
                    if *simulated { " (dry run)" } else { "" }
                ),
            ),
            EngineEvent::Graduated { mint, price, .. } => logger::info(
                LogTag::Graduation,
                &format!(
                    "🎓 {} graduated{}",
                    short_mint(mint),
                    price
                        .map(|p| format!(" at {:.10} SOL", p))
                        .unwrap_or_default()
                ),
            ),
            EngineEvent::ExitFailed { mint, reason, error } => logger::warning(
                LogTag::Positions,
                &format!(
                    "Exit {} failed for {}: {} (retrying next tick)",
                    reason,
                    short_mint(mint),
                    error
                ),
            ),
        }
    }
}

/// Keeps every event; for tests and the CLI
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
