// ═══════════════════════════════════════════════════════════════════════════════
// STRATEGY MODULE - COPY-TRADING ENTRY, MONITORING AND EXIT
// ═══════════════════════════════════════════════════════════════════════════════

pub mod engine;
pub mod entry;
pub mod exit;

pub use engine::{EngineDeps, EntryOutcome, HoldingStatus, MonitorOutcome, StrategyEngine};
pub use entry::{
    buy_size, entry_confidence, evaluate_entry, find_rebuy_block, load_recent_history,
    EntryApproval, EntryContext, EntryDecision, EntryRejection, RebuyBlock,
};
pub use exit::{evaluate_exit, ExitDecision, ExitInputs};
