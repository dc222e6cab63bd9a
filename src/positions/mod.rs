//! Position model, per-mint locking and persistence

pub mod db;
pub mod locks;
pub mod store;
pub mod transitions;
pub mod types;

pub use db::SqlitePositionStore;
pub use locks::{MintLocks, PositionLockGuard};
pub use store::PositionStore;
pub use transitions::PositionTransition;
pub use types::{CloseReason, ClosedTradeRecord, Position, PositionStatus};

pub use crate::swaps::Venue;
