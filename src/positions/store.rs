use async_trait::async_trait;
use chrono::NaiveDate;

use super::types::{ClosedTradeRecord, Position};
use crate::errors::CopyTraderError;

/// Persistence collaborator for positions and close history
///
/// Single source of truth: the engine re-reads a position before every
/// mutation and writes it back whole.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Insert a new open position; fails if the mint already has one
    async fn insert_open(&self, position: &Position) -> Result<i64, CopyTraderError>;

    async fn get_open(&self, mint: &str) -> Result<Option<Position>, CopyTraderError>;

    async fn list_open(&self) -> Result<Vec<Position>, CopyTraderError>;

    async fn count_open(&self) -> Result<usize, CopyTraderError>;

    /// Overwrite an open position's fields
    async fn update_open(&self, position: &Position) -> Result<(), CopyTraderError>;

    /// Remove from the open set and append the history record, atomically
    async fn close(
        &self,
        position: &Position,
        record: &ClosedTradeRecord,
    ) -> Result<(), CopyTraderError>;

    /// Park a verified exit on the open row so a later tick can finish
    /// the close without selling again
    async fn mark_pending_close(
        &self,
        position: &Position,
        record: &ClosedTradeRecord,
    ) -> Result<(), CopyTraderError>;

    /// Close history for one UTC day, oldest first
    async fn history_for_day(&self, day: NaiveDate)
        -> Result<Vec<ClosedTradeRecord>, CopyTraderError>;
}
