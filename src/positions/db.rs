/// SQLite position store
///
/// One `rusqlite` connection behind a mutex. Statements are short, so they run
/// inline on the calling task. Open-set membership is enforced by a partial
/// unique index on `mint` for rows with status 'open'.
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::store::PositionStore;
use super::types::{CloseReason, ClosedTradeRecord, Position, PositionStatus};
use crate::arguments::is_debug_positions_enabled;
use crate::errors::{CopyTraderError, PositionError};
use crate::logger::{self, LogTag};
use crate::swaps::Venue;

// =============================================================================
// DATABASE SCHEMA DEFINITIONS
// =============================================================================

const SCHEMA_POSITIONS: &str = r#"
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mint TEXT NOT NULL,
    wallet TEXT NOT NULL,
    strategy TEXT NOT NULL,
    entry_price REAL NOT NULL,
    sol_spent REAL NOT NULL,
    quantity REAL NOT NULL,
    max_price REAL NOT NULL,
    max_pnl_percent REAL NOT NULL DEFAULT 0,
    entry_time TEXT NOT NULL,
    entry_signature TEXT,
    upvotes INTEGER NOT NULL DEFAULT 0,
    simulated INTEGER NOT NULL DEFAULT 0,
    venue TEXT NOT NULL, -- 'bonding_curve' or 'exchange'
    graduated INTEGER NOT NULL DEFAULT 0,
    graduated_at TEXT,
    graduation_price REAL,
    status TEXT NOT NULL, -- 'open' or 'closed'
    close_reason TEXT,
    closed_at TEXT,
    pending_close TEXT -- JSON ClosedTradeRecord of a verified but unrecorded exit
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_open_mint ON positions(mint) WHERE status = 'open';
"#;

const SCHEMA_TRADE_HISTORY: &str = r#"
CREATE TABLE IF NOT EXISTS trade_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    day TEXT NOT NULL, -- YYYY-MM-DD (UTC) of closed_at
    mint TEXT NOT NULL,
    wallet TEXT NOT NULL,
    strategy TEXT NOT NULL,
    close_reason TEXT NOT NULL,
    entry_time TEXT NOT NULL,
    closed_at TEXT NOT NULL,
    entry_price REAL NOT NULL,
    exit_price REAL NOT NULL,
    quantity REAL NOT NULL,
    sol_spent REAL NOT NULL,
    sol_received REAL NOT NULL,
    pnl_sol REAL NOT NULL,
    pnl_percent REAL NOT NULL,
    entry_signature TEXT,
    exit_signature TEXT,
    venue TEXT NOT NULL,
    simulated INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_trade_history_day ON trade_history(day);
"#;

const POSITION_COLUMNS: &str = "id, mint, wallet, strategy, entry_price, sol_spent, quantity, \
    max_price, max_pnl_percent, entry_time, entry_signature, upvotes, simulated, venue, \
    graduated, graduated_at, graduation_price, status, close_reason, closed_at, pending_close";

pub struct SqlitePositionStore {
    conn: Mutex<Connection>,
}

impl SqlitePositionStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &str) -> Result<Self, CopyTraderError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::with_connection(conn)?;
        logger::info(
            LogTag::Store,
            &format!("Position store ready at {}", path),
        );
        Ok(store)
    }

    /// In-memory store for tests and paper runs
    pub fn in_memory() -> Result<Self, CopyTraderError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CopyTraderError> {
        conn.execute_batch(SCHEMA_POSITIONS)?;
        conn.execute_batch(SCHEMA_TRADE_HISTORY)?;
        ensure_column(&conn, "positions", "pending_close", "TEXT")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_position(row: &rusqlite::Row) -> rusqlite::Result<Position> {
        let venue: String = row.get(13)?;
        let status: String = row.get(17)?;
        let close_reason: Option<String> = row.get(18)?;
        let pending_close: Option<String> = row.get(20)?;
        let pending_close = pending_close
            .map(|json| {
                serde_json::from_str::<ClosedTradeRecord>(&json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        20,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;
        Ok(Position {
            id: Some(row.get(0)?),
            mint: row.get(1)?,
            wallet: row.get(2)?,
            strategy: row.get(3)?,
            entry_price: row.get(4)?,
            sol_spent: row.get(5)?,
            quantity: row.get(6)?,
            max_price: row.get(7)?,
            max_pnl_percent: row.get(8)?,
            entry_time: parse_time(row.get::<_, String>(9)?, 9)?,
            entry_signature: row.get(10)?,
            upvotes: row.get(11)?,
            simulated: row.get(12)?,
            venue: Venue::parse(&venue).unwrap_or(Venue::BondingCurve),
            graduated: row.get(14)?,
            graduated_at: parse_optional_time(row.get(15)?, 15)?,
            graduation_price: row.get(16)?,
            status: PositionStatus::parse(&status).unwrap_or(PositionStatus::Closed),
            close_reason: close_reason.as_deref().and_then(CloseReason::parse),
            closed_at: parse_optional_time(row.get(19)?, 19)?,
            pending_close,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ClosedTradeRecord> {
        let reason: String = row.get(3)?;
        let venue: String = row.get(16)?;
        Ok(ClosedTradeRecord {
            mint: row.get(0)?,
            wallet: row.get(1)?,
            strategy: row.get(2)?,
            close_reason: CloseReason::parse(&reason).unwrap_or(CloseReason::Manual),
            entry_time: parse_time(row.get::<_, String>(4)?, 4)?,
            closed_at: parse_time(row.get::<_, String>(5)?, 5)?,
            entry_price: row.get(6)?,
            exit_price: row.get(7)?,
            quantity: row.get(8)?,
            sol_spent: row.get(9)?,
            sol_received: row.get(10)?,
            pnl_sol: row.get(11)?,
            pnl_percent: row.get(12)?,
            entry_signature: row.get(13)?,
            exit_signature: row.get(14)?,
            simulated: row.get(15)?,
            venue: Venue::parse(&venue).unwrap_or(Venue::BondingCurve),
        })
    }
}

/// Add a column missing from a database created by an older build
fn ensure_column(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<()> {
    let names = {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        names
    };
    let exists = names.iter().any(|name| name == column);
    if !exists {
        conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column, definition
        ))?;
    }
    Ok(())
}

fn parse_time(value: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_optional_time(
    value: Option<String>,
    column: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(v, column)).transpose()
}

fn time_str(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl PositionStore for SqlitePositionStore {
    async fn insert_open(&self, position: &Position) -> Result<i64, CopyTraderError> {
        position.validate_open()?;
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO positions (mint, wallet, strategy, entry_price, sol_spent, quantity,
                max_price, max_pnl_percent, entry_time, entry_signature, upvotes, simulated, venue,
                graduated, graduated_at, graduation_price, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 'open')",
            params![
                position.mint,
                position.wallet,
                position.strategy,
                position.entry_price,
                position.sol_spent,
                position.quantity,
                position.max_price,
                position.max_pnl_percent,
                time_str(&position.entry_time),
                position.entry_signature,
                position.upvotes,
                position.simulated,
                position.venue.as_str(),
                position.graduated,
                position.graduated_at.as_ref().map(time_str),
                position.graduation_price,
            ],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                if is_debug_positions_enabled() {
                    logger::debug(
                        LogTag::Store,
                        &format!("Inserted open position {} for {}", id, position.mint),
                    );
                }
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => Err(PositionError::AlreadyOpen {
                mint: position.mint.clone(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_open(&self, mint: &str) -> Result<Option<Position>, CopyTraderError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM positions WHERE mint = ?1 AND status = 'open'",
            POSITION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![mint], Self::row_to_position)
            .optional()?)
    }

    async fn list_open(&self) -> Result<Vec<Position>, CopyTraderError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM positions WHERE status = 'open' ORDER BY entry_time ASC",
            POSITION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let positions = stmt
            .query_map([], Self::row_to_position)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    async fn count_open(&self) -> Result<usize, CopyTraderError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM positions WHERE status = 'open'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn update_open(&self, position: &Position) -> Result<(), CopyTraderError> {
        position.validate_open()?;
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE positions SET quantity = ?2, sol_spent = ?3, max_price = ?4,
                max_pnl_percent = ?5, venue = ?6, graduated = ?7, graduated_at = ?8,
                graduation_price = ?9
             WHERE mint = ?1 AND status = 'open'",
            params![
                position.mint,
                position.quantity,
                position.sol_spent,
                position.max_price,
                position.max_pnl_percent,
                position.venue.as_str(),
                position.graduated,
                position.graduated_at.as_ref().map(time_str),
                position.graduation_price,
            ],
        )?;
        if updated == 0 {
            return Err(PositionError::NotFound {
                mint: position.mint.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn close(
        &self,
        position: &Position,
        record: &ClosedTradeRecord,
    ) -> Result<(), CopyTraderError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE positions SET status = 'closed', close_reason = ?2, closed_at = ?3,
                max_price = ?4, max_pnl_percent = ?5
             WHERE mint = ?1 AND status = 'open'",
            params![
                position.mint,
                record.close_reason.as_str(),
                time_str(&record.closed_at),
                position.max_price,
                position.max_pnl_percent,
            ],
        )?;
        if updated == 0 {
            return Err(PositionError::NotFound {
                mint: position.mint.clone(),
            }
            .into());
        }

        tx.execute(
            "INSERT INTO trade_history (day, mint, wallet, strategy, close_reason, entry_time,
                closed_at, entry_price, exit_price, quantity, sol_spent, sol_received, pnl_sol,
                pnl_percent, entry_signature, exit_signature, venue, simulated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                record.closed_at.date_naive().to_string(),
                record.mint,
                record.wallet,
                record.strategy,
                record.close_reason.as_str(),
                time_str(&record.entry_time),
                time_str(&record.closed_at),
                record.entry_price,
                record.exit_price,
                record.quantity,
                record.sol_spent,
                record.sol_received,
                record.pnl_sol,
                record.pnl_percent,
                record.entry_signature,
                record.exit_signature,
                record.venue.as_str(),
                record.simulated,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn mark_pending_close(
        &self,
        position: &Position,
        record: &ClosedTradeRecord,
    ) -> Result<(), CopyTraderError> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE positions SET pending_close = ?2 WHERE mint = ?1 AND status = 'open'",
            params![position.mint, json],
        )?;
        if updated == 0 {
            return Err(PositionError::NotFound {
                mint: position.mint.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn history_for_day(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<ClosedTradeRecord>, CopyTraderError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT mint, wallet, strategy, close_reason, entry_time, closed_at, entry_price,
                exit_price, quantity, sol_spent, sol_received, pnl_sol, pnl_percent,
                entry_signature, exit_signature, simulated, venue
             FROM trade_history WHERE day = ?1 ORDER BY id ASC",
        )?;
        let records = stmt
            .query_map(params![day.to_string()], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(mint: &str) -> Position {
        Position::open(
            mint, "WalletA", "copy", 0.0001, 0.1, 1_000.0, Venue::BondingCurve, Some("sig".into()), 2, false,
        )
    }

    fn record_for(position: &Position, closed_at: DateTime<Utc>) -> ClosedTradeRecord {
        ClosedTradeRecord {
            mint: position.mint.clone(),
            wallet: position.wallet.clone(),
            strategy: position.strategy.clone(),
            close_reason: CloseReason::ProfitTarget,
            entry_time: position.entry_time,
            closed_at,
            entry_price: position.entry_price,
            exit_price: 0.0002,
            quantity: position.quantity,
            sol_spent: position.sol_spent,
            sol_received: 0.19,
            pnl_sol: 0.09,
            pnl_percent: 90.0,
            entry_signature: position.entry_signature.clone(),
            exit_signature: Some("exit".into()),
            venue: position.venue,
            simulated: false,
        }
    }

    #[tokio::test]
    async fn test_open_set_membership() {
        let store = SqlitePositionStore::in_memory().unwrap();
        store.insert_open(&position("MintA")).await.unwrap();
        assert!(matches!(
            store.insert_open(&position("MintA")).await,
            Err(CopyTraderError::Position(PositionError::AlreadyOpen { .. }))
        ));
        store.insert_open(&position("MintB")).await.unwrap();
        assert_eq!(store.count_open().await.unwrap(), 2);

        let loaded = store.get_open("MintA").await.unwrap().unwrap();
        assert_eq!(loaded.wallet, "WalletA");
        assert_eq!(loaded.entry_signature.as_deref(), Some("sig"));
        assert!(store.get_open("MintC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_close() {
        let store = SqlitePositionStore::in_memory().unwrap();
        store.insert_open(&position("MintA")).await.unwrap();

        let mut p = store.get_open("MintA").await.unwrap().unwrap();
        p.max_price = 0.0003;
        p.venue = Venue::Exchange;
        p.graduated = true;
        p.graduated_at = Some(Utc::now());
        store.update_open(&p).await.unwrap();

        let reloaded = store.get_open("MintA").await.unwrap().unwrap();
        assert_eq!(reloaded.max_price, 0.0003);
        assert_eq!(reloaded.venue, Venue::Exchange);
        assert!(reloaded.graduated_at.is_some());

        let closed_at = Utc::now();
        store.close(&reloaded, &record_for(&reloaded, closed_at)).await.unwrap();
        assert!(store.get_open("MintA").await.unwrap().is_none());
        assert_eq!(store.count_open().await.unwrap(), 0);

        let history = store.history_for_day(closed_at.date_naive()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].close_reason, CloseReason::ProfitTarget);
        assert_eq!(history[0].wallet, "WalletA");

        // closing again is an error, and the mint can be reopened
        assert!(store.close(&reloaded, &record_for(&reloaded, closed_at)).await.is_err());
        store.insert_open(&position("MintA")).await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_close_survives_reload() {
        let store = SqlitePositionStore::in_memory().unwrap();
        store.insert_open(&position("MintA")).await.unwrap();
        let p = store.get_open("MintA").await.unwrap().unwrap();
        assert!(p.pending_close.is_none());

        let record = record_for(&p, Utc::now());
        store.mark_pending_close(&p, &record).await.unwrap();
        let parked = store.get_open("MintA").await.unwrap().unwrap();
        assert_eq!(parked.pending_close.as_ref(), Some(&record));

        // later field updates leave the parked exit alone
        store.update_open(&parked).await.unwrap();
        store.close(&parked, &record).await.unwrap();
        assert!(store.get_open("MintA").await.unwrap().is_none());
        assert!(store.mark_pending_close(&parked, &record).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_position_rejected() {
        let store = SqlitePositionStore::in_memory().unwrap();
        let mut p = position("MintA");
        p.quantity = 0.0;
        assert!(store.insert_open(&p).await.is_err());
    }
}
