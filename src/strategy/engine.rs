/// Copy-trading engine
///
/// Per mint: NoPosition -> Evaluating -> Open -> Closing -> NoPosition.
/// Every buy, tick and sell holds that mint's lock, so only one execution
/// call per mint is ever outstanding. Positions are re-read from the store
/// before each mutation; the engine keeps no position cache of its own.
/// A sell that settled but could not be written is parked and finished by
/// later ticks without selling again.
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};

use super::entry::{
    evaluate_entry, load_recent_history, EntryContext, EntryDecision, EntryRejection,
};
use super::exit::{evaluate_exit, ExitDecision, ExitInputs};
use crate::arguments::is_debug_strategy_enabled;
use crate::config::{FeesConfig, StrategyConfig, SwapsConfig};
use crate::errors::{CopyTraderError, PositionError};
use crate::events::{EngineEvent, EventSink};
use crate::logger::{self, log_position_tick, LogTag};
use crate::positions::{
    CloseReason, ClosedTradeRecord, MintLocks, Position, PositionStatus, PositionStore,
    PositionTransition,
};
use crate::pricing::{GraduationDetector, PriceProvider};
use crate::profit::{PnlAccountant, PnlResult};
use crate::signals::{SellerBook, SignalInbox, SignalSide, TradeSignal};
use crate::swaps::{ExecutionResult, SellAmount, TradeExecutor, Venue};
use crate::utils::short_mint;

/// Attempts at writing a close after a verified sell
const CLOSE_WRITE_ATTEMPTS: u32 = 3;
const CLOSE_WRITE_RETRY: Duration = Duration::from_millis(250);

/// Result of handling one buy signal
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Opened(Position),
    Rejected(EntryRejection),
    /// Approved, but the buy was not verified on-chain
    BuyFailed(String),
}

/// Result of one monitoring tick for one mint
#[derive(Debug, Clone)]
pub enum MonitorOutcome {
    /// Another operation on the mint is in flight; skipped this tick
    Busy,
    NoPosition,
    /// No usable price this tick
    Unpriced(String),
    Holding(HoldingStatus),
    Closed(ClosedTradeRecord),
    /// An exit fired but the sell was not verified, or the verified sell
    /// could not be recorded yet; still open
    ExitFailed { reason: CloseReason, error: String },
    /// Store or other internal failure, confined to this mint and tick
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingStatus {
    pub price: f64,
    pub pnl_percent: f64,
    pub max_pnl_percent: f64,
    pub hold_secs: i64,
    pub sellers: usize,
}

/// Collaborators handed to the engine at construction
pub struct EngineDeps {
    pub executor: Arc<dyn TradeExecutor>,
    pub prices: Arc<dyn PriceProvider>,
    pub graduation: Arc<GraduationDetector>,
    pub store: Arc<dyn PositionStore>,
    pub events: Arc<dyn EventSink>,
}

pub struct StrategyEngine {
    executor: Arc<dyn TradeExecutor>,
    prices: Arc<dyn PriceProvider>,
    graduation: Arc<GraduationDetector>,
    store: Arc<dyn PositionStore>,
    events: Arc<dyn EventSink>,
    accountant: PnlAccountant,
    config: StrategyConfig,
    slippage_bps: u16,
    priority_fee_sol: f64,
    locks: MintLocks,
    sellers: Mutex<SellerBook>,
    cooldowns: Mutex<HashMap<String, Instant>>,
    /// Verified exits whose close write failed, by mint
    pending_closes: Mutex<HashMap<String, ClosedTradeRecord>>,
}

impl StrategyEngine {
    pub fn new(
        deps: EngineDeps,
        config: StrategyConfig,
        fees: FeesConfig,
        swaps: &SwapsConfig,
    ) -> Self {
        Self {
            executor: deps.executor,
            prices: deps.prices,
            graduation: deps.graduation,
            store: deps.store,
            events: deps.events,
            accountant: PnlAccountant::new(fees),
            config,
            slippage_bps: swaps.slippage_bps,
            priority_fee_sol: swaps.priority_fee_sol,
            locks: MintLocks::new(),
            sellers: Mutex::new(SellerBook::new()),
            cooldowns: Mutex::new(HashMap::new()),
            pending_closes: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_simulation(&self) -> bool {
        self.executor.is_dry_run()
    }

    pub fn seller_count(&self, mint: &str) -> usize {
        self.sellers.lock().count(mint)
    }

    fn stamp_cooldown(&self, mint: &str) {
        self.cooldowns
            .lock()
            .insert(mint.to_string(), Instant::now());
    }

    fn cooldown_remaining(&self, mint: &str) -> Option<u64> {
        let window = Duration::from_secs(self.config.entry_cooldown_secs);
        let mut cooldowns = self.cooldowns.lock();
        let stamped = *cooldowns.get(mint)?;
        let elapsed = stamped.elapsed();
        if elapsed >= window {
            cooldowns.remove(mint);
            return None;
        }
        Some((window - elapsed).as_secs().max(1))
    }

    // =========================================================================
    // SIGNALS / ENTRY
    // =========================================================================

    /// Route a signal: buys are evaluated for entry, sells feed the seller book
    pub async fn handle_signal(&self, signal: &TradeSignal) -> Option<EntryOutcome> {
        match signal.side {
            SignalSide::Buy => Some(self.on_buy_signal(signal).await),
            SignalSide::Sell => {
                let count = self.sellers.lock().record(&signal.mint, &signal.wallet);
                logger::info(
                    LogTag::Signals,
                    &format!(
                        "Tracked wallet {} sold {} ({} seller(s))",
                        short_mint(&signal.wallet),
                        short_mint(&signal.mint),
                        count
                    ),
                );
                None
            }
        }
    }

    pub async fn on_buy_signal(&self, signal: &TradeSignal) -> EntryOutcome {
        let _guard = match self.locks.try_acquire(&signal.mint) {
            Some(guard) => guard,
            None => return self.reject(signal, EntryRejection::InFlight),
        };

        let now = Utc::now();
        let gathered = async {
            let open = self.store.list_open().await?;
            let history =
                load_recent_history(self.store.as_ref(), now, self.config.rebuy_history_days)
                    .await?;
            Ok::<_, CopyTraderError>((open, history))
        }
        .await;
        let (open_positions, history) = match gathered {
            Ok(data) => data,
            Err(e) => {
                logger::error(
                    LogTag::Strategy,
                    &format!("Entry check for {} failed: {}", signal.mint, e),
                );
                return EntryOutcome::BuyFailed(e.to_string());
            }
        };

        let ctx = EntryContext {
            signal,
            simulation: self.is_simulation(),
            open_positions: &open_positions,
            recent_history: &history,
            cooldown_remaining_secs: self.cooldown_remaining(&signal.mint),
            now,
        };
        let approval = match evaluate_entry(&ctx, &self.config) {
            EntryDecision::Approved(approval) => approval,
            EntryDecision::Rejected(rejection) => return self.reject(signal, rejection),
        };

        logger::info(
            LogTag::Strategy,
            &format!(
                "Entry approved for {} from {} | {:.4} SOL | confidence {}",
                short_mint(&signal.mint),
                short_mint(&signal.wallet),
                approval.sol_amount,
                approval.confidence
            ),
        );
        self.stamp_cooldown(&signal.mint);

        let venue = if self.graduation.has_graduated(&signal.mint).await.graduated {
            Venue::Exchange
        } else {
            Venue::BondingCurve
        };

        let result = self
            .executor
            .buy(
                &signal.mint,
                approval.sol_amount,
                venue,
                self.slippage_bps,
                self.priority_fee_sol,
            )
            .await;

        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| "buy not verified".to_string());
            logger::warning(
                LogTag::Strategy,
                &format!("Buy for {} failed: {}", signal.mint, error),
            );
            return EntryOutcome::BuyFailed(error);
        }

        let entry_price = match entry_price_from(&result) {
            Some(price) => price,
            None => {
                let error = "verified buy has no usable entry price".to_string();
                logger::error(
                    LogTag::Strategy,
                    &format!("{} for {}", error, signal.mint),
                );
                return EntryOutcome::BuyFailed(error);
            }
        };

        let mut position = Position::open(
            &signal.mint,
            &signal.wallet,
            &self.config.strategy_tag,
            entry_price,
            result.sol_spent,
            result.token_quantity(),
            venue,
            result.signature.clone(),
            signal.upvotes,
            result.simulated,
        );

        match self.store.insert_open(&position).await {
            Ok(id) => position.id = Some(id),
            Err(e) => {
                // Tokens are held but untracked; surfaced loudly for the operator
                logger::error(
                    LogTag::Positions,
                    &format!(
                        "Bought {} ({}) but failed to record the position: {}",
                        signal.mint,
                        result.signature.as_deref().unwrap_or("-"),
                        e
                    ),
                );
                return EntryOutcome::BuyFailed(e.to_string());
            }
        }

        self.events.emit(EngineEvent::PositionOpened {
            mint: position.mint.clone(),
            wallet: position.wallet.clone(),
            sol_spent: position.sol_spent,
            entry_price: position.entry_price,
            simulated: position.simulated,
        });
        EntryOutcome::Opened(position)
    }

    fn reject(&self, signal: &TradeSignal, rejection: EntryRejection) -> EntryOutcome {
        let message = format!(
            "Entry rejected for {} from {}: {}",
            short_mint(&signal.mint),
            short_mint(&signal.wallet),
            rejection
        );
        if is_debug_strategy_enabled() {
            logger::debug(LogTag::Strategy, &message);
        } else {
            logger::verbose(LogTag::Strategy, &message);
        }
        EntryOutcome::Rejected(rejection)
    }

    // =========================================================================
    // MONITORING
    // =========================================================================

    /// Evaluate one open position. Never propagates an error: failures are
    /// confined to this mint for this tick.
    pub async fn monitor_tick(&self, mint: &str) -> MonitorOutcome {
        let _guard = match self.locks.try_acquire(mint) {
            Some(guard) => guard,
            None => return MonitorOutcome::Busy,
        };

        match self.monitor_locked(mint).await {
            Ok(outcome) => outcome,
            Err(e) => {
                logger::error(
                    LogTag::Strategy,
                    &format!("Monitoring {} failed: {}", mint, e),
                );
                MonitorOutcome::Error(e.to_string())
            }
        }
    }

    async fn monitor_locked(&self, mint: &str) -> Result<MonitorOutcome, CopyTraderError> {
        let mut position = match self.store.get_open(mint).await? {
            Some(position) => position,
            None => return Ok(MonitorOutcome::NoPosition),
        };

        if let Some(record) = self.pending_close(&position) {
            logger::info(
                LogTag::Positions,
                &format!(
                    "Finishing the recorded exit of {} ({})",
                    short_mint(mint),
                    record.exit_signature.as_deref().unwrap_or("-")
                ),
            );
            let reason = record.close_reason;
            return Ok(match self.finish_close(position, record).await {
                Ok(record) => MonitorOutcome::Closed(record),
                Err(error) => MonitorOutcome::ExitFailed { reason, error },
            });
        }

        let quote = self.prices.resolve(mint, false).await;
        let price = match quote.fresh_price() {
            Some(price) => price,
            None => {
                let error = if quote.stale {
                    format!("stale quote ({})", quote.source)
                } else {
                    quote
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("no price ({})", quote.source))
                };
                if is_debug_strategy_enabled() {
                    logger::debug(
                        LogTag::Strategy,
                        &format!("Skipping {} this tick: {}", short_mint(mint), error),
                    );
                }
                return Ok(MonitorOutcome::Unpriced(error));
            }
        };

        let pnl = match self
            .accountant
            .unrealized_for_position(&position, price, self.priority_fee_sol)
        {
            Some(pnl) => pnl,
            None => return Ok(MonitorOutcome::Unpriced("position cannot be priced".into())),
        };

        let mut changed = PositionTransition::PriceObserved {
            price,
            pnl_percent: pnl.pnl_percent,
        }
        .apply(&mut position);

        if !position.graduated {
            let status = self.graduation.has_graduated(mint).await;
            if status.graduated {
                let at = Utc::now();
                if (PositionTransition::Graduated {
                    at,
                    price: Some(price),
                })
                .apply(&mut position)
                {
                    changed = true;
                    logger::info(
                        LogTag::Graduation,
                        &format!(
                            "{} graduated ({:?}); exits now route to the exchange",
                            short_mint(mint),
                            status.reason
                        ),
                    );
                    self.events.emit(EngineEvent::Graduated {
                        mint: mint.to_string(),
                        price: Some(price),
                        at,
                    });
                }
            }
        }

        if changed {
            self.store.update_open(&position).await?;
        }

        let sellers = self.seller_count(mint);
        let hold_secs = position.hold_secs(Utc::now());
        log_position_tick(
            mint,
            position.entry_price,
            price,
            pnl.pnl_percent,
            position.max_pnl_percent,
            hold_secs,
            sellers,
            quote.source.as_str(),
        );

        let inputs = ExitInputs {
            price,
            pnl_percent: pnl.pnl_percent,
            max_pnl_percent: position.max_pnl_percent,
            max_price: position.max_price,
            sellers,
            hold_secs,
        };

        let decision = match evaluate_exit(&inputs, &self.config) {
            Some(decision) => decision,
            None => {
                return Ok(MonitorOutcome::Holding(HoldingStatus {
                    price,
                    pnl_percent: pnl.pnl_percent,
                    max_pnl_percent: position.max_pnl_percent,
                    hold_secs,
                    sellers,
                }))
            }
        };

        logger::info(
            LogTag::Strategy,
            &format!(
                "Exit triggered for {}: {} ({})",
                short_mint(mint),
                decision.reason,
                decision.description
            ),
        );
        Ok(self.exit_position(position, &decision, Some(price)).await)
    }

    async fn exit_position(
        &self,
        position: Position,
        decision: &ExitDecision,
        observed_price: Option<f64>,
    ) -> MonitorOutcome {
        match self
            .close_locked(position, decision.reason, observed_price)
            .await
        {
            Ok(record) => MonitorOutcome::Closed(record),
            Err(error) => MonitorOutcome::ExitFailed {
                reason: decision.reason,
                error,
            },
        }
    }

    /// Tick every open position concurrently
    pub async fn tick_all(&self) -> Vec<(String, MonitorOutcome)> {
        let open = match self.store.list_open().await {
            Ok(open) => open,
            Err(e) => {
                logger::error(
                    LogTag::Strategy,
                    &format!("Listing open positions failed: {}", e),
                );
                return Vec::new();
            }
        };

        let ticks = open.iter().map(|p| async move {
            (p.mint.clone(), self.monitor_tick(&p.mint).await)
        });
        let outcomes = join_all(ticks).await;
        self.locks.prune();
        outcomes
    }

    // =========================================================================
    // CLOSING
    // =========================================================================

    /// Close a position now; also the operator's manual exit
    pub async fn close_position(
        &self,
        mint: &str,
        reason: CloseReason,
    ) -> Result<ClosedTradeRecord, CopyTraderError> {
        let _guard = self.locks.try_acquire(mint).ok_or_else(|| PositionError::Invalid {
            mint: mint.to_string(),
            reason: "another trade for this mint is in flight".to_string(),
        })?;

        let position = self
            .store
            .get_open(mint)
            .await?
            .ok_or_else(|| PositionError::NotFound {
                mint: mint.to_string(),
            })?;

        let closed = match self.pending_close(&position) {
            Some(record) => self.finish_close(position, record).await,
            None => {
                let observed = self.prices.resolve(mint, true).await.fresh_price();
                self.close_locked(position, reason, observed).await
            }
        };
        closed.map_err(|error| {
            CopyTraderError::from(PositionError::Invalid {
                mint: mint.to_string(),
                reason: format!("close failed: {}", error),
            })
        })
    }

    /// Sell the whole tracked balance and record the close. A failed sell
    /// leaves the position open for the next tick to retry.
    async fn close_locked(
        &self,
        position: Position,
        reason: CloseReason,
        observed_price: Option<f64>,
    ) -> Result<ClosedTradeRecord, String> {
        let result = self
            .executor
            .sell(
                &position.mint,
                SellAmount::All {
                    tracked_quantity: position.quantity,
                },
                position.venue,
                self.slippage_bps,
                self.priority_fee_sol,
            )
            .await;

        if !result.success {
            let error = result
                .error
                .clone()
                .unwrap_or_else(|| "sell not verified".to_string());
            self.events.emit(EngineEvent::ExitFailed {
                mint: position.mint.clone(),
                reason,
                error: error.clone(),
            });
            return Err(error);
        }
        self.stamp_cooldown(&position.mint);

        let quantity = if result.token_quantity() > 0.0 {
            result.token_quantity()
        } else {
            position.quantity
        };
        let exit_price = observed_price
            .or(result.effective_price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(0.0);

        let (pnl_sol, pnl_percent) =
            self.realized_for_close(&position, &result, exit_price, quantity);

        let record = ClosedTradeRecord {
            mint: position.mint.clone(),
            wallet: position.wallet.clone(),
            strategy: position.strategy.clone(),
            close_reason: reason,
            entry_time: position.entry_time,
            closed_at: Utc::now(),
            entry_price: position.entry_price,
            exit_price,
            quantity,
            sol_spent: position.sol_spent,
            sol_received: result.sol_received,
            pnl_sol,
            pnl_percent,
            entry_signature: position.entry_signature.clone(),
            exit_signature: result.signature.clone(),
            venue: position.venue,
            simulated: result.simulated,
        };

        self.finish_close(position, record).await
    }

    /// Parked exit for this position, from memory or from the store row
    fn pending_close(&self, position: &Position) -> Option<ClosedTradeRecord> {
        self.pending_closes
            .lock()
            .get(&position.mint)
            .cloned()
            .or_else(|| position.pending_close.clone())
    }

    /// Write the close for a verified sell. If every attempt fails the exit
    /// is parked, so later ticks retry the write instead of selling again.
    async fn finish_close(
        &self,
        mut position: Position,
        record: ClosedTradeRecord,
    ) -> Result<ClosedTradeRecord, String> {
        position.status = PositionStatus::Closed;
        position.close_reason = Some(record.close_reason);
        position.closed_at = Some(record.closed_at);

        let mut last_error = String::new();
        for attempt in 1..=CLOSE_WRITE_ATTEMPTS {
            match self.store.close(&position, &record).await {
                Ok(()) => {
                    self.pending_closes.lock().remove(&position.mint);
                    self.sellers.lock().clear(&position.mint);
                    self.events.emit(EngineEvent::PositionClosed {
                        mint: position.mint.clone(),
                        reason: record.close_reason,
                        pnl_sol: record.pnl_sol,
                        pnl_percent: record.pnl_percent,
                        simulated: record.simulated,
                    });
                    return Ok(record);
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Positions,
                        &format!(
                            "Recording the close of {} failed (attempt {}/{}): {}",
                            short_mint(&position.mint),
                            attempt,
                            CLOSE_WRITE_ATTEMPTS,
                            e
                        ),
                    );
                    last_error = e.to_string();
                }
            }
            if attempt < CLOSE_WRITE_ATTEMPTS {
                tokio::time::sleep(CLOSE_WRITE_RETRY).await;
            }
        }

        logger::error(
            LogTag::Positions,
            &format!(
                "Sold {} ({}) but could not record the close; parked for the next tick",
                position.mint,
                record.exit_signature.as_deref().unwrap_or("-")
            ),
        );
        self.pending_closes
            .lock()
            .insert(position.mint.clone(), record.clone());
        if let Err(e) = self.store.mark_pending_close(&position, &record).await {
            logger::warning(
                LogTag::Positions,
                &format!(
                    "Parking the exit of {} in the store failed: {}",
                    short_mint(&position.mint),
                    e
                ),
            );
        }
        let error = format!("sold but close not recorded: {}", last_error);
        self.events.emit(EngineEvent::ExitFailed {
            mint: position.mint.clone(),
            reason: record.close_reason,
            error: error.clone(),
        });
        Err(error)
    }

    /// Live closes report the settled SOL difference; dry runs use the fee
    /// model at the observed price. Either is checked against the price move.
    fn realized_for_close(
        &self,
        position: &Position,
        result: &ExecutionResult,
        exit_price: f64,
        quantity: f64,
    ) -> (f64, f64) {
        let modelled: Option<PnlResult> = self.accountant.realized_pnl(
            position.entry_price,
            exit_price,
            quantity,
            position.sol_spent,
            position.venue,
            0.0,
            result.network_fee_sol,
            self.priority_fee_sol,
        );

        let (pnl_sol, pnl_percent) = if result.simulated {
            modelled
                .as_ref()
                .map(|m| (m.pnl_sol, m.pnl_percent))
                .unwrap_or((0.0, 0.0))
        } else {
            self.accountant
                .settled_pnl(position.sol_spent, result.sol_received)
        };

        if let Some(mut check) = modelled {
            check.pnl_sol = pnl_sol;
            check.pnl_percent = pnl_percent;
            self.accountant.report_discrepancy(&position.mint, &check);
        }
        (pnl_sol, pnl_percent)
    }

    // =========================================================================
    // RUN LOOP
    // =========================================================================

    /// Poll the inbox and tick open positions until `shutdown` fires.
    /// Signal handling runs in its own tasks so a slow buy never delays
    /// monitoring; per-mint locks keep them apart. On shutdown the inbox is
    /// no longer polled and every spawned task is awaited, so no trade is
    /// cut off mid-flight.
    pub async fn run(self: Arc<Self>, mut inbox: SignalInbox, shutdown: Arc<Notify>) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms.max(100)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        logger::info(
            LogTag::Strategy,
            &format!(
                "Engine started ({} mode, tick {}ms)",
                if self.is_simulation() { "simulation" } else { "live" },
                self.config.tick_interval_ms
            ),
        );

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    logger::info(LogTag::Strategy, "Engine stopping");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_failure(joined);
                }
                _ = interval.tick() => {
                    match inbox.poll().await {
                        Ok(signals) => {
                            for signal in signals {
                                let engine = Arc::clone(&self);
                                tasks.spawn(async move {
                                    engine.handle_signal(&signal).await;
                                });
                            }
                        }
                        Err(e) => logger::warning(
                            LogTag::Signals,
                            &format!("Signal inbox read failed: {}", e),
                        ),
                    }

                    let engine = Arc::clone(&self);
                    tasks.spawn(async move {
                        engine.tick_all().await;
                    });
                }
            }
        }

        if !tasks.is_empty() {
            logger::info(
                LogTag::Strategy,
                &format!("Waiting for {} in-flight task(s)", tasks.len()),
            );
        }
        while let Some(joined) = tasks.join_next().await {
            log_task_failure(joined);
        }
        logger::info(LogTag::Strategy, "Engine stopped");
    }
}

fn log_task_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        logger::error(LogTag::Strategy, &format!("Engine task failed: {}", e));
    }
}

fn entry_price_from(result: &ExecutionResult) -> Option<f64> {
    result
        .effective_price
        .or_else(|| {
            let quantity = result.token_quantity();
            (quantity > 0.0).then(|| result.sol_spent / quantity)
        })
        .filter(|p| p.is_finite() && *p > 0.0)
}
