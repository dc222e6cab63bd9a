/// Execution client
///
/// buy/sell flow: build an unsigned transaction remotely, sign locally,
/// submit, poll for confirmation, then prove the trade from the signer's own
/// balance deltas. Dry-run mode returns deterministic synthetic fills.
pub mod builders;
pub mod execution;
pub mod types;
pub mod verification;

use async_trait::async_trait;
use chrono::Utc;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SwapsConfig;
use crate::errors::{CopyTraderError, FailureType};
use crate::logger::{self, LogTag};
use crate::rpc::RpcClient;
use crate::utils::short_mint;

pub use builders::{AggregatorSwapBuilder, TradeLocalBuilder, TransactionBuilder};
pub use execution::ConfirmationOutcome;
pub use types::{
    ExecutionResult, ExecutionStatus, SellAmount, TradeAction, TradeAmount, TradeRequest, Venue,
};

/// Trade execution seam consumed by the strategy engine
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn buy(
        &self,
        mint: &str,
        sol_amount: f64,
        venue: Venue,
        slippage_bps: u16,
        priority_fee_sol: f64,
    ) -> ExecutionResult;

    async fn sell(
        &self,
        mint: &str,
        amount: SellAmount,
        venue: Venue,
        slippage_bps: u16,
        priority_fee_sol: f64,
    ) -> ExecutionResult;

    fn is_dry_run(&self) -> bool;
}

/// Pick the configured transaction builder
pub fn builder_from_config(
    config: &SwapsConfig,
) -> Result<Arc<dyn TransactionBuilder>, CopyTraderError> {
    match config.router.as_str() {
        "aggregator" => Ok(Arc::new(AggregatorSwapBuilder::new(config)?)),
        _ => Ok(Arc::new(TradeLocalBuilder::new(config)?)),
    }
}

pub struct ExecutionClient {
    rpc: Arc<dyn RpcClient>,
    builder: Arc<dyn TransactionBuilder>,
    /// Absent only in dry-run mode
    keypair: Option<Arc<Keypair>>,
    config: SwapsConfig,
}

impl ExecutionClient {
    pub fn new(
        rpc: Arc<dyn RpcClient>,
        builder: Arc<dyn TransactionBuilder>,
        keypair: Option<Arc<Keypair>>,
        config: SwapsConfig,
    ) -> Result<Self, CopyTraderError> {
        if keypair.is_none() && !config.dry_run {
            return Err(crate::errors::ConfigurationError::MissingConfig {
                field: "wallet.private_key".to_string(),
            }
            .into());
        }
        Ok(Self {
            rpc,
            builder,
            keypair,
            config,
        })
    }

    /// Synthetic fill at the configured notional price
    fn simulate(&self, action: TradeAction, mint: &str, amount: TradeAmount) -> ExecutionResult {
        let price = self.config.dry_run_price;
        let (sol_spent, sol_received, tokens_received, tokens_sold) = match amount {
            TradeAmount::Sol(sol) => (sol, 0.0, sol / price, 0.0),
            TradeAmount::Sell(sell) => {
                let tokens = sell.tracked_quantity();
                (0.0, tokens * price, 0.0, tokens)
            }
        };

        let result = ExecutionResult {
            success: true,
            simulated: true,
            action,
            mint: mint.to_string(),
            signature: Some(format!("dryrun-{}-{}", action, mint)),
            sol_spent,
            sol_received,
            tokens_received,
            tokens_sold,
            token_decimals: Some(crate::constants::BONDING_CURVE_TOKEN_DECIMALS),
            network_fee_sol: 0.0,
            effective_price: Some(price),
            error: None,
            failure_type: None,
            timestamp: Utc::now(),
        };

        logger::info(
            LogTag::Swap,
            &format!(
                "[DRY RUN] {} {} at {:.12} SOL (sol_spent={:.6}, sol_received={:.6})",
                action,
                short_mint(mint),
                price,
                sol_spent,
                sol_received
            ),
        );
        result
    }

    async fn execute(
        &self,
        action: TradeAction,
        mint: &str,
        amount: TradeAmount,
        venue: Venue,
        slippage_bps: u16,
        priority_fee_sol: f64,
    ) -> ExecutionResult {
        if self.config.dry_run {
            return self.simulate(action, mint, amount);
        }

        let Some(keypair) = self.keypair.as_ref() else {
            return ExecutionResult::failed(
                action,
                mint,
                None,
                "no signing key configured",
                FailureType::Permanent,
            );
        };
        let wallet = keypair.pubkey().to_string();

        let request = TradeRequest {
            action,
            mint: mint.to_string(),
            amount,
            slippage_bps,
            priority_fee_sol,
            venue,
            wallet: wallet.clone(),
        };

        // 1. unsigned transaction
        let unsigned = match self.builder.build(&request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                logger::error(
                    LogTag::Swap,
                    &format!("{} {} build via {} failed: {}", action, mint, self.builder.name(), e),
                );
                let failure = if e.is_transient() {
                    FailureType::Temporary
                } else {
                    FailureType::Permanent
                };
                return ExecutionResult::failed(
                    action,
                    mint,
                    None,
                    format!("transaction construction failed: {}", e),
                    failure,
                );
            }
        };

        // 2. sign and submit
        let signed = match execution::sign_transaction(&unsigned, keypair) {
            Ok(tx) => tx,
            Err(e) => {
                logger::error(LogTag::Swap, &format!("{} {} signing failed: {}", action, mint, e));
                return ExecutionResult::failed(
                    action,
                    mint,
                    None,
                    e.to_string(),
                    FailureType::Permanent,
                );
            }
        };

        let signature = match execution::submit_with_retries(
            self.rpc.as_ref(),
            &signed,
            self.config.send_retries,
            Duration::from_millis(self.config.send_retry_delay_ms),
            mint,
        )
        .await
        {
            Ok(signature) => signature,
            Err(e) => {
                logger::error(LogTag::Swap, &format!("{} {} submit failed: {}", action, mint, e));
                let failure = if e.is_transient() {
                    FailureType::Temporary
                } else {
                    FailureType::Permanent
                };
                return ExecutionResult::failed(
                    action,
                    mint,
                    None,
                    format!("submission failed: {}", e),
                    failure,
                );
            }
        };
        let signature_str = signature.to_string();
        logger::info(
            LogTag::Swap,
            &format!("{} {} submitted: {}", action, short_mint(mint), signature_str),
        );

        // 3. confirmation
        match execution::wait_for_confirmation(
            self.rpc.as_ref(),
            &signature,
            Duration::from_millis(self.config.confirm_poll_interval_ms),
            self.config.confirm_max_attempts,
        )
        .await
        {
            ConfirmationOutcome::Confirmed { slot } => {
                logger::debug(
                    LogTag::Swap,
                    &format!("{} confirmed in slot {}", signature_str, slot),
                );
            }
            ConfirmationOutcome::Failed {
                error,
                failure_type,
            } => {
                logger::error(
                    LogTag::Swap,
                    &format!("{} {} failed on-chain ({}): {}", action, mint, signature_str, error),
                );
                return ExecutionResult::failed(
                    action,
                    mint,
                    Some(signature_str),
                    format!("transaction failed on-chain: {}", error),
                    failure_type,
                );
            }
            ConfirmationOutcome::Unconfirmed { attempts } => {
                logger::warning(
                    LogTag::Swap,
                    &format!(
                        "{} {} unconfirmed after {} polls: {}",
                        action, mint, attempts, signature_str
                    ),
                );
                return ExecutionResult::failed(
                    action,
                    mint,
                    Some(signature_str),
                    format!("unconfirmed after {} status polls", attempts),
                    FailureType::Uncertain,
                );
            }
        }

        // 4-5. independent balance verification
        let Some(record) = execution::fetch_transaction_record(
            self.rpc.as_ref(),
            &signature,
            self.config.record_fetch_attempts,
            Duration::from_millis(self.config.record_fetch_delay_ms),
        )
        .await
        else {
            logger::error(
                LogTag::Verify,
                &format!("{} {}: transaction record missing for {}", action, mint, signature_str),
            );
            return ExecutionResult::failed(
                action,
                mint,
                Some(signature_str),
                "transaction record not found",
                FailureType::Uncertain,
            );
        };

        let deltas = match verification::verify_balance_deltas(&record, &wallet, mint, action) {
            Ok(deltas) => deltas,
            Err(reason) => {
                logger::error(
                    LogTag::Verify,
                    &format!("{} {} rejected ({}): {}", action, mint, signature_str, reason),
                );
                let failure = record
                    .err
                    .as_ref()
                    .map(crate::errors::classify_transaction_error)
                    .unwrap_or(FailureType::Permanent);
                return ExecutionResult::failed(
                    action,
                    mint,
                    Some(signature_str),
                    format!("verification failed: {}", reason),
                    failure,
                );
            }
        };

        let tokens = deltas.token_amount();
        let result = ExecutionResult {
            success: true,
            simulated: false,
            action,
            mint: mint.to_string(),
            signature: Some(signature_str.clone()),
            sol_spent: if action == TradeAction::Buy { deltas.sol_amount } else { 0.0 },
            sol_received: if action == TradeAction::Sell { deltas.sol_amount } else { 0.0 },
            tokens_received: if action == TradeAction::Buy { tokens } else { 0.0 },
            tokens_sold: if action == TradeAction::Sell { tokens } else { 0.0 },
            token_decimals: Some(deltas.token_decimals),
            network_fee_sol: deltas.network_fee_sol,
            effective_price: deltas.effective_price(action),
            error: None,
            failure_type: None,
            timestamp: Utc::now(),
        };

        logger::info(
            LogTag::Verify,
            &format!(
                "{} {} verified: {:.4} tokens, {:.9} SOL, price {:.12} ({})",
                action,
                short_mint(mint),
                tokens,
                deltas.sol_amount,
                result.effective_price.unwrap_or_default(),
                signature_str
            ),
        );
        result
    }
}

#[async_trait]
impl TradeExecutor for ExecutionClient {
    async fn buy(
        &self,
        mint: &str,
        sol_amount: f64,
        venue: Venue,
        slippage_bps: u16,
        priority_fee_sol: f64,
    ) -> ExecutionResult {
        if !(sol_amount.is_finite() && sol_amount > 0.0) {
            return ExecutionResult::failed(
                TradeAction::Buy,
                mint,
                None,
                format!("invalid buy amount {}", sol_amount),
                FailureType::Permanent,
            );
        }
        self.execute(
            TradeAction::Buy,
            mint,
            TradeAmount::Sol(sol_amount),
            venue,
            slippage_bps,
            priority_fee_sol,
        )
        .await
    }

    async fn sell(
        &self,
        mint: &str,
        amount: SellAmount,
        venue: Venue,
        slippage_bps: u16,
        priority_fee_sol: f64,
    ) -> ExecutionResult {
        if let SellAmount::Tokens(quantity) = amount {
            if !(quantity.is_finite() && quantity > 0.0) {
                return ExecutionResult::failed(
                    TradeAction::Sell,
                    mint,
                    None,
                    format!("invalid sell quantity {}", quantity),
                    FailureType::Permanent,
                );
            }
        }
        self.execute(
            TradeAction::Sell,
            mint,
            TradeAmount::Sell(amount),
            venue,
            slippage_bps,
            priority_fee_sol,
        )
        .await
    }

    fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }
}

#[cfg(test)]
mod tests {
    use super::execution::test_support::unsigned_transaction_bytes;
    use super::*;
    use crate::rpc::testing::MockRpcClient;
    use crate::rpc::{SignatureStatus, TokenBalance, TransactionRecord};
    use parking_lot::Mutex;
    use solana_sdk::pubkey::Pubkey;

    struct StaticBuilder {
        bytes: Vec<u8>,
        requests: Mutex<Vec<TradeRequest>>,
    }

    #[async_trait]
    impl TransactionBuilder for StaticBuilder {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn build(&self, request: &TradeRequest) -> Result<Vec<u8>, CopyTraderError> {
            self.requests.lock().push(request.clone());
            Ok(self.bytes.clone())
        }
    }

    struct Harness {
        client: ExecutionClient,
        rpc: Arc<MockRpcClient>,
        builder: Arc<StaticBuilder>,
        wallet: String,
        mint: String,
    }

    fn fast_config() -> SwapsConfig {
        SwapsConfig {
            confirm_poll_interval_ms: 10,
            confirm_max_attempts: 3,
            send_retry_delay_ms: 10,
            record_fetch_attempts: 2,
            record_fetch_delay_ms: 10,
            ..SwapsConfig::default()
        }
    }

    fn harness() -> Harness {
        let keypair = Keypair::new();
        let wallet = keypair.pubkey().to_string();
        let rpc = Arc::new(MockRpcClient::new());
        let builder = Arc::new(StaticBuilder {
            bytes: unsigned_transaction_bytes(&keypair.pubkey()),
            requests: Mutex::new(Vec::new()),
        });
        let client = ExecutionClient::new(
            rpc.clone(),
            builder.clone(),
            Some(Arc::new(keypair)),
            fast_config(),
        )
        .unwrap();
        Harness {
            client,
            rpc,
            builder,
            wallet,
            mint: Pubkey::new_unique().to_string(),
        }
    }

    fn confirmed() -> Option<SignatureStatus> {
        Some(SignatureStatus {
            slot: 5,
            err: None,
            confirmation_status: Some("confirmed".to_string()),
        })
    }

    fn record(h: &Harness, sol: (u64, u64), tokens: (Option<u64>, Option<u64>)) -> TransactionRecord {
        let balance = |amount: u64| TokenBalance {
            account_index: 1,
            mint: h.mint.clone(),
            owner: Some(h.wallet.clone()),
            amount,
            decimals: 6,
        };
        TransactionRecord {
            slot: 5,
            err: None,
            fee: 5_000,
            account_keys: vec![h.wallet.clone(), "Ata".to_string()],
            pre_balances: vec![sol.0, 0],
            post_balances: vec![sol.1, 0],
            pre_token_balances: tokens.0.map(balance).into_iter().collect(),
            post_token_balances: tokens.1.map(balance).into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_verified_buy() {
        tokio::time::pause();
        let h = harness();
        h.rpc.push_status(confirmed());
        h.rpc
            .push_record(Some(record(&h, (1_000_000_000, 899_995_000), (None, Some(2_000_000_000)))));

        let result = h
            .client
            .buy(&h.mint, 0.1, Venue::BondingCurve, 500, 0.0001)
            .await;
        assert_eq!(result.status(), ExecutionStatus::Success);
        assert_eq!(result.tokens_received, 2_000.0);
        assert!(result.sol_spent > 0.0);
        assert!(result.signature.is_some());

        let requests = h.builder.requests.lock();
        assert_eq!(requests[0].amount, TradeAmount::Sol(0.1));
        assert_eq!(requests[0].wallet, h.wallet);
        assert_eq!(h.rpc.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_movement_is_never_success() {
        tokio::time::pause();
        let h = harness();
        h.rpc.push_status(confirmed());
        h.rpc
            .push_record(Some(record(&h, (1_000_000_000, 999_995_000), (None, None))));

        let result = h
            .client
            .buy(&h.mint, 0.1, Venue::BondingCurve, 500, 0.0001)
            .await;
        assert_eq!(result.status(), ExecutionStatus::Failed);
        assert!(result.error.unwrap().contains("zero tokens received"));
    }

    #[tokio::test]
    async fn test_unconfirmed_is_not_success() {
        tokio::time::pause();
        let h = harness();
        h.rpc.push_status(None);

        let result = h
            .client
            .sell(
                &h.mint,
                SellAmount::All {
                    tracked_quantity: 10.0,
                },
                Venue::Exchange,
                500,
                0.0001,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_type, Some(FailureType::Uncertain));
        assert_eq!(h.rpc.status_polls(), 3);
    }

    #[tokio::test]
    async fn test_missing_record_is_failure() {
        tokio::time::pause();
        let h = harness();
        h.rpc.push_status(confirmed());
        h.rpc.push_record(None);

        let result = h
            .client
            .sell(&h.mint, SellAmount::Tokens(5.0), Venue::Exchange, 500, 0.0)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("record not found"));
    }

    #[tokio::test]
    async fn test_verified_sell() {
        tokio::time::pause();
        let h = harness();
        h.rpc.push_status(confirmed());
        h.rpc.push_record(Some(record(
            &h,
            (100_000_000, 250_000_000),
            (Some(2_000_000_000), Some(0)),
        )));

        let result = h
            .client
            .sell(
                &h.mint,
                SellAmount::All {
                    tracked_quantity: 2_000.0,
                },
                Venue::BondingCurve,
                500,
                0.0,
            )
            .await;
        assert_eq!(result.status(), ExecutionStatus::Success);
        assert_eq!(result.tokens_sold, 2_000.0);
        assert!((result.sol_received - 0.15).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_dry_run_is_deterministic_and_offline() {
        let rpc = Arc::new(MockRpcClient::new());
        let builder = Arc::new(StaticBuilder {
            bytes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        });
        let config = SwapsConfig {
            dry_run: true,
            dry_run_price: 0.0001,
            ..SwapsConfig::default()
        };
        let client = ExecutionClient::new(rpc.clone(), builder.clone(), None, config).unwrap();

        let buy = client.buy("MintA", 0.5, Venue::BondingCurve, 100, 0.0).await;
        assert_eq!(buy.status(), ExecutionStatus::Simulated);
        assert_eq!(buy.signature.as_deref(), Some("dryrun-buy-MintA"));
        assert!((buy.tokens_received - 5_000.0).abs() < 1e-9);

        let sell = client
            .sell(
                "MintA",
                SellAmount::All {
                    tracked_quantity: 5_000.0,
                },
                Venue::BondingCurve,
                100,
                0.0,
            )
            .await;
        assert!((sell.sol_received - 0.5).abs() < 1e-9);
        assert!(builder.requests.lock().is_empty());
        assert!(rpc.sent.lock().is_empty());
    }

    #[test]
    fn test_live_mode_requires_key() {
        let rpc = Arc::new(MockRpcClient::new());
        let builder = Arc::new(StaticBuilder {
            bytes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        });
        assert!(ExecutionClient::new(rpc, builder, None, SwapsConfig::default()).is_err());
    }
}
