/// Configuration schemas - all config structures defined once with defaults
///
/// Each section is handed to its component by value at construction time.
use crate::config_struct;

// ============================================================================
// RPC CONFIGURATION
// ============================================================================

config_struct! {
    /// Settlement network endpoints
    pub struct RpcConfig {
        /// Primary RPC URL
        url: String = "https://api.mainnet-beta.solana.com".to_string(),
        /// Tried in order when the primary fails at transport level
        fallbacks: Vec<String> = Vec::new(),
        timeout_secs: u64 = 15,
    }
}

// ============================================================================
// WALLET CONFIGURATION
// ============================================================================

config_struct! {
    pub struct WalletConfig {
        /// Signing key (base58 or JSON byte array)
        private_key: String = String::new(),
    }
}

// ============================================================================
// PRICING CONFIGURATION
// ============================================================================

config_struct! {
    /// Price resolution configuration
    pub struct PricingConfig {
        /// Cached quote freshness window
        cache_ttl_ms: u64 = 5_000,
        /// Consecutive misses before an instrument is skipped
        failure_threshold: u32 = 3,
        /// Window in which misses count towards the threshold
        failure_cooloff_secs: u64 = 60,
        /// Probe size for aggregator quotes, in whole tokens
        probe_tokens: f64 = 1_000.0,
        /// Probe decimals when the mint account can't be read (curve tokens use 6)
        probe_token_decimals: u8 = 6,
        aggregator_enabled: bool = true,
        aggregator_quote_url: String = "https://lite-api.jup.ag/swap/v1/quote".to_string(),
        market_data_enabled: bool = true,
        market_data_url: String = "https://api.dexscreener.com/latest/dex/tokens".to_string(),
        http_timeout_secs: u64 = 10,
    }
}

// ============================================================================
// SWAPS CONFIGURATION
// ============================================================================

config_struct! {
    /// Execution client configuration
    pub struct SwapsConfig {
        /// Transaction construction route: "trade_local" or "aggregator"
        router: String = "trade_local".to_string(),
        trade_local_url: String = "https://pumpportal.fun/api/trade-local".to_string(),
        aggregator_quote_url: String = "https://lite-api.jup.ag/swap/v1/quote".to_string(),
        aggregator_swap_url: String = "https://lite-api.jup.ag/swap/v1/swap".to_string(),
        /// Default slippage tolerance in basis points
        slippage_bps: u16 = 1_000,
        /// Priority fee in SOL
        priority_fee_sol: f64 = 0.0005,
        /// Skip all network calls and return synthetic fills
        dry_run: bool = false,
        /// Notional price used for synthetic fills (SOL per token)
        dry_run_price: f64 = 0.000_000_03,
        confirm_poll_interval_ms: u64 = 1_000,
        confirm_max_attempts: u32 = 30,
        send_retries: u32 = 3,
        send_retry_delay_ms: u64 = 1_000,
        record_fetch_attempts: u32 = 5,
        record_fetch_delay_ms: u64 = 1_000,
        http_timeout_secs: u64 = 20,
    }
}

// ============================================================================
// STRATEGY CONFIGURATION
// ============================================================================

config_struct! {
    /// Entry and exit rules
    pub struct StrategyConfig {
        /// Corroborating wallets required to enter (live mode only)
        min_upvotes: u32 = 2,
        rebuy_window_secs: i64 = 300,
        /// Prior days of close history searched for the rebuy block
        rebuy_history_days: u32 = 1,
        /// Per-instrument cooldown after any entry or exit
        entry_cooldown_secs: u64 = 10,
        max_open_positions: usize = 5,

        profit_target_percent: f64 = 50.0,
        trailing_stop_percent: f64 = 15.0,
        stop_loss_percent: f64 = 25.0,
        /// Distinct tracked sellers that trigger a signal-follow exit
        signal_follow_min_sellers: usize = 2,
        /// Optional hold bound; disabled when unset
        max_hold_secs: Option<u64> = None,

        tick_interval_ms: u64 = 2_000,
        default_trade_sol: f64 = 0.01,
        min_trade_sol: f64 = 0.005,
        max_trade_sol: f64 = 0.1,
        strategy_tag: String = "copy".to_string(),
    }
}

// ============================================================================
// FEES CONFIGURATION
// ============================================================================

config_struct! {
    /// Fee model used by the PnL accountant
    pub struct FeesConfig {
        /// Per-side fee on the bonding curve venue
        bonding_curve_fee_percent: f64 = 1.75,
        /// Per-side fee on general exchanges
        exchange_fee_percent: f64 = 0.5,
        /// Fixed network fee per round trip (SOL)
        network_fee_sol: f64 = 0.000_01,
        /// Slippage assumed for unrealized PnL estimates
        estimated_slippage_percent: f64 = 1.0,
        /// Allowed divergence beyond fee impact before a discrepancy is flagged
        discrepancy_tolerance_percent: f64 = 2.0,
    }
}

// ============================================================================
// STORE / SIGNALS CONFIGURATION
// ============================================================================

config_struct! {
    pub struct StoreConfig {
        database_path: String = "data/positions.db".to_string(),
    }
}

config_struct! {
    /// File-based signal inbox (JSON lines appended by the wallet tracker)
    pub struct SignalsConfig {
        inbox_path: String = "data/signals.jsonl".to_string(),
        poll_interval_ms: u64 = 1_000,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        rpc: RpcConfig = RpcConfig::default(),
        wallet: WalletConfig = WalletConfig::default(),
        pricing: PricingConfig = PricingConfig::default(),
        swaps: SwapsConfig = SwapsConfig::default(),
        strategy: StrategyConfig = StrategyConfig::default(),
        fees: FeesConfig = FeesConfig::default(),
        store: StoreConfig = StoreConfig::default(),
        signals: SignalsConfig = SignalsConfig::default(),
    }
}
