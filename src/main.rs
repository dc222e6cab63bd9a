use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use solana_sdk::signature::Keypair;
use std::sync::Arc;
use tokio::sync::Notify;

use copytrader::{
    arguments::{enabled_debug_modes, get_cmd_args},
    config::{self, Config, CONFIG_FILE_PATH},
    events::LogEventSink,
    logger::{self, LogTag},
    positions::{CloseReason, PositionStore, SqlitePositionStore},
    pricing::{
        BondingCurveVenueCheck, GraduationDetector, PriceProvider, PriceResolver, VenueCheck,
    },
    rpc::{JsonRpcClient, RpcClient},
    signals::SignalInbox,
    strategy::{load_recent_history, EngineDeps, StrategyEngine},
    summary,
    swaps::{builder_from_config, ExecutionClient},
};

/// Copy-trades tracked Solana wallets
#[derive(Parser)]
#[command(name = "copytrader", version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine until Ctrl+C
    Run {
        /// Synthetic fills, no transactions sent
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve the current price of a mint
    Price {
        mint: String,
        /// Bypass the cache
        #[arg(long)]
        fresh: bool,
    },
    /// List open positions
    Positions,
    /// Sell and close an open position now
    Close { mint: String },
    /// Closed-trade summary
    Summary {
        /// Days of history including today
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Write the effective config file
    InitConfig,
}

/// Logger flags are read from the raw arguments by the logger itself
fn clap_args() -> Vec<String> {
    let mut args = Vec::new();
    let mut iter = get_cmd_args().into_iter().peekable();
    while let Some(arg) = iter.next() {
        if arg == "--log-level" {
            iter.next();
            continue;
        }
        if arg.starts_with("--debug-")
            || arg.starts_with("--verbose")
            || arg == "--quiet"
        {
            continue;
        }
        args.push(arg);
    }
    args
}

struct Services {
    rpc: Arc<dyn RpcClient>,
    prices: Arc<PriceResolver>,
    store: Arc<SqlitePositionStore>,
}

fn services(config: &Config) -> Result<Services> {
    let rpc: Arc<dyn RpcClient> = Arc::new(JsonRpcClient::new(&config.rpc)?);
    let prices = Arc::new(PriceResolver::from_config(rpc.clone(), &config.pricing)?);
    let store = Arc::new(SqlitePositionStore::open(&config.store.database_path)?);
    Ok(Services { rpc, prices, store })
}

fn build_engine(config: &Config, services: &Services) -> Result<StrategyEngine> {
    let keypair: Option<Arc<Keypair>> = if config.wallet.private_key.trim().is_empty() {
        None
    } else {
        Some(Arc::new(config.wallet_keypair()?))
    };

    let builder = builder_from_config(&config.swaps)?;
    let executor = ExecutionClient::new(
        services.rpc.clone(),
        builder,
        keypair,
        config.swaps.clone(),
    )?;

    let venue_check: Arc<dyn VenueCheck> =
        Arc::new(BondingCurveVenueCheck::new(services.rpc.clone()));
    let graduation = Arc::new(GraduationDetector::new(
        Some(venue_check),
        services.prices.clone(),
    ));

    Ok(StrategyEngine::new(
        EngineDeps {
            executor: Arc::new(executor),
            prices: services.prices.clone(),
            graduation,
            store: services.store.clone(),
            events: Arc::new(LogEventSink),
        },
        config.strategy.clone(),
        config.fees.clone(),
        &config.swaps,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let cli = Cli::parse_from(clap_args());

    let debug_modes = enabled_debug_modes();
    if !debug_modes.is_empty() {
        logger::info(
            LogTag::System,
            &format!("Debug modes: {}", debug_modes.join(", ")),
        );
    }

    let mut config = config::load_config_from_path(&cli.config)?;

    let result = match cli.command {
        Command::InitConfig => {
            config::save_config(&config, &cli.config)?;
            println!("Wrote {}", cli.config);
            Ok(())
        }
        Command::Run { dry_run } => {
            if dry_run {
                config.swaps.dry_run = true;
            }
            config.validate().context("invalid configuration")?;
            run(config).await
        }
        Command::Price { mint, fresh } => {
            let services = services(&config)?;
            let quote = services.prices.resolve(&mint, fresh).await;
            println!("{}", serde_json::to_string_pretty(&quote)?);
            Ok(())
        }
        Command::Positions => {
            let services = services(&config)?;
            let open = services.store.list_open().await?;
            if open.is_empty() {
                println!("No open positions");
            } else {
                println!("{}", summary::render_open_positions(&open));
            }
            Ok(())
        }
        Command::Close { mint } => {
            config.validate().context("invalid configuration")?;
            let services = services(&config)?;
            let engine = build_engine(&config, &services)?;
            let record = engine.close_position(&mint, CloseReason::Manual).await?;
            println!(
                "Closed {} | P&L {:+.6} SOL ({:+.2}%)",
                record.mint, record.pnl_sol, record.pnl_percent
            );
            Ok(())
        }
        Command::Summary { days } => {
            if days == 0 {
                bail!("--days must be at least 1");
            }
            let services = services(&config)?;
            let records =
                load_recent_history(services.store.as_ref(), Utc::now(), days - 1).await?;
            if !records.is_empty() {
                println!("{}", summary::render_history_table(&records));
            }
            println!("{}", summary::render_summary(&summary::summarize(&records)));
            Ok(())
        }
    };

    logger::flush();
    result
}

async fn run(config: Config) -> Result<()> {
    logger::info(LogTag::System, "🚀 copytrader starting");
    let services = services(&config)?;
    let engine = Arc::new(build_engine(&config, &services)?);
    let inbox = SignalInbox::new(&config.signals);

    let shutdown = Arc::new(Notify::new());
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        logger::info(LogTag::System, "Shutdown requested");
        handler_shutdown.notify_one();
    })
    .context("installing Ctrl+C handler")?;

    engine.run(inbox, shutdown).await;
    logger::info(LogTag::System, "copytrader stopped");
    Ok(())
}
