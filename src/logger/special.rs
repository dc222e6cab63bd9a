//! Special-purpose log helpers

use super::tags::LogTag;
use crate::logger;
use colored::*;

/// Log one monitoring tick of an open position.
///
/// Shows the price move since entry with a direction-colored arrow, the
/// fee-aware P&L, the peak P&L, the hold time and the number of tracked
/// wallets that already sold.
pub fn log_position_tick(
    mint: &str,
    entry_price: f64,
    current_price: f64,
    pnl_percent: f64,
    max_pnl_percent: f64,
    hold_secs: i64,
    sellers: usize,
    source: &str,
) {
    let change = if entry_price > 0.0 {
        ((current_price - entry_price) / entry_price) * 100.0
    } else {
        0.0
    };

    let arrow = if change > 0.0 {
        "▲".green().to_string()
    } else if change < 0.0 {
        "▼".red().to_string()
    } else {
        "■".yellow().to_string()
    };

    let pnl = format!("{:+.2}%", pnl_percent);
    let pnl = if pnl_percent >= 0.0 {
        pnl.green().to_string()
    } else {
        pnl.red().to_string()
    };

    logger::info(
        LogTag::Strategy,
        &format!(
            "{} {} {:.10} SOL ({:+.2}%) | P&L {} | peak {:+.2}% | held {}s | sellers {} | via {}",
            arrow,
            crate::utils::short_mint(mint),
            current_price,
            change,
            pnl,
            max_pnl_percent,
            hold_secs,
            sellers,
            source
        ),
    );
}
