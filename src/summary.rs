use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::positions::{ClosedTradeRecord, Position};
use crate::utils::{format_duration_compact, short_mint};

/// Totals over closed-trade history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TradeSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_percent: f64,
    pub realized_pnl_sol: f64,
    pub sol_spent: f64,
    pub best_percent: Option<f64>,
    pub worst_percent: Option<f64>,
    /// Closes per reason tag
    pub by_reason: BTreeMap<String, usize>,
    pub simulated: usize,
}

pub fn summarize(records: &[ClosedTradeRecord]) -> TradeSummary {
    let mut summary = TradeSummary::default();
    for record in records {
        summary.trades += 1;
        if record.pnl_sol > 0.0 {
            summary.wins += 1;
        } else {
            summary.losses += 1;
        }
        if record.simulated {
            summary.simulated += 1;
        }
        summary.realized_pnl_sol += record.pnl_sol;
        summary.sol_spent += record.sol_spent;
        summary.best_percent = Some(
            summary
                .best_percent
                .map_or(record.pnl_percent, |b| b.max(record.pnl_percent)),
        );
        summary.worst_percent = Some(
            summary
                .worst_percent
                .map_or(record.pnl_percent, |w| w.min(record.pnl_percent)),
        );
        *summary
            .by_reason
            .entry(record.close_reason.as_str().to_string())
            .or_insert(0) += 1;
    }
    if summary.trades > 0 {
        summary.win_rate_percent = summary.wins as f64 / summary.trades as f64 * 100.0;
    }
    summary
}

#[derive(Tabled)]
struct ClosedTradeRow {
    #[tabled(rename = "🔑 Mint")]
    mint: String,
    #[tabled(rename = "👛 Wallet")]
    wallet: String,
    #[tabled(rename = "📈 Entry")]
    entry_price: String,
    #[tabled(rename = "🚪 Exit")]
    exit_price: String,
    #[tabled(rename = "💰 Size (SOL)")]
    size_sol: String,
    #[tabled(rename = "💸 P&L (SOL)")]
    pnl_sol: String,
    #[tabled(rename = "📊 P&L (%)")]
    pnl_percent: String,
    #[tabled(rename = "⏱️ Duration")]
    duration: String,
    #[tabled(rename = "🎯 Reason")]
    reason: String,
}

#[derive(Tabled)]
struct OpenPositionRow {
    #[tabled(rename = "🔑 Mint")]
    mint: String,
    #[tabled(rename = "👛 Wallet")]
    wallet: String,
    #[tabled(rename = "📈 Entry")]
    entry_price: String,
    #[tabled(rename = "🔝 Peak")]
    max_price: String,
    #[tabled(rename = "💰 Size (SOL)")]
    size_sol: String,
    #[tabled(rename = "🏛️ Venue")]
    venue: String,
    #[tabled(rename = "⏱️ Held")]
    held: String,
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::center()));
    table.to_string()
}

pub fn render_history_table(records: &[ClosedTradeRecord]) -> String {
    let rows: Vec<ClosedTradeRow> = records
        .iter()
        .map(|r| ClosedTradeRow {
            mint: short_mint(&r.mint).to_string(),
            wallet: short_mint(&r.wallet).to_string(),
            entry_price: format!("{:.10}", r.entry_price),
            exit_price: format!("{:.10}", r.exit_price),
            size_sol: format!("{:.4}", r.sol_spent),
            pnl_sol: format!("{:+.6}", r.pnl_sol),
            pnl_percent: format!("{:+.2}%", r.pnl_percent),
            duration: format_duration_compact(r.entry_time, r.closed_at),
            reason: if r.simulated {
                format!("{} (dry run)", r.close_reason)
            } else {
                r.close_reason.to_string()
            },
        })
        .collect();
    styled(Table::new(rows))
}

pub fn render_open_positions(positions: &[Position]) -> String {
    let now = Utc::now();
    let rows: Vec<OpenPositionRow> = positions
        .iter()
        .map(|p| OpenPositionRow {
            mint: short_mint(&p.mint).to_string(),
            wallet: short_mint(&p.wallet).to_string(),
            entry_price: format!("{:.10}", p.entry_price),
            max_price: format!("{:.10}", p.max_price),
            size_sol: format!("{:.4}", p.sol_spent),
            venue: p.venue.as_str().to_string(),
            held: format_duration_compact(p.entry_time, now),
        })
        .collect();
    styled(Table::new(rows))
}

pub fn render_summary(summary: &TradeSummary) -> String {
    let mut out = format!(
        "Trades: {} | Wins: {} | Losses: {} | Win rate: {:.1}%\nRealized P&L: {:+.6} SOL on {:.4} SOL spent",
        summary.trades,
        summary.wins,
        summary.losses,
        summary.win_rate_percent,
        summary.realized_pnl_sol,
        summary.sol_spent
    );
    if let (Some(best), Some(worst)) = (summary.best_percent, summary.worst_percent) {
        out.push_str(&format!("\nBest: {:+.2}% | Worst: {:+.2}%", best, worst));
    }
    if !summary.by_reason.is_empty() {
        let reasons: Vec<String> = summary
            .by_reason
            .iter()
            .map(|(reason, count)| format!("{} {}", reason, count))
            .collect();
        out.push_str(&format!("\nBy reason: {}", reasons.join(", ")));
    }
    if summary.simulated > 0 {
        out.push_str(&format!("\n({} simulated)", summary.simulated));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::CloseReason;
    use crate::swaps::Venue;

    fn record(pnl_sol: f64, pnl_percent: f64, reason: CloseReason) -> ClosedTradeRecord {
        let now = Utc::now();
        ClosedTradeRecord {
            mint: "Mint111111".into(),
            wallet: "Wallet1111".into(),
            strategy: "copy".into(),
            close_reason: reason,
            entry_time: now,
            closed_at: now,
            entry_price: 0.0001,
            exit_price: 0.0001,
            quantity: 1.0,
            sol_spent: 0.1,
            sol_received: 0.1 + pnl_sol,
            pnl_sol,
            pnl_percent,
            entry_signature: None,
            exit_signature: None,
            venue: Venue::BondingCurve,
            simulated: false,
        }
    }

    #[test]
    fn test_summarize() {
        let records = vec![
            record(0.05, 50.0, CloseReason::ProfitTarget),
            record(-0.02, -20.0, CloseReason::StopLoss),
            record(0.01, 10.0, CloseReason::ProfitTarget),
            record(0.0, 0.0, CloseReason::Manual),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.trades, 4);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 2);
        assert_eq!(summary.win_rate_percent, 50.0);
        assert!((summary.realized_pnl_sol - 0.04).abs() < 1e-12);
        assert_eq!(summary.best_percent, Some(50.0));
        assert_eq!(summary.worst_percent, Some(-20.0));
        assert_eq!(summary.by_reason.get("profit_target"), Some(&2));

        let text = render_summary(&summary);
        assert!(text.contains("Win rate: 50.0%"));
        assert!(render_history_table(&records).contains("Mint1111"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.trades, 0);
        assert_eq!(summary.win_rate_percent, 0.0);
        assert!(summary.best_percent.is_none());
    }
}
