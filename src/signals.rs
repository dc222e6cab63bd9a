/// Trade signals from tracked wallets
///
/// Signals arrive as JSON lines appended to an inbox file by the wallet
/// tracker. Sell signals are also collected per mint so the exit rules can
/// count how many tracked wallets already left.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::SignalsConfig;
use crate::errors::CopyTraderError;
use crate::logger::{self, LogTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Buy,
    Sell,
}

/// Unit of `TradeSignal::amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    #[default]
    Sol,
    Tokens,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub mint: String,
    pub wallet: String,
    pub side: SignalSide,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub denomination: Denomination,
    /// Tracked wallets that made the same trade
    #[serde(default = "default_upvotes")]
    pub upvotes: u32,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_upvotes() -> u32 {
    1
}

impl TradeSignal {
    pub fn buy(mint: &str, wallet: &str, amount_sol: Option<f64>, upvotes: u32) -> Self {
        Self {
            mint: mint.to_string(),
            wallet: wallet.to_string(),
            side: SignalSide::Buy,
            amount: amount_sol,
            denomination: Denomination::Sol,
            upvotes,
            timestamp: Utc::now(),
        }
    }

    pub fn sell(mint: &str, wallet: &str) -> Self {
        Self {
            mint: mint.to_string(),
            wallet: wallet.to_string(),
            side: SignalSide::Sell,
            amount: None,
            denomination: Denomination::Tokens,
            upvotes: 1,
            timestamp: Utc::now(),
        }
    }

    /// Requested SOL amount, if the signal is SOL-denominated
    pub fn amount_sol(&self) -> Option<f64> {
        match self.denomination {
            Denomination::Sol => self.amount.filter(|a| a.is_finite() && *a > 0.0),
            Denomination::Tokens => None,
        }
    }
}

/// Distinct tracked wallets that sold each mint
#[derive(Debug, Default)]
pub struct SellerBook {
    sellers: HashMap<String, HashSet<String>>,
}

impl SellerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the seller count after recording
    pub fn record(&mut self, mint: &str, wallet: &str) -> usize {
        let entry = self.sellers.entry(mint.to_string()).or_default();
        entry.insert(wallet.to_string());
        entry.len()
    }

    pub fn count(&self, mint: &str) -> usize {
        self.sellers.get(mint).map(|s| s.len()).unwrap_or(0)
    }

    pub fn clear(&mut self, mint: &str) {
        self.sellers.remove(mint);
    }
}

/// Tails a JSON-lines file, remembering the read offset
pub struct SignalInbox {
    path: PathBuf,
    offset: u64,
}

impl SignalInbox {
    pub fn new(config: &SignalsConfig) -> Self {
        Self {
            path: PathBuf::from(&config.inbox_path),
            offset: 0,
        }
    }

    /// Signals appended since the last poll. Malformed lines are logged and
    /// skipped; a missing file yields nothing.
    pub async fn poll(&mut self) -> Result<Vec<TradeSignal>, CopyTraderError> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        if len < self.offset {
            // truncated or rotated
            self.offset = 0;
        }
        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut buf = String::new();
        file.read_to_string(&mut buf).await?;

        // Only consume complete lines; a partial trailing line is read next time
        let complete = match buf.rfind('\n') {
            Some(idx) => &buf[..=idx],
            None => return Ok(Vec::new()),
        };
        self.offset += complete.len() as u64;

        Ok(parse_signal_lines(complete))
    }
}

pub fn parse_signal_lines(text: &str) -> Vec<TradeSignal> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<TradeSignal>(line) {
            Ok(signal) => Some(signal),
            Err(e) => {
                logger::warning(
                    LogTag::Signals,
                    &format!("Skipping malformed signal line: {} ({})", line, e),
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_lines() {
        let text = r#"{"mint":"M1","wallet":"W1","side":"buy","amount":0.05,"upvotes":2}
not json
{"mint":"M1","wallet":"W2","side":"sell"}
"#;
        let signals = parse_signal_lines(text);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].amount_sol(), Some(0.05));
        assert_eq!(signals[0].upvotes, 2);
        assert_eq!(signals[1].side, SignalSide::Sell);
        assert_eq!(signals[1].upvotes, 1);
    }

    #[test]
    fn test_token_amount_is_not_sol() {
        let mut signal = TradeSignal::buy("M", "W", Some(5.0), 1);
        signal.denomination = Denomination::Tokens;
        assert_eq!(signal.amount_sol(), None);
    }

    #[test]
    fn test_seller_book_counts_distinct_wallets() {
        let mut book = SellerBook::new();
        assert_eq!(book.record("M", "W1"), 1);
        assert_eq!(book.record("M", "W1"), 1);
        assert_eq!(book.record("M", "W2"), 2);
        book.clear("M");
        assert_eq!(book.count("M"), 0);
    }

    #[tokio::test]
    async fn test_inbox_reads_only_new_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.jsonl");
        let config = SignalsConfig {
            inbox_path: path.to_string_lossy().to_string(),
            ..Default::default()
        };
        let mut inbox = SignalInbox::new(&config);
        assert!(inbox.poll().await.unwrap().is_empty());

        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{{\"mint\":\"M1\",\"wallet\":\"W\",\"side\":\"buy\"}}\n{{\"mint\":\"M2\"").unwrap();
        file.flush().unwrap();
        let first = inbox.poll().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].mint, "M1");

        writeln!(file, ",\"wallet\":\"W\",\"side\":\"sell\"}}").unwrap();
        file.flush().unwrap();
        let second = inbox.poll().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].mint, "M2");
        assert!(inbox.poll().await.unwrap().is_empty());
    }
}
