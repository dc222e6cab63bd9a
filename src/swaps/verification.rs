/// Independent balance-delta verification
///
/// A trade only counts when the signer's own balances moved: tokens in and SOL
/// out for a buy, tokens out and SOL in for a sell. Anything else is a failure,
/// whatever the submission path reported.
use crate::constants::LAMPORTS_PER_SOL;
use crate::errors::describe_transaction_error;
use crate::rpc::TransactionRecord;
use crate::swaps::types::TradeAction;

/// Balance movement observed for the signer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifiedDeltas {
    /// Raw token units moved in the trade's direction (always > 0)
    pub token_amount_raw: u64,
    pub token_decimals: u8,
    /// SOL moved in the trade's direction, fee included for buys (always > 0)
    pub sol_amount: f64,
    pub network_fee_sol: f64,
}

impl VerifiedDeltas {
    pub fn token_amount(&self) -> f64 {
        self.token_amount_raw as f64 / 10f64.powi(self.token_decimals as i32)
    }

    /// SOL per token with the network fee taken out
    pub fn effective_price(&self, action: TradeAction) -> Option<f64> {
        let tokens = self.token_amount();
        if tokens <= 0.0 {
            return None;
        }
        let sol = match action {
            TradeAction::Buy => (self.sol_amount - self.network_fee_sol).max(0.0),
            TradeAction::Sell => self.sol_amount + self.network_fee_sol,
        };
        Some(sol / tokens)
    }
}

pub fn verify_balance_deltas(
    record: &TransactionRecord,
    wallet: &str,
    mint: &str,
    action: TradeAction,
) -> Result<VerifiedDeltas, String> {
    if let Some(err) = &record.err {
        return Err(format!(
            "transaction failed on-chain: {}",
            describe_transaction_error(err)
        ));
    }

    let lamport_delta = record
        .lamport_delta(wallet)
        .ok_or_else(|| format!("signer {} not found in transaction accounts", wallet))?;
    let (token_delta, decimals) = record.token_delta(wallet, mint);
    let network_fee_sol = record.fee as f64 / LAMPORTS_PER_SOL as f64;

    let (token_moved, lamports_moved) = match action {
        TradeAction::Buy => (token_delta, -lamport_delta),
        TradeAction::Sell => (-token_delta, lamport_delta),
    };

    if token_moved <= 0 {
        return Err(match action {
            TradeAction::Buy => "zero tokens received".to_string(),
            TradeAction::Sell => "zero tokens sold".to_string(),
        });
    }
    if lamports_moved <= 0 {
        return Err(match action {
            TradeAction::Buy => "no SOL left the wallet".to_string(),
            TradeAction::Sell => "zero SOL received".to_string(),
        });
    }

    Ok(VerifiedDeltas {
        token_amount_raw: u64::try_from(token_moved).unwrap_or(u64::MAX),
        token_decimals: decimals.unwrap_or(0),
        sol_amount: lamports_moved as f64 / LAMPORTS_PER_SOL as f64,
        network_fee_sol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TokenBalance;
    use serde_json::json;

    fn token(amount: u64) -> TokenBalance {
        TokenBalance {
            account_index: 1,
            mint: "Mint111".to_string(),
            owner: Some("Wallet111".to_string()),
            amount,
            decimals: 6,
        }
    }

    fn record(pre_sol: u64, post_sol: u64, pre_tokens: Option<u64>, post_tokens: Option<u64>) -> TransactionRecord {
        TransactionRecord {
            slot: 1,
            err: None,
            fee: 5_000,
            account_keys: vec!["Wallet111".to_string(), "Ata111".to_string()],
            pre_balances: vec![pre_sol, 0],
            post_balances: vec![post_sol, 0],
            pre_token_balances: pre_tokens.map(token).into_iter().collect(),
            post_token_balances: post_tokens.map(token).into_iter().collect(),
        }
    }

    #[test]
    fn test_buy_verified() {
        let record = record(1_000_000_000, 899_995_000, None, Some(2_000_000_000));
        let deltas = verify_balance_deltas(&record, "Wallet111", "Mint111", TradeAction::Buy).unwrap();
        assert_eq!(deltas.token_amount(), 2_000.0);
        assert!((deltas.sol_amount - 0.100005).abs() < 1e-12);
        let price = deltas.effective_price(TradeAction::Buy).unwrap();
        assert!((price - 0.00005).abs() < 1e-12);
    }

    #[test]
    fn test_buy_with_zero_tokens_rejected() {
        let record = record(1_000_000_000, 999_995_000, None, None);
        let err = verify_balance_deltas(&record, "Wallet111", "Mint111", TradeAction::Buy).unwrap_err();
        assert_eq!(err, "zero tokens received");
    }

    #[test]
    fn test_sell_verified_and_zero_sol_rejected() {
        let sold = record(100_000_000, 250_000_000, Some(2_000_000_000), Some(0));
        let deltas = verify_balance_deltas(&sold, "Wallet111", "Mint111", TradeAction::Sell).unwrap();
        assert_eq!(deltas.token_amount_raw, 2_000_000_000);
        assert!((deltas.sol_amount - 0.15).abs() < 1e-12);

        let no_sol = record(100_000_000, 99_995_000, Some(2_000_000_000), Some(0));
        let err = verify_balance_deltas(&no_sol, "Wallet111", "Mint111", TradeAction::Sell).unwrap_err();
        assert_eq!(err, "zero SOL received");

        let nothing_sold = record(100_000_000, 99_995_000, Some(5), Some(5));
        let err = verify_balance_deltas(&nothing_sold, "Wallet111", "Mint111", TradeAction::Sell).unwrap_err();
        assert_eq!(err, "zero tokens sold");
    }

    #[test]
    fn test_on_chain_error_rejected() {
        let mut failed = record(1_000_000_000, 999_995_000, None, Some(10));
        failed.err = Some(json!({"InstructionError": [2, {"Custom": 6001}]}));
        let err = verify_balance_deltas(&failed, "Wallet111", "Mint111", TradeAction::Buy).unwrap_err();
        assert!(err.contains("slippage"));
    }

    #[test]
    fn test_missing_signer_rejected() {
        let record = record(1, 1, None, Some(10));
        assert!(verify_balance_deltas(&record, "Other", "Mint111", TradeAction::Buy).is_err());
    }
}
