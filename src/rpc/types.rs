/// Settlement network record types
///
/// Parsed straight from JSON-RPC responses. Only the fields needed for
/// confirmation and balance-delta verification are kept.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CopyTraderError;

/// Result of `getSignatureStatuses` for one signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureStatus {
    pub slot: u64,
    /// On-chain error payload, if the transaction failed
    pub err: Option<Value>,
    /// "processed", "confirmed" or "finalized"
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    /// Confirmed or finalized (processed is not enough to trust balances)
    pub fn is_settled(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }

    pub fn from_json(value: &Value) -> Result<Self, CopyTraderError> {
        let slot = value
            .get("slot")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| CopyTraderError::parse_error("signature status", "missing slot"))?;
        let err = value.get("err").filter(|v| !v.is_null()).cloned();
        let confirmation_status = value
            .get("confirmationStatus")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(Self {
            slot,
            err,
            confirmation_status,
        })
    }
}

/// One pre/post token balance snapshot entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    pub owner: Option<String>,
    /// Raw amount in base units
    pub amount: u64,
    pub decimals: u8,
}

impl TokenBalance {
    fn from_json(value: &Value) -> Option<Self> {
        let ui = value.get("uiTokenAmount")?;
        Some(Self {
            account_index: value.get("accountIndex")?.as_u64()? as usize,
            mint: value.get("mint")?.as_str()?.to_string(),
            owner: value
                .get("owner")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            amount: ui.get("amount")?.as_str()?.parse().ok()?,
            decimals: ui.get("decimals")?.as_u64()? as u8,
        })
    }
}

/// Finalized transaction as returned by `getTransaction`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub slot: u64,
    pub err: Option<Value>,
    /// Network fee in lamports
    pub fee: u64,
    pub account_keys: Vec<String>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

impl TransactionRecord {
    /// Parse a `getTransaction` result (json or jsonParsed encoding, legacy or v0)
    pub fn from_json(value: &Value) -> Result<Self, CopyTraderError> {
        let meta = value
            .get("meta")
            .filter(|m| !m.is_null())
            .ok_or_else(|| CopyTraderError::parse_error("transaction", "missing meta"))?;
        let message = value
            .get("transaction")
            .and_then(|t| t.get("message"))
            .ok_or_else(|| CopyTraderError::parse_error("transaction", "missing message"))?;

        let mut account_keys = parse_key_list(
            message
                .get("accountKeys")
                .or_else(|| message.get("staticAccountKeys")),
        );
        // v0 transactions append lookup-table addresses after the static keys
        if let Some(loaded) = meta.get("loadedAddresses") {
            account_keys.extend(parse_key_list(loaded.get("writable")));
            account_keys.extend(parse_key_list(loaded.get("readonly")));
        }

        Ok(Self {
            slot: value.get("slot").and_then(|v| v.as_u64()).unwrap_or_default(),
            err: meta.get("err").filter(|v| !v.is_null()).cloned(),
            fee: meta.get("fee").and_then(|v| v.as_u64()).unwrap_or_default(),
            account_keys,
            pre_balances: parse_u64_list(meta.get("preBalances")),
            post_balances: parse_u64_list(meta.get("postBalances")),
            pre_token_balances: parse_token_balances(meta.get("preTokenBalances")),
            post_token_balances: parse_token_balances(meta.get("postTokenBalances")),
        })
    }

    pub fn account_index(&self, pubkey: &str) -> Option<usize> {
        self.account_keys.iter().position(|k| k == pubkey)
    }

    /// Lamport change for an account (post - pre), fee included
    pub fn lamport_delta(&self, pubkey: &str) -> Option<i128> {
        let index = self.account_index(pubkey)?;
        let pre = *self.pre_balances.get(index)?;
        let post = *self.post_balances.get(index)?;
        Some(post as i128 - pre as i128)
    }

    /// Raw token change for `owner` in `mint`, summed over all of the owner's token accounts
    pub fn token_delta(&self, owner: &str, mint: &str) -> (i128, Option<u8>) {
        let sum = |balances: &[TokenBalance]| -> (i128, Option<u8>) {
            balances
                .iter()
                .filter(|b| b.mint == mint && self.balance_owned_by(b, owner))
                .fold((0i128, None), |(total, _), b| {
                    (total + b.amount as i128, Some(b.decimals))
                })
        };
        let (pre, pre_decimals) = sum(&self.pre_token_balances);
        let (post, post_decimals) = sum(&self.post_token_balances);
        (post - pre, post_decimals.or(pre_decimals))
    }

    fn balance_owned_by(&self, balance: &TokenBalance, owner: &str) -> bool {
        match &balance.owner {
            Some(o) => o == owner,
            // Older records omit the owner; fall back to the account key itself
            None => self
                .account_keys
                .get(balance.account_index)
                .map(|k| k == owner)
                .unwrap_or(false),
        }
    }
}

fn parse_key_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|keys| {
            keys.iter()
                .filter_map(|k| {
                    k.as_str()
                        .or_else(|| k.get("pubkey").and_then(|p| p.as_str()))
                        .map(|s| s.to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_u64_list(value: Option<&Value>) -> Vec<u64> {
    value
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_u64()).collect())
        .unwrap_or_default()
}

fn parse_token_balances(value: Option<&Value>) -> Vec<TokenBalance> {
    value
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(TokenBalance::from_json).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_v0_transaction() -> Value {
        json!({
            "slot": 321,
            "transaction": {
                "signatures": ["sig"],
                "message": {
                    "accountKeys": [
                        {"pubkey": "Wallet111", "signer": true, "writable": true},
                        "Ata111"
                    ]
                }
            },
            "meta": {
                "err": null,
                "fee": 5000,
                "preBalances": [2_000_000_000u64, 0, 0],
                "postBalances": [1_899_995_000u64, 2_039_280, 0],
                "preTokenBalances": [],
                "postTokenBalances": [{
                    "accountIndex": 1,
                    "mint": "Mint111",
                    "owner": "Wallet111",
                    "uiTokenAmount": {"amount": "3300000000", "decimals": 6}
                }],
                "loadedAddresses": {"writable": ["Pool111"], "readonly": []}
            }
        })
    }

    #[test]
    fn test_parse_transaction_record() {
        let record = TransactionRecord::from_json(&sample_v0_transaction()).unwrap();
        assert_eq!(record.account_keys, vec!["Wallet111", "Ata111", "Pool111"]);
        assert_eq!(record.fee, 5000);
        assert!(record.err.is_none());
        assert_eq!(record.lamport_delta("Wallet111"), Some(-100_005_000));
        assert_eq!(
            record.token_delta("Wallet111", "Mint111"),
            (3_300_000_000, Some(6))
        );
        assert_eq!(record.token_delta("Wallet111", "Other"), (0, None));
    }

    #[test]
    fn test_parse_signature_status() {
        let status = SignatureStatus::from_json(&json!({
            "slot": 10,
            "confirmations": null,
            "err": {"InstructionError": [0, {"Custom": 6001}]},
            "confirmationStatus": "confirmed"
        }))
        .unwrap();
        assert!(status.is_settled());
        assert!(status.err.is_some());
    }
}
