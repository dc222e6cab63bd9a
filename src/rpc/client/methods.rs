/// Settlement network methods used by the copy trader
use async_trait::async_trait;
use base64::Engine;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;

use super::JsonRpcClient;
use crate::errors::{CopyTraderError, RpcProviderError};
use crate::rpc::types::{SignatureStatus, TransactionRecord};

/// Network operations the pricing and execution layers depend on
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Raw account bytes, `None` when the account does not exist
    async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, CopyTraderError>;

    /// Submit a signed transaction with preflight checks enabled
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, CopyTraderError>;

    /// Current status, `None` while the network has not seen the signature
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, CopyTraderError>;

    /// Confirmed transaction record, `None` while not yet available
    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionRecord>, CopyTraderError>;
}

fn malformed(method: &str, details: impl Into<String>) -> CopyTraderError {
    RpcProviderError::MalformedResponse {
        method: method.to_string(),
        details: details.into(),
    }
    .into()
}

#[async_trait]
impl RpcClient for JsonRpcClient {
    async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, CopyTraderError> {
        let params = serde_json::json!([
            pubkey.to_string(),
            {
                "encoding": "base64",
                "commitment": "confirmed"
            }
        ]);

        let result = self.call("getAccountInfo", params).await?;

        let value = match result.get("value") {
            Some(v) if !v.is_null() => v,
            _ => return Ok(None),
        };

        // data is ["<base64>", "base64"]
        let encoded = value
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.as_str())
            .ok_or_else(|| malformed("getAccountInfo", "missing data"))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| malformed("getAccountInfo", format!("invalid base64: {}", e)))?;

        Ok(Some(bytes))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, CopyTraderError> {
        let tx_bytes = bincode::serialize(transaction)
            .map_err(|e| CopyTraderError::parse_error("transaction", e.to_string()))?;
        let tx_base64 = base64::engine::general_purpose::STANDARD.encode(&tx_bytes);

        let params = serde_json::json!([
            tx_base64,
            {
                "encoding": "base64",
                "skipPreflight": false,
                "preflightCommitment": "confirmed",
                "maxRetries": 3
            }
        ]);

        let result = self.call("sendTransaction", params).await?;
        let sig_str = result
            .as_str()
            .ok_or_else(|| malformed("sendTransaction", "signature is not a string"))?;

        Signature::from_str(sig_str)
            .map_err(|e| malformed("sendTransaction", format!("invalid signature: {}", e)))
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, CopyTraderError> {
        let params = serde_json::json!([[signature.to_string()], { "searchTransactionHistory": true }]);

        let result = self.call("getSignatureStatuses", params).await?;
        let status = result
            .get("value")
            .and_then(|v| v.as_array())
            .ok_or_else(|| malformed("getSignatureStatuses", "missing value array"))?
            .first()
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if status.is_null() {
            return Ok(None);
        }
        SignatureStatus::from_json(&status).map(Some)
    }

    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionRecord>, CopyTraderError> {
        let params = serde_json::json!([
            signature.to_string(),
            {
                "encoding": "json",
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0
            }
        ]);

        let result = self.call("getTransaction", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        TransactionRecord::from_json(&result).map(Some)
    }
}
