/// Signing, submission, confirmation polling and record retrieval
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;

use crate::arguments::is_debug_swap_enabled;
use crate::errors::{
    classify_transaction_error, describe_transaction_error, CopyTraderError, DataError,
    FailureType,
};
use crate::logger::{self, LogTag};
use crate::rpc::{RpcClient, TransactionRecord};

/// Deserialize an unsigned transaction and sign it with the local key
pub fn sign_transaction(
    unsigned_bytes: &[u8],
    keypair: &Keypair,
) -> Result<VersionedTransaction, CopyTraderError> {
    let mut transaction: VersionedTransaction = bincode::deserialize(unsigned_bytes)
        .map_err(|e| DataError::SigningFailed {
            error: format!("Failed to deserialize transaction: {}", e),
        })?;

    let signer = keypair.pubkey();
    let required = transaction.message.header().num_required_signatures as usize;
    let index = transaction
        .message
        .static_account_keys()
        .iter()
        .take(required)
        .position(|key| key == &signer)
        .ok_or_else(|| DataError::SigningFailed {
            error: format!("wallet {} is not a required signer", signer),
        })?;

    if transaction.signatures.len() < required {
        transaction
            .signatures
            .resize(required, Signature::default());
    }
    transaction.signatures[index] = keypair.sign_message(&transaction.message.serialize());
    Ok(transaction)
}

/// Submit with a fixed backoff, retrying transient errors only
pub async fn submit_with_retries(
    rpc: &dyn RpcClient,
    transaction: &VersionedTransaction,
    attempts: u32,
    delay: Duration,
    mint: &str,
) -> Result<Signature, CopyTraderError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match rpc.send_transaction(transaction).await {
            Ok(signature) => return Ok(signature),
            Err(e) if e.is_transient() && attempt < attempts => {
                logger::warning(
                    LogTag::Swap,
                    &format!(
                        "Submit attempt {}/{} for {} failed: {}",
                        attempt, attempts, mint, e
                    ),
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Final state of confirmation polling
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Confirmed { slot: u64 },
    /// Explicit on-chain error in the status
    Failed {
        error: String,
        failure_type: FailureType,
    },
    /// Attempts exhausted without an explicit result
    Unconfirmed { attempts: u32 },
}

/// Poll signature status at a fixed interval up to a bounded attempt count
pub async fn wait_for_confirmation(
    rpc: &dyn RpcClient,
    signature: &Signature,
    interval: Duration,
    max_attempts: u32,
) -> ConfirmationOutcome {
    for attempt in 1..=max_attempts {
        match rpc.get_signature_status(signature).await {
            Ok(Some(status)) => {
                if let Some(err) = &status.err {
                    return ConfirmationOutcome::Failed {
                        error: describe_transaction_error(err),
                        failure_type: classify_transaction_error(err),
                    };
                }
                if status.is_settled() {
                    return ConfirmationOutcome::Confirmed { slot: status.slot };
                }
            }
            Ok(None) => {}
            Err(e) => {
                if is_debug_swap_enabled() {
                    logger::debug(
                        LogTag::Swap,
                        &format!("Status poll {} for {} failed: {}", attempt, signature, e),
                    );
                }
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    ConfirmationOutcome::Unconfirmed {
        attempts: max_attempts,
    }
}

/// Fetch the transaction record, which can lag behind the status
pub async fn fetch_transaction_record(
    rpc: &dyn RpcClient,
    signature: &Signature,
    attempts: u32,
    delay: Duration,
) -> Option<TransactionRecord> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match rpc.get_transaction(signature).await {
            Ok(Some(record)) => return Some(record),
            Ok(None) => {}
            Err(e) => {
                logger::warning(
                    LogTag::Verify,
                    &format!(
                        "getTransaction attempt {}/{} for {} failed: {}",
                        attempt, attempts, signature, e
                    ),
                );
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    None
}


#[cfg(test)]
mod tests {
    use super::test_support::unsigned_transaction_bytes;
    use super::*;
    use crate::errors::RpcProviderError;
    use crate::rpc::testing::MockRpcClient;
    use crate::rpc::SignatureStatus;
    use serde_json::json;

    fn status(err: Option<serde_json::Value>, confirmation: &str) -> SignatureStatus {
        SignatureStatus {
            slot: 77,
            err,
            confirmation_status: Some(confirmation.to_string()),
        }
    }

    #[test]
    fn test_sign_transaction() {
        let keypair = Keypair::new();
        let bytes = unsigned_transaction_bytes(&keypair.pubkey());
        let signed = sign_transaction(&bytes, &keypair).unwrap();
        assert_ne!(signed.signatures[0], Signature::default());
        assert!(signed.verify_with_results().iter().all(|ok| *ok));

        let stranger = Keypair::new();
        assert!(sign_transaction(&bytes, &stranger).is_err());
        assert!(sign_transaction(&[1, 2, 3], &keypair).is_err());
    }

    #[tokio::test]
    async fn test_confirmation_outcomes() {
        tokio::time::pause();
        let signature = Signature::default();

        let rpc = MockRpcClient::new();
        rpc.push_status(None);
        rpc.push_status(Some(status(None, "processed")));
        rpc.push_status(Some(status(None, "confirmed")));
        let outcome = wait_for_confirmation(&rpc, &signature, Duration::from_secs(1), 30).await;
        assert_eq!(outcome, ConfirmationOutcome::Confirmed { slot: 77 });
        assert_eq!(rpc.status_polls(), 3);

        let rpc = MockRpcClient::new();
        rpc.push_status(Some(status(Some(json!("BlockhashNotFound")), "processed")));
        let outcome = wait_for_confirmation(&rpc, &signature, Duration::from_secs(1), 30).await;
        assert!(matches!(
            outcome,
            ConfirmationOutcome::Failed {
                failure_type: FailureType::Temporary,
                ..
            }
        ));

        let rpc = MockRpcClient::new();
        rpc.push_status(None);
        let outcome = wait_for_confirmation(&rpc, &signature, Duration::from_secs(1), 30).await;
        assert_eq!(outcome, ConfirmationOutcome::Unconfirmed { attempts: 30 });
        assert_eq!(rpc.status_polls(), 30);
    }

    #[tokio::test]
    async fn test_submit_retries_transient_only() {
        tokio::time::pause();
        let keypair = Keypair::new();
        let tx = sign_transaction(&unsigned_transaction_bytes(&keypair.pubkey()), &keypair).unwrap();

        let rpc = MockRpcClient::new();
        rpc.send_results.lock().push_back(Err(CopyTraderError::network("reset")));
        rpc.send_results.lock().push_back(Err(CopyTraderError::network("reset")));
        let signature = submit_with_retries(&rpc, &tx, 3, Duration::from_secs(1), "mint")
            .await
            .unwrap();
        assert_eq!(signature, tx.signatures[0]);
        assert_eq!(rpc.sent.lock().len(), 3);

        let rpc = MockRpcClient::new();
        rpc.send_results.lock().push_back(Err(RpcProviderError::CallFailed {
            endpoint: "x".to_string(),
            method: "sendTransaction".to_string(),
            message: "custom program error: 0x1771".to_string(),
        }
        .into()));
        assert!(submit_with_retries(&rpc, &tx, 3, Duration::from_secs(1), "mint")
            .await
            .is_err());
        assert_eq!(rpc.sent.lock().len(), 1);
    }
}
