/// Solana transaction error classification
///
/// On-chain failures arrive as loosely-typed JSON (`{"InstructionError":[2,{"Custom":6001}]}`,
/// `"BlockhashNotFound"`, ...). They are classified once here so callers can
/// decide between giving up and trying again on the next tick.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// How a failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureType {
    /// Will fail again with the same inputs (slippage, insufficient funds, program error)
    Permanent,
    /// Network or timing related; a later attempt may land (expired blockhash, congestion)
    Temporary,
    /// Outcome unknown; must be re-verified on-chain before acting again
    Uncertain,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Permanent => "PERMANENT",
            FailureType::Temporary => "TEMPORARY",
            FailureType::Uncertain => "UNCERTAIN",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum BlockchainError {
    #[error("Transaction {signature} failed on-chain ({}): {error}", .failure_type.as_str())]
    TransactionFailed {
        signature: String,
        error: String,
        failure_type: FailureType,
    },

    #[error("Transaction {signature} not confirmed after {waited_seconds}s")]
    ConfirmationTimeout {
        signature: String,
        waited_seconds: u64,
    },

    #[error("Transaction {signature} not found")]
    TransactionNotFound { signature: String },

    #[error("Invalid transaction: {reason}")]
    InvalidTransaction { reason: String },
}

impl BlockchainError {
    pub fn failure_type(&self) -> FailureType {
        match self {
            BlockchainError::TransactionFailed { failure_type, .. } => *failure_type,
            BlockchainError::ConfirmationTimeout { .. } => FailureType::Uncertain,
            BlockchainError::TransactionNotFound { .. } => FailureType::Uncertain,
            BlockchainError::InvalidTransaction { .. } => FailureType::Permanent,
        }
    }
}

/// Program error codes that indicate slippage protection tripped
const SLIPPAGE_ERROR_CODES: &[u64] = &[6001, 6002, 6003, 6024];

/// Classify an on-chain error payload taken from a signature status or transaction meta
pub fn classify_transaction_error(err: &Value) -> FailureType {
    if let Some(name) = err.as_str() {
        return match name {
            "BlockhashNotFound" | "AlreadyProcessed" | "WouldExceedMaxBlockCostLimit"
            | "WouldExceedMaxAccountCostLimit" | "ClusterMaintenance" => FailureType::Temporary,
            "InsufficientFundsForFee" | "InsufficientFundsForRent" | "AccountNotFound"
            | "InvalidAccountForFee" => FailureType::Permanent,
            _ => FailureType::Uncertain,
        };
    }

    if let Some(instruction_error) = err.get("InstructionError").and_then(|v| v.as_array()) {
        let detail = instruction_error.get(1).cloned().unwrap_or(Value::Null);
        // Custom program errors (slippage included) repeat with the same inputs
        if detail.get("Custom").is_some() {
            return FailureType::Permanent;
        }
        return match detail.as_str() {
            Some("InsufficientFunds") => FailureType::Permanent,
            Some("ComputationalBudgetExceeded") => FailureType::Temporary,
            _ => FailureType::Permanent,
        };
    }

    if err.get("InsufficientFundsForRent").is_some() {
        return FailureType::Permanent;
    }

    FailureType::Uncertain
}

/// Human-readable summary of an on-chain error payload
pub fn describe_transaction_error(err: &Value) -> String {
    if let Some(instruction_error) = err.get("InstructionError").and_then(|v| v.as_array()) {
        let index = instruction_error
            .first()
            .and_then(|v| v.as_u64())
            .unwrap_or_default();
        let detail = instruction_error.get(1).cloned().unwrap_or(Value::Null);
        if let Some(code) = detail.get("Custom").and_then(|c| c.as_u64()) {
            let hint = if SLIPPAGE_ERROR_CODES.contains(&code) {
                " (slippage exceeded)"
            } else {
                ""
            };
            return format!("instruction {} custom error {}{}", index, code, hint);
        }
        return format!("instruction {} error {}", index, detail);
    }
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_transaction_error() {
        assert_eq!(
            classify_transaction_error(&json!("BlockhashNotFound")),
            FailureType::Temporary
        );
        assert_eq!(
            classify_transaction_error(&json!({"InstructionError": [2, {"Custom": 6001}]})),
            FailureType::Permanent
        );
        assert_eq!(
            classify_transaction_error(&json!({"Unknown": 1})),
            FailureType::Uncertain
        );
    }

    #[test]
    fn test_describe_slippage_error() {
        let text = describe_transaction_error(&json!({"InstructionError": [3, {"Custom": 6002}]}));
        assert_eq!(text, "instruction 3 custom error 6002 (slippage exceeded)");
    }
}
