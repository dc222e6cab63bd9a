/// Structured error handling for the copy trader
///
/// One top-level error with a sub-enum per failure domain. Soft misses (no
/// curve account, no route, no listing) are NOT errors and never reach this
/// type; they are modelled as `SourceOutcome::Miss` in `pricing`.
use thiserror::Error;

pub mod blockchain;
pub use blockchain::*;

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Error, Debug, Clone)]
pub enum CopyTraderError {
    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("RPC provider error: {0}")]
    RpcProvider(#[from] RpcProviderError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),
}

// =============================================================================
// NETWORK ERROR TYPES
// =============================================================================

#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("HTTP {status} from {endpoint}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Empty response body from {endpoint}")]
    EmptyBody { endpoint: String },

    #[error("{message}")]
    Generic { message: String },
}

// =============================================================================
// RPC PROVIDER ERROR TYPES
// =============================================================================

#[derive(Error, Debug, Clone)]
pub enum RpcProviderError {
    #[error("RPC {method} failed on {endpoint}: {message}")]
    CallFailed {
        endpoint: String,
        method: String,
        message: String,
    },

    #[error("Malformed {method} response: {details}")]
    MalformedResponse { method: String, details: String },

    #[error("All {count} RPC endpoints failed for {method}")]
    AllEndpointsFailed { method: String, count: usize },
}

// =============================================================================
// CONFIGURATION ERROR TYPES
// =============================================================================

#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    #[error("Missing config field '{field}'")]
    MissingConfig { field: String },

    #[error("Invalid config field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid private key: {error}")]
    InvalidPrivateKey { error: String },

    #[error("Failed to load config '{path}': {error}")]
    LoadFailed { path: String, error: String },
}

// =============================================================================
// DATA ERROR TYPES
// =============================================================================

#[derive(Error, Debug, Clone)]
pub enum DataError {
    #[error("Failed to parse {data_type}: {error}")]
    ParseError { data_type: String, error: String },

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Invalid address '{address}': {error}")]
    InvalidAddress { address: String, error: String },

    #[error("Signing failed: {error}")]
    SigningFailed { error: String },
}

// =============================================================================
// POSITION ERROR TYPES
// =============================================================================

#[derive(Error, Debug, Clone)]
pub enum PositionError {
    #[error("No open position for {mint}")]
    NotFound { mint: String },

    #[error("Position already open for {mint}")]
    AlreadyOpen { mint: String },

    #[error("Invalid position for {mint}: {reason}")]
    Invalid { mint: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),
}

// =============================================================================
// CONVERSIONS FROM LIBRARY ERRORS
// =============================================================================

impl From<reqwest::Error> for CopyTraderError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if err.is_timeout() {
            CopyTraderError::Network(NetworkError::Timeout {
                endpoint,
                timeout_ms: 0,
            })
        } else {
            CopyTraderError::Network(NetworkError::Generic {
                message: format!("HTTP request to {} failed: {}", endpoint, err),
            })
        }
    }
}

impl From<serde_json::Error> for CopyTraderError {
    fn from(err: serde_json::Error) -> Self {
        CopyTraderError::Data(DataError::ParseError {
            data_type: "JSON".to_string(),
            error: err.to_string(),
        })
    }
}

impl From<rusqlite::Error> for CopyTraderError {
    fn from(err: rusqlite::Error) -> Self {
        CopyTraderError::Position(PositionError::Database(err.to_string()))
    }
}

impl From<std::io::Error> for CopyTraderError {
    fn from(err: std::io::Error) -> Self {
        CopyTraderError::Network(NetworkError::Generic {
            message: format!("I/O error: {}", err),
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

impl CopyTraderError {
    pub fn parse_error(data_type: impl Into<String>, error: impl Into<String>) -> Self {
        CopyTraderError::Data(DataError::ParseError {
            data_type: data_type.into(),
            error: error.into(),
        })
    }

    pub fn invalid_amount(amount: impl Into<String>, reason: impl Into<String>) -> Self {
        CopyTraderError::Data(DataError::InvalidAmount {
            amount: amount.into(),
            reason: reason.into(),
        })
    }

    pub fn network(message: impl Into<String>) -> Self {
        CopyTraderError::Network(NetworkError::Generic {
            message: message.into(),
        })
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CopyTraderError::Network(NetworkError::HttpStatus { status, .. }) => {
                *status >= 500 || *status == 429
            }
            CopyTraderError::Network(_) => true,
            CopyTraderError::RpcProvider(RpcProviderError::CallFailed { message, .. }) => {
                is_transient_rpc_message(message)
            }
            CopyTraderError::RpcProvider(RpcProviderError::MalformedResponse { .. }) => false,
            CopyTraderError::RpcProvider(RpcProviderError::AllEndpointsFailed { .. }) => true,
            CopyTraderError::Blockchain(e) => e.failure_type() == FailureType::Temporary,
            CopyTraderError::Configuration(_)
            | CopyTraderError::Data(_)
            | CopyTraderError::Position(_) => false,
        }
    }
}

/// JSON-RPC error messages that describe node or timing trouble rather than a bad request
fn is_transient_rpc_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["blockhash not found", "node is behind", "node is unhealthy", "too many requests", "timed out"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server = CopyTraderError::Network(NetworkError::HttpStatus {
            endpoint: "x".to_string(),
            status: 503,
            body: String::new(),
        });
        let client = CopyTraderError::Network(NetworkError::HttpStatus {
            endpoint: "x".to_string(),
            status: 400,
            body: String::new(),
        });
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!CopyTraderError::invalid_amount("0", "zero").is_transient());
        assert!(CopyTraderError::network("reset").is_transient());

        let preflight = |message: &str| {
            CopyTraderError::RpcProvider(RpcProviderError::CallFailed {
                endpoint: "x".to_string(),
                method: "sendTransaction".to_string(),
                message: message.to_string(),
            })
        };
        assert!(preflight("Transaction simulation failed: Blockhash not found").is_transient());
        assert!(!preflight("Transaction simulation failed: custom program error: 0x1771").is_transient());
    }
}
