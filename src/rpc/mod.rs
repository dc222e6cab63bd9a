/// Settlement network access
///
/// `RpcClient` is the seam: production code uses `JsonRpcClient`, tests use
/// `testing::MockRpcClient`.
pub mod client;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::methods::RpcClient;
pub use client::JsonRpcClient;
pub use types::{SignatureStatus, TokenBalance, TransactionRecord};

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::errors::{CopyTraderError, DataError};

/// Parse a base58 address into a `Pubkey`
pub fn parse_pubkey(address: &str) -> Result<Pubkey, CopyTraderError> {
    Pubkey::from_str(address).map_err(|e| {
        DataError::InvalidAddress {
            address: address.to_string(),
            error: e.to_string(),
        }
        .into()
    })
}
