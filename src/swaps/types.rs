/// Common trade structures shared by the execution client, builders and the engine
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::FailureType;

/// Custom deserializer for fields that can be either string or number
pub fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_owned())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement venue currently authoritative for an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    BondingCurve,
    Exchange,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::BondingCurve => "bonding_curve",
            Venue::Exchange => "exchange",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bonding_curve" => Some(Venue::BondingCurve),
            "exchange" => Some(Venue::Exchange),
            _ => None,
        }
    }

    /// `pool` parameter understood by the construction endpoint
    pub fn construction_pool(&self) -> &'static str {
        match self {
            Venue::BondingCurve => "pump",
            Venue::Exchange => "auto",
        }
    }
}

/// How much to sell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SellAmount {
    /// Whole balance; sent as "100%" so no rounding is left behind.
    /// The tracked quantity is only used for dry runs and logging.
    All { tracked_quantity: f64 },
    /// Explicit token quantity (whole tokens)
    Tokens(f64),
}

impl SellAmount {
    pub fn tracked_quantity(&self) -> f64 {
        match self {
            SellAmount::All { tracked_quantity } => *tracked_quantity,
            SellAmount::Tokens(quantity) => *quantity,
        }
    }
}

/// Amount as sent to a transaction builder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TradeAmount {
    /// Buy with this much SOL
    Sol(f64),
    Sell(SellAmount),
}

/// One trade handed to a transaction builder
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub action: TradeAction,
    pub mint: String,
    pub amount: TradeAmount,
    pub slippage_bps: u16,
    pub priority_fee_sol: f64,
    pub venue: Venue,
    /// Signer public key (base58)
    pub wallet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Simulated,
    Failed,
}

/// Outcome of one trade attempt
///
/// `success` is only set after the signer's on-chain balances moved in the
/// expected direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub simulated: bool,
    pub action: TradeAction,
    pub mint: String,
    pub signature: Option<String>,
    /// SOL that left the wallet on a buy, network fee included
    pub sol_spent: f64,
    /// SOL that arrived on a sell, net of the network fee
    pub sol_received: f64,
    /// Whole tokens received on a buy
    pub tokens_received: f64,
    /// Whole tokens sold on a sell
    pub tokens_sold: f64,
    pub token_decimals: Option<u8>,
    pub network_fee_sol: f64,
    /// SOL per token, excluding the network fee
    pub effective_price: Option<f64>,
    pub error: Option<String>,
    pub failure_type: Option<FailureType>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn failed(
        action: TradeAction,
        mint: &str,
        signature: Option<String>,
        error: impl Into<String>,
        failure_type: FailureType,
    ) -> Self {
        Self {
            success: false,
            simulated: false,
            action,
            mint: mint.to_string(),
            signature,
            sol_spent: 0.0,
            sol_received: 0.0,
            tokens_received: 0.0,
            tokens_sold: 0.0,
            token_decimals: None,
            network_fee_sol: 0.0,
            effective_price: None,
            error: Some(error.into()),
            failure_type: Some(failure_type),
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match (self.success, self.simulated) {
            (false, _) => ExecutionStatus::Failed,
            (true, true) => ExecutionStatus::Simulated,
            (true, false) => ExecutionStatus::Success,
        }
    }

    /// Token quantity moved in the trade's direction
    pub fn token_quantity(&self) -> f64 {
        match self.action {
            TradeAction::Buy => self.tokens_received,
            TradeAction::Sell => self.tokens_sold,
        }
    }
}
