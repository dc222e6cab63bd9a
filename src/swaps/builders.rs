/// Unsigned transaction construction
///
/// Both builders return the raw bincode bytes of an unsigned
/// `VersionedTransaction`; signing happens locally in `execution`.
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::types::{deserialize_string_or_number, SellAmount, TradeAction, TradeAmount, TradeRequest};
use crate::arguments::is_debug_swap_enabled;
use crate::config::SwapsConfig;
use crate::constants::{BONDING_CURVE_TOKEN_DECIMALS, SOL_MINT};
use crate::errors::{CopyTraderError, NetworkError};
use crate::logger::{self, LogTag};
use crate::utils::{safe_truncate, sol_to_lamports};

#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn build(&self, request: &TradeRequest) -> Result<Vec<u8>, CopyTraderError>;
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, CopyTraderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| CopyTraderError::network(format!("Failed to build HTTP client: {}", e)))
}

async fn error_for_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CopyTraderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NetworkError::HttpStatus {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: safe_truncate(&body, 200).to_string(),
    }
    .into())
}

// =============================================================================
// CONSTRUCTION ENDPOINT (trade-local)
// =============================================================================

/// Construction endpoint that answers with a binary unsigned transaction
pub struct TradeLocalBuilder {
    http: reqwest::Client,
    url: String,
}

impl TradeLocalBuilder {
    pub fn new(config: &SwapsConfig) -> Result<Self, CopyTraderError> {
        Ok(Self {
            http: http_client(config.http_timeout_secs)?,
            url: config.trade_local_url.clone(),
        })
    }
}

/// Request body for the construction endpoint
pub fn trade_local_payload(request: &TradeRequest) -> Value {
    let (amount, denominated_in_sol) = match request.amount {
        TradeAmount::Sol(sol) => (Value::from(sol), "true"),
        TradeAmount::Sell(SellAmount::All { .. }) => (Value::from("100%"), "false"),
        TradeAmount::Sell(SellAmount::Tokens(tokens)) => (Value::from(tokens), "false"),
    };

    serde_json::json!({
        "publicKey": request.wallet,
        "action": request.action.as_str(),
        "mint": request.mint,
        "amount": amount,
        "denominatedInSol": denominated_in_sol,
        "slippage": request.slippage_bps as f64 / 100.0,
        "priorityFee": request.priority_fee_sol,
        "pool": request.venue.construction_pool(),
    })
}

#[async_trait]
impl TransactionBuilder for TradeLocalBuilder {
    fn name(&self) -> &'static str {
        "trade_local"
    }

    async fn build(&self, request: &TradeRequest) -> Result<Vec<u8>, CopyTraderError> {
        let payload = trade_local_payload(request);
        if is_debug_swap_enabled() {
            logger::debug(LogTag::Swap, &format!("trade-local request: {}", payload));
        }

        let response = self.http.post(&self.url).json(&payload).send().await?;
        let response = error_for_status(&self.url, response).await?;
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            return Err(NetworkError::EmptyBody {
                endpoint: self.url.clone(),
            }
            .into());
        }
        Ok(bytes.to_vec())
    }
}

// =============================================================================
// QUOTE AGGREGATOR (quote + swap)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorQuote {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    out_amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorSwapResponse {
    swap_transaction: String,
}

/// Quote aggregator route: GET quote, then POST swap for the transaction
pub struct AggregatorSwapBuilder {
    http: reqwest::Client,
    quote_url: String,
    swap_url: String,
}

impl AggregatorSwapBuilder {
    pub fn new(config: &SwapsConfig) -> Result<Self, CopyTraderError> {
        Ok(Self {
            http: http_client(config.http_timeout_secs)?,
            quote_url: config.aggregator_quote_url.clone(),
            swap_url: config.aggregator_swap_url.clone(),
        })
    }
}

/// (input mint, output mint, raw input amount) for a trade
pub fn aggregator_leg(request: &TradeRequest) -> (String, String, u64) {
    let token_scale = 10f64.powi(BONDING_CURVE_TOKEN_DECIMALS as i32);
    match (request.action, request.amount) {
        (TradeAction::Buy, TradeAmount::Sol(sol)) => {
            (SOL_MINT.to_string(), request.mint.clone(), sol_to_lamports(sol))
        }
        (_, amount) => {
            let tokens = match amount {
                TradeAmount::Sell(sell) => sell.tracked_quantity(),
                TradeAmount::Sol(_) => 0.0,
            };
            (
                request.mint.clone(),
                SOL_MINT.to_string(),
                (tokens * token_scale).floor() as u64,
            )
        }
    }
}

#[async_trait]
impl TransactionBuilder for AggregatorSwapBuilder {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    async fn build(&self, request: &TradeRequest) -> Result<Vec<u8>, CopyTraderError> {
        let (input_mint, output_mint, amount) = aggregator_leg(request);
        if amount == 0 {
            return Err(CopyTraderError::invalid_amount(
                "0",
                format!("nothing to {} for {}", request.action, request.mint),
            ));
        }

        let amount = amount.to_string();
        let slippage = request.slippage_bps.to_string();
        let response = self
            .http
            .get(&self.quote_url)
            .query(&[
                ("inputMint", input_mint.as_str()),
                ("outputMint", output_mint.as_str()),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
            .send()
            .await?;
        let response = error_for_status(&self.quote_url, response).await?;
        let quote: Value = response.json().await?;

        let parsed: AggregatorQuote = serde_json::from_value(quote.clone())?;
        if parsed.out_amount.parse::<u64>().unwrap_or(0) == 0 {
            return Err(CopyTraderError::network(format!(
                "aggregator has no route for {}",
                request.mint
            )));
        }

        let body = serde_json::json!({
            "quoteResponse": quote,
            "userPublicKey": request.wallet,
            "wrapAndUnwrapSol": true,
            "prioritizationFeeLamports": sol_to_lamports(request.priority_fee_sol),
        });
        let response = self.http.post(&self.swap_url).json(&body).send().await?;
        let response = error_for_status(&self.swap_url, response).await?;
        let swap: AggregatorSwapResponse = response.json().await?;

        base64::engine::general_purpose::STANDARD
            .decode(swap.swap_transaction.trim())
            .map_err(|e| CopyTraderError::parse_error("swap transaction", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swaps::types::Venue;

    fn request(action: TradeAction, amount: TradeAmount) -> TradeRequest {
        TradeRequest {
            action,
            mint: "Mint111".to_string(),
            amount,
            slippage_bps: 1_500,
            priority_fee_sol: 0.0005,
            venue: Venue::BondingCurve,
            wallet: "Wallet111".to_string(),
        }
    }

    #[test]
    fn test_trade_local_buy_payload() {
        let payload = trade_local_payload(&request(TradeAction::Buy, TradeAmount::Sol(0.05)));
        assert_eq!(payload["action"], "buy");
        assert_eq!(payload["amount"], 0.05);
        assert_eq!(payload["denominatedInSol"], "true");
        assert_eq!(payload["slippage"], 15.0);
        assert_eq!(payload["pool"], "pump");
    }

    #[test]
    fn test_trade_local_sell_all_is_percent() {
        let payload = trade_local_payload(&request(
            TradeAction::Sell,
            TradeAmount::Sell(SellAmount::All {
                tracked_quantity: 123.0,
            }),
        ));
        assert_eq!(payload["amount"], "100%");
        assert_eq!(payload["denominatedInSol"], "false");

        let payload = trade_local_payload(&request(
            TradeAction::Sell,
            TradeAmount::Sell(SellAmount::Tokens(42.5)),
        ));
        assert_eq!(payload["amount"], 42.5);
    }

    #[test]
    fn test_aggregator_leg() {
        let (input, output, amount) =
            aggregator_leg(&request(TradeAction::Buy, TradeAmount::Sol(0.25)));
        assert_eq!(input, SOL_MINT);
        assert_eq!(output, "Mint111");
        assert_eq!(amount, 250_000_000);

        let (input, output, amount) = aggregator_leg(&request(
            TradeAction::Sell,
            TradeAmount::Sell(SellAmount::All {
                tracked_quantity: 1_500.5,
            }),
        ));
        assert_eq!(input, "Mint111");
        assert_eq!(output, SOL_MINT);
        assert_eq!(amount, 1_500_500_000);
    }
}
