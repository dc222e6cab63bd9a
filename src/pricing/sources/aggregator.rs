use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{build_http_client, PriceSource, SourceKind, SourceOutcome};
use crate::config::PricingConfig;
use crate::constants::{LAMPORTS_PER_SOL, MINT_DECIMALS_OFFSET, SOL_MINT};
use crate::errors::{CopyTraderError, NetworkError};
use crate::logger::{self, LogTag};
use crate::rpc::{parse_pubkey, RpcClient};
use crate::utils::short_mint;

/// Quote aggregator: price = SOL out / probe tokens in
///
/// The probe is sized in raw units, so each mint's decimals are read from its
/// mint account once and cached. The configured decimals are used when no
/// RPC is attached or the mint account can't be read.
pub struct AggregatorSource {
    http: reqwest::Client,
    quote_url: String,
    probe_tokens: f64,
    probe_token_decimals: u8,
    rpc: Option<Arc<dyn RpcClient>>,
    decimals: Mutex<HashMap<String, u8>>,
}

impl AggregatorSource {
    pub fn new(config: &PricingConfig) -> Result<Self, CopyTraderError> {
        Ok(Self {
            http: build_http_client(config.http_timeout_secs)?,
            quote_url: config.aggregator_quote_url.clone(),
            probe_tokens: config.probe_tokens,
            probe_token_decimals: config.probe_token_decimals,
            rpc: None,
            decimals: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve per-mint decimals from the mint account
    pub fn with_rpc(mut self, rpc: Arc<dyn RpcClient>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub async fn token_decimals(&self, mint: &str) -> u8 {
        let cached = self.decimals.lock().get(mint).copied();
        if let Some(decimals) = cached {
            return decimals;
        }
        let Some(rpc) = &self.rpc else {
            return self.probe_token_decimals;
        };

        let read = async {
            let data = rpc.get_account_data(&parse_pubkey(mint)?).await?;
            Ok::<_, CopyTraderError>(data.as_deref().and_then(parse_mint_decimals))
        }
        .await;

        match read {
            Ok(Some(decimals)) => {
                self.decimals.lock().insert(mint.to_string(), decimals);
                decimals
            }
            Ok(None) => self.probe_token_decimals,
            Err(e) => {
                logger::warning(
                    LogTag::Pricing,
                    &format!(
                        "Mint decimals for {} unavailable, assuming {}: {}",
                        short_mint(mint),
                        self.probe_token_decimals,
                        e
                    ),
                );
                self.probe_token_decimals
            }
        }
    }
}

/// Decimals byte of an SPL mint account (token-2022 shares the base layout)
pub fn parse_mint_decimals(data: &[u8]) -> Option<u8> {
    data.get(MINT_DECIMALS_OFFSET).copied()
}

pub fn probe_raw_amount(probe_tokens: f64, decimals: u8) -> u64 {
    (probe_tokens * 10f64.powi(decimals as i32)).round() as u64
}

/// "No route" style answers from the aggregator
fn is_no_route(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("no route")
        || lower.contains("could not find any route")
        || lower.contains("not tradable")
        || lower.contains("token_not_tradable")
        || lower.contains("route_plan_does_not_consume_all_the_amount")
}

/// Turn a quote response into a per-token SOL price
pub fn parse_quote_response(body: &Value, probe_tokens: f64) -> SourceOutcome {
    if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
        return SourceOutcome::Miss(format!("aggregator: {}", error));
    }

    let out_lamports = body
        .get("outAmount")
        .and_then(|v| v.as_str().and_then(|s| s.parse::<u64>().ok()).or_else(|| v.as_u64()))
        .unwrap_or(0);

    if out_lamports == 0 || probe_tokens <= 0.0 {
        return SourceOutcome::Miss("aggregator returned no output".to_string());
    }

    let sol_out = out_lamports as f64 / LAMPORTS_PER_SOL as f64;
    SourceOutcome::Price {
        price: sol_out / probe_tokens,
        bonding_progress: None,
    }
}

#[async_trait]
impl PriceSource for AggregatorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Aggregator
    }

    async fn fetch(&self, mint: &str) -> Result<SourceOutcome, CopyTraderError> {
        let decimals = self.token_decimals(mint).await;
        let amount = probe_raw_amount(self.probe_tokens, decimals).to_string();
        let response = self
            .http
            .get(&self.quote_url)
            .query(&[
                ("inputMint", mint),
                ("outputMint", SOL_MINT),
                ("amount", amount.as_str()),
                ("slippageBps", "50"),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 400 || status.as_u16() == 404 || is_no_route(&text) {
                return Ok(SourceOutcome::Miss(format!("aggregator: no route ({})", status)));
            }
            return Err(NetworkError::HttpStatus {
                endpoint: self.quote_url.clone(),
                status: status.as_u16(),
                body: crate::utils::safe_truncate(&text, 200).to_string(),
            }
            .into());
        }

        if text.trim().is_empty() {
            return Ok(SourceOutcome::Miss("aggregator: empty body".to_string()));
        }

        let body: Value = serde_json::from_str(&text)?;
        Ok(parse_quote_response(&body, self.probe_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::MockRpcClient;
    use serde_json::json;
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_parse_quote_response() {
        // 1000 tokens -> 0.03 SOL
        let outcome = parse_quote_response(&json!({"outAmount": "30000000"}), 1_000.0);
        match outcome {
            SourceOutcome::Price { price, .. } => assert!((price - 0.00003).abs() < 1e-15),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_no_route_is_a_miss() {
        assert!(matches!(
            parse_quote_response(&json!({"error": "Could not find any route"}), 1_000.0),
            SourceOutcome::Miss(_)
        ));
        assert!(matches!(
            parse_quote_response(&json!({"outAmount": "0"}), 1_000.0),
            SourceOutcome::Miss(_)
        ));
        assert!(is_no_route(r#"{"errorCode":"TOKEN_NOT_TRADABLE"}"#));
    }

    #[tokio::test]
    async fn test_probe_sized_by_mint_decimals() {
        let rpc = Arc::new(MockRpcClient::new());
        let nine = Pubkey::new_unique();
        let mut account = vec![0u8; 82];
        account[MINT_DECIMALS_OFFSET] = 9;
        rpc.set_account(nine, account);

        let source = AggregatorSource::new(&PricingConfig::default())
            .unwrap()
            .with_rpc(rpc.clone());
        assert_eq!(source.token_decimals(&nine.to_string()).await, 9);
        // cached after the first read
        assert_eq!(source.token_decimals(&nine.to_string()).await, 9);
        assert_eq!(rpc.account_reads(), 1);

        // unknown mint falls back to the configured decimals
        let unknown = Pubkey::new_unique().to_string();
        assert_eq!(source.token_decimals(&unknown).await, 6);

        assert_eq!(probe_raw_amount(1_000.0, 9), 1_000_000_000_000);
        assert_eq!(probe_raw_amount(1_000.0, 6), 1_000_000_000);
        assert_eq!(parse_mint_decimals(&[0u8; 10]), None);
    }
}
