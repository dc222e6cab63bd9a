use async_trait::async_trait;
use serde::Deserialize;

use super::{build_http_client, PriceSource, SourceKind, SourceOutcome};
use crate::config::PricingConfig;
use crate::constants::SOL_MINT;
use crate::errors::{CopyTraderError, NetworkError};

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<PairInfo>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairInfo {
    #[serde(default)]
    pub pair_address: String,
    #[serde(default)]
    pub price_native: Option<String>,
    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default)]
    pub quote_token: Option<TokenRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Liquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRef {
    pub address: String,
}

impl PairInfo {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    fn is_sol_quoted(&self) -> bool {
        self.quote_token
            .as_ref()
            .map(|t| t.address == SOL_MINT)
            .unwrap_or(false)
    }
}

/// Pick the SOL-quoted pair with the largest USD liquidity and read its native price
pub fn select_price(pairs: &[PairInfo]) -> SourceOutcome {
    let best = pairs
        .iter()
        .filter(|p| p.is_sol_quoted())
        .max_by(|a, b| a.liquidity_usd().total_cmp(&b.liquidity_usd()));

    let Some(pair) = best else {
        return SourceOutcome::Miss("market data: no SOL-quoted pair".to_string());
    };

    match pair
        .price_native
        .as_deref()
        .and_then(|p| p.parse::<f64>().ok())
    {
        Some(price) if price.is_finite() && price > 0.0 => SourceOutcome::Price {
            price,
            bonding_progress: None,
        },
        _ => SourceOutcome::Miss(format!(
            "market data: pair {} has no usable price",
            pair.pair_address
        )),
    }
}

/// Market-data listing fallback
pub struct MarketDataSource {
    http: reqwest::Client,
    base_url: String,
}

impl MarketDataSource {
    pub fn new(config: &PricingConfig) -> Result<Self, CopyTraderError> {
        Ok(Self {
            http: build_http_client(config.http_timeout_secs)?,
            base_url: config.market_data_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for MarketDataSource {
    fn kind(&self) -> SourceKind {
        SourceKind::MarketData
    }

    async fn fetch(&self, mint: &str) -> Result<SourceOutcome, CopyTraderError> {
        let url = format!("{}/{}", self.base_url, mint);
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(SourceOutcome::Miss("market data: not listed".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::HttpStatus {
                endpoint: url,
                status: status.as_u16(),
                body: crate::utils::safe_truncate(&body, 200).to_string(),
            }
            .into());
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(SourceOutcome::Miss("market data: empty body".to_string()));
        }

        let parsed: TokenPairsResponse = serde_json::from_str(&text)?;
        match parsed.pairs {
            Some(pairs) if !pairs.is_empty() => Ok(select_price(&pairs)),
            _ => Ok(SourceOutcome::Miss("market data: no pairs".to_string())),
        }
    }
}
