use async_trait::async_trait;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use super::{PriceSource, SourceKind, SourceOutcome};
use crate::constants::*;
use crate::errors::CopyTraderError;
use crate::rpc::{parse_pubkey, RpcClient};

/// Fixed-point scale for the reserve ratio
const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Anchor discriminator of the bonding curve account
pub fn bonding_curve_discriminator() -> [u8; 8] {
    let hash = Sha256::digest(BONDING_CURVE_ACCOUNT_NAME.as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Deterministic bonding curve account for a mint (no network call)
pub fn derive_bonding_curve_address(mint: &Pubkey) -> Result<Pubkey, CopyTraderError> {
    let program_id = parse_pubkey(BONDING_CURVE_PROGRAM_ID)?;
    let (address, _bump) =
        Pubkey::find_program_address(&[BONDING_CURVE_SEED, mint.as_ref()], &program_id);
    Ok(address)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Decoded bonding curve account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveState {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
}

impl BondingCurveState {
    /// Decode raw account bytes. The error string explains a soft miss.
    pub fn decode(data: &[u8]) -> Result<Self, String> {
        if data.len() < CURVE_MIN_ACCOUNT_LEN {
            return Err(format!(
                "account too short ({} bytes, need {})",
                data.len(),
                CURVE_MIN_ACCOUNT_LEN
            ));
        }
        if data[..8] != bonding_curve_discriminator() {
            return Err("unexpected account discriminator".to_string());
        }

        Ok(Self {
            virtual_token_reserves: read_u64(data, CURVE_OFFSET_VIRTUAL_TOKEN_RESERVES),
            virtual_sol_reserves: read_u64(data, CURVE_OFFSET_VIRTUAL_SOL_RESERVES),
            real_token_reserves: read_u64(data, CURVE_OFFSET_REAL_TOKEN_RESERVES),
            real_sol_reserves: read_u64(data, CURVE_OFFSET_REAL_SOL_RESERVES),
            token_total_supply: read_u64(data, CURVE_OFFSET_TOKEN_TOTAL_SUPPLY),
            complete: data[CURVE_OFFSET_COMPLETE] != 0,
        })
    }

    /// SOL per whole token, `None` when either virtual reserve is empty
    pub fn price_sol(&self) -> Option<f64> {
        if self.virtual_token_reserves == 0 || self.virtual_sol_reserves == 0 {
            return None;
        }
        // (vsol / 10^9) / (vtoken / 10^6) in 18-decimal fixed point
        let token_scale = 10u128.pow(BONDING_CURVE_TOKEN_DECIMALS as u32);
        let sol_scale = 10u128.pow(SOL_DECIMALS as u32);
        let numerator = (self.virtual_sol_reserves as u128)
            .checked_mul(token_scale)?
            .checked_mul(PRICE_SCALE)?;
        let denominator = (self.virtual_token_reserves as u128).checked_mul(sol_scale)?;
        let scaled = numerator / denominator;
        Some(scaled as f64 / PRICE_SCALE as f64)
    }

    /// Completion fraction `1 - real_token / initial_real_token`, clamped to [0, 1]
    pub fn progress(&self) -> f64 {
        let remaining = self.real_token_reserves as f64 / INITIAL_REAL_TOKEN_RESERVE as f64;
        (1.0 - remaining).clamp(0.0, 1.0)
    }
}

/// Outcome of reading a curve account
#[derive(Debug, Clone, PartialEq)]
pub enum CurveLookup {
    Found(BondingCurveState),
    /// No account or not a curve account
    Absent(String),
}

/// Reads the bonding curve account over RPC
pub struct BondingCurveSource {
    rpc: Arc<dyn RpcClient>,
}

impl BondingCurveSource {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self { rpc }
    }

    pub async fn lookup(&self, mint: &str) -> Result<CurveLookup, CopyTraderError> {
        let mint_pubkey = parse_pubkey(mint)?;
        let curve_address = derive_bonding_curve_address(&mint_pubkey)?;

        let Some(data) = self.rpc.get_account_data(&curve_address).await? else {
            return Ok(CurveLookup::Absent("no bonding curve account".to_string()));
        };

        Ok(match BondingCurveState::decode(&data) {
            Ok(state) => CurveLookup::Found(state),
            Err(reason) => CurveLookup::Absent(reason),
        })
    }
}

#[async_trait]
impl PriceSource for BondingCurveSource {
    fn kind(&self) -> SourceKind {
        SourceKind::BondingCurve
    }

    async fn fetch(&self, mint: &str) -> Result<SourceOutcome, CopyTraderError> {
        let state = match self.lookup(mint).await? {
            CurveLookup::Found(state) => state,
            CurveLookup::Absent(reason) => return Ok(SourceOutcome::Miss(reason)),
        };

        let progress = Some(state.progress());
        if state.complete {
            return Ok(SourceOutcome::Graduated {
                bonding_progress: progress,
            });
        }

        match state.price_sol() {
            Some(price) if price > 0.0 => Ok(SourceOutcome::Price {
                price,
                bonding_progress: progress,
            }),
            _ => Ok(SourceOutcome::Miss("empty curve reserves".to_string())),
        }
    }
}

/// Build raw curve account bytes (tests only)
#[cfg(test)]
pub fn encode_curve_account(state: &BondingCurveState) -> Vec<u8> {
    let mut data = Vec::with_capacity(CURVE_MIN_ACCOUNT_LEN + 32);
    data.extend_from_slice(&bonding_curve_discriminator());
    data.extend_from_slice(&state.virtual_token_reserves.to_le_bytes());
    data.extend_from_slice(&state.virtual_sol_reserves.to_le_bytes());
    data.extend_from_slice(&state.real_token_reserves.to_le_bytes());
    data.extend_from_slice(&state.real_sol_reserves.to_le_bytes());
    data.extend_from_slice(&state.token_total_supply.to_le_bytes());
    data.push(state.complete as u8);
    data.extend_from_slice(&[0u8; 32]);
    data
}
