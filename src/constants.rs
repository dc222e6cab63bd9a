/// Chain constants used across the copy trader
///
/// Values here are protocol facts, not tunables. Tunables live in `config`.

// ============================================================================
// SOLANA CONSTANTS
// ============================================================================

/// SOL token mint address (wrapped SOL / WSOL)
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Number of decimal places for SOL
pub const SOL_DECIMALS: u8 = 9;

/// Lamports per SOL (10^9)
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Offset of the decimals byte in an SPL mint account
pub const MINT_DECIMALS_OFFSET: usize = 44;

// ============================================================================
// BONDING CURVE (PUMP.FUN) CONSTANTS
// ============================================================================

/// Bonding curve program id
pub const BONDING_CURVE_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// PDA seed for the per-mint bonding curve account
pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";

/// Anchor account name hashed into the 8-byte account discriminator
pub const BONDING_CURVE_ACCOUNT_NAME: &str = "account:BondingCurve";

/// Decimals of every token launched on the bonding curve
pub const BONDING_CURVE_TOKEN_DECIMALS: u8 = 6;

/// Real token reserve a fresh curve starts with (raw units, 6 decimals)
pub const INITIAL_REAL_TOKEN_RESERVE: u64 = 793_100_000_000_000;

/// Byte offsets inside the bonding curve account
pub const CURVE_OFFSET_VIRTUAL_TOKEN_RESERVES: usize = 8;
pub const CURVE_OFFSET_VIRTUAL_SOL_RESERVES: usize = 16;
pub const CURVE_OFFSET_REAL_TOKEN_RESERVES: usize = 24;
pub const CURVE_OFFSET_REAL_SOL_RESERVES: usize = 32;
pub const CURVE_OFFSET_TOKEN_TOTAL_SUPPLY: usize = 40;
pub const CURVE_OFFSET_COMPLETE: usize = 48;

/// Minimum account length covering every field read above
pub const CURVE_MIN_ACCOUNT_LEN: usize = 49;
