/// Small helpers shared across modules
use chrono::{DateTime, Utc};

use crate::constants::{LAMPORTS_PER_SOL, SOL_MINT};

/// Truncate a string to at most `max_chars` characters without splitting a char
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Short display form of a mint address ("SOL" for wrapped SOL)
pub fn short_mint(mint: &str) -> &str {
    if mint == SOL_MINT {
        "SOL"
    } else {
        safe_truncate(mint, 8)
    }
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    (lamports as f64) / (LAMPORTS_PER_SOL as f64)
}

pub fn sol_to_lamports(sol_amount: f64) -> u64 {
    (sol_amount * (LAMPORTS_PER_SOL as f64)).round() as u64
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Format a duration in a compact way ("45s", "12m", "3h5m", "2d4h")
pub fn format_duration_compact(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let total_seconds = end.signed_duration_since(start).num_seconds().max(0);

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        format!("{}m", total_seconds / 60)
    } else if total_seconds < 86400 {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes > 0 {
            format!("{}h{}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = total_seconds / 86400;
        let hours = (total_seconds % 86400) / 3600;
        if hours > 0 {
            format!("{}d{}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_lamport_conversions() {
        assert_eq!(lamports_to_sol(1_500_000_000), 1.5);
        assert_eq!(sol_to_lamports(0.005), 5_000_000);
    }

    #[test]
    fn test_format_duration_compact() {
        let start = Utc::now();
        assert_eq!(format_duration_compact(start, start + Duration::seconds(45)), "45s");
        assert_eq!(format_duration_compact(start, start + Duration::seconds(3900)), "1h5m");
        assert_eq!(format_duration_compact(start, start + Duration::hours(50)), "2d2h");
    }

    #[test]
    fn test_short_mint() {
        assert_eq!(short_mint(SOL_MINT), "SOL");
        assert_eq!(short_mint("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"), "6EF8rrec");
        assert_eq!(safe_truncate("abc", 8), "abc");
    }
}
