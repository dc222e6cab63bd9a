/// Process argument capture and debug flag helpers
///
/// The CLI itself is parsed with clap in `main.rs`; this module keeps a copy of
/// the raw arguments so library code (the logger, debug gates) can check
/// `--debug-<module>` flags without threading them through every call.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Override the captured arguments (used by tests)
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

pub fn is_debug_pricing_enabled() -> bool {
    has_arg("--debug-pricing")
}

pub fn is_debug_swap_enabled() -> bool {
    has_arg("--debug-swap")
}

pub fn is_debug_strategy_enabled() -> bool {
    has_arg("--debug-strategy")
}

pub fn is_debug_positions_enabled() -> bool {
    has_arg("--debug-positions")
}

pub fn is_debug_rpc_enabled() -> bool {
    has_arg("--debug-rpc")
}

/// Names of all enabled `--debug-*` flags, for the startup banner
pub fn enabled_debug_modes() -> Vec<String> {
    get_cmd_args()
        .into_iter()
        .filter_map(|a| a.strip_prefix("--debug-").map(|s| s.to_string()))
        .collect()
}
