/// Subsystem tags used for filtering and console coloring
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Rpc,
    Pricing,
    Graduation,
    Swap,
    Verify,
    Positions,
    Strategy,
    Profit,
    Signals,
    Store,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Rpc => "rpc".to_string(),
            LogTag::Pricing => "pricing".to_string(),
            LogTag::Graduation => "graduation".to_string(),
            LogTag::Swap => "swap".to_string(),
            LogTag::Verify => "verify".to_string(),
            LogTag::Positions => "positions".to_string(),
            LogTag::Strategy => "strategy".to_string(),
            LogTag::Profit => "profit".to_string(),
            LogTag::Signals => "signals".to_string(),
            LogTag::Store => "store".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Uncolored label used in the log file
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Other(name) => name.to_uppercase(),
            other => other.to_debug_key().to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
