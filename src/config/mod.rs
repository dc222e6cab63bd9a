/// Configuration system
///
/// - `macros`: the `config_struct!` macro (struct + defaults + serde in one declaration)
/// - `schemas`: every configuration section
/// - `utils`: load, validate, save and key parsing
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{load_config_from_path, parse_private_key, save_config, CONFIG_FILE_PATH};
