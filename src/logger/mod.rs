//! Structured logging for the copy trader
//!
//! Every subsystem logs through a [`LogTag`] so output can be filtered per
//! module from the command line:
//!
//! ```rust
//! use copytrader::logger::{self, LogTag};
//!
//! logger::info(LogTag::Strategy, "Position opened");
//! logger::warning(LogTag::Pricing, "Aggregator timed out");
//! logger::debug(LogTag::Swap, "Raw builder response ..."); // only with --debug-swap
//! logger::verbose(LogTag::Rpc, "Account bytes ...");      // only with --verbose
//! ```
//!
//! Call [`init`] once at startup. Without it, messages still reach the console
//! but nothing is written to disk (the test suite relies on this).

mod config;
mod core;
mod file;
mod format;
mod levels;
mod special;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use special::log_position_tick;
pub use tags::LogTag;

/// Initialize the logger from process arguments and open the log file.
pub fn init() {
    config::init_from_args();
    file::init_file_logging();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, shown only with `--debug-<tag>`
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, shown only with `--verbose` or `--verbose-<tag>`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes. Call during shutdown.
pub fn flush() {
    file::flush_file_logging();
}
