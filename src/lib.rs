pub mod arguments;
pub mod config;
pub mod constants;
pub mod errors; // Structured error handling
pub mod events;
pub mod logger;
pub mod positions;
pub mod pricing;
pub mod profit;
pub mod rpc;
pub mod signals;
pub mod strategy;
pub mod summary;
pub mod swaps;
pub mod utils;
