pub mod abis;
pub mod chain;
pub mod config;
pub mod error;
pub mod market;
pub mod models;
pub mod utils;

pub use chain::RpcClient;
pub use config::Settings;
pub use error::{MarketError, Result};
pub use market::Market;
