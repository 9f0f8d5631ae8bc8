mod config;

pub use self::config::{MarketSettings, ReportSettings, RpcSettings, Settings};
