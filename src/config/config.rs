use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Node connection and exchange contract configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RpcSettings {
    pub url: String,
    pub exchange_address: String,
    /// Upper bound for every individual RPC call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Hex private key used to sign writes. Reads work without it.
    #[serde(default)]
    pub private_key: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Protocol constants and aggregation windows.
///
/// The trade fee is a rational `fee_numerator / fee_denominator` so that
/// fractional rates (3% = 3/100) never pass through a fixed-point guess.
#[derive(Debug, Deserialize, Clone)]
pub struct MarketSettings {
    #[serde(default = "default_fee_numerator")]
    pub fee_numerator: u64,
    #[serde(default = "default_fee_denominator")]
    pub fee_denominator: u64,
    #[serde(default = "default_volume_window_secs")]
    pub volume_window_secs: u64,
    #[serde(default = "default_chart_page_blocks")]
    pub chart_page_blocks: u64,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
}

fn default_fee_numerator() -> u64 {
    3
}

fn default_fee_denominator() -> u64 {
    100
}

fn default_volume_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_chart_page_blocks() -> u64 {
    1_000
}

fn default_native_decimals() -> u8 {
    18
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            fee_numerator: default_fee_numerator(),
            fee_denominator: default_fee_denominator(),
            volume_window_secs: default_volume_window_secs(),
            chart_page_blocks: default_chart_page_blocks(),
            native_decimals: default_native_decimals(),
        }
    }
}

/// What the binary reports on when run.
#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    pub token: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_chart_pages")]
    pub chart_pages: u32,
    #[serde(default = "default_pool_page_size")]
    pub pool_page_size: u64,
}

fn default_chart_pages() -> u32 {
    1
}

fn default_pool_page_size() -> u64 {
    10
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup, with `MAELSTROM__SECTION__KEY`
/// environment variables taking precedence.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: RpcSettings,
    #[serde(default)]
    pub market: MarketSettings,
    pub report: ReportSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("MAELSTROM").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let yaml = r#"
rpc:
  url: "http://localhost:8545"
  exchange_address: "0x0000000000000000000000000000000000000001"
report:
  token: "0x0000000000000000000000000000000000000002"
"#;
        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.rpc.timeout_ms, 30_000);
        assert!(settings.rpc.private_key.is_none());
        assert_eq!(settings.market.fee_numerator, 3);
        assert_eq!(settings.market.fee_denominator, 100);
        assert_eq!(settings.market.volume_window_secs, 86_400);
        assert_eq!(settings.market.chart_page_blocks, 1_000);
        assert_eq!(settings.report.chart_pages, 1);
        assert_eq!(settings.log_level, "info");
    }
}
