//! Utility functions for the Maelstrom client.
//!
//! - [`conversion`] - U256 to display values (BigDecimal-backed)
//! - [`math`] - average price, total liquidity and APR in integer arithmetic

mod conversion;
mod math;

pub use conversion::{format_units, u256_to_f64, u256_to_f64_safe};
pub use math::{apr, average_price, total_liquidity, FeeRate};
