//! Display conversions.
//!
//! Every monetary value in this crate stays a `U256` in smallest units until
//! it is rendered. These helpers are that final step: they go through
//! `BigDecimal` so large values keep their precision until the last cast.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

/// Convert U256 to f64 with decimal adjustment.
///
/// Returns 0.0 if the value cannot be represented as a finite f64.
///
/// # Example
/// ```ignore
/// let value = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let adjusted = u256_to_f64(value, 18); // Returns 1.0
/// ```
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// Convert U256 to f64 with decimal adjustment, `None` if not finite.
pub fn u256_to_f64_safe(value: U256, decimals: u8) -> Option<f64> {
    let adjusted = u256_to_decimal(value) / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

/// Render a smallest-unit amount as a fixed-precision decimal string.
pub fn format_units(value: U256, decimals: u8, precision: u32) -> String {
    let adjusted = u256_to_decimal(value) / big_pow10(decimals);
    adjusted.with_scale(i64::from(precision)).to_string()
}

fn u256_to_decimal(value: U256) -> BigDecimal {
    // Via bytes, faster than string parsing
    let bytes: [u8; 32] = value.to_le_bytes();
    BigDecimal::from(BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes))
}

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}
