//! Derived pool metrics in exact integer arithmetic.

use alloy::primitives::U256;

use crate::error::{MarketError, Result};

/// Protocol trade fee as an exact fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    pub numerator: u64,
    pub denominator: u64,
}

impl FeeRate {
    pub fn new(numerator: u64, denominator: u64) -> Result<Self> {
        if denominator == 0 {
            return Err(MarketError::InvalidInput(
                "fee denominator must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl Default for FeeRate {
    /// 3% trade fee
    fn default() -> Self {
        Self {
            numerator: 3,
            denominator: 100,
        }
    }
}

/// Mean of buy and sell price, truncating the remainder.
pub fn average_price(buy_price: U256, sell_price: U256) -> Result<U256> {
    let sum = buy_price
        .checked_add(sell_price)
        .ok_or(MarketError::Overflow("average price"))?;
    Ok(sum / U256::from(2u64))
}

/// Average price times token reserve.
pub fn total_liquidity(avg_price: U256, token_reserve: U256) -> Result<U256> {
    avg_price
        .checked_mul(token_reserve)
        .ok_or(MarketError::Overflow("total liquidity"))
}

/// `volume * fee * 365 / total_liquidity`, with the fee applied as an exact
/// fraction so rates below one never truncate to zero before the division.
pub fn apr(volume: U256, total_liquidity: U256, fee: FeeRate) -> Result<U256> {
    if total_liquidity.is_zero() {
        return Err(MarketError::DivisionByZero("apr"));
    }

    let numerator = volume
        .checked_mul(U256::from(fee.numerator))
        .and_then(|v| v.checked_mul(U256::from(365u64)))
        .ok_or(MarketError::Overflow("apr"))?;
    let denominator = total_liquidity
        .checked_mul(U256::from(fee.denominator))
        .ok_or(MarketError::Overflow("apr"))?;

    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(units: u64) -> U256 {
        U256::from(units) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_average_price_and_liquidity() {
        let avg = average_price(e18(2), e18(4)).unwrap();
        assert_eq!(avg, e18(3));

        let liquidity = total_liquidity(avg, U256::from(1000u64)).unwrap();
        assert_eq!(liquidity, e18(3000));
    }

    #[test]
    fn test_average_price_truncates() {
        let avg = average_price(U256::from(3u64), U256::from(4u64)).unwrap();
        assert_eq!(avg, U256::from(3u64));
    }

    #[test]
    fn test_apr_zero_liquidity_is_division_by_zero() {
        let err = apr(e18(5), U256::ZERO, FeeRate::default()).unwrap_err();
        assert!(matches!(err, MarketError::DivisionByZero("apr")));
    }

    #[test]
    fn test_apr_fractional_fee() {
        // 100 * 3 * 365 / (100 * 1) = 1095 -> 3% of daily volume equal to liquidity
        let value = apr(U256::from(100u64), U256::from(1u64), FeeRate::default()).unwrap();
        assert_eq!(value, U256::from(1095u64));
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = total_liquidity(U256::MAX, U256::from(2u64)).unwrap_err();
        assert!(matches!(err, MarketError::Overflow("total liquidity")));
    }

    #[test]
    fn test_fee_rate_rejects_zero_denominator() {
        assert!(FeeRate::new(3, 0).is_err());
    }
}
