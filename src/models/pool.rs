use alloy::primitives::U256;
use serde::Serialize;

use super::{LpPosition, Token};

/// Balances the pool holds for one token, in smallest units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Reserve {
    pub token_reserve: U256,
    pub native_reserve: U256,
}

/// Annualized yield estimate.
///
/// `Undefined` is the sentinel for a pool with zero total liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Apr {
    Ratio(U256),
    Undefined,
}

impl Apr {
    pub fn ratio(&self) -> Option<U256> {
        match self {
            Apr::Ratio(value) => Some(*value),
            Apr::Undefined => None,
        }
    }
}

/// Point-in-time view of a pool for one (token, user) pair.
///
/// Each build produces a fresh value; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub token: Token,
    pub reserve: Reserve,
    pub lp_position: LpPosition,
    pub buy_price: U256,
    pub sell_price: U256,
    pub avg_price: U256,
    pub token_ratio: U256,
    pub volume_24h: U256,
    pub total_liquidity: U256,
    pub apr: Apr,
    /// Milliseconds, from the contract's last exchange record
    pub last_exchange_at: u64,
    /// Wall-clock milliseconds when this snapshot was assembled
    pub computed_at: u64,
}

/// One row of a paginated pool listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolRow {
    pub token: Token,
    pub buy_price: U256,
    pub sell_price: U256,
    pub total_liquidity: U256,
}
