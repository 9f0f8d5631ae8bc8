use alloy::primitives::{Address, U256};
use serde::Serialize;

/// ERC-20 token metadata.
///
/// Immutable once fetched; cached by address for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, symbol: String, name: String, decimals: u8) -> Self {
        Self {
            address,
            symbol,
            name,
            decimals,
        }
    }
}

/// A user's holding of a pool's liquidity-pool token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LpPosition {
    pub token: Token,
    pub balance: U256,
    pub total_supply: U256,
}
