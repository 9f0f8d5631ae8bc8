use alloy::primitives::{Address, U256};
use serde::Serialize;

use super::{EventOrigin, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityKind {
    Deposit,
    Withdraw,
}

/// Liquidity added to or removed from a pool.
///
/// `lp_amount` is the LP tokens minted for a deposit or burned for a withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidityEvent {
    pub kind: LiquidityKind,
    pub token: Token,
    pub user: Address,
    pub native_amount: U256,
    pub token_amount: U256,
    pub lp_amount: U256,
    pub origin: EventOrigin,
}
