use alloy::primitives::{Address, U256};
use serde::Serialize;

use super::Token;

/// Where a record came from on chain and when its block was produced.
///
/// `timestamp` is the containing block's timestamp in milliseconds, never
/// client wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventOrigin {
    pub block_number: u64,
    pub log_index: u64,
    pub timestamp: u64,
}

/// Native currency paid into the pool for tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyTrade {
    pub token: Token,
    pub trader: Address,
    pub native_amount: U256,
    pub token_amount: U256,
    pub buy_price: U256,
    pub origin: EventOrigin,
}

/// Tokens sold into the pool for native currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellTrade {
    pub token: Token,
    pub trader: Address,
    pub native_amount: U256,
    pub token_amount: U256,
    pub sell_price: U256,
    pub origin: EventOrigin,
}

/// Token-for-token exchange routed through the native reserve.
///
/// `sell_price` priced the `token_in` leg, `buy_price` the `token_out` leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapTrade {
    pub token_in: Token,
    pub token_out: Token,
    pub trader: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub sell_price: U256,
    pub buy_price: U256,
    pub origin: EventOrigin,
}

impl SwapTrade {
    /// Native-currency value of the leg that touches `token`.
    ///
    /// Selling `token` in is priced at the sell price, buying it out at the
    /// buy price. `None` means the swap does not involve `token` or the
    /// product overflowed.
    pub fn native_value_for(&self, token: Address) -> Option<U256> {
        if self.token_in.address == token {
            self.amount_in.checked_mul(self.sell_price)
        } else if self.token_out.address == token {
            self.amount_out.checked_mul(self.buy_price)
        } else {
            None
        }
    }
}
