pub mod erc20;
pub mod events;
pub mod exchange;

pub use erc20::IERC20;
pub use events::{withdraw as Withdraw, BuyTrade, Deposit, SellTrade, SwapTrade};
pub use exchange::IMaelstrom;
