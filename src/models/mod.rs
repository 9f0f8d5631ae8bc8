mod chart;
mod liquidity;
mod pool;
mod token;
mod trade;

pub use chart::{ChartPoint, DisplayPoint, SeriesStats};
pub use liquidity::{LiquidityEvent, LiquidityKind};
pub use pool::{Apr, PoolRow, PoolSnapshot, Reserve};
pub use token::{LpPosition, Token};
pub use trade::{BuyTrade, EventOrigin, SellTrade, SwapTrade};
