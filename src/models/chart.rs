use alloy::primitives::U256;
use serde::Serialize;

/// One timestamp of the merged buy/sell price series.
///
/// A side with no trade at this timestamp stays `None`, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub timestamp: u64,
    pub buy_price: Option<U256>,
    pub sell_price: Option<U256>,
}

/// Chart point converted for rendering.
///
/// `live` marks the synthetic current-price point stamped with wall-clock
/// time; every other point carries a block timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPoint {
    pub timestamp: u64,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub live: bool,
}

/// Summary figures shown next to the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    /// Buy plus sell observations; a timestamp with both sides counts twice
    pub data_points: usize,
    pub avg_buy_price: Option<f64>,
    pub avg_sell_price: Option<f64>,
    /// (buy - sell) / mid, as a percentage of the current prices
    pub spread_pct: Option<f64>,
}
