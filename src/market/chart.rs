//! Incremental price chart.
//!
//! [`ChartLoader`] walks the chain backwards one fixed-width block page at a
//! time and merges buy and sell prices into a [`ChartSeries`] keyed by block
//! timestamp.

use alloy::primitives::U256;
use log::{debug, info};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tokio_util::sync::CancellationToken;

use crate::{
    chain::{BlockRange, ChainSource},
    error::{ErrorContext, MarketError, Result},
    market::EventFetcher,
    models::{BuyTrade, ChartPoint, DisplayPoint, SellTrade, SeriesStats, Token},
    utils::u256_to_f64,
};

/// Buy and sell prices by timestamp (ms), last write wins per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSeries {
    buys: BTreeMap<u64, U256>,
    sells: BTreeMap<u64, U256>,
}

impl ChartSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_buys(&mut self, trades: &[BuyTrade]) {
        for trade in trades {
            self.buys.insert(trade.origin.timestamp, trade.buy_price);
        }
    }

    pub fn merge_sells(&mut self, trades: &[SellTrade]) {
        for trade in trades {
            self.sells.insert(trade.origin.timestamp, trade.sell_price);
        }
    }

    /// Number of price observations: buy entries plus sell entries.
    ///
    /// A timestamp holding both a buy and a sell counts twice, so this can
    /// exceed `points().len()`.
    pub fn len(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    /// Both sides joined on timestamp, ascending.
    ///
    /// A side with no trade at a timestamp stays `None`, except on the first
    /// point where a missing side takes the present side's price so both
    /// lines start together.
    pub fn points(&self) -> Vec<ChartPoint> {
        let mut points: BTreeMap<u64, ChartPoint> = BTreeMap::new();

        for (timestamp, price) in &self.buys {
            points
                .entry(*timestamp)
                .or_insert_with(|| empty_point(*timestamp))
                .buy_price = Some(*price);
        }
        for (timestamp, price) in &self.sells {
            points
                .entry(*timestamp)
                .or_insert_with(|| empty_point(*timestamp))
                .sell_price = Some(*price);
        }

        let mut points: Vec<ChartPoint> = points.into_values().collect();
        if let Some(first) = points.first_mut() {
            first.buy_price = first.buy_price.or(first.sell_price);
            first.sell_price = first.sell_price.or(first.buy_price);
        }
        points
    }

    /// Render-ready points: the merged history in native units plus a live
    /// point carrying the current prices at `now_ms`.
    pub fn display(
        &self,
        current_buy: U256,
        current_sell: U256,
        now_ms: u64,
        decimals: u8,
    ) -> Vec<DisplayPoint> {
        let mut points: Vec<DisplayPoint> = self
            .points()
            .into_iter()
            .map(|p| DisplayPoint {
                timestamp: p.timestamp,
                buy_price: p.buy_price.map(|v| u256_to_f64(v, decimals)),
                sell_price: p.sell_price.map(|v| u256_to_f64(v, decimals)),
                live: false,
            })
            .collect();

        points.push(DisplayPoint {
            timestamp: now_ms,
            buy_price: Some(u256_to_f64(current_buy, decimals)),
            sell_price: Some(u256_to_f64(current_sell, decimals)),
            live: true,
        });
        points
    }

    pub fn stats(&self, current_buy: U256, current_sell: U256, decimals: u8) -> SeriesStats {
        let mean = |prices: &BTreeMap<u64, U256>| {
            if prices.is_empty() {
                return None;
            }
            let sum: f64 = prices.values().map(|v| u256_to_f64(*v, decimals)).sum();
            Some(sum / prices.len() as f64)
        };

        let buy = u256_to_f64(current_buy, decimals);
        let sell = u256_to_f64(current_sell, decimals);
        let mid = (buy + sell) / 2.0;

        SeriesStats {
            data_points: self.len(),
            avg_buy_price: mean(&self.buys),
            avg_sell_price: mean(&self.sells),
            spread_pct: (mid > 0.0).then(|| (buy - sell) / mid * 100.0),
        }
    }
}

fn empty_point(timestamp: u64) -> ChartPoint {
    ChartPoint {
        timestamp,
        buy_price: None,
        sell_price: None,
    }
}

/// Result of one [`ChartLoader::load_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged.
    Loaded {
        range: BlockRange,
        buys: usize,
        sells: usize,
    },
    /// Another page is already being fetched; nothing was done.
    InFlight,
    /// Block 0 has already been loaded.
    Exhausted,
    /// Cancelled before the page completed; state is unchanged.
    Cancelled,
}

#[derive(Debug, Clone)]
struct LoaderState {
    /// Next block to load down from. `None` until the first page resolves
    /// the chain head.
    cursor: Option<u64>,
    has_more: bool,
    series: ChartSeries,
}

/// Backward block-range walker for one token's price chart.
///
/// At most one page is in flight at a time. A failed or cancelled page leaves
/// the cursor where it was, so the next call repeats the same range.
pub struct ChartLoader {
    chain: Arc<dyn ChainSource>,
    fetcher: EventFetcher,
    token: Token,
    page_blocks: u64,
    fetching: AtomicBool,
    state: Mutex<LoaderState>,
}

/// Clears the in-flight flag however the page ends.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChartLoader {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        fetcher: EventFetcher,
        token: Token,
        page_blocks: u64,
    ) -> Result<Self> {
        if page_blocks == 0 {
            return Err(MarketError::InvalidInput(
                "chart page width must be at least one block".to_string(),
            ));
        }
        Ok(Self {
            chain,
            fetcher,
            token,
            page_blocks,
            fetching: AtomicBool::new(false),
            state: Mutex::new(LoaderState {
                cursor: None,
                has_more: true,
                series: ChartSeries::new(),
            }),
        })
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn has_more(&self) -> bool {
        self.read(|s| s.has_more)
    }

    pub fn cursor(&self) -> Option<u64> {
        self.read(|s| s.cursor)
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Copy of everything loaded so far.
    pub fn series(&self) -> ChartSeries {
        self.read(|s| s.series.clone())
    }

    pub async fn load_more(&self) -> Result<LoadOutcome> {
        self.load_more_with_cancel(&CancellationToken::new()).await
    }

    /// Fetch and merge the next page unless one is already in flight.
    pub async fn load_more_with_cancel(&self, cancel: &CancellationToken) -> Result<LoadOutcome> {
        if self
            .fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Chart page for {} already in flight", self.token.symbol);
            return Ok(LoadOutcome::InFlight);
        }
        let _guard = FetchGuard(&self.fetching);

        let (cursor, has_more) = self.read(|s| (s.cursor, s.has_more));
        if !has_more {
            return Ok(LoadOutcome::Exhausted);
        }

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Chart page for {} cancelled", self.token.symbol);
                return Ok(LoadOutcome::Cancelled);
            }
            page = self.fetch_page(cursor) => page?,
        };
        let (range, buys, sells) = page;

        self.write(|state| {
            state.series.merge_buys(&buys);
            state.series.merge_sells(&sells);
            if range.from > 0 {
                state.cursor = Some(range.from - 1);
            } else {
                state.cursor = Some(0);
                state.has_more = false;
            }
        });

        info!(
            "Loaded chart page {} for {}: {} buys, {} sells",
            range,
            self.token.symbol,
            buys.len(),
            sells.len()
        );
        Ok(LoadOutcome::Loaded {
            range,
            buys: buys.len(),
            sells: sells.len(),
        })
    }

    async fn fetch_page(
        &self,
        cursor: Option<u64>,
    ) -> Result<(BlockRange, Vec<BuyTrade>, Vec<SellTrade>)> {
        let to = match cursor {
            Some(block) => block,
            None => self
                .chain
                .latest_block()
                .await
                .with_context(|| format!("chart head for {}", self.token.symbol))?,
        };
        let range = BlockRange::new(to.saturating_sub(self.page_blocks - 1), to)?;

        let (buys, sells) = futures::try_join!(
            self.fetcher.fetch_buys(range, Some(&self.token), None),
            self.fetcher.fetch_sells(range, Some(&self.token), None),
        )
        .with_context(|| format!("chart page {} for {}", range, self.token.symbol))?;

        Ok((range, buys, sells))
    }

    fn read<T>(&self, f: impl FnOnce(&LoaderState) -> T) -> T {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    fn write(&self, f: impl FnOnce(&mut LoaderState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }
}
