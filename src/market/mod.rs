//! Aggregation layer over the exchange's event log and read calls.
//!
//! Components, leaves first:
//! - [`BlockTimestampResolver`] - block number to block time
//! - [`BlockLocator`] - binary search for the start of a look-back window
//! - [`TokenCache`] / [`EventFetcher`] - typed records from raw logs
//! - [`VolumeAggregator`] - rolling-window volume
//! - [`SnapshotBuilder`] / [`PoolDirectory`] - point-in-time pool views
//! - [`ChartLoader`] - paginated price history
//! - [`Trader`] - the write path
//!
//! [`Market`] wires them together from configuration.

mod chart;
mod fetcher;
mod locator;
mod pools;
mod resolver;
mod snapshot;
mod token_cache;
mod trader;
mod volume;

pub use chart::{ChartLoader, ChartSeries, LoadOutcome};
pub use fetcher::EventFetcher;
pub use locator::BlockLocator;
pub use pools::PoolDirectory;
pub use resolver::BlockTimestampResolver;
pub use snapshot::SnapshotBuilder;
pub use token_cache::TokenCache;
pub use trader::{Trader, TxOutcome};
pub use volume::{sum_volume, VolumeAggregator};

use std::{sync::Arc, time::Duration};

use crate::{
    chain::{ChainSource, ExchangeReader, ExchangeWriter},
    config::MarketSettings,
    error::Result,
    models::Token,
    utils::FeeRate,
};

/// One session's worth of components sharing a single token cache.
#[derive(Clone)]
pub struct Market {
    chain: Arc<dyn ChainSource>,
    fetcher: EventFetcher,
    volume: VolumeAggregator,
    snapshots: SnapshotBuilder,
    pools: PoolDirectory,
    trader: Trader,
    page_blocks: u64,
}

impl Market {
    pub fn new<C>(client: Arc<C>, settings: &MarketSettings) -> Result<Self>
    where
        C: ChainSource + ExchangeReader + ExchangeWriter + 'static,
    {
        let fee = FeeRate::new(settings.fee_numerator, settings.fee_denominator)?;
        let chain: Arc<dyn ChainSource> = client.clone();
        let exchange: Arc<dyn ExchangeReader> = client.clone();

        let tokens = TokenCache::new(chain.clone());
        let fetcher = EventFetcher::new(chain.clone(), tokens.clone());
        let locator = BlockLocator::new(BlockTimestampResolver::new(chain.clone()));
        let volume = VolumeAggregator::new(
            chain.clone(),
            locator,
            fetcher.clone(),
            Duration::from_secs(settings.volume_window_secs),
        );
        let snapshots =
            SnapshotBuilder::new(chain.clone(), exchange.clone(), tokens.clone(), volume.clone(), fee);
        let pools = PoolDirectory::new(exchange, tokens);

        Ok(Self {
            chain,
            fetcher,
            volume,
            snapshots,
            pools,
            trader: Trader::new(client),
            page_blocks: settings.chart_page_blocks,
        })
    }

    pub fn fetcher(&self) -> &EventFetcher {
        &self.fetcher
    }

    pub fn tokens(&self) -> &TokenCache {
        self.fetcher.tokens()
    }

    pub fn volume(&self) -> &VolumeAggregator {
        &self.volume
    }

    pub fn snapshots(&self) -> &SnapshotBuilder {
        &self.snapshots
    }

    pub fn pools(&self) -> &PoolDirectory {
        &self.pools
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    /// Fresh chart walker for `token`, starting at the chain head.
    pub fn chart(&self, token: Token) -> Result<ChartLoader> {
        ChartLoader::new(self.chain.clone(), self.fetcher.clone(), token, self.page_blocks)
    }
}
