use alloy::primitives::U256;
use chrono::Utc;
use log::debug;
use std::{sync::Arc, time::Duration};

use crate::{
    chain::{BlockRange, ChainSource},
    error::{ErrorContext, MarketError, Result},
    market::{BlockLocator, EventFetcher},
    models::{BuyTrade, SellTrade, SwapTrade, Token},
};

/// Rolling-window trade volume in native-currency terms.
#[derive(Clone)]
pub struct VolumeAggregator {
    chain: Arc<dyn ChainSource>,
    locator: BlockLocator,
    fetcher: EventFetcher,
    window: Duration,
}

impl VolumeAggregator {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        locator: BlockLocator,
        fetcher: EventFetcher,
        window: Duration,
    ) -> Self {
        Self {
            chain,
            locator,
            fetcher,
            window,
        }
    }

    /// Volume for `token` over the configured window ending now.
    pub async fn volume_24h(&self, token: &Token) -> Result<U256> {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        self.volume_at(token, now_ms).await
    }

    /// Volume for `token` over the window ending at `now_ms`.
    pub async fn volume_at(&self, token: &Token, now_ms: u64) -> Result<U256> {
        let latest = self
            .chain
            .latest_block()
            .await
            .with_context(|| format!("volume for {}", token.symbol))?;
        let start = self
            .locator
            .locate(latest, self.window, now_ms)
            .await
            .with_context(|| format!("volume for {}", token.symbol))?;
        let range = BlockRange::new(start, latest)?;

        let (buys, sells, swaps) = futures::try_join!(
            self.fetcher.fetch_buys(range, Some(token), None),
            self.fetcher.fetch_sells(range, Some(token), None),
            self.fetcher.fetch_swaps(range, Some(token), None),
        )
        .with_context(|| format!("volume for {} in {}", token.symbol, range))?;

        let volume = sum_volume(token, &buys, &sells, &swaps)?;
        debug!(
            "Volume for {} over {} trades in {}: {}",
            token.symbol,
            buys.len() + sells.len() + swaps.len(),
            range,
            volume
        );
        Ok(volume)
    }
}

/// Native-currency volume of a set of trades for `token`.
///
/// Buys and sells count their native leg. A swap counts once, valued on the
/// leg that touches `token`: amount in at the sell price when `token` was sold
/// into the pool, amount out at the buy price when it was bought out.
pub fn sum_volume(
    token: &Token,
    buys: &[BuyTrade],
    sells: &[SellTrade],
    swaps: &[SwapTrade],
) -> Result<U256> {
    let direct = buys
        .iter()
        .map(|b| b.native_amount)
        .chain(sells.iter().map(|s| s.native_amount));

    let mut total = U256::ZERO;
    for amount in direct {
        total = total
            .checked_add(amount)
            .ok_or(MarketError::Overflow("volume"))?;
    }

    for swap in swaps {
        let involved = swap.token_in.address == token.address
            || swap.token_out.address == token.address;
        if !involved {
            continue;
        }
        let value = swap
            .native_value_for(token.address)
            .ok_or(MarketError::Overflow("swap volume"))?;
        total = total
            .checked_add(value)
            .ok_or(MarketError::Overflow("volume"))?;
    }

    Ok(total)
}
