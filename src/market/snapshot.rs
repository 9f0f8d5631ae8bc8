use alloy::primitives::{Address, U256};
use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;

use crate::{
    chain::{ChainSource, ExchangeReader},
    error::{ErrorContext, MarketError, Result},
    market::{TokenCache, VolumeAggregator},
    models::{Apr, LpPosition, PoolSnapshot, Reserve, Token},
    utils::{apr, average_price, total_liquidity, FeeRate},
};

/// Assembles point-in-time pool views.
///
/// The contract reads are independent calls and may each land on a
/// different block, so a snapshot is not guaranteed to be consistent at a
/// single height.
#[derive(Clone)]
pub struct SnapshotBuilder {
    chain: Arc<dyn ChainSource>,
    exchange: Arc<dyn ExchangeReader>,
    tokens: TokenCache,
    volume: VolumeAggregator,
    fee: FeeRate,
}

impl SnapshotBuilder {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        exchange: Arc<dyn ExchangeReader>,
        tokens: TokenCache,
        volume: VolumeAggregator,
        fee: FeeRate,
    ) -> Self {
        Self {
            chain,
            exchange,
            tokens,
            volume,
            fee,
        }
    }

    pub async fn build(&self, token: Address, user: Address) -> Result<PoolSnapshot> {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        self.build_at(token, user, now_ms).await
    }

    /// Snapshot with the volume window ending at `now_ms`.
    pub async fn build_at(&self, token: Address, user: Address, now_ms: u64) -> Result<PoolSnapshot> {
        let token = self
            .tokens
            .resolve(token)
            .await
            .with_context(|| format!("snapshot of {}", token))?;

        self.assemble(&token, user, now_ms)
            .await
            .with_context(|| format!("snapshot of {}", token.symbol))
    }

    async fn assemble(&self, token: &Token, user: Address, now_ms: u64) -> Result<PoolSnapshot> {
        let address = token.address;
        let (
            reserve,
            buy_price,
            sell_price,
            token_ratio,
            last_exchange_secs,
            lp_balance,
            lp_supply,
            volume_24h,
        ) = futures::try_join!(
            self.exchange.reserves(address),
            self.exchange.buy_price(address),
            self.exchange.sell_price(address),
            self.exchange.token_ratio(address),
            self.exchange.last_exchange_timestamp(address),
            self.chain.erc20_balance(address, user),
            self.chain.erc20_total_supply(address),
            self.volume.volume_at(token, now_ms),
        )?;

        let avg_price = average_price(buy_price, sell_price)?;
        let total_liquidity = total_liquidity(avg_price, reserve.token_reserve)?;
        let apr = match apr(volume_24h, total_liquidity, self.fee) {
            Ok(value) => Apr::Ratio(value),
            Err(MarketError::DivisionByZero(what)) => {
                warn!("Pool {} has no liquidity, {} is undefined", token.symbol, what);
                Apr::Undefined
            },
            Err(e) => return Err(e),
        };
        let last_exchange_at = last_exchange_secs
            .checked_mul(1000)
            .ok_or(MarketError::Overflow("last exchange timestamp"))?;

        debug!(
            "Snapshot {}: liquidity {} volume {} apr {:?}",
            token.symbol, total_liquidity, volume_24h, apr
        );

        Ok(PoolSnapshot {
            token: token.clone(),
            reserve,
            lp_position: LpPosition {
                token: token.clone(),
                balance: lp_balance,
                total_supply: lp_supply,
            },
            buy_price,
            sell_price,
            avg_price,
            token_ratio,
            volume_24h,
            total_liquidity,
            apr,
            last_exchange_at,
            computed_at: Utc::now().timestamp_millis().max(0) as u64,
        })
    }

    /// The user's share of a pool's reserves, as recorded by the exchange.
    pub async fn user_reserves(&self, token: Address, user: Address) -> Result<Reserve> {
        self.exchange
            .user_reserves(token, user)
            .await
            .with_context(|| format!("pool balances of {} in {}", user, token))
    }
}

/// Total liquidity for a `(buy, sell, reserve)` triple without a snapshot.
pub(crate) fn liquidity_of(buy_price: U256, sell_price: U256, token_reserve: U256) -> Result<U256> {
    total_liquidity(average_price(buy_price, sell_price)?, token_reserve)
}
