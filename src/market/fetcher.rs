//! Event-log fetcher.
//!
//! Turns raw `eth_getLogs` entries into typed trade and liquidity records.
//! Every batch goes through the same steps:
//!
//! 1. one log query per event kind (two for token-filtered swaps, which can
//!    match on either leg), merged and ordered by `(block, log_index)`
//! 2. strict decode of each log into its event struct; a log that does not
//!    decode fails the batch
//! 3. block timestamps resolved once per distinct block, concurrently
//! 4. token metadata resolved once per distinct address through the
//!    session [`TokenCache`]

use alloy::{primitives::Address, rpc::types::Log, sol_types::SolEvent};
use futures::future::try_join_all;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::{
    abis,
    chain::{BlockRange, ChainSource, EventKind, LogQuery},
    error::{ErrorContext, MarketError, Result},
    market::{BlockTimestampResolver, TokenCache},
    models::{BuyTrade, EventOrigin, LiquidityEvent, LiquidityKind, SellTrade, SwapTrade, Token},
};

/// A decoded event and where it sat in the chain.
struct Decoded<E> {
    event: E,
    block_number: u64,
    log_index: u64,
}

#[derive(Clone)]
pub struct EventFetcher {
    chain: Arc<dyn ChainSource>,
    tokens: TokenCache,
    resolver: BlockTimestampResolver,
}

impl EventFetcher {
    pub fn new(chain: Arc<dyn ChainSource>, tokens: TokenCache) -> Self {
        let resolver = BlockTimestampResolver::new(chain.clone());
        Self {
            chain,
            tokens,
            resolver,
        }
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Buy trades in `range`, optionally narrowed to one token and/or trader.
    pub async fn fetch_buys(
        &self,
        range: BlockRange,
        token: Option<&Token>,
        trader: Option<Address>,
    ) -> Result<Vec<BuyTrade>> {
        let query = LogQuery::new(EventKind::BuyTrade, range)
            .with_address(0, token.map(|t| t.address))
            .with_address(1, trader);

        let decoded = self.decode_batch::<abis::BuyTrade>(vec![query]).await?;
        let origins = self.origins(&decoded).await?;
        let tokens = self
            .tokens_for(decoded.iter().map(|d| d.event.token), token)
            .await?;

        Ok(decoded
            .into_iter()
            .zip(origins)
            .zip(tokens)
            .map(|((d, origin), token)| BuyTrade {
                token,
                trader: d.event.trader,
                native_amount: d.event.ethAmount,
                token_amount: d.event.tokenAmount,
                buy_price: d.event.buyPrice,
                origin,
            })
            .collect())
    }

    /// Sell trades in `range`, optionally narrowed to one token and/or trader.
    pub async fn fetch_sells(
        &self,
        range: BlockRange,
        token: Option<&Token>,
        trader: Option<Address>,
    ) -> Result<Vec<SellTrade>> {
        let query = LogQuery::new(EventKind::SellTrade, range)
            .with_address(0, token.map(|t| t.address))
            .with_address(1, trader);

        let decoded = self.decode_batch::<abis::SellTrade>(vec![query]).await?;
        let origins = self.origins(&decoded).await?;
        let tokens = self
            .tokens_for(decoded.iter().map(|d| d.event.token), token)
            .await?;

        Ok(decoded
            .into_iter()
            .zip(origins)
            .zip(tokens)
            .map(|((d, origin), token)| SellTrade {
                token,
                trader: d.event.trader,
                native_amount: d.event.ethAmount,
                token_amount: d.event.tokenAmount,
                sell_price: d.event.sellPrice,
                origin,
            })
            .collect())
    }

    /// Swaps in `range` touching `token` on either leg, or made by `trader`.
    ///
    /// At least one filter is required: an unfiltered swap query would pull
    /// every swap on the exchange.
    pub async fn fetch_swaps(
        &self,
        range: BlockRange,
        token: Option<&Token>,
        trader: Option<Address>,
    ) -> Result<Vec<SwapTrade>> {
        let token_address = token.map(|t| t.address);
        if token_address.is_none() && trader.is_none() {
            return Err(MarketError::InvalidInput(
                "swap query needs a token or a trader filter".to_string(),
            ));
        }

        let base = LogQuery::new(EventKind::SwapTrade, range).with_address(2, trader);
        let queries = match token_address {
            Some(address) => vec![
                base.clone().with_address(0, Some(address)),
                base.with_address(1, Some(address)),
            ],
            None => vec![base],
        };

        let decoded = self.decode_batch::<abis::SwapTrade>(queries).await?;
        let origins = self.origins(&decoded).await?;

        // Both legs in one lookup; split back apart by position
        let addresses = decoded
            .iter()
            .flat_map(|d| [d.event.tokenIn, d.event.tokenOut]);
        let mut tokens = self.tokens_for(addresses, token).await?.into_iter();

        let mut swaps = Vec::with_capacity(decoded.len());
        for (d, origin) in decoded.into_iter().zip(origins) {
            let (Some(token_in), Some(token_out)) = (tokens.next(), tokens.next()) else {
                return Err(MarketError::unavailable("swap token metadata missing"));
            };
            swaps.push(SwapTrade {
                token_in,
                token_out,
                trader: d.event.trader,
                amount_in: d.event.amountIn,
                amount_out: d.event.amountOut,
                sell_price: d.event.sellPrice,
                buy_price: d.event.buyPrice,
                origin,
            });
        }
        Ok(swaps)
    }

    pub async fn fetch_deposits(
        &self,
        range: BlockRange,
        token: Option<&Token>,
        user: Option<Address>,
    ) -> Result<Vec<LiquidityEvent>> {
        let query = LogQuery::new(EventKind::Deposit, range)
            .with_address(0, token.map(|t| t.address))
            .with_address(1, user);

        let decoded = self.decode_batch::<abis::Deposit>(vec![query]).await?;
        let origins = self.origins(&decoded).await?;
        let tokens = self
            .tokens_for(decoded.iter().map(|d| d.event.token), token)
            .await?;

        Ok(decoded
            .into_iter()
            .zip(origins)
            .zip(tokens)
            .map(|((d, origin), token)| LiquidityEvent {
                kind: LiquidityKind::Deposit,
                token,
                user: d.event.user,
                native_amount: d.event.ethAmount,
                token_amount: d.event.tokenAmount,
                lp_amount: d.event.lpTokensMinted,
                origin,
            })
            .collect())
    }

    pub async fn fetch_withdraws(
        &self,
        range: BlockRange,
        token: Option<&Token>,
        user: Option<Address>,
    ) -> Result<Vec<LiquidityEvent>> {
        let query = LogQuery::new(EventKind::Withdraw, range)
            .with_address(0, token.map(|t| t.address))
            .with_address(1, user);

        let decoded = self.decode_batch::<abis::Withdraw>(vec![query]).await?;
        let origins = self.origins(&decoded).await?;
        let tokens = self
            .tokens_for(decoded.iter().map(|d| d.event.token), token)
            .await?;

        Ok(decoded
            .into_iter()
            .zip(origins)
            .zip(tokens)
            .map(|((d, origin), token)| LiquidityEvent {
                kind: LiquidityKind::Withdraw,
                token,
                user: d.event.user,
                native_amount: d.event.ethAmount,
                token_amount: d.event.tokenAmount,
                lp_amount: d.event.lpTokensBurned,
                origin,
            })
            .collect())
    }

    /// Run `queries` concurrently and decode the union, ordered by
    /// `(block, log_index)` with duplicates across queries dropped.
    async fn decode_batch<E: SolEvent>(&self, queries: Vec<LogQuery>) -> Result<Vec<Decoded<E>>> {
        let Some(first) = queries.first() else {
            return Ok(Vec::new());
        };
        let (kind, range) = (first.kind, first.range);

        let batches = try_join_all(queries.iter().map(|query| self.chain.logs(query)))
            .await
            .with_context(|| format!("fetching {} logs in {}", kind, range))?;

        let mut seen: FxHashSet<(u64, u64)> = FxHashSet::default();
        let mut decoded = Vec::new();
        for log in batches.into_iter().flatten() {
            let entry = decode_log::<E>(&log).with_context(|| format!("decoding {} log", kind))?;
            if seen.insert((entry.block_number, entry.log_index)) {
                decoded.push(entry);
            }
        }
        decoded.sort_by_key(|d| (d.block_number, d.log_index));

        debug!("Fetched {} {} logs in {}", decoded.len(), kind, range);
        Ok(decoded)
    }

    /// Origin of each decoded log, with one timestamp lookup per distinct
    /// block, all in flight at once. Any failed lookup fails the batch.
    async fn origins<E>(&self, decoded: &[Decoded<E>]) -> Result<Vec<EventOrigin>> {
        let blocks: Vec<u64> = decoded
            .iter()
            .map(|d| d.block_number)
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();

        let timestamps = try_join_all(blocks.iter().map(|block| async move {
            let timestamp = self
                .resolver
                .timestamp_ms(*block)
                .await
                .with_context(|| format!("timestamp of block {}", block))?;
            Ok::<_, MarketError>((*block, timestamp))
        }))
        .await?;
        let timestamps: FxHashMap<u64, u64> = timestamps.into_iter().collect();

        decoded
            .iter()
            .map(|d| {
                let timestamp = timestamps.get(&d.block_number).copied().ok_or_else(|| {
                    MarketError::unavailable(format!("no timestamp for block {}", d.block_number))
                })?;
                Ok(EventOrigin {
                    block_number: d.block_number,
                    log_index: d.log_index,
                    timestamp,
                })
            })
            .collect()
    }

    /// Token metadata for each address in order. A filter token already in
    /// hand is reused rather than looked up.
    async fn tokens_for(
        &self,
        addresses: impl Iterator<Item = Address>,
        known: Option<&Token>,
    ) -> Result<Vec<Token>> {
        let addresses: Vec<Address> = addresses.collect();
        let unknown: Vec<Address> = addresses
            .iter()
            .copied()
            .filter(|address| known.map_or(true, |t| t.address != *address))
            .collect();

        let mut resolved = self.tokens.resolve_many(&unknown).await?.into_iter();

        addresses
            .iter()
            .map(|address| match known {
                Some(token) if token.address == *address => Ok(token.clone()),
                _ => resolved
                    .next()
                    .ok_or_else(|| MarketError::unavailable(format!("no metadata for {}", address))),
            })
            .collect()
    }
}

fn decode_log<E: SolEvent>(log: &Log) -> Result<Decoded<E>> {
    let event = E::decode_log_data(&log.inner.data)
        .map_err(|e| MarketError::unavailable(format!("malformed log: {}", e)))?;

    let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
        return Err(MarketError::unavailable("log without block position"));
    };

    Ok(Decoded {
        event,
        block_number,
        log_index,
    })
}
