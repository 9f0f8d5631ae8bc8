use alloy::primitives::Address;
use futures::future::try_join_all;
use log::debug;
use std::sync::Arc;

use crate::{
    chain::ExchangeReader,
    error::{ErrorContext, Result},
    market::{snapshot::liquidity_of, TokenCache},
    models::{PoolRow, Token},
};

/// Paginated pool listings with current prices.
#[derive(Clone)]
pub struct PoolDirectory {
    exchange: Arc<dyn ExchangeReader>,
    tokens: TokenCache,
}

impl PoolDirectory {
    pub fn new(exchange: Arc<dyn ExchangeReader>, tokens: TokenCache) -> Self {
        Self { exchange, tokens }
    }

    pub async fn pools(&self, start: u64, count: u64) -> Result<Vec<PoolRow>> {
        let addresses = self
            .exchange
            .pool_list(start, count)
            .await
            .with_context(|| format!("pool list from {}", start))?;
        self.rows(&addresses).await
    }

    /// Pools `user` has provided liquidity to.
    pub async fn user_pools(&self, user: Address, start: u64, count: u64) -> Result<Vec<PoolRow>> {
        let addresses = self
            .exchange
            .user_pool_list(user, start, count)
            .await
            .with_context(|| format!("pool list of {} from {}", user, start))?;
        self.rows(&addresses).await
    }

    async fn rows(&self, addresses: &[Address]) -> Result<Vec<PoolRow>> {
        let tokens = self.tokens.resolve_many(addresses).await?;
        debug!("Loading {} pool rows", tokens.len());

        try_join_all(tokens.into_iter().map(|token| self.row(token))).await
    }

    async fn row(&self, token: Token) -> Result<PoolRow> {
        let address = token.address;
        let (buy_price, sell_price, reserve) = futures::try_join!(
            self.exchange.buy_price(address),
            self.exchange.sell_price(address),
            self.exchange.reserves(address),
        )
        .with_context(|| format!("pool row for {}", token.symbol))?;

        Ok(PoolRow {
            total_liquidity: liquidity_of(buy_price, sell_price, reserve.token_reserve)?,
            token,
            buy_price,
            sell_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::mock::{addr, eth, MockChain},
        models::Reserve,
    };
    use alloy::primitives::U256;

    fn listed_chain() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new());
        for (byte, symbol) in [(1u8, "AAA"), (2, "BBB"), (3, "CCC")] {
            chain.add_token(addr(byte), symbol);
            chain.set_pool(
                addr(byte),
                Reserve {
                    token_reserve: U256::from(byte as u64 * 10),
                    native_reserve: eth(1),
                },
                eth(2),
                eth(4),
                U256::from(1u64),
                0,
            );
        }
        chain.list_pool(addr(1), &[addr(0xa1)]);
        chain.list_pool(addr(2), &[]);
        chain.list_pool(addr(3), &[addr(0xa1)]);
        chain
    }

    #[tokio::test]
    async fn test_pool_page() {
        let chain = listed_chain();
        let directory = PoolDirectory::new(chain.clone(), TokenCache::new(chain.clone()));

        let rows = directory.pools(1, 10).await.unwrap();

        let symbols: Vec<&str> = rows.iter().map(|r| r.token.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB", "CCC"]);
        assert_eq!(rows[0].total_liquidity, eth(3) * U256::from(20u64));
    }

    #[tokio::test]
    async fn test_user_pools() {
        let chain = listed_chain();
        let directory = PoolDirectory::new(chain.clone(), TokenCache::new(chain.clone()));

        let rows = directory.user_pools(addr(0xa1), 0, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].token.symbol, "CCC");

        assert!(directory.user_pools(addr(0xb0), 0, 10).await.unwrap().is_empty());
    }
}
