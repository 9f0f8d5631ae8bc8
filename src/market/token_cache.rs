use alloy::primitives::Address;
use futures::future::try_join_all;
use log::debug;
use moka::future::Cache;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::{
    chain::ChainSource,
    error::{ErrorContext, Result},
    models::Token,
};

/// Session-scoped token metadata cache.
///
/// Entries are never evicted: token metadata is immutable on chain, so the
/// cache lives exactly as long as the owning fetcher.
#[derive(Clone)]
pub struct TokenCache {
    chain: Arc<dyn ChainSource>,
    tokens: Cache<Address, Token>,
}

impl TokenCache {
    pub fn new(chain: Arc<dyn ChainSource>) -> Self {
        Self {
            chain,
            tokens: Cache::builder().build(),
        }
    }

    pub async fn resolve(&self, address: Address) -> Result<Token> {
        let mut tokens = self.resolve_many(&[address]).await?;
        Ok(tokens.remove(0))
    }

    /// Metadata for every address, in input order.
    ///
    /// Each distinct uncached address is looked up once, concurrently with the
    /// others. Any failed lookup fails the whole call and nothing from that
    /// call is cached.
    pub async fn resolve_many(&self, addresses: &[Address]) -> Result<Vec<Token>> {
        let mut known: FxHashMap<Address, Token> = FxHashMap::default();
        let mut missing: Vec<Address> = Vec::new();
        let mut seen: FxHashSet<Address> = FxHashSet::default();

        for address in addresses {
            if !seen.insert(*address) {
                continue;
            }
            match self.tokens.get(address).await {
                Some(token) => {
                    known.insert(*address, token);
                },
                None => missing.push(*address),
            }
        }

        if !missing.is_empty() {
            debug!("Fetching metadata for {} uncached tokens", missing.len());

            let fetched = try_join_all(missing.iter().map(|address| async move {
                self.chain
                    .token_metadata(*address)
                    .await
                    .with_context(|| format!("token metadata for {}", address))
            }))
            .await?;

            for token in fetched {
                self.tokens.insert(token.address, token.clone()).await;
                known.insert(token.address, token);
            }
        }

        Ok(addresses
            .iter()
            .filter_map(|address| known.get(address).cloned())
            .collect())
    }

    pub fn len(&self) -> u64 {
        self.tokens.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
