use std::sync::Arc;

use crate::{
    chain::ChainSource,
    error::{MarketError, Result},
};

/// Maps a block number to its wall-clock timestamp in milliseconds.
#[derive(Clone)]
pub struct BlockTimestampResolver {
    chain: Arc<dyn ChainSource>,
}

impl BlockTimestampResolver {
    pub fn new(chain: Arc<dyn ChainSource>) -> Self {
        Self { chain }
    }

    /// Block timestamp in milliseconds.
    ///
    /// A block the node cannot return (pruned, not yet produced) is
    /// `DataUnavailable`, never a default.
    pub async fn timestamp_ms(&self, block_number: u64) -> Result<u64> {
        let seconds = self
            .chain
            .block_timestamp(block_number)
            .await?
            .ok_or_else(|| {
                MarketError::unavailable(format!("block {} not returned by node", block_number))
            })?;

        seconds
            .checked_mul(1000)
            .ok_or(MarketError::Overflow("block timestamp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;

    #[tokio::test]
    async fn test_timestamp_is_seconds_times_1000() {
        let chain = Arc::new(MockChain::with_blocks(3, 1_700_000_000, 12));
        let resolver = BlockTimestampResolver::new(chain);

        assert_eq!(resolver.timestamp_ms(2).await.unwrap(), 1_700_000_024_000);
    }

    #[tokio::test]
    async fn test_missing_block_is_data_unavailable() {
        let chain = Arc::new(MockChain::with_blocks(3, 1_700_000_000, 12));
        let resolver = BlockTimestampResolver::new(chain);

        let err = resolver.timestamp_ms(99).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn test_node_failure_propagates() {
        let chain = Arc::new(MockChain::with_blocks(3, 1_700_000_000, 12));
        chain.fail_timestamps(true);
        let resolver = BlockTimestampResolver::new(chain);

        assert!(resolver.timestamp_ms(1).await.unwrap_err().is_data_unavailable());
    }
}
