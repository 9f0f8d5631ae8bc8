use chrono::Utc;
use log::debug;
use std::time::Duration;

use crate::{
    error::{ErrorContext, MarketError, Result},
    market::BlockTimestampResolver,
};

/// Finds the block at the start of a look-back window by binary search over
/// block numbers, at O(log latest) timestamp lookups.
#[derive(Clone)]
pub struct BlockLocator {
    resolver: BlockTimestampResolver,
}

impl BlockLocator {
    pub fn new(resolver: BlockTimestampResolver) -> Self {
        Self { resolver }
    }

    /// [`BlockLocator::locate`] against the current wall-clock time.
    pub async fn locate_window_start(&self, latest: u64, window: Duration) -> Result<u64> {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        self.locate(latest, window, now_ms).await
    }

    /// Highest block in `[0, latest]` whose timestamp is at least `window`
    /// older than `now_ms`.
    ///
    /// The search keeps the lower bound whenever a block is too young, so the
    /// result is never younger than the window. If every block is younger the
    /// search settles on block 0.
    pub async fn locate(&self, latest: u64, window: Duration, now_ms: u64) -> Result<u64> {
        let window_ms = u64::try_from(window.as_millis())
            .map_err(|_| MarketError::InvalidInput(format!("window {:?} too large", window)))?;
        let mut low = 0u64;
        let mut high = latest;

        while low < high {
            let mid = low + (high - low + 1) / 2;
            let mid_ms = self
                .resolver
                .timestamp_ms(mid)
                .await
                .with_context(|| format!("locating block {:?} before now", window))?;

            if now_ms.saturating_sub(mid_ms) < window_ms {
                high = mid - 1;
            } else {
                low = mid;
            }
        }

        debug!("Window of {:?} starts at block {} (latest {})", window, low, latest);
        Ok(low)
    }
}
