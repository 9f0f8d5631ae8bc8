use alloy::primitives::{Address, B256, U256};
use chrono::Utc;
use log::info;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    chain::{ExchangeCall, ExchangeWriter},
    error::{ErrorContext, MarketError, Result},
};

/// A mined exchange transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub submitted_at_ms: u64,
}

/// Write path against the exchange contract.
///
/// Calls that move ERC-20 tokens into the exchange approve the spend first;
/// a failed approval stops the call before anything is submitted.
#[derive(Clone)]
pub struct Trader {
    writer: Arc<dyn ExchangeWriter>,
}

impl Trader {
    pub fn new(writer: Arc<dyn ExchangeWriter>) -> Self {
        Self { writer }
    }

    pub async fn initialize_pool(
        &self,
        token: Address,
        native_amount: U256,
        token_amount: U256,
        initial_buy_price: U256,
        initial_sell_price: U256,
    ) -> Result<TxOutcome> {
        self.execute(
            Some((token, token_amount)),
            ExchangeCall::InitializePool {
                token,
                native_amount,
                token_amount,
                initial_buy_price,
                initial_sell_price,
            },
        )
        .await
    }

    pub async fn deposit(
        &self,
        token: Address,
        native_amount: U256,
        token_amount: U256,
    ) -> Result<TxOutcome> {
        self.execute(
            Some((token, token_amount)),
            ExchangeCall::Deposit {
                token,
                native_amount,
            },
        )
        .await
    }

    /// Burn `lp_amount` of the pool's LP token for its share of reserves.
    pub async fn withdraw(
        &self,
        token: Address,
        lp_token: Address,
        lp_amount: U256,
    ) -> Result<TxOutcome> {
        self.execute(
            Some((lp_token, lp_amount)),
            ExchangeCall::Withdraw { token, lp_amount },
        )
        .await
    }

    pub async fn swap(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        minimum_out: U256,
    ) -> Result<TxOutcome> {
        if token_in == token_out {
            return Err(MarketError::InvalidInput(format!(
                "swap of {} into itself",
                token_in
            )));
        }
        self.execute(
            Some((token_in, amount_in)),
            ExchangeCall::Swap {
                token_in,
                token_out,
                amount_in,
                minimum_out,
            },
        )
        .await
    }

    /// Buy with native currency; no approval involved.
    pub async fn buy(&self, token: Address, native_amount: U256) -> Result<TxOutcome> {
        self.execute(
            None,
            ExchangeCall::Buy {
                token,
                native_amount,
            },
        )
        .await
    }

    pub async fn sell(&self, token: Address, amount: U256) -> Result<TxOutcome> {
        self.execute(Some((token, amount)), ExchangeCall::Sell { token, amount })
            .await
    }

    async fn execute(
        &self,
        approval: Option<(Address, U256)>,
        call: ExchangeCall,
    ) -> Result<TxOutcome> {
        let name = call.name();

        if let Some((token, amount)) = approval {
            self.writer
                .approve(token, amount)
                .await
                .with_context(|| format!("{}: approving {} of {}", name, amount, token))?;
        }

        let submitted_at_ms = Utc::now().timestamp_millis().max(0) as u64;
        let tx_hash = self
            .writer
            .submit(call)
            .await
            .with_context(|| name.to_string())?;

        info!("{} mined in {}", name, tx_hash);
        Ok(TxOutcome {
            tx_hash,
            submitted_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{addr, eth, MockChain};

    #[tokio::test]
    async fn test_sell_approves_then_submits() {
        let chain = Arc::new(MockChain::new());
        let trader = Trader::new(chain.clone());

        let outcome = trader.sell(addr(1), eth(2)).await.unwrap();

        let writes = chain.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].starts_with(&format!("approve {}", addr(1))));
        assert_eq!(writes[1], "sell");
        assert_eq!(outcome.tx_hash, B256::with_last_byte(2));
    }

    #[tokio::test]
    async fn test_buy_needs_no_approval() {
        let chain = Arc::new(MockChain::new());
        let trader = Trader::new(chain.clone());

        trader.buy(addr(1), eth(1)).await.unwrap();

        assert_eq!(chain.writes(), vec!["buy".to_string()]);
    }

    #[tokio::test]
    async fn test_initialize_pool_approves_token_amount() {
        let chain = Arc::new(MockChain::new());
        let trader = Trader::new(chain.clone());

        trader
            .initialize_pool(addr(1), eth(1), eth(10), eth(2), eth(1))
            .await
            .unwrap();

        assert_eq!(
            chain.writes(),
            vec![
                format!("approve {} {}", addr(1), eth(10)),
                "initializePool".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_withdraw_approves_lp_token() {
        let chain = Arc::new(MockChain::new());
        let trader = Trader::new(chain.clone());

        trader.withdraw(addr(1), addr(7), eth(1)).await.unwrap();

        assert!(chain.writes()[0].starts_with(&format!("approve {}", addr(7))));
    }

    #[tokio::test]
    async fn test_failed_approval_skips_submission() {
        let chain = Arc::new(MockChain::new());
        chain.fail_approvals(true);
        let trader = Trader::new(chain.clone());

        let err = trader.swap(addr(1), addr(2), eth(1), eth(0)).await.unwrap_err();

        assert!(matches!(err.root(), MarketError::ApprovalFailed(_)));
        assert!(chain.writes().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_transaction() {
        let chain = Arc::new(MockChain::new());
        chain.reject_submissions(true);
        let trader = Trader::new(chain.clone());

        let err = trader
            .deposit(addr(1), eth(1), eth(100))
            .await
            .unwrap_err();

        assert!(matches!(err.root(), MarketError::TransactionFailed(_)));
        assert!(err.to_string().starts_with("deposit"));
    }

    #[tokio::test]
    async fn test_self_swap_is_rejected_locally() {
        let chain = Arc::new(MockChain::new());
        let trader = Trader::new(chain.clone());

        let swap = trader.swap(addr(1), addr(1), eth(1), eth(0)).await;

        assert!(matches!(swap, Err(MarketError::InvalidInput(_))));
        assert!(chain.writes().is_empty());
    }
}
