use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use async_trait::async_trait;
use std::fmt;

use crate::{
    abis::{BuyTrade, Deposit, SellTrade, SwapTrade, Withdraw},
    error::{MarketError, Result},
    models::{Reserve, Token},
};

/// The five exchange events this crate consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BuyTrade,
    SellTrade,
    SwapTrade,
    Deposit,
    Withdraw,
}

impl EventKind {
    pub fn signature_hash(&self) -> B256 {
        match self {
            EventKind::BuyTrade => BuyTrade::SIGNATURE_HASH,
            EventKind::SellTrade => SellTrade::SIGNATURE_HASH,
            EventKind::SwapTrade => SwapTrade::SIGNATURE_HASH,
            EventKind::Deposit => Deposit::SIGNATURE_HASH,
            EventKind::Withdraw => Withdraw::SIGNATURE_HASH,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::BuyTrade => "BuyTrade",
            EventKind::SellTrade => "SellTrade",
            EventKind::SwapTrade => "SwapTrade",
            EventKind::Deposit => "Deposit",
            EventKind::Withdraw => "Withdraw",
        };
        f.write_str(name)
    }
}

/// Inclusive block range for a log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Result<Self> {
        if from > to {
            return Err(MarketError::InvalidInput(format!(
                "block range start {} is after end {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// One `eth_getLogs` request: a single event signature over a block range,
/// optionally narrowed by up to three indexed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub kind: EventKind,
    pub range: BlockRange,
    pub topics: [Option<B256>; 3],
}

impl LogQuery {
    pub fn new(kind: EventKind, range: BlockRange) -> Self {
        Self {
            kind,
            range,
            topics: [None; 3],
        }
    }

    /// Filter the indexed argument at `position` (0-based, after topic0).
    pub fn with_address(mut self, position: usize, address: Option<Address>) -> Self {
        if let Some(address) = address {
            self.topics[position] = Some(address.into_word());
        }
        self
    }
}

/// Read access to a chain node: blocks, logs and ERC-20 views.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Block timestamp in seconds, `None` if the node has no such block.
    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>>;

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>>;

    async fn token_metadata(&self, token: Address) -> Result<Token>;

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn erc20_total_supply(&self, token: Address) -> Result<U256>;
}

/// Read calls against the exchange contract.
#[async_trait]
pub trait ExchangeReader: Send + Sync {
    async fn reserves(&self, token: Address) -> Result<Reserve>;

    async fn buy_price(&self, token: Address) -> Result<U256>;

    async fn sell_price(&self, token: Address) -> Result<U256>;

    /// Tokens per unit of native currency
    async fn token_ratio(&self, token: Address) -> Result<U256>;

    /// Seconds since epoch of the pool's most recent exchange
    async fn last_exchange_timestamp(&self, token: Address) -> Result<u64>;

    async fn pool_list(&self, start: u64, count: u64) -> Result<Vec<Address>>;

    async fn user_pool_list(&self, user: Address, start: u64, count: u64)
        -> Result<Vec<Address>>;

    async fn user_reserves(&self, token: Address, user: Address) -> Result<Reserve>;
}

/// State-changing calls against the exchange contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeCall {
    InitializePool {
        token: Address,
        native_amount: U256,
        token_amount: U256,
        initial_buy_price: U256,
        initial_sell_price: U256,
    },
    Deposit {
        token: Address,
        native_amount: U256,
    },
    Withdraw {
        token: Address,
        lp_amount: U256,
    },
    Swap {
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        minimum_out: U256,
    },
    Buy {
        token: Address,
        native_amount: U256,
    },
    Sell {
        token: Address,
        amount: U256,
    },
}

impl ExchangeCall {
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeCall::InitializePool { .. } => "initializePool",
            ExchangeCall::Deposit { .. } => "deposit",
            ExchangeCall::Withdraw { .. } => "withdraw",
            ExchangeCall::Swap { .. } => "swap",
            ExchangeCall::Buy { .. } => "buy",
            ExchangeCall::Sell { .. } => "sell",
        }
    }
}

/// Transaction submission. Both calls resolve once the transaction is mined
/// and return its hash; a revert or unmined transaction is an error.
#[async_trait]
pub trait ExchangeWriter: Send + Sync {
    /// Approve the exchange contract to spend `amount` of `token`.
    async fn approve(&self, token: Address, amount: U256) -> Result<B256>;

    async fn submit(&self, call: ExchangeCall) -> Result<B256>;
}
