//! In-memory chain used by unit tests.

use alloy::{
    primitives::{Address, LogData, B256, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::sync::Notify;

use crate::{
    abis::{BuyTrade, Deposit, SellTrade, SwapTrade, Withdraw},
    chain::{ChainSource, EventKind, ExchangeCall, ExchangeReader, ExchangeWriter, LogQuery},
    error::{MarketError, Result},
    models::{Reserve, Token},
};

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn eth(units: u64) -> U256 {
    U256::from(units) * U256::from(10u64).pow(U256::from(18))
}

#[derive(Default)]
struct PoolState {
    reserve: Reserve,
    buy_price: U256,
    sell_price: U256,
    token_ratio: U256,
    last_exchange_secs: u64,
}

#[derive(Default)]
pub struct MockChain {
    /// Block timestamps in seconds, indexed by block number
    blocks: Mutex<Vec<u64>>,
    logs: Mutex<Vec<Log>>,
    tokens: Mutex<FxHashMap<Address, Token>>,
    balances: Mutex<FxHashMap<(Address, Address), U256>>,
    supplies: Mutex<FxHashMap<Address, U256>>,
    pools: Mutex<FxHashMap<Address, PoolState>>,
    pool_list: Mutex<Vec<Address>>,
    user_pools: Mutex<FxHashMap<Address, Vec<Address>>>,
    writes: Mutex<Vec<String>>,
    fail_timestamps: Mutex<bool>,
    fail_logs: Mutex<bool>,
    fail_metadata: Mutex<bool>,
    /// While set, `logs` parks until the gate is released
    log_gate: Mutex<Option<Arc<Notify>>>,
    fail_approvals: Mutex<bool>,
    reject_submissions: Mutex<bool>,
    next_log_index: AtomicUsize,
    pub timestamp_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub log_calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain whose block `n` has timestamp `start + n * interval` seconds.
    pub fn with_blocks(count: u64, start_secs: u64, interval_secs: u64) -> Self {
        let chain = Self::new();
        chain.set_blocks((0..count).map(|n| start_secs + n * interval_secs).collect());
        chain
    }

    pub fn set_blocks(&self, timestamps: Vec<u64>) {
        *self.blocks.lock().unwrap() = timestamps;
    }

    pub fn add_token(&self, address: Address, symbol: &str) -> Token {
        let token = Token::new(address, symbol.to_string(), format!("{} Token", symbol), 18);
        self.tokens.lock().unwrap().insert(address, token.clone());
        token
    }

    pub fn set_lp(&self, token: Address, user: Address, balance: U256, supply: U256) {
        self.balances.lock().unwrap().insert((token, user), balance);
        self.supplies.lock().unwrap().insert(token, supply);
    }

    pub fn set_pool(
        &self,
        token: Address,
        reserve: Reserve,
        buy_price: U256,
        sell_price: U256,
        token_ratio: U256,
        last_exchange_secs: u64,
    ) {
        self.pools.lock().unwrap().insert(
            token,
            PoolState {
                reserve,
                buy_price,
                sell_price,
                token_ratio,
                last_exchange_secs,
            },
        );
    }

    pub fn list_pool(&self, token: Address, users: &[Address]) {
        self.pool_list.lock().unwrap().push(token);
        let mut user_pools = self.user_pools.lock().unwrap();
        for user in users {
            user_pools.entry(*user).or_default().push(token);
        }
    }

    pub fn fail_timestamps(&self, fail: bool) {
        *self.fail_timestamps.lock().unwrap() = fail;
    }

    pub fn fail_logs(&self, fail: bool) {
        *self.fail_logs.lock().unwrap() = fail;
    }

    pub fn fail_metadata(&self, fail: bool) {
        *self.fail_metadata.lock().unwrap() = fail;
    }

    pub fn hold_logs(&self) {
        *self.log_gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    pub fn release_logs(&self) {
        if let Some(gate) = self.log_gate.lock().unwrap().take() {
            gate.notify_waiters();
        }
    }

    pub fn fail_approvals(&self, fail: bool) {
        *self.fail_approvals.lock().unwrap() = fail;
    }

    pub fn reject_submissions(&self, reject: bool) {
        *self.reject_submissions.lock().unwrap() = reject;
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn push_event<E: SolEvent>(&self, event: &E, block_number: u64) {
        let data: LogData = event.encode_log_data();
        let log_index = self.next_log_index.fetch_add(1, Ordering::SeqCst) as u64;
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0xee),
                data,
            },
            block_number: Some(block_number),
            log_index: Some(log_index),
            ..Default::default()
        };
        self.logs.lock().unwrap().push(log);
    }

    pub fn push_buy(&self, token: Address, trader: Address, native: U256, price: U256, block: u64) {
        self.push_event(
            &BuyTrade {
                token,
                trader,
                ethAmount: native,
                tokenAmount: U256::from(1u64),
                buyPrice: price,
            },
            block,
        );
    }

    pub fn push_sell(&self, token: Address, trader: Address, native: U256, price: U256, block: u64) {
        self.push_event(
            &SellTrade {
                token,
                trader,
                ethAmount: native,
                tokenAmount: U256::from(1u64),
                sellPrice: price,
            },
            block,
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_swap(
        &self,
        token_in: Address,
        token_out: Address,
        trader: Address,
        amount_in: U256,
        amount_out: U256,
        sell_price: U256,
        buy_price: U256,
        block: u64,
    ) {
        self.push_event(
            &SwapTrade {
                tokenIn: token_in,
                tokenOut: token_out,
                trader,
                amountIn: amount_in,
                amountOut: amount_out,
                sellPrice: sell_price,
                buyPrice: buy_price,
            },
            block,
        );
    }

    pub fn push_deposit(&self, token: Address, user: Address, native: U256, lp: U256, block: u64) {
        self.push_event(
            &Deposit {
                token,
                user,
                ethAmount: native,
                tokenAmount: U256::from(1u64),
                lpTokensMinted: lp,
            },
            block,
        );
    }

    pub fn push_withdraw(&self, token: Address, user: Address, native: U256, lp: U256, block: u64) {
        self.push_event(
            &Withdraw {
                token,
                user,
                ethAmount: native,
                tokenAmount: U256::from(1u64),
                lpTokensBurned: lp,
            },
            block,
        );
    }

    fn pool<T>(&self, token: Address, read: impl FnOnce(&PoolState) -> T) -> Result<T> {
        self.pools
            .lock()
            .unwrap()
            .get(&token)
            .map(read)
            .ok_or_else(|| MarketError::unavailable(format!("no pool for {}", token)))
    }
}

fn matches_topics(log: &Log, kind: EventKind, topics: &[Option<B256>; 3]) -> bool {
    let log_topics = log.inner.data.topics();
    if log_topics.first() != Some(&kind.signature_hash()) {
        return false;
    }
    topics.iter().enumerate().all(|(i, wanted)| match wanted {
        Some(topic) => log_topics.get(i + 1) == Some(topic),
        None => true,
    })
}

#[async_trait]
impl ChainSource for MockChain {
    async fn latest_block(&self) -> Result<u64> {
        let blocks = self.blocks.lock().unwrap();
        if blocks.is_empty() {
            return Err(MarketError::unavailable("empty chain"));
        }
        Ok(blocks.len() as u64 - 1)
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>> {
        self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_timestamps.lock().unwrap() {
            return Err(MarketError::unavailable("eth_getBlockByNumber: node unreachable"));
        }
        tokio::task::yield_now().await;
        Ok(self.blocks.lock().unwrap().get(number as usize).copied())
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let gate = self.log_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let released = gate.notified();
            self.log_calls.fetch_add(1, Ordering::SeqCst);
            released.await;
        } else {
            self.log_calls.fetch_add(1, Ordering::SeqCst);
        }
        if *self.fail_logs.lock().unwrap() {
            return Err(MarketError::unavailable("eth_getLogs: node unreachable"));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                block >= query.range.from && block <= query.range.to
            })
            .filter(|log| matches_topics(log, query.kind, &query.topics))
            .cloned()
            .collect())
    }

    async fn token_metadata(&self, token: Address) -> Result<Token> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if *self.fail_metadata.lock().unwrap() {
            return Err(MarketError::unavailable(format!("symbol: {} reverted", token)));
        }
        self.tokens
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or_else(|| MarketError::unavailable(format!("decimals: {} is not a token", token)))
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn erc20_total_supply(&self, token: Address) -> Result<U256> {
        Ok(self
            .supplies
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExchangeReader for MockChain {
    async fn reserves(&self, token: Address) -> Result<Reserve> {
        self.pool(token, |p| p.reserve)
    }

    async fn buy_price(&self, token: Address) -> Result<U256> {
        self.pool(token, |p| p.buy_price)
    }

    async fn sell_price(&self, token: Address) -> Result<U256> {
        self.pool(token, |p| p.sell_price)
    }

    async fn token_ratio(&self, token: Address) -> Result<U256> {
        self.pool(token, |p| p.token_ratio)
    }

    async fn last_exchange_timestamp(&self, token: Address) -> Result<u64> {
        self.pool(token, |p| p.last_exchange_secs)
    }

    async fn pool_list(&self, start: u64, count: u64) -> Result<Vec<Address>> {
        Ok(self
            .pool_list
            .lock()
            .unwrap()
            .iter()
            .skip(start as usize)
            .take(count as usize)
            .copied()
            .collect())
    }

    async fn user_pool_list(
        &self,
        user: Address,
        start: u64,
        count: u64,
    ) -> Result<Vec<Address>> {
        Ok(self
            .user_pools
            .lock()
            .unwrap()
            .get(&user)
            .map(|pools| {
                pools
                    .iter()
                    .skip(start as usize)
                    .take(count as usize)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn user_reserves(&self, token: Address, _user: Address) -> Result<Reserve> {
        self.pool(token, |p| p.reserve)
    }
}

#[async_trait]
impl ExchangeWriter for MockChain {
    async fn approve(&self, token: Address, amount: U256) -> Result<B256> {
        if *self.fail_approvals.lock().unwrap() {
            return Err(MarketError::ApprovalFailed(format!("approve {}: rejected", token)));
        }
        let mut writes = self.writes.lock().unwrap();
        writes.push(format!("approve {} {}", token, amount));
        Ok(B256::with_last_byte(writes.len() as u8))
    }

    async fn submit(&self, call: ExchangeCall) -> Result<B256> {
        if *self.reject_submissions.lock().unwrap() {
            return Err(MarketError::TransactionFailed(format!("{}: reverted", call.name())));
        }
        let mut writes = self.writes.lock().unwrap();
        writes.push(call.name().to_string());
        Ok(B256::with_last_byte(writes.len() as u8))
    }
}
