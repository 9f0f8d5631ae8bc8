use alloy::{
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::{Address, B256, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::{Filter, Log},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use log::{debug, info};
use std::{fmt, future::IntoFuture, time::Duration};
use url::Url;

use crate::{
    abis::{IMaelstrom, IERC20},
    chain::{ChainSource, ExchangeCall, ExchangeReader, ExchangeWriter, LogQuery},
    config::RpcSettings,
    error::{MarketError, Result},
    models::{Reserve, Token},
};

/// JSON-RPC client for the node and the exchange contract.
///
/// Every call is bounded by the configured timeout; a timeout or transport
/// failure surfaces as [`MarketError::DataUnavailable`].
#[derive(Clone)]
pub struct RpcClient {
    provider: DynProvider,
    exchange: Address,
    timeout: Duration,
    can_sign: bool,
}

impl RpcClient {
    pub fn new(settings: &RpcSettings) -> Result<Self> {
        let url = Url::parse(&settings.url)
            .map_err(|e| MarketError::InvalidInput(format!("invalid RPC URL: {}", e)))?;

        let exchange: Address = settings.exchange_address.parse().map_err(|e| {
            MarketError::InvalidInput(format!("invalid exchange address: {}", e))
        })?;

        let (provider, can_sign) = match &settings.private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .parse()
                    .map_err(|e| MarketError::InvalidInput(format!("invalid private key: {}", e)))?;
                info!("Signer {} configured for exchange writes", signer.address());
                let client = ProviderBuilder::new().wallet(signer).connect_http(url);
                (DynProvider::new(client), true)
            },
            None => {
                let client = ProviderBuilder::new().connect_http(url);
                (DynProvider::new(client), false)
            },
        };

        Ok(Self::from_provider(
            provider,
            exchange,
            Duration::from_millis(settings.timeout_ms),
            can_sign,
        ))
    }

    pub(crate) fn from_provider(
        provider: DynProvider,
        exchange: Address,
        timeout: Duration,
        can_sign: bool,
    ) -> Self {
        Self {
            provider,
            exchange,
            timeout,
            can_sign,
        }
    }

    pub fn exchange_address(&self) -> Address {
        self.exchange
    }

    /// Run `call` under the per-call timeout, flattening failure to a message.
    async fn bounded<F, T, E>(&self, what: &str, call: F) -> std::result::Result<T, String>
    where
        F: IntoFuture<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{}: {}", what, e)),
            Err(_) => Err(format!("{}: timed out after {:?}", what, self.timeout)),
        }
    }

    /// Bounded read call; any failure is `DataUnavailable`.
    async fn timed<F, T, E>(&self, what: &str, call: F) -> Result<T>
    where
        F: IntoFuture<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        self.bounded(what, call)
            .await
            .map_err(MarketError::DataUnavailable)
    }

    fn contract(&self) -> IMaelstrom::IMaelstromInstance<&DynProvider> {
        IMaelstrom::new(self.exchange, &self.provider)
    }

    fn ensure_signer(&self) -> Result<()> {
        if self.can_sign {
            Ok(())
        } else {
            Err(MarketError::InvalidInput(
                "no private key configured for writes".to_string(),
            ))
        }
    }

    /// Wait for the receipt, bounded by the call timeout, and insist on
    /// success status.
    async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Ethereum>,
        what: &str,
    ) -> std::result::Result<B256, String> {
        let tx_hash = *pending.tx_hash();
        debug!("{} submitted as {}", what, tx_hash);

        let receipt = self
            .bounded(
                &format!("{} {} not mined", what, tx_hash),
                pending.get_receipt(),
            )
            .await?;

        if !receipt.status() {
            return Err(format!("{} {} reverted", what, tx_hash));
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl ChainSource for RpcClient {
    async fn latest_block(&self) -> Result<u64> {
        self.timed("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>> {
        let block = self
            .timed(
                "eth_getBlockByNumber",
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(number)),
            )
            .await?;
        Ok(block.map(|b| b.header.timestamp))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let mut filter = Filter::new()
            .address(self.exchange)
            .event_signature(query.kind.signature_hash())
            .from_block(query.range.from)
            .to_block(query.range.to);

        if let Some(topic) = query.topics[0] {
            filter = filter.topic1(topic);
        }
        if let Some(topic) = query.topics[1] {
            filter = filter.topic2(topic);
        }
        if let Some(topic) = query.topics[2] {
            filter = filter.topic3(topic);
        }

        self.timed("eth_getLogs", self.provider.get_logs(&filter))
            .await
    }

    async fn token_metadata(&self, token: Address) -> Result<Token> {
        let contract = IERC20::new(token, &self.provider);
        let decimals_call = contract.decimals();
        let name_call = contract.name();
        let symbol_call = contract.symbol();

        let (decimals, name, symbol) = futures::try_join!(
            self.timed("decimals", decimals_call.call()),
            self.timed("name", name_call.call()),
            self.timed("symbol", symbol_call.call()),
        )?;

        Ok(Token::new(token, symbol, name, decimals))
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let contract = IERC20::new(token, &self.provider);
        self.timed("balanceOf", contract.balanceOf(owner).call())
            .await
    }

    async fn erc20_total_supply(&self, token: Address) -> Result<U256> {
        let contract = IERC20::new(token, &self.provider);
        self.timed("totalSupply", contract.totalSupply().call())
            .await
    }
}

#[async_trait]
impl ExchangeReader for RpcClient {
    async fn reserves(&self, token: Address) -> Result<Reserve> {
        let reserves = self
            .timed("reserves", self.contract().reserves(token).call())
            .await?;
        Ok(Reserve {
            token_reserve: reserves.tokenReserve,
            native_reserve: reserves.ethReserve,
        })
    }

    async fn buy_price(&self, token: Address) -> Result<U256> {
        self.timed("priceBuy", self.contract().priceBuy(token).call())
            .await
    }

    async fn sell_price(&self, token: Address) -> Result<U256> {
        self.timed("priceSell", self.contract().priceSell(token).call())
            .await
    }

    async fn token_ratio(&self, token: Address) -> Result<U256> {
        self.timed(
            "tokenPerETHRatio",
            self.contract().tokenPerETHRatio(token).call(),
        )
        .await
    }

    async fn last_exchange_timestamp(&self, token: Address) -> Result<u64> {
        let pool = self
            .timed("pools", self.contract().pools(token).call())
            .await?;
        u64::try_from(pool.lastExchangeTs)
            .map_err(|_| MarketError::unavailable("pools: last exchange timestamp out of range"))
    }

    async fn pool_list(&self, start: u64, count: u64) -> Result<Vec<Address>> {
        self.timed(
            "getPoolList",
            self.contract()
                .getPoolList(U256::from(start), U256::from(count))
                .call(),
        )
        .await
    }

    async fn user_pool_list(
        &self,
        user: Address,
        start: u64,
        count: u64,
    ) -> Result<Vec<Address>> {
        self.timed(
            "getUserPools",
            self.contract()
                .getUserPools(user, U256::from(start), U256::from(count))
                .call(),
        )
        .await
    }

    async fn user_reserves(&self, token: Address, user: Address) -> Result<Reserve> {
        let balances = self
            .timed(
                "poolUserBalances",
                self.contract().poolUserBalances(token, user).call(),
            )
            .await?;
        Ok(Reserve {
            token_reserve: balances.tokenBalance,
            native_reserve: balances.ethBalance,
        })
    }
}

#[async_trait]
impl ExchangeWriter for RpcClient {
    async fn approve(&self, token: Address, amount: U256) -> Result<B256> {
        self.ensure_signer()?;
        let contract = IERC20::new(token, &self.provider);
        let approve_call = contract.approve(self.exchange, amount);

        let pending = self
            .bounded(&format!("approve {}", token), approve_call.send())
            .await
            .map_err(MarketError::ApprovalFailed)?;

        self.confirm(pending, "approve")
            .await
            .map_err(MarketError::ApprovalFailed)
    }

    async fn submit(&self, call: ExchangeCall) -> Result<B256> {
        self.ensure_signer()?;
        let name = call.name();
        let contract = self.contract();

        let send = async {
            match call {
                ExchangeCall::InitializePool {
                    token,
                    native_amount,
                    token_amount,
                    initial_buy_price,
                    initial_sell_price,
                } => {
                    contract
                        .initializePool(token, token_amount, initial_buy_price, initial_sell_price)
                        .value(native_amount)
                        .send()
                        .await
                },
                ExchangeCall::Deposit {
                    token,
                    native_amount,
                } => contract.deposit(token).value(native_amount).send().await,
                ExchangeCall::Withdraw { token, lp_amount } => {
                    contract.withdraw(token, lp_amount).send().await
                },
                ExchangeCall::Swap {
                    token_in,
                    token_out,
                    amount_in,
                    minimum_out,
                } => {
                    contract
                        .swap(token_in, token_out, amount_in, minimum_out)
                        .send()
                        .await
                },
                ExchangeCall::Buy {
                    token,
                    native_amount,
                } => contract.buy(token).value(native_amount).send().await,
                ExchangeCall::Sell { token, amount } => contract.sell(token, amount).send().await,
            }
        };

        let pending = self
            .bounded(name, send)
            .await
            .map_err(MarketError::TransactionFailed)?;

        self.confirm(pending, name)
            .await
            .map_err(MarketError::TransactionFailed)
    }
}
