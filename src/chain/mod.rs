//! RPC boundary: the traits the aggregation layer reads and writes through,
//! and their alloy-backed implementation.

#[cfg(test)]
pub(crate) mod mock;
mod rpc;
mod source;

pub use rpc::RpcClient;
pub use source::{
    BlockRange, ChainSource, EventKind, ExchangeCall, ExchangeReader, ExchangeWriter, LogQuery,
};
