//! What the Rosetta backends need from an avalanchego node.
//!
//! Backends only see the [`PChainClient`] and [`EvmClient`] traits; the
//! JSON-RPC implementation lives in [`rpc`]. Raw transactions, blocks and
//! UTXOs cross this boundary as codec bytes and are decoded by the caller.

pub mod rpc;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::json_rpc::JsonError;
use crate::protocol::address::EvmAddress;
use crate::protocol::ids::Id;
use crate::protocol::ids::NodeId;
use crate::protocol::ids::ShortId;

pub use rpc::RpcNodeClient;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Rpc(#[from] JsonError),

    #[error("{method} timed out after {timeout:?}")]
    Timeout { method: &'static str, timeout: Duration },

    #[error("unexpected response to {method}: {reason}")]
    Decode { method: &'static str, reason: String },

    #[error("{0} not found")]
    NotFound(String),
}

impl ClientError {
    pub(crate) fn decode(method: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            method,
            reason: reason.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Position after the last UTXO of a page; passed back to fetch the next.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UtxoCursor {
    pub address: String,
    pub utxo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UtxoPage {
    pub utxos: Vec<Vec<u8>>,
    pub end_index: UtxoCursor,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StakeInfo {
    /// Staked amount per asset.
    pub staked: HashMap<Id, u64>,
    /// Codec-encoded transferable outputs currently staked.
    pub outputs: Vec<Vec<u8>>,
}

/// One accepted P-chain block as stored by the node's index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Container {
    pub id: Id,
    pub bytes: Vec<u8>,
    /// Unix nanoseconds at which the node accepted the container.
    pub timestamp: i64,
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetDescription {
    pub asset_id: Id,
    pub name: String,
    pub symbol: String,
    pub denomination: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerInfo {
    pub node_id: String,
    /// Every other field the node reports about the peer.
    pub metadata: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrentDelegator {
    pub reward_owner: Vec<ShortId>,
    pub potential_reward: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrentValidator {
    pub node_id: NodeId,
    pub validation_reward_owner: Vec<ShortId>,
    pub potential_reward: u64,
    /// Percentage, e.g. `2.0` for 2 %.
    pub delegation_fee: f64,
    pub delegators: Vec<CurrentDelegator>,
}

/// Genesis state of the P-chain, as raw codec bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenesisInfo {
    pub message: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub utxos: Vec<Vec<u8>>,
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvmHeader {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub difficulty: u64,
    pub nonce: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvmBlock {
    pub header: EvmHeader,
    pub transactions: Vec<String>,
}

/// Node calls served by the platform chain and the node-wide APIs.
#[async_trait]
pub trait PChainClient: Send + Sync {
    async fn get_height(&self) -> ClientResult<u64>;

    async fn get_network_id(&self) -> ClientResult<u32>;

    async fn get_blockchain_id(&self, alias: &str) -> ClientResult<Id>;

    async fn is_bootstrapped(&self, chain: &str) -> ClientResult<bool>;

    async fn peers(&self) -> ClientResult<Vec<PeerInfo>>;

    async fn node_version(&self) -> ClientResult<String>;

    async fn get_tx(&self, tx_id: Id) -> ClientResult<Vec<u8>>;

    async fn get_reward_utxos(&self, tx_id: Id) -> ClientResult<Vec<Vec<u8>>>;

    /// UTXOs of `addrs` on the P-chain, or in its shared memory with
    /// `source_chain` when that names another chain.
    async fn get_atomic_utxos(
        &self,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage>;

    async fn get_stake(&self, addrs: &[String]) -> ClientResult<StakeInfo>;

    async fn get_container_by_index(&self, index: u64) -> ClientResult<Container>;

    async fn get_container_by_id(&self, id: Id) -> ClientResult<Container>;

    /// Block bytes by block id, without the proposer wrapper.
    async fn get_block(&self, block_id: Id) -> ClientResult<Vec<u8>>;

    async fn get_current_validators(&self, node_ids: &[NodeId]) -> ClientResult<Vec<CurrentValidator>>;

    async fn get_asset_description(&self, asset: &str) -> ClientResult<AssetDescription>;

    async fn issue_tx(&self, tx: &[u8]) -> ClientResult<Id>;

    async fn get_genesis(&self) -> ClientResult<GenesisInfo>;
}

/// Node calls served by the C-chain, both its EVM and its `avax` API.
#[async_trait]
pub trait EvmClient: Send + Sync {
    async fn chain_id(&self) -> ClientResult<u64>;

    async fn get_network_id(&self) -> ClientResult<u32>;

    async fn get_blockchain_id(&self, alias: &str) -> ClientResult<Id>;

    async fn is_bootstrapped(&self, chain: &str) -> ClientResult<bool>;

    async fn peers(&self) -> ClientResult<Vec<PeerInfo>>;

    async fn node_version(&self) -> ClientResult<String>;

    /// Header at `number`, or the chain head.
    async fn header_by_number(&self, number: Option<u64>) -> ClientResult<EvmHeader>;

    async fn block_by_number(&self, number: Option<u64>) -> ClientResult<EvmBlock>;

    async fn block_by_hash(&self, hash: &str) -> ClientResult<EvmBlock>;

    async fn nonce_at(&self, address: &EvmAddress, number: Option<u64>) -> ClientResult<u64>;

    /// Balance in wei.
    async fn balance_at(&self, address: &EvmAddress, number: Option<u64>) -> ClientResult<u128>;

    /// Base fee of the next block in wei.
    async fn estimate_base_fee(&self) -> ClientResult<u128>;

    /// Hashes of the pending pool transactions.
    async fn txpool_content(&self) -> ClientResult<Vec<String>>;

    /// Shared-memory UTXOs of C-chain addresses exported from `source_chain`.
    async fn get_atomic_utxos(
        &self,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage>;

    async fn issue_tx(&self, tx: &[u8]) -> ClientResult<Id>;
}
