//! In-memory stand-ins for the node, answering from canned chain state and
//! recording what was asked of them.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;

use super::avax_asset_id;
use super::avax_output;
use super::short_id;
use super::ShortIdSeed;
use super::C_CHAIN_ID;
use super::EVM_NONCE;
use super::GENESIS_TIMESTAMP;
use super::NODE_VERSION;
use super::X_CHAIN_ID;
use crate::client::AssetDescription;
use crate::client::ClientError;
use crate::client::ClientResult;
use crate::client::Container;
use crate::client::CurrentValidator;
use crate::client::EvmBlock;
use crate::client::EvmClient;
use crate::client::EvmHeader;
use crate::client::GenesisInfo;
use crate::client::PChainClient;
use crate::client::PeerInfo;
use crate::client::StakeInfo;
use crate::client::UtxoCursor;
use crate::client::UtxoPage;
use crate::mapper::AVAX_SYMBOL;
use crate::protocol::address::ChainAlias;
use crate::protocol::address::EvmAddress;
use crate::protocol::avax::Utxo;
use crate::protocol::avax::UtxoId;
use crate::protocol::codec::CodecManager;
use crate::protocol::codec::Pack;
use crate::protocol::codec::CODEC_VERSION;
use crate::protocol::ids::Id;
use crate::protocol::ids::NodeId;
use crate::protocol::platformvm::block::BlockKind;
use crate::protocol::platformvm::Block;
use crate::protocol::platformvm::Tx;

const DEFAULT_PAGE_SIZE: u32 = 1024;

const DEFAULT_BASE_FEE: u128 = 25_000_000_000;

/// Id of the P-chain genesis block, the parent of height one.
const GENESIS_BLOCK_ID: Id = Id([0x6e; 32]);

fn encode<T: Pack>(value: &T) -> Vec<u8> {
    CodecManager::default().marshal(CODEC_VERSION, value).unwrap()
}

fn encoded_utxo(utxo_id: UtxoId, owner: ShortIdSeed, amount: u64, locktime: u64) -> Vec<u8> {
    let output = avax_output(owner, amount, locktime);
    encode(&Utxo {
        utxo_id,
        asset_id: output.asset_id,
        out: output.out,
    })
}

/// The page of `all` after `cursor`; the cursor carries the offset.
fn page(all: &[Vec<u8>], addrs: &[String], limit: u32, cursor: Option<&UtxoCursor>) -> UtxoPage {
    let start = cursor.map_or(0, |cursor| cursor.utxo.parse::<usize>().unwrap());
    let end = all.len().min(start + limit as usize);
    UtxoPage {
        utxos: all[start..end].to_vec(),
        end_index: UtxoCursor {
            address: addrs.first().cloned().unwrap_or_default(),
            utxo: end.to_string(),
        },
    }
}

fn blockchain_id(alias: &str) -> ClientResult<Id> {
    match alias.parse::<ChainAlias>() {
        Ok(ChainAlias::P) => Ok(Id::EMPTY),
        Ok(ChainAlias::C) => Ok(C_CHAIN_ID),
        Ok(ChainAlias::X) => Ok(X_CHAIN_ID),
        _ => Err(ClientError::NotFound(format!("chain {alias}"))),
    }
}

fn mock_peers() -> Vec<PeerInfo> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("ip".to_owned(), "127.0.0.1:9651".into());
    vec![PeerInfo {
        node_id: NodeId(short_id(ShortIdSeed::C)).to_string(),
        metadata,
    }]
}

#[derive(Debug, Default)]
struct CallLog {
    calls: Mutex<Vec<&'static str>>,
    utxo_sources: Mutex<Vec<String>>,
    issued: Mutex<Vec<Vec<u8>>>,
}

impl CallLog {
    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }

    fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| **m == method).count()
    }

    fn utxo_source(&self, source_chain: &str) {
        self.record("get_atomic_utxos");
        self.utxo_sources.lock().unwrap().push(source_chain.to_owned());
    }

    fn issue(&self, tx: &[u8]) -> Id {
        self.record("issue_tx");
        self.issued.lock().unwrap().push(tx.to_vec());
        Id::of(tx)
    }
}

/// A P-chain with Apricot standard blocks and the UTXOs of a single page
/// of accounts.
#[derive(Debug, Default)]
pub struct MockPChain {
    txs: HashMap<Id, Vec<u8>>,
    delay: Option<Duration>,
    genesis_utxos: Vec<Vec<u8>>,
    /// Block bytes; entry `i` is height `i + 1`.
    blocks: Vec<Vec<u8>>,
    heights: Mutex<VecDeque<u64>>,
    utxos: Vec<Vec<u8>>,
    stake_outputs: Vec<Vec<u8>>,
    staked: u64,
    page_size: Option<u32>,
    validators: Vec<CurrentValidator>,
    bootstrapping: bool,
    log: CallLog,
}

impl MockPChain {
    pub fn with_tx(mut self, tx: &Tx) -> Self {
        self.txs.insert(tx.id(), tx.signed_bytes());
        self
    }

    /// Holds back every transaction lookup that would succeed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_genesis_utxo(mut self, owner: ShortIdSeed, amount: u64) -> Self {
        let utxo_id = UtxoId::new(Id::EMPTY, self.genesis_utxos.len() as u32);
        self.genesis_utxos.push(encoded_utxo(utxo_id, owner, amount, 0));
        self
    }

    /// Appends blocks up to height `tip`, each linked to its parent.
    pub fn with_blocks(mut self, tip: u64) -> Self {
        for height in self.blocks.len() as u64 + 1..=tip {
            let block = Block {
                kind: BlockKind::Standard,
                parent_id: self.block_id(height - 1),
                height,
                time: None,
                txs: vec![],
            };
            self.blocks.push(block.to_bytes());
        }
        self
    }

    /// Heights the next `get_height` calls report, before falling back to
    /// the tip.
    pub fn with_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
        self.heights.lock().unwrap().extend(heights);
        self
    }

    pub fn with_utxo(mut self, owner: ShortIdSeed, amount: u64, locktime: u64) -> Self {
        let tx_id = Id::of(format!("p-utxo-{}", self.utxos.len()).as_bytes());
        self.utxos.push(encoded_utxo(UtxoId::new(tx_id, 0), owner, amount, locktime));
        self
    }

    pub fn with_stake(mut self, owner: ShortIdSeed, amount: u64) -> Self {
        self.stake_outputs.push(encode(&avax_output(owner, amount, 0)));
        self.staked += amount;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_validators(mut self, validators: Vec<CurrentValidator>) -> Self {
        self.validators = validators;
        self
    }

    pub fn bootstrapped(mut self, bootstrapped: bool) -> Self {
        self.bootstrapping = !bootstrapped;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn block_id(&self, height: u64) -> Id {
        match height {
            0 => GENESIS_BLOCK_ID,
            height => Id::of(&self.blocks[height as usize - 1]),
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.log.count(method)
    }

    /// Source chains of every UTXO listing, in call order.
    pub fn utxo_sources(&self) -> Vec<String> {
        self.log.utxo_sources.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<Vec<u8>> {
        self.log.issued.lock().unwrap().clone()
    }

    fn container(&self, index: u64) -> ClientResult<Container> {
        let bytes = self
            .blocks
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("container {index}")))?;
        Ok(Container {
            id: Id::of(&bytes),
            bytes,
            timestamp: 0,
            index,
        })
    }
}

#[async_trait]
impl PChainClient for MockPChain {
    async fn get_height(&self) -> ClientResult<u64> {
        self.log.record("get_height");
        let queued = self.heights.lock().unwrap().pop_front();
        Ok(queued.unwrap_or(self.blocks.len() as u64))
    }

    async fn get_network_id(&self) -> ClientResult<u32> {
        Ok(5)
    }

    async fn get_blockchain_id(&self, alias: &str) -> ClientResult<Id> {
        self.log.record("get_blockchain_id");
        blockchain_id(alias)
    }

    async fn is_bootstrapped(&self, _chain: &str) -> ClientResult<bool> {
        Ok(!self.bootstrapping)
    }

    async fn peers(&self) -> ClientResult<Vec<PeerInfo>> {
        Ok(mock_peers())
    }

    async fn node_version(&self) -> ClientResult<String> {
        Ok(NODE_VERSION.to_owned())
    }

    async fn get_tx(&self, tx_id: Id) -> ClientResult<Vec<u8>> {
        self.log.record("get_tx");
        let bytes = self
            .txs
            .get(&tx_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("transaction {tx_id}")))?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(bytes)
    }

    async fn get_reward_utxos(&self, _tx_id: Id) -> ClientResult<Vec<Vec<u8>>> {
        Ok(vec![])
    }

    async fn get_atomic_utxos(
        &self,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage> {
        self.log.utxo_source(source_chain);
        let utxos: &[Vec<u8>] = match source_chain == ChainAlias::P.as_ref() {
            true => &self.utxos,
            false => &[],
        };
        Ok(page(utxos, addrs, limit, cursor))
    }

    async fn get_stake(&self, _addrs: &[String]) -> ClientResult<StakeInfo> {
        self.log.record("get_stake");
        Ok(StakeInfo {
            staked: HashMap::from([(avax_asset_id(), self.staked)]),
            outputs: self.stake_outputs.clone(),
        })
    }

    async fn get_container_by_index(&self, index: u64) -> ClientResult<Container> {
        self.container(index)
    }

    async fn get_container_by_id(&self, id: Id) -> ClientResult<Container> {
        let index = self
            .blocks
            .iter()
            .position(|bytes| Id::of(bytes) == id)
            .ok_or_else(|| ClientError::NotFound(format!("container {id}")))?;
        self.container(index as u64)
    }

    async fn get_block(&self, block_id: Id) -> ClientResult<Vec<u8>> {
        self.blocks
            .iter()
            .find(|bytes| Id::of(bytes) == block_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("block {block_id}")))
    }

    async fn get_current_validators(&self, node_ids: &[NodeId]) -> ClientResult<Vec<CurrentValidator>> {
        Ok(self
            .validators
            .iter()
            .filter(|validator| node_ids.is_empty() || node_ids.contains(&validator.node_id))
            .cloned()
            .collect())
    }

    async fn get_asset_description(&self, asset: &str) -> ClientResult<AssetDescription> {
        let avax = avax_asset_id();
        if asset != AVAX_SYMBOL && asset != avax.to_string() {
            return Err(ClientError::NotFound(format!("asset {asset}")));
        }
        Ok(AssetDescription {
            asset_id: avax,
            name: "Avalanche".to_owned(),
            symbol: AVAX_SYMBOL.to_owned(),
            denomination: 9,
        })
    }

    async fn issue_tx(&self, tx: &[u8]) -> ClientResult<Id> {
        Ok(self.log.issue(tx))
    }

    async fn get_genesis(&self) -> ClientResult<GenesisInfo> {
        self.log.record("get_genesis");
        Ok(GenesisInfo {
            message: "genesis".to_owned(),
            timestamp: GENESIS_TIMESTAMP,
            utxos: self.genesis_utxos.clone(),
            txs: vec![],
        })
    }
}

/// A C-chain whose blocks are synthesized from their number.
#[derive(Debug, Default)]
pub struct MockEvm {
    head: u64,
    heights: Mutex<VecDeque<u64>>,
    utxos: Vec<(ChainAlias, Vec<u8>)>,
    base_fee: Option<u128>,
    balance: u128,
    pending: Vec<String>,
    log: CallLog,
}

impl MockEvm {
    pub fn with_blocks(mut self, head: u64) -> Self {
        self.head = head;
        self
    }

    /// Head numbers the next `header_by_number(None)` calls report.
    pub fn with_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
        self.heights.lock().unwrap().extend(heights);
        self
    }

    /// An AVAX UTXO exported to `owner` from `source`.
    pub fn with_utxo(mut self, source: ChainAlias, owner: ShortIdSeed, amount: u64) -> Self {
        let tx_id = Id::of(format!("{source}-utxo-{}", self.utxos.len()).as_bytes());
        self.utxos
            .push((source, encoded_utxo(UtxoId::new(tx_id, 0), owner, amount, 0)));
        self
    }

    pub fn with_base_fee(mut self, base_fee: u128) -> Self {
        self.base_fee = Some(base_fee);
        self
    }

    pub fn with_balance(mut self, balance: u128) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_pending<'a>(mut self, hashes: impl IntoIterator<Item = &'a str>) -> Self {
        self.pending = hashes.into_iter().map(str::to_owned).collect();
        self
    }

    pub fn page_size(&self) -> u32 {
        DEFAULT_PAGE_SIZE
    }

    pub fn block_hash(&self, number: u64) -> String {
        format!("0x{:064x}", 0xb10c_0000 + number)
    }

    pub fn calls(&self, method: &str) -> usize {
        self.log.count(method)
    }

    pub fn utxo_sources(&self) -> Vec<String> {
        self.log.utxo_sources.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<Vec<u8>> {
        self.log.issued.lock().unwrap().clone()
    }

    fn header(&self, number: u64) -> EvmHeader {
        EvmHeader {
            number,
            hash: self.block_hash(number),
            parent_hash: self.block_hash(number.saturating_sub(1)),
            timestamp: GENESIS_TIMESTAMP + 2 * number,
            gas_limit: 8_000_000,
            gas_used: 21_000,
            difficulty: 1,
            nonce: "0x0000000000000000".to_owned(),
            size: 1_024,
        }
    }

    fn known_header(&self, number: Option<u64>) -> ClientResult<EvmHeader> {
        match number.unwrap_or(self.head) {
            number if number <= self.head => Ok(self.header(number)),
            number => Err(ClientError::NotFound(format!("block {number}"))),
        }
    }
}

#[async_trait]
impl EvmClient for MockEvm {
    async fn chain_id(&self) -> ClientResult<u64> {
        Ok(43113)
    }

    async fn get_network_id(&self) -> ClientResult<u32> {
        Ok(5)
    }

    async fn get_blockchain_id(&self, alias: &str) -> ClientResult<Id> {
        self.log.record("get_blockchain_id");
        blockchain_id(alias)
    }

    async fn is_bootstrapped(&self, _chain: &str) -> ClientResult<bool> {
        Ok(true)
    }

    async fn peers(&self) -> ClientResult<Vec<PeerInfo>> {
        Ok(mock_peers())
    }

    async fn node_version(&self) -> ClientResult<String> {
        Ok(NODE_VERSION.to_owned())
    }

    async fn header_by_number(&self, number: Option<u64>) -> ClientResult<EvmHeader> {
        self.log.record("header_by_number");
        if number.is_none() {
            if let Some(queued) = self.heights.lock().unwrap().pop_front() {
                return Ok(self.header(queued));
            }
        }
        self.known_header(number)
    }

    async fn block_by_number(&self, number: Option<u64>) -> ClientResult<EvmBlock> {
        Ok(EvmBlock {
            header: self.known_header(number)?,
            transactions: vec![],
        })
    }

    async fn block_by_hash(&self, hash: &str) -> ClientResult<EvmBlock> {
        let number = (0..=self.head)
            .find(|number| self.block_hash(*number) == hash)
            .ok_or_else(|| ClientError::NotFound(format!("block {hash}")))?;
        self.block_by_number(Some(number)).await
    }

    async fn nonce_at(&self, _address: &EvmAddress, _number: Option<u64>) -> ClientResult<u64> {
        Ok(EVM_NONCE)
    }

    async fn balance_at(&self, _address: &EvmAddress, _number: Option<u64>) -> ClientResult<u128> {
        Ok(self.balance)
    }

    async fn estimate_base_fee(&self) -> ClientResult<u128> {
        Ok(self.base_fee.unwrap_or(DEFAULT_BASE_FEE))
    }

    async fn txpool_content(&self) -> ClientResult<Vec<String>> {
        Ok(self.pending.clone())
    }

    async fn get_atomic_utxos(
        &self,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage> {
        self.log.utxo_source(source_chain);
        let utxos = self
            .utxos
            .iter()
            .filter(|(source, _)| source.as_ref() == source_chain)
            .map(|(_, bytes)| bytes.clone())
            .collect_vec();
        Ok(page(&utxos, addrs, limit, cursor))
    }

    async fn issue_tx(&self, tx: &[u8]) -> ClientResult<Id> {
        Ok(self.log.issue(tx))
    }
}
