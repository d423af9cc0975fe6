//! [`PChainClient`] and [`EvmClient`] over avalanchego's JSON-RPC APIs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::de;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use super::AssetDescription;
use super::ClientError;
use super::ClientResult;
use super::Container;
use super::CurrentDelegator;
use super::CurrentValidator;
use super::EvmBlock;
use super::EvmClient;
use super::EvmHeader;
use super::GenesisInfo;
use super::PChainClient;
use super::PeerInfo;
use super::StakeInfo;
use super::UtxoCursor;
use super::UtxoPage;
use crate::application::config::cli_args::Args;
use crate::application::json_rpc::HttpTransport;
use crate::application::json_rpc::Transport;
use crate::protocol::address::parse_to_id;
use crate::protocol::address::ChainAlias;
use crate::protocol::address::EvmAddress;
use crate::protocol::ids::decode_hex;
use crate::protocol::ids::encode_hex_with_checksum;
use crate::protocol::ids::Id;
use crate::protocol::ids::NodeId;
use crate::protocol::ids::ShortId;

const ENCODING: &str = "hex";

/// One transport per node API.
#[derive(Debug, Clone)]
pub struct Endpoints<T> {
    /// `/ext/bc/P`
    pub platform: T,
    /// `/ext/info`
    pub info: T,
    /// `/ext/index/P/block`
    pub index: T,
    /// `/ext/bc/X`
    pub xchain: T,
    /// `/ext/bc/C/rpc`
    pub evm: T,
    /// `/ext/bc/C/avax`
    pub avax: T,
}

impl Endpoints<HttpTransport> {
    pub fn from_args(args: &Args) -> Self {
        let client = reqwest::Client::new();
        let transport = |path: &str| HttpTransport::with_client(args.endpoint(path), client.clone());
        Self {
            platform: transport("/ext/bc/P"),
            info: transport("/ext/info"),
            index: transport("/ext/index/P/block"),
            xchain: transport("/ext/bc/X"),
            evm: transport("/ext/bc/C/rpc"),
            avax: transport("/ext/bc/C/avax"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcNodeClient<T = HttpTransport> {
    endpoints: Endpoints<T>,
    timeout: Duration,
    genesis: GenesisInfo,
}

impl<T: Transport> RpcNodeClient<T> {
    /// `genesis` is served by [`PChainClient::get_genesis`]; the node has no
    /// API returning the decoded genesis state.
    pub fn new(endpoints: Endpoints<T>, timeout: Duration, genesis: GenesisInfo) -> Self {
        Self {
            endpoints,
            timeout,
            genesis,
        }
    }

    async fn call<R: DeserializeOwned>(
        &self,
        transport: &T,
        method: &'static str,
        params: Value,
    ) -> ClientResult<R> {
        let value = tokio::time::timeout(self.timeout, transport.call(method, params))
            .await
            .map_err(|_| ClientError::Timeout {
                method,
                timeout: self.timeout,
            })??;
        serde_json::from_value(value).map_err(|e| ClientError::decode(method, e))
    }

    async fn info_network_id(&self) -> ClientResult<u32> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(rename = "networkID")]
            network_id: Quoted<u32>,
        }
        let reply: Reply = self.call(&self.endpoints.info, "info.getNetworkID", json!({})).await?;
        Ok(reply.network_id.0)
    }

    async fn info_blockchain_id(&self, alias: &str) -> ClientResult<Id> {
        if alias == ChainAlias::P.as_ref() {
            return Ok(Id::EMPTY);
        }
        #[derive(Deserialize)]
        struct Reply {
            #[serde(rename = "blockchainID")]
            blockchain_id: Id,
        }
        let reply: Reply = self
            .call(&self.endpoints.info, "info.getBlockchainID", json!({ "alias": alias }))
            .await?;
        Ok(reply.blockchain_id)
    }

    async fn info_is_bootstrapped(&self, chain: &str) -> ClientResult<bool> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Reply {
            is_bootstrapped: bool,
        }
        let reply: Reply = self
            .call(&self.endpoints.info, "info.isBootstrapped", json!({ "chain": chain }))
            .await?;
        Ok(reply.is_bootstrapped)
    }

    async fn info_peers(&self) -> ClientResult<Vec<PeerInfo>> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            peers: Option<Vec<Map<String, Value>>>,
        }
        let reply: Reply = self
            .call(&self.endpoints.info, "info.peers", json!({ "nodeIDs": [] }))
            .await?;
        Ok(reply
            .peers
            .unwrap_or_default()
            .into_iter()
            .map(|mut metadata| {
                let node_id = match metadata.remove("nodeID") {
                    Some(Value::String(id)) => id,
                    _ => String::new(),
                };
                PeerInfo { node_id, metadata }
            })
            .collect())
    }

    async fn info_node_version(&self) -> ClientResult<String> {
        #[derive(Deserialize)]
        struct Reply {
            version: String,
        }
        let reply: Reply = self.call(&self.endpoints.info, "info.getNodeVersion", json!({})).await?;
        Ok(reply.version)
    }

    async fn utxos(
        &self,
        transport: &T,
        method: &'static str,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage> {
        let mut params = json!({
            "addresses": addrs,
            "limit": limit,
            "encoding": ENCODING,
        });
        if !source_chain.is_empty() {
            params["sourceChain"] = json!(source_chain);
        }
        if let Some(cursor) = cursor {
            params["startIndex"] = json!({ "address": cursor.address, "utxo": cursor.utxo });
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Reply {
            #[serde(default)]
            utxos: Vec<String>,
            #[serde(default)]
            end_index: Option<RawCursor>,
        }
        #[derive(Deserialize)]
        struct RawCursor {
            #[serde(default)]
            address: String,
            #[serde(default)]
            utxo: String,
        }

        let reply: Reply = self.call(transport, method, params).await?;
        let end_index = reply
            .end_index
            .map(|c| UtxoCursor {
                address: c.address,
                utxo: c.utxo,
            })
            .unwrap_or_default();
        Ok(UtxoPage {
            utxos: decode_all(method, &reply.utxos)?,
            end_index,
        })
    }

    async fn issue(&self, transport: &T, method: &'static str, tx: &[u8]) -> ClientResult<Id> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(rename = "txID")]
            tx_id: Id,
        }
        let params = json!({ "tx": encode_hex_with_checksum(tx), "encoding": ENCODING });
        let reply: Reply = self.call(transport, method, params).await?;
        debug!(tx_id = %reply.tx_id, method, "issued transaction");
        Ok(reply.tx_id)
    }

    async fn container(&self, method: &'static str, params: Value) -> ClientResult<Container> {
        #[derive(Deserialize)]
        struct Reply {
            id: Id,
            bytes: String,
            timestamp: String,
            index: Quoted<u64>,
        }
        let reply: Reply = self.call(&self.endpoints.index, method, params).await?;
        let timestamp = chrono::DateTime::parse_from_rfc3339(&reply.timestamp)
            .map_err(|e| ClientError::decode(method, e))?
            .timestamp_nanos_opt()
            .unwrap_or_default();
        Ok(Container {
            id: reply.id,
            bytes: decode_one(method, &reply.bytes)?,
            timestamp,
            index: reply.index.0,
        })
    }

    async fn evm_block(&self, method: &'static str, params: Value) -> ClientResult<EvmBlock> {
        let reply: Option<RawEvmBlock> = self.call(&self.endpoints.evm, method, params).await?;
        let raw = reply.ok_or_else(|| ClientError::NotFound("block".to_owned()))?;
        raw.into_block(method)
    }
}

#[async_trait]
impl<T: Transport> PChainClient for RpcNodeClient<T> {
    async fn get_height(&self) -> ClientResult<u64> {
        #[derive(Deserialize)]
        struct Reply {
            height: Quoted<u64>,
        }
        let reply: Reply = self.call(&self.endpoints.platform, "platform.getHeight", json!({})).await?;
        Ok(reply.height.0)
    }

    async fn get_network_id(&self) -> ClientResult<u32> {
        self.info_network_id().await
    }

    async fn get_blockchain_id(&self, alias: &str) -> ClientResult<Id> {
        self.info_blockchain_id(alias).await
    }

    async fn is_bootstrapped(&self, chain: &str) -> ClientResult<bool> {
        self.info_is_bootstrapped(chain).await
    }

    async fn peers(&self) -> ClientResult<Vec<PeerInfo>> {
        self.info_peers().await
    }

    async fn node_version(&self) -> ClientResult<String> {
        self.info_node_version().await
    }

    async fn get_tx(&self, tx_id: Id) -> ClientResult<Vec<u8>> {
        const METHOD: &str = "platform.getTx";
        #[derive(Deserialize)]
        struct Reply {
            tx: String,
        }
        let params = json!({ "txID": tx_id, "encoding": ENCODING });
        let reply: Reply = self.call(&self.endpoints.platform, METHOD, params).await?;
        decode_one(METHOD, &reply.tx)
    }

    async fn get_reward_utxos(&self, tx_id: Id) -> ClientResult<Vec<Vec<u8>>> {
        const METHOD: &str = "platform.getRewardUTXOs";
        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            utxos: Vec<String>,
        }
        let params = json!({ "txID": tx_id, "encoding": ENCODING });
        let reply: Reply = self.call(&self.endpoints.platform, METHOD, params).await?;
        decode_all(METHOD, &reply.utxos)
    }

    async fn get_atomic_utxos(
        &self,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage> {
        // the P-chain's own UTXOs are listed without a source chain
        let source_chain = if source_chain == ChainAlias::P.as_ref() {
            ""
        } else {
            source_chain
        };
        self.utxos(&self.endpoints.platform, "platform.getUTXOs", addrs, source_chain, limit, cursor)
            .await
    }

    async fn get_stake(&self, addrs: &[String]) -> ClientResult<StakeInfo> {
        const METHOD: &str = "platform.getStake";
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Reply {
            #[serde(default)]
            stakeds: HashMap<Id, Quoted<u64>>,
            #[serde(default)]
            staked_outputs: Vec<String>,
        }
        let params = json!({ "addresses": addrs, "validatorsOnly": false, "encoding": ENCODING });
        let reply: Reply = self.call(&self.endpoints.platform, METHOD, params).await?;
        Ok(StakeInfo {
            staked: reply.stakeds.into_iter().map(|(id, amount)| (id, amount.0)).collect(),
            outputs: decode_all(METHOD, &reply.staked_outputs)?,
        })
    }

    async fn get_container_by_index(&self, index: u64) -> ClientResult<Container> {
        self.container(
            "index.getContainerByIndex",
            json!({ "index": index, "encoding": ENCODING }),
        )
        .await
    }

    async fn get_container_by_id(&self, id: Id) -> ClientResult<Container> {
        self.container("index.getContainerByID", json!({ "id": id, "encoding": ENCODING }))
            .await
    }

    async fn get_block(&self, block_id: Id) -> ClientResult<Vec<u8>> {
        const METHOD: &str = "platform.getBlock";
        #[derive(Deserialize)]
        struct Reply {
            block: String,
        }
        let params = json!({ "blockID": block_id, "encoding": ENCODING });
        let reply: Reply = self.call(&self.endpoints.platform, METHOD, params).await?;
        decode_one(METHOD, &reply.block)
    }

    async fn get_current_validators(&self, node_ids: &[NodeId]) -> ClientResult<Vec<CurrentValidator>> {
        const METHOD: &str = "platform.getCurrentValidators";
        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            validators: Vec<RawValidator>,
        }
        let reply: Reply = self
            .call(&self.endpoints.platform, METHOD, json!({ "nodeIDs": node_ids }))
            .await?;
        reply
            .validators
            .into_iter()
            .map(|v| v.into_validator(METHOD))
            .collect()
    }

    async fn get_asset_description(&self, asset: &str) -> ClientResult<AssetDescription> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(rename = "assetID")]
            asset_id: Id,
            #[serde(default)]
            name: String,
            symbol: String,
            denomination: Quoted<u8>,
        }
        let reply: Reply = self
            .call(&self.endpoints.xchain, "avm.getAssetDescription", json!({ "assetID": asset }))
            .await?;
        Ok(AssetDescription {
            asset_id: reply.asset_id,
            name: reply.name,
            symbol: reply.symbol,
            denomination: reply.denomination.0,
        })
    }

    async fn issue_tx(&self, tx: &[u8]) -> ClientResult<Id> {
        self.issue(&self.endpoints.platform, "platform.issueTx", tx).await
    }

    async fn get_genesis(&self) -> ClientResult<GenesisInfo> {
        Ok(self.genesis.clone())
    }
}

#[async_trait]
impl<T: Transport> EvmClient for RpcNodeClient<T> {
    async fn chain_id(&self) -> ClientResult<u64> {
        const METHOD: &str = "eth_chainId";
        let reply: String = self.call(&self.endpoints.evm, METHOD, json!([])).await?;
        hex_quantity(METHOD, &reply)
    }

    async fn get_network_id(&self) -> ClientResult<u32> {
        self.info_network_id().await
    }

    async fn get_blockchain_id(&self, alias: &str) -> ClientResult<Id> {
        self.info_blockchain_id(alias).await
    }

    async fn is_bootstrapped(&self, chain: &str) -> ClientResult<bool> {
        self.info_is_bootstrapped(chain).await
    }

    async fn peers(&self) -> ClientResult<Vec<PeerInfo>> {
        self.info_peers().await
    }

    async fn node_version(&self) -> ClientResult<String> {
        self.info_node_version().await
    }

    async fn header_by_number(&self, number: Option<u64>) -> ClientResult<EvmHeader> {
        Ok(self.block_by_number(number).await?.header)
    }

    async fn block_by_number(&self, number: Option<u64>) -> ClientResult<EvmBlock> {
        self.evm_block("eth_getBlockByNumber", json!([block_tag(number), false]))
            .await
    }

    async fn block_by_hash(&self, hash: &str) -> ClientResult<EvmBlock> {
        self.evm_block("eth_getBlockByHash", json!([hash, false])).await
    }

    async fn nonce_at(&self, address: &EvmAddress, number: Option<u64>) -> ClientResult<u64> {
        const METHOD: &str = "eth_getTransactionCount";
        let params = json!([address.to_string(), block_tag(number)]);
        let reply: String = self.call(&self.endpoints.evm, METHOD, params).await?;
        hex_quantity(METHOD, &reply)
    }

    async fn balance_at(&self, address: &EvmAddress, number: Option<u64>) -> ClientResult<u128> {
        const METHOD: &str = "eth_getBalance";
        let params = json!([address.to_string(), block_tag(number)]);
        let reply: String = self.call(&self.endpoints.evm, METHOD, params).await?;
        hex_quantity(METHOD, &reply)
    }

    async fn estimate_base_fee(&self) -> ClientResult<u128> {
        const METHOD: &str = "eth_baseFee";
        let reply: String = self.call(&self.endpoints.evm, METHOD, json!([])).await?;
        hex_quantity(METHOD, &reply)
    }

    async fn txpool_content(&self) -> ClientResult<Vec<String>> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            pending: HashMap<String, HashMap<String, Value>>,
        }
        let reply: Reply = self.call(&self.endpoints.evm, "txpool_content", json!([])).await?;
        let mut hashes: Vec<String> = reply
            .pending
            .values()
            .flat_map(HashMap::values)
            .filter_map(|tx| tx.get("hash").and_then(Value::as_str).map(str::to_owned))
            .collect();
        hashes.sort();
        Ok(hashes)
    }

    async fn get_atomic_utxos(
        &self,
        addrs: &[String],
        source_chain: &str,
        limit: u32,
        cursor: Option<&UtxoCursor>,
    ) -> ClientResult<UtxoPage> {
        self.utxos(&self.endpoints.avax, "avax.getUTXOs", addrs, source_chain, limit, cursor)
            .await
    }

    async fn issue_tx(&self, tx: &[u8]) -> ClientResult<Id> {
        self.issue(&self.endpoints.avax, "avax.issueTx", tx).await
    }
}

/// A number the node renders either as a JSON number or as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Quoted<N>(N);

impl<'de, N> Deserialize<'de> for Quoted<N>
where
    N: FromStr,
    N::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => return Err(de::Error::custom(format!("expected a number, got {other}"))),
        };
        raw.parse().map(Self).map_err(de::Error::custom)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawOwner {
    #[serde(default)]
    addresses: Vec<String>,
}

impl RawOwner {
    fn short_ids(&self, method: &'static str) -> ClientResult<Vec<ShortId>> {
        self.addresses
            .iter()
            .map(|addr| parse_to_id(addr).map_err(|e| ClientError::decode(method, e)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDelegator {
    #[serde(default)]
    reward_owner: Option<RawOwner>,
    #[serde(default)]
    potential_reward: Option<Quoted<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValidator {
    #[serde(rename = "nodeID")]
    node_id: NodeId,
    #[serde(default)]
    validation_reward_owner: Option<RawOwner>,
    #[serde(default)]
    potential_reward: Option<Quoted<u64>>,
    #[serde(default)]
    delegation_fee: Option<Quoted<f64>>,
    #[serde(default)]
    delegators: Option<Vec<RawDelegator>>,
}

impl RawValidator {
    fn into_validator(self, method: &'static str) -> ClientResult<CurrentValidator> {
        let delegators = self
            .delegators
            .unwrap_or_default()
            .into_iter()
            .map(|d| {
                Ok(CurrentDelegator {
                    reward_owner: d.reward_owner.unwrap_or_default().short_ids(method)?,
                    potential_reward: d.potential_reward.unwrap_or_default().0,
                })
            })
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(CurrentValidator {
            node_id: self.node_id,
            validation_reward_owner: self
                .validation_reward_owner
                .unwrap_or_default()
                .short_ids(method)?,
            potential_reward: self.potential_reward.unwrap_or_default().0,
            delegation_fee: self.delegation_fee.unwrap_or_default().0,
            delegators,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvmBlock {
    number: String,
    hash: String,
    parent_hash: String,
    timestamp: String,
    gas_limit: String,
    gas_used: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    transactions: Vec<Value>,
}

impl RawEvmBlock {
    fn into_block(self, method: &'static str) -> ClientResult<EvmBlock> {
        let optional = |value: &Option<String>| match value {
            Some(v) => hex_quantity::<u64>(method, v),
            None => Ok(0),
        };
        let header = EvmHeader {
            number: hex_quantity(method, &self.number)?,
            hash: self.hash,
            parent_hash: self.parent_hash,
            timestamp: hex_quantity(method, &self.timestamp)?,
            gas_limit: hex_quantity(method, &self.gas_limit)?,
            gas_used: hex_quantity(method, &self.gas_used)?,
            difficulty: optional(&self.difficulty)?,
            nonce: self.nonce.unwrap_or_default(),
            size: optional(&self.size)?,
        };
        // full transaction objects or bare hashes, depending on the request
        let transactions = self
            .transactions
            .into_iter()
            .filter_map(|tx| match tx {
                Value::String(hash) => Some(hash),
                Value::Object(obj) => obj.get("hash").and_then(Value::as_str).map(str::to_owned),
                _ => None,
            })
            .collect();
        Ok(EvmBlock {
            header,
            transactions,
        })
    }
}

fn block_tag(number: Option<u64>) -> String {
    match number {
        Some(n) => format!("{n:#x}"),
        None => "latest".to_owned(),
    }
}

fn hex_quantity<N: TryFrom<u128>>(method: &'static str, s: &str) -> ClientResult<N> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let value = u128::from_str_radix(digits, 16).map_err(|e| ClientError::decode(method, e))?;
    N::try_from(value).map_err(|_| ClientError::decode(method, format!("{s} out of range")))
}

fn decode_one(method: &'static str, s: &str) -> ClientResult<Vec<u8>> {
    decode_hex(s).map_err(|e| ClientError::decode(method, e))
}

fn decode_all(method: &'static str, items: &[String]) -> ClientResult<Vec<Vec<u8>>> {
    items.iter().map(|item| decode_one(method, item)).collect()
}
