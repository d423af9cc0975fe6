//! Rosetta endpoint semantics per chain.
//!
//! Three backends serve the API: the P-chain, atomic (import/export)
//! transactions of the C-chain, and the plain EVM side of the C-chain. The
//! [`dispatch::Dispatcher`] asks each in turn whether it owns a request.

pub mod catomic;
pub mod cevm;
pub mod construction;
pub mod dispatch;
pub mod pchain;
pub mod wire;

use async_trait::async_trait;
use tracing::warn;

use crate::application::config::cli_args::Mode;
use crate::application::config::network::Network;
use crate::client::ClientError;
use crate::client::PeerInfo;
use crate::mapper::operation_statuses;
use crate::mapper::BLOCKCHAIN_NAME;
use crate::protocol::address::ChainAlias;
use crate::protocol::ids::Id;
use crate::rosetta::types::AccountBalanceRequest;
use crate::rosetta::types::AccountBalanceResponse;
use crate::rosetta::types::AccountCoinsRequest;
use crate::rosetta::types::AccountCoinsResponse;
use crate::rosetta::types::Allow;
use crate::rosetta::types::BlockRequest;
use crate::rosetta::types::BlockResponse;
use crate::rosetta::types::BlockTransactionRequest;
use crate::rosetta::types::BlockTransactionResponse;
use crate::rosetta::types::CallRequest;
use crate::rosetta::types::CallResponse;
use crate::rosetta::types::ConstructionCombineRequest;
use crate::rosetta::types::ConstructionCombineResponse;
use crate::rosetta::types::ConstructionDeriveRequest;
use crate::rosetta::types::ConstructionDeriveResponse;
use crate::rosetta::types::ConstructionHashRequest;
use crate::rosetta::types::ConstructionMetadataRequest;
use crate::rosetta::types::ConstructionMetadataResponse;
use crate::rosetta::types::ConstructionParseRequest;
use crate::rosetta::types::ConstructionParseResponse;
use crate::rosetta::types::ConstructionPayloadsRequest;
use crate::rosetta::types::ConstructionPayloadsResponse;
use crate::rosetta::types::ConstructionPreprocessRequest;
use crate::rosetta::types::ConstructionPreprocessResponse;
use crate::rosetta::types::ConstructionSubmitRequest;
use crate::rosetta::types::MempoolResponse;
use crate::rosetta::types::MempoolTransactionRequest;
use crate::rosetta::types::MempoolTransactionResponse;
use crate::rosetta::types::NetworkIdentifier;
use crate::rosetta::types::NetworkOptionsResponse;
use crate::rosetta::types::NetworkRequest;
use crate::rosetta::types::NetworkStatusResponse;
use crate::rosetta::types::Peer;
use crate::rosetta::types::SubNetworkIdentifier;
use crate::rosetta::types::TransactionIdentifierResponse;
use crate::rosetta::types::Version;
use crate::rosetta::types::ROSETTA_VERSION;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;

/// Settings every backend shares, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub mode: Mode,
    pub network: Network,
    /// Resolved from the node on networks without a fixed one.
    pub avax_asset_id: Id,
    pub utxos_page_size: u32,
    pub evm_chain_id: u64,
}

impl ServiceConfig {
    pub fn new(mode: Mode, network: Network, avax_asset_id: Id) -> Self {
        Self {
            mode,
            network,
            avax_asset_id,
            utxos_page_size: 1024,
            evm_chain_id: network.evm_chain_id(),
        }
    }

    pub fn hrp(&self) -> &'static str {
        self.network.hrp()
    }

    pub fn is_offline(&self) -> bool {
        self.mode.is_offline()
    }

    /// Identifier of the C-chain (`None`) or of the named sub-network.
    pub fn network_identifier(&self, sub_network: Option<ChainAlias>) -> NetworkIdentifier {
        NetworkIdentifier {
            blockchain: BLOCKCHAIN_NAME.to_owned(),
            network: self.network.display_name().to_owned(),
            sub_network_identifier: sub_network.map(|alias| SubNetworkIdentifier {
                network: alias.to_string(),
                metadata: None,
            }),
        }
    }
}

/// Node failures surface as retriable client errors carrying the upstream
/// message.
impl From<ClientError> for RosettaError {
    fn from(err: ClientError) -> Self {
        warn!("node call failed: {err}");
        RosettaError::wrap(ErrorKind::ClientError, err)
    }
}

/// A borrowed view of any routed request, used to pick its backend.
#[derive(Debug, Clone, Copy)]
pub enum RosettaRequest<'a> {
    NetworkStatus(&'a NetworkRequest),
    NetworkOptions(&'a NetworkRequest),
    AccountBalance(&'a AccountBalanceRequest),
    AccountCoins(&'a AccountCoinsRequest),
    Block(&'a BlockRequest),
    BlockTransaction(&'a BlockTransactionRequest),
    Mempool(&'a NetworkRequest),
    MempoolTransaction(&'a MempoolTransactionRequest),
    Derive(&'a ConstructionDeriveRequest),
    Preprocess(&'a ConstructionPreprocessRequest),
    Metadata(&'a ConstructionMetadataRequest),
    Payloads(&'a ConstructionPayloadsRequest),
    Parse(&'a ConstructionParseRequest),
    Combine(&'a ConstructionCombineRequest),
    Hash(&'a ConstructionHashRequest),
    Submit(&'a ConstructionSubmitRequest),
    Call(&'a CallRequest),
}

impl RosettaRequest<'_> {
    pub fn network_identifier(&self) -> &NetworkIdentifier {
        match self {
            Self::NetworkStatus(r) | Self::NetworkOptions(r) | Self::Mempool(r) => &r.network_identifier,
            Self::AccountBalance(r) => &r.network_identifier,
            Self::AccountCoins(r) => &r.network_identifier,
            Self::Block(r) => &r.network_identifier,
            Self::BlockTransaction(r) => &r.network_identifier,
            Self::MempoolTransaction(r) => &r.network_identifier,
            Self::Derive(r) => &r.network_identifier,
            Self::Preprocess(r) => &r.network_identifier,
            Self::Metadata(r) => &r.network_identifier,
            Self::Payloads(r) => &r.network_identifier,
            Self::Parse(r) => &r.network_identifier,
            Self::Combine(r) => &r.network_identifier,
            Self::Hash(r) => &r.network_identifier,
            Self::Submit(r) => &r.network_identifier,
            Self::Call(r) => &r.network_identifier,
        }
    }

    /// Whether serving the request needs the node. Such requests are
    /// refused in offline mode.
    pub fn requires_node(&self) -> bool {
        match self {
            Self::NetworkOptions(_)
            | Self::Derive(_)
            | Self::Preprocess(_)
            | Self::Payloads(_)
            | Self::Parse(_)
            | Self::Combine(_)
            | Self::Hash(_) => false,
            Self::NetworkStatus(_)
            | Self::AccountBalance(_)
            | Self::AccountCoins(_)
            | Self::Block(_)
            | Self::BlockTransaction(_)
            | Self::Mempool(_)
            | Self::MempoolTransaction(_)
            | Self::Metadata(_)
            | Self::Submit(_)
            | Self::Call(_) => true,
        }
    }
}

fn not_implemented<T>() -> RosettaResult<T> {
    Err(ErrorKind::NotImplemented.into())
}

/// One chain's implementation of the Rosetta endpoints. Endpoints a backend
/// does not override answer `NotImplemented`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Whether this backend owns `req`.
    fn should_handle(&self, req: &RosettaRequest<'_>) -> bool;

    async fn network_status(&self, _req: &NetworkRequest) -> RosettaResult<NetworkStatusResponse> {
        not_implemented()
    }

    async fn network_options(&self, _req: &NetworkRequest) -> RosettaResult<NetworkOptionsResponse> {
        not_implemented()
    }

    async fn account_balance(&self, _req: &AccountBalanceRequest) -> RosettaResult<AccountBalanceResponse> {
        not_implemented()
    }

    async fn account_coins(&self, _req: &AccountCoinsRequest) -> RosettaResult<AccountCoinsResponse> {
        not_implemented()
    }

    async fn block(&self, _req: &BlockRequest) -> RosettaResult<BlockResponse> {
        not_implemented()
    }

    async fn block_transaction(
        &self,
        _req: &BlockTransactionRequest,
    ) -> RosettaResult<BlockTransactionResponse> {
        not_implemented()
    }

    async fn mempool(&self, _req: &NetworkRequest) -> RosettaResult<MempoolResponse> {
        not_implemented()
    }

    async fn mempool_transaction(
        &self,
        _req: &MempoolTransactionRequest,
    ) -> RosettaResult<MempoolTransactionResponse> {
        not_implemented()
    }

    async fn construction_derive(
        &self,
        _req: &ConstructionDeriveRequest,
    ) -> RosettaResult<ConstructionDeriveResponse> {
        not_implemented()
    }

    async fn construction_preprocess(
        &self,
        _req: &ConstructionPreprocessRequest,
    ) -> RosettaResult<ConstructionPreprocessResponse> {
        not_implemented()
    }

    async fn construction_metadata(
        &self,
        _req: &ConstructionMetadataRequest,
    ) -> RosettaResult<ConstructionMetadataResponse> {
        not_implemented()
    }

    async fn construction_payloads(
        &self,
        _req: &ConstructionPayloadsRequest,
    ) -> RosettaResult<ConstructionPayloadsResponse> {
        not_implemented()
    }

    async fn construction_parse(
        &self,
        _req: &ConstructionParseRequest,
    ) -> RosettaResult<ConstructionParseResponse> {
        not_implemented()
    }

    async fn construction_combine(
        &self,
        _req: &ConstructionCombineRequest,
    ) -> RosettaResult<ConstructionCombineResponse> {
        not_implemented()
    }

    async fn construction_hash(
        &self,
        _req: &ConstructionHashRequest,
    ) -> RosettaResult<TransactionIdentifierResponse> {
        not_implemented()
    }

    async fn construction_submit(
        &self,
        _req: &ConstructionSubmitRequest,
    ) -> RosettaResult<TransactionIdentifierResponse> {
        not_implemented()
    }

    async fn call(&self, _req: &CallRequest) -> RosettaResult<CallResponse> {
        not_implemented()
    }
}

pub(crate) fn rosetta_peers(peers: Vec<PeerInfo>) -> Vec<Peer> {
    peers
        .into_iter()
        .map(|peer| Peer {
            peer_id: peer.node_id,
            metadata: Some(peer.metadata),
        })
        .collect()
}

/// `/network/options` body; only the advertised operation types and the
/// historical lookup flag differ between chains.
pub(crate) fn network_options(
    node_version: String,
    operation_types: Vec<String>,
    historical_balance_lookup: bool,
) -> NetworkOptionsResponse {
    NetworkOptionsResponse {
        version: Version {
            rosetta_version: ROSETTA_VERSION.to_owned(),
            node_version,
            middleware_version: Some(env!("CARGO_PKG_VERSION").to_owned()),
            metadata: None,
        },
        allow: Allow {
            operation_statuses: operation_statuses(),
            operation_types,
            errors: RosettaError::all(),
            historical_balance_lookup,
            call_methods: vec![],
            balance_exemptions: vec![],
            mempool_coins: false,
        },
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
