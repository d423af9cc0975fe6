//! The P-chain backend, serving requests addressed to sub-network `P`.

mod account;
mod block;
mod construction;
mod genesis;
mod network;
pub mod resolver;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::client::PChainClient;
use crate::protocol::address::ChainAlias;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::Tx;
use crate::rosetta::types::AccountBalanceRequest;
use crate::rosetta::types::AccountBalanceResponse;
use crate::rosetta::types::AccountCoinsRequest;
use crate::rosetta::types::AccountCoinsResponse;
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
use crate::rosetta::types::NetworkOptionsResponse;
use crate::rosetta::types::NetworkRequest;
use crate::rosetta::types::NetworkStatusResponse;
use crate::rosetta::types::TransactionIdentifierResponse;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;
use crate::service::construction::combine;
use crate::service::construction::hash;
use crate::service::Backend;
use crate::service::RosettaRequest;
use crate::service::ServiceConfig;
use genesis::GenesisBlock;
use resolver::DependencyResolver;

pub struct PChainBackend {
    config: Arc<ServiceConfig>,
    client: Arc<dyn PChainClient>,
    resolver: DependencyResolver,
    genesis: OnceCell<Arc<GenesisBlock>>,
    chain_ids: OnceCell<HashMap<Id, ChainAlias>>,
}

impl PChainBackend {
    pub fn new(config: Arc<ServiceConfig>, client: Arc<dyn PChainClient>) -> Self {
        Self {
            resolver: DependencyResolver::new(client.clone()),
            config,
            client,
            genesis: OnceCell::new(),
            chain_ids: OnceCell::new(),
        }
    }

    /// Aliases of the chains exports may target, looked up once.
    async fn chain_ids(&self) -> RosettaResult<&HashMap<Id, ChainAlias>> {
        self.chain_ids
            .get_or_try_init(|| async {
                let mut ids = HashMap::from([(Id::EMPTY, ChainAlias::P)]);
                for alias in [ChainAlias::C, ChainAlias::X] {
                    let id = self.client.get_blockchain_id(alias.as_ref()).await?;
                    ids.insert(id, alias);
                }
                Ok::<_, RosettaError>(ids)
            })
            .await
    }
}

#[async_trait]
impl Backend for PChainBackend {
    fn should_handle(&self, req: &RosettaRequest<'_>) -> bool {
        req.network_identifier().sub_network() == Some(ChainAlias::P.as_ref())
    }

    async fn network_status(&self, _req: &NetworkRequest) -> RosettaResult<NetworkStatusResponse> {
        self.status().await
    }

    async fn network_options(&self, _req: &NetworkRequest) -> RosettaResult<NetworkOptionsResponse> {
        self.options().await
    }

    async fn account_balance(&self, req: &AccountBalanceRequest) -> RosettaResult<AccountBalanceResponse> {
        self.balance(req).await
    }

    async fn account_coins(&self, req: &AccountCoinsRequest) -> RosettaResult<AccountCoinsResponse> {
        self.coins(req).await
    }

    async fn block(&self, req: &BlockRequest) -> RosettaResult<BlockResponse> {
        let block = self.block_by_identifier(&req.block_identifier).await?;
        Ok(BlockResponse {
            block: Some(block),
            other_transactions: vec![],
        })
    }

    async fn block_transaction(
        &self,
        req: &BlockTransactionRequest,
    ) -> RosettaResult<BlockTransactionResponse> {
        self.transaction_in_block(req).await
    }

    async fn mempool(&self, _req: &NetworkRequest) -> RosettaResult<MempoolResponse> {
        Err(ErrorKind::NotSupported.into())
    }

    async fn mempool_transaction(
        &self,
        _req: &MempoolTransactionRequest,
    ) -> RosettaResult<MempoolTransactionResponse> {
        Err(ErrorKind::NotSupported.into())
    }

    async fn construction_derive(
        &self,
        req: &ConstructionDeriveRequest,
    ) -> RosettaResult<ConstructionDeriveResponse> {
        self.derive(req)
    }

    async fn construction_preprocess(
        &self,
        req: &ConstructionPreprocessRequest,
    ) -> RosettaResult<ConstructionPreprocessResponse> {
        self.preprocess(req)
    }

    async fn construction_metadata(
        &self,
        req: &ConstructionMetadataRequest,
    ) -> RosettaResult<ConstructionMetadataResponse> {
        self.metadata(req).await
    }

    async fn construction_payloads(
        &self,
        req: &ConstructionPayloadsRequest,
    ) -> RosettaResult<ConstructionPayloadsResponse> {
        self.payloads(req)
    }

    async fn construction_parse(
        &self,
        req: &ConstructionParseRequest,
    ) -> RosettaResult<ConstructionParseResponse> {
        self.parse(req)
    }

    async fn construction_combine(
        &self,
        req: &ConstructionCombineRequest,
    ) -> RosettaResult<ConstructionCombineResponse> {
        combine::<Tx>(req)
    }

    async fn construction_hash(
        &self,
        req: &ConstructionHashRequest,
    ) -> RosettaResult<TransactionIdentifierResponse> {
        hash::<Tx>(&req.signed_transaction)
    }

    async fn construction_submit(
        &self,
        req: &ConstructionSubmitRequest,
    ) -> RosettaResult<TransactionIdentifierResponse> {
        self.submit(req).await
    }

    async fn call(&self, _req: &CallRequest) -> RosettaResult<CallResponse> {
        Err(ErrorKind::CallInvalidMethod.into())
    }
}
