//! Routes each request to the first backend that claims it.

use std::sync::Arc;

use tracing::debug;

use crate::mapper::BLOCKCHAIN_NAME;
use crate::protocol::address::ChainAlias;
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
use crate::rosetta::types::MetadataRequest;
use crate::rosetta::types::NetworkListResponse;
use crate::rosetta::types::NetworkOptionsResponse;
use crate::rosetta::types::NetworkRequest;
use crate::rosetta::types::NetworkStatusResponse;
use crate::rosetta::types::TransactionIdentifierResponse;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;
use crate::service::Backend;
use crate::service::RosettaRequest;
use crate::service::ServiceConfig;

pub struct Dispatcher {
    config: Arc<ServiceConfig>,
    /// Asked in order; the P-chain first, then atomic C, then plain EVM.
    backends: Vec<Arc<dyn Backend>>,
}

impl Dispatcher {
    pub fn new(config: Arc<ServiceConfig>, backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { config, backends }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn check_network(&self, req: &RosettaRequest<'_>) -> RosettaResult<()> {
        let network = req.network_identifier();
        if network.blockchain != BLOCKCHAIN_NAME || network.network != self.config.network.display_name() {
            return Err(RosettaError::wrap(
                ErrorKind::InvalidInput,
                format!("unsupported network {}/{}", network.blockchain, network.network),
            ));
        }
        match network.sub_network() {
            None => Ok(()),
            Some(sub) if sub == ChainAlias::P.as_ref() => Ok(()),
            Some(sub) => Err(RosettaError::wrap(
                ErrorKind::InvalidInput,
                format!("unsupported sub network {sub}"),
            )),
        }
    }

    /// The backend owning `req`.
    pub fn select(&self, req: RosettaRequest<'_>) -> RosettaResult<&dyn Backend> {
        if self.config.is_offline() && req.requires_node() {
            return Err(ErrorKind::UnavailableOffline.into());
        }
        self.check_network(&req)?;
        self.backends
            .iter()
            .position(|backend| backend.should_handle(&req))
            .map(|index| {
                debug!(backend = index, "request routed");
                self.backends[index].as_ref()
            })
            .ok_or_else(|| ErrorKind::NotImplemented.into())
    }

    /// Identifiers of the C-chain and the P-chain.
    pub fn network_list(&self, _req: &MetadataRequest) -> NetworkListResponse {
        NetworkListResponse {
            network_identifiers: vec![
                self.config.network_identifier(None),
                self.config.network_identifier(Some(ChainAlias::P)),
            ],
        }
    }
}

macro_rules! dispatch_endpoints {
    ($($method:ident($request:ty) -> $response:ty => $variant:ident;)*) => {
        impl Dispatcher {
            $(
                pub async fn $method(&self, req: &$request) -> RosettaResult<$response> {
                    self.select(RosettaRequest::$variant(req))?.$method(req).await
                }
            )*
        }
    };
}

dispatch_endpoints! {
    network_status(NetworkRequest) -> NetworkStatusResponse => NetworkStatus;
    network_options(NetworkRequest) -> NetworkOptionsResponse => NetworkOptions;
    account_balance(AccountBalanceRequest) -> AccountBalanceResponse => AccountBalance;
    account_coins(AccountCoinsRequest) -> AccountCoinsResponse => AccountCoins;
    block(BlockRequest) -> BlockResponse => Block;
    block_transaction(BlockTransactionRequest) -> BlockTransactionResponse => BlockTransaction;
    mempool(NetworkRequest) -> MempoolResponse => Mempool;
    mempool_transaction(MempoolTransactionRequest) -> MempoolTransactionResponse => MempoolTransaction;
    construction_derive(ConstructionDeriveRequest) -> ConstructionDeriveResponse => Derive;
    construction_preprocess(ConstructionPreprocessRequest) -> ConstructionPreprocessResponse => Preprocess;
    construction_metadata(ConstructionMetadataRequest) -> ConstructionMetadataResponse => Metadata;
    construction_payloads(ConstructionPayloadsRequest) -> ConstructionPayloadsResponse => Payloads;
    construction_parse(ConstructionParseRequest) -> ConstructionParseResponse => Parse;
    construction_combine(ConstructionCombineRequest) -> ConstructionCombineResponse => Combine;
    construction_hash(ConstructionHashRequest) -> TransactionIdentifierResponse => Hash;
    construction_submit(ConstructionSubmitRequest) -> TransactionIdentifierResponse => Submit;
    call(CallRequest) -> CallResponse => Call;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::application::config::cli_args::Mode;
    use crate::mapper::matcher::tests::operation;
    use crate::rosetta::types::AccountIdentifier;
    use crate::tests::shared::c_address;
    use crate::tests::shared::c_network;
    use crate::tests::shared::dispatcher;
    use crate::tests::shared::evm_address;
    use crate::tests::shared::p_network;
    use crate::tests::shared::MockEvm;
    use crate::tests::shared::MockPChain;
    use crate::tests::shared::ShortIdSeed;

    fn balance(network: crate::rosetta::types::NetworkIdentifier, address: String) -> AccountBalanceRequest {
        AccountBalanceRequest {
            network_identifier: network,
            account_identifier: AccountIdentifier::new(address),
            block_identifier: None,
            currencies: None,
        }
    }

    /// Position of the backend serving `req`: 0 P-chain, 1 atomic, 2 EVM.
    fn owner(dispatcher: &Dispatcher, req: RosettaRequest<'_>) -> usize {
        let selected = dispatcher.select(req).unwrap();
        dispatcher
            .backends
            .iter()
            .position(|b| std::ptr::addr_eq(Arc::as_ptr(b), selected))
            .unwrap()
    }

    #[test]
    fn requests_go_to_the_first_claiming_backend() {
        let dispatcher = dispatcher(Mode::Online, MockPChain::default(), MockEvm::default());

        let p = balance(p_network(), String::new());
        let atomic = balance(c_network(), c_address(ShortIdSeed::A));
        let evm = balance(c_network(), evm_address(ShortIdSeed::A));
        assert!(owner(&dispatcher, RosettaRequest::AccountBalance(&p)) == 0);
        assert!(owner(&dispatcher, RosettaRequest::AccountBalance(&atomic)) == 1);
        assert!(owner(&dispatcher, RosettaRequest::AccountBalance(&evm)) == 2);

        let export = ConstructionPreprocessRequest {
            network_identifier: c_network(),
            operations: vec![operation(0, "EXPORT", "0xabc", -1, None)],
            metadata: None,
        };
        assert!(owner(&dispatcher, RosettaRequest::Preprocess(&export)) == 1);
    }

    #[test]
    fn selection_is_deterministic() {
        let dispatcher = dispatcher(Mode::Online, MockPChain::default(), MockEvm::default());
        let atomic = balance(c_network(), c_address(ShortIdSeed::B));
        let first = owner(&dispatcher, RosettaRequest::AccountBalance(&atomic));
        assert!((0..10).all(|_| owner(&dispatcher, RosettaRequest::AccountBalance(&atomic)) == first));
    }

    #[tokio::test]
    async fn offline_refuses_node_bound_requests() {
        let dispatcher = dispatcher(Mode::Offline, MockPChain::default(), MockEvm::default());
        let req = NetworkRequest {
            network_identifier: p_network(),
            metadata: None,
        };
        let_assert!(Err(err) = dispatcher.network_status(&req).await);
        assert!(err.is(ErrorKind::UnavailableOffline));

        let options = dispatcher.network_options(&req).await.unwrap();
        assert!(options.version.node_version.is_empty());
    }

    #[test]
    fn unknown_networks_are_invalid() {
        let dispatcher = dispatcher(Mode::Online, MockPChain::default(), MockEvm::default());
        let mut network = p_network();
        network.network = "Mainnet".to_owned();
        let req = balance(network, String::new());
        let_assert!(Err(err) = dispatcher.select(RosettaRequest::AccountBalance(&req)));
        assert!(err.is(ErrorKind::InvalidInput));

        let mut network = p_network();
        network.sub_network_identifier.as_mut().unwrap().network = "X".to_owned();
        let req = balance(network, String::new());
        let_assert!(Err(err) = dispatcher.select(RosettaRequest::AccountBalance(&req)));
        assert!(err.detail() == Some("unsupported sub network X"));
    }

    #[test]
    fn network_list_names_both_chains() {
        let dispatcher = dispatcher(Mode::Offline, MockPChain::default(), MockEvm::default());
        let list = dispatcher.network_list(&MetadataRequest::default());
        assert!(list.network_identifiers == vec![c_network(), p_network()]);
    }
}
