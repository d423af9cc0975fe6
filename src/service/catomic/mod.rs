//! The C-chain backend for atomic transactions: UTXOs the C-chain holds in
//! shared memory, and the import/export transactions moving them.

mod account;
mod construction;

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::EvmClient;
use crate::mapper::catomic::is_atomic_op_type;
use crate::mapper::catomic::is_c_chain_bech32_address;
use crate::mapper::catomic::META_ATOMIC_TX_GAS;
use crate::mapper::ADDRESS_FORMAT_BECH32;
use crate::mapper::META_ADDRESS_FORMAT;
use crate::protocol::atomic::AtomicTx;
use crate::rosetta::types::AccountBalanceRequest;
use crate::rosetta::types::AccountBalanceResponse;
use crate::rosetta::types::AccountCoinsRequest;
use crate::rosetta::types::AccountCoinsResponse;
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
use crate::rosetta::types::Metadata;
use crate::rosetta::types::NetworkRequest;
use crate::rosetta::types::Operation;
use crate::rosetta::types::TransactionIdentifierResponse;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaResult;
use crate::service::construction::combine;
use crate::service::construction::hash;
use crate::service::wire::RosettaTx;
use crate::service::Backend;
use crate::service::RosettaRequest;
use crate::service::ServiceConfig;

pub struct CAtomicBackend {
    config: Arc<ServiceConfig>,
    client: Arc<dyn EvmClient>,
}

impl CAtomicBackend {
    pub fn new(config: Arc<ServiceConfig>, client: Arc<dyn EvmClient>) -> Self {
        Self { config, client }
    }
}

fn first_op_is_atomic(operations: &[Operation]) -> bool {
    operations.first().is_some_and(|op| is_atomic_op_type(&op.type_))
}

fn asks_for_bech32(metadata: Option<&Metadata>) -> bool {
    metadata
        .and_then(|m| m.get(META_ADDRESS_FORMAT))
        .and_then(|format| format.as_str())
        == Some(ADDRESS_FORMAT_BECH32)
}

fn is_atomic_envelope(raw: &str) -> bool {
    RosettaTx::<AtomicTx>::decode(raw).is_ok()
}

#[async_trait]
impl Backend for CAtomicBackend {
    fn should_handle(&self, req: &RosettaRequest<'_>) -> bool {
        if req.network_identifier().sub_network().is_some() {
            return false;
        }
        match req {
            RosettaRequest::AccountBalance(r) => is_c_chain_bech32_address(&r.account_identifier),
            RosettaRequest::AccountCoins(r) => is_c_chain_bech32_address(&r.account_identifier),
            RosettaRequest::Derive(r) => asks_for_bech32(r.metadata.as_ref()),
            RosettaRequest::Preprocess(r) => first_op_is_atomic(&r.operations),
            RosettaRequest::Payloads(r) => first_op_is_atomic(&r.operations),
            RosettaRequest::Metadata(r) => r
                .options
                .as_ref()
                .is_some_and(|options| options.contains_key(META_ATOMIC_TX_GAS)),
            RosettaRequest::Parse(r) => is_atomic_envelope(&r.transaction),
            RosettaRequest::Combine(r) => is_atomic_envelope(&r.unsigned_transaction),
            RosettaRequest::Hash(r) => is_atomic_envelope(&r.signed_transaction),
            RosettaRequest::Submit(r) => is_atomic_envelope(&r.signed_transaction),
            _ => false,
        }
    }

    async fn account_balance(&self, req: &AccountBalanceRequest) -> RosettaResult<AccountBalanceResponse> {
        self.balance(req).await
    }

    async fn account_coins(&self, req: &AccountCoinsRequest) -> RosettaResult<AccountCoinsResponse> {
        self.coins(req).await
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
        combine::<AtomicTx>(req)
    }

    async fn construction_hash(
        &self,
        req: &ConstructionHashRequest,
    ) -> RosettaResult<TransactionIdentifierResponse> {
        hash::<AtomicTx>(&req.signed_transaction)
    }

    async fn construction_submit(
        &self,
        req: &ConstructionSubmitRequest,
    ) -> RosettaResult<TransactionIdentifierResponse> {
        self.submit(req).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use serde_json::json;

    use super::*;
    use crate::mapper::matcher::tests::operation;
    use crate::rosetta::types::AccountIdentifier;
    use crate::rosetta::types::CurveType;
    use crate::rosetta::types::PublicKey;
    use crate::tests::shared::c_address;
    use crate::tests::shared::c_backend;
    use crate::tests::shared::c_network;
    use crate::tests::shared::p_network;
    use crate::tests::shared::MockEvm;
    use crate::tests::shared::ShortIdSeed;

    fn balance_request(address: String) -> AccountBalanceRequest {
        AccountBalanceRequest {
            network_identifier: c_network(),
            account_identifier: AccountIdentifier::new(address),
            block_identifier: None,
            currencies: None,
        }
    }

    #[test]
    fn claims_bech32_accounts_only() {
        let (backend, _) = c_backend(MockEvm::default());
        let c = balance_request(c_address(ShortIdSeed::A));
        let evm = balance_request("0x3158e80abD5A1e1aa716003C9Db096792C379621".to_owned());
        assert!(backend.should_handle(&RosettaRequest::AccountBalance(&c)));
        assert!(!backend.should_handle(&RosettaRequest::AccountBalance(&evm)));

        let mut on_p = balance_request(c_address(ShortIdSeed::A));
        on_p.network_identifier = p_network();
        assert!(!backend.should_handle(&RosettaRequest::AccountBalance(&on_p)));
    }

    #[test]
    fn claims_atomic_construction() {
        let (backend, _) = c_backend(MockEvm::default());
        let preprocess = ConstructionPreprocessRequest {
            network_identifier: c_network(),
            operations: vec![operation(0, "EXPORT", "0xabc", -1, None)],
            metadata: None,
        };
        assert!(backend.should_handle(&RosettaRequest::Preprocess(&preprocess)));

        let transfer = ConstructionPreprocessRequest {
            operations: vec![operation(0, "CALL", "0xabc", -1, None)],
            ..preprocess
        };
        assert!(!backend.should_handle(&RosettaRequest::Preprocess(&transfer)));

        let metadata = ConstructionMetadataRequest {
            network_identifier: c_network(),
            options: serde_json::from_value(json!({ "atomic_tx_gas": 11230 })).ok(),
            public_keys: vec![],
        };
        assert!(backend.should_handle(&RosettaRequest::Metadata(&metadata)));
    }

    #[test]
    fn derive_in_bech32_when_asked() {
        let (backend, _) = c_backend(MockEvm::default());
        let req = ConstructionDeriveRequest {
            network_identifier: c_network(),
            public_key: PublicKey {
                hex_bytes: vec![2; 33],
                curve_type: CurveType::Secp256k1,
            },
            metadata: serde_json::from_value(json!({ "address_format": "bech32" })).ok(),
        };
        assert!(backend.should_handle(&RosettaRequest::Derive(&req)));
        let address = backend.derive(&req).unwrap().account_identifier.address;
        assert!(address.starts_with("C-fuji1"));

        let hex = ConstructionDeriveRequest { metadata: None, ..req };
        assert!(!backend.should_handle(&RosettaRequest::Derive(&hex)));
    }
}
