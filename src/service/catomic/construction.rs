use std::collections::HashMap;

use serde::Deserialize;
use tracing::instrument;

use super::CAtomicBackend;
use crate::mapper::atomic_avax_currency;
use crate::mapper::catomic::build_tx;
use crate::mapper::catomic::AtomicMetadata;
use crate::mapper::catomic::AtomicOptions;
use crate::mapper::catomic::AtomicTxParser;
use crate::mapper::from_metadata;
use crate::mapper::matcher::match_operations;
use crate::mapper::matcher::Match;
use crate::mapper::to_metadata;
use crate::mapper::OP_EXPORT;
use crate::mapper::OP_IMPORT;
use crate::protocol::address::chain_alias_of;
use crate::protocol::address::ChainAlias;
use crate::protocol::address::EvmAddress;
use crate::protocol::atomic::AtomicTx;
use crate::protocol::ids::Id;
use crate::rosetta::types::Amount;
use crate::rosetta::types::ConstructionDeriveRequest;
use crate::rosetta::types::ConstructionDeriveResponse;
use crate::rosetta::types::ConstructionMetadataRequest;
use crate::rosetta::types::ConstructionMetadataResponse;
use crate::rosetta::types::ConstructionParseRequest;
use crate::rosetta::types::ConstructionParseResponse;
use crate::rosetta::types::ConstructionPayloadsRequest;
use crate::rosetta::types::ConstructionPayloadsResponse;
use crate::rosetta::types::ConstructionPreprocessRequest;
use crate::rosetta::types::ConstructionPreprocessResponse;
use crate::rosetta::types::ConstructionSubmitRequest;
use crate::rosetta::types::Metadata;
use crate::rosetta::types::TransactionIdentifierResponse;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;
use crate::service::construction::derive_bech32;
use crate::service::construction::input_accounts;
use crate::service::construction::operation_signers;
use crate::service::construction::parse_signers;
use crate::service::construction::signing_payloads;
use crate::service::wire::RosettaTx;

/// Base fees are quoted in wei; fees are paid in nAVAX.
const WEI_PER_NAVAX: u128 = 1_000_000_000;

fn invalid(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InvalidInput, err)
}

fn internal(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InternalError, err)
}

fn typed_metadata<T: serde::de::DeserializeOwned + Default>(metadata: Option<&Metadata>) -> RosettaResult<T> {
    metadata
        .map(|m| from_metadata(m))
        .transpose()
        .map_err(invalid)
        .map(Option::unwrap_or_default)
}

/// What callers may pass to `/construction/preprocess`.
#[derive(Debug, Default, Deserialize)]
struct PreprocessMetadata {
    #[serde(default)]
    source_chain: String,
    #[serde(default)]
    nonce: String,
}

impl CAtomicBackend {
    pub(super) fn derive(&self, req: &ConstructionDeriveRequest) -> RosettaResult<ConstructionDeriveResponse> {
        derive_bech32(ChainAlias::C, self.config.hrp(), &req.public_key)
    }

    pub(super) fn preprocess(&self, req: &ConstructionPreprocessRequest) -> RosettaResult<ConstructionPreprocessResponse> {
        let matches = match_operations(&req.operations).map_err(invalid)?;
        let [inputs, outputs] = &matches;
        if inputs.operations.is_empty() || outputs.operations.is_empty() {
            return Err(invalid("both input and output operations must be specified"));
        }
        let op_type = req.operations[0].type_.as_str();
        let metadata: PreprocessMetadata = typed_metadata(req.metadata.as_ref())?;

        let mut options = AtomicOptions::default();
        match op_type {
            OP_IMPORT => {
                let source: ChainAlias = metadata
                    .source_chain
                    .parse()
                    .map_err(|_| invalid("invalid source_chain value"))?;
                if !matches!(source, ChainAlias::P | ChainAlias::X) {
                    return Err(invalid("invalid source_chain value"));
                }
                options.source_chain = source.to_string();
            }
            OP_EXPORT => {
                options.from = inputs.operations[0]
                    .account
                    .as_ref()
                    .map(|account| account.address.clone())
                    .unwrap_or_default();
                let destination = outputs.operations[0]
                    .account
                    .as_ref()
                    .and_then(|account| chain_alias_of(&account.address).ok())
                    .and_then(|alias| alias.parse::<ChainAlias>().ok())
                    .filter(|alias| matches!(alias, ChainAlias::P | ChainAlias::X))
                    .ok_or_else(|| invalid("invalid destination_chain value"))?;
                options.destination_chain = destination.to_string();
                if !metadata.nonce.is_empty() {
                    let nonce = metadata
                        .nonce
                        .parse()
                        .map_err(|_| invalid(format!("{} is not a valid nonce string", metadata.nonce)))?;
                    options.nonce = Some(nonce);
                }
            }
            other => return Err(invalid(format!("unsupported atomic operation type {other}"))),
        }
        options.atomic_tx_gas = self.estimate_gas(op_type, &matches)?;

        Ok(ConstructionPreprocessResponse {
            options: Some(to_metadata(&options).map_err(internal)?),
            required_public_keys: None,
        })
    }

    /// Gas of the transaction the operations build. Chain ids do not change
    /// the encoded size, so placeholders stand in for them.
    fn estimate_gas(&self, op_type: &str, matches: &[Match]) -> RosettaResult<u64> {
        let placeholder = AtomicMetadata {
            network_id: self.config.network.network_id(),
            c_chain_id: Id::EMPTY,
            source_chain_id: Some(Id::EMPTY),
            destination_chain_id: Some(Id::EMPTY),
            ..AtomicMetadata::default()
        };
        let (tx, _) = build_tx(op_type, matches, &placeholder, self.config.avax_asset_id).map_err(invalid)?;
        Ok(tx.gas_used(true))
    }

    #[instrument(level = "debug", skip_all)]
    pub(super) async fn metadata(&self, req: &ConstructionMetadataRequest) -> RosettaResult<ConstructionMetadataResponse> {
        let options: AtomicOptions = typed_metadata(req.options.as_ref())?;

        let mut metadata = AtomicMetadata {
            network_id: self.client.get_network_id().await?,
            c_chain_id: self.client.get_blockchain_id(ChainAlias::C.as_ref()).await?,
            ..AtomicMetadata::default()
        };
        if !options.source_chain.is_empty() {
            metadata.source_chain_id = Some(self.client.get_blockchain_id(&options.source_chain).await?);
        }
        if !options.destination_chain.is_empty() {
            metadata.destination_chain_id = Some(self.client.get_blockchain_id(&options.destination_chain).await?);
            metadata.destination_chain = options.destination_chain.clone();
        }
        metadata.nonce = match (options.nonce, options.from.is_empty()) {
            (Some(nonce), _) => nonce,
            (None, true) => 0,
            (None, false) => {
                let from: EvmAddress = options.from.parse().map_err(invalid)?;
                self.client.nonce_at(&from, None).await?
            }
        };

        let base_fee = self.client.estimate_base_fee().await?;
        let fee = u128::from(options.atomic_tx_gas)
            .checked_mul(base_fee)
            .map(|wei| wei / WEI_PER_NAVAX)
            .ok_or_else(|| internal("overflow while calculating fee"))?;

        Ok(ConstructionMetadataResponse {
            metadata: to_metadata(&metadata).map_err(internal)?,
            suggested_fee: Some(vec![Amount::new(fee, &atomic_avax_currency())]),
        })
    }

    pub(super) fn payloads(&self, req: &ConstructionPayloadsRequest) -> RosettaResult<ConstructionPayloadsResponse> {
        let matches = match_operations(&req.operations).map_err(invalid)?;
        let op_type = req.operations[0].type_.as_str();
        let metadata: AtomicMetadata = typed_metadata(req.metadata.as_ref())?;

        let (tx, signers) = build_tx(op_type, &matches, &metadata, self.config.avax_asset_id).map_err(invalid)?;
        let payloads = signing_payloads(&tx, &signers);

        let mut wire = RosettaTx::new(tx, operation_signers(&req.operations));
        if metadata.destination_chain_id.is_some() {
            wire = wire.with_destination(metadata.destination_chain.clone(), metadata.destination_chain_id);
        }
        Ok(ConstructionPayloadsResponse {
            unsigned_transaction: wire.encode()?,
            payloads,
        })
    }

    pub(super) fn parse(&self, req: &ConstructionParseRequest) -> RosettaResult<ConstructionParseResponse> {
        let wire = RosettaTx::<AtomicTx>::decode(&req.transaction)?;

        let mut chain_ids = HashMap::from([(Id::EMPTY, ChainAlias::P)]);
        if let Some(chain_id) = wire.destination_chain_id {
            let alias: ChainAlias = wire.destination_chain.parse().map_err(invalid)?;
            chain_ids.insert(chain_id, alias);
        }
        let accounts = input_accounts(&wire.signers);
        let operations = AtomicTxParser::new(self.config.hrp(), &chain_ids, &accounts)
            .parse(&wire.tx)
            .map_err(|e| invalid(format!("incorrect transaction input: {e}")))?;

        let signers = match req.signed {
            true => Some(parse_signers(&operations, &wire.signers)?),
            false => None,
        };
        Ok(ConstructionParseResponse {
            operations,
            account_identifier_signers: signers,
            metadata: None,
        })
    }

    #[instrument(level = "debug", skip_all)]
    pub(super) async fn submit(&self, req: &ConstructionSubmitRequest) -> RosettaResult<TransactionIdentifierResponse> {
        let wire = RosettaTx::<AtomicTx>::decode(&req.signed_transaction)?;
        let tx_id = self.client.issue_tx(&wire.tx.signed_bytes()).await?;
        Ok(TransactionIdentifierResponse::new(tx_id.to_string()))
    }
}
