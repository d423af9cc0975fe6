use std::collections::HashMap;

use tracing::instrument;

use super::PChainBackend;
use crate::mapper::atomic_avax_currency;
use crate::mapper::from_metadata;
use crate::mapper::matcher::match_operations;
use crate::mapper::pchain::build_tx;
use crate::mapper::pchain::ConstructionMetadata;
use crate::mapper::pchain::ConstructionOptions;
use crate::mapper::pchain::ExportMetadata;
use crate::mapper::pchain::ImportMetadata;
use crate::mapper::pchain::TxParser;
use crate::mapper::pchain::TxParserConfig;
use crate::mapper::pchain::TxType;
use crate::mapper::to_metadata;
use crate::protocol::address::chain_alias_of;
use crate::protocol::address::ChainAlias;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::Tx;
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
use crate::rosetta::types::Operation;
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

fn invalid(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InvalidInput, err)
}

fn internal(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InternalError, err)
}

/// Transaction type named by the first operation.
fn tx_type_of(operations: &[Operation]) -> RosettaResult<TxType> {
    let op_type = operations.first().map(|op| op.type_.as_str()).unwrap_or_default();
    op_type
        .parse()
        .map_err(|_| invalid(format!("invalid tx type {op_type}")))
}

fn typed_metadata<T: serde::de::DeserializeOwned + Default>(metadata: Option<&Metadata>) -> RosettaResult<T> {
    metadata
        .map(|m| from_metadata(m))
        .transpose()
        .map_err(invalid)
        .map(Option::unwrap_or_default)
}

impl PChainBackend {
    pub(super) fn derive(&self, req: &ConstructionDeriveRequest) -> RosettaResult<ConstructionDeriveResponse> {
        derive_bech32(ChainAlias::P, self.config.hrp(), &req.public_key)
    }

    pub(super) fn preprocess(&self, req: &ConstructionPreprocessRequest) -> RosettaResult<ConstructionPreprocessResponse> {
        let matches = match_operations(&req.operations).map_err(invalid)?;
        let tx_type = tx_type_of(&req.operations)?;

        let mut options: ConstructionOptions = typed_metadata(req.metadata.as_ref())?;
        match tx_type {
            TxType::ExportAvax if options.destination_chain.is_empty() => {
                // the exported output is the one addressed outside the P-chain
                let destination = matches[1]
                    .operations
                    .iter()
                    .filter_map(|op| op.account.as_ref())
                    .filter_map(|account| chain_alias_of(&account.address).ok())
                    .find(|alias| alias != ChainAlias::P.as_ref())
                    .ok_or_else(|| invalid("destination_chain metadata must be provided"))?;
                options.destination_chain = destination;
            }
            TxType::ImportAvax if options.source_chain.is_empty() => {
                return Err(invalid("source_chain metadata must be provided"));
            }
            _ => {}
        }
        options.tx_type = tx_type.to_string();
        options.matches = Some(matches.to_vec());

        Ok(ConstructionPreprocessResponse {
            options: Some(to_metadata(&options).map_err(internal)?),
            required_public_keys: None,
        })
    }

    #[instrument(level = "debug", skip_all)]
    pub(super) async fn metadata(&self, req: &ConstructionMetadataRequest) -> RosettaResult<ConstructionMetadataResponse> {
        let options: ConstructionOptions = typed_metadata(req.options.as_ref())?;
        if options.matches.is_none() {
            return Err(invalid("matches not found in options"));
        }
        let unsupported = || internal(format!("invalid tx type for building metadata: {}", options.tx_type));
        let tx_type: TxType = options.tx_type.parse().map_err(|_| unsupported())?;

        let mut metadata = ConstructionMetadata {
            network_id: self.client.get_network_id().await?,
            blockchain_id: self.client.get_blockchain_id(ChainAlias::P.as_ref()).await?,
            ..ConstructionMetadata::default()
        };
        match tx_type {
            TxType::ImportAvax => {
                metadata.import = Some(ImportMetadata {
                    source_chain_id: self.client.get_blockchain_id(&options.source_chain).await?,
                });
            }
            TxType::ExportAvax => {
                metadata.export = Some(ExportMetadata {
                    destination_chain_id: self.client.get_blockchain_id(&options.destination_chain).await?,
                    destination_chain: options.destination_chain.clone(),
                });
            }
            staking if staking.is_staking() => metadata.staking = Some(options.staking.clone().into()),
            _ => return Err(unsupported()),
        }

        let fee = Amount::new(self.config.network.tx_fee(), &atomic_avax_currency());
        Ok(ConstructionMetadataResponse {
            metadata: to_metadata(&metadata).map_err(internal)?,
            suggested_fee: Some(vec![fee]),
        })
    }

    pub(super) fn payloads(&self, req: &ConstructionPayloadsRequest) -> RosettaResult<ConstructionPayloadsResponse> {
        let matches = match_operations(&req.operations).map_err(invalid)?;
        let tx_type = tx_type_of(&req.operations)?;
        let metadata: ConstructionMetadata = typed_metadata(req.metadata.as_ref())?;

        let (tx, signers) = build_tx(tx_type, &matches, &metadata, self.config.avax_asset_id).map_err(invalid)?;
        let payloads = signing_payloads(&tx, &signers);

        let mut wire = RosettaTx::new(tx, operation_signers(&req.operations));
        if let Some(export) = &metadata.export {
            wire = wire.with_destination(export.destination_chain.clone(), Some(export.destination_chain_id));
        }
        Ok(ConstructionPayloadsResponse {
            unsigned_transaction: wire.encode()?,
            payloads,
        })
    }

    pub(super) fn parse(&self, req: &ConstructionParseRequest) -> RosettaResult<ConstructionParseResponse> {
        let wire = RosettaTx::<Tx>::decode(&req.transaction)?;

        let mut chain_ids = HashMap::from([(Id::EMPTY, ChainAlias::P)]);
        if let Some(chain_id) = wire.destination_chain_id {
            let alias: ChainAlias = wire.destination_chain.parse().map_err(invalid)?;
            chain_ids.insert(chain_id, alias);
        }
        let cfg = TxParserConfig {
            construction: true,
            hrp: self.config.hrp().to_owned(),
            chain_ids,
            avax_asset_id: self.config.avax_asset_id,
            currencies: HashMap::new(),
        };
        let accounts = input_accounts(&wire.signers);
        let tx = TxParser::new(&cfg, &accounts, None)
            .parse(&wire.tx)
            .map_err(|e| invalid(format!("incorrect transaction input: {e}")))?;

        let signers = match req.signed {
            true => Some(parse_signers(&tx.operations, &wire.signers)?),
            false => None,
        };
        Ok(ConstructionParseResponse {
            operations: tx.operations,
            account_identifier_signers: signers,
            metadata: None,
        })
    }

    #[instrument(level = "debug", skip_all)]
    pub(super) async fn submit(&self, req: &ConstructionSubmitRequest) -> RosettaResult<TransactionIdentifierResponse> {
        let wire = RosettaTx::<Tx>::decode(&req.signed_transaction)?;
        let tx_id = self.client.issue_tx(&wire.tx.signed_bytes()).await?;
        Ok(TransactionIdentifierResponse::new(tx_id.to_string()))
    }
}
