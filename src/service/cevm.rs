//! The C-chain EVM backend. It answers every C-chain request no other
//! backend claims: plain account balances, block headers and the mempool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use crate::client::EvmBlock;
use crate::client::EvmClient;
use crate::client::EvmHeader;
use crate::mapper::avax_currency;
use crate::mapper::sync_stage;
use crate::mapper::to_metadata;
use crate::mapper::AVAX_SYMBOL;
use crate::mapper::C_OPERATION_TYPES;
use crate::mapper::EVM_AVAX_DECIMALS;
use crate::mapper::META_DIFFICULTY;
use crate::mapper::META_GAS_LIMIT;
use crate::mapper::META_GAS_USED;
use crate::mapper::META_NONCE;
use crate::mapper::META_SIZE;
use crate::protocol::address::ChainAlias;
use crate::protocol::address::EvmAddress;
use crate::rosetta::types::AccountBalanceRequest;
use crate::rosetta::types::AccountBalanceResponse;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Amount;
use crate::rosetta::types::Block;
use crate::rosetta::types::BlockIdentifier;
use crate::rosetta::types::BlockRequest;
use crate::rosetta::types::BlockResponse;
use crate::rosetta::types::BlockTransactionRequest;
use crate::rosetta::types::BlockTransactionResponse;
use crate::rosetta::types::CallRequest;
use crate::rosetta::types::CallResponse;
use crate::rosetta::types::ConstructionDeriveRequest;
use crate::rosetta::types::ConstructionDeriveResponse;
use crate::rosetta::types::CurveType;
use crate::rosetta::types::MempoolResponse;
use crate::rosetta::types::NetworkOptionsResponse;
use crate::rosetta::types::NetworkRequest;
use crate::rosetta::types::NetworkStatusResponse;
use crate::rosetta::types::PartialBlockIdentifier;
use crate::rosetta::types::Transaction;
use crate::rosetta::types::TransactionIdentifier;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;
use crate::service::network_options;
use crate::service::rosetta_peers;
use crate::service::Backend;
use crate::service::RosettaRequest;
use crate::service::ServiceConfig;

fn invalid(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InvalidInput, err)
}

fn internal(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InternalError, err)
}

fn block_identifier(header: &EvmHeader) -> BlockIdentifier {
    BlockIdentifier {
        index: header.number as i64,
        hash: header.hash.clone(),
    }
}

fn timestamp_ms(header: &EvmHeader) -> i64 {
    i64::try_from(header.timestamp)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000)
}

pub struct CEvmBackend {
    config: Arc<ServiceConfig>,
    client: Arc<dyn EvmClient>,
}

impl CEvmBackend {
    pub fn new(config: Arc<ServiceConfig>, client: Arc<dyn EvmClient>) -> Self {
        Self { config, client }
    }

    async fn block_at(&self, id: &PartialBlockIdentifier) -> RosettaResult<EvmBlock> {
        let block = match (&id.hash, id.index) {
            (Some(hash), _) => self.client.block_by_hash(hash).await?,
            (None, Some(index)) => {
                let number = u64::try_from(index).map_err(|_| ErrorKind::BlockInvalidInput)?;
                self.client.block_by_number(Some(number)).await?
            }
            (None, None) => self.client.block_by_number(None).await?,
        };
        if let (Some(index), Some(_)) = (id.index, &id.hash) {
            if index != block.header.number as i64 {
                return Err(invalid(
                    "provided block height does not match height of the block with given hash",
                ));
            }
        }
        Ok(block)
    }

    /// Genesis is its own parent.
    fn rosetta_block(block: EvmBlock) -> RosettaResult<Block> {
        let header = &block.header;
        let parent = match header.number {
            0 => block_identifier(header),
            number => BlockIdentifier {
                index: number as i64 - 1,
                hash: header.parent_hash.clone(),
            },
        };
        let metadata = to_metadata(&json!({
            META_GAS_LIMIT: header.gas_limit,
            META_GAS_USED: header.gas_used,
            META_DIFFICULTY: header.difficulty,
            META_NONCE: header.nonce,
            META_SIZE: header.size,
        }))
        .map_err(internal)?;
        let transactions = block
            .transactions
            .iter()
            .map(|hash| Transaction {
                transaction_identifier: TransactionIdentifier { hash: hash.clone() },
                operations: vec![],
                metadata: None,
            })
            .collect();
        Ok(Block {
            block_identifier: block_identifier(header),
            parent_block_identifier: parent,
            timestamp: timestamp_ms(header),
            transactions,
            metadata: Some(metadata),
        })
    }
}

#[async_trait]
impl Backend for CEvmBackend {
    fn should_handle(&self, req: &RosettaRequest<'_>) -> bool {
        req.network_identifier().sub_network().is_none()
    }

    #[instrument(level = "debug", skip_all)]
    async fn network_status(&self, _req: &NetworkRequest) -> RosettaResult<NetworkStatusResponse> {
        let head = self.client.header_by_number(None).await?;
        let genesis = self.client.header_by_number(Some(0)).await?;
        let bootstrapped = self.client.is_bootstrapped(ChainAlias::C.as_ref()).await?;
        let peers = rosetta_peers(self.client.peers().await?);
        Ok(NetworkStatusResponse {
            current_block_identifier: block_identifier(&head),
            current_block_timestamp: timestamp_ms(&head),
            genesis_block_identifier: block_identifier(&genesis),
            oldest_block_identifier: None,
            sync_status: Some(sync_stage(bootstrapped)),
            peers,
        })
    }

    async fn network_options(&self, _req: &NetworkRequest) -> RosettaResult<NetworkOptionsResponse> {
        let node_version = match self.config.is_offline() {
            true => String::new(),
            false => self.client.node_version().await?,
        };
        let operation_types = C_OPERATION_TYPES.iter().map(|t| (*t).to_owned()).collect();
        Ok(network_options(node_version, operation_types, true))
    }

    #[instrument(level = "debug", skip_all)]
    async fn account_balance(&self, req: &AccountBalanceRequest) -> RosettaResult<AccountBalanceResponse> {
        let address: EvmAddress = req.account_identifier.address.parse().map_err(invalid)?;
        let unsupported = req.currencies.iter().flatten().any(|currency| {
            currency.symbol != AVAX_SYMBOL || currency.decimals != EVM_AVAX_DECIMALS
        });
        if unsupported {
            return Err(invalid("only AVAX balances are supported"));
        }

        let header = match &req.block_identifier {
            Some(id) => self.block_at(id).await?.header,
            None => self.client.header_by_number(None).await?,
        };
        let balance = self.client.balance_at(&address, Some(header.number)).await?;
        let nonce = self.client.nonce_at(&address, Some(header.number)).await?;

        Ok(AccountBalanceResponse {
            block_identifier: block_identifier(&header),
            balances: vec![Amount::new(balance, &avax_currency())],
            metadata: Some(to_metadata(&json!({ META_NONCE: nonce })).map_err(internal)?),
        })
    }

    #[instrument(level = "debug", skip_all)]
    async fn block(&self, req: &BlockRequest) -> RosettaResult<BlockResponse> {
        let block = self.block_at(&req.block_identifier).await?;
        Ok(BlockResponse {
            block: Some(Self::rosetta_block(block)?),
            other_transactions: vec![],
        })
    }

    async fn block_transaction(
        &self,
        req: &BlockTransactionRequest,
    ) -> RosettaResult<BlockTransactionResponse> {
        let id = PartialBlockIdentifier {
            index: Some(req.block_identifier.index),
            hash: Some(req.block_identifier.hash.clone()),
        };
        let block = Self::rosetta_block(self.block_at(&id).await?)?;
        block
            .transactions
            .into_iter()
            .find(|tx| tx.transaction_identifier == req.transaction_identifier)
            .map(|transaction| BlockTransactionResponse { transaction })
            .ok_or_else(|| ErrorKind::TransactionNotFound.into())
    }

    async fn mempool(&self, _req: &NetworkRequest) -> RosettaResult<MempoolResponse> {
        let pending = self.client.txpool_content().await?;
        Ok(MempoolResponse {
            transaction_identifiers: pending
                .into_iter()
                .map(|hash| TransactionIdentifier { hash })
                .collect(),
        })
    }

    async fn construction_derive(
        &self,
        req: &ConstructionDeriveRequest,
    ) -> RosettaResult<ConstructionDeriveResponse> {
        if req.public_key.curve_type != CurveType::Secp256k1 {
            return Err(invalid("unsupported curve type"));
        }
        let address = EvmAddress::from_public_key(&req.public_key.hex_bytes).map_err(invalid)?;
        Ok(ConstructionDeriveResponse {
            address: None,
            account_identifier: AccountIdentifier::new(address.to_string()),
            metadata: None,
        })
    }

    async fn call(&self, _req: &CallRequest) -> RosettaResult<CallResponse> {
        Err(ErrorKind::CallInvalidMethod.into())
    }
}
