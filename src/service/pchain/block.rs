use std::collections::BTreeSet;
use std::collections::HashMap;

use futures::future::try_join_all;
use tracing::debug;
use tracing::instrument;

use super::PChainBackend;
use crate::mapper::pchain::dependency::referenced_accounts;
use crate::mapper::pchain::BlockTxDependencies;
use crate::mapper::pchain::TxParser;
use crate::mapper::pchain::TxParserConfig;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::proposer::unwrap_block;
use crate::protocol::platformvm::Block as PlatformBlock;
use crate::protocol::platformvm::Tx;
use crate::protocol::platformvm::UnsignedTx;
use crate::rosetta::types::Block;
use crate::rosetta::types::BlockIdentifier;
use crate::rosetta::types::BlockTransactionRequest;
use crate::rosetta::types::BlockTransactionResponse;
use crate::rosetta::types::Currency;
use crate::rosetta::types::PartialBlockIdentifier;
use crate::rosetta::types::Transaction;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;

/// Proposer timestamps before the proposer VM went live are not trusted.
const PROPOSER_ACTIVATION_TIME: i64 = 1_599_696_000;

/// A decoded block of the platform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct IndexedBlock {
    pub identifier: BlockIdentifier,
    pub parent: BlockIdentifier,
    /// Unix seconds.
    pub timestamp: u64,
    pub txs: Vec<Tx>,
}

fn internal(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InternalError, err)
}

impl PChainBackend {
    /// Block at `height`, which must be above genesis. Container `i` of the
    /// index holds the block at height `i + 1`.
    pub(super) async fn fetch_block(&self, height: u64) -> RosettaResult<IndexedBlock> {
        let index = height.checked_sub(1).ok_or(ErrorKind::BlockInvalidInput)?;
        let container = self.client.get_container_by_index(index).await?;
        let (inner, proposer_time) = unwrap_block(&container.bytes);
        let block = PlatformBlock::from_bytes(&inner).map_err(internal)?;

        let mut timestamp = match (block.time, proposer_time) {
            (Some(time), _) => time,
            (None, Some(time)) if time > PROPOSER_ACTIVATION_TIME => time as u64,
            _ => self.genesis().await?.timestamp,
        };
        for tx in &block.txs {
            if let UnsignedTx::AdvanceTime(advance) = &tx.unsigned {
                timestamp = advance.time;
            }
        }

        Ok(IndexedBlock {
            identifier: BlockIdentifier {
                index: height as i64,
                hash: Id::of(&inner).to_string(),
            },
            parent: BlockIdentifier {
                index: height as i64 - 1,
                hash: block.parent_id.to_string(),
            },
            timestamp,
            txs: block.txs,
        })
    }

    /// Height named by a partial identifier; a hash wins over an index and
    /// must agree with it when both are given.
    async fn resolve_height(&self, id: &PartialBlockIdentifier) -> RosettaResult<u64> {
        if let Some(hash) = &id.hash {
            let genesis = self.genesis().await?;
            let height = if *hash == genesis.identifier.hash {
                0
            } else {
                let block_id: Id = hash
                    .parse()
                    .map_err(|e| RosettaError::wrap(ErrorKind::BlockInvalidInput, e))?;
                let bytes = self.client.get_block(block_id).await?;
                PlatformBlock::from_bytes(&bytes).map_err(internal)?.height
            };
            if let Some(index) = id.index {
                if index != height as i64 {
                    return Err(RosettaError::wrap(
                        ErrorKind::InvalidInput,
                        "provided block height does not match height of the block with given hash",
                    ));
                }
            }
            return Ok(height);
        }
        match id.index {
            Some(index) if index >= 0 => Ok(index as u64),
            _ => Err(ErrorKind::BlockInvalidInput.into()),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub(super) async fn block_by_identifier(&self, id: &PartialBlockIdentifier) -> RosettaResult<Block> {
        let height = self.resolve_height(id).await?;
        if height == 0 {
            return self.genesis_rosetta_block().await;
        }
        let block = self.fetch_block(height).await?;
        let transactions = self.parse_indexed(&block.txs).await?;
        Ok(Block {
            block_identifier: block.identifier,
            parent_block_identifier: block.parent,
            timestamp: (block.timestamp as i64).saturating_mul(1000),
            transactions,
            metadata: None,
        })
    }

    pub(super) async fn transaction_in_block(
        &self,
        req: &BlockTransactionRequest,
    ) -> RosettaResult<BlockTransactionResponse> {
        let id = PartialBlockIdentifier {
            index: Some(req.block_identifier.index),
            hash: Some(req.block_identifier.hash.clone()),
        };
        let block = self.block_by_identifier(&id).await?;
        block
            .transactions
            .into_iter()
            .find(|tx| tx.transaction_identifier == req.transaction_identifier)
            .map(|transaction| BlockTransactionResponse { transaction })
            .ok_or_else(|| ErrorKind::TransactionNotFound.into())
    }

    /// Parses indexed transactions with their dependencies resolved and every
    /// asset they touch described up front.
    pub(super) async fn parse_indexed(&self, txs: &[Tx]) -> RosettaResult<Vec<Transaction>> {
        let deps = self.resolver.resolve(txs).await?;
        let accounts = referenced_accounts(&deps, self.config.hrp()).map_err(internal)?;
        let cfg = TxParserConfig {
            construction: false,
            hrp: self.config.hrp().to_owned(),
            chain_ids: self.chain_ids().await?.clone(),
            avax_asset_id: self.config.avax_asset_id,
            currencies: self.currencies(txs, &deps).await?,
        };
        TxParser::new(&cfg, &accounts, Some(&deps))
            .parse_all(txs)
            .map_err(internal)
    }

    /// Descriptions of the non-AVAX assets a batch moves.
    async fn currencies(&self, txs: &[Tx], deps: &BlockTxDependencies) -> RosettaResult<HashMap<Id, Currency>> {
        let mut assets = BTreeSet::new();
        for tx in txs {
            let unsigned = &tx.unsigned;
            assets.extend(unsigned.outs().iter().chain(unsigned.stake_outs()).map(|out| out.asset_id));
            assets.extend(unsigned.ins().iter().map(|input| input.asset_id));
            match unsigned {
                UnsignedTx::Import(import) => {
                    assets.extend(import.imported_inputs.iter().map(|input| input.asset_id));
                }
                UnsignedTx::Export(export) => {
                    assets.extend(export.exported_outputs.iter().map(|out| out.asset_id));
                }
                _ => {}
            }
        }
        for dep in deps.values() {
            assets.extend(dep.reward_utxos.iter().map(|utxo| utxo.asset_id));
        }
        assets.remove(&self.config.avax_asset_id);
        if assets.is_empty() {
            return Ok(HashMap::new());
        }

        debug!(count = assets.len(), "describing non-AVAX assets");
        let descriptions = try_join_all(assets.iter().map(|asset| async move { self.client.get_asset_description(&asset.to_string()).await })).await?;
        Ok(assets
            .into_iter()
            .zip(descriptions)
            .map(|(asset, description)| {
                let currency = Currency {
                    symbol: description.symbol,
                    decimals: i32::from(description.denomination),
                    metadata: None,
                };
                (asset, currency)
            })
            .collect())
    }

    /// Identifier of the block at `height`.
    pub(super) async fn block_identifier_at(&self, height: u64) -> RosettaResult<BlockIdentifier> {
        if height == 0 {
            return Ok(self.genesis().await?.identifier.clone());
        }
        Ok(self.fetch_block(height).await?.identifier)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::tests::shared::p_backend;
    use crate::tests::shared::MockPChain;
    use crate::tests::shared::ShortIdSeed;
    use crate::tests::shared::GENESIS_TIMESTAMP;

    fn by_index(index: i64) -> PartialBlockIdentifier {
        PartialBlockIdentifier {
            index: Some(index),
            hash: None,
        }
    }

    #[tokio::test]
    async fn blocks_link_to_their_parent() {
        let (backend, client) = p_backend(MockPChain::default().with_blocks(3));
        let block = backend.block_by_identifier(&by_index(2)).await.unwrap();
        assert!(block.block_identifier.index == 2);
        assert!(block.block_identifier.hash == client.block_id(2).to_string());
        assert!(block.parent_block_identifier.index == 1);
        assert!(block.parent_block_identifier.hash == client.block_id(1).to_string());
    }

    #[tokio::test]
    async fn apricot_blocks_fall_back_to_genesis_time() {
        let (backend, _) = p_backend(MockPChain::default().with_blocks(2));
        let block = backend.block_by_identifier(&by_index(1)).await.unwrap();
        assert!(block.timestamp == GENESIS_TIMESTAMP as i64 * 1000);
    }

    #[tokio::test]
    async fn height_zero_is_genesis() {
        let client = MockPChain::default()
            .with_genesis_utxo(ShortIdSeed::A, 1)
            .with_blocks(1);
        let (backend, client) = p_backend(client);
        let block = backend.block_by_identifier(&by_index(0)).await.unwrap();
        assert!(block.block_identifier.hash == client.block_id(0).to_string());

        let by_hash = PartialBlockIdentifier {
            index: None,
            hash: Some(client.block_id(0).to_string()),
        };
        let block = backend.block_by_identifier(&by_hash).await.unwrap();
        assert!(block.block_identifier.index == 0);
    }

    #[tokio::test]
    async fn mismatched_hash_and_index() {
        let (backend, client) = p_backend(MockPChain::default().with_blocks(3));
        let id = PartialBlockIdentifier {
            index: Some(1),
            hash: Some(client.block_id(2).to_string()),
        };
        let_assert!(Err(err) = backend.block_by_identifier(&id).await);
        assert!(err.is(ErrorKind::InvalidInput));
        assert!(err.detail() == Some("provided block height does not match height of the block with given hash"));
    }

    #[tokio::test]
    async fn empty_identifier_is_invalid() {
        let (backend, _) = p_backend(MockPChain::default().with_blocks(1));
        let_assert!(Err(err) = backend.block_by_identifier(&PartialBlockIdentifier::default()).await);
        assert!(err.is(ErrorKind::BlockInvalidInput));
    }

    #[tokio::test]
    async fn absent_transaction_is_not_found() {
        let (backend, client) = p_backend(MockPChain::default().with_blocks(2));
        let req = BlockTransactionRequest {
            network_identifier: crate::tests::shared::p_network(),
            block_identifier: BlockIdentifier {
                index: 1,
                hash: client.block_id(1).to_string(),
            },
            transaction_identifier: crate::rosetta::types::TransactionIdentifier {
                hash: Id([7; 32]).to_string(),
            },
        };
        let_assert!(Err(err) = backend.transaction_in_block(&req).await);
        assert!(err.is(ErrorKind::TransactionNotFound));
    }
}
