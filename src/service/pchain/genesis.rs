use std::sync::Arc;

use tracing::instrument;

use super::resolver::decode_utxo_set;
use super::PChainBackend;
use crate::mapper::pchain::dependency::genesis_allocation_tx;
use crate::mapper::to_metadata;
use crate::mapper::META_MESSAGE;
use crate::protocol::avax::Utxo;
use crate::protocol::platformvm::proposer::unwrap_block;
use crate::protocol::platformvm::Block as PlatformBlock;
use crate::protocol::platformvm::Tx;
use crate::rosetta::types::Block;
use crate::rosetta::types::BlockIdentifier;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;

/// Height zero of the P-chain. The index starts at height one, so the
/// genesis id is taken from the parent of the first indexed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct GenesisBlock {
    pub identifier: BlockIdentifier,
    /// Unix seconds.
    pub timestamp: u64,
    pub message: String,
    pub txs: Vec<Tx>,
    pub utxos: Vec<Utxo>,
}

impl GenesisBlock {
    pub fn timestamp_ms(&self) -> i64 {
        i64::try_from(self.timestamp)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    /// The synthetic transaction handing out the initial allocations.
    pub fn allocation_tx(&self) -> Tx {
        genesis_allocation_tx(&self.utxos)
    }
}

impl PChainBackend {
    #[instrument(level = "debug", skip_all)]
    pub(super) async fn genesis(&self) -> RosettaResult<Arc<GenesisBlock>> {
        self.genesis
            .get_or_try_init(|| async {
                let info = self.client.get_genesis().await?;
                let first = self.client.get_container_by_index(0).await?;
                let (inner, _) = unwrap_block(&first.bytes);
                let first = PlatformBlock::from_bytes(&inner)
                    .map_err(|e| RosettaError::wrap(ErrorKind::InternalError, e))?;

                let txs = info
                    .txs
                    .iter()
                    .map(|bytes| Tx::from_bytes(bytes))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| RosettaError::wrap(ErrorKind::InternalError, e))?;
                let utxos = decode_utxo_set(&info.utxos)
                    .map_err(|e| RosettaError::wrap(ErrorKind::InternalError, e))?;

                Ok::<_, RosettaError>(Arc::new(GenesisBlock {
                    identifier: BlockIdentifier {
                        index: 0,
                        hash: first.parent_id.to_string(),
                    },
                    timestamp: info.timestamp,
                    message: info.message,
                    txs,
                    utxos,
                }))
            })
            .await
            .cloned()
    }

    /// The genesis block with its allocation and genesis transactions. The
    /// genesis block is its own parent.
    pub(super) async fn genesis_rosetta_block(&self) -> RosettaResult<Block> {
        let genesis = self.genesis().await?;
        let allocation = genesis.allocation_tx();
        let txs: Vec<Tx> = std::iter::once(allocation).chain(genesis.txs.iter().cloned()).collect();
        let transactions = self.parse_indexed(&txs).await?;

        let metadata = to_metadata(&serde_json::json!({ META_MESSAGE: genesis.message }))
            .map_err(|e| RosettaError::wrap(ErrorKind::InternalError, e))?;
        Ok(Block {
            block_identifier: genesis.identifier.clone(),
            parent_block_identifier: genesis.identifier.clone(),
            timestamp: genesis.timestamp_ms(),
            transactions,
            metadata: Some(metadata),
        })
    }
}
