//! Fetches the transactions a block's inputs were produced by.
//!
//! One task per producing transaction; the first failure cancels the rest and
//! nothing of a failed batch is returned.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::client::ClientError;
use crate::client::PChainClient;
use crate::mapper::pchain::dependency::batch_dependency_ids;
use crate::mapper::pchain::dependency::genesis_allocation_tx;
use crate::mapper::pchain::BlockTxDependencies;
use crate::mapper::pchain::DependencyTx;
use crate::protocol::avax::Utxo;
use crate::protocol::codec::CodecError;
use crate::protocol::codec::CodecManager;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::Tx;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unable to decode dependency {id}: {source}")]
    Decode { id: Id, source: CodecError },

    #[error("dependency fetch cancelled")]
    Cancelled,

    #[error("dependency task failed: {0}")]
    Task(String),
}

impl From<ResolveError> for RosettaError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Client(err) => err.into(),
            other => RosettaError::wrap(ErrorKind::InternalError, other),
        }
    }
}

/// Decodes every UTXO, multisig ones included.
pub(super) fn decode_utxo_set(raw: &[Vec<u8>]) -> Result<Vec<Utxo>, CodecError> {
    let codec = CodecManager::default();
    raw.iter()
        .map(|bytes| codec.unmarshal::<Utxo>(bytes).map(|(utxo, _)| utxo))
        .collect()
}

pub struct DependencyResolver {
    client: Arc<dyn PChainClient>,
    genesis: OnceCell<DependencyTx>,
}

impl DependencyResolver {
    pub fn new(client: Arc<dyn PChainClient>) -> Self {
        Self {
            client,
            genesis: OnceCell::new(),
        }
    }

    /// Producing transactions of every input in `txs`, keyed by id.
    pub async fn resolve(&self, txs: &[Tx]) -> Result<BlockTxDependencies, ResolveError> {
        let ids = batch_dependency_ids(txs);
        let mut deps = BlockTxDependencies::with_capacity(ids.len());
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for id in ids {
            if id == Id::EMPTY {
                deps.insert(id, self.genesis_dependency().await?);
                continue;
            }
            let client = self.client.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ResolveError::Cancelled),
                    dep = fetch_dependency(client.as_ref(), id) => dep,
                }
            });
        }
        debug!(count = tasks.len(), "fetching dependency transactions");

        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| ResolveError::Task(e.to_string()))
                .and_then(|dep| dep);
            match result {
                Ok(dep) => {
                    deps.insert(dep.id, dep);
                }
                Err(err) => {
                    warn!(pending = tasks.len(), "dependency fetch failed, cancelling the batch: {err}");
                    cancel.cancel();
                    tasks.shutdown().await;
                    return Err(err);
                }
            }
        }
        Ok(deps)
    }

    /// The genesis allocations as the producer of the zero transaction id.
    async fn genesis_dependency(&self) -> Result<DependencyTx, ResolveError> {
        self.genesis
            .get_or_try_init(|| async {
                let genesis = self.client.get_genesis().await?;
                let utxos = decode_utxo_set(&genesis.utxos)
                    .map_err(|source| ResolveError::Decode { id: Id::EMPTY, source })?;
                Ok(DependencyTx::genesis(genesis_allocation_tx(&utxos), &utxos))
            })
            .await
            .cloned()
    }
}

async fn fetch_dependency(client: &dyn PChainClient, id: Id) -> Result<DependencyTx, ResolveError> {
    let bytes = client.get_tx(id).await?;
    let tx = Tx::from_bytes(&bytes).map_err(|source| ResolveError::Decode { id, source })?;
    let reward_utxos = if tx.unsigned.is_staker() {
        let raw = client.get_reward_utxos(id).await?;
        decode_utxo_set(&raw).map_err(|source| ResolveError::Decode { id, source })?
    } else {
        vec![]
    };
    Ok(DependencyTx::new(id, Some(tx), reward_utxos))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use assert2::assert;
    use assert2::let_assert;
    use tracing_test::traced_test;

    use super::*;
    use crate::protocol::avax::UtxoId;
    use crate::tests::shared::producer_tx;
    use crate::tests::shared::spending_tx;
    use crate::tests::shared::MockPChain;
    use crate::tests::shared::ShortIdSeed;

    #[tokio::test]
    async fn resolves_every_producer() {
        let a = producer_tx(1, 100);
        let b = producer_tx(2, 200);
        let client = MockPChain::default().with_tx(&a).with_tx(&b);
        let resolver = DependencyResolver::new(Arc::new(client));

        let txs = [spending_tx(&[UtxoId::new(a.id(), 0), UtxoId::new(b.id(), 0)])];
        let deps = resolver.resolve(&txs).await.unwrap();
        assert!(deps.len() == 2);
        assert!(deps[&a.id()].tx.as_ref() == Some(&a));
        assert!(deps[&b.id()].utxos().contains_key(&UtxoId::new(b.id(), 0)));
    }

    #[traced_test]
    #[tokio::test]
    async fn first_failure_cancels_the_batch() {
        let slow = producer_tx(1, 100);
        let missing = producer_tx(2, 200);
        let client = MockPChain::default()
            .with_tx(&slow)
            .with_delay(Duration::from_secs(30));
        let client = Arc::new(client);
        let resolver = DependencyResolver::new(client.clone());

        let txs = [
            spending_tx(&[UtxoId::new(slow.id(), 0)]),
            spending_tx(&[UtxoId::new(missing.id(), 0)]),
        ];
        let started = tokio::time::Instant::now();
        let_assert!(Err(ResolveError::Client(_)) = resolver.resolve(&txs).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(logs_contain("cancelling the batch"));
    }

    #[tokio::test]
    async fn genesis_inputs_resolve_to_the_allocation() {
        let client = MockPChain::default().with_genesis_utxo(ShortIdSeed::A, 5_000);
        let resolver = DependencyResolver::new(Arc::new(client));

        let txs = [spending_tx(&[UtxoId::new(Id::EMPTY, 0)])];
        let deps = resolver.resolve(&txs).await.unwrap();
        let genesis = &deps[&Id::EMPTY];
        assert!(genesis.utxos().contains_key(&UtxoId::new(Id::EMPTY, 0)));
        assert!(genesis.tx.is_some());
    }

}
