use tracing::instrument;

use super::PChainBackend;
use crate::mapper::pchain::TxType;
use crate::mapper::sync_stage;
use crate::protocol::address::ChainAlias;
use crate::rosetta::types::NetworkOptionsResponse;
use crate::rosetta::types::NetworkStatusResponse;
use crate::rosetta::RosettaResult;
use crate::service::network_options;
use crate::service::rosetta_peers;

impl PChainBackend {
    /// Until the node bootstraps the P-chain, genesis is reported as the tip.
    #[instrument(level = "debug", skip_all)]
    pub(super) async fn status(&self) -> RosettaResult<NetworkStatusResponse> {
        let genesis = self.genesis().await?;
        let bootstrapped = self.client.is_bootstrapped(ChainAlias::P.as_ref()).await?;
        let peers = rosetta_peers(self.client.peers().await?);

        let (current, timestamp) = match bootstrapped {
            false => (genesis.identifier.clone(), genesis.timestamp_ms()),
            true => match self.client.get_height().await? {
                0 => (genesis.identifier.clone(), genesis.timestamp_ms()),
                height => {
                    let block = self.fetch_block(height).await?;
                    (block.identifier, (block.timestamp as i64).saturating_mul(1000))
                }
            },
        };

        Ok(NetworkStatusResponse {
            current_block_identifier: current,
            current_block_timestamp: timestamp,
            genesis_block_identifier: genesis.identifier.clone(),
            oldest_block_identifier: None,
            sync_status: Some(sync_stage(bootstrapped)),
            peers,
        })
    }

    pub(super) async fn options(&self) -> RosettaResult<NetworkOptionsResponse> {
        let node_version = match self.config.is_offline() {
            true => String::new(),
            false => self.client.node_version().await?,
        };
        Ok(network_options(node_version, TxType::operation_types(), false))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;

    use super::*;
    use crate::mapper::STAGE_BOOTSTRAP;
    use crate::mapper::STAGE_SYNCED;
    use crate::tests::shared::p_backend;
    use crate::tests::shared::MockPChain;

    #[tokio::test]
    async fn bootstrapping_reports_genesis() {
        let (backend, client) = p_backend(MockPChain::default().with_blocks(5).bootstrapped(false));
        let status = backend.status().await.unwrap();
        assert!(status.current_block_identifier == status.genesis_block_identifier);
        assert!(status.current_block_identifier.hash == client.block_id(0).to_string());
        let sync = status.sync_status.unwrap();
        assert!(sync.stage.as_deref() == Some(STAGE_BOOTSTRAP));
        assert!(sync.synced == Some(false));
    }

    #[tokio::test]
    async fn synced_reports_the_tip() {
        let (backend, client) = p_backend(MockPChain::default().with_blocks(5));
        let status = backend.status().await.unwrap();
        assert!(status.current_block_identifier.index == 5);
        assert!(status.current_block_identifier.hash == client.block_id(5).to_string());
        assert!(status.sync_status.unwrap().stage.as_deref() == Some(STAGE_SYNCED));
        assert!(status.peers.len() == 1);
        assert!(status.peers[0].peer_id.starts_with("NodeID-"));
    }

    #[tokio::test]
    async fn options_list_platform_types() {
        let (backend, _) = p_backend(MockPChain::default());
        let options = backend.options().await.unwrap();
        assert!(!options.allow.historical_balance_lookup);
        assert!(options.allow.operation_types.contains(&"ADD_PERMISSIONLESS_DELEGATOR".to_owned()));
        assert!(options.allow.errors.len() == 12);
        assert!(options.version.node_version == crate::tests::shared::NODE_VERSION);
    }
}
