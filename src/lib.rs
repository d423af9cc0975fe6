// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. Every `#[cfg(test)]` module is
// annotated with `#[cfg_attr(coverage_nightly, coverage(off))]`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod application;
pub mod client;
pub mod mapper;
pub mod protocol;
pub mod rosetta;
pub mod service;


use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use application::config::cli_args;
use application::config::genesis_file::GenesisFile;
use application::rest_server::run_rest_server;
use application::rest_server::RestState;
use client::rpc::Endpoints;
use client::EvmClient;
use client::GenesisInfo;
use client::PChainClient;
use client::RpcNodeClient;
use protocol::ids::Id;
use service::catomic::CAtomicBackend;
use service::cevm::CEvmBackend;
use service::dispatch::Dispatcher;
use service::pchain::PChainBackend;
use service::Backend;
use service::ServiceConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing::warn;

/// AVAX asset id of the configured network. Local networks mint their own,
/// so it is asked from the node.
async fn avax_asset_id(cli_args: &cli_args::Args, client: &dyn PChainClient) -> Result<Id> {
    if let Some(asset_id) = cli_args.network.avax_asset_id() {
        return Ok(asset_id);
    }
    if cli_args.mode.is_offline() {
        bail!("Network {} has no fixed AVAX asset id; run online.", cli_args.network);
    }
    let description = client
        .get_asset_description("AVAX")
        .await
        .context("Failed to look up the AVAX asset id")?;
    Ok(description.asset_id)
}

/// Refuses to serve a node of another network.
async fn check_node(cli_args: &cli_args::Args, client: &RpcNodeClient) -> Result<()> {
    let network_id = PChainClient::get_network_id(client).await?;
    if network_id != cli_args.network.network_id() {
        bail!(
            "Node is on network {network_id}, expected {} ({}).",
            cli_args.network.network_id(),
            cli_args.network
        );
    }
    let chain_id = client.chain_id().await?;
    if chain_id != cli_args.evm_chain_id() {
        bail!("Node serves EVM chain {chain_id}, expected {}.", cli_args.evm_chain_id());
    }
    Ok(())
}

pub async fn initialize(cli_args: cli_args::Args) -> Result<()> {
    info!(
        "Starting avalanche-rosetta in {} mode on {}.",
        cli_args.mode, cli_args.network
    );

    let genesis = match &cli_args.genesis_file {
        Some(path) => GenesisFile::load(path).await?.decode()?,
        None => {
            warn!("No genesis file given; the P-chain genesis block carries no allocations.");
            GenesisInfo::default()
        }
    };
    let client = Arc::new(RpcNodeClient::new(
        Endpoints::from_args(&cli_args),
        cli_args.rpc_timeout,
        genesis,
    ));
    if cli_args.mode.is_online() {
        check_node(&cli_args, &client).await?;
    }

    let mut config = ServiceConfig::new(
        cli_args.mode,
        cli_args.network,
        avax_asset_id(&cli_args, client.as_ref()).await?,
    );
    config.utxos_page_size = cli_args.utxos_page_size;
    config.evm_chain_id = cli_args.evm_chain_id();
    let config = Arc::new(config);

    let backends: Vec<Arc<dyn Backend>> = vec![
        Arc::new(PChainBackend::new(config.clone(), client.clone())),
        Arc::new(CAtomicBackend::new(config.clone(), client.clone())),
        Arc::new(CEvmBackend::new(config.clone(), client)),
    ];
    let dispatcher = Arc::new(Dispatcher::new(config, backends));

    let listener = TcpListener::bind(cli_args.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", cli_args.listen_addr))?;
    run_rest_server(listener, RestState::new(dispatcher, cli_args.log_requests)).await
}
