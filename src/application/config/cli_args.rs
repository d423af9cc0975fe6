use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::network::Network;

/// Whether the server may talk to a node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIs,
)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Online,

    /// Only the purely symbolic construction endpoints are served.
    Offline,
}

/// The `avalanche-rosetta` command-line program serves the Rosetta API for
/// the Avalanche P-chain and C-chain.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Run `online` against a node, or `offline` for construction only.
    #[clap(long, default_value = "online")]
    pub mode: Mode,

    /// Base URL of the avalanchego node.
    ///
    /// The P-chain is reached at `/ext/bc/P`, the C-chain at `/ext/bc/C/rpc`
    /// and `/ext/bc/C/avax`, the info API at `/ext/info` and the P-chain block
    /// index at `/ext/index/P/block`.
    #[clap(long, default_value = "http://localhost:9650", value_name = "URL")]
    pub rpc_endpoint: String,

    /// Address the Rosetta HTTP server listens on.
    #[clap(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Specify network, `mainnet`, `fuji`, or `local`.
    #[clap(long, default_value = "mainnet", short)]
    pub network: Network,

    /// EVM chain id of the C-chain. Defaults to the one of the network.
    #[clap(long)]
    pub chain_id: Option<u64>,

    /// Number of UTXOs requested per `getAtomicUTXOs` page.
    #[clap(long, default_value = "1024", value_parser = clap::value_parser!(u32).range(1..))]
    pub utxos_page_size: u32,

    /// Deadline of a single node call, e.g. `30s` or `1m 30s`.
    #[clap(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub rpc_timeout: Duration,

    /// Log every Rosetta request body at debug level.
    #[clap(long)]
    pub log_requests: bool,

    /// JSON file describing the genesis block of the P-chain: its message,
    /// timestamp, transactions and allocation UTXOs.
    ///
    /// Without it the genesis block carries no allocations.
    #[clap(long, value_name = "FILE")]
    pub genesis_file: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}

impl Args {
    pub fn evm_chain_id(&self) -> u64 {
        self.chain_id.unwrap_or_else(|| self.network.evm_chain_id())
    }

    /// URL of a node API path such as `/ext/bc/P`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.rpc_endpoint.trim_end_matches('/'), path)
    }
}
