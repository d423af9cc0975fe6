use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIs;
use strum::EnumIter;

use crate::protocol::ids::Id;

const MAINNET_AVAX_ASSET_ID: &str = "FvwEAhmxKfeiG8SnEvq42hc6whRyY3EFYAvebMqDNDGCgxN5Z";
const FUJI_AVAX_ASSET_ID: &str = "U8iRqJoiJm8xZHAacmvYyZVwqQx6uDNtQeP3CQ6fcgQk3JqnK";

/// Flat fee of every P-chain transaction under the static fee schedule,
/// in nAVAX.
pub const STATIC_TX_FEE: u64 = 1_000_000;

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default, EnumIter, EnumIs)]
pub enum Network {
    /// Avalanche primary network.
    #[default]
    Mainnet,

    /// Public test network.
    Fuji,

    /// A locally run network, as started by the node's local genesis. The
    /// AVAX asset id is not fixed and is looked up from the node.
    Local,
}

impl Network {
    pub fn network_id(&self) -> u32 {
        match self {
            Self::Mainnet => 1,
            Self::Fuji => 5,
            Self::Local => 12345,
        }
    }

    /// Human readable part of bech32 addresses.
    pub fn hrp(&self) -> &'static str {
        match self {
            Self::Mainnet => "avax",
            Self::Fuji => "fuji",
            Self::Local => "local",
        }
    }

    /// Name reported in Rosetta network identifiers.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mainnet => "Mainnet",
            Self::Fuji => "Fuji",
            Self::Local => "Local",
        }
    }

    /// EVM chain id of the C-chain.
    pub fn evm_chain_id(&self) -> u64 {
        match self {
            Self::Mainnet => 43114,
            Self::Fuji => 43113,
            Self::Local => 43112,
        }
    }

    pub fn avax_asset_id(&self) -> Option<Id> {
        match self {
            Self::Mainnet => MAINNET_AVAX_ASSET_ID.parse().ok(),
            Self::Fuji => FUJI_AVAX_ASSET_ID.parse().ok(),
            Self::Local => None,
        }
    }

    pub fn tx_fee(&self) -> u64 {
        STATIC_TX_FEE
    }

    pub fn from_network_id(network_id: u32) -> Option<Self> {
        match network_id {
            1 => Some(Self::Mainnet),
            5 => Some(Self::Fuji),
            12345 => Some(Self::Local),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Network::Mainnet => "mainnet",
            Network::Fuji => "fuji",
            Network::Local => "local",
        };
        write!(f, "{}", string)
    }
}

impl FromStr for Network {
    type Err = String;
    fn from_str(input: &str) -> Result<Network, Self::Err> {
        match input {
            "mainnet" => Ok(Network::Mainnet),
            "fuji" => Ok(Network::Fuji),
            "local" => Ok(Network::Local),
            _ => Err(format!("Failed to parse {} as network", input)),
        }
    }
}
