use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::client::GenesisInfo;
use crate::protocol::ids::decode_hex;
use crate::protocol::ids::IdError;

#[derive(Debug, thiserror::Error)]
pub enum GenesisFileError {
    #[error("unable to read genesis file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse genesis file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex in genesis file: {0}")]
    Hex(#[from] IdError),
}

/// On-disk description of the P-chain genesis block. Byte fields are
/// `0x`-prefixed hex, optionally carrying the node's checksum suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisFile {
    #[serde(default)]
    pub message: String,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: u64,
    /// Codec-encoded genesis allocation UTXOs.
    #[serde(default)]
    pub utxos: Vec<String>,
    /// Codec-encoded signed genesis transactions.
    #[serde(default)]
    pub txs: Vec<String>,
}

impl GenesisFile {
    pub async fn load(path: &Path) -> Result<Self, GenesisFileError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| GenesisFileError::Io {
                path: path.to_owned(),
                source,
            })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn decode(&self) -> Result<GenesisInfo, GenesisFileError> {
        let decode_all = |items: &[String]| {
            items
                .iter()
                .map(|item| decode_hex(item))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(GenesisInfo {
            message: self.message.clone(),
            timestamp: self.timestamp,
            utxos: decode_all(&self.utxos)?,
            txs: decode_all(&self.txs)?,
        })
    }
}
