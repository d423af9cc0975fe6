//! Translation between chain-native transactions and Rosetta operations.

pub mod catomic;
pub mod matcher;
pub mod pchain;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::rosetta::types::Currency;
use crate::rosetta::types::Metadata;
use crate::rosetta::types::OperationStatus;
use crate::rosetta::types::SyncStatus;

pub const BLOCKCHAIN_NAME: &str = "Avalanche";

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILURE: &str = "FAILURE";

pub const AVAX_SYMBOL: &str = "AVAX";

/// Native AVAX on the EVM side, in wei-style 18 decimals.
pub const EVM_AVAX_DECIMALS: i32 = 18;

/// Native AVAX in the UTXO model, in nAVAX.
pub const ATOMIC_AVAX_DECIMALS: i32 = 9;

pub const STAGE_BOOTSTRAP: &str = "BOOTSTRAP";
pub const STAGE_SYNCED: &str = "SYNCED";

pub const OP_FEE: &str = "FEE";
pub const OP_CALL: &str = "CALL";
pub const OP_CREATE: &str = "CREATE";
pub const OP_CREATE2: &str = "CREATE2";
pub const OP_SELFDESTRUCT: &str = "SELFDESTRUCT";
pub const OP_CALLCODE: &str = "CALLCODE";
pub const OP_DELEGATECALL: &str = "DELEGATECALL";
pub const OP_STATICCALL: &str = "STATICCALL";
pub const OP_DESTRUCT: &str = "DESTRUCT";
pub const OP_IMPORT: &str = "IMPORT";
pub const OP_EXPORT: &str = "EXPORT";
pub const OP_ERC20_BURN: &str = "ERC20_BURN";
pub const OP_ERC20_MINT: &str = "ERC20_MINT";
pub const OP_ERC20_TRANSFER: &str = "ERC20_TRANSFER";
pub const OP_ERC721_RECEIVE: &str = "ERC721_RECEIVE";
pub const OP_ERC721_SENDER: &str = "ERC721_SENDER";
pub const OP_ERC721_MINT: &str = "ERC721_MINT";
pub const OP_ERC721_BURN: &str = "ERC721_BURN";

/// Operation types the C-chain backends advertise.
pub const C_OPERATION_TYPES: [&str; 18] = [
    OP_FEE,
    OP_CALL,
    OP_CREATE,
    OP_CREATE2,
    OP_SELFDESTRUCT,
    OP_CALLCODE,
    OP_DELEGATECALL,
    OP_STATICCALL,
    OP_DESTRUCT,
    OP_IMPORT,
    OP_EXPORT,
    OP_ERC20_BURN,
    OP_ERC20_MINT,
    OP_ERC20_TRANSFER,
    OP_ERC721_RECEIVE,
    OP_ERC721_SENDER,
    OP_ERC721_MINT,
    OP_ERC721_BURN,
];

// Block and account metadata keys.
pub const META_MESSAGE: &str = "message";
pub const META_NONCE: &str = "nonce";
pub const META_GAS_LIMIT: &str = "gas_limit";
pub const META_GAS_USED: &str = "gas_used";
pub const META_DIFFICULTY: &str = "difficulty";
pub const META_SIZE: &str = "size";
pub const META_ADDRESS_FORMAT: &str = "address_format";
pub const META_SOURCE_CHAIN: &str = "source_chain";

pub const ADDRESS_FORMAT_BECH32: &str = "bech32";

fn currency(decimals: i32) -> Currency {
    Currency {
        symbol: AVAX_SYMBOL.to_owned(),
        decimals,
        metadata: None,
    }
}

pub fn avax_currency() -> Currency {
    currency(EVM_AVAX_DECIMALS)
}

pub fn atomic_avax_currency() -> Currency {
    currency(ATOMIC_AVAX_DECIMALS)
}

pub fn operation_statuses() -> Vec<OperationStatus> {
    vec![
        OperationStatus {
            status: STATUS_SUCCESS.to_owned(),
            successful: true,
        },
        OperationStatus {
            status: STATUS_FAILURE.to_owned(),
            successful: false,
        },
    ]
}

pub fn sync_stage(synced: bool) -> SyncStatus {
    SyncStatus {
        current_index: None,
        target_index: None,
        stage: Some(if synced { STAGE_SYNCED } else { STAGE_BOOTSTRAP }.to_owned()),
        synced: Some(synced),
    }
}

/// Serializes a typed value into a Rosetta metadata object.
pub fn to_metadata<T: Serialize>(value: &T) -> Result<Metadata, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Reads a typed value out of a Rosetta metadata object.
pub fn from_metadata<T: DeserializeOwned>(metadata: &Metadata) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(metadata.clone()))
}
