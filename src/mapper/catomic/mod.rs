//! C-chain atomic (import/export) transactions as Rosetta operations.

pub mod builder;
pub mod parser;

use serde::Deserialize;
use serde::Serialize;

use super::OP_EXPORT;
use super::OP_IMPORT;
use crate::protocol::address::parse_address;
use crate::protocol::address::ChainAlias;
use crate::protocol::ids::Id;
use crate::rosetta::types::AccountIdentifier;

pub use builder::build_tx;
pub use builder::BuildError;
pub use parser::AtomicTxParser;
pub use parser::ParseError;

pub const META_ATOMIC_TX_GAS: &str = "atomic_tx_gas";

/// Output of `/construction/metadata` for atomic transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AtomicMetadata {
    #[serde(default)]
    pub network_id: u32,
    #[serde(default)]
    pub c_chain_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chain_id: Option<Id>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_chain_id: Option<Id>,
    pub nonce: u64,
}

/// Output of `/construction/preprocess` for atomic transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AtomicOptions {
    pub atomic_tx_gas: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_chain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// Whether the account is a bech32 address on the C-chain, as opposed to an
/// EVM hex address.
pub fn is_c_chain_bech32_address(account: &AccountIdentifier) -> bool {
    parse_address(&account.address).is_ok_and(|(alias, _, _)| alias == ChainAlias::C.as_ref())
}

pub fn is_atomic_op_type(op_type: &str) -> bool {
    op_type == OP_IMPORT || op_type == OP_EXPORT
}
