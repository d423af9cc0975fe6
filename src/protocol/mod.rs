//! Wire-level Avalanche types: identifiers, the binary codec, addresses,
//! the UTXO model and the P-chain and C-chain atomic transaction formats.

pub mod address;
pub mod atomic;
pub mod avax;
pub mod codec;
pub mod ids;
pub mod platformvm;
