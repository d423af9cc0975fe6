//! The envelope carrying a transaction between construction calls.
//!
//! On-chain inputs do not name their owners, so the envelope keeps the
//! signer of every spent coin next to the codec bytes. Export destinations
//! travel along too, letting `/construction/parse` name the destination
//! chain without asking the node.

use serde::Deserialize;
use serde::Serialize;

use crate::protocol::atomic::AtomicTx;
use crate::protocol::atomic::UnsignedAtomicTx;
use crate::protocol::avax::Credential;
use crate::protocol::codec::CodecError;
use crate::protocol::ids::decode_hex;
use crate::protocol::ids::encode_hex_with_checksum;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::Tx;
use crate::protocol::platformvm::UnsignedTx;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("tx must be initialized before unmarshalling")]
    Uninitialized,

    #[error("undecodable transaction")]
    Undecodable(String),
}

impl From<WireError> for RosettaError {
    fn from(err: WireError) -> Self {
        RosettaError::wrap(ErrorKind::InvalidInput, err)
    }
}

/// A signed or unsigned transaction the envelope can carry.
pub trait AvaxTx: Sized + Send + Sync {
    fn from_signed_bytes(bytes: &[u8]) -> Result<Self, CodecError>;

    fn signed_bytes(&self) -> Vec<u8>;

    /// The bytes every signature commits to.
    fn unsigned_bytes(&self) -> Vec<u8>;

    fn tx_id(&self) -> Id;

    /// Signatures each input needs, in input order.
    fn input_signature_counts(&self) -> Vec<usize>;

    fn attach_credentials(&mut self, creds: Vec<Credential>);
}

impl AvaxTx for Tx {
    fn from_signed_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Tx::from_bytes(bytes)
    }

    fn signed_bytes(&self) -> Vec<u8> {
        Tx::signed_bytes(self)
    }

    fn unsigned_bytes(&self) -> Vec<u8> {
        Tx::unsigned_bytes(self)
    }

    fn tx_id(&self) -> Id {
        self.id()
    }

    fn input_signature_counts(&self) -> Vec<usize> {
        let imported: &[_] = match &self.unsigned {
            UnsignedTx::Import(import) => &import.imported_inputs,
            _ => &[],
        };
        self.unsigned
            .ins()
            .iter()
            .chain(imported)
            .map(|input| input.input.sig_indices().len())
            .collect()
    }

    fn attach_credentials(&mut self, creds: Vec<Credential>) {
        self.sign(creds);
    }
}

impl AvaxTx for AtomicTx {
    fn from_signed_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        AtomicTx::from_bytes(bytes)
    }

    fn signed_bytes(&self) -> Vec<u8> {
        AtomicTx::signed_bytes(self)
    }

    fn unsigned_bytes(&self) -> Vec<u8> {
        AtomicTx::unsigned_bytes(self)
    }

    fn tx_id(&self) -> Id {
        self.id()
    }

    fn input_signature_counts(&self) -> Vec<usize> {
        match &self.unsigned {
            UnsignedAtomicTx::Import(import) => import
                .imported_inputs
                .iter()
                .map(|input| input.input.sig_indices().len())
                .collect(),
            UnsignedAtomicTx::Export(export) => vec![1; export.ins.len()],
        }
    }

    fn attach_credentials(&mut self, creds: Vec<Credential>) {
        self.sign(creds);
    }
}

/// Who signs for one spending operation. Spends of EVM balances have no
/// coin and leave `coin_identifier` empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub coin_identifier: String,
    pub account_identifier: AccountIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    tx: String,
    #[serde(default)]
    signers: Vec<Signer>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    destination_chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination_chain_id: Option<Id>,
}

/// A transaction under construction and the data that does not fit in its
/// codec form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosettaTx<T> {
    pub tx: T,
    pub signers: Vec<Signer>,
    pub destination_chain: String,
    pub destination_chain_id: Option<Id>,
}

impl<T: AvaxTx> RosettaTx<T> {
    pub fn new(tx: T, signers: Vec<Signer>) -> Self {
        Self {
            tx,
            signers,
            destination_chain: String::new(),
            destination_chain_id: None,
        }
    }

    pub fn with_destination(mut self, chain: impl Into<String>, chain_id: Option<Id>) -> Self {
        self.destination_chain = chain.into();
        self.destination_chain_id = chain_id;
        self
    }

    pub fn encode(&self) -> Result<String, WireError> {
        let envelope = Envelope {
            tx: encode_hex_with_checksum(&self.tx.signed_bytes()),
            signers: self.signers.clone(),
            destination_chain: self.destination_chain.clone(),
            destination_chain_id: self.destination_chain_id,
        };
        serde_json::to_string(&envelope).map_err(|e| WireError::Undecodable(e.to_string()))
    }

    /// Fails without side effects when `raw` holds no transaction of type
    /// `T`, so callers may probe one envelope against several types.
    pub fn decode(raw: &str) -> Result<Self, WireError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| WireError::Undecodable(e.to_string()))?;
        if envelope.tx.is_empty() {
            return Err(WireError::Uninitialized);
        }
        let bytes = decode_hex(&envelope.tx).map_err(|e| WireError::Undecodable(e.to_string()))?;
        let tx = T::from_signed_bytes(&bytes).map_err(|e| WireError::Undecodable(e.to_string()))?;
        Ok(Self {
            tx,
            signers: envelope.signers,
            destination_chain: envelope.destination_chain,
            destination_chain_id: envelope.destination_chain_id,
        })
    }
}
