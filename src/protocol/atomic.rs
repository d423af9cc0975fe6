//! C-chain atomic transactions: value moving between the EVM account model
//! and the shared-memory UTXO model.

use std::cmp::Ordering;

use super::address::EvmAddress;
use super::avax::Credential;
use super::avax::TransferableInput;
use super::avax::TransferableOutput;
use super::codec::CodecError;
use super::codec::CodecManager;
use super::codec::Pack;
use super::codec::Packer;
use super::codec::Unpack;
use super::codec::Unpacker;
use super::codec::CODEC_VERSION;
use super::ids::Id;

pub const IMPORT_TX_TYPE_ID: u32 = 0;
pub const EXPORT_TX_TYPE_ID: u32 = 1;

pub const TX_BYTES_GAS: u64 = 1;
pub const COST_PER_SIGNATURE: u64 = 1_000;
pub const ATOMIC_TX_BASE_COST: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmOutput {
    pub address: EvmAddress,
    pub amount: u64,
    pub asset_id: Id,
}

impl Pack for EvmOutput {
    fn pack(&self, p: &mut Packer) {
        p.put_fixed(self.address.as_bytes());
        p.put_u64(self.amount);
        p.put(&self.asset_id);
    }
}

impl Unpack for EvmOutput {
    fn unpack(u: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: EvmAddress(u.get_fixed()?),
            amount: u.get_u64()?,
            asset_id: u.get()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmInput {
    pub address: EvmAddress,
    pub amount: u64,
    pub asset_id: Id,
    pub nonce: u64,
}

impl Pack for EvmInput {
    fn pack(&self, p: &mut Packer) {
        p.put_fixed(self.address.as_bytes());
        p.put_u64(self.amount);
        p.put(&self.asset_id);
        p.put_u64(self.nonce);
    }
}

impl Unpack for EvmInput {
    fn unpack(u: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: EvmAddress(u.get_fixed()?),
            amount: u.get_u64()?,
            asset_id: u.get()?,
            nonce: u.get_u64()?,
        })
    }
}

fn by_address_then_asset(a: (&EvmAddress, &Id), b: (&EvmAddress, &Id)) -> Ordering {
    a.0.cmp(b.0).then_with(|| a.1.cmp(b.1))
}

pub fn sort_evm_outputs(outs: &mut [EvmOutput]) {
    outs.sort_by(|a, b| by_address_then_asset((&a.address, &a.asset_id), (&b.address, &b.asset_id)));
}

pub fn sort_evm_inputs(ins: &mut [EvmInput]) {
    ins.sort_by(|a, b| by_address_then_asset((&a.address, &a.asset_id), (&b.address, &b.asset_id)));
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
    pub outs: Vec<EvmOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub destination_chain: Id,
    pub ins: Vec<EvmInput>,
    pub exported_outputs: Vec<TransferableOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedAtomicTx {
    Import(ImportTx),
    Export(ExportTx),
}

impl UnsignedAtomicTx {
    /// Number of signatures the transaction needs once signed.
    pub fn signature_count(&self) -> u64 {
        match self {
            Self::Import(tx) => tx
                .imported_inputs
                .iter()
                .map(|input| input.input.sig_indices().len() as u64)
                .sum(),
            Self::Export(tx) => tx.ins.len() as u64,
        }
    }
}

impl Pack for UnsignedAtomicTx {
    fn pack(&self, p: &mut Packer) {
        match self {
            Self::Import(tx) => {
                p.put_u32(IMPORT_TX_TYPE_ID);
                p.put_u32(tx.network_id);
                p.put(&tx.blockchain_id);
                p.put(&tx.source_chain);
                p.put_slice(&tx.imported_inputs);
                p.put_slice(&tx.outs);
            }
            Self::Export(tx) => {
                p.put_u32(EXPORT_TX_TYPE_ID);
                p.put_u32(tx.network_id);
                p.put(&tx.blockchain_id);
                p.put(&tx.destination_chain);
                p.put_slice(&tx.ins);
                p.put_slice(&tx.exported_outputs);
            }
        }
    }
}

impl Unpack for UnsignedAtomicTx {
    fn unpack(u: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match u.get_u32()? {
            IMPORT_TX_TYPE_ID => Ok(Self::Import(ImportTx {
                network_id: u.get_u32()?,
                blockchain_id: u.get()?,
                source_chain: u.get()?,
                imported_inputs: u.get_vec()?,
                outs: u.get_vec()?,
            })),
            EXPORT_TX_TYPE_ID => Ok(Self::Export(ExportTx {
                network_id: u.get_u32()?,
                blockchain_id: u.get()?,
                destination_chain: u.get()?,
                ins: u.get_vec()?,
                exported_outputs: u.get_vec()?,
            })),
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "atomic transaction",
            }),
        }
    }
}

/// Signed atomic transaction with its cached id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicTx {
    pub unsigned: UnsignedAtomicTx,
    creds: Vec<Credential>,
    id: Id,
}

impl AtomicTx {
    pub fn new(unsigned: UnsignedAtomicTx) -> Self {
        Self::with_credentials(unsigned, vec![])
    }

    pub fn with_credentials(unsigned: UnsignedAtomicTx, creds: Vec<Credential>) -> Self {
        let mut tx = Self {
            unsigned,
            creds,
            id: Id::EMPTY,
        };
        tx.id = Id::of(&tx.signed_bytes());
        tx
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.creds
    }

    pub fn sign(&mut self, creds: Vec<Credential>) {
        self.creds = creds;
        self.id = Id::of(&self.signed_bytes());
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut p = Packer::new();
        p.put_u16(CODEC_VERSION);
        p.put(&self.unsigned);
        p.into_bytes()
    }

    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut p = Packer::new();
        p.put_u16(CODEC_VERSION);
        p.put(self);
        p.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        CodecManager::default()
            .unmarshal::<Self>(bytes)
            .map(|(tx, _)| tx)
    }

    /// Gas charged for the transaction: its unsigned size, a per-signature
    /// cost and, when `fixed_fee` is set, the flat atomic base cost.
    pub fn gas_used(&self, fixed_fee: bool) -> u64 {
        let bytes_cost = self.unsigned_bytes().len() as u64 * TX_BYTES_GAS;
        let sig_cost = self.unsigned.signature_count() * COST_PER_SIGNATURE;
        let base = if fixed_fee { ATOMIC_TX_BASE_COST } else { 0 };
        bytes_cost + sig_cost + base
    }
}

impl Pack for AtomicTx {
    fn pack(&self, p: &mut Packer) {
        p.put(&self.unsigned);
        p.put_slice(&self.creds);
    }
}

impl Unpack for AtomicTx {
    fn unpack(u: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        let unsigned = u.get()?;
        let creds = u.get_vec()?;
        Ok(Self::with_credentials(unsigned, creds))
    }
}
