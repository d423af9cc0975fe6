//! UTXO model shared by the P-chain and the C-chain atomic transactions:
//! secp256k1 transfer inputs/outputs, their stakeable-lock wrappers,
//! transferable envelopes and credentials.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::codec::CodecError;
use super::codec::Pack;
use super::codec::Packer;
use super::codec::Unpack;
use super::codec::Unpacker;
use super::ids::Id;
use super::ids::IdError;
use super::ids::ShortId;

pub const TRANSFER_INPUT_TYPE_ID: u32 = 5;
pub const TRANSFER_OUTPUT_TYPE_ID: u32 = 7;
pub const CREDENTIAL_TYPE_ID: u32 = 9;
pub const INPUT_TYPE_ID: u32 = 10;
pub const OUTPUT_OWNERS_TYPE_ID: u32 = 11;
pub const STAKEABLE_LOCK_IN_TYPE_ID: u32 = 21;
pub const STAKEABLE_LOCK_OUT_TYPE_ID: u32 = 22;

pub const SIGNATURE_LEN: usize = 65;

/// Reference to an output of a previous transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UtxoId {
    pub tx_id: Id,
    pub output_index: u32,
}

impl UtxoId {
    pub fn new(tx_id: Id, output_index: u32) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }
}

/// `<txID>:<index>`, the text form used as a Rosetta coin identifier.
impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

impl fmt::Debug for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UtxoIdError {
    #[error("utxo id must be <txID>:<index>")]
    Format,

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("invalid output index")]
    Index,
}

impl FromStr for UtxoId {
    type Err = UtxoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx, index) = s.split_once(':').ok_or(UtxoIdError::Format)?;
        Ok(Self {
            tx_id: tx.parse()?,
            output_index: index.parse().map_err(|_| UtxoIdError::Index)?,
        })
    }
}

impl Pack for UtxoId {
    fn pack(&self, packer: &mut Packer) {
        packer.put(&self.tx_id);
        packer.put_u32(self.output_index);
    }
}

impl Unpack for UtxoId {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            tx_id: unpacker.get()?,
            output_index: unpacker.get_u32()?,
        })
    }
}

impl Pack for Id {
    fn pack(&self, packer: &mut Packer) {
        packer.put_fixed(&self.0);
    }
}

impl Unpack for Id {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        unpacker.get_fixed().map(Self)
    }
}

impl Pack for ShortId {
    fn pack(&self, packer: &mut Packer) {
        packer.put_fixed(&self.0);
    }
}

impl Unpack for ShortId {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        unpacker.get_fixed().map(Self)
    }
}

/// Spending condition: after `locktime`, any `threshold` of `addrs` may sign.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    pub addrs: Vec<ShortId>,
}

impl OutputOwners {
    /// Single-key owner with no locktime.
    pub fn single(addr: ShortId) -> Self {
        Self {
            locktime: 0,
            threshold: 1,
            addrs: vec![addr],
        }
    }
}

impl Pack for OutputOwners {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u64(self.locktime);
        packer.put_u32(self.threshold);
        packer.put_slice(&self.addrs);
    }
}

impl Unpack for OutputOwners {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            locktime: unpacker.get_u64()?,
            threshold: unpacker.get_u32()?,
            addrs: unpacker.get_vec()?,
        })
    }
}

/// Interface-typed owner, as used for reward owners and subnet auth.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Owner(pub OutputOwners);

impl Pack for Owner {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u32(OUTPUT_OWNERS_TYPE_ID);
        packer.put(&self.0);
    }
}

impl Unpack for Owner {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match unpacker.get_u32()? {
            OUTPUT_OWNERS_TYPE_ID => unpacker.get().map(Self),
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "owner",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutput {
    pub amount: u64,
    pub owners: OutputOwners,
}

impl Pack for TransferOutput {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u64(self.amount);
        packer.put(&self.owners);
    }
}

impl Unpack for TransferOutput {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: unpacker.get_u64()?,
            owners: unpacker.get()?,
        })
    }
}

/// Output that cannot be spent before `locktime` except for staking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOut {
    pub locktime: u64,
    pub inner: TransferOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Transfer(TransferOutput),
    StakeableLock(LockOut),
}

impl Output {
    /// The secp256k1 output, with any stakeable lock peeled off.
    pub fn transfer(&self) -> &TransferOutput {
        match self {
            Self::Transfer(out) => out,
            Self::StakeableLock(lock) => &lock.inner,
        }
    }

    pub fn amount(&self) -> u64 {
        self.transfer().amount
    }

    pub fn owners(&self) -> &OutputOwners {
        &self.transfer().owners
    }

    pub fn addresses(&self) -> &[ShortId] {
        &self.owners().addrs
    }

    /// Lock time of the stakeable wrapper, zero when unwrapped.
    pub fn stakeable_locktime(&self) -> u64 {
        match self {
            Self::Transfer(_) => 0,
            Self::StakeableLock(lock) => lock.locktime,
        }
    }

    /// More than one owner or a threshold other than one.
    pub fn is_multisig(&self) -> bool {
        let owners = self.owners();
        owners.addrs.len() != 1 || owners.threshold != 1
    }
}

impl Pack for Output {
    fn pack(&self, packer: &mut Packer) {
        match self {
            Self::Transfer(out) => {
                packer.put_u32(TRANSFER_OUTPUT_TYPE_ID);
                packer.put(out);
            }
            Self::StakeableLock(lock) => {
                packer.put_u32(STAKEABLE_LOCK_OUT_TYPE_ID);
                packer.put_u64(lock.locktime);
                packer.put_u32(TRANSFER_OUTPUT_TYPE_ID);
                packer.put(&lock.inner);
            }
        }
    }
}

impl Unpack for Output {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match unpacker.get_u32()? {
            TRANSFER_OUTPUT_TYPE_ID => unpacker.get().map(Self::Transfer),
            STAKEABLE_LOCK_OUT_TYPE_ID => {
                let locktime = unpacker.get_u64()?;
                match unpacker.get_u32()? {
                    TRANSFER_OUTPUT_TYPE_ID => Ok(Self::StakeableLock(LockOut {
                        locktime,
                        inner: unpacker.get()?,
                    })),
                    type_id => Err(CodecError::UnknownTypeId {
                        type_id,
                        context: "stakeable lock output",
                    }),
                }
            }
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "output",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferInput {
    pub amount: u64,
    pub sig_indices: Vec<u32>,
}

impl Pack for TransferInput {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u64(self.amount);
        packer.put_slice(&self.sig_indices);
    }
}

impl Unpack for TransferInput {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: unpacker.get_u64()?,
            sig_indices: unpacker.get_vec()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockIn {
    pub locktime: u64,
    pub inner: TransferInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Transfer(TransferInput),
    StakeableLock(LockIn),
}

impl Input {
    pub fn transfer(&self) -> &TransferInput {
        match self {
            Self::Transfer(input) => input,
            Self::StakeableLock(lock) => &lock.inner,
        }
    }

    pub fn amount(&self) -> u64 {
        self.transfer().amount
    }

    pub fn sig_indices(&self) -> &[u32] {
        &self.transfer().sig_indices
    }

    pub fn stakeable_locktime(&self) -> u64 {
        match self {
            Self::Transfer(_) => 0,
            Self::StakeableLock(lock) => lock.locktime,
        }
    }
}

impl Pack for Input {
    fn pack(&self, packer: &mut Packer) {
        match self {
            Self::Transfer(input) => {
                packer.put_u32(TRANSFER_INPUT_TYPE_ID);
                packer.put(input);
            }
            Self::StakeableLock(lock) => {
                packer.put_u32(STAKEABLE_LOCK_IN_TYPE_ID);
                packer.put_u64(lock.locktime);
                packer.put_u32(TRANSFER_INPUT_TYPE_ID);
                packer.put(&lock.inner);
            }
        }
    }
}

impl Unpack for Input {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match unpacker.get_u32()? {
            TRANSFER_INPUT_TYPE_ID => unpacker.get().map(Self::Transfer),
            STAKEABLE_LOCK_IN_TYPE_ID => {
                let locktime = unpacker.get_u64()?;
                match unpacker.get_u32()? {
                    TRANSFER_INPUT_TYPE_ID => Ok(Self::StakeableLock(LockIn {
                        locktime,
                        inner: unpacker.get()?,
                    })),
                    type_id => Err(CodecError::UnknownTypeId {
                        type_id,
                        context: "stakeable lock input",
                    }),
                }
            }
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "input",
            }),
        }
    }
}

/// Subnet authorization: indices into the subnet owner's addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubnetAuth {
    pub sig_indices: Vec<u32>,
}

impl Pack for SubnetAuth {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u32(INPUT_TYPE_ID);
        packer.put_slice(&self.sig_indices);
    }
}

impl Unpack for SubnetAuth {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match unpacker.get_u32()? {
            INPUT_TYPE_ID => Ok(Self {
                sig_indices: unpacker.get_vec()?,
            }),
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "subnet auth",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableOutput {
    pub asset_id: Id,
    pub out: Output,
}

impl TransferableOutput {
    pub fn amount(&self) -> u64 {
        self.out.amount()
    }
}

impl Pack for TransferableOutput {
    fn pack(&self, packer: &mut Packer) {
        packer.put(&self.asset_id);
        packer.put(&self.out);
    }
}

impl Unpack for TransferableOutput {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            asset_id: unpacker.get()?,
            out: unpacker.get()?,
        })
    }
}

fn packed<T: Pack>(value: &T) -> Vec<u8> {
    let mut packer = Packer::new();
    packer.put(value);
    packer.into_bytes()
}

/// Canonical output order: by asset, then by encoded output bytes.
pub fn sort_transferable_outputs(outs: &mut [TransferableOutput]) {
    outs.sort_by(|a, b| match a.asset_id.cmp(&b.asset_id) {
        Ordering::Equal => packed(&a.out).cmp(&packed(&b.out)),
        other => other,
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub input: Input,
}

impl TransferableInput {
    pub fn amount(&self) -> u64 {
        self.input.amount()
    }
}

impl Pack for TransferableInput {
    fn pack(&self, packer: &mut Packer) {
        packer.put(&self.utxo_id);
        packer.put(&self.asset_id);
        packer.put(&self.input);
    }
}

impl Unpack for TransferableInput {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            utxo_id: unpacker.get()?,
            asset_id: unpacker.get()?,
            input: unpacker.get()?,
        })
    }
}

/// Canonical input order: by the spent UTXO.
pub fn sort_transferable_inputs(ins: &mut [TransferableInput]) {
    ins.sort_by(|a, b| a.utxo_id.cmp(&b.utxo_id));
}

/// Sorts inputs and keeps a parallel vector aligned with them.
pub fn sort_transferable_inputs_with<T>(ins: &mut Vec<TransferableInput>, aligned: &mut Vec<T>) {
    let mut pairs: Vec<(TransferableInput, T)> =
        ins.drain(..).zip(aligned.drain(..)).collect();
    pairs.sort_by(|a, b| a.0.utxo_id.cmp(&b.0.utxo_id));
    for (input, other) in pairs {
        ins.push(input);
        aligned.push(other);
    }
}

/// An unspent output together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub out: Output,
}

impl Pack for Utxo {
    fn pack(&self, packer: &mut Packer) {
        packer.put(&self.utxo_id);
        packer.put(&self.asset_id);
        packer.put(&self.out);
    }
}

impl Unpack for Utxo {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            utxo_id: unpacker.get()?,
            asset_id: unpacker.get()?,
            out: unpacker.get()?,
        })
    }
}

/// Recoverable secp256k1 signatures for one input, in sig-index order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub sigs: Vec<[u8; SIGNATURE_LEN]>,
}

impl Pack for Credential {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u32(CREDENTIAL_TYPE_ID);
        packer.put_len(self.sigs.len());
        for sig in &self.sigs {
            packer.put_fixed(sig);
        }
    }
}

impl Unpack for Credential {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match unpacker.get_u32()? {
            CREDENTIAL_TYPE_ID => {
                let len = unpacker.get_u32()? as usize;
                if len.saturating_mul(SIGNATURE_LEN) > unpacker.remaining() {
                    return Err(CodecError::UnexpectedEof {
                        wanted: len.saturating_mul(SIGNATURE_LEN),
                        remaining: unpacker.remaining(),
                    });
                }
                let mut sigs = Vec::with_capacity(len);
                for _ in 0..len {
                    sigs.push(unpacker.get_fixed()?);
                }
                Ok(Self { sigs })
            }
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "credential",
            }),
        }
    }
}

/// Fields common to every P-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub outs: Vec<TransferableOutput>,
    pub ins: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

impl Pack for BaseTx {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u32(self.network_id);
        packer.put(&self.blockchain_id);
        packer.put_slice(&self.outs);
        packer.put_slice(&self.ins);
        packer.put_bytes(&self.memo);
    }
}

impl Unpack for BaseTx {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            network_id: unpacker.get_u32()?,
            blockchain_id: unpacker.get()?,
            outs: unpacker.get_vec()?,
            ins: unpacker.get_vec()?,
            memo: unpacker.get_bytes()?,
        })
    }
}
