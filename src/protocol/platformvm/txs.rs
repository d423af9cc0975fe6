//! P-chain transaction types and their signed envelope.

use crate::protocol::avax::BaseTx;
use crate::protocol::avax::Credential;
use crate::protocol::avax::Owner;
use crate::protocol::avax::SubnetAuth;
use crate::protocol::avax::TransferableInput;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::codec::CodecError;
use crate::protocol::codec::CodecManager;
use crate::protocol::codec::Pack;
use crate::protocol::codec::Packer;
use crate::protocol::codec::Unpack;
use crate::protocol::codec::Unpacker;
use crate::protocol::codec::CODEC_VERSION;
use crate::protocol::ids::Id;
use crate::protocol::ids::NodeId;

pub const ADD_VALIDATOR_TX_TYPE_ID: u32 = 12;
pub const ADD_SUBNET_VALIDATOR_TX_TYPE_ID: u32 = 13;
pub const ADD_DELEGATOR_TX_TYPE_ID: u32 = 14;
pub const CREATE_CHAIN_TX_TYPE_ID: u32 = 15;
pub const CREATE_SUBNET_TX_TYPE_ID: u32 = 16;
pub const IMPORT_TX_TYPE_ID: u32 = 17;
pub const EXPORT_TX_TYPE_ID: u32 = 18;
pub const ADVANCE_TIME_TX_TYPE_ID: u32 = 19;
pub const REWARD_VALIDATOR_TX_TYPE_ID: u32 = 20;
pub const REMOVE_SUBNET_VALIDATOR_TX_TYPE_ID: u32 = 23;
pub const TRANSFORM_SUBNET_TX_TYPE_ID: u32 = 24;
pub const ADD_PERMISSIONLESS_VALIDATOR_TX_TYPE_ID: u32 = 25;
pub const ADD_PERMISSIONLESS_DELEGATOR_TX_TYPE_ID: u32 = 26;
pub const EMPTY_SIGNER_TYPE_ID: u32 = 27;
pub const PROOF_OF_POSSESSION_TYPE_ID: u32 = 28;

pub const BLS_PUBLIC_KEY_LEN: usize = 48;
pub const BLS_SIGNATURE_LEN: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Validator {
    pub node_id: NodeId,
    pub start: u64,
    pub end: u64,
    pub weight: u64,
}

impl Pack for Validator {
    fn pack(&self, packer: &mut Packer) {
        packer.put_fixed(self.node_id.as_bytes());
        packer.put_u64(self.start);
        packer.put_u64(self.end);
        packer.put_u64(self.weight);
    }
}

impl Unpack for Validator {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: NodeId(unpacker.get()?),
            start: unpacker.get_u64()?,
            end: unpacker.get_u64()?,
            weight: unpacker.get_u64()?,
        })
    }
}

/// BLS key registration of a permissionless validator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Signer {
    #[default]
    Empty,
    ProofOfPossession {
        public_key: [u8; BLS_PUBLIC_KEY_LEN],
        proof: [u8; BLS_SIGNATURE_LEN],
    },
}

impl Pack for Signer {
    fn pack(&self, packer: &mut Packer) {
        match self {
            Self::Empty => packer.put_u32(EMPTY_SIGNER_TYPE_ID),
            Self::ProofOfPossession { public_key, proof } => {
                packer.put_u32(PROOF_OF_POSSESSION_TYPE_ID);
                packer.put_fixed(public_key);
                packer.put_fixed(proof);
            }
        }
    }
}

impl Unpack for Signer {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        match unpacker.get_u32()? {
            EMPTY_SIGNER_TYPE_ID => Ok(Self::Empty),
            PROOF_OF_POSSESSION_TYPE_ID => Ok(Self::ProofOfPossession {
                public_key: unpacker.get_fixed()?,
                proof: unpacker.get_fixed()?,
            }),
            type_id => Err(CodecError::UnknownTypeId {
                type_id,
                context: "signer",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake_outs: Vec<TransferableOutput>,
    pub rewards_owner: Owner,
    pub delegation_shares: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddSubnetValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddDelegatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake_outs: Vec<TransferableOutput>,
    pub rewards_owner: Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateChainTx {
    pub base: BaseTx,
    pub subnet_id: Id,
    pub chain_name: String,
    pub vm_id: Id,
    pub fx_ids: Vec<Id>,
    pub genesis_data: Vec<u8>,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateSubnetTx {
    pub base: BaseTx,
    pub owner: Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportTx {
    pub base: BaseTx,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportTx {
    pub base: BaseTx,
    pub destination_chain: Id,
    pub exported_outputs: Vec<TransferableOutput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvanceTimeTx {
    pub time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardValidatorTx {
    pub tx_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoveSubnetValidatorTx {
    pub base: BaseTx,
    pub node_id: NodeId,
    pub subnet_id: Id,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransformSubnetTx {
    pub base: BaseTx,
    pub subnet_id: Id,
    pub asset_id: Id,
    pub initial_supply: u64,
    pub maximum_supply: u64,
    pub min_consumption_rate: u64,
    pub max_consumption_rate: u64,
    pub min_validator_stake: u64,
    pub max_validator_stake: u64,
    pub min_stake_duration: u32,
    pub max_stake_duration: u32,
    pub min_delegation_fee: u32,
    pub min_delegator_stake: u64,
    pub max_validator_weight_factor: u8,
    pub uptime_requirement: u32,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddPermissionlessValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub signer: Signer,
    pub stake_outs: Vec<TransferableOutput>,
    pub validator_rewards_owner: Owner,
    pub delegator_rewards_owner: Owner,
    pub delegation_shares: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddPermissionlessDelegatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub stake_outs: Vec<TransferableOutput>,
    pub rewards_owner: Owner,
}

/// Closed set of P-chain transaction bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTx {
    AddValidator(AddValidatorTx),
    AddSubnetValidator(AddSubnetValidatorTx),
    AddDelegator(AddDelegatorTx),
    CreateChain(CreateChainTx),
    CreateSubnet(CreateSubnetTx),
    Import(ImportTx),
    Export(ExportTx),
    AdvanceTime(AdvanceTimeTx),
    RewardValidator(RewardValidatorTx),
    RemoveSubnetValidator(RemoveSubnetValidatorTx),
    TransformSubnet(TransformSubnetTx),
    AddPermissionlessValidator(AddPermissionlessValidatorTx),
    AddPermissionlessDelegator(AddPermissionlessDelegatorTx),
}

impl UnsignedTx {
    pub fn type_id(&self) -> u32 {
        match self {
            Self::AddValidator(_) => ADD_VALIDATOR_TX_TYPE_ID,
            Self::AddSubnetValidator(_) => ADD_SUBNET_VALIDATOR_TX_TYPE_ID,
            Self::AddDelegator(_) => ADD_DELEGATOR_TX_TYPE_ID,
            Self::CreateChain(_) => CREATE_CHAIN_TX_TYPE_ID,
            Self::CreateSubnet(_) => CREATE_SUBNET_TX_TYPE_ID,
            Self::Import(_) => IMPORT_TX_TYPE_ID,
            Self::Export(_) => EXPORT_TX_TYPE_ID,
            Self::AdvanceTime(_) => ADVANCE_TIME_TX_TYPE_ID,
            Self::RewardValidator(_) => REWARD_VALIDATOR_TX_TYPE_ID,
            Self::RemoveSubnetValidator(_) => REMOVE_SUBNET_VALIDATOR_TX_TYPE_ID,
            Self::TransformSubnet(_) => TRANSFORM_SUBNET_TX_TYPE_ID,
            Self::AddPermissionlessValidator(_) => ADD_PERMISSIONLESS_VALIDATOR_TX_TYPE_ID,
            Self::AddPermissionlessDelegator(_) => ADD_PERMISSIONLESS_DELEGATOR_TX_TYPE_ID,
        }
    }

    /// Common base, absent for the proposal-only transactions.
    pub fn base(&self) -> Option<&BaseTx> {
        match self {
            Self::AddValidator(tx) => Some(&tx.base),
            Self::AddSubnetValidator(tx) => Some(&tx.base),
            Self::AddDelegator(tx) => Some(&tx.base),
            Self::CreateChain(tx) => Some(&tx.base),
            Self::CreateSubnet(tx) => Some(&tx.base),
            Self::Import(tx) => Some(&tx.base),
            Self::Export(tx) => Some(&tx.base),
            Self::RemoveSubnetValidator(tx) => Some(&tx.base),
            Self::TransformSubnet(tx) => Some(&tx.base),
            Self::AddPermissionlessValidator(tx) => Some(&tx.base),
            Self::AddPermissionlessDelegator(tx) => Some(&tx.base),
            Self::AdvanceTime(_) | Self::RewardValidator(_) => None,
        }
    }

    pub fn ins(&self) -> &[TransferableInput] {
        self.base().map_or(&[], |base| &base.ins)
    }

    pub fn outs(&self) -> &[TransferableOutput] {
        self.base().map_or(&[], |base| &base.outs)
    }

    /// Stake outputs of the four staker transactions.
    pub fn stake_outs(&self) -> &[TransferableOutput] {
        match self {
            Self::AddValidator(tx) => &tx.stake_outs,
            Self::AddDelegator(tx) => &tx.stake_outs,
            Self::AddPermissionlessValidator(tx) => &tx.stake_outs,
            Self::AddPermissionlessDelegator(tx) => &tx.stake_outs,
            _ => &[],
        }
    }

    /// Primary-network or subnet validator period, for staker transactions.
    pub fn validator(&self) -> Option<&Validator> {
        match self {
            Self::AddValidator(tx) => Some(&tx.validator),
            Self::AddDelegator(tx) => Some(&tx.validator),
            Self::AddSubnetValidator(tx) => Some(&tx.validator),
            Self::AddPermissionlessValidator(tx) => Some(&tx.validator),
            Self::AddPermissionlessDelegator(tx) => Some(&tx.validator),
            _ => None,
        }
    }

    /// Whether the transaction locks stake that a reward can later pay out.
    pub fn is_staker(&self) -> bool {
        matches!(
            self,
            Self::AddValidator(_)
                | Self::AddDelegator(_)
                | Self::AddPermissionlessValidator(_)
                | Self::AddPermissionlessDelegator(_)
        )
    }
}

impl Pack for UnsignedTx {
    fn pack(&self, p: &mut Packer) {
        p.put_u32(self.type_id());
        match self {
            Self::AddValidator(tx) => {
                p.put(&tx.base);
                p.put(&tx.validator);
                p.put_slice(&tx.stake_outs);
                p.put(&tx.rewards_owner);
                p.put_u32(tx.delegation_shares);
            }
            Self::AddSubnetValidator(tx) => {
                p.put(&tx.base);
                p.put(&tx.validator);
                p.put(&tx.subnet_id);
                p.put(&tx.subnet_auth);
            }
            Self::AddDelegator(tx) => {
                p.put(&tx.base);
                p.put(&tx.validator);
                p.put_slice(&tx.stake_outs);
                p.put(&tx.rewards_owner);
            }
            Self::CreateChain(tx) => {
                p.put(&tx.base);
                p.put(&tx.subnet_id);
                p.put_str(&tx.chain_name);
                p.put(&tx.vm_id);
                p.put_slice(&tx.fx_ids);
                p.put_bytes(&tx.genesis_data);
                p.put(&tx.subnet_auth);
            }
            Self::CreateSubnet(tx) => {
                p.put(&tx.base);
                p.put(&tx.owner);
            }
            Self::Import(tx) => {
                p.put(&tx.base);
                p.put(&tx.source_chain);
                p.put_slice(&tx.imported_inputs);
            }
            Self::Export(tx) => {
                p.put(&tx.base);
                p.put(&tx.destination_chain);
                p.put_slice(&tx.exported_outputs);
            }
            Self::AdvanceTime(tx) => p.put_u64(tx.time),
            Self::RewardValidator(tx) => p.put(&tx.tx_id),
            Self::RemoveSubnetValidator(tx) => {
                p.put(&tx.base);
                p.put_fixed(tx.node_id.as_bytes());
                p.put(&tx.subnet_id);
                p.put(&tx.subnet_auth);
            }
            Self::TransformSubnet(tx) => {
                p.put(&tx.base);
                p.put(&tx.subnet_id);
                p.put(&tx.asset_id);
                p.put_u64(tx.initial_supply);
                p.put_u64(tx.maximum_supply);
                p.put_u64(tx.min_consumption_rate);
                p.put_u64(tx.max_consumption_rate);
                p.put_u64(tx.min_validator_stake);
                p.put_u64(tx.max_validator_stake);
                p.put_u32(tx.min_stake_duration);
                p.put_u32(tx.max_stake_duration);
                p.put_u32(tx.min_delegation_fee);
                p.put_u64(tx.min_delegator_stake);
                p.put_u8(tx.max_validator_weight_factor);
                p.put_u32(tx.uptime_requirement);
                p.put(&tx.subnet_auth);
            }
            Self::AddPermissionlessValidator(tx) => {
                p.put(&tx.base);
                p.put(&tx.validator);
                p.put(&tx.subnet_id);
                p.put(&tx.signer);
                p.put_slice(&tx.stake_outs);
                p.put(&tx.validator_rewards_owner);
                p.put(&tx.delegator_rewards_owner);
                p.put_u32(tx.delegation_shares);
            }
            Self::AddPermissionlessDelegator(tx) => {
                p.put(&tx.base);
                p.put(&tx.validator);
                p.put(&tx.subnet_id);
                p.put_slice(&tx.stake_outs);
                p.put(&tx.rewards_owner);
            }
        }
    }
}

impl Unpack for UnsignedTx {
    fn unpack(u: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        let tx = match u.get_u32()? {
            ADD_VALIDATOR_TX_TYPE_ID => Self::AddValidator(AddValidatorTx {
                base: u.get()?,
                validator: u.get()?,
                stake_outs: u.get_vec()?,
                rewards_owner: u.get()?,
                delegation_shares: u.get_u32()?,
            }),
            ADD_SUBNET_VALIDATOR_TX_TYPE_ID => Self::AddSubnetValidator(AddSubnetValidatorTx {
                base: u.get()?,
                validator: u.get()?,
                subnet_id: u.get()?,
                subnet_auth: u.get()?,
            }),
            ADD_DELEGATOR_TX_TYPE_ID => Self::AddDelegator(AddDelegatorTx {
                base: u.get()?,
                validator: u.get()?,
                stake_outs: u.get_vec()?,
                rewards_owner: u.get()?,
            }),
            CREATE_CHAIN_TX_TYPE_ID => Self::CreateChain(CreateChainTx {
                base: u.get()?,
                subnet_id: u.get()?,
                chain_name: u.get_string()?,
                vm_id: u.get()?,
                fx_ids: u.get_vec()?,
                genesis_data: u.get_bytes()?,
                subnet_auth: u.get()?,
            }),
            CREATE_SUBNET_TX_TYPE_ID => Self::CreateSubnet(CreateSubnetTx {
                base: u.get()?,
                owner: u.get()?,
            }),
            IMPORT_TX_TYPE_ID => Self::Import(ImportTx {
                base: u.get()?,
                source_chain: u.get()?,
                imported_inputs: u.get_vec()?,
            }),
            EXPORT_TX_TYPE_ID => Self::Export(ExportTx {
                base: u.get()?,
                destination_chain: u.get()?,
                exported_outputs: u.get_vec()?,
            }),
            ADVANCE_TIME_TX_TYPE_ID => Self::AdvanceTime(AdvanceTimeTx { time: u.get_u64()? }),
            REWARD_VALIDATOR_TX_TYPE_ID => {
                Self::RewardValidator(RewardValidatorTx { tx_id: u.get()? })
            }
            REMOVE_SUBNET_VALIDATOR_TX_TYPE_ID => {
                Self::RemoveSubnetValidator(RemoveSubnetValidatorTx {
                    base: u.get()?,
                    node_id: NodeId(u.get()?),
                    subnet_id: u.get()?,
                    subnet_auth: u.get()?,
                })
            }
            TRANSFORM_SUBNET_TX_TYPE_ID => Self::TransformSubnet(TransformSubnetTx {
                base: u.get()?,
                subnet_id: u.get()?,
                asset_id: u.get()?,
                initial_supply: u.get_u64()?,
                maximum_supply: u.get_u64()?,
                min_consumption_rate: u.get_u64()?,
                max_consumption_rate: u.get_u64()?,
                min_validator_stake: u.get_u64()?,
                max_validator_stake: u.get_u64()?,
                min_stake_duration: u.get_u32()?,
                max_stake_duration: u.get_u32()?,
                min_delegation_fee: u.get_u32()?,
                min_delegator_stake: u.get_u64()?,
                max_validator_weight_factor: u.get_u8()?,
                uptime_requirement: u.get_u32()?,
                subnet_auth: u.get()?,
            }),
            ADD_PERMISSIONLESS_VALIDATOR_TX_TYPE_ID => {
                Self::AddPermissionlessValidator(AddPermissionlessValidatorTx {
                    base: u.get()?,
                    validator: u.get()?,
                    subnet_id: u.get()?,
                    signer: u.get()?,
                    stake_outs: u.get_vec()?,
                    validator_rewards_owner: u.get()?,
                    delegator_rewards_owner: u.get()?,
                    delegation_shares: u.get_u32()?,
                })
            }
            ADD_PERMISSIONLESS_DELEGATOR_TX_TYPE_ID => {
                Self::AddPermissionlessDelegator(AddPermissionlessDelegatorTx {
                    base: u.get()?,
                    validator: u.get()?,
                    subnet_id: u.get()?,
                    stake_outs: u.get_vec()?,
                    rewards_owner: u.get()?,
                })
            }
            type_id => {
                return Err(CodecError::UnknownTypeId {
                    type_id,
                    context: "platform transaction",
                })
            }
        };
        Ok(tx)
    }
}

/// Signed P-chain transaction with its cached id.
///
/// The id is `sha256` of the versioned signed encoding and is refreshed
/// whenever credentials change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub unsigned: UnsignedTx,
    creds: Vec<Credential>,
    id: Id,
}

impl Tx {
    pub fn new(unsigned: UnsignedTx) -> Self {
        Self::with_credentials(unsigned, vec![])
    }

    pub fn with_credentials(unsigned: UnsignedTx, creds: Vec<Credential>) -> Self {
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

    /// Replaces the credentials and re-derives the id.
    pub fn sign(&mut self, creds: Vec<Credential>) {
        self.creds = creds;
        self.id = Id::of(&self.signed_bytes());
    }

    /// Versioned encoding of the unsigned body; what signers hash.
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
}

impl Pack for Tx {
    fn pack(&self, packer: &mut Packer) {
        packer.put(&self.unsigned);
        packer.put_slice(&self.creds);
    }
}

impl Unpack for Tx {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        let unsigned = unpacker.get()?;
        let creds = unpacker.get_vec()?;
        Ok(Self::with_credentials(unsigned, creds))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::protocol::avax::Input;
    use crate::protocol::avax::Output;
    use crate::protocol::avax::OutputOwners;
    use crate::protocol::avax::TransferInput;
    use crate::protocol::avax::TransferOutput;
    use crate::protocol::avax::UtxoId;
    use crate::protocol::ids::ShortId;

    pub(crate) fn sample_export() -> Tx {
        let asset = Id([7; 32]);
        Tx::new(UnsignedTx::Export(ExportTx {
            base: BaseTx {
                network_id: 5,
                blockchain_id: Id::EMPTY,
                outs: vec![TransferableOutput {
                    asset_id: asset,
                    out: Output::Transfer(TransferOutput {
                        amount: 2_910_137_500,
                        owners: OutputOwners::single(ShortId([1; 20])),
                    }),
                }],
                ins: vec![TransferableInput {
                    utxo_id: UtxoId::new(Id([3; 32]), 0),
                    asset_id: asset,
                    input: Input::Transfer(TransferInput {
                        amount: 2_921_137_500,
                        sig_indices: vec![0],
                    }),
                }],
                memo: vec![],
            },
            destination_chain: Id([9; 32]),
            exported_outputs: vec![TransferableOutput {
                asset_id: asset,
                out: Output::Transfer(TransferOutput {
                    amount: 10_000_000,
                    owners: OutputOwners::single(ShortId([1; 20])),
                }),
            }],
        }))
    }

    #[test]
    fn signed_encoding_decodes_to_same_tx() {
        let tx = sample_export();
        let decoded = Tx::from_bytes(&tx.signed_bytes()).unwrap();
        assert!(decoded == tx);
        assert!(decoded.id() == tx.id());
    }

    #[test]
    fn signing_changes_id_but_not_unsigned_bytes() {
        let mut tx = sample_export();
        let unsigned = tx.unsigned_bytes();
        let before = tx.id();
        tx.sign(vec![Credential {
            sigs: vec![[4u8; 65]],
        }]);
        assert!(tx.id() != before);
        assert!(tx.unsigned_bytes() == unsigned);
        assert!(tx.id() == Id::of(&tx.signed_bytes()));
    }

    #[test]
    fn unsigned_encoding_starts_with_version_and_type() {
        let bytes = sample_export().unsigned_bytes();
        assert!(bytes[..6] == [0, 0, 0, 0, 0, 18]);
    }

    #[test]
    fn unknown_tx_type_is_rejected() {
        let_assert!(
            Err(CodecError::UnknownTypeId { type_id: 99, .. }) =
                Tx::from_bytes(&[0, 0, 0, 0, 0, 99])
        );
    }

    #[test]
    fn proposal_txs_have_no_base() {
        let advance = UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 5 });
        assert!(advance.base().is_none());
        assert!(advance.ins().is_empty());
        assert!(!advance.is_staker());
    }
}
