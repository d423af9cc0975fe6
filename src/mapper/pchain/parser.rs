//! P-chain transaction to Rosetta transaction.
//!
//! In indexing mode every operation carries a `SUCCESS` status and output
//! coins are created under the transaction id. In construction mode there is
//! no status and no created coin, and imported inputs and exported outputs
//! are part of the numbered operations so a built transaction parses back
//! to the operations it was built from.

use std::collections::HashMap;

use serde_json::json;
use serde_json::Value;

use super::dependency::BlockTxDependencies;
use super::tx_ops::TxOps;
use super::OpKind;
use super::OperationMetadata;
use super::TxType;
use super::META_EXPORTED_OUTPUTS;
use super::META_IMPORTED_INPUTS;
use super::META_SIGNER;
use super::META_STAKING_END_TIME;
use super::META_STAKING_START_TIME;
use super::META_TX_TYPE;
use super::META_VALIDATOR_NODE_ID;
use crate::mapper::atomic_avax_currency;
use crate::mapper::to_metadata;
use crate::mapper::STATUS_SUCCESS;
use crate::protocol::address::format_address;
use crate::protocol::address::AddressError;
use crate::protocol::address::ChainAlias;
use crate::protocol::avax::BaseTx;
use crate::protocol::avax::TransferableInput;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::avax::Utxo;
use crate::protocol::avax::UtxoId;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::txs::Signer;
use crate::protocol::platformvm::txs::Validator;
use crate::protocol::platformvm::Tx;
use crate::protocol::platformvm::UnsignedTx;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Amount;
use crate::rosetta::types::CoinAction;
use crate::rosetta::types::CoinChange;
use crate::rosetta::types::Currency;
use crate::rosetta::types::Metadata;
use crate::rosetta::types::Operation;
use crate::rosetta::types::OperationIdentifier;
use crate::rosetta::types::Transaction;
use crate::rosetta::types::TransactionIdentifier;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no matching input addresses")]
    NoMatchingInputAddresses,

    #[error("no matching reward outputs")]
    NoMatchingRewardOutputs,

    #[error("no dependency txs provided")]
    NoDependencyTxs,

    #[error("unknown destination chain")]
    UnknownDestinationChain,

    #[error("failed to check utxo for multisig")]
    FailedToCheckMultisig,

    #[error("unknown source tx type for reward tx")]
    UnknownRewardSource,

    #[error("unsupported asset passed during construction")]
    UnsupportedAssetInConstruction,

    #[error("no output addresses")]
    NoOutputAddresses,

    #[error("no currency description for asset {0}")]
    UnknownAsset(Id),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("failed to encode operation metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParserConfig {
    /// Parsing a transaction under construction rather than an indexed one.
    pub construction: bool,
    /// Human-readable part used to format addresses.
    pub hrp: String,
    /// Chain aliases by chain id, for export destinations.
    pub chain_ids: HashMap<Id, ChainAlias>,
    pub avax_asset_id: Id,
    /// Descriptions of the non-AVAX assets the batch touches. Fetched ahead
    /// of parsing so parsing never waits on the node.
    pub currencies: HashMap<Id, Currency>,
}

/// Parses P-chain transactions against a fixed set of input accounts and,
/// when indexing, the transactions those inputs were produced by.
#[derive(Debug, Clone, Copy)]
pub struct TxParser<'a> {
    cfg: &'a TxParserConfig,
    input_accounts: &'a HashMap<String, AccountIdentifier>,
    deps: Option<&'a BlockTxDependencies>,
}

impl<'a> TxParser<'a> {
    pub fn new(
        cfg: &'a TxParserConfig,
        input_accounts: &'a HashMap<String, AccountIdentifier>,
        deps: Option<&'a BlockTxDependencies>,
    ) -> Self {
        Self {
            cfg,
            input_accounts,
            deps,
        }
    }

    pub fn parse(&self, tx: &Tx) -> Result<Transaction, ParseError> {
        let tx_id = tx.id();
        let (ops, tx_type) = match &tx.unsigned {
            UnsignedTx::Export(export) => {
                let mut ops = self.base_operations(tx_id, &export.base, TxType::ExportAvax)?;
                let alias = self
                    .cfg
                    .chain_ids
                    .get(&export.destination_chain)
                    .copied()
                    .ok_or(ParseError::UnknownDestinationChain)?;
                self.outs_to_operations(
                    &mut ops,
                    TxType::ExportAvax,
                    tx_id,
                    export.base.outs.len(),
                    &export.exported_outputs,
                    OpKind::Export,
                    alias,
                )?;
                (ops, TxType::ExportAvax)
            }
            UnsignedTx::Import(import) => {
                let tx_type = TxType::ImportAvax;
                let mut ops = TxOps::new(self.cfg.construction);
                self.ins_to_operations(&mut ops, tx_type, &import.base.ins, OpKind::Input)?;
                self.ins_to_operations(&mut ops, tx_type, &import.imported_inputs, OpKind::Import)?;
                self.outs_to_operations(
                    &mut ops,
                    tx_type,
                    tx_id,
                    0,
                    &import.base.outs,
                    OpKind::Output,
                    ChainAlias::P,
                )?;
                (ops, tx_type)
            }
            UnsignedTx::AddValidator(add) => {
                let ops = self.staker_operations(tx_id, &add.base, &add.stake_outs, TxType::AddValidator, &add.validator)?;
                (ops, TxType::AddValidator)
            }
            UnsignedTx::AddDelegator(add) => {
                let ops = self.staker_operations(tx_id, &add.base, &add.stake_outs, TxType::AddDelegator, &add.validator)?;
                (ops, TxType::AddDelegator)
            }
            UnsignedTx::AddPermissionlessValidator(add) => {
                let tx_type = TxType::AddPermissionlessValidator;
                let mut ops =
                    self.staker_operations(tx_id, &add.base, &add.stake_outs, tx_type, &add.validator)?;
                if let Signer::ProofOfPossession { public_key, .. } = &add.signer {
                    let signer = Value::String(format!("0x{}", hex::encode(public_key)));
                    for op in &mut ops.stake_outs {
                        insert_metadata(op, META_SIGNER, signer.clone());
                    }
                }
                (ops, tx_type)
            }
            UnsignedTx::AddPermissionlessDelegator(add) => {
                let tx_type = TxType::AddPermissionlessDelegator;
                let ops =
                    self.staker_operations(tx_id, &add.base, &add.stake_outs, tx_type, &add.validator)?;
                (ops, tx_type)
            }
            UnsignedTx::RewardValidator(reward) => (
                self.reward_operations(reward.tx_id)?,
                TxType::RewardValidator,
            ),
            UnsignedTx::CreateChain(create) => (
                self.base_operations(tx_id, &create.base, TxType::CreateChain)?,
                TxType::CreateChain,
            ),
            UnsignedTx::CreateSubnet(create) => (
                self.base_operations(tx_id, &create.base, TxType::CreateSubnet)?,
                TxType::CreateSubnet,
            ),
            UnsignedTx::AddSubnetValidator(add) => (
                self.base_operations(tx_id, &add.base, TxType::AddSubnetValidator)?,
                TxType::AddSubnetValidator,
            ),
            UnsignedTx::RemoveSubnetValidator(remove) => (
                self.base_operations(tx_id, &remove.base, TxType::RemoveSubnetValidator)?,
                TxType::RemoveSubnetValidator,
            ),
            UnsignedTx::TransformSubnet(transform) => (
                self.base_operations(tx_id, &transform.base, TxType::TransformSubnetValidator)?,
                TxType::TransformSubnetValidator,
            ),
            UnsignedTx::AdvanceTime(_) => (TxOps::new(self.cfg.construction), TxType::AdvanceTime),
        };

        let mut metadata = Metadata::new();
        metadata.insert(META_TX_TYPE.to_owned(), Value::String(tx_type.to_string()));

        let (operations, import_ins, export_outs) = ops.into_parts();
        let mut next = operations.len();
        if !import_ins.is_empty() {
            let imported = renumber(import_ins, &mut next);
            metadata.insert(META_IMPORTED_INPUTS.to_owned(), serde_json::to_value(imported)?);
        }
        if !export_outs.is_empty() {
            let exported = renumber(export_outs, &mut next);
            metadata.insert(META_EXPORTED_OUTPUTS.to_owned(), serde_json::to_value(exported)?);
        }

        Ok(Transaction {
            transaction_identifier: TransactionIdentifier {
                hash: tx_id.to_string(),
            },
            operations,
            metadata: Some(metadata),
        })
    }

    /// Parses a batch in order, stopping at the first failure.
    pub fn parse_all<'t>(&self, txs: impl IntoIterator<Item = &'t Tx>) -> Result<Vec<Transaction>, ParseError> {
        txs.into_iter().map(|tx| self.parse(tx)).collect()
    }

    fn status(&self) -> Option<String> {
        (!self.cfg.construction).then(|| STATUS_SUCCESS.to_owned())
    }

    fn base_operations(&self, tx_id: Id, base: &BaseTx, tx_type: TxType) -> Result<TxOps, ParseError> {
        let mut ops = TxOps::new(self.cfg.construction);
        self.ins_to_operations(&mut ops, tx_type, &base.ins, OpKind::Input)?;
        self.outs_to_operations(&mut ops, tx_type, tx_id, 0, &base.outs, OpKind::Output, ChainAlias::P)?;
        Ok(ops)
    }

    fn staker_operations(
        &self,
        tx_id: Id,
        base: &BaseTx,
        stake_outs: &[TransferableOutput],
        tx_type: TxType,
        validator: &Validator,
    ) -> Result<TxOps, ParseError> {
        let mut ops = self.base_operations(tx_id, base, tx_type)?;
        self.outs_to_operations(
            &mut ops,
            tx_type,
            tx_id,
            base.outs.len(),
            stake_outs,
            OpKind::Stake,
            ChainAlias::P,
        )?;
        add_validator_metadata(&mut ops, validator);
        Ok(ops)
    }

    fn reward_operations(&self, staking_tx_id: Id) -> Result<TxOps, ParseError> {
        let deps = self.deps.ok_or(ParseError::NoDependencyTxs)?;
        let dep = deps
            .get(&staking_tx_id)
            .ok_or(ParseError::NoMatchingRewardOutputs)?;

        let mut ops = TxOps::new(self.cfg.construction);
        self.utxos_to_operations(&mut ops, TxType::RewardValidator, &dep.reward_utxos)?;

        let validator = dep
            .tx
            .as_ref()
            .filter(|tx| tx.unsigned.is_staker())
            .and_then(|tx| tx.unsigned.validator())
            .ok_or(ParseError::UnknownRewardSource)?;
        add_validator_metadata(&mut ops, validator);
        Ok(ops)
    }

    fn ins_to_operations(
        &self,
        ops: &mut TxOps,
        tx_type: TxType,
        ins: &[TransferableInput],
        kind: OpKind,
    ) -> Result<(), ParseError> {
        for input in ins {
            let metadata = OperationMetadata {
                kind: Some(kind),
                sig_indices: Some(input.input.sig_indices().to_vec()),
                locktime: input.input.stakeable_locktime(),
                threshold: 0,
            };
            let utxo_id = input.utxo_id.to_string();

            // Imported inputs are spent from shared memory, where no local
            // producer tells us who owned them.
            let mut account = None;
            if self.cfg.construction || kind != OpKind::Import {
                if self.deps.is_some() && self.is_multisig(&input.utxo_id)? {
                    continue;
                }
                account = Some(
                    self.input_accounts
                        .get(&utxo_id)
                        .cloned()
                        .ok_or(ParseError::NoMatchingInputAddresses)?,
                );
            }

            let amount = self.amount(-i128::from(input.amount()), input.asset_id)?;
            let op = Operation {
                operation_identifier: OperationIdentifier::new(ops.len()),
                related_operations: None,
                type_: tx_type.to_string(),
                status: self.status(),
                account,
                amount: Some(amount),
                coin_change: Some(CoinChange::new(utxo_id, CoinAction::CoinSpent)),
                metadata: Some(to_metadata(&metadata)?),
            };
            ops.append(op, kind);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn outs_to_operations(
        &self,
        ops: &mut TxOps,
        tx_type: TxType,
        tx_id: Id,
        first_index: usize,
        outs: &[TransferableOutput],
        kind: OpKind,
        alias: ChainAlias,
    ) -> Result<(), ParseError> {
        for (offset, out) in outs.iter().enumerate() {
            // A single Rosetta account cannot own a multisig output; such
            // outputs are left out as if burned.
            if out.out.is_multisig() {
                continue;
            }
            let utxo_id = UtxoId::new(tx_id, (first_index + offset) as u32);
            let op = self.output_operation(ops.len(), tx_type, &out.out, out.asset_id, utxo_id, kind, alias)?;
            ops.append(op, kind);
        }
        Ok(())
    }

    fn utxos_to_operations(&self, ops: &mut TxOps, tx_type: TxType, utxos: &[Utxo]) -> Result<(), ParseError> {
        for utxo in utxos {
            if utxo.out.is_multisig() {
                continue;
            }
            let op = self.output_operation(
                ops.len(),
                tx_type,
                &utxo.out,
                utxo.asset_id,
                utxo.utxo_id,
                OpKind::Reward,
                ChainAlias::P,
            )?;
            ops.append(op, OpKind::Reward);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn output_operation(
        &self,
        index: usize,
        tx_type: TxType,
        out: &crate::protocol::avax::Output,
        asset_id: Id,
        utxo_id: UtxoId,
        kind: OpKind,
        alias: ChainAlias,
    ) -> Result<Operation, ParseError> {
        let owners = out.owners();
        let addr = owners.addrs.first().ok_or(ParseError::NoOutputAddresses)?;
        let address = format_address(alias.as_ref(), &self.cfg.hrp, addr)?;
        let metadata = OperationMetadata {
            kind: Some(kind),
            sig_indices: None,
            locktime: owners.locktime,
            threshold: owners.threshold,
        };

        // No coin before the transaction id is final.
        let coin_change = (!self.cfg.construction)
            .then(|| CoinChange::new(utxo_id.to_string(), CoinAction::CoinCreated));

        Ok(Operation {
            operation_identifier: OperationIdentifier::new(index),
            related_operations: None,
            type_: tx_type.to_string(),
            status: self.status(),
            account: Some(AccountIdentifier::new(address)),
            amount: Some(self.amount(i128::from(out.amount()), asset_id)?),
            coin_change,
            metadata: Some(to_metadata(&metadata)?),
        })
    }

    fn amount(&self, value: i128, asset_id: Id) -> Result<Amount, ParseError> {
        if asset_id == self.cfg.avax_asset_id {
            return Ok(Amount::new(value, &atomic_avax_currency()));
        }
        if self.cfg.construction {
            return Err(ParseError::UnsupportedAssetInConstruction);
        }
        let currency = self
            .cfg
            .currencies
            .get(&asset_id)
            .ok_or(ParseError::UnknownAsset(asset_id))?;
        Ok(Amount::new(value, currency))
    }

    fn is_multisig(&self, utxo_id: &UtxoId) -> Result<bool, ParseError> {
        self.deps
            .and_then(|deps| deps.get(&utxo_id.tx_id))
            .and_then(|dep| dep.utxos().get(utxo_id))
            .map(|utxo| utxo.out.is_multisig())
            .ok_or(ParseError::FailedToCheckMultisig)
    }
}

fn insert_metadata(op: &mut Operation, key: &str, value: Value) {
    op.metadata
        .get_or_insert_with(Metadata::new)
        .insert(key.to_owned(), value);
}

fn add_validator_metadata(ops: &mut TxOps, validator: &Validator) {
    for op in &mut ops.stake_outs {
        insert_metadata(op, META_VALIDATOR_NODE_ID, Value::String(validator.node_id.to_string()));
        insert_metadata(op, META_STAKING_START_TIME, json!(validator.start));
        insert_metadata(op, META_STAKING_END_TIME, json!(validator.end));
    }
}

fn renumber(mut ops: Vec<Operation>, next: &mut usize) -> Vec<Operation> {
    for op in &mut ops {
        op.operation_identifier = OperationIdentifier::new(*next);
        *next += 1;
    }
    ops
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;
    use crate::mapper::pchain::dependency::referenced_accounts;
    use crate::mapper::pchain::DependencyTx;
    use crate::protocol::avax::Input;
    use crate::protocol::avax::LockIn;
    use crate::protocol::avax::Output;
    use crate::protocol::avax::OutputOwners;
    use crate::protocol::avax::TransferInput;
    use crate::protocol::avax::TransferOutput;
    use crate::protocol::ids::NodeId;
    use crate::protocol::ids::ShortId;
    use crate::protocol::platformvm::txs::AddDelegatorTx;
    use crate::protocol::platformvm::txs::AddPermissionlessValidatorTx;
    use crate::protocol::platformvm::txs::AdvanceTimeTx;
    use crate::protocol::platformvm::txs::ExportTx;
    use crate::protocol::platformvm::txs::ImportTx;
    use crate::protocol::platformvm::txs::RewardValidatorTx;

    const HRP: &str = "fuji";
    const AVAX: Id = Id([0xa1; 32]);
    const ADDR_A: ShortId = ShortId([0xaa; 20]);
    const ADDR_B: ShortId = ShortId([0xbb; 20]);
    const ADDR_C: ShortId = ShortId([0xcc; 20]);
    const C_CHAIN: Id = Id([0xc0; 32]);

    fn config(construction: bool) -> TxParserConfig {
        TxParserConfig {
            construction,
            hrp: HRP.to_owned(),
            chain_ids: HashMap::from([(Id::EMPTY, ChainAlias::P), (C_CHAIN, ChainAlias::C)]),
            avax_asset_id: AVAX,
            currencies: HashMap::new(),
        }
    }

    fn p_address(addr: ShortId) -> String {
        format_address("P", HRP, &addr).unwrap()
    }

    fn output(amount: u64, owners: OutputOwners) -> TransferableOutput {
        TransferableOutput {
            asset_id: AVAX,
            out: Output::Transfer(TransferOutput { amount, owners }),
        }
    }

    fn input(utxo_id: UtxoId, amount: u64) -> TransferableInput {
        TransferableInput {
            utxo_id,
            asset_id: AVAX,
            input: Input::Transfer(TransferInput {
                amount,
                sig_indices: vec![0],
            }),
        }
    }

    fn kind(op: &Operation) -> String {
        op.metadata.as_ref().unwrap()["type"].as_str().unwrap().to_owned()
    }

    fn value(op: &Operation) -> i128 {
        op.amount.as_ref().unwrap().value.parse().unwrap()
    }

    fn producer(addr: ShortId, amount: u64) -> Tx {
        Tx::new(UnsignedTx::Import(ImportTx {
            base: BaseTx {
                network_id: 5,
                outs: vec![output(amount, OutputOwners::single(addr))],
                ..BaseTx::default()
            },
            source_chain: C_CHAIN,
            imported_inputs: vec![],
        }))
    }

    fn deps_of(txs: &[Tx]) -> BlockTxDependencies {
        txs.iter()
            .map(|tx| (tx.id(), DependencyTx::new(tx.id(), Some(tx.clone()), vec![])))
            .collect()
    }

    /// Import of 9,000,000 owned by A: one plain output to B, one multisig
    /// output and one output without owners.
    fn import_scenario() -> (Tx, HashMap<String, AccountIdentifier>) {
        let import_utxo = UtxoId::new(Id([0x11; 32]), 0);
        let tx = Tx::new(UnsignedTx::Import(ImportTx {
            base: BaseTx {
                network_id: 5,
                blockchain_id: Id::EMPTY,
                outs: vec![
                    output(8_000_000, OutputOwners::single(ADDR_B)),
                    output(
                        8_000_000,
                        OutputOwners {
                            locktime: 0,
                            threshold: 2,
                            addrs: vec![ADDR_A, ADDR_B, ADDR_C],
                        },
                    ),
                    output(1_000_000, OutputOwners::default()),
                ],
                ins: vec![],
                memo: vec![],
            },
            source_chain: C_CHAIN,
            imported_inputs: vec![input(import_utxo, 9_000_000)],
        }));
        let accounts = HashMap::from([(
            import_utxo.to_string(),
            AccountIdentifier::new(p_address(ADDR_A)),
        )]);
        (tx, accounts)
    }

    #[test]
    fn import_construction_keeps_imported_inputs_inline() {
        let (tx, accounts) = import_scenario();
        let cfg = config(true);
        let parsed = TxParser::new(&cfg, &accounts, None).parse(&tx).unwrap();

        assert!(parsed.operations.len() == 2);
        let input = &parsed.operations[0];
        assert!(input.operation_identifier.index == 0);
        assert!(input.type_ == "IMPORT_AVAX");
        assert!(kind(input) == "IMPORT");
        assert!(input.account.as_ref().unwrap().address == p_address(ADDR_A));
        assert!(value(input) == -9_000_000);
        assert!(input.status.is_none());
        let coin = input.coin_change.as_ref().unwrap();
        assert!(coin.coin_action == CoinAction::CoinSpent);
        assert!(coin.coin_identifier.identifier == UtxoId::new(Id([0x11; 32]), 0).to_string());

        let out = &parsed.operations[1];
        assert!(out.operation_identifier.index == 1);
        assert!(kind(out) == "OUTPUT");
        assert!(out.account.as_ref().unwrap().address == p_address(ADDR_B));
        assert!(value(out) == 8_000_000);
        assert!(out.coin_change.is_none());
    }

    #[test]
    fn import_indexing_moves_imported_inputs_to_metadata() {
        let (tx, accounts) = import_scenario();
        let cfg = config(false);
        let deps = BlockTxDependencies::new();
        let parsed = TxParser::new(&cfg, &accounts, Some(&deps)).parse(&tx).unwrap();

        assert!(parsed.operations.len() == 1);
        let out = &parsed.operations[0];
        assert!(out.operation_identifier.index == 0);
        assert!(out.status.as_deref() == Some(STATUS_SUCCESS));
        let coin = out.coin_change.as_ref().unwrap();
        assert!(coin.coin_action == CoinAction::CoinCreated);
        assert!(coin.coin_identifier.identifier == format!("{}:0", tx.id()));

        let metadata = parsed.metadata.unwrap();
        assert!(metadata[META_TX_TYPE] == "IMPORT_AVAX");
        let imported: Vec<Operation> =
            serde_json::from_value(metadata[META_IMPORTED_INPUTS].clone()).unwrap();
        assert!(imported.len() == 1);
        assert!(imported[0].operation_identifier.index == 1);
        assert!(imported[0].account.is_none());
        assert!(value(&imported[0]) == -9_000_000);
        assert!(!metadata.contains_key(META_EXPORTED_OUTPUTS));
    }

    fn delegator_scenario() -> (Tx, Tx) {
        let funding = producer(ADDR_A, 1_996_649_063);
        let tx = Tx::new(UnsignedTx::AddDelegator(AddDelegatorTx {
            base: BaseTx {
                network_id: 5,
                outs: vec![output(996_649_063, OutputOwners::single(ADDR_A))],
                ins: vec![input(UtxoId::new(funding.id(), 0), 1_996_649_063)],
                ..BaseTx::default()
            },
            validator: Validator {
                node_id: NodeId(ShortId([0x0d; 20])),
                start: 1_656_058_022,
                end: 1_657_872_300,
                weight: 1_000_000_000,
            },
            stake_outs: vec![output(1_000_000_000, OutputOwners::single(ADDR_A))],
            rewards_owner: Default::default(),
        }));
        (tx, funding)
    }

    #[test]
    fn add_delegator_in_change_and_stake() {
        let (tx, funding) = delegator_scenario();
        let deps = deps_of(&[funding]);
        let accounts = referenced_accounts(&deps, HRP).unwrap();
        let cfg = config(false);
        let parsed = TxParser::new(&cfg, &accounts, Some(&deps)).parse(&tx).unwrap();

        let kinds: Vec<String> = parsed.operations.iter().map(kind).collect();
        assert!(kinds == vec!["INPUT", "OUTPUT", "STAKE"]);
        let values: Vec<i128> = parsed.operations.iter().map(value).collect();
        assert!(values == vec![-1_996_649_063, 996_649_063, 1_000_000_000]);
        assert!(parsed.operations.iter().all(|op| op.type_ == "ADD_DELEGATOR"));

        let stake = parsed.operations[2].metadata.as_ref().unwrap();
        assert!(stake[META_VALIDATOR_NODE_ID] == NodeId(ShortId([0x0d; 20])).to_string());
        assert!(stake[META_STAKING_START_TIME] == 1_656_058_022u64);
        assert!(stake[META_STAKING_END_TIME] == 1_657_872_300u64);

        // stake coin continues after the regular output
        let stake_coin = parsed.operations[2].coin_change.as_ref().unwrap();
        assert!(stake_coin.coin_identifier.identifier == format!("{}:1", tx.id()));
    }

    #[test]
    fn multisig_inputs_are_skipped_when_indexing() {
        let shared = Tx::new(UnsignedTx::Import(ImportTx {
            base: BaseTx {
                outs: vec![output(
                    50,
                    OutputOwners {
                        locktime: 0,
                        threshold: 1,
                        addrs: vec![ADDR_A, ADDR_B],
                    },
                )],
                ..BaseTx::default()
            },
            ..ImportTx::default()
        }));
        let spender = Tx::new(UnsignedTx::Export(ExportTx {
            base: BaseTx {
                ins: vec![input(UtxoId::new(shared.id(), 0), 50)],
                ..BaseTx::default()
            },
            destination_chain: C_CHAIN,
            exported_outputs: vec![output(40, OutputOwners::single(ADDR_C))],
        }));
        let deps = deps_of(&[shared]);
        let accounts = referenced_accounts(&deps, HRP).unwrap();
        let cfg = config(false);
        let parsed = TxParser::new(&cfg, &accounts, Some(&deps)).parse(&spender).unwrap();
        assert!(parsed.operations.is_empty());

        let exported: Vec<Operation> =
            serde_json::from_value(parsed.metadata.unwrap()[META_EXPORTED_OUTPUTS].clone()).unwrap();
        assert!(exported.len() == 1);
        assert!(exported[0].account.as_ref().unwrap().address.starts_with("C-fuji1"));
        assert!(kind(&exported[0]) == "EXPORT");
    }

    #[test]
    fn missing_dependency_fails_multisig_check() {
        let (tx, _) = delegator_scenario();
        let deps = BlockTxDependencies::new();
        let accounts = HashMap::new();
        let cfg = config(false);
        let_assert!(
            Err(ParseError::FailedToCheckMultisig) =
                TxParser::new(&cfg, &accounts, Some(&deps)).parse(&tx)
        );
    }

    #[test]
    fn construction_needs_an_account_per_input() {
        let (tx, _) = delegator_scenario();
        let accounts = HashMap::new();
        let cfg = config(true);
        let_assert!(
            Err(ParseError::NoMatchingInputAddresses) = TxParser::new(&cfg, &accounts, None).parse(&tx)
        );
    }

    #[test]
    fn unknown_export_destination_is_rejected() {
        let tx = Tx::new(UnsignedTx::Export(ExportTx {
            destination_chain: Id([0x99; 32]),
            ..ExportTx::default()
        }));
        let accounts = HashMap::new();
        let cfg = config(true);
        let_assert!(
            Err(ParseError::UnknownDestinationChain) = TxParser::new(&cfg, &accounts, None).parse(&tx)
        );
    }

    #[test]
    fn locked_input_reports_locktime() {
        let funding = producer(ADDR_A, 10);
        let tx = Tx::new(UnsignedTx::Export(ExportTx {
            base: BaseTx {
                ins: vec![TransferableInput {
                    utxo_id: UtxoId::new(funding.id(), 0),
                    asset_id: AVAX,
                    input: Input::StakeableLock(LockIn {
                        locktime: 77,
                        inner: TransferInput {
                            amount: 10,
                            sig_indices: vec![1],
                        },
                    }),
                }],
                ..BaseTx::default()
            },
            destination_chain: C_CHAIN,
            exported_outputs: vec![],
        }));
        let deps = deps_of(&[funding]);
        let accounts = referenced_accounts(&deps, HRP).unwrap();
        let cfg = config(false);
        let parsed = TxParser::new(&cfg, &accounts, Some(&deps)).parse(&tx).unwrap();
        let metadata = parsed.operations[0].metadata.as_ref().unwrap();
        assert!(metadata["locktime"] == 77);
        assert!(metadata["sig_indices"] == json!([1]));
    }

    #[test]
    fn non_avax_assets() {
        let foreign = Id([0x42; 32]);
        let tx = Tx::new(UnsignedTx::Import(ImportTx {
            base: BaseTx {
                outs: vec![TransferableOutput {
                    asset_id: foreign,
                    out: Output::Transfer(TransferOutput {
                        amount: 3,
                        owners: OutputOwners::single(ADDR_A),
                    }),
                }],
                ..BaseTx::default()
            },
            ..ImportTx::default()
        }));
        let accounts = HashMap::new();

        let cfg = config(true);
        let_assert!(
            Err(ParseError::UnsupportedAssetInConstruction) =
                TxParser::new(&cfg, &accounts, None).parse(&tx)
        );

        let mut cfg = config(false);
        let_assert!(Err(ParseError::UnknownAsset(_)) = TxParser::new(&cfg, &accounts, None).parse(&tx));

        let currency = Currency {
            symbol: "WOW".into(),
            decimals: 2,
            metadata: None,
        };
        cfg.currencies.insert(foreign, currency.clone());
        let parsed = TxParser::new(&cfg, &accounts, None).parse(&tx).unwrap();
        assert!(parsed.operations[0].amount.as_ref().unwrap().currency == currency);
    }

    #[test]
    fn reward_needs_dependencies_and_a_staker_source() {
        let (staker, funding) = delegator_scenario();
        let reward = Tx::new(UnsignedTx::RewardValidator(RewardValidatorTx { tx_id: staker.id() }));
        let accounts = HashMap::new();
        let cfg = config(false);

        let_assert!(
            Err(ParseError::NoDependencyTxs) = TxParser::new(&cfg, &accounts, None).parse(&reward)
        );
        let empty = BlockTxDependencies::new();
        let_assert!(
            Err(ParseError::NoMatchingRewardOutputs) =
                TxParser::new(&cfg, &accounts, Some(&empty)).parse(&reward)
        );

        let reward_utxo = Utxo {
            utxo_id: UtxoId::new(Id([0x77; 32]), 3),
            asset_id: AVAX,
            out: Output::Transfer(TransferOutput {
                amount: 1234,
                owners: OutputOwners::single(ADDR_A),
            }),
        };
        let mut deps = BlockTxDependencies::new();
        deps.insert(
            staker.id(),
            DependencyTx::new(staker.id(), Some(staker.clone()), vec![reward_utxo.clone()]),
        );
        let parsed = TxParser::new(&cfg, &accounts, Some(&deps)).parse(&reward).unwrap();
        assert!(parsed.operations.len() == 1);
        let op = &parsed.operations[0];
        assert!(kind(op) == "REWARD");
        assert!(op.type_ == "REWARD_VALIDATOR");
        assert!(op.coin_change.as_ref().unwrap().coin_identifier.identifier == reward_utxo.utxo_id.to_string());
        assert!(op.metadata.as_ref().unwrap()[META_STAKING_END_TIME] == 1_657_872_300u64);

        let mut not_staker = BlockTxDependencies::new();
        not_staker.insert(
            staker.id(),
            DependencyTx::new(staker.id(), Some(funding), vec![reward_utxo]),
        );
        let_assert!(
            Err(ParseError::UnknownRewardSource) =
                TxParser::new(&cfg, &accounts, Some(&not_staker)).parse(&reward)
        );
    }

    #[test]
    fn permissionless_validator_stake_carries_signer() {
        let tx = Tx::new(UnsignedTx::AddPermissionlessValidator(AddPermissionlessValidatorTx {
            signer: Signer::ProofOfPossession {
                public_key: [0xab; 48],
                proof: [0; 96],
            },
            stake_outs: vec![output(5, OutputOwners::single(ADDR_A))],
            ..AddPermissionlessValidatorTx::default()
        }));
        let accounts = HashMap::new();
        let cfg = config(true);
        let parsed = TxParser::new(&cfg, &accounts, None).parse(&tx).unwrap();
        let signer = parsed.operations[0].metadata.as_ref().unwrap()[META_SIGNER].as_str().unwrap().to_owned();
        assert!(signer == format!("0x{}", "ab".repeat(48)));
    }

    #[test]
    fn advance_time_has_no_operations() {
        let tx = Tx::new(UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 9 }));
        let accounts = HashMap::new();
        let cfg = config(false);
        let parsed = TxParser::new(&cfg, &accounts, None).parse(&tx).unwrap();
        assert!(parsed.operations.is_empty());
        assert!(parsed.metadata.unwrap()[META_TX_TYPE] == "ADVANCE_TIME");
    }

    fn owners_strategy() -> impl Strategy<Value = OutputOwners> {
        (0u32..3, 0usize..3).prop_map(|(threshold, n)| OutputOwners {
            locktime: 0,
            threshold,
            addrs: (0..n).map(|i| ShortId([i as u8 + 1; 20])).collect(),
        })
    }

    #[proptest]
    fn operations_are_contiguous_and_signed(
        #[strategy(vec((1u64..1_000_000, any::<bool>()), 0..6))] spent: Vec<(u64, bool)>,
        #[strategy(vec((1u64..1_000_000, owners_strategy()), 0..6))] outs: Vec<(u64, OutputOwners)>,
        #[strategy(vec((1u64..1_000_000, owners_strategy()), 0..4))] stake: Vec<(u64, OutputOwners)>,
    ) {
        let producers: Vec<Tx> = spent
            .iter()
            .enumerate()
            .map(|(i, (amount, multisig))| {
                let owners = if *multisig {
                    OutputOwners {
                        locktime: 0,
                        threshold: 2,
                        addrs: vec![ADDR_A, ADDR_B],
                    }
                } else {
                    OutputOwners::single(ShortId([i as u8 + 1; 20]))
                };
                Tx::new(UnsignedTx::Import(ImportTx {
                    base: BaseTx {
                        memo: vec![i as u8],
                        outs: vec![output(*amount, owners)],
                        ..BaseTx::default()
                    },
                    ..ImportTx::default()
                }))
            })
            .collect();
        let tx = Tx::new(UnsignedTx::AddDelegator(AddDelegatorTx {
            base: BaseTx {
                ins: producers
                    .iter()
                    .zip(&spent)
                    .map(|(p, (amount, _))| self::input(UtxoId::new(p.id(), 0), *amount))
                    .collect(),
                outs: outs.iter().map(|(a, o)| output(*a, o.clone())).collect(),
                ..BaseTx::default()
            },
            stake_outs: stake.iter().map(|(a, o)| output(*a, o.clone())).collect(),
            ..AddDelegatorTx::default()
        }));

        let deps = deps_of(&producers);
        let accounts = referenced_accounts(&deps, HRP).unwrap();
        let cfg = config(false);
        let parsed = TxParser::new(&cfg, &accounts, Some(&deps)).parse(&tx).unwrap();

        for (expected, op) in parsed.operations.iter().enumerate() {
            prop_assert_eq!(op.operation_identifier.index, expected as i64);
            let debit = matches!(kind(op).as_str(), "INPUT" | "IMPORT");
            prop_assert_eq!(debit, value(op) < 0);
            prop_assert!(value(op) != 0);
            let coin = op.coin_change.as_ref().unwrap();
            prop_assert_eq!(coin.coin_action == CoinAction::CoinSpent, value(op) < 0);
        }

        let single_owner = |owners: &OutputOwners| owners.addrs.len() == 1 && owners.threshold == 1;
        let expected = spent.iter().filter(|(_, multisig)| !multisig).count()
            + outs.iter().filter(|(_, o)| single_owner(o)).count()
            + stake.iter().filter(|(_, o)| single_owner(o)).count();
        prop_assert_eq!(parsed.operations.len(), expected);
    }
}
