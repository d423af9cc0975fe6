//! Rosetta operations to an unsigned P-chain transaction.

use super::ConstructionMetadata;
use super::OpKind;
use super::OperationMetadata;
use super::StakingMetadata;
use super::TxType;
use crate::mapper::matcher::Match;
use crate::protocol::address::parse_to_id;
use crate::protocol::address::AddressError;
use crate::protocol::avax::sort_transferable_inputs_with;
use crate::protocol::avax::sort_transferable_outputs;
use crate::protocol::avax::BaseTx;
use crate::protocol::avax::Input;
use crate::protocol::avax::LockIn;
use crate::protocol::avax::Output;
use crate::protocol::avax::OutputOwners;
use crate::protocol::avax::Owner;
use crate::protocol::avax::TransferInput;
use crate::protocol::avax::TransferOutput;
use crate::protocol::avax::TransferableInput;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::avax::UtxoId;
use crate::protocol::avax::UtxoIdError;
use crate::protocol::ids::Id;
use crate::protocol::ids::IdError;
use crate::protocol::ids::NodeId;
use crate::protocol::platformvm::txs::AddDelegatorTx;
use crate::protocol::platformvm::txs::AddPermissionlessDelegatorTx;
use crate::protocol::platformvm::txs::AddPermissionlessValidatorTx;
use crate::protocol::platformvm::txs::AddValidatorTx;
use crate::protocol::platformvm::txs::ExportTx;
use crate::protocol::platformvm::txs::ImportTx;
use crate::protocol::platformvm::txs::Signer;
use crate::protocol::platformvm::txs::Validator;
use crate::protocol::platformvm::Tx;
use crate::protocol::platformvm::UnsignedTx;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Operation;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("expected one input and one output match, got {0}")]
    Matches(usize),

    #[error("input operation does not have coin identifier")]
    MissingCoinIdentifier,

    #[error("operation {0} has no account")]
    MissingAccount(i64),

    #[error("unknown output type")]
    UnknownOutputType,

    #[error("{0} metadata is missing")]
    MissingMetadata(&'static str),

    #[error("overflow while calculating stake weight")]
    StakeWeightOverflow,

    #[error("unsupported tx type {0}")]
    UnsupportedTxType(TxType),

    #[error("invalid BLS {0}")]
    InvalidBls(&'static str),

    #[error(transparent)]
    UtxoId(#[from] UtxoIdError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("invalid operation metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Builds the transaction described by `matches` (inputs, then outputs) and
/// returns it with the account expected to sign each input, in input order.
pub fn build_tx(
    tx_type: TxType,
    matches: &[Match],
    metadata: &ConstructionMetadata,
    avax_asset_id: Id,
) -> Result<(Tx, Vec<AccountIdentifier>), BuildError> {
    let [inputs, outputs] = matches else {
        return Err(BuildError::Matches(matches.len()));
    };
    let (ins, signers) = build_inputs(inputs, avax_asset_id)?;
    let outs = build_outputs(outputs, avax_asset_id)?;

    let base = |ins: Vec<TransferableInput>, outs: Vec<TransferableOutput>| BaseTx {
        network_id: metadata.network_id,
        blockchain_id: metadata.blockchain_id,
        outs,
        ins,
        memo: vec![],
    };

    let unsigned = match tx_type {
        TxType::ImportAvax => {
            let import = metadata.import.as_ref().ok_or(BuildError::MissingMetadata("import"))?;
            UnsignedTx::Import(ImportTx {
                base: base(vec![], outs.regular),
                source_chain: import.source_chain_id,
                imported_inputs: ins,
            })
        }
        TxType::ExportAvax => {
            let export = metadata.export.as_ref().ok_or(BuildError::MissingMetadata("export"))?;
            UnsignedTx::Export(ExportTx {
                base: base(ins, outs.regular),
                destination_chain: export.destination_chain_id,
                exported_outputs: outs.exported,
            })
        }
        TxType::AddValidator
        | TxType::AddDelegator
        | TxType::AddPermissionlessValidator
        | TxType::AddPermissionlessDelegator => {
            let staking = metadata.staking.as_ref().ok_or(BuildError::MissingMetadata("staking"))?;
            let validator = Validator {
                node_id: staking.node_id.parse::<NodeId>()?,
                start: staking.start,
                end: staking.end,
                weight: stake_weight(&outs.stake)?,
            };
            let mut base = base(ins, outs.regular);
            base.memo = staking.memo.as_bytes().to_vec();
            staking_tx(tx_type, base, validator, outs.stake, staking)?
        }
        other => return Err(BuildError::UnsupportedTxType(other)),
    };

    Ok((Tx::new(unsigned), signers))
}

fn staking_tx(
    tx_type: TxType,
    base: BaseTx,
    validator: Validator,
    stake_outs: Vec<TransferableOutput>,
    staking: &StakingMetadata,
) -> Result<UnsignedTx, BuildError> {
    let validation_owner = rewards_owner(&staking.validation_rewards_owners, staking)?;
    let delegation_owner = rewards_owner(&staking.delegation_rewards_owners, staking)?;
    let subnet_id = if staking.subnet.is_empty() {
        Id::EMPTY
    } else {
        staking.subnet.parse()?
    };

    let unsigned = match tx_type {
        TxType::AddValidator => UnsignedTx::AddValidator(AddValidatorTx {
            base,
            validator,
            stake_outs,
            rewards_owner: validation_owner,
            delegation_shares: staking.shares,
        }),
        TxType::AddDelegator => UnsignedTx::AddDelegator(AddDelegatorTx {
            base,
            validator,
            stake_outs,
            rewards_owner: delegation_owner,
        }),
        TxType::AddPermissionlessValidator => {
            UnsignedTx::AddPermissionlessValidator(AddPermissionlessValidatorTx {
                base,
                validator,
                subnet_id,
                signer: bls_signer(staking)?,
                stake_outs,
                validator_rewards_owner: validation_owner,
                delegator_rewards_owner: delegation_owner,
                delegation_shares: staking.shares,
            })
        }
        TxType::AddPermissionlessDelegator => {
            UnsignedTx::AddPermissionlessDelegator(AddPermissionlessDelegatorTx {
                base,
                validator,
                subnet_id,
                stake_outs,
                rewards_owner: delegation_owner,
            })
        }
        other => return Err(BuildError::UnsupportedTxType(other)),
    };
    Ok(unsigned)
}

/// Inputs sorted by spent UTXO, with the signers kept aligned.
fn build_inputs(
    inputs: &Match,
    avax_asset_id: Id,
) -> Result<(Vec<TransferableInput>, Vec<AccountIdentifier>), BuildError> {
    let mut ins = Vec::with_capacity(inputs.operations.len());
    let mut signers = Vec::with_capacity(inputs.operations.len());
    for (op, amount) in inputs.operations.iter().zip(&inputs.amounts) {
        let coin = op.coin_change.as_ref().ok_or(BuildError::MissingCoinIdentifier)?;
        let utxo_id: UtxoId = coin.coin_identifier.identifier.parse()?;
        let meta = OperationMetadata::parse(op.metadata.as_ref())?;

        let inner = TransferInput {
            amount: *amount,
            sig_indices: meta.sig_indices(),
        };
        let input = if meta.locktime == 0 {
            Input::Transfer(inner)
        } else {
            Input::StakeableLock(LockIn {
                locktime: meta.locktime,
                inner,
            })
        };
        ins.push(TransferableInput {
            utxo_id,
            asset_id: avax_asset_id,
            input,
        });
        signers.push(account(op)?.clone());
    }
    sort_transferable_inputs_with(&mut ins, &mut signers);
    Ok((ins, signers))
}

#[derive(Debug, Default)]
struct Outputs {
    regular: Vec<TransferableOutput>,
    stake: Vec<TransferableOutput>,
    exported: Vec<TransferableOutput>,
}

fn build_outputs(outputs: &Match, avax_asset_id: Id) -> Result<Outputs, BuildError> {
    let mut built = Outputs::default();
    for (op, amount) in outputs.operations.iter().zip(&outputs.amounts) {
        let meta = OperationMetadata::parse(op.metadata.as_ref())?;
        let addr = parse_to_id(&account(op)?.address)?;
        let out = TransferableOutput {
            asset_id: avax_asset_id,
            out: Output::Transfer(TransferOutput {
                amount: *amount,
                owners: OutputOwners {
                    locktime: meta.locktime,
                    threshold: meta.threshold,
                    addrs: vec![addr],
                },
            }),
        };
        match meta.kind {
            Some(OpKind::Output) => built.regular.push(out),
            Some(OpKind::Stake) => built.stake.push(out),
            Some(OpKind::Export) => built.exported.push(out),
            _ => return Err(BuildError::UnknownOutputType),
        }
    }
    sort_transferable_outputs(&mut built.regular);
    sort_transferable_outputs(&mut built.stake);
    sort_transferable_outputs(&mut built.exported);
    Ok(built)
}

fn account(op: &Operation) -> Result<&AccountIdentifier, BuildError> {
    op.account
        .as_ref()
        .ok_or(BuildError::MissingAccount(op.operation_identifier.index))
}

fn stake_weight(stake_outs: &[TransferableOutput]) -> Result<u64, BuildError> {
    stake_outs
        .iter()
        .try_fold(0u64, |total, out| total.checked_add(out.amount()))
        .ok_or(BuildError::StakeWeightOverflow)
}

fn rewards_owner(addresses: &[String], staking: &StakingMetadata) -> Result<Owner, BuildError> {
    let mut addrs = addresses
        .iter()
        .map(|address| parse_to_id(address))
        .collect::<Result<Vec<_>, _>>()?;
    addrs.sort();
    Ok(Owner(OutputOwners {
        locktime: staking.locktime,
        threshold: staking.threshold.max(1),
        addrs,
    }))
}

fn bls_signer(staking: &StakingMetadata) -> Result<Signer, BuildError> {
    if staking.bls_public_key.is_empty() || staking.bls_proof_of_possession.is_empty() {
        return Ok(Signer::Empty);
    }
    Ok(Signer::ProofOfPossession {
        public_key: bls_bytes(&staking.bls_public_key, "public key")?,
        proof: bls_bytes(&staking.bls_proof_of_possession, "proof of possession")?,
    })
}

fn bls_bytes<const N: usize>(value: &str, what: &'static str) -> Result<[u8; N], BuildError> {
    let raw = hex::decode(value.trim_start_matches("0x")).map_err(|_| BuildError::InvalidBls(what))?;
    raw.try_into().map_err(|_| BuildError::InvalidBls(what))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;

    use assert2::assert;
    use assert2::let_assert;
    use serde_json::json;

    use super::*;
    use crate::mapper::matcher::match_operations;
    use crate::mapper::matcher::tests::operation;
    use crate::mapper::pchain::ExportMetadata;
    use crate::mapper::pchain::TxParser;
    use crate::mapper::pchain::TxParserConfig;
    use crate::mapper::to_metadata;
    use crate::protocol::address::format_address;
    use crate::protocol::address::ChainAlias;
    use crate::protocol::ids::ShortId;

    const AVAX: Id = Id([0xa1; 32]);
    const C_CHAIN: Id = Id([0xc0; 32]);

    fn address(alias: &str, byte: u8) -> String {
        format_address(alias, "fuji", &ShortId([byte; 20])).unwrap()
    }

    fn with_kind(mut op: Operation, kind: &str) -> Operation {
        op.metadata = Some(to_metadata(&json!({ "type": kind })).unwrap());
        op
    }

    fn coin(byte: u8, index: u32) -> String {
        UtxoId::new(Id([byte; 32]), index).to_string()
    }

    fn export_ops() -> Vec<Operation> {
        vec![
            with_kind(operation(0, "EXPORT_AVAX", &address("P", 1), -700, Some(coin(9, 1).as_str())), "INPUT"),
            with_kind(operation(1, "EXPORT_AVAX", &address("P", 2), -300, Some(coin(3, 0).as_str())), "INPUT"),
            with_kind(operation(2, "EXPORT_AVAX", &address("P", 1), 100, None), "OUTPUT"),
            with_kind(operation(3, "EXPORT_AVAX", &address("C", 4), 899, None), "EXPORT"),
        ]
    }

    fn export_metadata() -> ConstructionMetadata {
        ConstructionMetadata {
            network_id: 5,
            blockchain_id: Id::EMPTY,
            export: Some(ExportMetadata {
                destination_chain: "C".into(),
                destination_chain_id: C_CHAIN,
            }),
            ..ConstructionMetadata::default()
        }
    }

    #[test]
    fn export_sorts_inputs_and_keeps_signers_aligned() {
        let matches = match_operations(&export_ops()).unwrap();
        let (tx, signers) = build_tx(TxType::ExportAvax, &matches, &export_metadata(), AVAX).unwrap();
        let_assert!(UnsignedTx::Export(export) = &tx.unsigned);

        assert!(export.base.ins[0].utxo_id == UtxoId::new(Id([3; 32]), 0));
        assert!(export.base.ins[0].amount() == 300);
        assert!(signers[0].address == address("P", 2));
        assert!(signers[1].address == address("P", 1));
        assert!(export.base.outs.len() == 1);
        assert!(export.exported_outputs[0].amount() == 899);
        assert!(export.destination_chain == C_CHAIN);
        assert!(export.base.network_id == 5);
    }

    #[test]
    fn export_parses_back_to_its_operations() {
        let ops = export_ops();
        let matches = match_operations(&ops).unwrap();
        let (tx, signers) = build_tx(TxType::ExportAvax, &matches, &export_metadata(), AVAX).unwrap();

        let accounts: HashMap<String, AccountIdentifier> = tx
            .unsigned
            .ins()
            .iter()
            .zip(signers)
            .map(|(input, signer)| (input.utxo_id.to_string(), signer))
            .collect();
        let cfg = TxParserConfig {
            construction: true,
            hrp: "fuji".into(),
            chain_ids: HashMap::from([(C_CHAIN, ChainAlias::C)]),
            avax_asset_id: AVAX,
            currencies: HashMap::new(),
        };
        let parsed = TxParser::new(&cfg, &accounts, None).parse(&tx).unwrap();

        let summary = |ops: &[Operation]| {
            let mut rows: Vec<(String, String)> = ops
                .iter()
                .map(|op| {
                    (
                        op.account.as_ref().unwrap().address.clone(),
                        op.amount.as_ref().unwrap().value.clone(),
                    )
                })
                .collect();
            rows.sort();
            rows
        };
        assert!(summary(&parsed.operations) == summary(&ops));
        assert!(parsed.operations.iter().all(|op| op.type_ == "EXPORT_AVAX"));
    }

    #[test]
    fn delegator_weight_is_the_stake_sum() {
        let ops = vec![
            with_kind(operation(0, "ADD_DELEGATOR", &address("P", 1), -2_000, Some(coin(1, 0).as_str())), "INPUT"),
            with_kind(operation(1, "ADD_DELEGATOR", &address("P", 1), 500, None), "STAKE"),
            with_kind(operation(2, "ADD_DELEGATOR", &address("P", 1), 1_000, None), "STAKE"),
            with_kind(operation(3, "ADD_DELEGATOR", &address("P", 1), 400, None), "OUTPUT"),
        ];
        let staking = StakingMetadata {
            node_id: NodeId(ShortId([7; 20])).to_string(),
            bls_public_key: String::new(),
            bls_proof_of_possession: String::new(),
            validation_rewards_owners: vec![],
            delegation_rewards_owners: vec![address("P", 1)],
            start: 10,
            end: 20,
            subnet: String::new(),
            shares: 0,
            memo: "hi".into(),
            locktime: 0,
            threshold: 0,
        };
        let metadata = ConstructionMetadata {
            staking: Some(staking),
            ..ConstructionMetadata::default()
        };
        let matches = match_operations(&ops).unwrap();
        let (tx, signers) = build_tx(TxType::AddDelegator, &matches, &metadata, AVAX).unwrap();
        let_assert!(UnsignedTx::AddDelegator(add) = &tx.unsigned);
        assert!(add.validator.weight == 1_500);
        assert!(add.validator.start == 10);
        assert!(add.stake_outs.len() == 2);
        assert!(add.base.memo == b"hi".to_vec());
        assert!(add.rewards_owner.0.threshold == 1);
        assert!(add.rewards_owner.0.addrs == vec![ShortId([1; 20])]);
        assert!(signers.len() == 1);
    }

    #[test]
    fn stake_weight_overflow() {
        let out = |amount| TransferableOutput {
            asset_id: AVAX,
            out: Output::Transfer(TransferOutput {
                amount,
                owners: OutputOwners::single(ShortId([1; 20])),
            }),
        };
        let_assert!(Err(BuildError::StakeWeightOverflow) = stake_weight(&[out(u64::MAX), out(1)]));
        assert!(BuildError::StakeWeightOverflow.to_string() == "overflow while calculating stake weight");
    }

    #[test]
    fn rejects_missing_metadata_and_output_type() {
        let matches = match_operations(&export_ops()).unwrap();
        let_assert!(
            Err(BuildError::MissingMetadata("import")) =
                build_tx(TxType::ImportAvax, &matches, &export_metadata(), AVAX)
        );
        let_assert!(
            Err(BuildError::UnsupportedTxType(TxType::CreateSubnet)) =
                build_tx(TxType::CreateSubnet, &matches, &export_metadata(), AVAX)
        );

        let mut ops = export_ops();
        ops[3].metadata = None;
        let matches = match_operations(&ops).unwrap();
        let_assert!(
            Err(BuildError::UnknownOutputType) =
                build_tx(TxType::ExportAvax, &matches, &export_metadata(), AVAX)
        );
    }

    #[test]
    fn locked_inputs_keep_their_locktime() {
        let mut input = operation(0, "ADD_VALIDATOR", &address("P", 1), -5, Some(coin(1, 2).as_str()));
        input.metadata = Some(to_metadata(&json!({"type": "INPUT", "locktime": 99, "sig_indices": [1]})).unwrap());
        let inputs = Match {
            operations: vec![input],
            amounts: vec![5],
        };
        let (ins, _) = build_inputs(&inputs, AVAX).unwrap();
        assert!(ins[0].input.stakeable_locktime() == 99);
        assert!(ins[0].input.sig_indices() == [1]);
    }
}
