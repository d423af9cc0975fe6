//! Rosetta operations to an unsigned atomic transaction.

use super::AtomicMetadata;
use crate::mapper::matcher::Match;
use crate::mapper::OP_EXPORT;
use crate::mapper::OP_IMPORT;
use crate::protocol::address::parse_to_id;
use crate::protocol::address::AddressError;
use crate::protocol::address::EvmAddress;
use crate::protocol::atomic::sort_evm_outputs;
use crate::protocol::atomic::AtomicTx;
use crate::protocol::atomic::EvmInput;
use crate::protocol::atomic::EvmOutput;
use crate::protocol::atomic::ExportTx;
use crate::protocol::atomic::ImportTx;
use crate::protocol::atomic::UnsignedAtomicTx;
use crate::protocol::avax::sort_transferable_inputs_with;
use crate::protocol::avax::sort_transferable_outputs;
use crate::protocol::avax::Input;
use crate::protocol::avax::Output;
use crate::protocol::avax::OutputOwners;
use crate::protocol::avax::TransferInput;
use crate::protocol::avax::TransferOutput;
use crate::protocol::avax::TransferableInput;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::avax::UtxoIdError;
use crate::protocol::ids::Id;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Operation;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("expected one input and one output match, got {0}")]
    Matches(usize),

    #[error("unsupported atomic operation type {0}")]
    UnsupportedOperationType(String),

    #[error("input operation does not have coin identifier")]
    MissingCoinIdentifier,

    #[error("operation {0} has no account")]
    MissingAccount(i64),

    #[error("{0} is missing from metadata")]
    MissingMetadata(&'static str),

    #[error(transparent)]
    UtxoId(#[from] UtxoIdError),

    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Builds the atomic transaction for `op_type` and returns it with the
/// signer of each input, aligned with the sorted inputs.
pub fn build_tx(
    op_type: &str,
    matches: &[Match],
    metadata: &AtomicMetadata,
    avax_asset_id: Id,
) -> Result<(AtomicTx, Vec<AccountIdentifier>), BuildError> {
    let [inputs, outputs] = matches else {
        return Err(BuildError::Matches(matches.len()));
    };
    let (unsigned, signers) = match op_type {
        OP_EXPORT => {
            let destination_chain = metadata
                .destination_chain_id
                .ok_or(BuildError::MissingMetadata("destination_chain_id"))?;
            let (ins, signers) = evm_inputs(inputs, metadata.nonce, avax_asset_id)?;
            let export = ExportTx {
                network_id: metadata.network_id,
                blockchain_id: metadata.c_chain_id,
                destination_chain,
                ins,
                exported_outputs: exported_outputs(outputs, avax_asset_id)?,
            };
            (UnsignedAtomicTx::Export(export), signers)
        }
        OP_IMPORT => {
            let source_chain = metadata
                .source_chain_id
                .ok_or(BuildError::MissingMetadata("source_chain_id"))?;
            let (imported_inputs, signers) = imported_inputs(inputs, avax_asset_id)?;
            let import = ImportTx {
                network_id: metadata.network_id,
                blockchain_id: metadata.c_chain_id,
                source_chain,
                imported_inputs,
                outs: evm_outputs(outputs, avax_asset_id)?,
            };
            (UnsignedAtomicTx::Import(import), signers)
        }
        other => return Err(BuildError::UnsupportedOperationType(other.to_owned())),
    };
    Ok((AtomicTx::new(unsigned), signers))
}

fn account(op: &Operation) -> Result<&AccountIdentifier, BuildError> {
    op.account
        .as_ref()
        .ok_or(BuildError::MissingAccount(op.operation_identifier.index))
}

fn evm_inputs(
    inputs: &Match,
    nonce: u64,
    avax_asset_id: Id,
) -> Result<(Vec<EvmInput>, Vec<AccountIdentifier>), BuildError> {
    let mut pairs = inputs
        .operations
        .iter()
        .zip(&inputs.amounts)
        .map(|(op, amount)| {
            let signer = account(op)?;
            let input = EvmInput {
                address: signer.address.parse::<EvmAddress>()?,
                amount: *amount,
                asset_id: avax_asset_id,
                nonce,
            };
            Ok((input, signer.clone()))
        })
        .collect::<Result<Vec<_>, BuildError>>()?;
    pairs.sort_by(|(a, _), (b, _)| a.address.cmp(&b.address).then_with(|| a.asset_id.cmp(&b.asset_id)));
    Ok(pairs.into_iter().unzip())
}

fn imported_inputs(
    inputs: &Match,
    avax_asset_id: Id,
) -> Result<(Vec<TransferableInput>, Vec<AccountIdentifier>), BuildError> {
    let mut ins = Vec::with_capacity(inputs.operations.len());
    let mut signers = Vec::with_capacity(inputs.operations.len());
    for (op, amount) in inputs.operations.iter().zip(&inputs.amounts) {
        let coin = op.coin_change.as_ref().ok_or(BuildError::MissingCoinIdentifier)?;
        ins.push(TransferableInput {
            utxo_id: coin.coin_identifier.identifier.parse()?,
            asset_id: avax_asset_id,
            input: Input::Transfer(TransferInput {
                amount: *amount,
                sig_indices: vec![0],
            }),
        });
        signers.push(account(op)?.clone());
    }
    sort_transferable_inputs_with(&mut ins, &mut signers);
    Ok((ins, signers))
}

fn evm_outputs(outputs: &Match, avax_asset_id: Id) -> Result<Vec<EvmOutput>, BuildError> {
    let mut outs = outputs
        .operations
        .iter()
        .zip(&outputs.amounts)
        .map(|(op, amount)| {
            Ok(EvmOutput {
                address: account(op)?.address.parse()?,
                amount: *amount,
                asset_id: avax_asset_id,
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;
    sort_evm_outputs(&mut outs);
    Ok(outs)
}

fn exported_outputs(outputs: &Match, avax_asset_id: Id) -> Result<Vec<TransferableOutput>, BuildError> {
    let mut outs = outputs
        .operations
        .iter()
        .zip(&outputs.amounts)
        .map(|(op, amount)| {
            Ok(TransferableOutput {
                asset_id: avax_asset_id,
                out: Output::Transfer(TransferOutput {
                    amount: *amount,
                    owners: OutputOwners::single(parse_to_id(&account(op)?.address)?),
                }),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;
    sort_transferable_outputs(&mut outs);
    Ok(outs)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;

    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::mapper::catomic::AtomicTxParser;
    use crate::mapper::matcher::match_operations;
    use crate::mapper::matcher::tests::operation;
    use crate::protocol::address::format_address;
    use crate::protocol::address::ChainAlias;
    use crate::protocol::avax::UtxoId;
    use crate::protocol::ids::ShortId;

    const AVAX: Id = Id([0xa1; 32]);
    const C_CHAIN: Id = Id([0xc0; 32]);

    fn evm(byte: u8) -> String {
        EvmAddress([byte; 20]).to_string()
    }

    fn metadata() -> AtomicMetadata {
        AtomicMetadata {
            network_id: 5,
            c_chain_id: C_CHAIN,
            source_chain_id: Some(Id::EMPTY),
            destination_chain: "P".into(),
            destination_chain_id: Some(Id::EMPTY),
            nonce: 7,
        }
    }

    #[test]
    fn export_aligns_signers_with_sorted_inputs() {
        let destination = format_address("P", "fuji", &ShortId([0x44; 20])).unwrap();
        let ops = vec![
            operation(0, OP_EXPORT, &evm(0x99), -20, None),
            operation(1, OP_EXPORT, &evm(0x11), -10, None),
            operation(2, OP_EXPORT, &destination, 25, None),
        ];
        let matches = match_operations(&ops).unwrap();
        let (tx, signers) = build_tx(OP_EXPORT, &matches, &metadata(), AVAX).unwrap();
        let_assert!(UnsignedAtomicTx::Export(export) = &tx.unsigned);

        assert!(export.ins[0].address == EvmAddress([0x11; 20]));
        assert!(export.ins[0].nonce == 7);
        assert!(signers[0].address == evm(0x11));
        assert!(signers[1].address == evm(0x99));
        assert!(export.exported_outputs[0].out.addresses() == [ShortId([0x44; 20])]);
        assert!(export.blockchain_id == C_CHAIN);
    }

    #[test]
    fn export_round_trips_through_the_parser() {
        let destination = format_address("P", "fuji", &ShortId([0x44; 20])).unwrap();
        let ops = vec![
            operation(0, OP_EXPORT, &evm(0x11), -2_910_137_500, None),
            operation(1, OP_EXPORT, &destination, 10_000_000, None),
        ];
        let matches = match_operations(&ops).unwrap();
        let (tx, _) = build_tx(OP_EXPORT, &matches, &metadata(), AVAX).unwrap();

        let chain_ids = HashMap::from([(Id::EMPTY, ChainAlias::P)]);
        let accounts = HashMap::new();
        let parsed = AtomicTxParser::new("fuji", &chain_ids, &accounts).parse(&tx).unwrap();

        assert!(parsed.len() == 2);
        for (parsed, original) in parsed.iter().zip(&ops) {
            assert!(parsed.account == original.account);
            assert!(parsed.amount == original.amount);
            assert!(parsed.type_ == original.type_);
        }
    }

    #[test]
    fn import_requires_coins() {
        let ops = vec![
            operation(0, OP_IMPORT, "C-fuji1abc", -10, Some("tx:0")),
            operation(1, OP_IMPORT, &evm(0x11), 9, None),
        ];
        let mut matches = match_operations(&ops).unwrap();
        matches[0].operations[0].coin_change = None;
        let_assert!(Err(BuildError::MissingCoinIdentifier) = build_tx(OP_IMPORT, &matches, &metadata(), AVAX));
        assert!(BuildError::MissingCoinIdentifier.to_string() == "input operation does not have coin identifier");
    }

    #[test]
    fn import_spends_utxos_into_evm_outputs() {
        let coin = UtxoId::new(Id([3; 32]), 2).to_string();
        let ops = vec![
            operation(0, OP_IMPORT, "C-fuji1abc", -10, Some(coin.as_str())),
            operation(1, OP_IMPORT, &evm(0x11), 9, None),
        ];
        let matches = match_operations(&ops).unwrap();
        let (tx, signers) = build_tx(OP_IMPORT, &matches, &metadata(), AVAX).unwrap();
        let_assert!(UnsignedAtomicTx::Import(import) = &tx.unsigned);
        assert!(import.imported_inputs[0].utxo_id.to_string() == coin);
        assert!(import.imported_inputs[0].input.sig_indices() == [0]);
        assert!(import.outs[0].amount == 9);
        assert!(import.source_chain == Id::EMPTY);
        assert!(signers[0].address == "C-fuji1abc");
    }

    #[test]
    fn unsupported_operation_type() {
        let ops = vec![
            operation(0, "CALL", &evm(1), -1, Some("tx:0")),
            operation(1, "CALL", &evm(2), 1, None),
        ];
        let matches = match_operations(&ops).unwrap();
        let_assert!(Err(err) = build_tx("CALL", &matches, &metadata(), AVAX));
        assert!(err.to_string() == "unsupported atomic operation type CALL");
    }
}
