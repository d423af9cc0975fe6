//! Atomic transaction to Rosetta operations, for construction round trips.
//!
//! Spending-side operations come first, then the receiving side; every
//! receiving operation lists all spending operations as related.

use std::collections::HashMap;

use crate::mapper::atomic_avax_currency;
use crate::mapper::OP_EXPORT;
use crate::mapper::OP_IMPORT;
use crate::protocol::address::format_address;
use crate::protocol::address::AddressError;
use crate::protocol::address::ChainAlias;
use crate::protocol::atomic::AtomicTx;
use crate::protocol::atomic::EvmInput;
use crate::protocol::atomic::EvmOutput;
use crate::protocol::atomic::UnsignedAtomicTx;
use crate::protocol::avax::TransferableInput;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::ids::Id;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Amount;
use crate::rosetta::types::CoinAction;
use crate::rosetta::types::CoinChange;
use crate::rosetta::types::Operation;
use crate::rosetta::types::OperationIdentifier;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown destination chain")]
    UnknownDestinationChain,

    #[error("no matching input addresses")]
    NoMatchingInputAddresses,

    #[error(transparent)]
    Address(#[from] AddressError),
}

pub struct AtomicTxParser<'a> {
    hrp: &'a str,
    chain_ids: &'a HashMap<Id, ChainAlias>,
    input_accounts: &'a HashMap<String, AccountIdentifier>,
}

impl<'a> AtomicTxParser<'a> {
    pub fn new(
        hrp: &'a str,
        chain_ids: &'a HashMap<Id, ChainAlias>,
        input_accounts: &'a HashMap<String, AccountIdentifier>,
    ) -> Self {
        Self {
            hrp,
            chain_ids,
            input_accounts,
        }
    }

    pub fn parse(&self, tx: &AtomicTx) -> Result<Vec<Operation>, ParseError> {
        match &tx.unsigned {
            UnsignedAtomicTx::Export(export) => {
                let alias = self
                    .chain_ids
                    .get(&export.destination_chain)
                    .copied()
                    .ok_or(ParseError::UnknownDestinationChain)?;
                let mut ops = evm_inputs(&export.ins);
                let exported = self.exported_outputs(ops.len(), alias, &export.exported_outputs)?;
                ops.extend(exported);
                Ok(ops)
            }
            UnsignedAtomicTx::Import(import) => {
                let mut ops = self.imported_inputs(&import.imported_inputs)?;
                ops.extend(evm_outputs(ops.len(), &import.outs));
                Ok(ops)
            }
        }
    }

    fn imported_inputs(&self, ins: &[TransferableInput]) -> Result<Vec<Operation>, ParseError> {
        ins.iter()
            .enumerate()
            .map(|(index, input)| {
                let utxo_id = input.utxo_id.to_string();
                let account = self
                    .input_accounts
                    .get(&utxo_id)
                    .cloned()
                    .ok_or(ParseError::NoMatchingInputAddresses)?;
                Ok(Operation {
                    account: Some(account),
                    coin_change: Some(CoinChange::new(utxo_id, CoinAction::CoinSpent)),
                    ..operation(index, OP_IMPORT, -i128::from(input.amount()))
                })
            })
            .collect()
    }

    fn exported_outputs(
        &self,
        first: usize,
        alias: ChainAlias,
        outs: &[TransferableOutput],
    ) -> Result<Vec<Operation>, ParseError> {
        outs.iter()
            .enumerate()
            .map(|(offset, out)| {
                let address = match out.out.addresses().first() {
                    Some(addr) => format_address(alias.as_ref(), self.hrp, addr)?,
                    None => String::new(),
                };
                Ok(Operation {
                    account: Some(AccountIdentifier::new(address)),
                    related_operations: Some(related(first)),
                    ..operation(first + offset, OP_EXPORT, i128::from(out.amount()))
                })
            })
            .collect()
    }
}

fn evm_inputs(ins: &[EvmInput]) -> Vec<Operation> {
    ins.iter()
        .enumerate()
        .map(|(index, input)| Operation {
            account: Some(AccountIdentifier::new(input.address.to_string())),
            ..operation(index, OP_EXPORT, -i128::from(input.amount))
        })
        .collect()
}

fn evm_outputs(first: usize, outs: &[EvmOutput]) -> Vec<Operation> {
    outs.iter()
        .enumerate()
        .map(|(offset, out)| Operation {
            account: Some(AccountIdentifier::new(out.address.to_string())),
            related_operations: Some(related(first)),
            ..operation(first + offset, OP_IMPORT, i128::from(out.amount))
        })
        .collect()
}

fn operation(index: usize, op_type: &str, value: i128) -> Operation {
    Operation {
        operation_identifier: OperationIdentifier::new(index),
        related_operations: None,
        type_: op_type.to_owned(),
        status: None,
        account: None,
        amount: Some(Amount::new(value, &atomic_avax_currency())),
        coin_change: None,
        metadata: None,
    }
}

fn related(count: usize) -> Vec<OperationIdentifier> {
    (0..count).map(OperationIdentifier::new).collect()
}
