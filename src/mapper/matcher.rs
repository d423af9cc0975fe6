//! Groups a construction request's operations into one negative (input) and
//! one positive (output) match.

use serde::Deserialize;
use serde::Serialize;

use super::atomic_avax_currency;
use super::OP_EXPORT;
use super::OP_IMPORT;
use crate::rosetta::types::CoinAction;
use crate::rosetta::types::Operation;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("no operations were passed to match")]
    NoOperations,

    #[error("operation {index} has type {found}, expected {expected}")]
    MixedTypes {
        index: i64,
        expected: String,
        found: String,
    },

    #[error("operation {0} has no account")]
    MissingAccount(i64),

    #[error("operation {0} has no amount")]
    MissingAmount(i64),

    #[error("operation {index} has invalid amount {value}")]
    InvalidAmount { index: i64, value: String },

    #[error("operation {0} has unexpected currency")]
    Currency(i64),

    #[error("operation {0} has a zero amount")]
    ZeroAmount(i64),

    #[error("operation {0} must spend a coin")]
    CoinAction(i64),

    #[error("expected exactly one {0} operation")]
    Repeated(&'static str),

    #[error("no {0} operations found")]
    Missing(&'static str),
}

/// Operations of one direction plus their absolute amounts, aligned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub operations: Vec<Operation>,
    pub amounts: Vec<u64>,
}

impl Match {
    fn empty() -> Self {
        Self {
            operations: vec![],
            amounts: vec![],
        }
    }

    fn push(&mut self, operation: Operation, amount: u64) {
        self.operations.push(operation);
        self.amounts.push(amount);
    }
}

/// What a description requires of the operations it matches.
#[derive(Debug, Clone, Copy)]
struct Description {
    name: &'static str,
    coin_action: Option<CoinAction>,
    allow_repeats: bool,
}

/// Matches `operations` as `[inputs, outputs]`.
///
/// All operations must share the first operation's type and carry an account
/// and an atomic AVAX amount. Exports move no coins on the spending side;
/// every other type spends coins. Imports and exports take a single output.
pub fn match_operations(operations: &[Operation]) -> Result<[Match; 2], MatchError> {
    let first = operations.first().ok_or(MatchError::NoOperations)?;
    let op_type = first.type_.as_str();

    let (input_action, repeat_outputs) = match op_type {
        OP_EXPORT => (None, false),
        OP_IMPORT => (Some(CoinAction::CoinSpent), false),
        _ => (Some(CoinAction::CoinSpent), true),
    };
    let inputs = Description {
        name: "input",
        coin_action: input_action,
        allow_repeats: true,
    };
    let outputs = Description {
        name: "output",
        coin_action: None,
        allow_repeats: repeat_outputs,
    };

    let currency = atomic_avax_currency();
    let mut matches = [Match::empty(), Match::empty()];
    for op in operations {
        let index = op.operation_identifier.index;
        if op.type_ != op_type {
            return Err(MatchError::MixedTypes {
                index,
                expected: op_type.to_owned(),
                found: op.type_.clone(),
            });
        }
        if op.account.is_none() {
            return Err(MatchError::MissingAccount(index));
        }
        let amount = op.amount.as_ref().ok_or(MatchError::MissingAmount(index))?;
        if amount.currency != currency {
            return Err(MatchError::Currency(index));
        }
        let value: i128 = amount
            .value
            .parse()
            .map_err(|_| MatchError::InvalidAmount {
                index,
                value: amount.value.clone(),
            })?;
        let magnitude = u64::try_from(value.unsigned_abs()).map_err(|_| MatchError::InvalidAmount {
            index,
            value: amount.value.clone(),
        })?;

        let (slot, description) = match value.signum() {
            -1 => (0, inputs),
            1 => (1, outputs),
            _ => return Err(MatchError::ZeroAmount(index)),
        };
        if let Some(action) = description.coin_action {
            let spends = op
                .coin_change
                .as_ref()
                .is_some_and(|change| change.coin_action == action);
            if !spends {
                return Err(MatchError::CoinAction(index));
            }
        }
        matches[slot].push(op.clone(), magnitude);
    }

    for (found, description) in matches.iter().zip([inputs, outputs]) {
        if found.operations.is_empty() {
            return Err(MatchError::Missing(description.name));
        }
        if !description.allow_repeats && found.operations.len() > 1 {
            return Err(MatchError::Repeated(description.name));
        }
    }

    Ok(matches)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::rosetta::types::AccountIdentifier;
    use crate::rosetta::types::Amount;
    use crate::rosetta::types::CoinChange;
    use crate::rosetta::types::OperationIdentifier;

    pub(crate) fn operation(
        index: usize,
        op_type: &str,
        account: &str,
        value: i64,
        coin: Option<&str>,
    ) -> Operation {
        Operation {
            operation_identifier: OperationIdentifier::new(index),
            related_operations: None,
            type_: op_type.to_owned(),
            status: None,
            account: Some(AccountIdentifier::new(account)),
            amount: Some(Amount::new(value, &atomic_avax_currency())),
            coin_change: coin.map(|id| CoinChange::new(id, CoinAction::CoinSpent)),
            metadata: None,
        }
    }

    #[test]
    fn splits_by_sign() {
        let ops = vec![
            operation(0, "EXPORT_AVAX", "P-a", -10, Some("tx:0")),
            operation(1, "EXPORT_AVAX", "P-b", 4, None),
            operation(2, "EXPORT_AVAX", "P-c", 5, None),
        ];
        let [inputs, outputs] = match_operations(&ops).unwrap();
        assert!(inputs.amounts == vec![10]);
        assert!(outputs.amounts == vec![4, 5]);
        assert!(outputs.operations[1].operation_identifier.index == 2);
    }

    #[test]
    fn atomic_export_needs_no_coin_but_one_output() {
        let ops = vec![
            operation(0, OP_EXPORT, "0xabc", -10, None),
            operation(1, OP_EXPORT, "P-b", 4, None),
        ];
        assert!(match_operations(&ops).is_ok());

        let mut doubled = ops.clone();
        doubled.push(operation(2, OP_EXPORT, "P-c", 4, None));
        let_assert!(Err(MatchError::Repeated("output")) = match_operations(&doubled));
    }

    #[test]
    fn inputs_must_spend_coins_outside_export() {
        let ops = vec![
            operation(0, OP_IMPORT, "C-a", -10, None),
            operation(1, OP_IMPORT, "0xabc", 9, None),
        ];
        let_assert!(Err(MatchError::CoinAction(0)) = match_operations(&ops));
    }

    #[test]
    fn rejects_empty_mixed_and_one_sided() {
        let_assert!(Err(MatchError::NoOperations) = match_operations(&[]));

        let mixed = vec![
            operation(0, "ADD_DELEGATOR", "P-a", -10, Some("tx:0")),
            operation(1, "ADD_VALIDATOR", "P-a", 10, None),
        ];
        let_assert!(Err(MatchError::MixedTypes { index: 1, .. }) = match_operations(&mixed));

        let one_sided = vec![operation(0, "ADD_DELEGATOR", "P-a", -10, Some("tx:0"))];
        let_assert!(Err(MatchError::Missing("output")) = match_operations(&one_sided));
    }

    #[test]
    fn error_message_for_empty_input() {
        assert!(MatchError::NoOperations.to_string() == "no operations were passed to match");
    }
}
