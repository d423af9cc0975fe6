use crate::mapper::pchain::OpKind;
use crate::rosetta::types::Operation;

/// Operations of one transaction, bucketed by where they end up.
///
/// Only inputs, outputs and stake outputs are numbered in the operation list;
/// in indexing mode imported inputs and exported outputs are reported on the
/// side under the transaction metadata.
#[derive(Debug, Clone, Default)]
pub(super) struct TxOps {
    construction: bool,
    pub ins: Vec<Operation>,
    pub outs: Vec<Operation>,
    pub stake_outs: Vec<Operation>,
    pub import_ins: Vec<Operation>,
    pub export_outs: Vec<Operation>,
}

impl TxOps {
    pub fn new(construction: bool) -> Self {
        Self {
            construction,
            ..Self::default()
        }
    }

    /// Index the next included operation gets.
    pub fn len(&self) -> usize {
        self.ins.len() + self.outs.len() + self.stake_outs.len()
    }

    pub fn append(&mut self, op: Operation, kind: OpKind) {
        match kind {
            OpKind::Import if self.construction => self.ins.push(op),
            OpKind::Import => self.import_ins.push(op),
            OpKind::Export if self.construction => self.outs.push(op),
            OpKind::Export => self.export_outs.push(op),
            OpKind::Stake | OpKind::Reward => self.stake_outs.push(op),
            OpKind::Output => self.outs.push(op),
            OpKind::Input => self.ins.push(op),
        }
    }

    /// The numbered operations, in index order.
    pub fn into_parts(self) -> (Vec<Operation>, Vec<Operation>, Vec<Operation>) {
        let mut included = self.ins;
        included.extend(self.outs);
        included.extend(self.stake_outs);
        (included, self.import_ins, self.export_outs)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;

    use super::*;
    use crate::mapper::matcher::tests::operation;

    #[test]
    fn side_channels_only_when_indexing() {
        let op = operation(0, "IMPORT_AVAX", "P-a", -1, Some("tx:0"));

        let mut indexing = TxOps::new(false);
        indexing.append(op.clone(), OpKind::Import);
        assert!(indexing.len() == 0);
        assert!(indexing.import_ins.len() == 1);

        let mut construction = TxOps::new(true);
        construction.append(op, OpKind::Import);
        assert!(construction.len() == 1);
        assert!(construction.import_ins.is_empty());
    }

    #[test]
    fn included_order_is_ins_outs_stake() {
        let mut ops = TxOps::new(false);
        ops.append(operation(0, "ADD_DELEGATOR", "P-stake", 3, None), OpKind::Stake);
        ops.append(operation(1, "ADD_DELEGATOR", "P-out", 2, None), OpKind::Output);
        ops.append(operation(2, "ADD_DELEGATOR", "P-in", -5, None), OpKind::Input);
        let (included, _, _) = ops.into_parts();
        let accounts: Vec<&str> = included
            .iter()
            .filter_map(|op| op.account.as_ref())
            .map(|account| account.address.as_str())
            .collect();
        assert!(accounts == vec!["P-in", "P-out", "P-stake"]);
    }
}
