//! Transactions whose outputs the parsed transactions spend.
//!
//! On-chain inputs carry no addresses, so the accounts behind them are
//! recovered from the producing transactions.

use std::collections::BTreeSet;
use std::collections::HashMap;

use crate::protocol::address::format_address;
use crate::protocol::address::AddressError;
use crate::protocol::address::ChainAlias;
use crate::protocol::avax::BaseTx;
use crate::protocol::avax::Output;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::avax::Utxo;
use crate::protocol::avax::UtxoId;
use crate::protocol::ids::Id;
use crate::protocol::platformvm::txs::ImportTx;
use crate::protocol::platformvm::Tx;
use crate::protocol::platformvm::UnsignedTx;
use crate::rosetta::types::AccountIdentifier;

/// Producing transactions by id.
pub type BlockTxDependencies = HashMap<Id, DependencyTx>;

/// A producing transaction, its reward UTXOs, and every UTXO it created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTx {
    pub id: Id,
    pub tx: Option<Tx>,
    pub reward_utxos: Vec<Utxo>,
    utxos: HashMap<UtxoId, Utxo>,
}

impl DependencyTx {
    /// Indexes the outputs of `tx` (regular outputs first, then stake outputs,
    /// numbered cumulatively) together with the reward UTXOs.
    pub fn new(id: Id, tx: Option<Tx>, reward_utxos: Vec<Utxo>) -> Self {
        let mut utxos: HashMap<UtxoId, Utxo> = reward_utxos
            .iter()
            .map(|utxo| (utxo.utxo_id, utxo.clone()))
            .collect();
        if let Some(tx) = &tx {
            let produced = tx.unsigned.outs().iter().chain(tx.unsigned.stake_outs());
            for (index, out) in produced.enumerate() {
                let utxo_id = UtxoId::new(id, index as u32);
                utxos.insert(
                    utxo_id,
                    Utxo {
                        utxo_id,
                        asset_id: out.asset_id,
                        out: out.out.clone(),
                    },
                );
            }
        }
        Self {
            id,
            tx,
            reward_utxos,
            utxos,
        }
    }

    /// The synthetic producer of the genesis allocations. Its UTXOs keep
    /// their own identifiers, which reference the zero transaction id.
    pub fn genesis(allocation_tx: Tx, genesis_utxos: &[Utxo]) -> Self {
        Self {
            id: Id::EMPTY,
            tx: Some(allocation_tx),
            reward_utxos: vec![],
            utxos: genesis_utxos
                .iter()
                .map(|utxo| (utxo.utxo_id, utxo.clone()))
                .collect(),
        }
    }

    pub fn utxos(&self) -> &HashMap<UtxoId, Utxo> {
        &self.utxos
    }
}

/// Ids of the transactions whose outputs `tx` spends, deduplicated and
/// sorted. Rewards depend on the staking transaction they pay out; imported
/// inputs live in shared memory and have no local producer.
pub fn dependency_ids(tx: &UnsignedTx) -> Vec<Id> {
    match tx {
        UnsignedTx::RewardValidator(reward) => vec![reward.tx_id],
        UnsignedTx::AdvanceTime(_) => vec![],
        other => other
            .ins()
            .iter()
            .map(|input| input.utxo_id.tx_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

/// Dependency ids of a whole batch.
pub fn batch_dependency_ids<'a>(txs: impl IntoIterator<Item = &'a Tx>) -> Vec<Id> {
    txs.into_iter()
        .flat_map(|tx| dependency_ids(&tx.unsigned))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Account owning each single-owner UTXO of the dependencies, keyed by the
/// UTXO id text form.
pub fn referenced_accounts(
    deps: &BlockTxDependencies,
    hrp: &str,
) -> Result<HashMap<String, AccountIdentifier>, AddressError> {
    let mut accounts = HashMap::new();
    for dep in deps.values() {
        for utxo in dep.utxos().values() {
            let [addr] = utxo.out.addresses() else {
                continue;
            };
            let address = format_address(ChainAlias::P.as_ref(), hrp, addr)?;
            accounts.insert(utxo.utxo_id.to_string(), AccountIdentifier::new(address));
        }
    }
    Ok(accounts)
}

/// Genesis allocations as the outputs of an input-less import, so they parse
/// like any other transaction. Stakeable locks are peeled off.
pub fn genesis_allocation_tx(genesis_utxos: &[Utxo]) -> Tx {
    let outs = genesis_utxos
        .iter()
        .map(|utxo| TransferableOutput {
            asset_id: utxo.asset_id,
            out: Output::Transfer(utxo.out.transfer().clone()),
        })
        .collect();
    Tx::new(UnsignedTx::Import(ImportTx {
        base: BaseTx {
            outs,
            ..BaseTx::default()
        },
        source_chain: Id::EMPTY,
        imported_inputs: vec![],
    }))
}
