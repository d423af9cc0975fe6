//! P-chain balance buckets.
//!
//! The node reports UTXOs and stake outputs through separate calls; this
//! module turns the raw answers into one [`AccountBalance`] under a fixed
//! `now`. Fetching and the height fence around it live in the service.

use std::collections::HashSet;

use crate::client::CurrentValidator;
use crate::protocol::avax::Output;
use crate::protocol::avax::TransferableOutput;
use crate::protocol::avax::Utxo;
use crate::protocol::codec::CodecError;
use crate::protocol::codec::CodecManager;
use crate::protocol::ids::Id;
use crate::protocol::ids::ShortId;

/// Sub-account selecting one bucket of a P-chain balance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum SubAccount {
    SharedMemory,
    Unlocked,
    LockedStakeable,
    LockedNotStakeable,
    Staked,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    #[error("overflow while calculating unlocked balance")]
    UnlockedOverflow,

    #[error("overflow while calculating locked not stakeable balance")]
    LockedNotStakeableOverflow,

    #[error("overflow while calculating unlocked stakeable balance")]
    LockedStakeableOverflow,

    #[error("overflow while calculating locked balance")]
    LockedOverflow,

    #[error("overflow while calculating total balance")]
    TotalOverflow,

    #[error("overflow while calculating staked balance")]
    StakedOverflow,

    #[error("unable to parse UTXO: {0}")]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountBalance {
    pub total: u64,
    pub staked: u64,
    pub unlocked: u64,
    pub locked_stakeable: u64,
    pub locked_not_stakeable: u64,
}

impl AccountBalance {
    /// Groups `utxos` into buckets as of `now` (unix seconds).
    ///
    /// A plain transfer is unlocked once its locktime passed. A stakeable
    /// lock whose inner output is still locked can be neither spent nor
    /// staked; otherwise it is unlocked once the outer lock passed and
    /// stakeable until then.
    pub fn classify(utxos: &[Utxo], now: u64) -> Result<Self, BalanceError> {
        let mut balance = Self::default();
        for utxo in utxos {
            let amount = utxo.out.amount();
            match &utxo.out {
                Output::Transfer(out) if out.owners.locktime <= now => {
                    balance.unlocked = add(balance.unlocked, amount, BalanceError::UnlockedOverflow)?;
                }
                Output::Transfer(_) => {
                    balance.locked_not_stakeable = add(
                        balance.locked_not_stakeable,
                        amount,
                        BalanceError::LockedNotStakeableOverflow,
                    )?;
                }
                Output::StakeableLock(lock) if lock.inner.owners.locktime > now => {
                    balance.locked_not_stakeable = add(
                        balance.locked_not_stakeable,
                        amount,
                        BalanceError::LockedNotStakeableOverflow,
                    )?;
                }
                Output::StakeableLock(lock) if lock.locktime <= now => {
                    balance.unlocked = add(balance.unlocked, amount, BalanceError::UnlockedOverflow)?;
                }
                Output::StakeableLock(_) => {
                    balance.locked_stakeable = add(
                        balance.locked_stakeable,
                        amount,
                        BalanceError::LockedStakeableOverflow,
                    )?;
                }
            }
        }

        let locked = add(
            balance.locked_stakeable,
            balance.locked_not_stakeable,
            BalanceError::LockedOverflow,
        )?;
        balance.total = add(balance.unlocked, locked, BalanceError::TotalOverflow)?;
        Ok(balance)
    }

    /// Adds staked value to the staked bucket and the total.
    pub fn with_staked(mut self, staked: u64) -> Result<Self, BalanceError> {
        self.staked = add(self.staked, staked, BalanceError::StakedOverflow)?;
        self.total = add(self.total, staked, BalanceError::TotalOverflow)?;
        Ok(self)
    }

    /// Value reported for a sub-account; no sub-account and shared memory
    /// both report the total.
    pub fn value(&self, sub_account: Option<SubAccount>) -> u64 {
        match sub_account {
            None | Some(SubAccount::SharedMemory) => self.total,
            Some(SubAccount::Unlocked) => self.unlocked,
            Some(SubAccount::LockedStakeable) => self.locked_stakeable,
            Some(SubAccount::LockedNotStakeable) => self.locked_not_stakeable,
            Some(SubAccount::Staked) => self.staked,
        }
    }
}

fn add(a: u64, b: u64, overflow: BalanceError) -> Result<u64, BalanceError> {
    a.checked_add(b).ok_or(overflow)
}

/// Decodes UTXOs, keeping the first occurrence of each id. Pages may overlap,
/// so duplicates are expected. Multisig outputs are dropped, as are assets
/// outside `asset_ids` unless it is empty.
pub fn decode_utxos(raw: &[Vec<u8>], asset_ids: &HashSet<Id>) -> Result<Vec<Utxo>, CodecError> {
    let codec = CodecManager::default();
    let mut seen = HashSet::new();
    let mut utxos = Vec::new();
    for bytes in raw {
        let (utxo, _) = codec.unmarshal::<Utxo>(bytes)?;
        if !asset_ids.is_empty() && !asset_ids.contains(&utxo.asset_id) {
            continue;
        }
        if !seen.insert(utxo.utxo_id) {
            continue;
        }
        if utxo.out.is_multisig() {
            continue;
        }
        utxos.push(utxo);
    }
    Ok(utxos)
}

/// Sum of the single-owner stake outputs returned by `getStake`.
pub fn staked_amount(stake_outputs: &[Vec<u8>]) -> Result<u64, BalanceError> {
    let codec = CodecManager::default();
    let mut staked = 0u64;
    for bytes in stake_outputs {
        let (out, _) = codec.unmarshal::<TransferableOutput>(bytes)?;
        if out.out.is_multisig() {
            continue;
        }
        staked = add(staked, out.amount(), BalanceError::StakedOverflow)?;
    }
    Ok(staked)
}

/// Rewards an address stands to receive from the given validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingRewards {
    pub validator: u128,
    pub delegation: u128,
    pub delegation_fee: u128,
}

impl PendingRewards {
    /// Delegation fees are a percentage; as a share of a million they match
    /// the `shares` field of staking transactions.
    pub fn of(addr: &ShortId, validators: &[CurrentValidator]) -> Self {
        let mut rewards = Self::default();
        for validator in validators {
            let owns_validation = validator.validation_reward_owner.contains(addr);
            if owns_validation {
                rewards.validator += u128::from(validator.potential_reward);
            }

            let fee_shares = (validator.delegation_fee * 10_000.0) as u128;
            for delegator in &validator.delegators {
                let reward = u128::from(delegator.potential_reward);
                let fee = reward * fee_shares / 1_000_000;
                if owns_validation {
                    rewards.delegation_fee += fee;
                }
                if delegator.reward_owner.contains(addr) {
                    rewards.delegation += reward.saturating_sub(fee);
                }
            }
        }
        rewards
    }

    pub fn total(&self) -> u128 {
        self.validator + self.delegation + self.delegation_fee
    }
}
