//! `/account/balance` and `/account/coins` on the P-chain.
//!
//! The node has no snapshot reads, so every UTXO listing is fenced by the
//! chain height: read before, read after, and refuse the answer if a block
//! landed in between.

use std::collections::HashSet;

use itertools::Itertools;
use serde_json::json;
use tracing::instrument;

use super::PChainBackend;
use crate::client::UtxoCursor;
use crate::mapper::atomic_avax_currency;
use crate::mapper::pchain::balance::decode_utxos;
use crate::mapper::pchain::balance::staked_amount;
use crate::mapper::pchain::balance::AccountBalance;
use crate::mapper::pchain::balance::PendingRewards;
use crate::mapper::pchain::balance::SubAccount;
use crate::mapper::pchain::META_DELEGATION_FEE_REWARDS;
use crate::mapper::pchain::META_DELEGATION_REWARDS;
use crate::mapper::pchain::META_VALIDATOR_REWARDS;
use crate::mapper::to_metadata;
use crate::mapper::AVAX_SYMBOL;
use crate::protocol::address::parse_address;
use crate::protocol::address::ChainAlias;
use crate::protocol::ids::Id;
use crate::protocol::ids::NodeId;
use crate::protocol::ids::ShortId;
use crate::protocol::ids::NODE_ID_PREFIX;
use crate::rosetta::types::AccountBalanceRequest;
use crate::rosetta::types::AccountBalanceResponse;
use crate::rosetta::types::AccountCoinsRequest;
use crate::rosetta::types::AccountCoinsResponse;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Amount;
use crate::rosetta::types::Coin;
use crate::rosetta::types::CoinIdentifier;
use crate::rosetta::types::Currency;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;
use crate::service::unix_now;

/// Chains whose shared memory with the P-chain holds importable UTXOs.
const SHARED_MEMORY_SOURCES: [ChainAlias; 2] = [ChainAlias::C, ChainAlias::X];

fn invalid(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InvalidInput, err)
}

fn internal(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InternalError, err)
}

/// What an account identifier asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AccountQuery {
    Buckets(Option<SubAccount>),
    PendingRewards(NodeId),
}

/// UTXOs and stake outputs read at one height.
#[derive(Debug, Default)]
struct Snapshot {
    height: u64,
    utxos: Vec<Vec<u8>>,
    stake_outputs: Vec<Vec<u8>>,
}

impl PChainBackend {
    /// Raw address of a `P-<hrp>1…` account.
    fn p_address(&self, account: &AccountIdentifier) -> RosettaResult<ShortId> {
        let (alias, hrp, addr) = parse_address(&account.address).map_err(invalid)?;
        if alias != ChainAlias::P.as_ref() || hrp != self.config.hrp() {
            return Err(invalid(format!("invalid P-chain address {}", account.address)));
        }
        Ok(addr)
    }

    fn account_query(account: &AccountIdentifier) -> RosettaResult<AccountQuery> {
        let Some(sub_account) = &account.sub_account else {
            return Ok(AccountQuery::Buckets(None));
        };
        if sub_account.address.starts_with(NODE_ID_PREFIX) {
            let node_id = sub_account.address.parse().map_err(invalid)?;
            return Ok(AccountQuery::PendingRewards(node_id));
        }
        sub_account
            .address
            .parse()
            .map(|sub| AccountQuery::Buckets(Some(sub)))
            .map_err(|_| invalid(format!("unknown account type {}", sub_account.address)))
    }

    /// Asset ids behind the requested currencies; AVAX when none are named.
    async fn requested_assets(&self, currencies: Option<&[Currency]>) -> RosettaResult<Vec<(Id, Currency)>> {
        let avax = atomic_avax_currency();
        let Some(currencies) = currencies.filter(|c| !c.is_empty()) else {
            return Ok(vec![(self.config.avax_asset_id, avax)]);
        };

        let mut assets = Vec::with_capacity(currencies.len());
        for currency in currencies {
            let (asset_id, decimals) = if currency.symbol == AVAX_SYMBOL {
                (self.config.avax_asset_id, avax.decimals)
            } else {
                let description = self.client.get_asset_description(&currency.symbol).await?;
                (description.asset_id, i32::from(description.denomination))
            };
            if currency.decimals != decimals {
                return Err(invalid("incorrect currency decimals"));
            }
            assets.push((asset_id, currency.clone()));
        }
        Ok(assets)
    }

    /// Every UTXO page of `address` from `source_chain`.
    async fn all_utxos(&self, address: &str, source_chain: ChainAlias) -> RosettaResult<Vec<Vec<u8>>> {
        let limit = self.config.utxos_page_size;
        let addrs = [address.to_owned()];
        let mut utxos = vec![];
        let mut cursor: Option<UtxoCursor> = None;
        loop {
            let page = self
                .client
                .get_atomic_utxos(&addrs, source_chain.as_ref(), limit, cursor.as_ref())
                .await?;
            let fetched = page.utxos.len();
            utxos.extend(page.utxos);
            if fetched < limit as usize {
                return Ok(utxos);
            }
            cursor = Some(page.end_index);
        }
    }

    /// UTXOs (and stake when asked) of `address`, consistent with one height.
    #[instrument(level = "debug", skip(self))]
    async fn fenced_snapshot(&self, address: &str, shared_memory: bool, with_stake: bool) -> RosettaResult<Snapshot> {
        let height = self.client.get_height().await?;

        let mut snapshot = Snapshot {
            height,
            ..Snapshot::default()
        };
        if shared_memory {
            for source in SHARED_MEMORY_SOURCES {
                snapshot.utxos.extend(self.all_utxos(address, source).await?);
            }
        } else {
            snapshot.utxos = self.all_utxos(address, ChainAlias::P).await?;
            if with_stake {
                snapshot.stake_outputs = self.client.get_stake(&[address.to_owned()]).await?.outputs;
            }
        }

        if self.client.get_height().await? != height {
            return Err(internal("new block added while fetching utxos"));
        }
        Ok(snapshot)
    }

    pub(super) async fn balance(&self, req: &AccountBalanceRequest) -> RosettaResult<AccountBalanceResponse> {
        if req.block_identifier.is_some() {
            return Err(RosettaError::wrap(
                ErrorKind::NotSupported,
                "historical balance lookups are not supported",
            ));
        }
        let account = &req.account_identifier;
        let addr = self.p_address(account)?;
        let sub_account = match Self::account_query(account)? {
            AccountQuery::PendingRewards(node_id) => return self.pending_rewards(&addr, node_id).await,
            AccountQuery::Buckets(sub_account) => sub_account,
        };
        let assets = self.requested_assets(req.currencies.as_deref()).await?;

        let shared_memory = sub_account == Some(SubAccount::SharedMemory);
        let snapshot = self.fenced_snapshot(&account.address, shared_memory, true).await?;
        let staked = staked_amount(&snapshot.stake_outputs).map_err(internal)?;
        let now = unix_now();

        let mut balances = Vec::with_capacity(assets.len());
        for (asset_id, currency) in assets {
            let utxos = decode_utxos(&snapshot.utxos, &HashSet::from([asset_id])).map_err(internal)?;
            let mut balance = AccountBalance::classify(&utxos, now).map_err(internal)?;
            if asset_id == self.config.avax_asset_id {
                balance = balance.with_staked(staked).map_err(internal)?;
            }
            balances.push(Amount::new(balance.value(sub_account), &currency));
        }

        Ok(AccountBalanceResponse {
            block_identifier: self.block_identifier_at(snapshot.height).await?,
            balances,
            metadata: None,
        })
    }

    async fn pending_rewards(&self, addr: &ShortId, node_id: NodeId) -> RosettaResult<AccountBalanceResponse> {
        let height = self.client.get_height().await?;
        let validators = self.client.get_current_validators(&[node_id]).await?;
        let rewards = PendingRewards::of(addr, &validators);

        let metadata = to_metadata(&json!({
            META_VALIDATOR_REWARDS: rewards.validator.to_string(),
            META_DELEGATION_REWARDS: rewards.delegation.to_string(),
            META_DELEGATION_FEE_REWARDS: rewards.delegation_fee.to_string(),
        }))
        .map_err(internal)?;
        Ok(AccountBalanceResponse {
            block_identifier: self.block_identifier_at(height).await?,
            balances: vec![Amount::new(rewards.total(), &atomic_avax_currency())],
            metadata: Some(metadata),
        })
    }

    pub(super) async fn coins(&self, req: &AccountCoinsRequest) -> RosettaResult<AccountCoinsResponse> {
        let account = &req.account_identifier;
        self.p_address(account)?;
        let shared_memory = match Self::account_query(account)? {
            AccountQuery::Buckets(sub_account) => sub_account == Some(SubAccount::SharedMemory),
            AccountQuery::PendingRewards(_) => return Err(invalid("pending rewards hold no coins")),
        };
        let assets = self.requested_assets(req.currencies.as_deref()).await?;
        let snapshot = self.fenced_snapshot(&account.address, shared_memory, false).await?;

        let asset_ids: HashSet<Id> = assets.iter().map(|(id, _)| *id).collect();
        let coins: Vec<Coin> = decode_utxos(&snapshot.utxos, &asset_ids)
            .map_err(internal)?
            .into_iter()
            .filter_map(|utxo| {
                let (_, currency) = assets.iter().find(|(id, _)| *id == utxo.asset_id)?;
                Some(Coin {
                    coin_identifier: CoinIdentifier {
                        identifier: utxo.utxo_id.to_string(),
                    },
                    amount: Amount::new(utxo.out.amount(), currency),
                })
            })
            .sorted_by(|a, b| a.coin_identifier.identifier.cmp(&b.coin_identifier.identifier))
            .collect();

        Ok(AccountCoinsResponse {
            block_identifier: self.block_identifier_at(snapshot.height).await?,
            coins,
            metadata: None,
        })
    }
}
