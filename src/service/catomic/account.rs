//! Shared-memory UTXOs of `C-<hrp>1…` accounts, fenced by the EVM head.

use std::collections::HashSet;

use serde_json::json;
use tracing::instrument;

use super::CAtomicBackend;
use crate::client::UtxoCursor;
use crate::mapper::atomic_avax_currency;
use crate::mapper::pchain::balance::decode_utxos;
use crate::mapper::to_metadata;
use crate::mapper::META_SOURCE_CHAIN;
use crate::protocol::address::parse_address;
use crate::protocol::address::ChainAlias;
use crate::protocol::avax::Utxo;
use crate::rosetta::types::AccountBalanceRequest;
use crate::rosetta::types::AccountBalanceResponse;
use crate::rosetta::types::AccountCoinsRequest;
use crate::rosetta::types::AccountCoinsResponse;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::Amount;
use crate::rosetta::types::BlockIdentifier;
use crate::rosetta::types::Coin;
use crate::rosetta::types::CoinIdentifier;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;

/// Chains that export into the C-chain's shared memory.
const SOURCE_CHAINS: [ChainAlias; 2] = [ChainAlias::P, ChainAlias::X];

fn invalid(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InvalidInput, err)
}

fn internal(err: impl std::fmt::Display) -> RosettaError {
    RosettaError::wrap(ErrorKind::InternalError, err)
}

/// AVAX UTXOs importable from one source chain.
struct SourceUtxos {
    source: ChainAlias,
    utxos: Vec<Utxo>,
}

impl CAtomicBackend {
    fn check_account(&self, account: &AccountIdentifier) -> RosettaResult<()> {
        let (alias, hrp, _) = parse_address(&account.address).map_err(invalid)?;
        if alias != ChainAlias::C.as_ref() || hrp != self.config.hrp() {
            return Err(invalid(format!("invalid C-chain address {}", account.address)));
        }
        Ok(())
    }

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

    /// Shared-memory UTXOs of `address`, consistent with one EVM head.
    #[instrument(level = "debug", skip(self))]
    async fn fenced_utxos(&self, address: &str) -> RosettaResult<(BlockIdentifier, Vec<SourceUtxos>)> {
        let head = self.client.header_by_number(None).await?;

        let assets = HashSet::from([self.config.avax_asset_id]);
        let mut sources = Vec::with_capacity(SOURCE_CHAINS.len());
        for source in SOURCE_CHAINS {
            let raw = self.all_utxos(address, source).await?;
            let utxos = decode_utxos(&raw, &assets).map_err(internal)?;
            sources.push(SourceUtxos { source, utxos });
        }

        if self.client.header_by_number(None).await?.number != head.number {
            return Err(internal("new block received while fetching coins"));
        }
        let block = BlockIdentifier {
            index: head.number as i64,
            hash: head.hash,
        };
        Ok((block, sources))
    }

    pub(super) async fn balance(&self, req: &AccountBalanceRequest) -> RosettaResult<AccountBalanceResponse> {
        if req.block_identifier.is_some() {
            return Err(RosettaError::wrap(
                ErrorKind::NotSupported,
                "historical balance lookups are not supported",
            ));
        }
        self.check_account(&req.account_identifier)?;
        let (block_identifier, sources) = self.fenced_utxos(&req.account_identifier.address).await?;

        let total = sources
            .iter()
            .flat_map(|source| &source.utxos)
            .try_fold(0u64, |sum, utxo| sum.checked_add(utxo.out.amount()))
            .ok_or_else(|| internal("overflow while calculating balance"))?;

        Ok(AccountBalanceResponse {
            block_identifier,
            balances: vec![Amount::new(total, &atomic_avax_currency())],
            metadata: None,
        })
    }

    pub(super) async fn coins(&self, req: &AccountCoinsRequest) -> RosettaResult<AccountCoinsResponse> {
        self.check_account(&req.account_identifier)?;
        let (block_identifier, sources) = self.fenced_utxos(&req.account_identifier.address).await?;

        let currency = atomic_avax_currency();
        let mut seen = HashSet::new();
        let mut coins = vec![];
        for SourceUtxos { source, utxos } in sources {
            let metadata = to_metadata(&json!({ META_SOURCE_CHAIN: source.to_string() })).map_err(internal)?;
            for utxo in utxos {
                if !seen.insert(utxo.utxo_id) {
                    continue;
                }
                let mut amount = Amount::new(utxo.out.amount(), &currency);
                amount.metadata = Some(metadata.clone());
                coins.push(Coin {
                    coin_identifier: CoinIdentifier {
                        identifier: utxo.utxo_id.to_string(),
                    },
                    amount,
                });
            }
        }
        coins.sort_by(|a, b| a.coin_identifier.identifier.cmp(&b.coin_identifier.identifier));

        Ok(AccountCoinsResponse {
            block_identifier,
            coins,
            metadata: None,
        })
    }
}
