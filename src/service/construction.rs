//! Construction steps shared by the P-chain and atomic C-chain backends.

use std::collections::HashMap;

use crate::protocol::address::format_address;
use crate::protocol::address::short_id_from_public_key;
use crate::protocol::address::ChainAlias;
use crate::protocol::avax::Credential;
use crate::protocol::avax::SIGNATURE_LEN;
use crate::protocol::ids::hash256;
use crate::rosetta::types::AccountIdentifier;
use crate::rosetta::types::ConstructionCombineRequest;
use crate::rosetta::types::ConstructionCombineResponse;
use crate::rosetta::types::ConstructionDeriveResponse;
use crate::rosetta::types::CurveType;
use crate::rosetta::types::Operation;
use crate::rosetta::types::PublicKey;
use crate::rosetta::types::Signature;
use crate::rosetta::types::SignatureType;
use crate::rosetta::types::SigningPayload;
use crate::rosetta::types::TransactionIdentifierResponse;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::rosetta::RosettaResult;
use crate::service::wire::AvaxTx;
use crate::service::wire::RosettaTx;
use crate::service::wire::Signer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("insufficient signatures")]
    InsufficientSignatures,

    #[error("invalid signature length")]
    InvalidSignatureLength,

    #[error("input signature length doesn't match credentials needed")]
    CountMismatch,

    #[error("not all operations have signers")]
    MissingSigners,
}

impl From<CredentialError> for RosettaError {
    fn from(err: CredentialError) -> Self {
        RosettaError::wrap(ErrorKind::InvalidInput, err)
    }
}

/// `<alias>-<hrp>1…` address of a compressed secp256k1 key.
pub fn derive_bech32(alias: ChainAlias, hrp: &str, public_key: &PublicKey) -> RosettaResult<ConstructionDeriveResponse> {
    if public_key.curve_type != CurveType::Secp256k1 {
        return Err(RosettaError::wrap(ErrorKind::InvalidInput, "unsupported curve type"));
    }
    let short_id = short_id_from_public_key(&public_key.hex_bytes)
        .map_err(|e| RosettaError::wrap(ErrorKind::InvalidInput, e))?;
    let address = format_address(alias.as_ref(), hrp, &short_id)
        .map_err(|e| RosettaError::wrap(ErrorKind::InternalError, e))?;
    Ok(ConstructionDeriveResponse {
        address: None,
        account_identifier: AccountIdentifier::new(address),
        metadata: None,
    })
}

fn is_debit(op: &Operation) -> bool {
    op.amount
        .as_ref()
        .is_some_and(|amount| amount.value.starts_with('-'))
}

/// The signer of every spending operation, with the coin it spends.
pub fn operation_signers(operations: &[Operation]) -> Vec<Signer> {
    operations
        .iter()
        .filter(|op| is_debit(op))
        .filter_map(|op| {
            let account = op.account.clone()?;
            Some(Signer {
                coin_identifier: op
                    .coin_change
                    .as_ref()
                    .map(|change| change.coin_identifier.identifier.clone())
                    .unwrap_or_default(),
                account_identifier: account,
            })
        })
        .collect()
}

/// Accounts behind spent coins, keyed by coin identifier.
pub fn input_accounts(signers: &[Signer]) -> HashMap<String, AccountIdentifier> {
    signers
        .iter()
        .filter(|signer| !signer.coin_identifier.is_empty())
        .map(|signer| (signer.coin_identifier.clone(), signer.account_identifier.clone()))
        .collect()
}

/// Signer of each spending operation of a parsed transaction. Coin spends
/// are matched by coin; coinless spends take the coinless signers in order.
pub fn parse_signers(operations: &[Operation], signers: &[Signer]) -> Result<Vec<AccountIdentifier>, CredentialError> {
    let by_coin = input_accounts(signers);
    let mut coinless = signers
        .iter()
        .filter(|signer| signer.coin_identifier.is_empty())
        .map(|signer| &signer.account_identifier);

    let mut accounts = vec![];
    for op in operations.iter().filter(|op| is_debit(op)) {
        let account = match &op.coin_change {
            Some(change) => by_coin.get(&change.coin_identifier.identifier),
            None => coinless.next(),
        };
        accounts.push(account.cloned().ok_or(CredentialError::MissingSigners)?);
    }
    Ok(accounts)
}

/// One payload per expected signer, all over the same unsigned bytes.
pub fn signing_payloads(tx: &impl AvaxTx, signers: &[AccountIdentifier]) -> Vec<SigningPayload> {
    let hash = hash256(&tx.unsigned_bytes()).to_vec();
    signers
        .iter()
        .map(|signer| SigningPayload {
            address: None,
            account_identifier: Some(signer.clone()),
            hex_bytes: hash.clone(),
            signature_type: Some(SignatureType::EcdsaRecovery),
        })
        .collect()
}

/// Spreads `signatures`, in payload order, over the inputs needing
/// `counts[i]` signatures each.
pub fn build_credentials(counts: &[usize], signatures: &[Signature]) -> Result<Vec<Credential>, CredentialError> {
    let mut remaining = signatures.iter();
    let mut creds = Vec::with_capacity(counts.len());
    for &count in counts {
        let mut cred = Credential {
            sigs: Vec::with_capacity(count),
        };
        for _ in 0..count {
            let signature = remaining.next().ok_or(CredentialError::InsufficientSignatures)?;
            let sig: [u8; SIGNATURE_LEN] = signature
                .hex_bytes
                .as_slice()
                .try_into()
                .map_err(|_| CredentialError::InvalidSignatureLength)?;
            cred.sigs.push(sig);
        }
        creds.push(cred);
    }
    if remaining.next().is_some() {
        return Err(CredentialError::CountMismatch);
    }
    Ok(creds)
}

pub fn combine<T: AvaxTx>(req: &ConstructionCombineRequest) -> RosettaResult<ConstructionCombineResponse> {
    let mut wire = RosettaTx::<T>::decode(&req.unsigned_transaction)?;
    let creds = build_credentials(&wire.tx.input_signature_counts(), &req.signatures)?;
    wire.tx.attach_credentials(creds);
    Ok(ConstructionCombineResponse {
        signed_transaction: wire.encode()?,
    })
}

pub fn hash<T: AvaxTx>(signed_transaction: &str) -> RosettaResult<TransactionIdentifierResponse> {
    let wire = RosettaTx::<T>::decode(signed_transaction)?;
    Ok(TransactionIdentifierResponse::new(wire.tx.tx_id().to_string()))
}
