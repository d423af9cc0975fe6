//! Chain-prefixed bech32 addresses, EVM hex addresses and key derivation.

use std::fmt;
use std::str::FromStr;

use bech32::FromBase32;
use bech32::ToBase32;
use bech32::Variant;
use ripemd::Ripemd160;
use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use sha2::Digest;
use sha2::Sha256;
use sha3::Keccak256;

use super::ids::ShortId;
use super::ids::SHORT_ID_LEN;

pub const ADDRESS_SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("no separator found in address")]
    MissingSeparator,

    #[error("invalid bech32 address: {0}")]
    Bech32(String),

    #[error("expected {expected} address bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid hex address: {0}")]
    Hex(String),

    #[error("invalid public key: {0}")]
    PublicKey(String),
}

/// Chain an address or UTXO source belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum ChainAlias {
    P,
    C,
    X,
    /// Used for "all source chains" queries; renders as the empty string.
    #[strum(serialize = "")]
    Any,
}

impl Serialize for ChainAlias {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

impl<'de> Deserialize<'de> for ChainAlias {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Renders `<alias>-<bech32(hrp, addr)>`.
pub fn format_address(alias: &str, hrp: &str, addr: &ShortId) -> Result<String, AddressError> {
    let encoded = bech32::encode(hrp, addr.as_bytes().to_base32(), Variant::Bech32)
        .map_err(|e| AddressError::Bech32(e.to_string()))?;
    Ok(format!("{alias}{ADDRESS_SEPARATOR}{encoded}"))
}

/// Splits a chain-prefixed address into alias, hrp and raw bytes.
pub fn parse_address(address: &str) -> Result<(String, String, ShortId), AddressError> {
    let (alias, encoded) = address
        .split_once(ADDRESS_SEPARATOR)
        .ok_or(AddressError::MissingSeparator)?;
    let (hrp, data, _variant) =
        bech32::decode(encoded).map_err(|e| AddressError::Bech32(e.to_string()))?;
    let raw = Vec::<u8>::from_base32(&data).map_err(|e| AddressError::Bech32(e.to_string()))?;
    let id = ShortId::from_slice(&raw).map_err(|_| AddressError::Length {
        expected: SHORT_ID_LEN,
        actual: raw.len(),
    })?;
    Ok((alias.to_owned(), hrp, id))
}

/// Raw address bytes of a chain-prefixed address, ignoring alias and hrp.
pub fn parse_to_id(address: &str) -> Result<ShortId, AddressError> {
    parse_address(address).map(|(_, _, id)| id)
}

/// Alias part of a chain-prefixed address.
pub fn chain_alias_of(address: &str) -> Result<String, AddressError> {
    parse_address(address).map(|(alias, _, _)| alias)
}

/// `ripemd160(sha256(compressed public key))`.
pub fn short_id_from_public_key(public_key: &[u8]) -> Result<ShortId, AddressError> {
    let key = secp256k1::PublicKey::from_slice(public_key)
        .map_err(|e| AddressError::PublicKey(e.to_string()))?;
    let sha = Sha256::digest(key.serialize());
    let digest: [u8; SHORT_ID_LEN] = Ripemd160::digest(sha).into();
    Ok(ShortId(digest))
}

/// 20-byte account address on the EVM chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EvmAddress(pub [u8; SHORT_ID_LEN]);

impl EvmAddress {
    /// Last 20 bytes of `keccak256(uncompressed public key without prefix)`.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, AddressError> {
        let key = secp256k1::PublicKey::from_slice(public_key)
            .map_err(|e| AddressError::PublicKey(e.to_string()))?;
        let uncompressed = key.serialize_uncompressed();
        let digest = Keccak256::digest(&uncompressed[1..]);
        let mut out = [0u8; SHORT_ID_LEN];
        out.copy_from_slice(&digest[12..]);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// EIP-55 mixed-case checksum encoding.
impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        f.write_str(&out)
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(body).map_err(|e| AddressError::Hex(e.to_string()))?;
        let bytes: [u8; SHORT_ID_LEN] = raw.as_slice().try_into().map_err(|_| {
            AddressError::Length {
                expected: SHORT_ID_LEN,
                actual: raw.len(),
            }
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for EvmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
