//! Fixed-width identifiers and their CB58 text form.
//!
//! CB58 is base58 over `bytes ‖ sha256(bytes)[28..32]`.

use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use sha2::Digest;
use sha2::Sha256;

pub const ID_LEN: usize = 32;
pub const SHORT_ID_LEN: usize = 20;
pub const CHECKSUM_LEN: usize = 4;
pub const NODE_ID_PREFIX: &str = "NodeID-";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid base58 string: {0}")]
    Base58(String),

    #[error("encoded value is too short to carry a checksum")]
    MissingChecksum,

    #[error("checksum mismatch")]
    Checksum,

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("node id must start with \"{NODE_ID_PREFIX}\"")]
    NodeIdPrefix,

    #[error("invalid hex string: {0}")]
    Hex(String),
}

/// sha256 of the input.
pub fn hash256(bytes: &[u8]) -> [u8; ID_LEN] {
    Sha256::digest(bytes).into()
}

fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = hash256(bytes);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[ID_LEN - CHECKSUM_LEN..]);
    out
}

/// Appends the 4-byte sha256 checksum used by both CB58 and checksummed hex.
pub fn with_checksum(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + CHECKSUM_LEN);
    out.extend_from_slice(bytes);
    out.extend_from_slice(&checksum(bytes));
    out
}

/// Splits off and verifies a trailing checksum.
pub fn strip_checksum(bytes: &[u8]) -> Result<&[u8], IdError> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(IdError::MissingChecksum);
    }
    let (payload, sum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if checksum(payload) != sum {
        return Err(IdError::Checksum);
    }
    Ok(payload)
}

pub fn cb58_encode(bytes: &[u8]) -> String {
    bs58::encode(with_checksum(bytes)).into_string()
}

pub fn cb58_decode(s: &str) -> Result<Vec<u8>, IdError> {
    let raw = bs58::decode(s)
        .into_vec()
        .map_err(|e| IdError::Base58(e.to_string()))?;
    strip_checksum(&raw).map(<[u8]>::to_vec)
}

/// `0x`-prefixed hex of `bytes ‖ checksum`, the node's `hex` encoding.
pub fn encode_hex_with_checksum(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(with_checksum(bytes)))
}

/// Inverse of [`encode_hex_with_checksum`]. Input whose trailing four bytes
/// are not a valid checksum is taken to be plain hex.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, IdError> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    let raw = hex::decode(body).map_err(|e| IdError::Hex(e.to_string()))?;
    match strip_checksum(&raw) {
        Ok(payload) => Ok(payload.to_vec()),
        Err(_) => Ok(raw),
    }
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], IdError> {
    bytes.try_into().map_err(|_| IdError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

macro_rules! cb58_identifier {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const EMPTY: Self = Self([0u8; $len]);

            pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
                to_array(bytes).map(Self)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                *self == Self::EMPTY
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", cb58_encode(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&cb58_decode(s)?)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

cb58_identifier!(
    /// 32-byte identifier of transactions, blocks, chains and assets.
    Id,
    ID_LEN
);

cb58_identifier!(
    /// 20-byte address hash, `ripemd160(sha256(compressed public key))`.
    ShortId,
    SHORT_ID_LEN
);

impl Id {
    /// Id of a byte string: its sha256.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hash256(bytes))
    }

    /// Derives the id of the `index`th element of a container, as done for
    /// reward UTXOs and genesis allocations.
    pub fn prefixed(&self, index: u64) -> Self {
        let mut buf = Vec::with_capacity(8 + ID_LEN);
        buf.extend_from_slice(&index.to_be_bytes());
        buf.extend_from_slice(&self.0);
        Self::of(&buf)
    }
}

/// Identifier of a validator node, rendered as `NodeID-<cb58>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub ShortId);

impl NodeId {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        ShortId::from_slice(bytes).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NODE_ID_PREFIX, self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix(NODE_ID_PREFIX).ok_or(IdError::NodeIdPrefix)?;
        body.parse().map(Self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
