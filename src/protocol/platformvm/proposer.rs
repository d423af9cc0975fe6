//! Proposer-VM wrapper around P-chain blocks.

use crate::protocol::codec::CodecError;
use crate::protocol::codec::Unpacker;
use crate::protocol::codec::CODEC_VERSION;
use crate::protocol::ids::Id;

pub const STATELESS_BLOCK_TYPE_ID: u32 = 0;
pub const OPTION_BLOCK_TYPE_ID: u32 = 1;

/// Outer block as produced by the proposer VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposerBlock {
    pub parent_id: Id,
    /// Unix seconds; zero for option blocks.
    pub timestamp: i64,
    pub p_chain_height: u64,
    pub inner: Vec<u8>,
}

impl ProposerBlock {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut u = Unpacker::new(bytes);
        let version = u.get_u16()?;
        if version != CODEC_VERSION {
            return Err(CodecError::UnknownVersion(version));
        }
        let block = match u.get_u32()? {
            STATELESS_BLOCK_TYPE_ID => {
                let parent_id = u.get()?;
                let timestamp = u.get_i64()?;
                let p_chain_height = u.get_u64()?;
                let _certificate = u.get_bytes()?;
                let inner = u.get_bytes()?;
                let _signature = u.get_bytes()?;
                Self {
                    parent_id,
                    timestamp,
                    p_chain_height,
                    inner,
                }
            }
            OPTION_BLOCK_TYPE_ID => Self {
                parent_id: u.get()?,
                timestamp: 0,
                p_chain_height: 0,
                inner: u.get_bytes()?,
            },
            type_id => {
                return Err(CodecError::UnknownTypeId {
                    type_id,
                    context: "proposer block",
                })
            }
        };
        u.finish()?;
        Ok(block)
    }
}

/// Inner block bytes and the proposer timestamp, if `bytes` is wrapped.
/// Unwrapped (pre-proposer) blocks come back unchanged with no timestamp.
pub fn unwrap_block(bytes: &[u8]) -> (Vec<u8>, Option<i64>) {
    match ProposerBlock::parse(bytes) {
        Ok(block) if block.timestamp != 0 => (block.inner, Some(block.timestamp)),
        Ok(block) => (block.inner, None),
        Err(_) => (bytes.to_vec(), None),
    }
}
