//! P-chain block formats, pre-Banff (Apricot) and Banff.

use super::txs::Tx;
use crate::protocol::codec::CodecError;
use crate::protocol::codec::CodecManager;
use crate::protocol::codec::Pack;
use crate::protocol::codec::Packer;
use crate::protocol::codec::Unpack;
use crate::protocol::codec::Unpacker;
use crate::protocol::ids::Id;

pub const APRICOT_PROPOSAL_BLOCK_TYPE_ID: u32 = 0;
pub const APRICOT_ABORT_BLOCK_TYPE_ID: u32 = 1;
pub const APRICOT_COMMIT_BLOCK_TYPE_ID: u32 = 2;
pub const APRICOT_STANDARD_BLOCK_TYPE_ID: u32 = 3;
pub const APRICOT_ATOMIC_BLOCK_TYPE_ID: u32 = 4;
pub const BANFF_PROPOSAL_BLOCK_TYPE_ID: u32 = 29;
pub const BANFF_ABORT_BLOCK_TYPE_ID: u32 = 30;
pub const BANFF_COMMIT_BLOCK_TYPE_ID: u32 = 31;
pub const BANFF_STANDARD_BLOCK_TYPE_ID: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BlockKind {
    Proposal,
    Abort,
    Commit,
    Standard,
    Atomic,
}

/// Decoded P-chain block.
///
/// Banff blocks carry their own timestamp; Apricot blocks do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub parent_id: Id,
    pub height: u64,
    pub time: Option<u64>,
    pub txs: Vec<Tx>,
}

impl Block {
    fn type_id(&self) -> u32 {
        match (self.kind, self.time.is_some()) {
            (BlockKind::Proposal, false) => APRICOT_PROPOSAL_BLOCK_TYPE_ID,
            (BlockKind::Abort, false) => APRICOT_ABORT_BLOCK_TYPE_ID,
            (BlockKind::Commit, false) => APRICOT_COMMIT_BLOCK_TYPE_ID,
            (BlockKind::Standard, false) => APRICOT_STANDARD_BLOCK_TYPE_ID,
            (BlockKind::Atomic, _) => APRICOT_ATOMIC_BLOCK_TYPE_ID,
            (BlockKind::Proposal, true) => BANFF_PROPOSAL_BLOCK_TYPE_ID,
            (BlockKind::Abort, true) => BANFF_ABORT_BLOCK_TYPE_ID,
            (BlockKind::Commit, true) => BANFF_COMMIT_BLOCK_TYPE_ID,
            (BlockKind::Standard, true) => BANFF_STANDARD_BLOCK_TYPE_ID,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        CodecManager::default()
            .unmarshal::<Self>(bytes)
            .map(|(block, _)| block)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut p = Packer::new();
        p.put_u16(crate::protocol::codec::CODEC_VERSION);
        p.put(self);
        p.into_bytes()
    }
}

impl Pack for Block {
    fn pack(&self, p: &mut Packer) {
        p.put_u32(self.type_id());
        if let Some(time) = self.time {
            p.put_u64(time);
        }
        let common = |p: &mut Packer| {
            p.put(&self.parent_id);
            p.put_u64(self.height);
        };
        match self.kind {
            BlockKind::Proposal => {
                // Banff proposal blocks list decision txs ahead of the proposal tx
                let (decisions, proposal) = self.txs.split_at(self.txs.len().saturating_sub(1));
                if self.time.is_some() {
                    p.put_slice(decisions);
                }
                common(p);
                if let Some(tx) = proposal.first() {
                    p.put(tx);
                }
            }
            BlockKind::Atomic => {
                common(p);
                if let Some(tx) = self.txs.first() {
                    p.put(tx);
                }
            }
            BlockKind::Standard => {
                common(p);
                p.put_slice(&self.txs);
            }
            BlockKind::Abort | BlockKind::Commit => common(p),
        }
    }
}

impl Unpack for Block {
    fn unpack(u: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        let type_id = u.get_u32()?;
        let (kind, banff) = match type_id {
            APRICOT_PROPOSAL_BLOCK_TYPE_ID => (BlockKind::Proposal, false),
            APRICOT_ABORT_BLOCK_TYPE_ID => (BlockKind::Abort, false),
            APRICOT_COMMIT_BLOCK_TYPE_ID => (BlockKind::Commit, false),
            APRICOT_STANDARD_BLOCK_TYPE_ID => (BlockKind::Standard, false),
            APRICOT_ATOMIC_BLOCK_TYPE_ID => (BlockKind::Atomic, false),
            BANFF_PROPOSAL_BLOCK_TYPE_ID => (BlockKind::Proposal, true),
            BANFF_ABORT_BLOCK_TYPE_ID => (BlockKind::Abort, true),
            BANFF_COMMIT_BLOCK_TYPE_ID => (BlockKind::Commit, true),
            BANFF_STANDARD_BLOCK_TYPE_ID => (BlockKind::Standard, true),
            type_id => {
                return Err(CodecError::UnknownTypeId {
                    type_id,
                    context: "platform block",
                })
            }
        };
        let time = if banff { Some(u.get_u64()?) } else { None };

        let mut txs: Vec<Tx> = vec![];
        if kind == BlockKind::Proposal && banff {
            txs = u.get_vec()?;
        }
        let parent_id = u.get()?;
        let height = u.get_u64()?;
        match kind {
            BlockKind::Proposal | BlockKind::Atomic => txs.push(u.get()?),
            BlockKind::Standard => txs = u.get_vec()?,
            BlockKind::Abort | BlockKind::Commit => {}
        }

        Ok(Self {
            kind,
            parent_id,
            height,
            time,
            txs,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::protocol::platformvm::txs::AdvanceTimeTx;
    use crate::protocol::platformvm::txs::UnsignedTx;

    fn advance(time: u64) -> Tx {
        Tx::new(UnsignedTx::AdvanceTime(AdvanceTimeTx { time }))
    }

    #[test]
    fn banff_proposal_keeps_tx_order() {
        let block = Block {
            kind: BlockKind::Proposal,
            parent_id: Id([1; 32]),
            height: 10,
            time: Some(1_700_000_000),
            txs: vec![advance(1), advance(2)],
        };
        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert!(decoded == block);
    }

    #[test]
    fn apricot_standard_block_has_no_time() {
        let block = Block {
            kind: BlockKind::Standard,
            parent_id: Id([2; 32]),
            height: 3,
            time: None,
            txs: vec![advance(5)],
        };
        let bytes = block.to_bytes();
        assert!(bytes[..6] == [0, 0, 0, 0, 0, 3]);
        let decoded = Block::from_bytes(&bytes).unwrap();
        assert!(decoded.time.is_none());
        assert!(decoded.txs.len() == 1);
    }

    #[test]
    fn commit_block_has_no_txs() {
        let block = Block {
            kind: BlockKind::Commit,
            parent_id: Id([2; 32]),
            height: 4,
            time: Some(7),
            txs: vec![],
        };
        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert!(decoded.txs.is_empty());
        assert!(decoded.height == 4);
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let_assert!(Err(CodecError::UnknownTypeId { type_id: 77, .. }) = Block::from_bytes(&[0, 0, 0, 0, 0, 77]));
    }
}
