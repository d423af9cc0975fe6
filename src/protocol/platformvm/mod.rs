pub mod block;
pub mod proposer;
pub mod txs;

pub use block::Block;
pub use txs::Tx;
pub use txs::UnsignedTx;
