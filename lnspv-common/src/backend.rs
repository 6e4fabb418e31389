//! Chain client interface.
//!
//! This is everything the backend needs from the SPV client that is
//! syncing headers and compact filters from the network.
pub use bitcoin::block::Header as BlockHeader;
pub use bitcoin::consensus::{deserialize, serialize};
pub use bitcoin::{Amount, Block, BlockHash, OutPoint, ScriptBuf, Transaction, TxOut, Txid};

use crate::error;

/// Best block known by the chain client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockStamp {
    pub hash: BlockHash,
    pub height: u32,
}

/// Chain client specification.
///
/// Implementations must be safe to query from several threads at the
/// same time, the sync workers and the host dispatch share one handle.
pub trait ChainClient: Send + Sync {
    /// Number of peers we are currently connected with.
    fn connected_peers(&self) -> error::Result<usize>;

    /// `true` when the chain client believes it caught up with the network.
    fn is_current(&self) -> bool;

    /// Last block that the client fully processed.
    fn get_best_block(&self) -> error::Result<BlockStamp>;

    /// Tip of the header chain, this can be ahead of the best block
    /// while the client is syncing.
    fn get_chain_tip(&self) -> error::Result<(BlockHeader, u32)>;

    /// Look up an unspent output, `None` if it does not exist or it is spent.
    fn get_utxo(&self, outpoint: &OutPoint) -> error::Result<Option<TxOut>>;

    /// `None` when the height is above the current tip.
    fn get_block_hash(&self, height: u32) -> error::Result<Option<BlockHash>>;

    fn get_block(&self, hash: &BlockHash) -> error::Result<Option<Block>>;

    /// Relay a transaction to the peers.
    fn broadcast_transaction(&self, tx: &Transaction) -> error::Result<()>;
}
