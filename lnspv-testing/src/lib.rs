//! lnspv test framework.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use lnspv_common::backend::{BlockHeader, BlockStamp, ChainClient};
use lnspv_common::bitcoin::absolute::LockTime;
use lnspv_common::bitcoin::block::Version as BlockVersion;
use lnspv_common::bitcoin::blockdata::constants::genesis_block;
use lnspv_common::bitcoin::consensus::encode::serialize_hex;
use lnspv_common::bitcoin::hashes::Hash;
use lnspv_common::bitcoin::transaction::Version;
use lnspv_common::bitcoin::{
    Amount, Block, BlockHash, CompactTarget, Network, OutPoint, ScriptBuf, Sequence,
    Transaction, TxIn, TxMerkleNode, TxOut, Txid, Witness,
};
use lnspv_common::clock::Clock;
use lnspv_common::error;
use lnspv_common::logger;

static INIT: Once = Once::new();

/// Install the logger once for the whole test binary.
pub fn init() {
    // ignore error
    INIT.call_once(|| {
        let _ = logger::init("trace");
    });
}

/// Build a coinbase-like transaction paying `value` to `script`.
///
/// `tag` ends up in the script sig so that two transactions built
/// with the same value and script still have a different txid.
pub fn transaction(tag: u32, value: Amount, script: ScriptBuf) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(tag.to_le_bytes().to_vec()),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value,
            script_pubkey: script,
        }],
    }
}

/// Raw hex of a well formed transaction.
pub fn raw_transaction_hex() -> String {
    let script = ScriptBuf::from_bytes(vec![0x51]);
    serialize_hex(&transaction(7, Amount::from_sat(1_000), script))
}

/// Build `len` blocks on top of the testnet genesis, genesis included.
pub fn chain(len: u32) -> Vec<Block> {
    let mut blocks = vec![genesis_block(Network::Testnet)];
    for height in 1..len {
        let prev = blocks[blocks.len() - 1].block_hash();
        let coinbase = transaction(
            height,
            Amount::from_sat(50 * 100_000_000),
            ScriptBuf::from_bytes(vec![0x51]),
        );
        let mut block = Block {
            header: BlockHeader {
                version: BlockVersion::ONE,
                prev_blockhash: prev,
                merkle_root: TxMerkleNode::all_zeros(),
                time: 1_700_000_000 + height * 600,
                bits: CompactTarget::from_consensus(0x207fffff),
                nonce: height,
            },
            txdata: vec![coinbase],
        };
        if let Some(root) = block.compute_merkle_root() {
            block.header.merkle_root = root;
        }
        blocks.push(block);
    }
    blocks
}

struct MockState {
    blocks: Vec<Block>,
    /// Height of the best fully processed block, can lag behind the headers.
    best_height: u32,
    /// Number of peers reported once `peers_after` polls went by.
    peers: usize,
    peers_after: Option<usize>,
    current_after: Option<usize>,
    utxos: HashMap<OutPoint, TxOut>,
    broadcasted: Vec<Transaction>,
    fail_queries: bool,
    fail_broadcast: bool,
}

/// In memory chain client.
///
/// Every call is recorded, so tests can check that an operation did
/// (or did not) reach the chain client.
pub struct MockChainClient {
    state: Mutex<MockState>,
    calls: Mutex<Vec<&'static str>>,
    peer_polls: AtomicUsize,
    current_polls: AtomicUsize,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new(chain(1))
    }
}

impl MockChainClient {
    /// A synced client with one peer, serving `blocks`.
    pub fn new(blocks: Vec<Block>) -> Self {
        let best_height = blocks.len().saturating_sub(1) as u32;
        Self {
            state: Mutex::new(MockState {
                blocks,
                best_height,
                peers: 1,
                peers_after: Some(0),
                current_after: Some(0),
                utxos: HashMap::new(),
                broadcasted: Vec::new(),
                fail_queries: false,
                fail_broadcast: false,
            }),
            calls: Mutex::new(Vec::new()),
            peer_polls: AtomicUsize::new(0),
            current_polls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: &'static str) {
        log::trace!(target: "mock", "call to `{call}`");
        self.calls.lock().unwrap().push(call);
    }

    /// Report zero peers for the first `polls` polls, `None` means never find one.
    pub fn with_peers_after(self, polls: Option<usize>) -> Self {
        self.state().peers_after = polls;
        self
    }

    /// Report not current for the first `polls` polls, `None` means never.
    pub fn with_current_after(self, polls: Option<usize>) -> Self {
        self.state().current_after = polls;
        self
    }

    pub fn with_best_height(self, height: u32) -> Self {
        self.state().best_height = height;
        self
    }

    pub fn with_utxo(self, outpoint: OutPoint, output: TxOut) -> Self {
        self.state().utxos.insert(outpoint, output);
        self
    }

    pub fn failing(self) -> Self {
        self.state().fail_queries = true;
        self
    }

    pub fn failing_broadcast(self) -> Self {
        self.state().fail_broadcast = true;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn peer_polls(&self) -> usize {
        self.peer_polls.load(Ordering::SeqCst)
    }

    pub fn current_polls(&self) -> usize {
        self.current_polls.load(Ordering::SeqCst)
    }

    pub fn broadcasted(&self) -> Vec<Transaction> {
        self.state().broadcasted.clone()
    }

    pub fn block(&self, height: u32) -> Option<Block> {
        self.state().blocks.get(height as usize).cloned()
    }

    fn check(&self) -> error::Result<()> {
        if self.state().fail_queries {
            error::bail!("chain client unavailable");
        }
        Ok(())
    }
}

impl ChainClient for MockChainClient {
    fn connected_peers(&self) -> error::Result<usize> {
        self.record("connected_peers");
        let poll = self.peer_polls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        match state.peers_after {
            Some(after) if poll >= after => Ok(state.peers),
            _ => Ok(0),
        }
    }

    fn is_current(&self) -> bool {
        self.record("is_current");
        let poll = self.current_polls.fetch_add(1, Ordering::SeqCst);
        matches!(self.state().current_after, Some(after) if poll >= after)
    }

    fn get_best_block(&self) -> error::Result<BlockStamp> {
        self.record("get_best_block");
        self.check()?;
        let state = self.state();
        let block = state
            .blocks
            .get(state.best_height as usize)
            .ok_or(error::anyhow!("no best block"))?;
        Ok(BlockStamp {
            hash: block.block_hash(),
            height: state.best_height,
        })
    }

    fn get_chain_tip(&self) -> error::Result<(BlockHeader, u32)> {
        self.record("get_chain_tip");
        self.check()?;
        let state = self.state();
        let tip = state.blocks.last().ok_or(error::anyhow!("empty chain"))?;
        Ok((tip.header, state.blocks.len() as u32 - 1))
    }

    fn get_utxo(&self, outpoint: &OutPoint) -> error::Result<Option<TxOut>> {
        self.record("get_utxo");
        self.check()?;
        Ok(self.state().utxos.get(outpoint).cloned())
    }

    fn get_block_hash(&self, height: u32) -> error::Result<Option<BlockHash>> {
        self.record("get_block_hash");
        self.check()?;
        Ok(self
            .state()
            .blocks
            .get(height as usize)
            .map(|block| block.block_hash()))
    }

    fn get_block(&self, hash: &BlockHash) -> error::Result<Option<Block>> {
        self.record("get_block");
        self.check()?;
        Ok(self
            .state()
            .blocks
            .iter()
            .find(|block| block.block_hash() == *hash)
            .cloned())
    }

    fn broadcast_transaction(&self, tx: &Transaction) -> error::Result<()> {
        self.record("broadcast_transaction");
        let mut state = self.state();
        if state.fail_broadcast {
            error::bail!("no peer accepted the transaction");
        }
        state.broadcasted.push(tx.clone());
        Ok(())
    }
}

/// Clock that only keeps track of the time it was asked to wait.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Total simulated time elapsed.
    pub fn elapsed(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Clock for SimulatedClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// A txid that the mock client does not know about.
pub fn unknown_txid() -> Txid {
    Txid::from_byte_array([0xab; 32])
}
