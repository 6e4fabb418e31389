//! Nakamoto chain client for the SPV backend.
//!
//! Nakamoto syncs headers and compact filters from the peers, it is
//! built on an older rust-bitcoin so every value crossing this crate
//! is converted through its consensus encoding.
use std::net::TcpStream;
use std::str::FromStr;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use esplora_client::BlockingClient;
use esplora_client::Builder;
use nakamoto_client::traits::Handle;
use nakamoto_common::bitcoin::consensus::encode as nakamoto_encode;
use nakamoto_common::bitcoin::network::constants::ServiceFlags;
use nakamoto_net_poll::Reactor;
use nakamoto_net_poll::Waker;

pub use nakamoto_client::{Client, Config, Error, Network};

use lnspv_common::backend::{
    deserialize, serialize, Amount, Block, BlockHash, BlockHeader, BlockStamp, ChainClient,
    OutPoint, ScriptBuf, Transaction, TxOut,
};
use lnspv_common::chan;
use lnspv_common::conf::{SpvConf, SpvNetwork};
use lnspv_common::error::{self, Context};

/// Maximum wait for a full block requested to the peers.
const BLOCK_TIMEOUT: Duration = Duration::from_secs(60);

pub struct NakamotoClient {
    handle: nakamoto_client::Handle<Waker>,
    rest: BlockingClient,
    block_timeout: Duration,
    _worker: JoinHandle<Result<(), Error>>,
}

impl NakamotoClient {
    /// Spawn the nakamoto client on its own thread, headers and filters
    /// are stored inside the chain directory of the configuration.
    pub fn new(conf: &SpvConf) -> error::Result<Self> {
        let mut config = Config::default();
        config.network = match conf.network {
            SpvNetwork::Main => Network::Mainnet,
            SpvNetwork::Test => Network::Testnet,
        };
        config.root = conf.chain_dir();

        let client = Client::<Reactor<TcpStream>>::new()?;
        let handle = client.handle();
        // utxo lookups go to the same Esplora instance of the fee oracle
        let rest = Builder::new(&conf.fee_api_url())
            .build_blocking()
            .map_err(|err| error::anyhow!("{err}"))?;

        log::info!(target: "nakamoto", "starting nakamoto on {} in `{}`", conf.network, config.root.display());
        let worker = std::thread::spawn(move || client.run(config));
        Ok(Self {
            handle,
            rest,
            block_timeout: BLOCK_TIMEOUT,
            _worker: worker,
        })
    }

    fn tip_height(&self) -> error::Result<u32> {
        let tip = self.handle.get_tip()?;
        Ok(tip.height as u32)
    }
}

/// `true` once the tip reached the best height announced by the peers,
/// without peers there is nothing to compare with.
fn caught_up(tip: u64, peer_heights: impl IntoIterator<Item = u64>) -> bool {
    match peer_heights.into_iter().max() {
        Some(best) => tip >= best,
        None => false,
    }
}

/// Wait until `wanted` matches a received item, every other item is
/// dropped. The deadline holds even when the channel never goes quiet.
fn recv_until<T>(
    items: &chan::Receiver<T>,
    timeout: Duration,
    wanted: impl Fn(&T) -> bool,
) -> error::Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match items.recv_timeout(remaining) {
            Ok(item) if wanted(&item) => return Ok(item),
            Ok(_) => continue,
            Err(chan::RecvTimeoutError::Timeout) => {
                error::bail!("nothing received after {timeout:?}")
            }
            Err(chan::RecvTimeoutError::Disconnected) => error::bail!("nakamoto client stopped"),
        }
    }
}

fn to_nakamoto_hash(hash: &BlockHash) -> error::Result<nakamoto_common::block::BlockHash> {
    nakamoto_common::block::BlockHash::from_str(&hash.to_string())
        .map_err(|err| error::anyhow!("{err}"))
}

fn from_nakamoto_hash(hash: &nakamoto_common::block::BlockHash) -> error::Result<BlockHash> {
    BlockHash::from_str(&hash.to_string()).map_err(|err| error::anyhow!("{err}"))
}

fn from_nakamoto_header(header: &nakamoto_common::block::BlockHeader) -> error::Result<BlockHeader> {
    let header: BlockHeader = deserialize(&nakamoto_encode::serialize(header))?;
    Ok(header)
}

impl ChainClient for NakamotoClient {
    fn connected_peers(&self) -> error::Result<usize> {
        let peers = self.handle.get_peers(ServiceFlags::NETWORK)?;
        Ok(peers.len())
    }

    fn is_current(&self) -> bool {
        let peers = match self.handle.get_peers(ServiceFlags::NETWORK) {
            Ok(peers) => peers,
            Err(err) => {
                log::warn!(target: "nakamoto", "impossible get the peers: {err}");
                return false;
            }
        };
        match self.handle.get_tip() {
            Ok(tip) => caught_up(tip.height, peers.iter().map(|peer| peer.height)),
            Err(err) => {
                log::warn!(target: "nakamoto", "impossible get the tip: {err}");
                false
            }
        }
    }

    fn get_best_block(&self) -> error::Result<BlockStamp> {
        let tip = self.handle.get_tip()?;
        Ok(BlockStamp {
            hash: from_nakamoto_hash(&tip.blk_header.block_hash())?,
            height: tip.height as u32,
        })
    }

    fn get_chain_tip(&self) -> error::Result<(BlockHeader, u32)> {
        let tip = self.handle.get_tip()?;
        Ok((from_nakamoto_header(&tip.blk_header)?, tip.height as u32))
    }

    fn get_utxo(&self, outpoint: &OutPoint) -> error::Result<Option<TxOut>> {
        let txid = esplora_client::api::Txid::from_str(&outpoint.txid.to_string())
            .map_err(|err| error::anyhow!("{err}"))?;
        let vout = outpoint.vout;
        let Some(status) = self
            .rest
            .get_output_status(&txid, vout as u64)
            .map_err(|err| error::anyhow!("{err}"))?
        else {
            return Ok(None);
        };
        if status.spent {
            log::debug!(target: "nakamoto", "output {outpoint} is spent");
            return Ok(None);
        }
        let Some(tx) = self
            .rest
            .get_tx(&txid)
            .map_err(|err| error::anyhow!("{err}"))?
        else {
            return Ok(None);
        };
        let Some(output) = tx.output.get(vout as usize) else {
            return Ok(None);
        };
        Ok(Some(TxOut {
            value: Amount::from_sat(output.value),
            script_pubkey: ScriptBuf::from_bytes(output.script_pubkey.as_bytes().to_vec()),
        }))
    }

    fn get_block_hash(&self, height: u32) -> error::Result<Option<BlockHash>> {
        if height > self.tip_height()? {
            return Ok(None);
        }
        let Some(header) = self.handle.get_block_by_height(height as u64)? else {
            return Ok(None);
        };
        Ok(Some(from_nakamoto_hash(&header.block_hash())?))
    }

    fn get_block(&self, hash: &BlockHash) -> error::Result<Option<Block>> {
        let blocks = self.handle.blocks();
        let target = to_nakamoto_hash(hash)?;
        let Some((height, _)) = self.handle.get_block(&target)? else {
            return Ok(None);
        };
        log::debug!(target: "nakamoto", "waiting for block {hash} at height {height}");
        let (block, _) = recv_until(&blocks, self.block_timeout, |(block, _)| {
            block.block_hash() == target
        })
        .with_context(|| format!("error waiting for block {hash}"))?;
        let block: Block = deserialize(&nakamoto_encode::serialize(&block))
            .context("invalid block received from the peers")?;
        Ok(Some(block))
    }

    fn broadcast_transaction(&self, tx: &Transaction) -> error::Result<()> {
        let tx: nakamoto_common::block::Transaction = nakamoto_encode::deserialize(&serialize(tx))
            .map_err(|err| error::anyhow!("{err}"))?;
        let peers = self.handle.submit_transaction(tx)?;
        log::debug!(target: "nakamoto", "transaction sent to {} peers", peers.len());
        Ok(())
    }
}
