//! Bitcoin backend served to the lightning node.
//!
//! Every query is answered by the chain client, except for the fee
//! estimation that is delegated to the fee oracle.
use std::str::FromStr;
use std::sync::Arc;

use lnspv_common::backend::{deserialize, ChainClient, OutPoint, Transaction, Txid};
use lnspv_common::bitcoin::consensus::encode::serialize_hex;
use lnspv_common::conf::SpvConf;
use lnspv_common::error::{self, BackendError, BackendResult, Context};
use lnspv_common::model::response::{RawBlock, UtxOut};
use lnspv_common::model::{ChainInfo, EstimatedFees};

use crate::fees::FeeOracle;
use crate::sync::{SyncCoordinator, Synced};

pub struct SpvBackend {
    conf: SpvConf,
    client: Arc<dyn ChainClient>,
    fees: FeeOracle,
}

impl SpvBackend {
    /// Build the backend on top of a chain client that finished the startup sync.
    pub fn new(conf: SpvConf, fees: FeeOracle, synced: Synced) -> Self {
        Self {
            conf,
            client: synced.client(),
            fees,
        }
    }

    /// Run the startup sync and build the backend, this blocks until
    /// the chain client is current.
    pub fn start(conf: SpvConf, coordinator: SyncCoordinator) -> BackendResult<Self> {
        // an unusable fee oracle must fail before the long wait
        let fees = FeeOracle::new(&conf)?;
        let synced = coordinator.start()?;
        Ok(Self::new(conf, fees, synced))
    }

    /// Look up an unspent output, the amount is reported in millisatoshi.
    pub fn get_utxo(&self, txid: &str, vout: u32) -> BackendResult<UtxOut> {
        let txid = Txid::from_str(txid)
            .with_context(|| format!("`{txid}` is not a valid transaction id"))
            .map_err(BackendError::Input)?;
        let outpoint = OutPoint::new(txid, vout);
        log::debug!(target: "backend", "looking for utxo {outpoint}");
        let output = self
            .client
            .get_utxo(&outpoint)
            .with_context(|| format!("error getting utxo {outpoint}"))
            .map_err(BackendError::ChainQuery)?
            .ok_or_else(|| BackendError::ChainQuery(error::anyhow!("utxo {outpoint} not found")))?;
        let sat = output.value.to_sat();
        let msat = sat.checked_mul(1000).ok_or_else(|| {
            BackendError::ChainQuery(error::anyhow!("output value {sat} sat overflows msat"))
        })?;
        Ok(UtxOut {
            amount: msat.to_string(),
            script: output.script_pubkey.to_hex_string(),
        })
    }

    /// Header count and block count come from two queries and they are
    /// not reconciled.
    pub fn get_chain_info(&self) -> BackendResult<ChainInfo> {
        let best = self
            .client
            .get_best_block()
            .context("error getting best block")
            .map_err(BackendError::ChainQuery)?;
        let (_, tip_height) = self
            .client
            .get_chain_tip()
            .context("error getting chain tip")
            .map_err(BackendError::ChainQuery)?;
        let ibd = !self.client.is_current();
        Ok(ChainInfo {
            chain: self.conf.network.chain_name().to_owned(),
            header_count: tip_height,
            block_count: best.height,
            ibd,
        })
    }

    pub fn estimate_fees(&self) -> BackendResult<EstimatedFees> {
        self.fees.estimate_fees()
    }

    /// There is no local fee estimation, the node must use
    /// [`SpvBackend::estimate_fees`]. This always answers zero.
    pub fn get_fee_rate(&self, blocks: u32, mode: &str) -> BackendResult<u64> {
        log::warn!(
            target: "backend",
            "fee rate for {blocks} blocks ({mode}) is not supported, answering 0"
        );
        Ok(0)
    }

    /// Decode a raw transaction without submitting it anywhere.
    pub fn check_raw_transaction(&self, tx_hex: &str) -> BackendResult<Transaction> {
        let bytes = hex::decode(tx_hex.trim())
            .context("raw transaction is not valid hex")
            .map_err(BackendError::Input)?;
        let tx: Transaction = deserialize(&bytes)
            .context("raw transaction can not be decoded")
            .map_err(BackendError::Input)?;
        Ok(tx)
    }

    /// Validate the raw transaction and relay it through the chain client.
    pub fn send_raw_transaction(&self, tx_hex: &str) -> BackendResult<Txid> {
        let tx = self.check_raw_transaction(tx_hex)?;
        let txid = tx.compute_txid();
        self.client
            .broadcast_transaction(&tx)
            .with_context(|| format!("error broadcasting transaction {txid}"))
            .map_err(BackendError::ChainQuery)?;
        log::info!(target: "backend", "transaction {txid} broadcasted");
        Ok(txid)
    }

    pub fn get_raw_block_by_height(&self, height: u32) -> BackendResult<RawBlock> {
        let hash = self
            .client
            .get_block_hash(height)
            .with_context(|| format!("error getting block hash at height {height}"))
            .map_err(BackendError::ChainQuery)?
            .ok_or_else(|| {
                BackendError::ChainQuery(error::anyhow!("no block at height {height}"))
            })?;
        let block = self
            .client
            .get_block(&hash)
            .with_context(|| format!("error getting block {hash}"))
            .map_err(BackendError::ChainQuery)?
            .ok_or_else(|| BackendError::ChainQuery(error::anyhow!("block {hash} not found")))?;
        Ok(RawBlock {
            block_hash: hash.to_string(),
            block: serialize_hex(&block),
        })
    }
}
