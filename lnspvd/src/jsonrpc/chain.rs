//! Chain RPC methods
use lnspv_common::json;
use lnspv_common::jsonrpc::Error;
use lnspv_common::model::request::{GetChainInfo, GetRawBlockByHeight, GetUtxOut};

use crate::backend::SpvBackend;
use crate::jsonrpc::params;

pub fn json_getchaininfo(ctx: &SpvBackend, request: &json::Value) -> Result<json::Value, Error> {
    log::debug!(target: "backend", "call for `getchaininfo` with request {:?}", request);
    let request: GetChainInfo = params(request)?;
    let info = ctx.get_chain_info()?;
    if let Some(last_height) = request.last_height {
        if last_height > info.block_count {
            log::warn!(target: "backend", "host knows height {last_height}, we are at {}", info.block_count);
        }
    }
    Ok(json::to_value(info)?)
}

pub fn json_getrawblockbyheight(
    ctx: &SpvBackend,
    request: &json::Value,
) -> Result<json::Value, Error> {
    log::debug!(target: "backend", "call for `getrawblockbyheight` with request {:?}", request);
    let request: GetRawBlockByHeight = params(request)?;
    let block = ctx.get_raw_block_by_height(request.height)?;
    Ok(json::to_value(block)?)
}

pub fn json_getutxout(ctx: &SpvBackend, request: &json::Value) -> Result<json::Value, Error> {
    log::debug!(target: "backend", "call for `getutxout` with request {:?}", request);
    let request: GetUtxOut = params(request)?;
    let utxo = ctx.get_utxo(&request.txid, request.vout)?;
    Ok(json::to_value(utxo)?)
}
