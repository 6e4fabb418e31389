//! Fee RPC methods
use lnspv_common::json;
use lnspv_common::jsonrpc::Error;
use lnspv_common::model::request::GetFeeRate;
use lnspv_common::model::response::FeeRate;

use crate::backend::SpvBackend;
use crate::jsonrpc::params;

pub fn json_estimatefees(ctx: &SpvBackend, request: &json::Value) -> Result<json::Value, Error> {
    log::debug!(target: "backend", "call for `estimatefees` with request {:?}", request);
    let fees = ctx.estimate_fees()?;
    Ok(json::to_value(fees)?)
}

pub fn json_getfeerate(ctx: &SpvBackend, request: &json::Value) -> Result<json::Value, Error> {
    log::debug!(target: "backend", "call for `getfeerate` with request {:?}", request);
    let request: GetFeeRate = params(request)?;
    let feerate = ctx.get_fee_rate(request.blocks, &request.mode)?;
    Ok(json::to_value(FeeRate { feerate })?)
}
