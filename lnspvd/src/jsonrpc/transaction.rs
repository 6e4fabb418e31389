//! Transaction RPC methods
use lnspv_common::json;
use lnspv_common::jsonrpc::Error;
use lnspv_common::model::request::SendRawTransaction;
use lnspv_common::model::response;

use crate::backend::SpvBackend;
use crate::jsonrpc::params;

/// The host expects an answer even when the transaction is refused, so
/// every failure is reported inside the result.
pub fn json_sendrawtransaction(
    ctx: &SpvBackend,
    request: &json::Value,
) -> Result<json::Value, Error> {
    log::debug!(target: "backend", "call for `sendrawtransaction` with request {:?}", request);
    let request: SendRawTransaction = params(request)?;
    let resp = match ctx.send_raw_transaction(&request.tx) {
        Ok(_) => response::SendRawTransaction {
            success: true,
            errmsg: String::new(),
        },
        Err(err) => {
            log::warn!(target: "backend", "transaction refused: {err}");
            response::SendRawTransaction {
                success: false,
                errmsg: err.to_string(),
            }
        }
    };
    Ok(json::to_value(resp)?)
}
