//! Test Utils
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lnspv_common::conf::SpvConf;
use lnspv_common::error::BackendResult;
use lnspv_common::json;
use lnspv_common::jsonrpc::RpcError;
use lnspv_testing::{MockChainClient, SimulatedClock};
use lnspvd::jsonrpc::{PluginState, DATADIR_OPT, FEE_API_OPT, LOG_LEVEL_OPT};
use lnspvd::SyncCoordinator;

pub const FEE_ESTIMATES: &str =
    r#"{"1": 40.0, "2": 30.5, "3": 20.25, "5": 12.0, "6": 11.0, "144": 1.012, "1008": 1.0}"#;

/// Hand the mock client to the backend, the sync waits on a simulated clock.
pub fn connect(
    client: Arc<MockChainClient>,
) -> impl Fn(&SpvConf) -> BackendResult<SyncCoordinator> {
    move |_: &SpvConf| {
        Ok(SyncCoordinator::new(client.clone()).with_clock(Arc::new(SimulatedClock::new())))
    }
}

/// Run `init` with the options the host hands over.
pub fn init_plugin(
    state: &mut PluginState,
    client: Arc<MockChainClient>,
    datadir: &Path,
    fee_api: &str,
    network: &str,
) -> Result<(), RpcError> {
    let options = HashMap::from([
        (DATADIR_OPT, datadir.to_string_lossy().to_string()),
        (FEE_API_OPT, fee_api.to_owned()),
        (LOG_LEVEL_OPT, "trace".to_owned()),
    ]);
    state.init(
        Some(network),
        |name| options.get(name).cloned(),
        connect(client),
    )
}

pub fn call(state: &PluginState, method: &str, params: json::Value) -> Result<json::Value, RpcError> {
    state.dispatch(method, &params)
}

pub fn fee_oracle(server: &mut mockito::Server, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", "/testnet/api/fee-estimates")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}
