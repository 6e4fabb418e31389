//! Bitcoin backend methods exposed to the plugin host.
pub mod chain;
pub mod fees;
pub mod transaction;

use std::collections::HashMap;
use std::sync::Arc;

use clightningrpc_plugin::commands::RPCCommand;
use clightningrpc_plugin::errors::PluginError;
use clightningrpc_plugin::plugin::Plugin;

use lnspv_common::conf::{SpvConf, DEFAULT_DATA_DIR, DEFAULT_LOG_LEVEL};
use lnspv_common::error::{self, BackendError, BackendResult};
use lnspv_common::json;
use lnspv_common::jsonrpc::{Error, RpcError, INVALID_REQUEST, METHOD_NOT_FOUND, NOT_INITIALIZED};
use lnspv_common::logger;

use crate::backend::SpvBackend;
use crate::sync::SyncCoordinator;

pub const DATADIR_OPT: &str = "spv-datadir";
pub const FEE_API_OPT: &str = "spv-fee-api";
pub const LOG_LEVEL_OPT: &str = "spv-log-level";

/// String options declared in the manifest, with their default.
pub const OPTIONS: [(&str, &str, &str); 3] = [
    (
        DATADIR_OPT,
        DEFAULT_DATA_DIR,
        "Directory where the SPV client stores headers and filters",
    ),
    (
        FEE_API_OPT,
        "",
        "Host of the Esplora API used for fee and utxo lookups, e.g. blockstream.info",
    ),
    (
        LOG_LEVEL_OPT,
        DEFAULT_LOG_LEVEL,
        "Log level of the plugin: error, warn, info, debug or trace",
    ),
];

pub type Handler = fn(&SpvBackend, &json::Value) -> Result<json::Value, Error>;

/// Backend method registered in the plugin manifest.
#[derive(Clone, Copy)]
pub struct BackendMethod {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    handler: Handler,
}

/// Every backend method, in the order they are declared to the host.
pub const METHODS: [BackendMethod; 6] = [
    BackendMethod {
        name: "getchaininfo",
        usage: "[last_height]",
        description: "Chain name, header count, block count and initial block download status",
        handler: chain::json_getchaininfo,
    },
    BackendMethod {
        name: "getrawblockbyheight",
        usage: "height",
        description: "Block hash and raw block at the given height",
        handler: chain::json_getrawblockbyheight,
    },
    BackendMethod {
        name: "getutxout",
        usage: "txid vout",
        description: "Amount in msat and script of an unspent output",
        handler: chain::json_getutxout,
    },
    BackendMethod {
        name: "estimatefees",
        usage: "",
        description: "Fee rates in sat/kvB for every purpose of the node",
        handler: fees::json_estimatefees,
    },
    BackendMethod {
        name: "getfeerate",
        usage: "blocks mode",
        description: "Not supported, always 0, use estimatefees",
        handler: fees::json_getfeerate,
    },
    BackendMethod {
        name: "sendrawtransaction",
        usage: "tx [allowhighfees]",
        description: "Validate a raw transaction and broadcast it to the peers",
        handler: transaction::json_sendrawtransaction,
    },
];

impl RPCCommand<PluginState> for BackendMethod {
    fn call<'c>(
        &self,
        plugin: &mut Plugin<PluginState>,
        request: json::Value,
    ) -> Result<json::Value, PluginError> {
        plugin
            .state
            .dispatch(self.name, &request)
            .map_err(|err| PluginError::new(err.code, &err.message, err.data))
    }
}

/// State shared by the plugin callbacks.
///
/// The backend only exists once `init` finished the startup sync,
/// every method called before that is refused.
#[derive(Clone, Default)]
pub struct PluginState {
    backend: Option<Arc<SpvBackend>>,
}

impl PluginState {
    pub fn backend(&self) -> Option<&SpvBackend> {
        self.backend.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Validate the host configuration and run the startup sync, this
    /// blocks until the chain client is current.
    ///
    /// `option` looks up the plugin options by name, a missing option
    /// takes its manifest default.
    pub fn init<O, F>(&mut self, network: Option<&str>, option: O, connect: F) -> Result<(), RpcError>
    where
        O: Fn(&str) -> Option<String>,
        F: FnOnce(&SpvConf) -> BackendResult<SyncCoordinator>,
    {
        if self.is_initialized() {
            return Err(RpcError::new(INVALID_REQUEST, "plugin already initialized"));
        }
        let backend = init_backend(network, option, connect)?;
        self.backend = Some(Arc::new(backend));
        log::info!(target: "plugin", "plugin initialized");
        Ok(())
    }

    /// Route a host request to its backend method.
    pub fn dispatch(&self, method: &str, request: &json::Value) -> Result<json::Value, RpcError> {
        let Some(method) = METHODS.iter().find(|info| info.name == method) else {
            return Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("method `{method}` not found"),
            ));
        };
        let Some(backend) = self.backend() else {
            return Err(RpcError::new(
                NOT_INITIALIZED,
                format!("`{}` called before `init`", method.name),
            ));
        };
        (method.handler)(backend, request).map_err(|err| {
            log::debug!(target: "plugin", "`{}` failed: {err}", method.name);
            RpcError::from(err)
        })
    }
}

/// Build the plugin with every backend method registered.
///
/// `connect` receives the validated configuration during `init` and
/// returns the coordinator of the chain client to sync.
pub fn plugin<F>(connect: F) -> Plugin<PluginState>
where
    F: Fn(&SpvConf) -> BackendResult<SyncCoordinator> + 'static,
{
    let mut plugin = Plugin::new(PluginState::default(), false);
    for (name, default, description) in OPTIONS {
        plugin.add_opt(name, "string", Some(default.to_owned()), description, false);
    }
    for method in METHODS {
        plugin.add_rpc_method(method.name, method.usage, method.description, method);
    }
    plugin.on_init(move |plugin: &mut Plugin<PluginState>| on_init(plugin, &connect));
    plugin
}

fn on_init<F>(plugin: &mut Plugin<PluginState>, connect: &F) -> json::Value
where
    F: Fn(&SpvConf) -> BackendResult<SyncCoordinator>,
{
    let network = plugin
        .configuration
        .as_ref()
        .map(|conf| conf.network.clone());
    let options: HashMap<&str, String> = OPTIONS
        .iter()
        .filter_map(|(name, _, _)| plugin.get_opt::<String>(name).ok().map(|value| (*name, value)))
        .collect();
    let result = plugin
        .state
        .init(network.as_deref(), |name| options.get(name).cloned(), connect);
    init_answer(result)
}

/// The host disables the plugin when `init` answers with `disable`.
pub(crate) fn init_answer(result: Result<(), RpcError>) -> json::Value {
    match result {
        Ok(()) => json::json!({}),
        Err(err) => {
            log::error!(target: "plugin", "init failed: {}", err.message);
            json::json!({ "disable": err.message })
        }
    }
}

fn init_backend<O, F>(network: Option<&str>, option: O, connect: F) -> BackendResult<SpvBackend>
where
    O: Fn(&str) -> Option<String>,
    F: FnOnce(&SpvConf) -> BackendResult<SyncCoordinator>,
{
    let level = option(LOG_LEVEL_OPT).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());
    if let Err(err) = logger::set_level(&level) {
        log::warn!(target: "plugin", "ignoring `{LOG_LEVEL_OPT}`: {err}");
    }
    let network = network.ok_or_else(|| {
        BackendError::Configuration(error::anyhow!("host configuration has no network"))
    })?;
    let datadir = option(DATADIR_OPT).unwrap_or_else(|| DEFAULT_DATA_DIR.to_owned());
    let fee_api = option(FEE_API_OPT).unwrap_or_default();

    let conf = SpvConf::new(network, &datadir, &fee_api)?;
    log::info!(
        target: "plugin",
        "starting on {} with data in `{}`",
        conf.network,
        conf.path.display()
    );
    let coordinator = connect(&conf)?;
    SpvBackend::start(conf, coordinator)
}

/// Decode the request params, an empty positional list is read as no params.
pub(crate) fn params<T: json::DeserializeOwned>(request: &json::Value) -> Result<T, Error> {
    let request = match request {
        json::Value::Array(values) if values.is_empty() => json::json!({}),
        json::Value::Null => json::json!({}),
        request => request.clone(),
    };
    Ok(json::from_value(request)?)
}
