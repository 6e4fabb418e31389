//! Core Lightning plugin serving the bitcoin backend methods from an
//! SPV client.
use std::sync::Arc;

use lnspv_common::backend::ChainClient;
use lnspv_common::conf::DEFAULT_LOG_LEVEL;
use lnspv_common::error::BackendError;
use lnspv_common::logger;
use lnspv_nakamoto::NakamotoClient;
use lnspvd::jsonrpc::plugin;
use lnspvd::SyncCoordinator;

fn main() {
    // stdout belongs to the host, logs go on stderr
    if let Err(err) = logger::init(DEFAULT_LOG_LEVEL) {
        eprintln!("impossible initialize the logger: {err:#}");
        std::process::exit(1);
    }
    let plugin = plugin(|conf| {
        let client = NakamotoClient::new(conf).map_err(BackendError::Configuration)?;
        let client: Arc<dyn ChainClient> = Arc::new(client);
        Ok(SyncCoordinator::new(client))
    });
    plugin.start();
}
