//! Startup coordination with the chain client.
//!
//! Before serving any query the chain client must be connected with
//! at least one peer and it must have caught up with the network. The
//! [`SyncCoordinator`] runs both checks on background workers and blocks
//! the caller until they report back, first the peers and then the
//! headers.
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use lnspv_common::backend::ChainClient;
use lnspv_common::chan;
use lnspv_common::clock::{Clock, SystemClock};
use lnspv_common::error::{self, BackendError, BackendResult};

/// Progress of the startup sync, it only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncState {
    NotStarted,
    WaitingForPeers,
    WaitingForHeaders,
    Synced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub peer_poll_interval: Duration,
    /// Polls of the peer count before giving up.
    pub max_peer_attempts: u32,
    pub sync_poll_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            peer_poll_interval: Duration::from_secs(1),
            max_peer_attempts: 60,
            sync_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Shared view of the sync progress.
#[derive(Clone, Debug)]
pub struct SyncStateHandle {
    inner: Arc<Mutex<SyncState>>,
}

impl SyncStateHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SyncState::NotStarted)),
        }
    }

    pub fn get(&self) -> SyncState {
        *self.inner.lock().unwrap()
    }

    fn advance(&self, next: SyncState) {
        let mut state = self.inner.lock().unwrap();
        if next > *state {
            log::debug!(target: "sync", "sync state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

/// Proof that the startup sync completed, it carries the chain client
/// that is now safe to query.
pub struct Synced {
    client: Arc<dyn ChainClient>,
}

impl Synced {
    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }
}

pub struct SyncCoordinator {
    client: Arc<dyn ChainClient>,
    clock: Arc<dyn Clock>,
    options: SyncOptions,
    state: SyncStateHandle,
}

impl SyncCoordinator {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            options: SyncOptions::default(),
            state: SyncStateHandle::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    /// Handle to watch the progress from another thread while
    /// [`SyncCoordinator::start`] is blocking.
    pub fn state_handle(&self) -> SyncStateHandle {
        self.state.clone()
    }

    /// Block until the chain client has peers and it is current.
    ///
    /// Fails with [`BackendError::NoPeers`] when no peer shows up
    /// within the bounded wait. The wait for the headers has no bound.
    pub fn start(self) -> BackendResult<Synced> {
        log::info!(target: "sync", "chain client loading");
        self.state.advance(SyncState::WaitingForPeers);
        let connected = self.check_peers();
        log::info!(target: "sync", "finding peers...");
        let peers = connected.recv().map_err(|err| {
            BackendError::ChainQuery(error::anyhow!("peer worker stopped: {err}"))
        })??;
        log::info!(target: "sync", "connected with {peers} peers!");

        self.state.advance(SyncState::WaitingForHeaders);
        let synced = self.test_current();
        log::info!(target: "sync", "syncing chain headers...");
        synced.recv().map_err(|err| {
            BackendError::ChainQuery(error::anyhow!("sync worker stopped: {err}"))
        })?;
        self.state.advance(SyncState::Synced);
        log::info!(target: "sync", "done syncing!");

        Ok(Synced {
            client: self.client,
        })
    }

    fn check_peers(&self) -> chan::Receiver<BackendResult<usize>> {
        let (connected, receiver) = chan::bounded(1);
        let client = self.client.clone();
        let clock = self.clock.clone();
        let options = self.options;
        thread::spawn(move || {
            let result = wait_for_peers(client.as_ref(), clock.as_ref(), &options);
            let _ = connected.send(result);
        });
        receiver
    }

    fn test_current(&self) -> chan::Receiver<()> {
        let (synced, receiver) = chan::bounded(1);
        let client = self.client.clone();
        let clock = self.clock.clone();
        let options = self.options;
        thread::spawn(move || {
            wait_for_sync(client.as_ref(), clock.as_ref(), &options);
            let _ = synced.send(());
        });
        receiver
    }
}

fn wait_for_peers(
    client: &dyn ChainClient,
    clock: &dyn Clock,
    options: &SyncOptions,
) -> BackendResult<usize> {
    let attempts = options.max_peer_attempts;
    for attempt in 1..=attempts {
        match client.connected_peers() {
            Ok(count) if count > 0 => return Ok(count),
            Ok(_) => log::debug!(target: "sync", "no peers yet, attempt {attempt}/{attempts}"),
            Err(err) => {
                log::warn!(target: "sync", "impossible count the peers, attempt {attempt}/{attempts}: {err}")
            }
        }
        if attempt < attempts {
            clock.sleep(options.peer_poll_interval);
        }
    }
    log::error!(target: "sync", "could not find peers after {attempts} attempts");
    Err(BackendError::NoPeers { attempts })
}

fn wait_for_sync(client: &dyn ChainClient, clock: &dyn Clock, options: &SyncOptions) {
    while !client.is_current() {
        match client.get_chain_tip() {
            Ok((header, height)) => {
                let time = DateTime::<Utc>::from_timestamp(header.time as i64, 0)
                    .map(|time| time.to_rfc3339())
                    .unwrap_or_else(|| header.time.to_string());
                log::info!(target: "sync", "still syncing...: {height} - {time}");
            }
            Err(err) => log::warn!(target: "sync", "still syncing, chain tip unavailable: {err}"),
        }
        clock.sleep(options.sync_poll_interval);
    }
}
