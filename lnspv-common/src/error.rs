//! Error handling for the backend.
//!
//! Causes are carried as `anyhow` errors with context attached at the
//! call site, and then classified with [`BackendError`] so that the
//! plugin host can tell a bad request apart from a chain failure.
use std::fmt;

pub use anyhow::*;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug)]
pub enum BackendError {
    /// Unsupported network, missing fee oracle host, unusable data directory.
    Configuration(Error),
    /// Malformed txid or raw transaction supplied by the caller.
    Input(Error),
    /// The chain client failed or the requested item is unknown.
    ChainQuery(Error),
    /// The fee oracle can not be reached.
    Remote(Error),
    /// The fee oracle answered with something we can not use.
    Parse(Error),
    /// No peer showed up during the bounded startup wait.
    NoPeers { attempts: u32 },
}

impl BackendError {
    /// Stable error code reported to the plugin host.
    pub fn code(&self) -> i32 {
        match self {
            BackendError::Configuration(_) => -1,
            BackendError::Input(_) => -2,
            BackendError::ChainQuery(_) => -3,
            BackendError::Remote(_) => -4,
            BackendError::Parse(_) => -5,
            BackendError::NoPeers { .. } => -6,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Configuration(err) => write!(f, "configuration error: {err:#}"),
            BackendError::Input(err) => write!(f, "invalid input: {err:#}"),
            BackendError::ChainQuery(err) => write!(f, "chain query failed: {err:#}"),
            BackendError::Remote(err) => write!(f, "fee oracle unreachable: {err:#}"),
            BackendError::Parse(err) => write!(f, "fee oracle response invalid: {err:#}"),
            BackendError::NoPeers { attempts } => {
                write!(f, "could not find peers after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Configuration(err)
            | BackendError::Input(err)
            | BackendError::ChainQuery(err)
            | BackendError::Remote(err)
            | BackendError::Parse(err) => Some(err.as_ref()),
            BackendError::NoPeers { .. } => None,
        }
    }
}
