//! JSON RPC 2.0 errors reported to the plugin host.
use std::{error, fmt};

use serde::{Deserialize, Serialize};
use serde_json;

use crate::error::BackendError;

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
/// A method called before `init` completed.
pub const NOT_INITIALIZED: i32 = -32002;

/// A library error
#[derive(Debug)]
pub enum Error {
    /// Json error
    Json(serde_json::Error),
    /// Error response
    Rpc(RpcError),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Error {
        Error::Rpc(e)
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Error {
        Error::Rpc(e.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Error {
        Error::Rpc(RpcError {
            code: -1,
            message: format!("{e:#}"),
            data: None,
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Json(ref e) => write!(f, "JSON decode error: {e}"),
            Error::Rpc(ref r) => write!(f, "RPC error response: {r:?}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Json(ref e) => Some(e),
            _ => None,
        }
    }
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
/// A JSONRPCv2.0 error object
pub struct RpcError {
    /// The integer identifier of the error
    pub code: i32,
    /// A string describing the error message
    pub message: String,
    /// Additional data specific to the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<BackendError> for RpcError {
    fn from(value: BackendError) -> Self {
        RpcError::new(value.code(), value.to_string())
    }
}

impl From<Error> for RpcError {
    fn from(value: Error) -> Self {
        match value {
            Error::Rpc(rpc) => rpc,
            Error::Json(err) => RpcError::new(INVALID_PARAMS, format!("{err}")),
        }
    }
}
