pub mod backend;
pub mod clock;
pub mod conf;
pub mod error;
pub mod jsonrpc;
pub mod logger;
pub mod model;

pub mod json {
    pub use serde::de::DeserializeOwned;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::*;
}

pub mod chan {
    pub use crossbeam_channel::*;
}

pub use bitcoin;
