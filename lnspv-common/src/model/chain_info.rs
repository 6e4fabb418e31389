use serde::{Deserialize, Serialize};

/// Snapshot of what the chain client knows about the chain.
///
/// The header count and the block count come from two different
/// queries, during the sync they can disagree.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain: String,
    #[serde(rename = "headercount")]
    pub header_count: u32,
    #[serde(rename = "blockcount")]
    pub block_count: u32,
    pub ibd: bool,
}

pub mod request {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug, Default)]
    pub struct GetChainInfo {
        /// Height already known by the host, unused by the SPV backend.
        pub last_height: Option<u32>,
    }
}
