pub mod request {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug)]
    pub struct GetRawBlockByHeight {
        pub height: u32,
    }
}

pub mod response {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
    pub struct RawBlock {
        #[serde(rename = "blockhash")]
        pub block_hash: String,
        /// Consensus serialization of the block in hex.
        pub block: String,
    }
}
