pub mod request {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug)]
    pub struct GetUtxOut {
        pub txid: String,
        pub vout: u32,
    }
}

pub mod response {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
    pub struct UtxOut {
        /// Value of the output in millisatoshi, as a decimal string.
        pub amount: String,
        /// Script pubkey in hex.
        pub script: String,
    }
}
