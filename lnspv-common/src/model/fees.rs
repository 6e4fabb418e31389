use serde::{Deserialize, Serialize};

/// Fee rates in sat/kvB for each purpose the lightning node needs.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct EstimatedFees {
    pub opening: u64,
    pub mutual_close: u64,
    pub unilateral_close: u64,
    pub delayed_to_us: u64,
    pub htlc_resolution: u64,
    pub penalty: u64,
    pub min_acceptable: u64,
    pub max_acceptable: u64,
}

pub mod request {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug)]
    pub struct GetFeeRate {
        pub blocks: u32,
        pub mode: String,
    }
}

pub mod response {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
    pub struct FeeRate {
        pub feerate: u64,
    }
}
