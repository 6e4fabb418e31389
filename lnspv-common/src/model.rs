mod block;
mod chain_info;
mod fees;
mod transaction;
mod utxo;

pub use chain_info::ChainInfo;
pub use fees::EstimatedFees;

pub mod request {
    pub use crate::model::block::request::*;
    pub use crate::model::chain_info::request::*;
    pub use crate::model::fees::request::*;
    pub use crate::model::transaction::request::*;
    pub use crate::model::utxo::request::*;
}

pub mod response {
    pub use crate::model::block::response::*;
    pub use crate::model::chain_info::ChainInfo;
    pub use crate::model::fees::response::*;
    pub use crate::model::fees::EstimatedFees;
    pub use crate::model::transaction::response::*;
    pub use crate::model::utxo::response::*;
}
