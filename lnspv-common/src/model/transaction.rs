pub mod request {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug)]
    pub struct SendRawTransaction {
        pub tx: String,
        #[serde(default)]
        pub allowhighfees: Option<bool>,
    }
}

pub mod response {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
    pub struct SendRawTransaction {
        pub success: bool,
        pub errmsg: String,
    }
}
