//! Plugin configuration.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{self, BackendError, BackendResult, Context};

pub const DEFAULT_DATA_DIR: &str = "~/.lnspv";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The chains that the backend knows how to follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpvNetwork {
    Main,
    Test,
}

impl SpvNetwork {
    /// Chain name as reported inside `getchaininfo`.
    pub fn chain_name(&self) -> &'static str {
        match self {
            SpvNetwork::Main => "main",
            SpvNetwork::Test => "test",
        }
    }

    /// Path, relative to the oracle host, of the Esplora API root.
    pub fn api_path(&self) -> &'static str {
        match self {
            SpvNetwork::Main => "api",
            SpvNetwork::Test => "testnet/api",
        }
    }
}

/// Parse the network name used by the host configuration.
impl FromStr for SpvNetwork {
    type Err = error::Error;

    fn from_str(network: &str) -> Result<Self, Self::Err> {
        match network {
            "bitcoin" => Ok(SpvNetwork::Main),
            "testnet" => Ok(SpvNetwork::Test),
            _ => error::bail!("unsupported network: {network}"),
        }
    }
}

impl fmt::Display for SpvNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain_name())
    }
}

#[derive(Clone, Debug)]
pub struct SpvConf {
    pub network: SpvNetwork,
    /// Root directory given by the user.
    pub path: PathBuf,
    /// Host of the Esplora instance used as fee oracle.
    pub fee_api: String,
}

impl Default for SpvConf {
    fn default() -> Self {
        Self {
            network: SpvNetwork::Test,
            path: PathBuf::from(DEFAULT_DATA_DIR),
            fee_api: String::new(),
        }
    }
}

impl SpvConf {
    /// Build the configuration from the raw values handed over by the host.
    ///
    /// The data directory is created on disk.
    pub fn new(network: &str, data_dir: &str, fee_api: &str) -> BackendResult<Self> {
        let mut conf = SpvConf::default();
        conf.set_fee_api(fee_api)?;
        conf.set_network(network)?;
        conf.set_data_dir(data_dir)?;
        Ok(conf)
    }

    pub fn set_network(&mut self, network: &str) -> BackendResult<()> {
        self.network = SpvNetwork::from_str(network).map_err(BackendError::Configuration)?;
        Ok(())
    }

    pub fn set_fee_api(&mut self, host: &str) -> BackendResult<()> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(BackendError::Configuration(error::anyhow!(
                "must include an Esplora fee API host"
            )));
        }
        self.fee_api = host.to_owned();
        Ok(())
    }

    pub fn set_data_dir(&mut self, path: &str) -> BackendResult<()> {
        let path = expand_home(path).map_err(BackendError::Configuration)?;
        let chain_dir = path.join("data");
        std::fs::create_dir_all(&chain_dir)
            .with_context(|| format!("error making directory {}", chain_dir.display()))
            .map_err(BackendError::Configuration)?;
        self.path = path;
        Ok(())
    }

    /// Directory where the chain client keeps headers, filters and peers.
    pub fn chain_dir(&self) -> PathBuf {
        self.path.join("data")
    }

    /// Base URL of the Esplora API, scheme included.
    pub fn fee_api_url(&self) -> String {
        let base = if self.fee_api.starts_with("http://") || self.fee_api.starts_with("https://")
        {
            self.fee_api.clone()
        } else {
            format!("https://{}", self.fee_api)
        };
        format!("{base}/{}", self.network.api_path())
    }
}

fn expand_home(path: &str) -> error::Result<PathBuf> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(Path::new(path).to_path_buf());
    };
    let home = dirs::home_dir().ok_or(error::anyhow!("impossible find the home directory"))?;
    Ok(home.join(rest.trim_start_matches('/')))
}
