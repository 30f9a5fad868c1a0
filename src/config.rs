//! Configuration (ambient stack): the proxy's redirection target, mock
//! definitions path, report rotation pattern, and listen address,
//! grounded on the teacher's `serde_yaml`-based static-mock-file loading
//! convention in `server/persistence.rs`.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upstream redirection target (§4.4): the scheme, host, and port that an
/// incoming request's URL is rewritten to before forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectionConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl RedirectionConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub redirection: RedirectionConfig,
    #[serde(default)]
    pub mocks_path: Option<PathBuf>,
    pub report_path: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read config file '{0}': {1}")]
    Read(String, std::io::Error),
    #[error("cannot parse config file '{0}': {1}")]
    Parse(String, serde_yaml::Error),
}

impl ProxyConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Read(path.display().to_string(), e))?;
        serde_yaml::from_str(&content).map_err(|e| Error::Parse(path.display().to_string(), e))
    }
}
