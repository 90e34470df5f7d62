//! Which chain environment a run targets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors selecting the network; fatal to the whole run
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Unknown network name
    #[error("unknown network '{0}' (expected local, devnet, testnet or custom)")]
    Unknown(String),

    /// A custom network without an endpoint
    #[error("network '{network}' needs an explicit {which} URL")]
    MissingUrl {
        /// Selected network
        network: Network,
        /// `rest` or `faucet`
        which: &'static str,
    },

    /// Endpoint is not an http(s) URL
    #[error("invalid {which} URL '{url}'")]
    InvalidUrl {
        /// `rest` or `faucet`
        which: &'static str,
        /// The rejected value
        url: String,
    },
}

/// Named chain environment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Node and faucet on this machine
    #[default]
    Local,
    /// Public devnet
    Devnet,
    /// Public testnet
    Testnet,
    /// Any other node; both URLs must be given
    Custom,
}

impl Network {
    /// Lowercase name, as the CLI's `--network` flag spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Custom => "custom",
        }
    }

    /// Node REST endpoint used when none is configured
    pub fn default_rest_url(&self) -> Option<&'static str> {
        match self {
            Network::Local => Some("http://127.0.0.1:8080"),
            Network::Devnet => Some("https://fullnode.devnet.aptoslabs.com"),
            Network::Testnet => Some("https://fullnode.testnet.aptoslabs.com"),
            Network::Custom => None,
        }
    }

    /// Faucet endpoint used when none is configured
    pub fn default_faucet_url(&self) -> Option<&'static str> {
        match self {
            Network::Local => Some("http://127.0.0.1:8081"),
            Network::Devnet => Some("https://faucet.devnet.aptoslabs.com"),
            Network::Testnet => Some("https://faucet.testnet.aptoslabs.com"),
            Network::Custom => None,
        }
    }

    /// Subfolder of the package fixtures built against this network's framework
    ///
    /// Custom networks are assumed to run a locally built framework.
    pub fn package_subdir(&self) -> &'static str {
        match self {
            Network::Custom => Network::Local.as_str(),
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Network::Local),
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            "custom" => Ok(Network::Custom),
            _ => Err(NetworkError::Unknown(s.to_string())),
        }
    }
}

/// Resolved endpoints of the target network, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    network: Network,
    rest_url: String,
    faucet_url: String,
}

impl NetworkConfig {
    /// Resolve endpoints, falling back to the network's defaults
    pub fn new(
        network: Network,
        rest_url: Option<&str>,
        faucet_url: Option<&str>,
    ) -> Result<Self, NetworkError> {
        let rest_url = resolve_url(network, "rest", rest_url, network.default_rest_url())?;
        let faucet_url =
            resolve_url(network, "faucet", faucet_url, network.default_faucet_url())?;
        Ok(Self {
            network,
            rest_url,
            faucet_url,
        })
    }

    /// Defaults for a local node and faucet
    pub fn local() -> Self {
        Self {
            network: Network::Local,
            rest_url: "http://127.0.0.1:8080".to_string(),
            faucet_url: "http://127.0.0.1:8081".to_string(),
        }
    }

    /// Selected network
    pub fn network(&self) -> Network {
        self.network
    }

    /// Node REST base URL
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    /// Faucet base URL
    pub fn faucet_url(&self) -> &str {
        &self.faucet_url
    }

    /// Whether both endpoints are the named network's defaults
    pub fn uses_default_endpoints(&self) -> bool {
        self.network.default_rest_url() == Some(self.rest_url.as_str())
            && self.network.default_faucet_url() == Some(self.faucet_url.as_str())
    }

    /// Arguments (after the program name) that create a CLI profile for this network
    pub fn cli_init_args(&self, profile: &str) -> Vec<String> {
        let mut args: Vec<String> = ["init", "--profile", profile, "--assume-yes", "--network"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if self.uses_default_endpoints() {
            args.push(self.network.as_str().to_string());
        } else {
            args.extend([
                "custom".to_string(),
                "--rest-url".to_string(),
                self.rest_url.clone(),
                "--faucet-url".to_string(),
                self.faucet_url.clone(),
            ]);
        }
        args
    }
}

fn resolve_url(
    network: Network,
    which: &'static str,
    configured: Option<&str>,
    default: Option<&'static str>,
) -> Result<String, NetworkError> {
    let url = configured
        .or(default)
        .ok_or(NetworkError::MissingUrl { network, which })?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(NetworkError::InvalidUrl {
            which,
            url: url.to_string(),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}
