//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::network::{Network, NetworkConfig, NetworkError};

/// Errors loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// TOML error
        #[source]
        source: toml::de::Error,
    },
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// CLI binary under test
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,
    /// Target network
    #[serde(default)]
    pub network: Network,
    /// Node REST URL override
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Faucet URL override
    #[serde(default)]
    pub faucet_url: Option<String>,
    /// Directory the CLI runs in; holds its profile, the packages and command output
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Package fixtures copied into the working directory
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,
    /// CLI profile the primary account is stored under
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Per-command timeout
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Per-request REST timeout, also bounds waiting for faucet transactions
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for the whole run; remaining tests are cancelled once exceeded
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
    /// Octas given to each freshly provisioned account
    #[serde(default = "default_fund_amount")]
    pub fund_amount: u64,
    /// Where to write the JSON report
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Only run these tests (empty runs all)
    #[serde(default)]
    pub tests: Vec<String>,
}

fn default_cli_path() -> PathBuf {
    PathBuf::from("aptos")
}

fn default_working_dir() -> PathBuf {
    std::env::temp_dir().join("octa-cli-tests")
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("fixtures/move")
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_command_timeout_secs() -> u64 {
    // Publishing compiles the package first
    300
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_fund_amount() -> u64 {
    100_000_000
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            network: Network::default(),
            rest_url: None,
            faucet_url: None,
            working_dir: default_working_dir(),
            fixtures_dir: default_fixtures_dir(),
            profile: default_profile(),
            command_timeout_secs: default_command_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            run_timeout_secs: None,
            fund_amount: default_fund_amount(),
            report_path: None,
            tests: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the network endpoints
    pub fn network_config(&self) -> Result<NetworkConfig, NetworkError> {
        NetworkConfig::new(
            self.network,
            self.rest_url.as_deref(),
            self.faucet_url.as_deref(),
        )
    }

    /// Per-command timeout
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Per-request REST timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whole-run timeout, if any
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
