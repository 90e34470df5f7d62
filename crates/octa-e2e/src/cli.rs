//! CLI argument parsing for octa-e2e

use clap::Parser;
use octa_e2e::{HarnessConfig, Network};
use std::path::PathBuf;

/// End-to-end tests for the chain CLI
///
/// Flags override values from `--config`; unset flags keep the file's values
/// (or the built-in defaults).
#[derive(Parser, Debug, Clone)]
#[command(name = "octa-e2e")]
#[command(about = "End-to-end tests for the chain CLI")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "OCTA_E2E_CONFIG")]
    pub config: Option<PathBuf>,

    /// CLI binary under test
    #[arg(long, env = "OCTA_E2E_CLI_PATH")]
    pub cli_path: Option<PathBuf>,

    /// Target network
    #[arg(long, value_enum)]
    pub network: Option<Network>,

    /// Node REST URL (required for --network custom)
    #[arg(long)]
    pub rest_url: Option<String>,

    /// Faucet URL (required for --network custom)
    #[arg(long)]
    pub faucet_url: Option<String>,

    /// Directory the CLI runs in
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Package fixtures to copy into the working directory
    #[arg(long)]
    pub fixtures_dir: Option<PathBuf>,

    /// Per-command timeout in seconds
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// Whole-run timeout in seconds; remaining tests are cancelled
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// Run only this test (repeatable)
    #[arg(long = "test", value_name = "NAME")]
    pub tests: Vec<String>,

    /// List registered tests and exit
    #[arg(long)]
    pub list: bool,

    /// Write a JSON report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(path) = &self.cli_path {
            config.cli_path = path.clone();
        }
        if let Some(network) = self.network {
            config.network = network;
        }
        if self.rest_url.is_some() {
            config.rest_url = self.rest_url.clone();
        }
        if self.faucet_url.is_some() {
            config.faucet_url = self.faucet_url.clone();
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = dir.clone();
        }
        if let Some(dir) = &self.fixtures_dir {
            config.fixtures_dir = dir.clone();
        }
        if let Some(secs) = self.command_timeout {
            config.command_timeout_secs = secs;
        }
        if self.run_timeout.is_some() {
            config.run_timeout_secs = self.run_timeout;
        }
        if !self.tests.is_empty() {
            config.tests = self.tests.clone();
        }
        if self.report.is_some() {
            config.report_path = self.report.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["octa-e2e"]);
        assert!(cli.network.is_none());
        assert!(cli.tests.is_empty());
        assert!(!cli.list);
        assert_eq!(cli.log_level, "info");

        let mut config = HarnessConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "octa-e2e",
            "--network", "custom",
            "--rest-url", "http://node:8080",
            "--faucet-url", "http://node:8081",
            "--cli-path", "/opt/aptos",
            "--command-timeout", "60",
            "--run-timeout", "900",
            "--test", "test_move_compile",
            "--test", "test_move_publish",
            "--report", "report.json",
        ]);

        let mut config = HarnessConfig {
            fund_amount: 7,
            ..Default::default()
        };
        cli.apply(&mut config);

        assert_eq!(config.network, Network::Custom);
        assert_eq!(config.rest_url.as_deref(), Some("http://node:8080"));
        assert_eq!(config.cli_path, PathBuf::from("/opt/aptos"));
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(900)));
        assert_eq!(config.tests, vec!["test_move_compile", "test_move_publish"]);
        assert_eq!(config.report_path, Some(PathBuf::from("report.json")));
        // Untouched by flags
        assert_eq!(config.fund_amount, 7);
    }

    #[test]
    fn test_cli_rejects_unknown_network() {
        assert!(Cli::try_parse_from(["octa-e2e", "--network", "mainnet"]).is_err());
    }
}
