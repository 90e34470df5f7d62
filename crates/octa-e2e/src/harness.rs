//! The handle every test receives
//!
//! Provides a simple API for driving the CLI and reading the chain:
//!
//! ```ignore
//! let primary = harness.get_account_info()?;
//! harness.run_command(test_name, ["aptos", "account", "lookup-address", "--auth-key", &primary.account_address()])?;
//! let balance = harness.api_client().account_balance(&primary.address())?;
//! ```

use octa_rest::{ChainClient, FaucetClient};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::accounts::{well_known, AccountInfo, AccountProvisioner, FaucetFunder, PRIMARY};
use crate::config::HarnessConfig;
use crate::executor::{CommandError, CommandExecutor, CommandResult, CommandSpec};
use crate::network::{Network, NetworkConfig};
use crate::runner::TestContext;
use crate::workspace::{Workspace, CLI_E2E_PACKAGE};
use crate::{E2EError, E2EResult};

/// Conventional name of the CLI in test argv; replaced by the configured binary
pub const CLI_NAME: &str = "aptos";

/// Lines of output kept in failure diagnostics
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Octas per APT
pub const OCTAS_PER_APT: u64 = 100_000_000;

/// Coin denomination helper
///
/// Allows writing amounts like `2.apt()` instead of `200_000_000`
pub trait CoinDenom {
    /// Amount in octas (base unit)
    fn octas(self) -> u64;
    /// Convert from APT, saturating at `u64::MAX`
    fn apt(self) -> u64;
}

impl CoinDenom for u64 {
    fn octas(self) -> u64 {
        self
    }

    fn apt(self) -> u64 {
        self.saturating_mul(OCTAS_PER_APT)
    }
}

/// Test harness: network, clients, accounts and the CLI runner of one run
pub struct TestHarness {
    config: HarnessConfig,
    network: NetworkConfig,
    chain: ChainClient,
    faucet: FaucetClient,
    provisioner: AccountProvisioner,
    executor: CommandExecutor,
    workspace: Workspace,
    /// Global command counter for output file names
    commands: AtomicUsize,
    /// Output of the most recent command, for failure diagnostics
    last_output: Mutex<Option<String>>,
}

impl TestHarness {
    /// Build a harness talking to the configured network over HTTP
    pub fn connect(config: HarnessConfig) -> E2EResult<Self> {
        let network = config
            .network_config()
            .map_err(|e| E2EError::Setup(e.to_string()))?;
        let timeout = config.request_timeout();

        let chain = ChainClient::connect(network.rest_url(), timeout)?;
        let faucet = FaucetClient::connect(network.faucet_url(), timeout)?;
        let funder = FaucetFunder::new(
            FaucetClient::connect(network.faucet_url(), timeout)?,
            ChainClient::connect(network.rest_url(), timeout)?,
            timeout,
        );
        let provisioner = AccountProvisioner::new(funder, config.fund_amount);

        let program = resolve_program(&config.cli_path)?;
        let executor = CommandExecutor::new(config.command_timeout()).with_program(program);

        tracing::info!(
            network = %network.network(),
            rest_url = network.rest_url(),
            faucet_url = network.faucet_url(),
            cli = %config.cli_path.display(),
            "harness connected"
        );

        Ok(Self::from_parts(
            config,
            network,
            chain,
            faucet,
            provisioner,
            executor,
        ))
    }

    /// Assemble a harness from prebuilt parts
    pub fn from_parts(
        config: HarnessConfig,
        network: NetworkConfig,
        chain: ChainClient,
        faucet: FaucetClient,
        provisioner: AccountProvisioner,
        executor: CommandExecutor,
    ) -> Self {
        let workspace = Workspace::new(config.working_dir.clone());
        Self {
            config,
            network,
            chain,
            faucet,
            provisioner,
            executor,
            workspace,
            commands: AtomicUsize::new(0),
            last_output: Mutex::new(None),
        }
    }

    /// Prepare the working directory, create the CLI profile and register the
    /// fixed accounts
    ///
    /// Any error here is fatal to the run.
    pub fn prepare(&self) -> E2EResult<()> {
        self.workspace.prepare(&self.config.fixtures_dir)?;

        let mut argv = vec![CLI_NAME.to_string()];
        argv.extend(self.network.cli_init_args(&self.config.profile));
        self.run_command("init", argv)?;

        let primary =
            AccountInfo::from_cli_profile(&self.workspace.cli_config_path(), &self.config.profile)?;
        tracing::info!(address = %primary.address(), profile = %self.config.profile, "primary account");
        self.provisioner.register(PRIMARY, primary);

        for (role, info) in well_known::all()? {
            self.provisioner.register(role, info);
        }
        Ok(())
    }

    /// Resolved network endpoints
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Named network; selects the package fixture variant
    pub fn base_network(&self) -> Network {
        self.network.network()
    }

    /// Independent read path to the chain
    pub fn api_client(&self) -> &ChainClient {
        &self.chain
    }

    /// Faucet of the target network
    pub fn faucet(&self) -> &FaucetClient {
        &self.faucet
    }

    /// Account provisioner
    pub fn provisioner(&self) -> &AccountProvisioner {
        &self.provisioner
    }

    /// Configuration the harness was built with
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The account the CLI profile signs with
    pub fn get_account_info(&self) -> E2EResult<AccountInfo> {
        self.provisioner
            .get(PRIMARY)
            .ok_or_else(|| E2EError::Setup("primary account not loaded".to_string()))
    }

    /// Funded identity for `role`, created on first use
    pub fn account(&self, role: &str) -> E2EResult<AccountInfo> {
        Ok(self.provisioner.get_or_create_account(role)?)
    }

    /// Never-funded identity for `role`, created on first use
    pub fn unfunded_account(&self, role: &str) -> AccountInfo {
        self.provisioner.get_or_create_unfunded_account(role)
    }

    /// Directory commands run in
    pub fn working_dir(&self) -> &Path {
        self.workspace.root()
    }

    /// Working directory layout
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// The bundled package for this network, relative to the working directory
    pub fn package_dir(&self) -> PathBuf {
        self.package_dir_of(CLI_E2E_PACKAGE)
    }

    /// Any bundled package for this network, relative to the working directory
    pub fn package_dir_of(&self, package: &str) -> PathBuf {
        self.workspace.package_dir(package, self.base_network())
    }

    /// Run a command that must succeed
    ///
    /// A nonzero exit becomes [`E2EError::CommandFailed`], which fails the test.
    pub fn run_command<I, S>(&self, test_name: &str, argv: I) -> E2EResult<CommandResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let result = self.run_command_unchecked(test_name, argv)?;
        if !result.success() {
            tracing::warn!(
                command = %result.command_line,
                exit_code = result.exit_code,
                "command failed"
            );
            return Err(E2EError::CommandFailed {
                command: result.command_line,
                exit_code: result.exit_code,
                stderr: tail(&result.stderr, DIAGNOSTIC_TAIL_LINES),
            });
        }
        Ok(result)
    }

    /// Run a command and hand back its result whatever the exit code
    ///
    /// Output is written to `out/<NNN>_<test_name>.stdout|.stderr`.
    pub fn run_command_unchecked<I, S>(&self, test_name: &str, argv: I) -> E2EResult<CommandResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(argv, self.workspace.root());
        let number = self.commands.fetch_add(1, Ordering::SeqCst) + 1;
        let stem = format!("{:03}_{}", number, test_name);

        match self.executor.run_default(&spec) {
            Ok(result) => {
                self.workspace.write_result(&stem, &result)?;
                self.record_output(
                    &result.command_line,
                    Some(result.exit_code),
                    &result.stdout,
                    &result.stderr,
                );
                Ok(result)
            }
            Err(CommandError::Timeout {
                command,
                timeout,
                stdout,
                stderr,
            }) => {
                self.workspace.write_command_output(&stem, &stdout, &stderr)?;
                self.record_output(&command, None, &stdout, &stderr);
                Err(CommandError::Timeout {
                    command,
                    timeout,
                    stdout,
                    stderr,
                }
                .into())
            }
            Err(e) => {
                self.record_output(&spec.command_line(), None, "", &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Number of commands run so far
    pub fn commands_run(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    fn record_output(&self, command: &str, exit_code: Option<i32>, stdout: &str, stderr: &str) {
        let status = match exit_code {
            Some(code) => format!("exit code {}", code),
            None => "did not complete".to_string(),
        };
        let rendered = format!(
            "$ {}\n({})\n--- stdout ---\n{}\n--- stderr ---\n{}",
            command,
            status,
            tail(stdout, DIAGNOSTIC_TAIL_LINES),
            tail(stderr, DIAGNOSTIC_TAIL_LINES)
        );
        *self.last_output.lock() = Some(rendered);
    }
}

impl TestContext for TestHarness {
    fn take_diagnostics(&self) -> Option<String> {
        self.last_output.lock().take()
    }
}

/// Make a relative CLI path with a directory part absolute, since commands run
/// in the working directory; bare names are left for `PATH` lookup
fn resolve_program(cli_path: &Path) -> E2EResult<PathBuf> {
    if cli_path.is_absolute() || cli_path.components().count() < 2 {
        return Ok(cli_path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| E2EError::Setup(format!("cannot resolve {}: {}", cli_path.display(), e)))?;
    Ok(cwd.join(cli_path))
}

/// Last `max_lines` lines of `text`
fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
