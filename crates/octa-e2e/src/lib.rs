//! # octa-e2e
//!
//! End-to-end test harness for the chain's command-line client.
//!
//! The CLI is a black box: tests run it as a subprocess, then check its output
//! and cross-check the chain through an independent REST read path.
//!
//! ## Design Philosophy
//!
//! 1. **Explicit**: tests are registered in a plain [`TestRegistry`], no global state
//! 2. **Isolated**: each test asks the provisioner for its own account slot
//! 3. **Honest**: nonzero exits are data; the chain is read directly, never through the CLI
//! 4. **CI-ready**: one outcome per test and an exit code that gates the pipeline
//!
//! ## Usage
//!
//! ```ignore
//! octa-e2e --network local --cli-path ./target/release/aptos
//! ```

pub mod accounts;
pub mod cases;
mod config;
mod executor;
mod harness;
mod network;
mod report;
mod runner;
mod workspace;

pub use accounts::{AccountInfo, AccountProvisioner, FaucetFunder, Funder, ProvisioningError};
pub use config::{ConfigError, HarnessConfig};
pub use executor::{CommandError, CommandExecutor, CommandResult, CommandSpec};
pub use harness::TestHarness;
pub use network::{Network, NetworkConfig, NetworkError};
pub use report::Report;
pub use runner::{
    RegistryError, Runner, TestCase, TestContext, TestFn, TestOutcome, TestRegistry, TestStatus,
};
pub use workspace::{Workspace, WorkspaceError, CLI_E2E_PACKAGE, MALFORMED_PACKAGE};

pub use octa_rest::{AccountAddress, ChainClient, FaucetClient, ModuleDescriptor, RestError};

/// Test result
pub type E2EResult<T> = Result<T, E2EError>;

/// Errors a test body can return
///
/// [`E2EError::Assertion`] and [`E2EError::CommandFailed`] mean the CLI or chain
/// misbehaved and the test **failed**. Every other variant means the harness
/// could not do its job and the test **errored**.
#[derive(Debug, thiserror::Error)]
pub enum E2EError {
    /// Output or chain state did not match expectations
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A command expected to succeed exited nonzero
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        /// Command line
        command: String,
        /// Exit code
        exit_code: i32,
        /// Tail of standard error
        stderr: String,
    },

    /// Command could not be run or timed out
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Account creation or funding failed
    #[error("provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    /// REST read failed
    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    /// Working directory problem
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// CLI output was not the JSON it should be
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Setup failed
    #[error("setup failed: {0}")]
    Setup(String),
}

impl E2EError {
    /// Build an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        E2EError::Assertion(message.into())
    }

    /// Whether this is a failure of the thing under test rather than of the harness
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            E2EError::Assertion(_) | E2EError::CommandFailed { .. }
        )
    }
}

/// Return an assertion failure from the enclosing test unless `cond` holds
///
/// ```ignore
/// check!(balance == expected, "balance {} != {}", balance, expected);
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::E2EError::Assertion(format!($($arg)+)));
        }
    };
}
