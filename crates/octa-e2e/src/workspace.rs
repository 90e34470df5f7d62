//! The directory the CLI runs in
//!
//! Layout under the root:
//!
//! ```text
//! <root>/
//!   .aptos/config.yaml        CLI profile, written by `init`
//!   move/<package>/<network>/ package fixtures, copied at startup
//!   out/NNN_<test>.stdout     captured output of every command
//! ```
//!
//! Package paths handed to the CLI are relative to the root, so the same argv
//! works whether the root is used directly or mounted elsewhere.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::executor::CommandResult;
use crate::network::Network;

/// Subfolder of the root holding the package fixtures
pub const PACKAGE_ROOT: &str = "move";

/// Package published and compiled by the bundled cases
pub const CLI_E2E_PACKAGE: &str = "cli-e2e-tests";

/// Package that must fail to compile
pub const MALFORMED_PACKAGE: &str = "cli-e2e-malformed";

/// Errors preparing the working directory
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Fixtures directory absent
    #[error("fixtures directory {} not found", .0.display())]
    MissingFixtures(PathBuf),

    /// Filesystem error
    #[error("{}: {source}", .path.display())]
    Io {
        /// Path being touched
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// Walking the fixtures tree failed
    #[error("walking fixtures: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Working directory of a run
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Workspace rooted at `root`; nothing is created until [`Workspace::prepare`]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory layout and copy the package fixtures in
    pub fn prepare(&self, fixtures: &Path) -> Result<(), WorkspaceError> {
        if !fixtures.is_dir() {
            return Err(WorkspaceError::MissingFixtures(fixtures.to_path_buf()));
        }
        create_dir(&self.out_dir())?;
        let copied = copy_tree(fixtures, &self.root.join(PACKAGE_ROOT))?;
        tracing::info!(
            root = %self.root.display(),
            files = copied,
            "workspace prepared"
        );
        Ok(())
    }

    /// Root directory; commands run here
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where command output files go
    pub fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    /// The CLI's profile file
    pub fn cli_config_path(&self) -> PathBuf {
        self.root.join(".aptos").join("config.yaml")
    }

    /// Package directory for `network`, relative to the root
    pub fn package_dir(&self, package: &str, network: Network) -> PathBuf {
        Path::new(PACKAGE_ROOT)
            .join(package)
            .join(network.package_subdir())
    }

    /// Resolve a root-relative path
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Persist a command's output as `<stem>.stdout` / `<stem>.stderr`
    pub fn write_command_output(
        &self,
        stem: &str,
        stdout: &str,
        stderr: &str,
    ) -> Result<(), WorkspaceError> {
        let out = self.out_dir();
        create_dir(&out)?;
        for (ext, content) in [("stdout", stdout), ("stderr", stderr)] {
            let path = out.join(format!("{}.{}", stem, ext));
            std::fs::write(&path, content).map_err(|source| WorkspaceError::Io { path, source })?;
        }
        Ok(())
    }

    /// Same as [`Workspace::write_command_output`] for a finished command
    pub fn write_result(&self, stem: &str, result: &CommandResult) -> Result<(), WorkspaceError> {
        self.write_command_output(stem, &result.stdout, &result.stderr)
    }
}

fn create_dir(path: &Path) -> Result<(), WorkspaceError> {
    std::fs::create_dir_all(path).map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy `src` into `dst` recursively, returning the number of files copied
fn copy_tree(src: &Path, dst: &Path) -> Result<usize, WorkspaceError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                create_dir(parent)?;
            }
            std::fs::copy(entry.path(), &target).map_err(|source| WorkspaceError::Io {
                path: target.clone(),
                source,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}
