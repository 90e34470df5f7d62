//! Runs the CLI under test as a subprocess
//!
//! A nonzero exit is data, not an error: several cases assert on failing
//! invocations. Errors are reserved for "could not run it at all" and timeouts.

use parking_lot::Mutex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for pipes to close after killing a process group
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Errors from launching or supervising a command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No program given
    #[error("empty command")]
    EmptyCommand,

    /// Working directory missing or not a directory
    #[error("working directory {} does not exist or is not a directory", .0.display())]
    InvalidWorkingDir(PathBuf),

    /// The process could not be started
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its timeout and was killed with its process group
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout {
        /// Command line
        command: String,
        /// Allotted time
        timeout: Duration,
        /// Output captured before the kill
        stdout: String,
        /// Error output captured before the kill
        stderr: String,
    },

    /// Waiting on the process failed
    #[error("I/O error while running `{command}`: {source}")]
    Io {
        /// Command line
        command: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },
}

/// One invocation: argv plus the directory to run it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<String>,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a spec; `argv[0]` is the program
    pub fn new<I, S>(argv: I, working_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Argument vector
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Directory the command runs in
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Shell-like rendering for logs and diagnostics
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("'{}'", arg)
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code; `128 + signal` when killed by a signal
    pub exit_code: i32,
    /// Complete standard output
    pub stdout: String,
    /// Complete standard error
    pub stderr: String,
    /// Wall-clock time
    pub duration: Duration,
    /// Rendered command line
    pub command_line: String,
}

impl CommandResult {
    /// Whether the command exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Blocking subprocess runner with timeouts
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: Option<PathBuf>,
    default_timeout: Duration,
}

impl CommandExecutor {
    /// Create an executor running `argv[0]` as given
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            program: None,
            default_timeout,
        }
    }

    /// Run this binary in place of `argv[0]`
    ///
    /// Lets test bodies write the CLI's conventional name while the harness
    /// points at whichever build is under test.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Timeout used by [`CommandExecutor::run_default`]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run with the default timeout
    pub fn run_default(&self, spec: &CommandSpec) -> Result<CommandResult, CommandError> {
        self.run(spec, self.default_timeout)
    }

    /// Run the command to completion, capturing all output
    ///
    /// The timeout covers both the child's exit and the draining of its
    /// pipes. When it passes, the child's whole process group is killed.
    pub fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandResult, CommandError> {
        let (first, args) = spec.argv.split_first().ok_or(CommandError::EmptyCommand)?;
        if !spec.working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDir(spec.working_dir.clone()));
        }

        let program = self
            .program
            .clone()
            .unwrap_or_else(|| PathBuf::from(first));
        let command_line = spec.command_line();
        tracing::debug!(
            command = %command_line,
            dir = %spec.working_dir.display(),
            "running command"
        );

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            program: program.display().to_string(),
            source,
        })?;
        // The child leads its own group (process_group(0)), so its pid is the pgid
        let pgid = child.id();

        let mut capture = OutputCapture::start(child.stdout.take(), child.stderr.take());
        // An unrepresentable deadline means no deadline
        let deadline = start.checked_add(timeout);

        let status = match wait_until(&mut child, deadline) {
            Ok(status) => status,
            Err(source) => {
                terminate(&mut child, pgid);
                let _ = child.wait();
                return Err(CommandError::Io {
                    command: command_line,
                    source,
                });
            }
        };

        let Some(status) = status else {
            terminate(&mut child, pgid);
            let _ = child.wait();
            capture.wait(Instant::now().checked_add(KILL_GRACE));
            tracing::warn!(command = %command_line, ?timeout, "command timed out, process group killed");
            return Err(capture.timed_out(command_line, timeout));
        };

        // The child is gone but anything it left in the background may still
        // hold the pipes open; the same deadline covers draining them.
        if !capture.wait(deadline) {
            kill_process_group(pgid);
            capture.wait(Instant::now().checked_add(KILL_GRACE));
            tracing::warn!(
                command = %command_line,
                ?timeout,
                "command exited but its pipes stayed open, process group killed"
            );
            return Err(capture.timed_out(command_line, timeout));
        }

        let (stdout, stderr) = capture.take();
        let result = CommandResult {
            exit_code: exit_code(status),
            stdout,
            stderr,
            duration: start.elapsed(),
            command_line,
        };
        tracing::debug!(
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            "command finished"
        );
        Ok(result)
    }
}

/// Poll until the child exits or the deadline passes (`None`)
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let mut pause = POLL_INTERVAL;
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            pause = pause.min(deadline - now);
        }
        thread::sleep(pause);
    }
}

/// Kill the child's group, falling back to the child alone
fn terminate(child: &mut Child, pgid: u32) {
    if !kill_process_group(pgid) {
        let _ = child.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) -> bool {
    // SAFETY: killpg only sends a signal; an invalid or empty group yields ESRCH
    unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) == 0 }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) -> bool {
    false
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Output of both pipes, drained on reader threads
///
/// Readers append as data arrives, so whatever was written before a kill is
/// still available, and signal on the channel when their pipe reaches EOF.
struct OutputCapture {
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    done: Receiver<()>,
    pending: usize,
}

impl OutputCapture {
    fn start<O, E>(stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let (tx, done) = mpsc::channel();
        let mut capture = Self {
            stdout: SharedBuffer::default(),
            stderr: SharedBuffer::default(),
            done,
            pending: 0,
        };
        if let Some(pipe) = stdout {
            spawn_reader(pipe, capture.stdout.clone(), tx.clone());
            capture.pending += 1;
        }
        if let Some(pipe) = stderr {
            spawn_reader(pipe, capture.stderr.clone(), tx);
            capture.pending += 1;
        }
        capture
    }

    /// Wait for both pipes to close; `false` if the deadline passed first
    fn wait(&mut self, deadline: Option<Instant>) -> bool {
        while self.pending > 0 {
            let received = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.done.recv_timeout(deadline - now)
                }
                None => self.done.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(()) => self.pending -= 1,
                Err(RecvTimeoutError::Timeout) => return false,
                // Every reader has finished or died
                Err(RecvTimeoutError::Disconnected) => self.pending = 0,
            }
        }
        true
    }

    /// Output captured so far
    fn take(&self) -> (String, String) {
        let lossy = |buf: &SharedBuffer| String::from_utf8_lossy(&buf.lock()).into_owned();
        (lossy(&self.stdout), lossy(&self.stderr))
    }

    fn timed_out(&self, command: String, timeout: Duration) -> CommandError {
        let (stdout, stderr) = self.take();
        CommandError::Timeout {
            command,
            timeout,
            stdout,
            stderr,
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, buf: SharedBuffer, done: Sender<()>) {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf.lock().extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = done.send(());
    });
}
