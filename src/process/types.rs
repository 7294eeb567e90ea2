/*!
 * Process Types
 * Handle, status, command line and wait outcome types
 */

use crate::core::{Classify, ErrorClass, OsError, RawPid};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ProcessError {
    #[error("Cannot {op} a process that is {from}")]
    #[diagnostic(
        code(process::invalid_transition),
        help("Check the handle status before requesting this transition.")
    )]
    InvalidTransition { from: ProcessStatus, op: ProcessOp },

    #[error("No command line set")]
    #[diagnostic(
        code(process::empty_command),
        help("Call set_argv with at least the program path before start.")
    )]
    EmptyCommand,

    #[error("Handle does not refer to a live process")]
    #[diagnostic(
        code(process::no_process),
        help("The process was never started or has already been reaped.")
    )]
    NoProcess,

    #[error("Process {0} reported a ptrace stop")]
    #[diagnostic(
        code(process::traced),
        help("Detach the tracer before managing the process through this operator.")
    )]
    Traced(RawPid),

    #[error(transparent)]
    #[diagnostic(code(process::os_error))]
    Os(#[from] OsError),
}

impl ProcessError {
    /// Underlying OS error, if the failure came from a syscall
    pub fn os_error(&self) -> Option<&OsError> {
        match self {
            ProcessError::Os(e) => Some(e),
            _ => None,
        }
    }
}

impl Classify for ProcessError {
    fn class(&self) -> ErrorClass {
        match self {
            ProcessError::InvalidTransition { .. }
            | ProcessError::Traced(_)
            | ProcessError::Os(_) => ErrorClass::GenericFailure,
            ProcessError::EmptyCommand | ProcessError::NoProcess => ErrorClass::NullReference,
        }
    }
}

/// Process status as tracked locally by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Running => "running",
            ProcessStatus::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Lifecycle operations, used for error reporting and tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOp {
    Start,
    Suspend,
    Resume,
    Exit,
}

impl fmt::Display for ProcessOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessOp::Start => "start",
            ProcessOp::Suspend => "suspend",
            ProcessOp::Resume => "resume",
            ProcessOp::Exit => "exit",
        };
        f.write_str(name)
    }
}

/// Signals the operator delivers to its child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// SIGSTOP
    Stop,
    /// SIGCONT
    Continue,
    /// SIGKILL
    Kill,
}

/// Whether a wait may block the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    Blocking,
    NonBlocking,
}

/// What a wait observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    /// Exited normally with the given code
    Exited(i32),
    /// Terminated by a signal
    Signaled { signal: i32, core_dumped: bool },
    /// Stopped by a signal
    Stopped(i32),
    /// Resumed by SIGCONT
    Continued,
    /// No state change yet (non-blocking waits only)
    StillAlive,
}

impl WaitOutcome {
    /// Process is gone and its pid has been reaped
    #[inline]
    pub fn is_terminated(&self) -> bool {
        matches!(self, WaitOutcome::Exited(_) | WaitOutcome::Signaled { .. })
    }

    /// Exit code, for normal exits
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WaitOutcome::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// POSIX-encoded status word, or `None` for the "no change yet" marker
    pub fn raw(&self) -> Option<i32> {
        match *self {
            WaitOutcome::Exited(code) => Some((code & 0xff) << 8),
            WaitOutcome::Signaled {
                signal,
                core_dumped,
            } => Some((signal & 0x7f) | if core_dumped { 0x80 } else { 0 }),
            WaitOutcome::Stopped(signal) => Some(((signal & 0xff) << 8) | 0x7f),
            WaitOutcome::Continued => Some(0xffff),
            WaitOutcome::StillAlive => None,
        }
    }
}

/// How the child's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    /// Share the parent's streams
    #[default]
    Inherit,
    /// Redirect all three to /dev/null
    Null,
}

/// Command line and launch environment for a process
///
/// `argv[0]` is the program; the rest are its arguments. Setting it is pure
/// data mutation and takes effect on the next start.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecConfig {
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<(String, String)>,
    #[serde(default)]
    pub clear_env: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub stdio: StdioMode,
}

impl ExecConfig {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env_vars: Vec<(String, String)>) -> Self {
        self.env_vars = env_vars;
        self
    }

    /// Start from an empty environment instead of inheriting the parent's
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    /// Program path (`argv[0]`)
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Arguments after the program path
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// What happens to a live child when its operator is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Kill and reap the child
    #[default]
    Terminate,
    /// Leave the child running as an orphan
    Detach,
}

/// One OS process's identity and locally tracked status
///
/// Only [`ProcessOperator`](super::ProcessOperator) mutates a handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessHandle {
    pub(super) pid: Option<RawPid>,
    pub(super) exec: ExecConfig,
    pub(super) status: ProcessStatus,
}

impl ProcessHandle {
    pub fn new(exec: ExecConfig) -> Self {
        Self {
            pid: None,
            exec,
            status: ProcessStatus::Stopped,
        }
    }

    /// `None` is the invalid-pid sentinel
    #[inline]
    pub fn pid(&self) -> Option<RawPid> {
        self.pid
    }

    #[inline]
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    #[inline]
    pub fn argv(&self) -> &[String] {
        &self.exec.argv
    }

    #[inline]
    pub fn exec(&self) -> &ExecConfig {
        &self.exec
    }
}

/// Serializable snapshot of a handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<RawPid>,
    pub argv: Vec<String>,
    pub status: ProcessStatus,
    pub platform: String,
}
