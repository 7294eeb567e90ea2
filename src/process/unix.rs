/*!
 * Unix Process Backend
 * fork/exec through std::process, signals and waitpid through nix
 */

use super::traits::ProcessBackend;
use super::types::*;
use crate::core::{OsContext, OsError, RawPid};
use crate::monitoring::OsCallSpan;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// POSIX process control
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessBackend;

impl UnixProcessBackend {
    pub fn new() -> Self {
        Self
    }

    fn build_command(exec: &ExecConfig) -> ProcessResult<Command> {
        let program = exec.program().ok_or(ProcessError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(exec.args());

        if exec.clear_env {
            cmd.env_clear();
        }
        for (key, value) in &exec.env_vars {
            cmd.env(key, value);
        }

        if let Some(ref dir) = exec.working_dir {
            cmd.current_dir(dir);
        }

        if exec.stdio == StdioMode::Null {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        Ok(cmd)
    }
}

impl ProcessBackend for UnixProcessBackend {
    fn spawn(&self, exec: &ExecConfig) -> ProcessResult<RawPid> {
        let mut cmd = Self::build_command(exec)?;

        let span = OsCallSpan::new("spawn", -1);
        let outcome = cmd.spawn().map_err(|e| OsError::from_io("spawn", &e));
        span.record_outcome(&outcome);

        // exec failures are reported back through spawn, so an error here
        // never leaves a child behind. Dropping `Child` neither kills nor reaps.
        let child = outcome.map_err(|e| {
            warn!(program = ?exec.program(), error = %e, "Failed to spawn process");
            e
        })?;

        let pid = child.id() as RawPid;
        info!(pid, program = ?exec.program(), "Spawned OS process");
        Ok(pid)
    }

    fn signal(&self, pid: RawPid, signal: ControlSignal) -> ProcessResult<()> {
        let sig = match signal {
            ControlSignal::Stop => Signal::SIGSTOP,
            ControlSignal::Continue => Signal::SIGCONT,
            ControlSignal::Kill => Signal::SIGKILL,
        };

        let span = OsCallSpan::new("kill", pid);
        let outcome = kill(Pid::from_raw(pid), sig).os_context("kill");
        span.record_outcome(&outcome);

        if let Err(ref e) = outcome {
            warn!(pid, signal = %sig, error = %e, "Failed to deliver signal");
        }
        Ok(outcome?)
    }

    fn wait(&self, pid: RawPid, mode: WaitMode) -> ProcessResult<WaitOutcome> {
        // Stops and continues are state changes too
        let changes = WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
        let (span, flags) = match mode {
            WaitMode::Blocking => (OsCallSpan::blocking("waitpid", pid), changes),
            WaitMode::NonBlocking => (
                OsCallSpan::new("waitpid", pid),
                changes | WaitPidFlag::WNOHANG,
            ),
        };

        let outcome = loop {
            match waitpid(Pid::from_raw(pid), Some(flags)) {
                Err(Errno::EINTR) => continue,
                other => break other.os_context("waitpid"),
            }
        };
        span.record_outcome(&outcome);

        let outcome = match outcome? {
            WaitStatus::Exited(_, code) => WaitOutcome::Exited(code),
            WaitStatus::Signaled(_, sig, core_dumped) => WaitOutcome::Signaled {
                signal: sig as i32,
                core_dumped,
            },
            WaitStatus::Stopped(_, sig) => WaitOutcome::Stopped(sig as i32),
            WaitStatus::Continued(_) => WaitOutcome::Continued,
            WaitStatus::StillAlive => WaitOutcome::StillAlive,
            // ptrace stops, Linux only
            #[allow(unreachable_patterns)]
            other => {
                warn!(pid, status = ?other, "Child is being traced");
                return Err(ProcessError::Traced(pid));
            }
        };
        Ok(outcome)
    }

    fn platform(&self) -> &'static str {
        "unix"
    }
}
