/*!
 * Process Operator
 * Lifecycle state machine for one child process
 *
 * The locally tracked status is the single source of truth. Illegal
 * transitions are rejected before any syscall is made, so a pid that the
 * OS may have recycled is never signaled. Only the wait operations bring
 * real process state back in, and only termination changes the status;
 * stop and continue reports leave it as tracked.
 *
 * | op      | from              | to      |
 * |---------|-------------------|---------|
 * | start   | Stopped           | Running |
 * | suspend | Running           | Paused  |
 * | resume  | Paused            | Running |
 * | exit    | Running, Paused   | Stopped |
 */

use super::traits::ProcessBackend;
use super::types::*;
use super::unix::UnixProcessBackend;
use crate::core::RawPid;
use tracing::{debug, warn};

/// Drives one [`ProcessHandle`] through its lifecycle using backend `B`
///
/// Operations take `&mut self`, so a handle always has a single writer.
pub struct ProcessOperator<B: ProcessBackend> {
    backend: B,
    handle: ProcessHandle,
    drop_policy: DropPolicy,
}

impl ProcessOperator<UnixProcessBackend> {
    /// Operator bound to the POSIX backend
    pub fn native() -> Self {
        Self::new(UnixProcessBackend::new())
    }
}

impl<B: ProcessBackend> ProcessOperator<B> {
    /// Create an operator with an empty command line
    pub fn new(backend: B) -> Self {
        Self::with_exec(backend, ExecConfig::default())
    }

    pub fn with_exec(backend: B, exec: ExecConfig) -> Self {
        Self {
            backend,
            handle: ProcessHandle::new(exec),
            drop_policy: DropPolicy::default(),
        }
    }

    /// Choose what happens to a live child when the operator is dropped
    pub fn with_drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Replace the command line; takes effect on the next start
    pub fn set_argv<I, S>(&mut self, argv: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.exec.argv = argv.into_iter().map(Into::into).collect();
    }

    /// Replace the whole launch configuration; takes effect on the next start
    pub fn set_exec(&mut self, exec: ExecConfig) {
        self.handle.exec = exec;
    }

    /// Launch the command line. Requires `Stopped`.
    pub fn start(&mut self) -> ProcessResult<()> {
        self.require(ProcessOp::Start, |s| s == ProcessStatus::Stopped)?;
        if self.handle.exec.argv.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        // A child killed by exit() but never waited on is still a zombie
        self.reap_stale();

        match self.backend.spawn(&self.handle.exec) {
            Ok(pid) => {
                self.handle.pid = Some(pid);
                self.transition(ProcessOp::Start, ProcessStatus::Running);
                Ok(())
            }
            Err(e) => {
                self.handle.pid = None;
                Err(e)
            }
        }
    }

    /// Stop the child with SIGSTOP. Requires `Running`.
    pub fn suspend(&mut self) -> ProcessResult<()> {
        self.require(ProcessOp::Suspend, |s| s == ProcessStatus::Running)?;
        self.deliver(ControlSignal::Stop)?;
        self.transition(ProcessOp::Suspend, ProcessStatus::Paused);
        Ok(())
    }

    /// Continue a stopped child with SIGCONT. Requires `Paused`.
    pub fn resume(&mut self) -> ProcessResult<()> {
        self.require(ProcessOp::Resume, |s| s == ProcessStatus::Paused)?;
        self.deliver(ControlSignal::Continue)?;
        self.transition(ProcessOp::Resume, ProcessStatus::Running);
        Ok(())
    }

    /// Kill the child with SIGKILL. Requires `Running` or `Paused`.
    ///
    /// The pid is kept until a wait reaps the child.
    pub fn exit(&mut self) -> ProcessResult<()> {
        self.require(ProcessOp::Exit, |s| s != ProcessStatus::Stopped)?;
        self.deliver(ControlSignal::Kill)?;
        self.transition(ProcessOp::Exit, ProcessStatus::Stopped);
        Ok(())
    }

    /// Block until the child terminates
    pub fn wait_blocking(&mut self) -> ProcessResult<WaitOutcome> {
        self.wait(WaitMode::Blocking)
    }

    /// Poll the child once; returns [`WaitOutcome::StillAlive`] if nothing changed
    pub fn wait_non_blocking(&mut self) -> ProcessResult<WaitOutcome> {
        self.wait(WaitMode::NonBlocking)
    }

    /// Pid of the current child
    ///
    /// After [`exit`](Self::exit) the status is `Stopped` but this still
    /// returns the killed child's pid until a wait reaps it.
    #[inline]
    pub fn pid(&self) -> Option<RawPid> {
        self.handle.pid
    }

    #[inline]
    pub fn status(&self) -> ProcessStatus {
        self.handle.status
    }

    #[inline]
    pub fn argv(&self) -> &[String] {
        self.handle.argv()
    }

    #[inline]
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    #[inline]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Snapshot of the handle
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.handle.pid,
            argv: self.handle.exec.argv.clone(),
            status: self.handle.status,
            platform: self.backend.platform().to_string(),
        }
    }

    fn require(&self, op: ProcessOp, allowed: impl Fn(ProcessStatus) -> bool) -> ProcessResult<()> {
        let from = self.handle.status;
        if allowed(from) {
            return Ok(());
        }
        debug!(pid = ?self.handle.pid, %op, %from, "Rejected process transition");
        Err(ProcessError::InvalidTransition { from, op })
    }

    fn deliver(&self, signal: ControlSignal) -> ProcessResult<()> {
        let pid = self.handle.pid.ok_or(ProcessError::NoProcess)?;
        self.backend.signal(pid, signal)
    }

    fn transition(&mut self, op: ProcessOp, to: ProcessStatus) {
        debug!(
            pid = ?self.handle.pid,
            %op,
            from = %self.handle.status,
            %to,
            "Process transition"
        );
        self.handle.status = to;
    }

    fn wait(&mut self, mode: WaitMode) -> ProcessResult<WaitOutcome> {
        let pid = self.handle.pid.ok_or(ProcessError::NoProcess)?;
        let outcome = loop {
            let outcome = self.backend.wait(pid, mode)?;
            // A killed child may still report the stop or continue it saw first
            let stale = self.handle.status == ProcessStatus::Stopped
                && matches!(outcome, WaitOutcome::Stopped(_) | WaitOutcome::Continued);
            if !stale {
                break outcome;
            }
        };

        if outcome.is_terminated() {
            debug!(pid, ?outcome, "Process reaped");
            self.handle.pid = None;
            self.handle.status = ProcessStatus::Stopped;
        }
        Ok(outcome)
    }

    fn reap_stale(&mut self) {
        if let Some(pid) = self.handle.pid.take() {
            loop {
                match self.backend.wait(pid, WaitMode::Blocking) {
                    Ok(outcome) if outcome.is_terminated() => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(pid, error = %e, "Stale child already reaped");
                        break;
                    }
                }
            }
        }
    }
}

impl<B: ProcessBackend> Drop for ProcessOperator<B> {
    fn drop(&mut self) {
        if self.drop_policy == DropPolicy::Detach {
            return;
        }

        if self.handle.status != ProcessStatus::Stopped {
            if let Err(e) = self.deliver(ControlSignal::Kill) {
                warn!(pid = ?self.handle.pid, error = %e, "Failed to kill child on drop");
                return;
            }
        }
        self.reap_stale();
    }
}
