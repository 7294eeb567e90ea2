/*!
 * Process Traits
 * Backend capability table for process control
 */

use super::types::*;
use crate::core::RawPid;

/// OS mechanism behind a [`ProcessOperator`](super::ProcessOperator)
///
/// A backend only performs syscalls. It never looks at or changes handle
/// status; the operator owns the state machine and calls into the backend
/// after a transition has been validated.
pub trait ProcessBackend: Send + Sync {
    /// Launch `exec.argv[0]` with `exec.argv` and return the new pid
    fn spawn(&self, exec: &ExecConfig) -> ProcessResult<RawPid>;

    /// Deliver a control signal to `pid`
    fn signal(&self, pid: RawPid, signal: ControlSignal) -> ProcessResult<()>;

    /// Wait for `pid` to change state
    fn wait(&self, pid: RawPid, mode: WaitMode) -> ProcessResult<WaitOutcome>;

    /// Name of the mechanism, for diagnostics
    fn platform(&self) -> &'static str;
}
