/*!
 * Simulation Process Backend
 * In-memory process table with no OS side effects
 */

use super::traits::ProcessBackend;
use super::types::*;
use crate::core::{OsError, RawPid};
use dashmap::{DashMap, DashSet};
use nix::errno::Errno;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::debug;

const SIGKILL: i32 = 9;

/// Calls that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedCall {
    Spawn,
    Signal,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimState {
    Running,
    Stopped,
    /// Terminated but not reaped yet
    Zombie(WaitOutcome),
}

/// Simulated process backend
///
/// Keeps a table of fake children. A blocking wait on a child that is still
/// alive, paused ones included, lets it run to completion with exit code 0
/// so tests never hang. Stop and continue are never reported.
pub struct SimulationProcessBackend {
    processes: Arc<DashMap<RawPid, SimState>>,
    next_pid: Arc<AtomicI32>,
    failures: Arc<DashSet<SimulatedCall>>,
}

impl SimulationProcessBackend {
    pub fn new() -> Self {
        Self {
            processes: Arc::new(DashMap::new()),
            next_pid: Arc::new(AtomicI32::new(1000)),
            failures: Arc::new(DashSet::new()),
        }
    }

    /// Make every subsequent `call` fail with `EPERM`
    pub fn fail(&self, call: SimulatedCall) {
        self.failures.insert(call);
    }

    /// Stop injecting failures for `call`
    pub fn recover(&self, call: SimulatedCall) {
        self.failures.remove(&call);
    }

    /// Simulate the child exiting on its own
    pub fn exit_child(&self, pid: RawPid, code: i32) {
        if let Some(mut state) = self.processes.get_mut(&pid) {
            *state = SimState::Zombie(WaitOutcome::Exited(code));
        }
    }

    /// Child exists and has not been reaped
    pub fn is_alive(&self, pid: RawPid) -> bool {
        self.processes
            .get(&pid)
            .map(|s| !matches!(*s, SimState::Zombie(_)))
            .unwrap_or(false)
    }

    /// Child is stopped by SIGSTOP
    pub fn is_stopped(&self, pid: RawPid) -> bool {
        self.processes
            .get(&pid)
            .map(|s| *s == SimState::Stopped)
            .unwrap_or(false)
    }

    /// Children not yet reaped
    pub fn count(&self) -> usize {
        self.processes.len()
    }

    fn check(&self, call: SimulatedCall, op: &'static str) -> Result<(), OsError> {
        if self.failures.contains(&call) {
            return Err(OsError::new(op, Errno::EPERM));
        }
        Ok(())
    }
}

impl Default for SimulationProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimulationProcessBackend {
    fn clone(&self) -> Self {
        Self {
            processes: Arc::clone(&self.processes),
            next_pid: Arc::clone(&self.next_pid),
            failures: Arc::clone(&self.failures),
        }
    }
}

impl ProcessBackend for SimulationProcessBackend {
    fn spawn(&self, exec: &ExecConfig) -> ProcessResult<RawPid> {
        if exec.program().is_none() {
            return Err(ProcessError::EmptyCommand);
        }
        self.check(SimulatedCall::Spawn, "spawn")?;

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.processes.insert(pid, SimState::Running);
        debug!(pid, program = ?exec.program(), "Spawned simulated process");
        Ok(pid)
    }

    fn signal(&self, pid: RawPid, signal: ControlSignal) -> ProcessResult<()> {
        self.check(SimulatedCall::Signal, "kill")?;

        let mut state = self
            .processes
            .get_mut(&pid)
            .ok_or(OsError::new("kill", Errno::ESRCH))?;

        // Zombies accept signals but ignore them
        if matches!(*state, SimState::Zombie(_)) {
            return Ok(());
        }

        *state = match signal {
            ControlSignal::Stop => SimState::Stopped,
            ControlSignal::Continue => SimState::Running,
            ControlSignal::Kill => SimState::Zombie(WaitOutcome::Signaled {
                signal: SIGKILL,
                core_dumped: false,
            }),
        };
        Ok(())
    }

    fn wait(&self, pid: RawPid, mode: WaitMode) -> ProcessResult<WaitOutcome> {
        self.check(SimulatedCall::Wait, "waitpid")?;

        let state = *self
            .processes
            .get(&pid)
            .ok_or(OsError::new("waitpid", Errno::ECHILD))?;

        let outcome = match (state, mode) {
            (SimState::Zombie(outcome), _) => outcome,
            (_, WaitMode::NonBlocking) => return Ok(WaitOutcome::StillAlive),
            // Unlike waitpid, a stopped child is run to completion too
            (_, WaitMode::Blocking) => WaitOutcome::Exited(0),
        };

        self.processes.remove(&pid);
        Ok(outcome)
    }

    fn platform(&self) -> &'static str {
        "simulation"
    }
}
