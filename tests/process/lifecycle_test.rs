/*!
 * Process Lifecycle Tests
 * Real child processes driven through the POSIX backend
 */

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use os_operator::process::*;
use os_operator::{classify, ErrorClass};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::{Duration, Instant};

fn sleeper() -> ProcessOperator<UnixProcessBackend> {
    let mut opr = ProcessOperator::native();
    opr.set_exec(ExecConfig::new(["sleep", "30"]).with_stdio(StdioMode::Null));
    opr
}

fn script(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", body).unwrap();
    file.flush().unwrap();
    file
}

/// Scheduler state letter from /proc/<pid>/stat
#[cfg(target_os = "linux")]
fn proc_state(pid: i32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let after_comm = stat.rsplit_once(')')?.1;
    after_comm.trim_start().chars().next()
}

#[cfg(target_os = "linux")]
fn wait_for_state(pid: i32, wanted: char) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if proc_state(pid) == Some(wanted) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_start_yields_real_pid() {
    let mut opr = sleeper();
    opr.start().unwrap();

    assert_eq!(opr.status(), ProcessStatus::Running);
    let pid = opr.pid().expect("running process has a pid");
    assert!(pid > 0);
    assert!(kill(Pid::from_raw(pid), None).is_ok());

    let again = opr.start();
    assert!(matches!(
        again,
        Err(ProcessError::InvalidTransition {
            from: ProcessStatus::Running,
            op: ProcessOp::Start
        })
    ));
    assert_eq!(opr.status(), ProcessStatus::Running);
    assert_eq!(opr.pid(), Some(pid));
}

#[test]
fn test_full_cycle_ends_terminated() {
    let mut opr = sleeper();
    opr.start().unwrap();
    opr.suspend().unwrap();
    assert_eq!(opr.status(), ProcessStatus::Paused);
    opr.resume().unwrap();
    assert_eq!(opr.status(), ProcessStatus::Running);
    opr.exit().unwrap();
    assert_eq!(opr.status(), ProcessStatus::Stopped);

    let outcome = opr.wait_blocking().unwrap();
    assert!(outcome.is_terminated());
    assert_eq!(
        outcome,
        WaitOutcome::Signaled {
            signal: Signal::SIGKILL as i32,
            core_dumped: false
        }
    );
    assert_eq!(outcome.raw(), Some(Signal::SIGKILL as i32));
    assert_eq!(opr.pid(), None);
}

#[cfg(target_os = "linux")]
#[test]
fn test_suspend_and_resume_reach_the_kernel() {
    let mut opr = sleeper();
    opr.start().unwrap();
    let pid = opr.pid().unwrap();

    opr.suspend().unwrap();
    assert!(wait_for_state(pid, 'T'), "child never stopped");

    opr.resume().unwrap();
    assert!(wait_for_state(pid, 'S'), "child never resumed");

    opr.exit().unwrap();
    opr.wait_blocking().unwrap();
}

#[test]
fn test_wait_reports_suspend_and_resume() {
    let mut opr = sleeper();
    opr.start().unwrap();
    let pid = opr.pid().unwrap();

    opr.suspend().unwrap();
    let outcome = opr.wait_blocking().unwrap();
    assert_eq!(outcome, WaitOutcome::Stopped(Signal::SIGSTOP as i32));
    assert_eq!(outcome.raw(), Some(((Signal::SIGSTOP as i32) << 8) | 0x7f));
    assert_eq!(opr.status(), ProcessStatus::Paused);
    assert_eq!(opr.pid(), Some(pid));

    opr.resume().unwrap();
    assert_eq!(opr.wait_blocking().unwrap(), WaitOutcome::Continued);
    assert_eq!(opr.status(), ProcessStatus::Running);

    opr.exit().unwrap();
    assert!(opr.wait_blocking().unwrap().is_terminated());
    assert_eq!(opr.pid(), None);
}

#[test]
fn test_illegal_transitions_leave_status() {
    let mut opr = sleeper();

    assert!(opr.suspend().is_err());
    assert!(opr.resume().is_err());
    assert!(opr.exit().is_err());
    assert_eq!(opr.status(), ProcessStatus::Stopped);

    opr.start().unwrap();
    assert!(opr.resume().is_err());
    assert_eq!(opr.status(), ProcessStatus::Running);

    opr.suspend().unwrap();
    let result = opr.suspend();
    assert_eq!(classify(&result), ErrorClass::GenericFailure);
    assert_eq!(opr.status(), ProcessStatus::Paused);

    opr.exit().unwrap();
    assert!(opr.exit().is_err());
    opr.wait_blocking().unwrap();
}

#[test]
fn test_missing_program_fails_cleanly() {
    let mut opr = ProcessOperator::native();
    opr.set_argv(["/nonexistent/os-operator/missing-binary"]);

    let err = opr.start().unwrap_err();
    assert_eq!(err.os_error().map(|e| e.errno()), Some(Errno::ENOENT));
    assert_eq!(opr.status(), ProcessStatus::Stopped);
    assert_eq!(opr.pid(), None);
}

#[test]
fn test_natural_exit_code() {
    let file = script("exit 7");
    let mut opr = ProcessOperator::native();
    opr.set_argv(["/bin/sh".to_string(), file.path().display().to_string()]);

    opr.start().unwrap();
    let outcome = opr.wait_blocking().unwrap();
    assert_eq!(outcome, WaitOutcome::Exited(7));
    assert_eq!(outcome.raw(), Some(7 << 8));
    assert_eq!(opr.status(), ProcessStatus::Stopped);

    // Stopped again, so it can be restarted
    opr.start().unwrap();
    assert_eq!(opr.wait_blocking().unwrap().exit_code(), Some(7));
}

#[test]
fn test_exec_config_environment() {
    let file = script("exit \"$OS_OPERATOR_CODE\"");
    let exec = ExecConfig::new(["/bin/sh".to_string(), file.path().display().to_string()])
        .with_env(vec![("OS_OPERATOR_CODE".to_string(), "5".to_string())])
        .with_working_dir(std::env::temp_dir());

    let mut opr = ProcessOperator::with_exec(UnixProcessBackend::new(), exec);
    opr.start().unwrap();
    assert_eq!(opr.wait_blocking().unwrap(), WaitOutcome::Exited(5));
}

#[test]
fn test_non_blocking_wait_polls() {
    let mut opr = sleeper();
    opr.start().unwrap();

    let started = Instant::now();
    assert_eq!(opr.wait_non_blocking().unwrap(), WaitOutcome::StillAlive);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(opr.status(), ProcessStatus::Running);

    opr.exit().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let outcome = opr.wait_non_blocking().unwrap();
        if outcome.is_terminated() {
            break;
        }
        assert!(Instant::now() < deadline, "child was never reaped");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(opr.pid(), None);
}

#[test]
fn test_wait_without_child_is_null_reference() {
    let mut opr = sleeper();
    let result = opr.wait_blocking();
    assert_eq!(classify(&result), ErrorClass::NullReference);
}

#[test]
fn test_drop_terminates_and_reaps() {
    let pid = {
        let mut opr = sleeper();
        opr.start().unwrap();
        opr.suspend().unwrap();
        opr.pid().unwrap()
    };
    assert_eq!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH));
}

#[test]
fn test_drop_detach_leaves_orphan() {
    let pid = {
        let mut opr = sleeper().with_drop_policy(DropPolicy::Detach);
        opr.start().unwrap();
        opr.pid().unwrap()
    };
    assert!(kill(Pid::from_raw(pid), None).is_ok());

    // Clean up the orphan by hand
    let backend = UnixProcessBackend::new();
    backend.signal(pid, ControlSignal::Kill).unwrap();
    assert!(backend.wait(pid, WaitMode::Blocking).unwrap().is_terminated());
}

#[test]
fn test_info_serializes() {
    let mut opr = sleeper();
    opr.start().unwrap();

    let json = serde_json::to_value(opr.info()).unwrap();
    assert_eq!(json["status"], "running");
    assert_eq!(json["platform"], "unix");
    assert_eq!(json["argv"][0], "sleep");
    assert_eq!(json["pid"], opr.pid().unwrap());
}
