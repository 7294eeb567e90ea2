/*!
 * Process State Machine Tests
 * Random operation sequences against the simulation backend
 */

use os_operator::process::*;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Suspend,
    Resume,
    Exit,
    WaitNonBlocking,
    WaitBlocking,
    ChildExits,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Suspend),
        Just(Op::Resume),
        Just(Op::Exit),
        Just(Op::WaitNonBlocking),
        Just(Op::WaitBlocking),
        Just(Op::ChildExits),
    ]
}

/// Expected status after `op`, or `None` when the operator must reject it
fn expected(status: ProcessStatus, op: Op) -> Option<ProcessStatus> {
    use ProcessStatus::*;
    match (op, status) {
        (Op::Start, Stopped) => Some(Running),
        (Op::Suspend, Running) => Some(Paused),
        (Op::Resume, Paused) => Some(Running),
        (Op::Exit, Running | Paused) => Some(Stopped),
        _ => None,
    }
}

proptest! {
    #[test]
    fn transitions_follow_table(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let backend = SimulationProcessBackend::new();
        let mut opr = ProcessOperator::new(backend.clone());
        opr.set_argv(["/usr/bin/worker"]);

        for op in ops {
            let before = opr.status();
            match op {
                Op::Start | Op::Suspend | Op::Resume | Op::Exit => {
                    let result = match op {
                        Op::Start => opr.start(),
                        Op::Suspend => opr.suspend(),
                        Op::Resume => opr.resume(),
                        _ => opr.exit(),
                    };
                    match expected(before, op) {
                        Some(after) => {
                            prop_assert!(result.is_ok(), "{:?} from {:?} failed: {:?}", op, before, result);
                            prop_assert_eq!(opr.status(), after);
                        }
                        None => {
                            prop_assert!(result.is_err(), "{:?} from {:?} succeeded", op, before);
                            prop_assert_eq!(opr.status(), before);
                        }
                    }
                }
                Op::WaitNonBlocking | Op::WaitBlocking => {
                    let had_pid = opr.pid().is_some();
                    let result = if matches!(op, Op::WaitBlocking) {
                        opr.wait_blocking()
                    } else {
                        opr.wait_non_blocking()
                    };
                    prop_assert_eq!(result.is_ok(), had_pid);
                    if let Ok(outcome) = result {
                        if outcome.is_terminated() {
                            prop_assert_eq!(opr.status(), ProcessStatus::Stopped);
                            prop_assert_eq!(opr.pid(), None);
                        } else {
                            prop_assert_eq!(opr.status(), before);
                        }
                    }
                }
                Op::ChildExits => {
                    if let Some(pid) = opr.pid() {
                        backend.exit_child(pid, 0);
                    }
                    prop_assert_eq!(opr.status(), before);
                }
            }

            // A live status always comes with a pid
            if opr.status() != ProcessStatus::Stopped {
                prop_assert!(opr.pid().is_some());
            }
        }
    }

    #[test]
    fn signal_failures_never_advance(start_paused in any::<bool>()) {
        let backend = SimulationProcessBackend::new();
        let mut opr = ProcessOperator::new(backend.clone());
        opr.set_argv(["/usr/bin/worker"]);
        opr.start().unwrap();
        if start_paused {
            opr.suspend().unwrap();
        }
        let before = opr.status();

        backend.fail(SimulatedCall::Signal);
        prop_assert!(opr.suspend().is_err());
        prop_assert!(opr.resume().is_err());
        prop_assert!(opr.exit().is_err());
        prop_assert_eq!(opr.status(), before);
    }
}
