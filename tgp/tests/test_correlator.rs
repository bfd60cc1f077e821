use std::sync::Arc;
use std::thread;

use tgp::correlator::{CallingContextCorrelator, ExecutionCase, GranularityCorrelator};
use tgp::domain::{IdentityHash, TaskId, TaskRef, ThreadInfo};
use tgp::profile::{ExecutorInfo, GranularityCreation, GranularityExecution, GranularitySubmission};
use tgp_common::{ExecMethod, TaskKind};

#[derive(Debug, Clone, Copy)]
enum Event {
    Create,
    Submit,
    Execute,
}

const ALL_ORDERS: [[Event; 3]; 6] = [
    [Event::Create, Event::Submit, Event::Execute],
    [Event::Create, Event::Execute, Event::Submit],
    [Event::Submit, Event::Create, Event::Execute],
    [Event::Submit, Event::Execute, Event::Create],
    [Event::Execute, Event::Create, Event::Submit],
    [Event::Execute, Event::Submit, Event::Create],
];

fn task(id: u64) -> Option<TaskRef<'static>> {
    Some(TaskRef::new(TaskId(id), IdentityHash(7000 + i32::try_from(id).unwrap()), "app.Job"))
}

fn thread(name: &str) -> ThreadInfo {
    ThreadInfo { id: 3, name: name.to_string(), class: "Thread".to_string() }
}

fn creation() -> GranularityCreation {
    GranularityCreation { thread: Some(thread("main")), kind: TaskKind::Runnable, is_thread: false }
}

fn submission() -> GranularitySubmission {
    GranularitySubmission { executor: ExecutorInfo { id: 4, class: "Pool".to_string() }, is_thread: false }
}

fn execution(granularity: i64) -> GranularityExecution {
    GranularityExecution {
        thread: Some(thread("worker")),
        outer_task: IdentityHash::NONE,
        granularity,
        method: ExecMethod::Run,
        entry_time: 1_000,
        exit_time: 1_000 + granularity,
        is_thread: false,
    }
}

fn send(c: &GranularityCorrelator, id: u64, event: Event) {
    match event {
        Event::Create => {
            c.on_create(task(id), creation());
        }
        Event::Submit => {
            c.on_submit(task(id), submission());
        }
        Event::Execute => {
            c.on_execute(task(id), execution(250));
        }
    }
}

#[test]
fn test_every_arrival_order_yields_one_complete_profile() {
    for (i, order) in ALL_ORDERS.iter().enumerate() {
        let c = GranularityCorrelator::default();
        let id = i as u64 + 1;
        for event in order {
            send(&c, id, *event);
        }

        assert_eq!(c.store().count(TaskId(id)), Some(1), "order {order:?}");
        let p = c.store().get(TaskId(id), 1).unwrap().lock().clone();
        assert_eq!(p.exec_number.get(), 1);
        assert_eq!(p.id, IdentityHash(7000 + i32::try_from(id).unwrap()));
        assert_eq!(p.class_name, "app.Job");
        assert_eq!(p.mode.creation_thread.as_ref().map(|t| t.name.as_str()), Some("main"), "order {order:?}");
        assert!(p.mode.is_runnable, "order {order:?}");
        assert_eq!(p.mode.executor.as_ref().map(|e| e.id), Some(4), "order {order:?}");
        assert_eq!(p.mode.execution_thread.as_ref().map(|t| t.name.as_str()), Some("worker"));
        assert_eq!(p.mode.granularity, 250, "order {order:?}");
        assert!(p.mode.is_run_executed);
    }
}

#[test]
fn test_k_executions_yield_k_profiles_with_creation_data() {
    let c = GranularityCorrelator::default();
    c.on_create(task(1), creation());
    c.on_submit(task(1), submission());

    let cases: Vec<ExecutionCase> =
        (1..=4).map(|n| c.on_execute_case(task(1), execution(n * 10)).unwrap().1).collect();
    assert_eq!(
        cases,
        [
            ExecutionCase::FirstExecution,
            ExecutionCase::ReExecution,
            ExecutionCase::ReExecution,
            ExecutionCase::ReExecution
        ]
    );

    assert_eq!(c.store().count(TaskId(1)), Some(4));
    for ordinal in 1..=4u32 {
        let p = c.store().get(TaskId(1), ordinal).unwrap().lock().clone();
        assert_eq!(p.exec_number.get(), ordinal);
        assert_eq!(p.mode.granularity, i64::from(ordinal) * 10);
        assert_eq!(p.mode.creation_thread.as_ref().map(|t| t.name.as_str()), Some("main"));
        assert!(p.mode.is_runnable);
        // Submission data belongs to the first execution only
        assert_eq!(p.mode.executor.is_some(), ordinal == 1);
    }
}

#[test]
fn test_sentinel_execution_is_treated_as_not_executed() {
    let c = GranularityCorrelator::default();
    let mut sentinel = execution(0);
    sentinel.entry_time = -1;
    sentinel.exit_time = -1;

    let (_, first) = c.on_execute_case(task(9), sentinel).unwrap();
    assert_eq!(first, ExecutionCase::Fresh);
    let (_, second) = c.on_execute_case(task(9), execution(5)).unwrap();
    assert_eq!(second, ExecutionCase::FirstExecution, "sentinel values read as no execution");
    assert_eq!(c.store().count(TaskId(9)), Some(1));
}

#[test]
fn test_concurrent_events_for_one_task_never_duplicate_ordinals() {
    let c = Arc::new(CallingContextCorrelator::default());

    thread::scope(|s| {
        for t in 0..8 {
            let c = Arc::clone(&c);
            s.spawn(move || {
                for n in 0..25 {
                    c.on_execute(task(1), format!("t{t}-{n}!"));
                    c.on_submit(task(1), format!("submit-{t}!"));
                }
            });
        }
    });

    let profiles = c.drain_all_profiles();
    assert_eq!(profiles.len(), 200);
    let ordinals: Vec<u32> = profiles.iter().map(|p| p.exec_number.get()).collect();
    assert_eq!(ordinals, (1..=200).collect::<Vec<_>>());
    assert!(profiles.iter().all(|p| p.mode.cc_exec.is_some()));
}

#[test]
fn test_concurrent_tasks_are_independent() {
    let c = Arc::new(GranularityCorrelator::default());

    thread::scope(|s| {
        for t in 0..8u64 {
            let c = Arc::clone(&c);
            s.spawn(move || {
                for n in 0..50u64 {
                    let id = t * 1000 + n;
                    c.on_create(task(id), creation());
                    c.on_execute(task(id), execution(1));
                    c.on_submit(task(id), submission());
                }
            });
        }
    });

    assert_eq!(c.store().len(), 400);
    let profiles = c.drain_all_profiles();
    assert!(profiles.iter().all(|p| p.exec_number.get() == 1 && p.mode.executor.is_some()));
    assert_eq!(c.stats().recorded, 1200);
    assert!(c.store().is_empty());
}
