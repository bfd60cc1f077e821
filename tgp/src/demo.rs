//! Synthetic instrumented workload
//!
//! ```text
//!  main thread                      worker pool (crossbeam channel)
//!  ───────────                      ─────────────────────────────────
//!  create Job#n ──submit──▶ [ch] ──▶ tgp-worker-k: run Job#n
//!                                        ├─ create + run Leaf (nested)
//!                                        └─ run Job#n again (rerun)
//! ```
//!
//! Every third job is executed `reruns` extra times on the same task id, and
//! every other job runs leaf tasks nested inside its own execution. The
//! resulting profiles exercise all three execution cases and the nesting
//! accountant.

use crossbeam_channel::bounded;
use log::{debug, info};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tgp_common::{ExecMethod, TaskKind};

use crate::correlator::CallingContextCorrelator;
use crate::domain::{IdentityHash, TaskId, TaskRef};
use crate::instrument::Instrumenter;
use crate::nesting::{current_context, enter_method};
use crate::profile::ExecutorInfo;

const JOB_CLASS: &str = "demo::Job";
const LEAF_CLASS: &str = "demo::Leaf";
const POOL_CLASS: &str = "demo::WorkerPool";
const JOB_WORK: u64 = 20_000;
const LEAF_WORK: u64 = 5_000;
const CHANNEL_CAPACITY: usize = 1000;

/// Where the workload reports its task lifecycle
pub trait Tracer: Sync {
    fn created(&self, task: TaskRef<'_>, kind: TaskKind);

    fn submitted(&self, task: TaskRef<'_>, executor: &ExecutorInfo);

    /// Run `body` as one execution of `task`
    fn executed(&self, task: TaskRef<'_>, method: ExecMethod, body: &mut dyn FnMut());
}

impl Tracer for Instrumenter {
    fn created(&self, task: TaskRef<'_>, kind: TaskKind) {
        Instrumenter::created(self, task, kind);
    }

    fn submitted(&self, task: TaskRef<'_>, executor: &ExecutorInfo) {
        Instrumenter::submitted(self, task, executor.clone());
    }

    fn executed(&self, task: TaskRef<'_>, method: ExecMethod, body: &mut dyn FnMut()) {
        self.run(task, method, body);
    }
}

/// Calling-context tracer: renders this thread's method stack at each event
pub struct ContextTracer {
    correlator: Arc<CallingContextCorrelator>,
}

impl ContextTracer {
    #[must_use]
    pub fn new(correlator: Arc<CallingContextCorrelator>) -> Self {
        Self { correlator }
    }
}

impl Tracer for ContextTracer {
    fn created(&self, task: TaskRef<'_>, _kind: TaskKind) {
        let _frame = enter_method(format!("{}.<init>", task.class_name));
        self.correlator.on_create(Some(task), current_context());
    }

    fn submitted(&self, task: TaskRef<'_>, executor: &ExecutorInfo) {
        let _frame = enter_method(format!("{}.submit", executor.class));
        self.correlator.on_submit(Some(task), current_context());
    }

    fn executed(&self, task: TaskRef<'_>, method: ExecMethod, body: &mut dyn FnMut()) {
        let _frame = enter_method(format!("{}.{}", task.class_name, method.name()));
        let context = current_context();
        body();
        self.correlator.on_execute(Some(task), context);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoOptions {
    pub workers: usize,
    pub tasks: usize,
    /// Extra executions of every third job
    pub reruns: u32,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self { workers: 4, tasks: 32, reruns: 1 }
    }
}

/// What the workload did, for comparison with the drained profiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoReport {
    pub tasks_created: u64,
    pub executions: u64,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    id: TaskId,
    hash: IdentityHash,
    class: &'static str,
    children: u32,
    runs: u32,
}

impl Job {
    fn task_ref(&self) -> TaskRef<'static> {
        TaskRef::new(self.id, self.hash, self.class)
    }
}

#[derive(Default)]
struct Counters {
    next_id: AtomicU64,
    created: AtomicU64,
    executions: AtomicU64,
}

impl Counters {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn new_job(&self, class: &'static str, children: u32, runs: u32) -> Job {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        // Scramble like an identity hash, keep it positive and non-zero
        let hash = ((raw.wrapping_mul(0x9E37_79B9) & 0x7fff_ffff) as i32).max(1);
        Job { id: TaskId(raw), hash: IdentityHash(hash), class, children, runs }
    }
}

fn spin(units: u64) {
    let mut acc = 0u64;
    for i in 0..units {
        acc = black_box(acc.wrapping_mul(31).wrapping_add(i));
    }
    black_box(acc);
}

fn execute<P: Tracer + ?Sized>(tracer: &P, counters: &Counters, job: &Job) {
    for _ in 0..job.runs {
        counters.executions.fetch_add(1, Ordering::Relaxed);
        tracer.executed(job.task_ref(), ExecMethod::Run, &mut || {
            spin(JOB_WORK);
            for _ in 0..job.children {
                let leaf = counters.new_job(LEAF_CLASS, 0, 1);
                counters.created.fetch_add(1, Ordering::Relaxed);
                tracer.created(leaf.task_ref(), TaskKind::Callable);
                counters.executions.fetch_add(1, Ordering::Relaxed);
                tracer.executed(leaf.task_ref(), ExecMethod::Call, &mut || spin(LEAF_WORK));
            }
            spin(JOB_WORK);
        });
    }
}

/// Run the workload to completion
///
/// # Errors
/// Returns an error if a worker thread cannot be spawned.
pub fn run<P: Tracer + ?Sized>(tracer: &P, options: DemoOptions) -> std::io::Result<DemoReport> {
    let counters = Counters::default();
    let executor = ExecutorInfo { id: 1, class: POOL_CLASS.to_string() };
    let (tx, rx) = bounded::<Job>(CHANNEL_CAPACITY);
    let workers = options.workers.max(1);

    info!("Running demo: {} tasks on {workers} workers", options.tasks);

    std::thread::scope(|scope| -> std::io::Result<()> {
        for k in 0..workers {
            let rx = rx.clone();
            let counters = &counters;
            let spawned = std::thread::Builder::new().name(format!("tgp-worker-{k}")).spawn_scoped(
                scope,
                move || {
                    let _frame = enter_method(format!("{POOL_CLASS}.worker"));
                    for job in rx.iter() {
                        execute(tracer, counters, &job);
                    }
                    debug!("Worker {k} finished");
                },
            );
            if let Err(e) = spawned {
                // Closing the channel lets the workers already spawned exit
                drop(tx);
                return Err(e);
            }
        }
        drop(rx);

        let _main = enter_method("main");
        for n in 0..options.tasks {
            let children = if n % 2 == 0 { 2 } else { 0 };
            let runs = if n % 3 == 0 { 1 + options.reruns } else { 1 };
            let job = counters.new_job(JOB_CLASS, children, runs);
            counters.created.fetch_add(1, Ordering::Relaxed);
            tracer.created(job.task_ref(), TaskKind::Runnable);
            tracer.submitted(job.task_ref(), &executor);
            if tx.send(job).is_err() {
                break;
            }
        }
        drop(tx);
        Ok(())
    })?;

    let report = DemoReport {
        tasks_created: counters.created.load(Ordering::Relaxed),
        executions: counters.executions.load(Ordering::Relaxed),
    };
    info!("Demo finished: {} tasks, {} executions", report.tasks_created, report.executions);
    Ok(report)
}
