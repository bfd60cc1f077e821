//! Instrumentation helper for granularity profiling
//!
//! Ties the thread-local nesting accountant to a [`GranularityCorrelator`]:
//!
//! ```text
//!   created()    ──▶ on_create   (creating thread, task kind)
//!   submitted()  ──▶ on_submit   (executor)
//!   begin()      ──▶ enter_execution
//!     ...task body, possibly running nested tasks...
//!   drop/finish  ──▶ exit_execution ──▶ on_execute (self cost, outer task)
//! ```
//!
//! A [`TaskScope`] must stay on the thread that began it.

use std::sync::Arc;

use tgp_common::{ExecMethod, TaskKind};

use crate::correlator::GranularityCorrelator;
use crate::domain::{ProfileKey, TaskRef, ThreadInfo};
use crate::nesting::{self, ExecutionSample, FrameToken};
use crate::profile::{ExecutorInfo, GranularityCreation, GranularityExecution, GranularitySubmission};

/// Entry point used by instrumentation sites
#[derive(Clone)]
pub struct Instrumenter {
    correlator: Arc<GranularityCorrelator>,
}

impl Instrumenter {
    #[must_use]
    pub fn new(correlator: Arc<GranularityCorrelator>) -> Self {
        Self { correlator }
    }

    #[must_use]
    pub fn correlator(&self) -> &Arc<GranularityCorrelator> {
        &self.correlator
    }

    fn enabled(&self) -> bool {
        self.correlator.toggle().is_enabled()
    }

    /// Report that `task` was constructed on the calling thread
    pub fn created(&self, task: TaskRef<'_>, kind: TaskKind) -> Option<ProfileKey> {
        if !self.enabled() {
            return None;
        }
        let payload = GranularityCreation {
            thread: Some(ThreadInfo::current()),
            kind,
            is_thread: task.is_thread,
        };
        self.correlator.on_create(Some(task), payload)
    }

    /// Report that `task` was handed to `executor`
    pub fn submitted(&self, task: TaskRef<'_>, executor: ExecutorInfo) -> Option<ProfileKey> {
        if !self.enabled() {
            return None;
        }
        let payload = GranularitySubmission { executor, is_thread: task.is_thread };
        self.correlator.on_submit(Some(task), payload)
    }

    /// Start measuring an execution of `task` on the calling thread
    ///
    /// While profiling is disabled the scope is inert and reports nothing.
    pub fn begin<'a>(&'a self, task: TaskRef<'a>, method: ExecMethod) -> TaskScope<'a> {
        let token = self
            .enabled()
            .then(|| nesting::enter_execution(task.id, task.identity_hash));
        TaskScope { instrumenter: self, task, method, token }
    }

    /// Run `body` as one execution of `task`
    pub fn run<R>(&self, task: TaskRef<'_>, method: ExecMethod, body: impl FnOnce() -> R) -> R {
        let scope = self.begin(task, method);
        let result = body();
        scope.finish();
        result
    }
}

/// One open execution; reported when finished or dropped
#[must_use = "the execution is measured until the scope is finished or dropped"]
pub struct TaskScope<'a> {
    instrumenter: &'a Instrumenter,
    task: TaskRef<'a>,
    method: ExecMethod,
    token: Option<FrameToken>,
}

impl TaskScope<'_> {
    /// Nesting depth of this execution on its thread, 0 when inert
    #[must_use]
    pub fn depth(&self) -> usize {
        self.token.as_ref().map_or(0, FrameToken::depth)
    }

    /// End the execution and report it
    ///
    /// Returns `None` for inert scopes and for re-entries of a task that is
    /// already executing directly beneath this scope.
    pub fn finish(mut self) -> Option<ProfileKey> {
        self.complete()
    }

    fn complete(&mut self) -> Option<ProfileKey> {
        let token = self.token.take()?;
        let sample = nesting::exit_execution(token)?;
        let payload = execution_payload(&sample, self.method, self.task.is_thread);
        self.instrumenter.correlator.on_execute(Some(self.task), payload)
    }
}

impl Drop for TaskScope<'_> {
    fn drop(&mut self) {
        let _ = self.complete();
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn execution_payload(
    sample: &ExecutionSample,
    method: ExecMethod,
    is_thread: bool,
) -> GranularityExecution {
    GranularityExecution {
        thread: Some(ThreadInfo::current()),
        outer_task: sample.outer_hash(),
        granularity: saturating_i64(sample.self_cost),
        method,
        entry_time: saturating_i64(sample.entry_time_ns),
        exit_time: saturating_i64(sample.exit_time_ns),
        is_thread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdentityHash, TaskId};

    fn job(id: u64) -> TaskRef<'static> {
        TaskRef::new(TaskId(id), IdentityHash(500 + i32::try_from(id).unwrap()), "demo::Job")
    }

    fn instrumenter() -> Instrumenter {
        Instrumenter::new(Arc::new(GranularityCorrelator::default()))
    }

    #[test]
    fn test_full_lifecycle_fills_one_profile() {
        let inst = instrumenter();
        inst.created(job(1), TaskKind::Runnable);
        inst.submitted(job(1), ExecutorInfo { id: 9, class: "Pool".to_string() });
        let answer = inst.run(job(1), ExecMethod::Run, || 42);
        assert_eq!(answer, 42);

        let store = inst.correlator().store();
        assert_eq!(store.count(TaskId(1)), Some(1));
        let profile = store.get(TaskId(1), 1).unwrap().lock().clone();
        assert!(profile.has_execution());
        assert!(profile.mode.is_runnable);
        assert!(profile.mode.is_run_executed);
        assert_eq!(profile.mode.executor.as_ref().map(|e| e.id), Some(9));
        assert_eq!(profile.mode.outer_task, IdentityHash::NONE);
        assert!(profile.mode.exit_execution_time >= profile.mode.entry_execution_time);
    }

    #[test]
    fn test_thread_task_is_flagged_on_every_profile() {
        let inst = instrumenter();
        let worker = TaskRef::thread(TaskId(6), IdentityHash(606), "app.WorkerThread");
        inst.created(worker, TaskKind::Runnable);
        inst.submitted(worker, ExecutorInfo { id: 1, class: "Starter".to_string() });
        inst.run(worker, ExecMethod::Run, || ());
        inst.run(worker, ExecMethod::Run, || ());

        let store = inst.correlator().store();
        assert_eq!(store.count(TaskId(6)), Some(2));
        for ordinal in 1..=2 {
            let profile = store.get(TaskId(6), ordinal).unwrap().lock().clone();
            assert!(profile.mode.is_thread, "profile {ordinal}");
            assert!(profile.mode.is_runnable, "profile {ordinal}");
            assert_eq!(profile.to_row()[15], "T", "Is Thread column of profile {ordinal}");
        }
    }

    #[test]
    fn test_plain_task_is_not_a_thread() {
        let inst = instrumenter();
        inst.created(job(7), TaskKind::Runnable);
        inst.run(job(7), ExecMethod::Run, || ());
        let profile = inst.correlator().store().get(TaskId(7), 1).unwrap().lock().clone();
        assert!(!profile.mode.is_thread);
        assert_eq!(profile.to_row()[15], "F");
    }

    #[test]
    fn test_nested_scope_reports_outer_task() {
        let inst = instrumenter();
        let outer = inst.begin(job(2), ExecMethod::Run);
        assert_eq!(outer.depth(), 1);
        let inner = inst.begin(job(3), ExecMethod::Call);
        assert_eq!(inner.depth(), 2);
        assert!(inner.finish().is_some());
        assert!(outer.finish().is_some());

        let store = inst.correlator().store();
        let inner = store.get(TaskId(3), 1).unwrap().lock().clone();
        assert_eq!(inner.mode.outer_task, IdentityHash(502));
        assert!(inner.mode.is_call_executed);
        let outer = store.get(TaskId(2), 1).unwrap().lock().clone();
        assert_eq!(outer.mode.outer_task, IdentityHash::NONE);
    }

    #[test]
    fn test_drop_reports_execution() {
        let inst = instrumenter();
        {
            let _scope = inst.begin(job(4), ExecMethod::Exec);
        }
        assert_eq!(inst.correlator().store().count(TaskId(4)), Some(1));
    }

    #[test]
    fn test_disabled_scope_is_inert() {
        let inst = instrumenter();
        inst.correlator().toggle().disable();
        let scope = inst.begin(job(5), ExecMethod::Run);
        assert_eq!(scope.depth(), 0);
        assert!(scope.finish().is_none());
        assert!(inst.created(job(5), TaskKind::Callable).is_none());
        assert!(inst.correlator().store().is_empty());
        assert_eq!(nesting::execution_depth(), 0);
    }
}
