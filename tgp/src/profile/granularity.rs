//! Granularity profiles
//!
//! Records where a task was created, which executor it was handed to, and
//! for each execution: the executing thread, the enclosing (outer) task, the
//! entry/exit timestamps and the self cost exclusive of nested tasks.

use serde::{Deserialize, Serialize};
use tgp_common::{ExecMethod, TaskKind, UNSET_GRANULARITY, UNSET_ID, UNSET_TIME};

use super::record::{opt_column, ProfileMode, ProfileRecord};
use crate::domain::{IdentityHash, ThreadInfo};

/// Executor a task was submitted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    pub id: i32,
    pub class: String,
}

/// Payload of a creation event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularityCreation {
    /// Creating thread, if the site could observe it
    pub thread: Option<ThreadInfo>,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub is_thread: bool,
}

/// Payload of a submission event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularitySubmission {
    pub executor: ExecutorInfo,
    #[serde(default)]
    pub is_thread: bool,
}

/// Payload of an execution event
///
/// `granularity`, `outer_task` and the timestamps come from the nesting
/// accountant's exit step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularityExecution {
    pub thread: Option<ThreadInfo>,
    pub outer_task: IdentityHash,
    pub granularity: i64,
    #[serde(default)]
    pub method: ExecMethod,
    pub entry_time: i64,
    pub exit_time: i64,
    #[serde(default)]
    pub is_thread: bool,
}

/// Granularity-mode fields of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GranularityProfile {
    pub outer_task: IdentityHash,
    pub creation_thread: Option<ThreadInfo>,
    pub execution_thread: Option<ThreadInfo>,
    pub executor: Option<ExecutorInfo>,
    pub entry_execution_time: i64,
    pub exit_execution_time: i64,
    pub granularity: i64,
    pub is_thread: bool,
    pub is_runnable: bool,
    pub is_callable: bool,
    pub is_fork_join_task: bool,
    pub is_run_executed: bool,
    pub is_call_executed: bool,
    pub is_exec_executed: bool,
}

impl Default for GranularityProfile {
    fn default() -> Self {
        Self {
            outer_task: IdentityHash(UNSET_ID),
            creation_thread: None,
            execution_thread: None,
            executor: None,
            entry_execution_time: UNSET_TIME,
            exit_execution_time: UNSET_TIME,
            granularity: UNSET_GRANULARITY,
            is_thread: false,
            is_runnable: false,
            is_callable: false,
            is_fork_join_task: false,
            is_run_executed: false,
            is_call_executed: false,
            is_exec_executed: false,
        }
    }
}

const HEADER: &[&str] = &[
    "ID",
    "Class",
    "Outer Task ID",
    "Execution N.",
    "Creation thread ID",
    "Creation thread class",
    "Creation thread name",
    "Execution thread ID",
    "Execution thread class",
    "Execution thread name",
    "Executor ID",
    "Executor class",
    "Entry execution time",
    "Exit execution time",
    "Granularity",
    "Is Thread",
    "Is Runnable",
    "Is Callable",
    "Is ForkJoinTask",
    "Is run() executed",
    "Is call() executed",
    "Is exec() executed",
];

fn tof(b: bool) -> String {
    let flag = if b { "T" } else { "F" };
    flag.to_string()
}

fn thread_columns(thread: Option<&ThreadInfo>) -> [String; 3] {
    match thread {
        Some(t) => [t.id.to_string(), t.class.clone(), t.name.clone()],
        None => [UNSET_ID.to_string(), opt_column(None), opt_column(None)],
    }
}

impl ProfileMode for GranularityProfile {
    const NAME: &'static str = "granularity";

    type Creation = GranularityCreation;
    type Submission = GranularitySubmission;
    type Execution = GranularityExecution;

    fn apply_creation(&mut self, payload: GranularityCreation) {
        if let Some(thread) = payload.thread {
            self.creation_thread = Some(thread);
        }
        self.is_thread = payload.is_thread;
        match payload.kind {
            TaskKind::Runnable => self.is_runnable = true,
            TaskKind::Callable => self.is_callable = true,
            TaskKind::ForkJoin => self.is_fork_join_task = true,
            TaskKind::Unknown => {}
        }
    }

    fn apply_submission(&mut self, payload: GranularitySubmission) {
        self.is_thread = payload.is_thread;
        self.executor = Some(payload.executor);
    }

    fn apply_execution(&mut self, payload: GranularityExecution) {
        if let Some(thread) = payload.thread {
            self.execution_thread = Some(thread);
        }
        self.outer_task = payload.outer_task;
        self.granularity = payload.granularity;
        self.is_thread = payload.is_thread;
        match payload.method {
            ExecMethod::Run => self.is_run_executed = true,
            ExecMethod::Call => self.is_call_executed = true,
            ExecMethod::Exec => self.is_exec_executed = true,
            ExecMethod::Other => {}
        }
        self.entry_execution_time = payload.entry_time;
        self.exit_execution_time = payload.exit_time;
    }

    /// Sentinel test: all three execution fields still unset means "not
    /// executed". A genuine execution measured at entry -1, exit -1 with zero
    /// cost is indistinguishable from no execution.
    fn has_execution(&self) -> bool {
        !(self.entry_execution_time == UNSET_TIME
            && self.exit_execution_time == UNSET_TIME
            && self.granularity == UNSET_GRANULARITY)
    }

    fn clone_identity(&self) -> Self {
        Self {
            creation_thread: self.creation_thread.clone(),
            is_thread: self.is_thread,
            is_runnable: self.is_runnable,
            is_callable: self.is_callable,
            is_fork_join_task: self.is_fork_join_task,
            ..Self::default()
        }
    }

    fn header() -> &'static [&'static str] {
        HEADER
    }

    fn row(record: &ProfileRecord<Self>) -> Vec<String> {
        let p = &record.mode;
        let [creation_id, creation_class, creation_name] =
            thread_columns(p.creation_thread.as_ref());
        let [execution_id, execution_class, execution_name] =
            thread_columns(p.execution_thread.as_ref());
        let (executor_id, executor_class) = match &p.executor {
            Some(e) => (e.id.to_string(), e.class.clone()),
            None => (UNSET_ID.to_string(), opt_column(None)),
        };

        vec![
            record.id.to_string(),
            record.class_name.clone(),
            p.outer_task.to_string(),
            record.exec_number.get().to_string(),
            creation_id,
            creation_class,
            creation_name,
            execution_id,
            execution_class,
            execution_name,
            executor_id,
            executor_class,
            p.entry_execution_time.to_string(),
            p.exit_execution_time.to_string(),
            p.granularity.to_string(),
            tof(p.is_thread),
            tof(p.is_runnable),
            tof(p.is_callable),
            tof(p.is_fork_join_task),
            tof(p.is_run_executed),
            tof(p.is_call_executed),
            tof(p.is_exec_executed),
        ]
    }
}
