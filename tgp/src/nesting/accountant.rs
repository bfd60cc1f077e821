//! Per-thread nesting accountant
//!
//! Attributes measured cost only to the innermost executing task. Each
//! entry pushes a [`NestingFrame`]; each exit pops it and computes
//!
//! ```text
//! self = cost_now - entry_cost - (nested_now - nested_at_entry)
//! ```
//!
//! where `nested` is the running total of self costs reported by nested
//! executions on this thread. A nested exit adds its self cost to `nested`
//! so the caller subtracts it; the outermost exit resets `nested` to 0.
//! The self costs of a task and all its transitively nested tasks therefore
//! sum to the cost elapsed across the outermost execution.
//!
//! Callers must pair every entry with exactly one exit, innermost first.
//! An unbalanced exit is a bug at the call site and is not repaired here.

use log::debug;
use std::marker::PhantomData;

use super::cost::{now_ns, CostCounter, CostSource};
use crate::domain::{IdentityHash, TaskId};

/// A task executing on this thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutingTask {
    pub id: TaskId,
    pub hash: IdentityHash,
}

/// State saved when an execution begins
#[derive(Debug, Clone, Copy)]
pub struct NestingFrame {
    pub task: ExecutingTask,
    /// Task that was executing on this thread right before this one
    pub previous: Option<ExecutingTask>,
    pub nested_at_entry: u64,
    pub entry_cost: u64,
    pub entry_time_ns: u64,
}

/// Result of one execution exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSample {
    pub task: ExecutingTask,
    /// Enclosing task, `None` for the outermost execution on the thread
    pub outer: Option<ExecutingTask>,
    /// Cost exclusive of nested task executions
    pub self_cost: u64,
    pub entry_time_ns: u64,
    pub exit_time_ns: u64,
}

impl ExecutionSample {
    /// Identity hash of the enclosing task, [`IdentityHash::NONE`] if top level
    #[must_use]
    pub fn outer_hash(&self) -> IdentityHash {
        self.outer.map_or(IdentityHash::NONE, |t| t.hash)
    }
}

/// Handle returned by [`NestingStack::enter`], consumed by
/// [`NestingStack::exit`]
///
/// Not `Send`: a frame must be exited on the thread that entered it.
#[derive(Debug)]
#[must_use = "an execution entered must be exited with the returned token"]
pub struct FrameToken {
    depth: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl FrameToken {
    /// Stack depth after the matching entry (1 for the outermost task)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Growable nesting stack owned by one thread
pub struct NestingStack<S: CostSource> {
    source: S,
    counter: Option<S::Counter>,
    frames: Vec<NestingFrame>,
    current: Option<ExecutingTask>,
    nested: u64,
}

impl<S: CostSource> NestingStack<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source, counter: None, frames: Vec::new(), current: None, nested: 0 }
    }

    /// Number of executions currently open on this stack
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The innermost executing task
    #[must_use]
    pub fn current(&self) -> Option<ExecutingTask> {
        self.current
    }

    /// Cost consumed by nested executions not yet absorbed by an outermost exit
    #[must_use]
    pub fn nested_cost(&self) -> u64 {
        self.nested
    }

    fn read_cost(&mut self) -> u64 {
        let source = &self.source;
        self.counter
            .get_or_insert_with(|| {
                debug!("Opening {} cost counter for this thread", source.event_name());
                source.open()
            })
            .read()
    }

    /// Begin an execution of `task`
    pub fn enter(&mut self, id: TaskId, hash: IdentityHash) -> FrameToken {
        let task = ExecutingTask { id, hash };
        let entry_time_ns = now_ns();
        let entry_cost = self.read_cost();

        self.frames.push(NestingFrame {
            task,
            previous: self.current,
            nested_at_entry: self.nested,
            entry_cost,
            entry_time_ns,
        });
        self.current = Some(task);

        FrameToken { depth: self.frames.len(), _thread_bound: PhantomData }
    }

    /// End the execution entered with `token`
    ///
    /// Returns `None` when the frame was a re-entry of the task already
    /// executing right beneath it (e.g. an overridden `run` delegating to the
    /// parent `run`): that cost stays with the enclosing frame of the same
    /// task. Also returns `None` if the stack is empty.
    pub fn exit(&mut self, token: FrameToken) -> Option<ExecutionSample> {
        let exit_cost = self.read_cost();
        let exit_time_ns = now_ns();

        debug_assert_eq!(token.depth, self.frames.len(), "unbalanced execution exit");
        let Some(frame) = self.frames.pop() else {
            debug!("Execution exit without a matching entry");
            return None;
        };
        self.current = frame.previous;

        let nested_since_entry = self.nested.saturating_sub(frame.nested_at_entry);
        let self_cost = exit_cost.saturating_sub(frame.entry_cost).saturating_sub(nested_since_entry);

        let outer = match frame.previous {
            None => {
                self.nested = 0;
                None
            }
            Some(previous) if previous.id != frame.task.id => {
                self.nested += self_cost;
                Some(previous)
            }
            Some(_) => return None,
        };

        Some(ExecutionSample {
            task: frame.task,
            outer,
            self_cost,
            entry_time_ns: frame.entry_time_ns,
            exit_time_ns,
        })
    }
}
