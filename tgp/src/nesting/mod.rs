//! Nesting accounting
//!
//! This module contains the per-thread state used to measure executions:
//! - `accountant`: nesting stack computing self cost exclusive of nested tasks
//! - `cost`: cost sources (wall clock, externally driven)
//! - `context`: calling-context stack for calling-context profiling
//!
//! Nothing here is shared between threads. The free functions below use a
//! thread-local wall-clock [`NestingStack`] for call sites that have no
//! stack of their own.

pub mod accountant;
pub mod context;
pub mod cost;

use std::cell::RefCell;

pub use accountant::{ExecutingTask, ExecutionSample, FrameToken, NestingFrame, NestingStack};
pub use context::{current_context, enter_method, CallingContext, ContextFrame};
pub use cost::{now_ns, CostCounter, CostSource, ManualCost, WallClock};

use crate::domain::{IdentityHash, TaskId};

thread_local! {
    static ACCOUNTANT: RefCell<NestingStack<WallClock>> = RefCell::new(NestingStack::new(WallClock));
}

/// Begin an execution on the current thread's wall-clock accountant
pub fn enter_execution(id: TaskId, hash: IdentityHash) -> FrameToken {
    ACCOUNTANT.with(|stack| stack.borrow_mut().enter(id, hash))
}

/// End an execution begun with [`enter_execution`] on this thread
pub fn exit_execution(token: FrameToken) -> Option<ExecutionSample> {
    ACCOUNTANT.try_with(|stack| stack.borrow_mut().exit(token)).ok().flatten()
}

/// Number of executions currently open on this thread
#[must_use]
pub fn execution_depth() -> usize {
    ACCOUNTANT.with(|stack| stack.borrow().depth())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_local_accountant_nests() {
        let outer = enter_execution(TaskId(1), IdentityHash(11));
        let inner = enter_execution(TaskId(2), IdentityHash(12));
        assert_eq!(execution_depth(), 2);

        let inner_sample = exit_execution(inner).unwrap();
        assert_eq!(inner_sample.outer_hash(), IdentityHash(11));
        let outer_sample = exit_execution(outer).unwrap();
        assert!(outer_sample.outer.is_none());
        assert_eq!(execution_depth(), 0);
    }

    #[test]
    fn test_accountants_are_per_thread() {
        let outer = enter_execution(TaskId(1), IdentityHash(11));
        let depth = std::thread::spawn(execution_depth).join().unwrap();
        assert_eq!(depth, 0);
        assert!(exit_execution(outer).is_some());
    }
}
