//! Per-thread calling-context stack
//!
//! Instrumented methods push their unique name on entry and pop it on exit.
//! A rendered context lists the frames bottom to top, each followed by
//! [`CONTEXT_SEPARATOR`] (`main!Pool.submit!`).

use std::cell::RefCell;
use std::marker::PhantomData;
use tgp_common::CONTEXT_SEPARATOR;

/// Initial capacity; deep enough that typical stacks never reallocate
const DEFAULT_CAPACITY: usize = 1024;

/// Stack of method identifiers
#[derive(Debug, Clone, Default)]
pub struct CallingContext {
    frames: Vec<String>,
}

impl CallingContext {
    #[must_use]
    pub fn new() -> Self {
        Self { frames: Vec::with_capacity(DEFAULT_CAPACITY) }
    }

    pub fn push(&mut self, method: impl Into<String>) {
        self.frames.push(method.into());
    }

    /// Pop the innermost frame; popping an empty stack returns `None`
    pub fn pop(&mut self) -> Option<String> {
        self.frames.pop()
    }

    /// Render as `frame!frame!...!`
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.frames.iter().map(|f| f.len() + 1).sum());
        for frame in &self.frames {
            out.push_str(frame);
            out.push(CONTEXT_SEPARATOR);
        }
        out
    }
}

thread_local! {
    static CONTEXT: RefCell<CallingContext> = RefCell::new(CallingContext::new());
}

/// RAII frame on the current thread's calling context
///
/// Pops its frame when dropped.
#[must_use = "dropping the guard immediately pops the frame; bind it with `let _frame = ...`"]
pub struct ContextFrame {
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ContextFrame {
    fn drop(&mut self) {
        let _ = CONTEXT.try_with(|cc| cc.borrow_mut().pop());
    }
}

/// Push `method` onto the current thread's calling context
pub fn enter_method(method: impl Into<String>) -> ContextFrame {
    CONTEXT.with(|cc| cc.borrow_mut().push(method));
    ContextFrame { _thread_bound: PhantomData }
}

/// Render the current thread's calling context
#[must_use]
pub fn current_context() -> String {
    CONTEXT.with(|cc| cc.borrow().render())
}
