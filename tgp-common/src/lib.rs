//! # Shared Vocabulary (Instrumentation ↔ Analysis)
//!
//! Defines the constants and small value types shared between the code that
//! fires task lifecycle events (instrumentation sites inside the profiled
//! application) and the analysis side that correlates them into profiles.
//!
//! Nothing here allocates, so producers can depend on this crate without
//! pulling in `std`.
//!
//! ## Key Types
//!
//! - [`TaskKind`] - Which task interface a constructed object implements
//! - [`ExecMethod`] - Which execution method fired (`run`, `call`, `exec`)
//!
//! ## Sentinels
//!
//! Granularity profiles start with every execution field at its sentinel
//! ([`UNSET_TIME`], [`UNSET_TIME`], [`UNSET_GRANULARITY`]). A profile whose
//! entry time, exit time and granularity all still hold these values is
//! treated as "not executed yet".

#![cfg_attr(not(test), no_std)]

// ============================================================================
// Sentinels
// ============================================================================

/// Unset numeric id (thread ids, executor ids)
pub const UNSET_ID: i32 = -1;

/// Unset entry/exit execution timestamp
pub const UNSET_TIME: i64 = -1;

/// Unset granularity
///
/// Coincides with a genuine zero-cost execution; see [`UNSET_TIME`].
pub const UNSET_GRANULARITY: i64 = 0;

/// Outer task id reported for top-level executions
pub const NO_OUTER_TASK: i32 = 0;

/// Separator between frames of a rendered calling context
pub const CONTEXT_SEPARATOR: char = '!';

/// Hardware event a cycle-based cost source opens by default
pub const DEFAULT_COST_EVENT: &str = "PAPI_REF_CYC";

// ============================================================================
// Shared Value Types
// ============================================================================

/// Task interface implemented by a constructed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "user", serde(rename_all = "snake_case"))]
pub enum TaskKind {
    /// No known task interface (plain threads)
    #[default]
    Unknown,
    Runnable,
    Callable,
    ForkJoin,
}

/// Execution method whose exit produced an execution event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "user", serde(rename_all = "snake_case"))]
pub enum ExecMethod {
    Run,
    Call,
    Exec,
    /// Any other method name; sets no execution flag
    #[default]
    Other,
}

impl ExecMethod {
    /// Method name as reported by instrumentation sites
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Call => "call",
            Self::Exec => "exec",
            Self::Other => "other",
        }
    }
}
