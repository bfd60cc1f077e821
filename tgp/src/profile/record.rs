//! Profile records and the mode abstraction
//!
//! A [`ProfileRecord`] holds the fields every profile has (identity hash,
//! class name, execution ordinal) plus a mode-specific payload `M`. The mode
//! decides how creation, submission and execution events are written, which
//! fields survive a re-execution clone, and how the record is laid out as
//! columns.

use serde::Serialize;
use std::fmt::Debug;

use crate::domain::{ExecutionOrdinal, IdentityHash};

/// Mode-specific part of a profile
///
/// Implementations are plain data; the store and correlator own all
/// synchronization.
pub trait ProfileMode: Default + Clone + Debug + Serialize + Send + 'static {
    /// Mode name used in logs, configuration and event logs
    const NAME: &'static str;

    type Creation: Debug;
    type Submission: Debug;
    type Execution: Debug;

    fn apply_creation(&mut self, payload: Self::Creation);

    fn apply_submission(&mut self, payload: Self::Submission);

    /// Write every execution field in one step.
    fn apply_execution(&mut self, payload: Self::Execution);

    /// Whether an execution has already been written into this profile
    fn has_execution(&self) -> bool;

    /// Fresh payload carrying only the fields that describe the task itself
    /// (its creation), used when a re-execution needs a new profile.
    #[must_use]
    fn clone_identity(&self) -> Self;

    /// Column names, in row order
    fn header() -> &'static [&'static str];

    /// Render a record as columns matching [`ProfileMode::header`]
    fn row(record: &ProfileRecord<Self>) -> Vec<String>;
}

/// One profile: a single logical execution instance of a task
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRecord<M> {
    /// Identity hash stamped by the most recent event
    pub id: IdentityHash,
    pub class_name: String,
    pub exec_number: ExecutionOrdinal,
    #[serde(flatten)]
    pub mode: M,
}

impl<M: ProfileMode> ProfileRecord<M> {
    /// Empty record as produced by the store, before any event writes into it
    #[must_use]
    pub fn prefilled(class_name: &str, exec_number: ExecutionOrdinal) -> Self {
        Self {
            id: IdentityHash(tgp_common::UNSET_ID),
            class_name: class_name.to_string(),
            exec_number,
            mode: M::default(),
        }
    }

    #[must_use]
    pub fn has_execution(&self) -> bool {
        self.mode.has_execution()
    }

    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        M::row(self)
    }
}

/// Render an optional string column the way the CSV output always has
pub(crate) fn opt_column(value: Option<&str>) -> String {
    value.unwrap_or("null").to_string()
}
