//! Calling-context profiles
//!
//! Each profile stores the rendered calling context observed when the task
//! was created (init), submitted and executed.

use serde::Serialize;

use super::record::{opt_column, ProfileMode, ProfileRecord};

/// Calling-context-mode fields of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallingContextProfile {
    pub cc_init: Option<String>,
    pub cc_submit: Option<String>,
    pub cc_exec: Option<String>,
}

const HEADER: &[&str] = &[
    "ID",
    "Class",
    "Execution N.",
    "Calling Context (init)",
    "Calling Context (submit)",
    "Calling Context (exec)",
];

impl ProfileMode for CallingContextProfile {
    const NAME: &'static str = "calling-context";

    type Creation = String;
    type Submission = String;
    type Execution = String;

    fn apply_creation(&mut self, cc: String) {
        self.cc_init = Some(cc);
    }

    fn apply_submission(&mut self, cc: String) {
        self.cc_submit = Some(cc);
    }

    fn apply_execution(&mut self, cc: String) {
        self.cc_exec = Some(cc);
    }

    fn has_execution(&self) -> bool {
        self.cc_exec.is_some()
    }

    fn clone_identity(&self) -> Self {
        Self { cc_init: self.cc_init.clone(), ..Self::default() }
    }

    fn header() -> &'static [&'static str] {
        HEADER
    }

    fn row(record: &ProfileRecord<Self>) -> Vec<String> {
        let p = &record.mode;
        vec![
            record.id.to_string(),
            record.class_name.clone(),
            record.exec_number.get().to_string(),
            opt_column(p.cc_init.as_deref()),
            opt_column(p.cc_submit.as_deref()),
            opt_column(p.cc_exec.as_deref()),
        ]
    }
}
