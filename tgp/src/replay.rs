//! Event log replay
//!
//! Drives a correlator offline from a recorded JSON-lines event log, one
//! event per line:
//!
//! ```text
//! {"event":"mode","name":"calling-context"}
//! {"event":"create","task":7,"identity_hash":1031,"class":"app.Job","payload":"main!"}
//! {"event":"submit","task":7,"identity_hash":1031,"class":"app.Job","payload":"main!Pool.submit!"}
//! {"event":"execute","task":7,"identity_hash":1031,"class":"app.Job","payload":"Worker.run!Job.run!"}
//! ```
//!
//! `payload` is the mode's creation, submission or execution payload. The
//! optional `mode` line guards against replaying a log into the wrong
//! profile mode. `"task": null` reproduces an event without a task, which
//! the correlator drops. Blank lines and lines starting with `#` are skipped.

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::correlator::LifecycleCorrelator;
use crate::domain::{IdentityHash, ReplayError, TaskId, TaskRef};
use crate::profile::{ProfileMode, ProfileModeKind};

/// Task fields shared by every lifecycle event
#[derive(Debug, Clone, Deserialize)]
pub struct LoggedTask {
    pub task: Option<TaskId>,
    #[serde(default)]
    pub identity_hash: IdentityHash,
    #[serde(default)]
    pub class: String,
}

impl LoggedTask {
    fn task_ref(&self) -> Option<TaskRef<'_>> {
        self.task.map(|id| TaskRef::new(id, self.identity_hash, &self.class))
    }
}

/// One line of an event log
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoggedEvent<C, S, E> {
    Mode {
        name: ProfileModeKind,
    },
    Create {
        #[serde(flatten)]
        task: LoggedTask,
        payload: C,
    },
    Submit {
        #[serde(flatten)]
        task: LoggedTask,
        payload: S,
    },
    Execute {
        #[serde(flatten)]
        task: LoggedTask,
        payload: E,
    },
}

/// Event type of a log replayed in mode `M`
pub type EventOf<M> = LoggedEvent<
    <M as ProfileMode>::Creation,
    <M as ProfileMode>::Submission,
    <M as ProfileMode>::Execution,
>;

/// Counts from one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Lifecycle events read (mode lines excluded)
    pub events: usize,
    /// Events the correlator wrote into a profile
    pub recorded: usize,
    /// Events the correlator dropped
    pub dropped: usize,
}

/// Feed every event read from `reader` into `correlator`
///
/// # Errors
/// Stops at the first unreadable or malformed line, or at a `mode` line
/// naming a different profile mode. Events before it stay recorded.
pub fn replay<M, R>(
    reader: R,
    correlator: &LifecycleCorrelator<M>,
) -> Result<ReplaySummary, ReplayError>
where
    M: ProfileMode,
    M::Creation: DeserializeOwned,
    M::Submission: DeserializeOwned,
    M::Execution: DeserializeOwned,
    R: BufRead,
{
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: EventOf<M> = serde_json::from_str(trimmed)
            .map_err(|source| ReplayError::Malformed { line: number, source })?;

        let recorded = match event {
            LoggedEvent::Mode { name } => {
                if name.name() != M::NAME {
                    return Err(ReplayError::ModeMismatch {
                        line: number,
                        expected: M::NAME,
                        found: name.name(),
                    });
                }
                debug!("Event log declares {name} mode");
                continue;
            }
            LoggedEvent::Create { task, payload } => {
                correlator.on_create(task.task_ref(), payload).is_some()
            }
            LoggedEvent::Submit { task, payload } => {
                correlator.on_submit(task.task_ref(), payload).is_some()
            }
            LoggedEvent::Execute { task, payload } => {
                correlator.on_execute(task.task_ref(), payload).is_some()
            }
        };

        summary.events += 1;
        if recorded {
            summary.recorded += 1;
        } else {
            summary.dropped += 1;
        }
    }

    info!(
        "Replayed {} events ({} recorded, {} dropped)",
        summary.events, summary.recorded, summary.dropped
    );
    Ok(summary)
}

/// [`replay`] from a file
///
/// # Errors
/// See [`replay`]; also fails if `path` cannot be opened.
pub fn replay_file<M>(
    path: &Path,
    correlator: &LifecycleCorrelator<M>,
) -> Result<ReplaySummary, ReplayError>
where
    M: ProfileMode,
    M::Creation: DeserializeOwned,
    M::Submission: DeserializeOwned,
    M::Execution: DeserializeOwned,
{
    let file = File::open(path)?;
    debug!("Replaying event log {}", path.display());
    replay(BufReader::new(file), correlator)
}
