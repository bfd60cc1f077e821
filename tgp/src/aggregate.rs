//! # Task Aggregation
//!
//! Post-processes granularity profiles: the granularity of a nested task is
//! folded into its outer task when the two could not have run in parallel.
//!
//! ## Folding Rule
//!
//! A nested task folds into its outer task if
//! - the outer task is not a thread, or
//! - the nested task did not run through `exec()` and was created and
//!   executed by the same thread.
//!
//! ```text
//!   outer (thread=F, 40) ◀── a (10) ◀── b (5)       outer: 40 + 10 + 5 = 55
//!   worker (thread=T, 30) ◀── c (exec, 7)           worker: 30, c: 7 (kept)
//! ```
//!
//! ## Linking
//!
//! A profile points at its outer task through `Outer Task ID`, the outer
//! task's identity hash. When several profiles share a hash, the last one in
//! input order is the link target. Links must form a forest; a cycle is an
//! error. Profiles that were never executed take no part, and the result
//! keeps input order minus the folded profiles.

use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tgp_common::UNSET_ID;

use crate::domain::{AggregateError, ExecutionOrdinal, IdentityHash, ThreadInfo};
use crate::export::csv::split_line;
use crate::profile::{ExecutorInfo, GranularityProfile, ProfileMode, ProfileRecord};

/// File name the aggregated profiles are written to by default
pub const AGGREGATED_FILE: &str = "aggregated-tasks.csv";

type Profile = ProfileRecord<GranularityProfile>;

/// Default output for aggregating `input`: [`AGGREGATED_FILE`] next to it
#[must_use]
pub fn default_output(input: &Path) -> PathBuf {
    input.with_file_name(AGGREGATED_FILE)
}

/// Result of [`aggregate`]
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Profiles not folded into an outer task, with aggregated granularity
    pub profiles: Vec<Profile>,
    /// Executed profiles that took part
    pub tasks: usize,
    /// Profiles whose granularity went into their outer task
    pub folded: usize,
}

fn thread_id(thread: Option<&ThreadInfo>) -> i32 {
    thread.map_or(UNSET_ID, |t| t.id)
}

/// Whether `nested` folds into `outer`
#[must_use]
pub fn folds_into(outer: &GranularityProfile, nested: &GranularityProfile) -> bool {
    !outer.is_thread
        || (!nested.is_exec_executed
            && thread_id(nested.creation_thread.as_ref())
                == thread_id(nested.execution_thread.as_ref()))
}

/// Fold nested granularities into their outer tasks
///
/// # Errors
/// Returns [`AggregateError::Cycle`] if outer task links loop back.
pub fn aggregate(profiles: Vec<Profile>) -> Result<Aggregation, AggregateError> {
    let tasks: Vec<Profile> = profiles
        .into_iter()
        .filter(|p| p.mode.outer_task != IdentityHash(UNSET_ID))
        .collect();

    let mut by_hash: HashMap<IdentityHash, usize> = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        by_hash.insert(task.id, i);
    }
    let outer: Vec<Option<usize>> = tasks
        .iter()
        .map(|t| {
            let hash = t.mode.outer_task;
            if hash.is_none() {
                None
            } else {
                by_hash.get(&hash).copied()
            }
        })
        .collect();

    let order = outer_first_order(&tasks, &outer)?;

    // Walking outer-first order backwards completes every nested total
    // before it is added to its outer task.
    let mut total: Vec<i64> = tasks.iter().map(|t| t.mode.granularity).collect();
    let mut folded = vec![false; tasks.len()];
    for &nested in order.iter().rev() {
        let Some(parent) = outer[nested] else { continue };
        if folds_into(&tasks[parent].mode, &tasks[nested].mode) {
            total[parent] = total[parent].saturating_add(total[nested]);
            folded[nested] = true;
        }
    }

    let count = tasks.len();
    let folded_count = folded.iter().filter(|f| **f).count();
    let profiles = tasks
        .into_iter()
        .zip(total)
        .zip(folded)
        .filter(|(_, folded)| !folded)
        .map(|((mut task, total), _)| {
            task.mode.granularity = total;
            task
        })
        .collect();

    info!("Folded {folded_count} of {count} tasks into their outer tasks");
    Ok(Aggregation { profiles, tasks: count, folded: folded_count })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Visiting,
    Done,
}

/// Order in which every outer task precedes the tasks nested in it
fn outer_first_order(
    tasks: &[Profile],
    outer: &[Option<usize>],
) -> Result<Vec<usize>, AggregateError> {
    let mut marks = vec![Mark::New; tasks.len()];
    let mut order = Vec::with_capacity(tasks.len());
    let mut path = Vec::new();

    for start in 0..tasks.len() {
        let mut cursor = Some(start);
        while let Some(i) = cursor {
            match marks[i] {
                Mark::Done => break,
                Mark::Visiting => return Err(AggregateError::Cycle { id: tasks[i].id }),
                Mark::New => {
                    marks[i] = Mark::Visiting;
                    path.push(i);
                    cursor = outer[i];
                }
            }
        }
        // The chain was collected nested-first
        while let Some(i) = path.pop() {
            marks[i] = Mark::Done;
            order.push(i);
        }
    }
    Ok(order)
}

/// Profiles read back from a granularity CSV
#[derive(Debug, Clone, Default)]
pub struct ParsedProfiles {
    pub profiles: Vec<Profile>,
    /// Lines that held no profile (headers, other layouts)
    pub skipped: usize,
}

/// Read a granularity CSV as written by the CSV sink without prefix or
/// suffix columns
///
/// # Errors
/// Returns [`AggregateError::Io`] if the file cannot be read.
pub fn read_profiles(path: &Path) -> Result<ParsedProfiles, AggregateError> {
    parse_profiles(BufReader::new(File::open(path)?))
}

/// See [`read_profiles`]
///
/// # Errors
/// Returns [`AggregateError::Io`] on read failures.
pub fn parse_profiles(reader: impl BufRead) -> Result<ParsedProfiles, AggregateError> {
    let mut parsed = ParsedProfiles::default();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&split_line(&line)) {
            Some(profile) => parsed.profiles.push(profile),
            None => parsed.skipped += 1,
        }
    }
    debug!("Read {} profiles, skipped {} lines", parsed.profiles.len(), parsed.skipped);
    Ok(parsed)
}

fn int(fields: &[String], i: usize) -> Option<i32> {
    fields[i].parse().ok()
}

fn long(fields: &[String], i: usize) -> Option<i64> {
    fields[i].parse().ok()
}

fn flag(fields: &[String], i: usize) -> Option<bool> {
    match fields[i].as_str() {
        "T" => Some(true),
        "F" => Some(false),
        _ => None,
    }
}

/// Thread columns `id, class, name` starting at `i`
fn thread(fields: &[String], i: usize) -> Option<Option<ThreadInfo>> {
    let id = int(fields, i)?;
    let unset = id == UNSET_ID && fields[i + 1] == "null";
    Some((!unset).then(|| ThreadInfo {
        id,
        class: fields[i + 1].clone(),
        name: fields[i + 2].clone(),
    }))
}

fn parse_row(fields: &[String]) -> Option<Profile> {
    if fields.len() != GranularityProfile::header().len() {
        return None;
    }
    let executor_id = int(fields, 10)?;
    let executor = (executor_id != UNSET_ID || fields[11] != "null")
        .then(|| ExecutorInfo { id: executor_id, class: fields[11].clone() });

    let mode = GranularityProfile {
        outer_task: IdentityHash(int(fields, 2)?),
        creation_thread: thread(fields, 4)?,
        execution_thread: thread(fields, 7)?,
        executor,
        entry_execution_time: long(fields, 12)?,
        exit_execution_time: long(fields, 13)?,
        granularity: long(fields, 14)?,
        is_thread: flag(fields, 15)?,
        is_runnable: flag(fields, 16)?,
        is_callable: flag(fields, 17)?,
        is_fork_join_task: flag(fields, 18)?,
        is_run_executed: flag(fields, 19)?,
        is_call_executed: flag(fields, 20)?,
        is_exec_executed: flag(fields, 21)?,
    };
    Some(ProfileRecord {
        id: IdentityHash(int(fields, 0)?),
        class_name: fields[1].clone(),
        exec_number: fields[3].parse().ok().and_then(ExecutionOrdinal::new)?,
        mode,
    })
}
