//! Structured error types for tgp
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The correlation core itself never fails; these cover the edges around it
//! (configuration, event log replay, profile sinks, task aggregation).

use std::path::PathBuf;
use thiserror::Error;

use super::IdentityHash;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Attempted to write {got} columns after rows of {expected} columns")]
    ColumnMismatch { expected: usize, got: usize },

    #[error("No columns to write")]
    EmptyRow,

    #[error("Sink already closed")]
    Closed,

    #[error("Failed to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown profiling mode '{0}' (expected 'granularity' or 'calling-context')")]
    UnknownMode(String),

    #[error("Invalid boolean for {key}: '{value}'")]
    InvalidBool { key: String, value: String },

    #[error("Empty path for {0}")]
    EmptyPath(String),
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Malformed event on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event on line {line} is for {found} mode, replay is running in {expected} mode")]
    ModeMismatch { line: usize, expected: &'static str, found: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Outer task links form a cycle through task {id}")]
    Cycle { id: IdentityHash },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
