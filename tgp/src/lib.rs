//! # tgp - Task Granularity Profiler
//!
//! Builds one profile per task execution from three independently arriving
//! lifecycle events (creation, submission, execution), and measures the
//! cost of each execution exclusive of the tasks nested inside it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Instrumented Application Threads                 │
//! │     create task ── submit to executor ── run (maybe nested)     │
//! └──────────┬───────────────────┬──────────────────┬───────────────┘
//!            │ on_create         │ on_submit        │ enter / exit
//!            │                   │                  ▼
//!            │                   │       ┌──────────────────────┐
//!            │                   │       │  Nesting Accountant  │
//!            │                   │       │   (per thread)       │
//!            │                   │       └──────────┬───────────┘
//!            │                   │                  │ on_execute
//!            ▼                   ▼                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Lifecycle Correlator                        │
//! │   create/submit → last profile   execute → case A / B / C       │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ per-task slot lock
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           Profile Store  (TaskId, ordinal) → profile            │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ drain at shutdown
//!                                 ▼
//!                     ┌──────────────────────┐
//!                     │  Export (CSV, JSONL) │
//!                     └──────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`store`]: profiles keyed by task identity and execution ordinal
//! - [`profile`]: the record schema, generic over the profiling mode
//!   - granularity: threads, executor, timestamps, self cost
//!   - calling context: method stacks at init, submit and exec
//! - [`correlator`]: merges events into profiles, handles re-executions
//! - [`nesting`]: per-thread self-cost accounting and calling contexts
//! - [`instrument`]: RAII scopes pairing the accountant with the correlator
//! - [`export`]: CSV and JSON-lines sinks for drained profiles
//! - [`aggregate`]: fold nested task granularities into their outer tasks
//! - [`replay`]: drive a correlator from a recorded JSON-lines event log
//! - [`demo`]: synthetic instrumented worker pool
//! - [`config`] / [`cli`]: environment and command-line configuration
//! - [`domain`]: newtypes and error types
//!
//! ## Key Concepts
//!
//! - **Profile**: one logical execution instance of a task
//! - **Execution ordinal**: 1-based index of a profile among its task's
//!   profiles; a task executed twice has two profiles
//! - **Self cost (granularity)**: cost measured across an execution minus
//!   the cost of executions nested inside it on the same thread
//! - **Outer task**: the task executing on the thread when a nested task
//!   started

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod correlator;
pub mod demo;
pub mod domain;
pub mod export;
pub mod instrument;
pub mod nesting;
pub mod profile;
pub mod replay;
pub mod store;
