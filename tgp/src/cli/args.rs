//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::demo::DemoOptions;
use crate::export::SinkFormat;
use crate::profile::ProfileModeKind;

#[derive(Parser, Debug)]
#[command(
    name = "tgp",
    version,
    about = "Correlate task lifecycle events into per-execution task profiles",
    after_help = "\
EXAMPLES:
    tgp replay events.jsonl                          Replay a recorded event log
    tgp replay events.jsonl --format jsonl -o p.jsonl
    tgp demo --workers 8 --tasks 200                 Profile a synthetic worker pool
    tgp aggregate profiles/tasks.csv                 Fold nested tasks into outer tasks
    TGP_MODE=calling-context tgp demo                Calling-context profiles

ENVIRONMENT:
    TGP_PROFILE, TGP_MODE, TGP_OUTPUT, TGP_COST_EVENT, TGP_CSV_* (see docs)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Profiling mode (overrides TGP_MODE)
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ProfileModeKind>,

    /// Profile output file (overrides TGP_OUTPUT)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub format: Option<SinkFormat>,

    /// Do not write a CSV header line
    #[arg(long, global = true)]
    pub no_header: bool,

    /// Append to the output file instead of truncating it
    #[arg(long, global = true)]
    pub append: bool,

    /// Start with profiling disabled (records nothing)
    #[arg(long, global = true)]
    pub disabled: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Feed a JSON-lines event log through the correlator
    Replay {
        /// Event log, one JSON event per line
        #[arg(value_name = "LOG")]
        log: PathBuf,
    },
    /// Run an instrumented synthetic worker pool
    Demo {
        /// Worker threads in the pool
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Top-level tasks submitted to the pool
        #[arg(long, default_value_t = 32)]
        tasks: usize,

        /// Extra executions of every third task
        #[arg(long, default_value_t = 1)]
        reruns: u32,
    },
    /// Fold nested task granularities of a granularity CSV into their outer
    /// tasks (output defaults to aggregated-tasks.csv next to CSV)
    Aggregate {
        /// Granularity profiles written by `tgp replay` or `tgp demo`
        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },
}

impl Args {
    /// Apply command-line overrides on top of `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(output) = &self.output {
            config.output.clone_from(output);
        }
        if self.no_header {
            config.csv.print_header = false;
        }
        if self.append {
            config.csv.append = true;
        }
        if self.disabled {
            config.enabled = false;
        }
    }

    #[must_use]
    pub fn format(&self) -> SinkFormat {
        self.format.unwrap_or_default()
    }
}

impl Command {
    /// Demo options, if this is the demo command
    #[must_use]
    pub fn demo_options(&self) -> Option<DemoOptions> {
        match *self {
            Self::Demo { workers, tasks, reruns } => Some(DemoOptions { workers, tasks, reruns }),
            Self::Replay { .. } | Self::Aggregate { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_with_overrides() {
        let args = Args::try_parse_from([
            "tgp", "replay", "log.jsonl", "--mode", "calling-context", "-o", "out.csv",
            "--no-header",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply(&mut config);

        assert!(matches!(args.command, Command::Replay { ref log } if log == &PathBuf::from("log.jsonl")));
        assert_eq!(config.mode, ProfileModeKind::CallingContext);
        assert_eq!(config.output, PathBuf::from("out.csv"));
        assert!(!config.csv.print_header);
        assert_eq!(args.format(), SinkFormat::Csv);
    }

    #[test]
    fn test_demo_defaults() {
        let args = Args::try_parse_from(["tgp", "demo", "--format", "jsonl"]).unwrap();
        assert_eq!(args.command.demo_options(), Some(DemoOptions { workers: 4, tasks: 32, reruns: 1 }));
        assert_eq!(args.format(), SinkFormat::Jsonl);

        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_aggregate_takes_csv() {
        let args = Args::try_parse_from(["tgp", "aggregate", "profiles/tasks.csv"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Aggregate { ref csv } if csv == &PathBuf::from("profiles/tasks.csv")
        ));
        assert_eq!(args.command.demo_options(), None);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["tgp"]).is_err());
    }
}
