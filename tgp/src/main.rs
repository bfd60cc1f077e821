//! # tgp - Main Entry Point
//!
//! Three subcommands, each ending in profiles written to a sink:
//! - **replay** (`tgp replay events.jsonl`): correlate a recorded event log
//! - **demo** (`tgp demo`): profile a synthetic instrumented worker pool
//! - **aggregate** (`tgp aggregate tasks.csv`): fold nested task granularities
//!   of a granularity CSV into their outer tasks
//!
//! An output file that cannot be opened does not lose the drained profiles;
//! they are written to stderr instead.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tgp::aggregate;
use tgp::cli::{Args, Command};
use tgp::config::Config;
use tgp::correlator::{LifecycleCorrelator, ProfileToggle};
use tgp::demo::{self, ContextTracer, DemoOptions};
use tgp::domain::ConfigError;
use tgp::export::{self, DrainSummary, SinkFormat, SinkTarget};
use tgp::instrument::Instrumenter;
use tgp::profile::{CallingContextProfile, GranularityProfile, ProfileMode, ProfileModeKind};
use tgp::replay;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.downcast_ref::<ConfigError>().is_some()) {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env().context("Invalid TGP_* environment")?;
    args.apply(&mut config);

    let quiet = args.quiet;
    let format = args.format();
    let toggle = Arc::new(ProfileToggle::new(config.enabled));

    let aggregating = matches!(args.command, Command::Aggregate { .. });
    if !quiet {
        println!("tgp v{}", env!("CARGO_PKG_VERSION"));
        if !aggregating {
            println!("mode: {}", config.mode);
            if !config.enabled {
                println!("profiling disabled, no profiles will be recorded");
            }
        }
    }

    let report = match &args.command {
        Command::Replay { log } => match config.mode {
            ProfileModeKind::Granularity => {
                replay_log::<GranularityProfile>(log, &config, format, toggle)?
            }
            ProfileModeKind::CallingContext => {
                replay_log::<CallingContextProfile>(log, &config, format, toggle)?
            }
        },
        Command::Demo { .. } => {
            let options = args.command.demo_options().unwrap_or_default();
            run_demo(options, &config, format, toggle)?
        }
        Command::Aggregate { csv } => {
            let output = args.output.clone().unwrap_or_else(|| aggregate::default_output(csv));
            aggregate_csv(csv, &output, &config, format)?
        }
    };

    if !quiet {
        let summary = report.summary;
        println!("profiles: {} written, {} failed", summary.written, summary.failed);
        match &report.target {
            SinkTarget::File(path) => println!("saved: {}", path.display()),
            SinkTarget::Fallback => println!("saved: stderr (output file could not be opened)"),
        }
    }
    Ok(())
}

/// Profiles written and where they went
struct Report {
    summary: DrainSummary,
    target: SinkTarget,
}

fn replay_log<M>(
    log: &Path,
    config: &Config,
    format: SinkFormat,
    toggle: Arc<ProfileToggle>,
) -> Result<Report>
where
    M: ProfileMode,
    M::Creation: DeserializeOwned,
    M::Submission: DeserializeOwned,
    M::Execution: DeserializeOwned,
{
    let correlator = LifecycleCorrelator::<M>::new(toggle);
    replay::replay_file(log, &correlator)
        .with_context(|| format!("Failed to replay {}", log.display()))?;
    write_profiles(&correlator, config, format)
}

fn run_demo(
    options: DemoOptions,
    config: &Config,
    format: SinkFormat,
    toggle: Arc<ProfileToggle>,
) -> Result<Report> {
    debug!("Cost event {} requested, measuring wall-clock time", config.cost_event);
    match config.mode {
        ProfileModeKind::Granularity => {
            let correlator = Arc::new(LifecycleCorrelator::<GranularityProfile>::new(toggle));
            let instrumenter = Instrumenter::new(Arc::clone(&correlator));
            demo::run(&instrumenter, options).context("Demo workload failed")?;
            write_profiles(&correlator, config, format)
        }
        ProfileModeKind::CallingContext => {
            let correlator = Arc::new(LifecycleCorrelator::<CallingContextProfile>::new(toggle));
            let tracer = ContextTracer::new(Arc::clone(&correlator));
            demo::run(&tracer, options).context("Demo workload failed")?;
            write_profiles(&correlator, config, format)
        }
    }
}

fn aggregate_csv(
    input: &Path,
    output: &Path,
    config: &Config,
    format: SinkFormat,
) -> Result<Report> {
    let parsed = aggregate::read_profiles(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if parsed.skipped > 0 {
        warn!(
            "Skipped {} lines of {} that hold no granularity profile",
            parsed.skipped,
            input.display()
        );
    }
    let aggregation = aggregate::aggregate(parsed.profiles)
        .with_context(|| format!("Failed to aggregate {}", input.display()))?;

    let (mut sink, target) = export::open_sink_or::<GranularityProfile, _>(
        format,
        output,
        config.csv.clone(),
        io::stderr(),
    );
    let summary = export::write_all(&aggregation.profiles, sink.as_mut())
        .context("Failed to write aggregated profiles")?;
    Ok(Report { summary, target })
}

fn write_profiles<M: ProfileMode>(
    correlator: &LifecycleCorrelator<M>,
    config: &Config,
    format: SinkFormat,
) -> Result<Report> {
    let (mut sink, target) =
        export::open_sink_or::<M, _>(format, &config.output, config.csv.clone(), io::stderr());
    let summary =
        export::drain_into(correlator, sink.as_mut()).context("Failed to write profiles")?;
    Ok(Report { summary, target })
}
