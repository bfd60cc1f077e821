//! Profile export
//!
//! Sinks receive the drained profiles at shutdown. Currently supports:
//! - [`CsvSink`]: the tabular layout of [`ProfileMode::header`]
//! - [`JsonLinesSink`]: one serde object per profile

pub mod csv;
pub mod json;

use log::{error, info};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use self::csv::{CsvOptions, CsvSink};
pub use self::json::JsonLinesSink;

use crate::correlator::LifecycleCorrelator;
use crate::domain::SinkError;
use crate::profile::{ProfileMode, ProfileRecord};

/// Destination for drained profiles
pub trait ProfileSink<M: ProfileMode> {
    /// Called once before any record
    ///
    /// # Errors
    /// Sink-specific; see [`SinkError`].
    fn write_header(&mut self) -> Result<(), SinkError>;

    /// # Errors
    /// Sink-specific; see [`SinkError`].
    fn write_record(&mut self, record: &ProfileRecord<M>) -> Result<(), SinkError>;

    /// Flush and close; later writes fail with [`SinkError::Closed`]
    ///
    /// # Errors
    /// Sink-specific; see [`SinkError`].
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Output format selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SinkFormat {
    #[default]
    Csv,
    Jsonl,
}

/// Open a sink of `format` writing to `path`
///
/// # Errors
/// Returns an error if the output file or its directory cannot be created.
pub fn open_sink<M: ProfileMode>(
    format: SinkFormat,
    path: &Path,
    csv: CsvOptions,
) -> Result<Box<dyn ProfileSink<M>>, SinkError> {
    let sink: Box<dyn ProfileSink<M>> = match format {
        SinkFormat::Csv => Box::new(CsvSink::create(path, csv)?),
        SinkFormat::Jsonl => Box::new(JsonLinesSink::create(path)?),
    };
    Ok(sink)
}

/// Where [`open_sink_or`] ended up writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    File(PathBuf),
    /// The output file could not be opened
    Fallback,
}

/// Open a sink of `format` on `path`, or on `fallback` if that fails
///
/// Drained profiles are gone from the store, so an unopenable output file
/// must not lose them: the failure is logged and they go to `fallback`
/// (stderr in the binary) instead.
pub fn open_sink_or<M, W>(
    format: SinkFormat,
    path: &Path,
    csv: CsvOptions,
    fallback: W,
) -> (Box<dyn ProfileSink<M>>, SinkTarget)
where
    M: ProfileMode,
    W: Write + 'static,
{
    match open_sink(format, path, csv.clone()) {
        Ok(sink) => (sink, SinkTarget::File(path.to_path_buf())),
        Err(e) => {
            error!(
                "Failed to open {}: {e}; writing profiles to the fallback output",
                path.display()
            );
            let sink: Box<dyn ProfileSink<M>> = match format {
                SinkFormat::Csv => Box::new(CsvSink::new(fallback, csv)),
                SinkFormat::Jsonl => Box::new(JsonLinesSink::new(fallback)),
            };
            (sink, SinkTarget::Fallback)
        }
    }
}

/// Outcome of [`drain_into`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub written: usize,
    pub failed: usize,
}

/// Drain every profile of `correlator` into `sink`
///
/// Failures on individual records are logged and counted; they do not stop
/// the remaining records from being written.
///
/// # Errors
/// Returns an error only if the header cannot be written or the sink
/// cannot be finished.
pub fn drain_into<M: ProfileMode>(
    correlator: &LifecycleCorrelator<M>,
    sink: &mut dyn ProfileSink<M>,
) -> Result<DrainSummary, SinkError> {
    let profiles = correlator.drain_all_profiles();
    write_all(&profiles, sink)
}

/// Write already drained `profiles` into `sink`, see [`drain_into`]
///
/// # Errors
/// Returns an error only if the header cannot be written or the sink
/// cannot be finished.
pub fn write_all<M: ProfileMode>(
    profiles: &[ProfileRecord<M>],
    sink: &mut dyn ProfileSink<M>,
) -> Result<DrainSummary, SinkError> {
    sink.write_header()?;

    let mut summary = DrainSummary::default();
    for record in profiles {
        match sink.write_record(record) {
            Ok(()) => summary.written += 1,
            Err(e) => {
                error!(
                    "Failed to write profile {} #{} ({}): {e}",
                    record.id, record.exec_number, record.class_name
                );
                summary.failed += 1;
            }
        }
    }

    sink.finish()?;
    info!("Wrote {} {} profiles ({} failed)", summary.written, M::NAME, summary.failed);
    Ok(summary)
}
