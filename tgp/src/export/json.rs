//! JSON-lines profile sink: one object per profile, no header

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::ProfileSink;
use crate::domain::SinkError;
use crate::profile::{ProfileMode, ProfileRecord};

pub struct JsonLinesSink<W: Write> {
    writer: Option<W>,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (truncate) `path`, creating missing parent directories
    ///
    /// # Errors
    /// Returns [`SinkError::CreateDir`] or [`SinkError::Io`] if the file
    /// cannot be created.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|source| SinkError::CreateDir { path: dir.to_path_buf(), source })?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer: Some(writer) }
    }

    /// # Errors
    /// Returns [`SinkError::Closed`] if the sink was already finished.
    pub fn into_inner(mut self) -> Result<W, SinkError> {
        self.writer.take().ok_or(SinkError::Closed)
    }
}

impl<M: ProfileMode, W: Write> ProfileSink<M> for JsonLinesSink<W> {
    fn write_header(&mut self) -> Result<(), SinkError> {
        if self.writer.is_none() {
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    fn write_record(&mut self, record: &ProfileRecord<M>) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let mut writer = self.writer.take().ok_or(SinkError::Closed)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionOrdinal, IdentityHash};
    use crate::profile::{CallingContextProfile, GranularityProfile};

    #[test]
    fn test_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let mut first =
            ProfileRecord::<CallingContextProfile>::prefilled("demo::Job", ExecutionOrdinal::FIRST);
        first.id = IdentityHash(42);
        first.mode.cc_exec = Some("run!".to_string());
        let second = ProfileRecord::<CallingContextProfile>::prefilled(
            "demo::Job",
            ExecutionOrdinal::FIRST.next().unwrap(),
        );
        sink.write_record(&first).unwrap();
        sink.write_record(&second).unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 42);
        assert_eq!(lines[0]["cc_exec"], "run!");
        assert_eq!(lines[1]["exec_number"], 2);
        assert!(lines[1]["cc_exec"].is_null());
    }

    #[test]
    fn test_granularity_fields_are_flattened() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let record =
            ProfileRecord::<GranularityProfile>::prefilled("demo::Job", ExecutionOrdinal::FIRST);
        sink.write_record(&record).unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["class_name"], "demo::Job");
        assert_eq!(value["granularity"], 0);
        assert_eq!(value["entry_execution_time"], -1);
    }

    #[test]
    fn test_finish_closes() {
        let mut sink = JsonLinesSink::new(Vec::new());
        ProfileSink::<GranularityProfile>::finish(&mut sink).unwrap();
        assert!(matches!(
            ProfileSink::<GranularityProfile>::write_header(&mut sink),
            Err(SinkError::Closed)
        ));
    }
}
