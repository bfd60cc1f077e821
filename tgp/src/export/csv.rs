//! CSV profile sink
//!
//! Every line is `[prefix,]col,col,...[,suffix]`. Prefix and suffix are
//! fixed strings from [`CsvOptions`] (e.g. a benchmark name and run number)
//! so files from several runs can be concatenated. The header line uses its
//! own prefix/suffix pair.
//!
//! The first line written fixes the column count; later lines with a
//! different count are rejected. [`split_line`] reads a line back into its
//! fields.

use log::debug;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::ProfileSink;
use crate::domain::SinkError;
use crate::profile::{ProfileMode, ProfileRecord};

const SEPARATOR: char = ',';

/// Line layout and file handling for [`CsvSink`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub print_header: bool,
    /// Append to an existing file instead of truncating it
    pub append: bool,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub prefix_header: Option<String>,
    pub suffix_header: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            print_header: true,
            append: false,
            prefix: None,
            suffix: None,
            prefix_header: None,
            suffix_header: None,
        }
    }
}

/// Writes profiles as comma-separated lines
pub struct CsvSink<W: Write> {
    writer: Option<W>,
    options: CsvOptions,
    columns: Option<usize>,
}

impl CsvSink<BufWriter<File>> {
    /// Open `path` for writing, creating missing parent directories
    ///
    /// # Errors
    /// Returns [`SinkError::CreateDir`] or [`SinkError::Io`] if the file
    /// cannot be opened.
    pub fn create(path: &Path, options: CsvOptions) -> Result<Self, SinkError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|source| SinkError::CreateDir { path: dir.to_path_buf(), source })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(options.append)
            .truncate(!options.append)
            .open(path)?;
        debug!("Writing CSV profiles to {} (append: {})", path.display(), options.append);
        Ok(Self::new(BufWriter::new(file), options))
    }
}

impl<W: Write> CsvSink<W> {
    #[must_use]
    pub fn new(writer: W, options: CsvOptions) -> Self {
        Self { writer: Some(writer), options, columns: None }
    }

    #[must_use]
    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Column count fixed by the first line, if any was written
    #[must_use]
    pub fn columns(&self) -> Option<usize> {
        self.columns
    }

    /// Recover the underlying writer
    ///
    /// # Errors
    /// Returns [`SinkError::Closed`] if the sink was already finished.
    pub fn into_inner(mut self) -> Result<W, SinkError> {
        self.writer.take().ok_or(SinkError::Closed)
    }

    fn check_columns(&mut self, got: usize) -> Result<(), SinkError> {
        if got == 0 {
            return Err(SinkError::EmptyRow);
        }
        match self.columns {
            Some(expected) if expected != got => Err(SinkError::ColumnMismatch { expected, got }),
            Some(_) => Ok(()),
            None => {
                self.columns = Some(got);
                Ok(())
            }
        }
    }

    fn write_line<S: AsRef<str>>(
        &mut self,
        prefix: Option<&str>,
        columns: &[S],
        suffix: Option<&str>,
    ) -> Result<(), SinkError> {
        if self.writer.is_none() {
            return Err(SinkError::Closed);
        }
        self.check_columns(columns.len())?;

        let mut line = String::new();
        let fields = prefix
            .into_iter()
            .chain(columns.iter().map(|c| c.as_ref()))
            .chain(suffix);
        for (i, field) in fields.enumerate() {
            if i > 0 {
                line.push(SEPARATOR);
            }
            push_field(&mut line, field);
        }
        line.push('\n');

        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Write a header line with the header prefix/suffix
    ///
    /// # Errors
    /// Fails on a closed sink, an empty or mismatched column list, or I/O.
    pub fn write_header_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<(), SinkError> {
        let prefix = self.options.prefix_header.clone();
        let suffix = self.options.suffix_header.clone();
        self.write_line(prefix.as_deref(), columns, suffix.as_deref())
    }

    /// Write a data line with the record prefix/suffix
    ///
    /// # Errors
    /// Fails on a closed sink, an empty or mismatched column list, or I/O.
    pub fn write_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<(), SinkError> {
        let prefix = self.options.prefix.clone();
        let suffix = self.options.suffix.clone();
        self.write_line(prefix.as_deref(), columns, suffix.as_deref())
    }
}

/// Quote a field only when it would break the line structure
fn push_field(line: &mut String, field: &str) {
    if field.contains([SEPARATOR, '"', '\n', '\r']) {
        line.push('"');
        line.push_str(&field.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(field);
    }
}

/// Split one line written by [`CsvSink`] back into its fields
#[must_use]
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            SEPARATOR if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

impl<M: ProfileMode, W: Write> ProfileSink<M> for CsvSink<W> {
    fn write_header(&mut self) -> Result<(), SinkError> {
        if self.options.print_header {
            self.write_header_columns(M::header())?;
        }
        Ok(())
    }

    fn write_record(&mut self, record: &ProfileRecord<M>) -> Result<(), SinkError> {
        self.write_columns(&record.to_row())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let mut writer = self.writer.take().ok_or(SinkError::Closed)?;
        writer.flush()?;
        Ok(())
    }
}
