//! JSON Lines sample export
//!
//! One JSON object per line, one line per sample, written as samples arrive so
//! a long run never buffers its whole history. Memory-only samples keep their
//! place in the stream; their symbolic fields are simply absent.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use crate::domain::ExportError;
use crate::profiling::Sample;

/// One captured argument slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgRecord {
    /// Runtime type tag of the value
    #[serde(rename = "type")]
    pub type_tag: u8,
    /// Raw payload word (scalar value or remote pointer)
    pub value: u64,
}

/// Serialized view of a [`Sample`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// "memory", "user" or "internal"
    pub kind: String,
    pub pid: i32,
    pub elapsed_ns: u64,
    /// Heap usage in bytes
    pub memory: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub args: Vec<ArgRecord>,
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        let symbol = sample.symbol.as_ref();
        Self {
            kind: sample.kind.as_str().to_string(),
            pid: sample.pid.0,
            elapsed_ns: sample.elapsed.0,
            memory: sample.memory,
            file: sample.location.as_ref().map(|loc| loc.file.to_string()),
            line: sample.location.as_ref().map(|loc| loc.line),
            scope: symbol.and_then(|s| s.scope.as_ref()).map(ToString::to_string),
            function: symbol.map(|s| s.function.to_string()),
            args: sample
                .args
                .as_slice()
                .iter()
                .map(|slot| ArgRecord { type_tag: slot.type_tag(), value: slot.value_word() })
                .collect(),
        }
    }
}

/// Streams samples as JSON Lines
pub struct SampleWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> SampleWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Append one sample
    ///
    /// # Errors
    /// Returns an error if serialization or the underlying write fails
    pub fn write(&mut self, sample: &Sample) -> Result<(), ExportError> {
        serde_json::to_writer(&mut self.writer, &SampleRecord::from(sample))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Number of samples written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the underlying writer
    ///
    /// # Errors
    /// Returns an error if the final flush fails
    pub fn finish(mut self) -> Result<W, ExportError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Read back a JSON Lines export, skipping blank lines
///
/// # Errors
/// Returns an error on I/O failure or a malformed line
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<SampleRecord>, ExportError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|source| ExportError::InvalidRecord { line: index + 1, source })?;
        records.push(record);
    }
    Ok(records)
}
