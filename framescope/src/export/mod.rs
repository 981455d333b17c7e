//! Sample export functionality
//!
//! This module provides functionality for exporting samples to files.
//! Currently supports JSON Lines, one object per sample.

pub mod json_lines;

pub use json_lines::{read_records, ArgRecord, SampleRecord, SampleWriter};
