//! Structured error types for framescope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Pid;
use thiserror::Error;

/// A single remote read that did not produce the full requested range
///
/// Every variant is transient from the sampler's point of view: the current
/// sample is downgraded and the next tick tries again.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Null remote pointer")]
    NullPointer,

    #[error("Short read from {pid} at 0x{address:x}: copied {copied} of {expected} bytes")]
    Short { pid: Pid, address: u64, copied: usize, expected: usize },

    #[error("Remote read from {pid} at 0x{address:x} ({len} bytes) failed: {source}")]
    Os {
        pid: Pid,
        address: u64,
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote address 0x{address:x} + 0x{offset:x} overflows")]
    AddressOverflow { address: u64, offset: usize },

    #[error("String descriptor length {0} exceeds limit")]
    StringTooLong(u64),

    #[error("String descriptor at 0x{0:x} changed while being copied")]
    StringChanged(u64),
}

/// Sampler lifecycle failures reported by activation
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Sampler for {0} is already active")]
    AlreadyActive(Pid),

    #[error("Sampling interval must be non-zero")]
    ZeroInterval,

    #[error("Failed to spawn sampler thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Invalid sample record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
