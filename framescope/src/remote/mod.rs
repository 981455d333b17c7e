//! # Remote Memory Access
//!
//! Every byte the sampler learns about the target passes through
//! [`RemoteMemory::read`]. The contract is all-or-nothing: either the full
//! destination buffer is filled, or the read fails. There are no retries at
//! this level; callers decide how to degrade.
//!
//! ## Implementations
//!
//! - [`ProcessMemory`]: a live process, via `process_vm_readv(2)`
//! - [`MemoryImage`]: an in-memory address space with fault injection, used to
//!   simulate a target
//!
//! Typed helpers ([`RemoteMemoryExt`]) decode native-endian integers on top of
//! the byte-level primitive, so no other module touches raw pointers.

pub mod image;
pub mod process;

use std::sync::Arc;

use crate::domain::{Pid, ReadError};

pub use image::MemoryImage;
pub use process::ProcessMemory;

/// Byte-level access to another process's address space
pub trait RemoteMemory: Send + Sync {
    /// Copy exactly `buf.len()` bytes from `address` in process `pid`
    ///
    /// # Errors
    /// Fails on a null address, an OS error, or a short copy.
    fn read(&self, pid: Pid, address: u64, buf: &mut [u8]) -> Result<(), ReadError>;
}

impl<M: RemoteMemory + ?Sized> RemoteMemory for Arc<M> {
    fn read(&self, pid: Pid, address: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        (**self).read(pid, address, buf)
    }
}

impl<M: RemoteMemory + ?Sized> RemoteMemory for &M {
    fn read(&self, pid: Pid, address: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        (**self).read(pid, address, buf)
    }
}

/// Typed reads built on [`RemoteMemory::read`]
pub trait RemoteMemoryExt: RemoteMemory {
    /// Read a fixed-size byte array
    ///
    /// # Errors
    /// Propagates the underlying read failure.
    fn read_array<const N: usize>(&self, pid: Pid, address: u64) -> Result<[u8; N], ReadError> {
        let mut buf = [0u8; N];
        self.read(pid, address, &mut buf)?;
        Ok(buf)
    }

    /// Read a native-endian `u64` (also used for pointers and `size_t`)
    ///
    /// # Errors
    /// Propagates the underlying read failure.
    fn read_u64(&self, pid: Pid, address: u64) -> Result<u64, ReadError> {
        self.read_array(pid, address).map(u64::from_ne_bytes)
    }

    /// Read a native-endian `u32`
    ///
    /// # Errors
    /// Propagates the underlying read failure.
    fn read_u32(&self, pid: Pid, address: u64) -> Result<u32, ReadError> {
        self.read_array(pid, address).map(u32::from_ne_bytes)
    }

    /// Read a single byte
    ///
    /// # Errors
    /// Propagates the underlying read failure.
    fn read_u8(&self, pid: Pid, address: u64) -> Result<u8, ReadError> {
        self.read_array::<1>(pid, address).map(|[b]| b)
    }
}

impl<M: RemoteMemory + ?Sized> RemoteMemoryExt for M {}

/// Checked `address + offset`
///
/// # Errors
/// Returns [`ReadError::AddressOverflow`] if the sum does not fit in 64 bits.
pub fn offset(address: u64, offset: usize) -> Result<u64, ReadError> {
    u64::try_from(offset)
        .ok()
        .and_then(|off| address.checked_add(off))
        .ok_or(ReadError::AddressOverflow { address, offset })
}

/// Decode a `u64` field from a locally copied structure
pub(crate) fn field_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    let raw: [u8; 8] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u64::from_ne_bytes(raw))
}

/// Decode a `u32` field from a locally copied structure
pub(crate) fn field_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u32::from_ne_bytes(raw))
}
