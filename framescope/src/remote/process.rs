//! Live-process reads via `process_vm_readv(2)`

use std::io;

use log::trace;

use super::RemoteMemory;
use crate::domain::{Pid, ReadError};

/// Reads another process's memory without stopping it
///
/// Requires the same permissions as `ptrace` attach (same uid and a
/// permissive `kernel.yama.ptrace_scope`, or `CAP_SYS_PTRACE`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl RemoteMemory for ProcessMemory {
    #[cfg(target_os = "linux")]
    fn read(&self, pid: Pid, address: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        if address == 0 {
            return Err(ReadError::NullPointer);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let remote_base = usize::try_from(address)
            .map_err(|_| ReadError::AddressOverflow { address, offset: 0 })?;

        let local = libc::iovec { iov_base: buf.as_mut_ptr().cast(), iov_len: buf.len() };
        let remote = libc::iovec { iov_base: remote_base as *mut libc::c_void, iov_len: buf.len() };

        // SAFETY: `local` describes exactly the caller's writable buffer, and the
        // kernel validates the remote range against the target's mappings.
        #[allow(unsafe_code)]
        let copied = unsafe { libc::process_vm_readv(pid.0, &local, 1, &remote, 1, 0) };

        let Ok(copied) = usize::try_from(copied) else {
            let source = io::Error::last_os_error();
            trace!("process_vm_readv({pid}, 0x{address:x}, {}) failed: {source}", buf.len());
            return Err(ReadError::Os { pid, address, len: buf.len(), source });
        };

        if copied != buf.len() {
            return Err(ReadError::Short { pid, address, copied, expected: buf.len() });
        }

        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn read(&self, pid: Pid, address: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        Err(ReadError::Os {
            pid,
            address,
            len: buf.len(),
            source: io::Error::new(io::ErrorKind::Unsupported, "process_vm_readv is Linux-only"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Skip when the sandbox forbids `process_vm_readv` even on ourselves.
    fn permitted(err: &ReadError) -> bool {
        !matches!(
            err,
            ReadError::Os { source, .. }
                if matches!(source.raw_os_error(), Some(libc::EPERM | libc::ENOSYS))
        )
    }

    #[test]
    fn test_null_address_rejected() {
        let mut buf = [0u8; 8];
        let result = ProcessMemory.read(Pid::current(), 0, &mut buf);
        assert!(matches!(result, Err(ReadError::NullPointer)));
    }

    #[test]
    fn test_read_own_memory() {
        let source: [u8; 8] = *b"sampled!";
        let address = source.as_ptr() as u64;
        let mut buf = [0u8; 8];

        match ProcessMemory.read(Pid::current(), address, &mut buf) {
            Ok(()) => assert_eq!(&buf, b"sampled!"),
            Err(err) if !permitted(&err) => eprintln!("skipping: {err}"),
            Err(err) => panic!("unexpected read failure: {err}"),
        }
    }

    #[test]
    fn test_read_nonexistent_process() {
        let source = 0u64;
        let mut buf = [0u8; 8];
        let result = ProcessMemory.read(Pid(999_999_999), std::ptr::addr_of!(source) as u64, &mut buf);
        assert!(result.is_err());
    }
}
