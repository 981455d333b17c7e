//! In-memory address space standing in for a target process
//!
//! Regions are mapped at arbitrary remote addresses and can be rewritten while
//! a sampler is running. Fault ranges and an offline switch let callers make
//! specific reads fail, the way a racing or exiting target would.

use std::collections::BTreeMap;
use std::io;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use super::RemoteMemory;
use crate::domain::{Pid, ReadError};

#[derive(Debug, Default)]
struct ImageState {
    regions: BTreeMap<u64, Vec<u8>>,
    faults: Vec<Range<u64>>,
    offline: bool,
}

/// Simulated remote address space
#[derive(Debug, Default)]
pub struct MemoryImage {
    state: RwLock<ImageState>,
    reads: AtomicUsize,
}

impl MemoryImage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `base`, replacing any region starting there
    pub fn map(&self, base: u64, bytes: Vec<u8>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).regions.insert(base, bytes);
    }

    /// Overwrite bytes inside an existing region
    ///
    /// Returns `false` if the range is not fully mapped.
    pub fn write(&self, address: u64, bytes: &[u8]) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some((&base, region)) = state.regions.range_mut(..=address).next_back() else {
            return false;
        };
        let Ok(start) = usize::try_from(address - base) else {
            return false;
        };
        let Some(target) = start
            .checked_add(bytes.len())
            .and_then(|end| region.get_mut(start..end))
        else {
            return false;
        };
        target.copy_from_slice(bytes);
        true
    }

    pub fn write_u64(&self, address: u64, value: u64) -> bool {
        self.write(address, &value.to_ne_bytes())
    }

    pub fn write_u32(&self, address: u64, value: u32) -> bool {
        self.write(address, &value.to_ne_bytes())
    }

    /// Make every read overlapping `[address, address + len)` fail
    pub fn inject_fault(&self, address: u64, len: u64) {
        let end = address.saturating_add(len);
        self.state.write().unwrap_or_else(PoisonError::into_inner).faults.push(address..end);
    }

    pub fn clear_faults(&self) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).faults.clear();
    }

    /// Simulate the target exiting (`true`) or coming back (`false`)
    pub fn set_offline(&self, offline: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).offline = offline;
    }

    /// Number of reads attempted so far, successful or not
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

fn os_error(pid: Pid, address: u64, len: usize, errno: i32) -> ReadError {
    ReadError::Os { pid, address, len, source: io::Error::from_raw_os_error(errno) }
}

impl RemoteMemory for MemoryImage {
    fn read(&self, pid: Pid, address: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        if address == 0 {
            return Err(ReadError::NullPointer);
        }
        self.reads.fetch_add(1, Ordering::Relaxed);

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.offline {
            return Err(os_error(pid, address, buf.len(), libc::ESRCH));
        }

        let len = buf.len() as u64;
        let end = address.saturating_add(len);
        if state.faults.iter().any(|fault| fault.start < end && address < fault.end) {
            return Err(os_error(pid, address, buf.len(), libc::EFAULT));
        }

        let Some((&base, region)) = state.regions.range(..=address).next_back() else {
            return Err(os_error(pid, address, buf.len(), libc::EFAULT));
        };

        let start = usize::try_from(address - base).unwrap_or(usize::MAX);
        let available = region.get(start..).unwrap_or(&[]);
        match available.get(..buf.len()) {
            Some(bytes) => {
                buf.copy_from_slice(bytes);
                Ok(())
            }
            None if available.is_empty() => Err(os_error(pid, address, buf.len(), libc::EFAULT)),
            None => Err(ReadError::Short {
                pid,
                address,
                copied: available.len(),
                expected: buf.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID: Pid = Pid(100);

    #[test]
    fn test_read_within_region() {
        let image = MemoryImage::new();
        image.map(0x1000, (0u8..32).collect());

        let mut buf = [0u8; 4];
        image.read(PID, 0x1004, &mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6, 7]);
    }

    #[test]
    fn test_read_past_region_end_is_short() {
        let image = MemoryImage::new();
        image.map(0x1000, vec![1; 8]);

        let mut buf = [0u8; 8];
        let err = image.read(PID, 0x1004, &mut buf).unwrap_err();
        assert!(matches!(err, ReadError::Short { copied: 4, expected: 8, .. }));
    }

    #[test]
    fn test_unmapped_and_null() {
        let image = MemoryImage::new();
        image.map(0x1000, vec![1; 8]);

        let mut buf = [0u8; 1];
        assert!(image.read(PID, 0x0800, &mut buf).is_err());
        assert!(image.read(PID, 0x2000, &mut buf).is_err());
        assert!(matches!(image.read(PID, 0, &mut buf), Err(ReadError::NullPointer)));
        // Null never reaches the address space
        assert_eq!(image.reads(), 2);
    }

    #[test]
    fn test_fault_injection_and_offline() {
        let image = MemoryImage::new();
        image.map(0x1000, vec![0; 64]);
        image.inject_fault(0x1010, 8);

        let mut buf = [0u8; 8];
        assert!(image.read(PID, 0x1000, &mut buf).is_ok());
        assert!(image.read(PID, 0x100c, &mut buf).is_err());
        image.clear_faults();
        assert!(image.read(PID, 0x100c, &mut buf).is_ok());

        image.set_offline(true);
        assert!(image.read(PID, 0x1000, &mut buf).is_err());
        image.set_offline(false);
        assert!(image.read(PID, 0x1000, &mut buf).is_ok());
    }

    #[test]
    fn test_write_in_place() {
        let image = MemoryImage::new();
        image.map(0x1000, vec![0; 16]);

        assert!(image.write_u64(0x1008, 77));
        assert!(!image.write_u64(0x100c, 1));
        assert!(!image.write_u32(0x3000, 1));

        let mut buf = [0u8; 8];
        image.read(PID, 0x1008, &mut buf).unwrap();
        assert_eq!(u64::from_ne_bytes(buf), 77);
    }
}
