//! Remote string resolution
//!
//! Strings in the target are length-prefixed descriptors referenced through a
//! pointer field of some other structure. The length is unknown until the
//! pointer has been followed, so resolution always takes three reads:
//!
//! ```text
//! base + field_offset ──▶ descriptor pointer
//! descriptor + len    ──▶ payload length
//! descriptor          ──▶ header + payload + NUL (aligned), one copy
//! ```
//!
//! The length is checked again inside the full copy. A mismatch means the
//! descriptor was freed or reused between the reads, and the whole resolution
//! fails rather than returning a torn string.

use framescope_common::{StringLayout, MAX_STRING_LENGTH};

use super::intern::{Symbol, SymbolTable};
use crate::domain::{Pid, ReadError};
use crate::remote::{field_u64, offset, RemoteMemory, RemoteMemoryExt};

/// Follows string fields in the target and interns the result
pub struct SymbolResolver<T> {
    layout: StringLayout,
    table: T,
}

impl<T: SymbolTable> SymbolResolver<T> {
    pub fn new(layout: StringLayout, table: T) -> Self {
        Self { layout, table }
    }

    /// Resolve the string whose descriptor pointer sits at `base + field_offset`
    ///
    /// # Errors
    /// Any failed hop, a null descriptor pointer, an oversized length, or a
    /// descriptor that changed between the length read and the full copy.
    pub fn read_string<M: RemoteMemory + ?Sized>(
        &self,
        memory: &M,
        pid: Pid,
        base: u64,
        field_offset: usize,
    ) -> Result<Symbol, ReadError> {
        let descriptor = memory.read_u64(pid, offset(base, field_offset)?)?;
        if descriptor == 0 {
            return Err(ReadError::NullPointer);
        }

        let length = memory.read_u64(pid, offset(descriptor, self.layout.len)?)?;
        let len = usize::try_from(length)
            .ok()
            .filter(|&len| len <= MAX_STRING_LENGTH)
            .ok_or(ReadError::StringTooLong(length))?;
        let size = self.layout.descriptor_size(len).ok_or(ReadError::StringTooLong(length))?;

        let mut copy = vec![0u8; size];
        memory.read(pid, descriptor, &mut copy)?;

        if field_u64(&copy, self.layout.len) != Some(length) {
            return Err(ReadError::StringChanged(descriptor));
        }
        let payload = copy
            .get(self.layout.val..self.layout.val + len)
            .ok_or(ReadError::StringChanged(descriptor))?;

        Ok(self.table.intern(payload))
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryImage;
    use crate::symbolization::InternTable;
    use framescope_common::PHP_80;
    use std::sync::Arc;

    const PID: Pid = Pid(4242);
    const OWNER: u64 = 0x1000;
    const DESCRIPTOR: u64 = 0x2000;

    fn descriptor(text: &str) -> Vec<u8> {
        let layout = PHP_80.string;
        let mut bytes = vec![0u8; layout.descriptor_size(text.len()).unwrap()];
        bytes[layout.len..layout.len + 8].copy_from_slice(&(text.len() as u64).to_ne_bytes());
        bytes[layout.val..layout.val + text.len()].copy_from_slice(text.as_bytes());
        bytes
    }

    fn setup(text: &str) -> (MemoryImage, SymbolResolver<Arc<InternTable>>) {
        let image = MemoryImage::new();
        let mut owner = vec![0u8; 32];
        owner[8..16].copy_from_slice(&DESCRIPTOR.to_ne_bytes());
        image.map(OWNER, owner);
        image.map(DESCRIPTOR, descriptor(text));
        (image, SymbolResolver::new(PHP_80.string, Arc::new(InternTable::new())))
    }

    #[test]
    fn test_resolves_and_interns() {
        let (image, resolver) = setup("handle");

        let first = resolver.read_string(&image, PID, OWNER, 8).unwrap();
        let second = resolver.read_string(&image, PID, OWNER, 8).unwrap();

        assert_eq!(&*first, "handle");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.table().len(), 1);
    }

    #[test]
    fn test_null_descriptor_fails() {
        let (image, resolver) = setup("handle");
        // Offset 0 of the owner holds a null pointer
        let err = resolver.read_string(&image, PID, OWNER, 0).unwrap_err();
        assert!(matches!(err, ReadError::NullPointer));
    }

    #[test]
    fn test_oversized_length_fails_without_copy() {
        let (image, resolver) = setup("handle");
        image.write_u64(DESCRIPTOR + PHP_80.string.len as u64, (MAX_STRING_LENGTH + 1) as u64);

        let err = resolver.read_string(&image, PID, OWNER, 8).unwrap_err();
        assert!(matches!(err, ReadError::StringTooLong(_)));
        assert_eq!(image.reads(), 2);
    }

    #[test]
    fn test_truncated_descriptor_fails() {
        let (image, resolver) = setup("handle");
        // Claim a longer payload than the mapped descriptor holds
        image.write_u64(DESCRIPTOR + PHP_80.string.len as u64, 64);

        assert!(resolver.read_string(&image, PID, OWNER, 8).is_err());
        assert!(resolver.table().is_empty());
    }

    #[test]
    fn test_unreadable_descriptor_fails() {
        let (image, resolver) = setup("handle");
        image.inject_fault(DESCRIPTOR + PHP_80.string.val as u64, 1);

        assert!(resolver.read_string(&image, PID, OWNER, 8).is_err());
        assert!(resolver.table().is_empty());
    }
}
