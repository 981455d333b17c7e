//! Sample records handed to the output buffer
//!
//! A [`Sample`] is built locally on the sampler thread and moved into the sink;
//! nothing in it is shared with the target or mutated after insertion.

use std::fmt;

use framescope_common::{ArgSlot, MAX_ARGINFO};

use crate::domain::{Pid, Timestamp};
use crate::symbolization::Symbol;

/// What a sample was able to observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// A tick happened; symbolic detail was unavailable
    MemoryOnly,
    /// Executing compiled user code, with a source location
    UserFunction,
    /// Executing a native function
    InternalFunction,
}

impl SampleKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SampleKind::MemoryOnly => "memory",
            SampleKind::UserFunction => "user",
            SampleKind::InternalFunction => "internal",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Source position of a user function frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: Symbol,
    pub line: u32,
}

/// Names attached to a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Enclosing class, if the function is a method
    pub scope: Option<Symbol>,
    pub function: Symbol,
}

/// Fixed-capacity copy of a frame's leading arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgSnapshot {
    slots: [ArgSlot; MAX_ARGINFO],
    len: usize,
}

impl ArgSnapshot {
    /// Append a slot; returns `false` once the snapshot is full
    pub fn push(&mut self, slot: ArgSlot) -> bool {
        match self.slots.get_mut(self.len) {
            Some(free) => {
                *free = slot;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ArgSlot] {
        &self.slots[..self.len]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One snapshot of the target at a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub pid: Pid,
    pub elapsed: Timestamp,
    pub kind: SampleKind,
    /// Heap usage in bytes (0 if the heap header was unreadable)
    pub memory: u64,
    /// Present only for [`SampleKind::UserFunction`]
    pub location: Option<Location>,
    /// Present for every kind except [`SampleKind::MemoryOnly`]
    pub symbol: Option<SymbolInfo>,
    /// Always empty for [`SampleKind::MemoryOnly`]
    pub args: ArgSnapshot,
}

impl Sample {
    /// A sample with no symbolic detail
    #[must_use]
    pub fn memory_only(pid: Pid, elapsed: Timestamp, memory: u64) -> Self {
        Self {
            pid,
            elapsed,
            kind: SampleKind::MemoryOnly,
            memory,
            location: None,
            symbol: None,
            args: ArgSnapshot::default(),
        }
    }

    /// `Class::function`, `function`, or `None` for memory-only samples
    #[must_use]
    pub fn qualified_name(&self) -> Option<String> {
        let symbol = self.symbol.as_ref()?;
        Some(match &symbol.scope {
            Some(scope) => format!("{scope}::{}", symbol.function),
            None => symbol.function.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_arg_snapshot_is_bounded() {
        let mut args = ArgSnapshot::default();
        for _ in 0..MAX_ARGINFO {
            assert!(args.push(ArgSlot::default()));
        }
        assert!(!args.push(ArgSlot::default()));
        assert_eq!(args.len(), MAX_ARGINFO);

        args.clear();
        assert!(args.is_empty());
        assert!(args.as_slice().is_empty());
    }

    #[test]
    fn test_memory_only_has_no_detail() {
        let sample = Sample::memory_only(Pid(1), Timestamp(5), 2048);
        assert_eq!(sample.kind, SampleKind::MemoryOnly);
        assert!(sample.location.is_none());
        assert!(sample.symbol.is_none());
        assert!(sample.args.is_empty());
        assert_eq!(sample.qualified_name(), None);
    }

    #[test]
    fn test_qualified_name() {
        let mut sample = Sample::memory_only(Pid(1), Timestamp(5), 0);
        sample.kind = SampleKind::InternalFunction;
        sample.symbol = Some(SymbolInfo { scope: None, function: Arc::from("strlen") });
        assert_eq!(sample.qualified_name().as_deref(), Some("strlen"));

        sample.symbol =
            Some(SymbolInfo { scope: Some(Arc::from("App\\Kernel")), function: Arc::from("handle") });
        assert_eq!(sample.qualified_name().as_deref(), Some("App\\Kernel::handle"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SampleKind::MemoryOnly.to_string(), "memory");
        assert_eq!(SampleKind::UserFunction.to_string(), "user");
        assert_eq!(SampleKind::InternalFunction.to_string(), "internal");
    }
}
