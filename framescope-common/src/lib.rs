//! # Remote Runtime Layout (Target ↔ Profiler)
//!
//! Defines the byte offsets the sampler uses to interpret the target runtime's
//! in-memory structures. None of these values are discovered at run time: they
//! are a contract with the exact runtime build being sampled. If a table does
//! not match the target, every read silently degrades to a memory-only sample.
//!
//! ## Structures Covered
//!
//! - **Heap header** - allocator bookkeeping, holds the current usage counter
//! - **Executor globals** - holds the "current execution frame" slot
//! - **Execution frame** - one active call: op pointer, function, argument count
//! - **Function descriptor** - type tag, name, scope, source file
//! - **Op record** - carries the source line of the executing instruction
//! - **Class entry** - holds the class name
//! - **String descriptor** - length-prefixed, inline payload
//!
//! ## Key Types
//!
//! - [`RuntimeLayout`] - one complete offset table for a runtime version
//! - [`ArgSlot`] - one raw argument value copied from behind a frame

#![no_std]

// ============================================================================
// Sampling Constants
// ============================================================================

/// Maximum number of argument slots captured per sample
///
/// Frames reporting more arguments are clamped to this count. The snapshot is
/// a fixed array so a single tick's cost never depends on target state.
pub const MAX_ARGINFO: usize = 4;

/// Size of one argument slot in the target (a tagged value: 8-byte payload,
/// 4-byte type info, 4-byte auxiliary word)
pub const ARG_SLOT_SIZE: usize = 16;

/// Longest string descriptor payload the resolver will copy
///
/// A racing read can observe a garbage length; capping it bounds the size of
/// the local allocation for one tick.
pub const MAX_STRING_LENGTH: usize = 4096;

/// Width of a pointer in the target process
pub const POINTER_SIZE: usize = 8;

// ============================================================================
// Function Type Tags
// ============================================================================

/// **Internal function**: implemented natively by the runtime or an extension
pub const INTERNAL_FUNCTION: u8 = 1;

/// **User function**: compiled from source, has an op array with line numbers
///
/// Any tag other than this one is sampled as an internal function.
pub const USER_FUNCTION: u8 = 2;

// ============================================================================
// Layout Tables
// ============================================================================

/// Allocator heap header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapLayout {
    /// Offset of the current usage counter (`size_t`)
    pub usage: usize,
}

/// Executor globals block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorLayout {
    /// Offset of the pointer to the currently executing frame
    pub current_frame: usize,
}

/// Execution frame (one active call)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Total size of the frame structure; read in one copy
    pub size: usize,
    /// Offset of the pointer to the executing op record
    pub opline: usize,
    /// Offset of the pointer to the function descriptor
    pub func: usize,
    /// Offset of the 32-bit argument count
    pub num_args: usize,
    /// Offset, from the frame start, of the first argument slot
    pub args: usize,
}

/// Function descriptor
///
/// `type_tag`, `name` and `scope` live in the common header shared by user and
/// internal functions; `filename` is only meaningful for user functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionLayout {
    /// Offset of the one-byte type tag
    pub type_tag: usize,
    /// Offset of the pointer to the function name string
    pub name: usize,
    /// Offset of the pointer to the enclosing class entry (may be null)
    pub scope: usize,
    /// Offset of the pointer to the source file name string
    pub filename: usize,
}

/// Op record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpLayout {
    /// Offset of the 32-bit source line number
    pub lineno: usize,
}

/// Class entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayout {
    /// Offset of the pointer to the class name string
    pub name: usize,
}

/// String descriptor: header followed by an inline, NUL-terminated payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringLayout {
    /// Offset of the `size_t` payload length
    pub len: usize,
    /// Offset of the first payload byte (also the header size)
    pub val: usize,
    /// Allocator alignment the descriptor size is rounded up to
    pub alignment: usize,
}

impl StringLayout {
    /// Number of bytes occupied by a descriptor holding `len` payload bytes
    ///
    /// Header, payload and terminator, rounded up to the allocator alignment.
    /// Returns `None` on overflow.
    #[must_use]
    pub const fn descriptor_size(&self, len: usize) -> Option<usize> {
        let Some(raw) = self.val.checked_add(len) else {
            return None;
        };
        let Some(raw) = raw.checked_add(1) else {
            return None;
        };
        let mask = self.alignment - 1;
        match raw.checked_add(mask) {
            Some(padded) => Some(padded & !mask),
            None => None,
        }
    }
}

/// Complete offset table for one target runtime version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLayout {
    /// Short identifier, used for selection on the command line
    pub name: &'static str,
    pub heap: HeapLayout,
    pub executor: ExecutorLayout,
    pub frame: FrameLayout,
    pub function: FunctionLayout,
    pub op: OpLayout,
    pub class: ClassLayout,
    pub string: StringLayout,
}

const STRING_64: StringLayout = StringLayout { len: 16, val: 24, alignment: 8 };

/// 7.4 series, x86-64, non-thread-safe build
pub const PHP_74: RuntimeLayout = RuntimeLayout {
    name: "php74",
    heap: HeapLayout { usage: 16 },
    executor: ExecutorLayout { current_frame: 488 },
    frame: FrameLayout { size: 72, opline: 0, func: 24, num_args: 44, args: 80 },
    function: FunctionLayout { type_tag: 0, name: 8, scope: 16, filename: 136 },
    op: OpLayout { lineno: 24 },
    class: ClassLayout { name: 8 },
    string: STRING_64,
};

/// 8.0 series, x86-64, non-thread-safe build
///
/// The frame grows by one pointer (extra named parameters); argument slots
/// still start at the sixth value slot. The shared function header gains an
/// attributes table pointer at 48, so every op-array field after it, the
/// filename included, moves down by one pointer.
pub const PHP_80: RuntimeLayout = RuntimeLayout {
    name: "php80",
    heap: HeapLayout { usage: 16 },
    executor: ExecutorLayout { current_frame: 488 },
    frame: FrameLayout { size: 80, opline: 0, func: 24, num_args: 44, args: 80 },
    function: FunctionLayout { type_tag: 0, name: 8, scope: 16, filename: 144 },
    op: OpLayout { lineno: 24 },
    class: ClassLayout { name: 8 },
    string: STRING_64,
};

/// All known layouts, newest first
pub static LAYOUTS: [RuntimeLayout; 2] = [PHP_80, PHP_74];

impl RuntimeLayout {
    /// Look up a layout table by its short name
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static RuntimeLayout> {
        LAYOUTS.iter().find(|layout| layout.name == name)
    }
}

// ============================================================================
// Argument Slots
// ============================================================================

/// One raw argument value copied verbatim from the target
///
/// The payload is never dereferenced: for scalar types `value_word` is the
/// value itself, for everything else it is a remote pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgSlot(pub [u8; ARG_SLOT_SIZE]);

impl ArgSlot {
    /// The 8-byte payload word
    #[must_use]
    pub fn value_word(&self) -> u64 {
        let [b0, b1, b2, b3, b4, b5, b6, b7, ..] = self.0;
        u64::from_ne_bytes([b0, b1, b2, b3, b4, b5, b6, b7])
    }

    /// The runtime's type tag for this value
    #[must_use]
    pub fn type_tag(&self) -> u8 {
        self.0[8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_size_rounds_to_alignment() {
        // 24-byte header + 5 payload + NUL = 30 -> 32
        assert_eq!(STRING_64.descriptor_size(5), Some(32));
        // 24 + 7 + 1 = 32, already aligned
        assert_eq!(STRING_64.descriptor_size(7), Some(32));
        assert_eq!(STRING_64.descriptor_size(8), Some(40));
        assert_eq!(STRING_64.descriptor_size(0), Some(32));
    }

    #[test]
    fn test_descriptor_size_overflow() {
        assert_eq!(STRING_64.descriptor_size(usize::MAX), None);
    }

    #[test]
    fn test_layout_lookup() {
        assert_eq!(RuntimeLayout::by_name("php74"), Some(&PHP_74));
        assert_eq!(RuntimeLayout::by_name("php80"), Some(&PHP_80));
        assert!(RuntimeLayout::by_name("php5").is_none());
    }

    #[test]
    fn test_php80_function_header_growth() {
        // Fields of the shared header are unaffected
        assert_eq!(PHP_80.function.type_tag, PHP_74.function.type_tag);
        assert_eq!(PHP_80.function.name, PHP_74.function.name);
        assert_eq!(PHP_80.function.scope, PHP_74.function.scope);
        // The attributes pointer pushes the op-array filename by one pointer
        assert_eq!(PHP_80.function.filename, PHP_74.function.filename + POINTER_SIZE);
        assert_eq!(PHP_80.function.filename, 144);
    }

    #[test]
    fn test_args_follow_frame() {
        for layout in LAYOUTS {
            assert!(layout.frame.args >= layout.frame.size);
            assert_eq!(layout.frame.args % ARG_SLOT_SIZE, 0);
        }
    }

    #[test]
    fn test_arg_slot_decoding() {
        let mut raw = [0u8; ARG_SLOT_SIZE];
        raw[..8].copy_from_slice(&42u64.to_ne_bytes());
        raw[8] = 4;
        let slot = ArgSlot(raw);
        assert_eq!(slot.value_word(), 42);
        assert_eq!(slot.type_tag(), 4);
    }
}
