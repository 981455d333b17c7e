//! # Symbol Resolution and Anchor Discovery
//!
//! Two kinds of "symbols" meet in this module.
//!
//! **Runtime names** are the function, class and file names the sampled
//! program is executing. They live in the target's heap as length-prefixed
//! string descriptors and are copied out on every tick by [`SymbolResolver`],
//! then deduplicated by a [`SymbolTable`].
//!
//! **Image symbols** are ELF symbols of the runtime binary itself
//! (`executor_globals`, `alloc_globals`). They are looked up once, at
//! activation, to find the [`Anchors`] a sampler reads from.
//!
//! ## Address Translation
//!
//! ELF symbol addresses are link-time addresses. For a position-independent
//! image the kernel loads it at a randomized base, so:
//!
//! ```text
//! Runtime Address = Load Bias + Symbol Address
//! Load Bias       = lowest mapping of the image in /proc/<pid>/maps
//! ```
//!
//! ## Module Structure
//!
//! - **`resolver`**: pointer → length → descriptor copy → interned string
//! - **`intern`**: the [`SymbolTable`] seam and the in-memory [`InternTable`]
//! - **`anchors`**: ELF symbol lookup and heap pointer dereference
//! - **`memory_maps`**: `/proc/<pid>/maps` parsing for the load bias
//!
//! ## References
//!
//! - [Linux `/proc/pid/maps` format](https://man7.org/linux/man-pages/man5/proc.5.html)
//! - [`process_vm_readv(2)`](https://man7.org/linux/man-pages/man2/process_vm_readv.2.html)

pub mod anchors;
pub mod intern;
pub mod memory_maps;
pub mod resolver;

pub use anchors::{resolve_anchors, AnchorOverrides, Anchors, RuntimeImage};
pub use intern::{InternTable, Symbol, SymbolTable};
pub use memory_maps::{parse_memory_maps, MemoryRange};
pub use resolver::SymbolResolver;
