//! Anchor address resolution
//!
//! The sampler needs two fixed addresses inside the target before it can take
//! a single sample:
//!
//! - **heap anchor**: the allocator heap header, whose usage counter gives the
//!   memory figure of every sample
//! - **frame anchor**: the slot inside the executor globals that always points
//!   at the currently executing frame
//!
//! Both are derived once, at activation, from the ELF symbol table of the
//! runtime image (`executor_globals`, `alloc_globals`) plus the image's load
//! bias from `/proc/<pid>/maps`. Either can be supplied explicitly instead,
//! for stripped builds or thread-safe builds where the globals live in
//! thread-local storage. Resolved anchors are not validated: if they are wrong,
//! samples degrade to memory-only.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use object::{Object, ObjectKind, ObjectSegment, ObjectSymbol};
use std::fs;
use std::path::{Path, PathBuf};

use framescope_common::RuntimeLayout;

use super::memory_maps::{parse_memory_maps, MemoryRange};
use crate::domain::Pid;
use crate::remote::{offset, RemoteMemory, RemoteMemoryExt};

/// Executor globals symbol (holds the current-frame slot)
pub const EXECUTOR_GLOBALS: &str = "executor_globals";

/// Allocator globals symbol (first field points at the heap header)
pub const ALLOC_GLOBALS: &str = "alloc_globals";

/// The two remote addresses a sampler is anchored on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchors {
    /// Address of the heap header
    pub heap: u64,
    /// Address of the slot holding the current frame pointer
    pub current_frame: u64,
}

/// Explicit anchor addresses that bypass symbol lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorOverrides {
    pub heap: Option<u64>,
    pub current_frame: Option<u64>,
}

/// Symbol information extracted from the runtime image
#[derive(Debug, Clone)]
pub struct RuntimeImage {
    pub path: PathBuf,
    pub executor_globals: Option<u64>,
    pub alloc_globals: Option<u64>,
    position_independent: bool,
    lowest_vaddr: u64,
}

impl RuntimeImage {
    /// Parse the ELF image at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid object file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data =
            fs::read(path).with_context(|| format!("Failed to read runtime image {}", path.display()))?;
        let mut image = Self::parse(&data)?;
        image.path = path.to_path_buf();
        Ok(image)
    }

    /// Parse an in-memory ELF image
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid object file
    pub fn parse(data: &[u8]) -> Result<Self> {
        let obj = object::File::parse(data).context("Failed to parse object file")?;

        let lookup = |name: &str| {
            obj.symbols()
                .chain(obj.dynamic_symbols())
                .find(|symbol| symbol.name().is_ok_and(|n| n == name) && symbol.address() != 0)
                .map(|symbol| symbol.address())
        };

        let lowest_vaddr = obj.segments().map(|segment| segment.address()).min().unwrap_or(0);

        Ok(Self {
            path: PathBuf::new(),
            executor_globals: lookup(EXECUTOR_GLOBALS),
            alloc_globals: lookup(ALLOC_GLOBALS),
            position_independent: obj.kind() == ObjectKind::Dynamic,
            lowest_vaddr,
        })
    }

    /// Offset between link-time and run-time addresses for this image
    #[must_use]
    pub fn load_bias(&self, range: MemoryRange) -> u64 {
        if self.position_independent {
            range.start.saturating_sub(self.lowest_vaddr & !0xfff)
        } else {
            0
        }
    }
}

/// Resolve the heap and current-frame anchors of `pid`
///
/// Overrides win over symbol lookup. The runtime image is only loaded when
/// at least one anchor still needs a symbol. The heap anchor is one remote
/// read away from `alloc_globals`, so it depends on the target being live.
///
/// # Errors
/// Returns an error if a required symbol is missing, the image is not mapped
/// in the target, or the heap pointer cannot be read.
pub fn resolve_anchors<M: RemoteMemory + ?Sized>(
    memory: &M,
    pid: Pid,
    image_path: &Path,
    layout: &RuntimeLayout,
    overrides: AnchorOverrides,
) -> Result<Anchors> {
    if let (Some(heap), Some(current_frame)) = (overrides.heap, overrides.current_frame) {
        info!("Using explicit anchors: heap=0x{heap:x} frame=0x{current_frame:x}");
        return Ok(Anchors { heap, current_frame });
    }

    let image = RuntimeImage::load(image_path)?;
    let image_name = image_path.to_string_lossy();
    let bias = match parse_memory_maps(pid, &image_name) {
        Ok(range) => image.load_bias(range),
        Err(e) if image.position_independent => return Err(e),
        Err(e) => {
            warn!("{e}; assuming a non-relocated image");
            0
        }
    };

    let current_frame = match overrides.current_frame {
        Some(address) => address,
        None => {
            let Some(globals) = image.executor_globals else {
                bail!(
                    "Symbol `{EXECUTOR_GLOBALS}` not found in {}.\n\n\
                     The binary may be stripped or a thread-safe build; pass --frame-anchor",
                    image_name
                );
            };
            offset(globals.wrapping_add(bias), layout.executor.current_frame)?
        }
    };

    let heap = match overrides.heap {
        Some(address) => address,
        None => {
            let Some(globals) = image.alloc_globals else {
                bail!(
                    "Symbol `{ALLOC_GLOBALS}` not found in {}.\n\n\
                     Pass --heap-anchor to sample without symbols",
                    image_name
                );
            };
            let heap = memory
                .read_u64(pid, globals.wrapping_add(bias))
                .context("Failed to read the heap pointer from the target")?;
            if heap == 0 {
                bail!("Heap of {pid} is not initialized yet");
            }
            heap
        }
    };

    info!("Resolved anchors for {pid}: heap=0x{heap:x} frame=0x{current_frame:x} (bias 0x{bias:x})");
    Ok(Anchors { heap, current_frame })
}
