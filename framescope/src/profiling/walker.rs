//! # Frame Walker
//!
//! Reconstructs one sample per tick by chasing pointers through the target:
//!
//! ```text
//! heap anchor ─────────────▶ usage counter                      (memory)
//! frame anchor ──▶ frame ──▶ function ──▶ type tag
//!                    │          ├──▶ filename descriptor        (user only)
//!                    │          ├──▶ scope ──▶ class name       (optional)
//!                    │          └──▶ name descriptor
//!                    ├──▶ op record ──▶ line number              (user only)
//!                    └──▶ argument slots                         (optional)
//! ```
//!
//! The target keeps running while this happens, so any hop may observe a
//! freed or reused address. The walk is a single fallible pipeline: the first
//! failure abandons everything collected after the heap read and the tick is
//! published as [`SampleKind::MemoryOnly`]. Kinds only ever degrade; a sample
//! never mixes fields from a successful and a failed walk.
//!
//! Argument capture is the one exception: a failed argument read only empties
//! the argument list.

use std::time::Instant;

use framescope_common::{ArgSlot, RuntimeLayout, ARG_SLOT_SIZE, MAX_ARGINFO, USER_FUNCTION};
use log::trace;
use thiserror::Error;

use super::sample::{ArgSnapshot, Location, Sample, SampleKind, SymbolInfo};
use super::SamplerConfig;
use crate::domain::{Pid, ReadError, Timestamp};
use crate::remote::{field_u32, field_u64, offset, RemoteMemory, RemoteMemoryExt};
use crate::symbolization::{Anchors, SymbolResolver, SymbolTable};

/// Why a walk stopped short
#[derive(Error, Debug)]
enum Downgrade {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("No current frame")]
    NoFrame,

    #[error("Frame has no source line yet")]
    NoSourceLine,

    #[error("Function has an empty name")]
    EmptyName,

    #[error("Layout field `{0}` lies outside the frame")]
    Layout(&'static str),
}

/// Everything a successful walk collects beyond the heap figure
struct FrameDetail {
    kind: SampleKind,
    location: Option<Location>,
    symbol: SymbolInfo,
    args: ArgSnapshot,
}

/// Builds samples for one target process
pub struct FrameWalker<M, T> {
    pid: Pid,
    anchors: Anchors,
    layout: RuntimeLayout,
    capture_args: bool,
    memory: M,
    resolver: SymbolResolver<T>,
    started: Instant,
}

impl<M: RemoteMemory, T: SymbolTable> FrameWalker<M, T> {
    pub fn new(config: &SamplerConfig, memory: M, symbols: T) -> Self {
        Self {
            pid: config.pid,
            anchors: config.anchors,
            layout: config.layout,
            capture_args: config.capture_args,
            memory,
            resolver: SymbolResolver::new(config.layout.string, symbols),
            started: Instant::now(),
        }
    }

    /// Take one sample; never fails, degrades instead
    pub fn sample(&self) -> Sample {
        let elapsed = Timestamp::from_duration(self.started.elapsed());

        let memory = match self.read_heap_usage() {
            Ok(memory) => memory,
            Err(e) => {
                trace!("{}: heap unreadable, memory-only sample: {e}", self.pid);
                return Sample::memory_only(self.pid, elapsed, 0);
            }
        };

        match self.walk() {
            Ok(detail) => Sample {
                pid: self.pid,
                elapsed,
                kind: detail.kind,
                memory,
                location: detail.location,
                symbol: Some(detail.symbol),
                args: detail.args,
            },
            Err(e) => {
                trace!("{}: memory-only sample: {e}", self.pid);
                Sample::memory_only(self.pid, elapsed, memory)
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    fn read_heap_usage(&self) -> Result<u64, ReadError> {
        let address = offset(self.anchors.heap, self.layout.heap.usage)?;
        self.memory.read_u64(self.pid, address)
    }

    fn walk(&self) -> Result<FrameDetail, Downgrade> {
        let pid = self.pid;
        let layout = &self.layout;
        let memory = &self.memory;

        let fp = memory.read_u64(pid, self.anchors.current_frame)?;
        if fp == 0 {
            return Err(Downgrade::NoFrame);
        }

        let mut frame = vec![0u8; layout.frame.size];
        memory.read(pid, fp, &mut frame)?;

        let func = field_u64(&frame, layout.frame.func).ok_or(Downgrade::Layout("func"))?;
        let opline = field_u64(&frame, layout.frame.opline).ok_or(Downgrade::Layout("opline"))?;
        let num_args =
            field_u32(&frame, layout.frame.num_args).ok_or(Downgrade::Layout("num_args"))?;

        let args =
            if self.capture_args { self.snapshot_args(fp, num_args) } else { ArgSnapshot::default() };

        let type_tag = memory.read_u8(pid, offset(func, layout.function.type_tag)?)?;

        let (kind, location) = if type_tag == USER_FUNCTION {
            let line = memory.read_u32(pid, offset(opline, layout.op.lineno)?)?;
            if line == 0 {
                return Err(Downgrade::NoSourceLine);
            }
            let file = self.resolver.read_string(memory, pid, func, layout.function.filename)?;
            (SampleKind::UserFunction, Some(Location { file, line }))
        } else {
            (SampleKind::InternalFunction, None)
        };

        let scope_ptr = memory.read_u64(pid, offset(func, layout.function.scope)?)?;
        let scope = match scope_ptr {
            0 => None,
            class => Some(self.resolver.read_string(memory, pid, class, layout.class.name)?),
        };

        let function = self.resolver.read_string(memory, pid, func, layout.function.name)?;
        if function.is_empty() {
            return Err(Downgrade::EmptyName);
        }

        Ok(FrameDetail { kind, location, symbol: SymbolInfo { scope, function }, args })
    }

    /// Copy up to [`MAX_ARGINFO`] argument slots that follow the frame
    fn snapshot_args(&self, fp: u64, reported: u32) -> ArgSnapshot {
        let mut snapshot = ArgSnapshot::default();
        let count = usize::try_from(reported).unwrap_or(usize::MAX).min(MAX_ARGINFO);
        if count == 0 {
            return snapshot;
        }

        let mut raw = [0u8; MAX_ARGINFO * ARG_SLOT_SIZE];
        let buf = &mut raw[..count * ARG_SLOT_SIZE];

        let read = offset(fp, self.layout.frame.args)
            .and_then(|address| self.memory.read(self.pid, address, buf));
        if let Err(e) = read {
            trace!("{}: argument capture skipped: {e}", self.pid);
            return snapshot;
        }

        for chunk in buf.chunks_exact(ARG_SLOT_SIZE) {
            let mut slot = ArgSlot::default();
            slot.0.copy_from_slice(chunk);
            snapshot.push(slot);
        }
        snapshot
    }
}
