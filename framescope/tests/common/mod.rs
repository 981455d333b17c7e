//! Simulated interpreter process for integration tests
//!
//! Lays out a heap header, the executor's current-frame slot, one frame with
//! its function descriptor, op record, optional class entry and argument
//! slots, all inside a [`MemoryImage`], at the offsets of [`PHP_80`].

#![allow(dead_code)]

use std::sync::Arc;

use framescope::domain::Pid;
use framescope::profiling::{FrameWalker, SamplerConfig};
use framescope::remote::MemoryImage;
use framescope::symbolization::{Anchors, InternTable};
use framescope_common::{RuntimeLayout, ARG_SLOT_SIZE, PHP_80, USER_FUNCTION};

pub const PID: Pid = Pid(4242);

pub const HEAP: u64 = 0x10_0000;
pub const EXECUTOR: u64 = 0x20_0000;
pub const FRAME: u64 = 0x30_0000;
pub const FUNC: u64 = 0x40_0000;
pub const OPLINE: u64 = 0x50_0000;
pub const CLASS: u64 = 0x60_0000;
pub const FILE_STR: u64 = 0x70_0000;
pub const NAME_STR: u64 = 0x71_0000;
pub const CLASS_STR: u64 = 0x72_0000;

/// Room for this many argument slots behind the frame
pub const MAPPED_ARGS: usize = 16;

pub struct FakeRuntime {
    pub image: Arc<MemoryImage>,
    pub layout: RuntimeLayout,
}

/// Encode a string descriptor the way the runtime stores it
pub fn encode_string(layout: &RuntimeLayout, text: &str) -> Vec<u8> {
    let string = layout.string;
    let size = string.descriptor_size(text.len()).expect("descriptor size");
    let mut bytes = vec![0u8; size];
    bytes[string.len..string.len + 8].copy_from_slice(&(text.len() as u64).to_ne_bytes());
    bytes[string.val..string.val + text.len()].copy_from_slice(text.as_bytes());
    bytes
}

impl FakeRuntime {
    /// A user function `name` executing at `file:line`, no scope, no arguments
    pub fn user_function(file: &str, line: u32, name: &str) -> Self {
        let layout = PHP_80;
        let image = Arc::new(MemoryImage::new());

        image.map(HEAP, vec![0; 64]);
        image.map(EXECUTOR, vec![0; layout.executor.current_frame + 8]);
        image.map(FRAME, vec![0; layout.frame.args + MAPPED_ARGS * ARG_SLOT_SIZE]);
        image.map(FUNC, vec![0; 256]);
        image.map(OPLINE, vec![0; 32]);
        image.map(CLASS, vec![0; 64]);

        let runtime = Self { image, layout };
        runtime.set_memory(2 * 1024 * 1024);
        runtime.set_current_frame(FRAME);

        let frame = runtime.layout.frame;
        runtime.image.write_u64(FRAME + frame.func as u64, FUNC);
        runtime.image.write_u64(FRAME + frame.opline as u64, OPLINE);

        runtime.set_type_tag(USER_FUNCTION);
        runtime.set_line(line);
        runtime.set_file(file);
        runtime.set_name(name);
        runtime
    }

    pub fn anchors(&self) -> Anchors {
        Anchors {
            heap: HEAP,
            current_frame: EXECUTOR + self.layout.executor.current_frame as u64,
        }
    }

    pub fn config(&self) -> SamplerConfig {
        SamplerConfig::new(PID, self.anchors(), self.layout)
    }

    pub fn walker(&self, capture_args: bool) -> FrameWalker<Arc<MemoryImage>, InternTable> {
        FrameWalker::new(
            &self.config().with_args(capture_args),
            Arc::clone(&self.image),
            InternTable::new(),
        )
    }

    pub fn set_memory(&self, bytes: u64) {
        self.image.write_u64(HEAP + self.layout.heap.usage as u64, bytes);
    }

    pub fn set_current_frame(&self, frame: u64) {
        self.image.write_u64(self.anchors().current_frame, frame);
    }

    pub fn set_type_tag(&self, tag: u8) {
        self.image.write(FUNC + self.layout.function.type_tag as u64, &[tag]);
    }

    pub fn set_line(&self, line: u32) {
        self.image.write_u32(OPLINE + self.layout.op.lineno as u64, line);
    }

    pub fn set_file(&self, file: &str) {
        self.image.map(FILE_STR, encode_string(&self.layout, file));
        self.image.write_u64(FUNC + self.layout.function.filename as u64, FILE_STR);
    }

    pub fn set_name(&self, name: &str) {
        self.image.map(NAME_STR, encode_string(&self.layout, name));
        self.image.write_u64(FUNC + self.layout.function.name as u64, NAME_STR);
    }

    /// Make the function a method of `class`, or a free function for `None`
    pub fn set_scope(&self, class: Option<&str>) {
        let scope = self.layout.function.scope as u64;
        match class {
            Some(name) => {
                self.image.map(CLASS_STR, encode_string(&self.layout, name));
                self.image.write_u64(CLASS + self.layout.class.name as u64, CLASS_STR);
                self.image.write_u64(FUNC + scope, CLASS);
            }
            None => {
                self.image.write_u64(FUNC + scope, 0);
            }
        }
    }

    /// Report `reported` arguments and fill slot `i` with `(tag, value)`
    pub fn set_args(&self, reported: u32, values: &[(u8, u64)]) {
        let frame = self.layout.frame;
        self.image.write_u32(FRAME + frame.num_args as u64, reported);
        for (i, &(tag, value)) in values.iter().enumerate() {
            let slot = self.arg_slot_address(i);
            let mut raw = [0u8; ARG_SLOT_SIZE];
            raw[..8].copy_from_slice(&value.to_ne_bytes());
            raw[8] = tag;
            self.image.write(slot, &raw);
        }
    }

    pub fn arg_slot_address(&self, index: usize) -> u64 {
        FRAME + (self.layout.frame.args + index * ARG_SLOT_SIZE) as u64
    }
}
