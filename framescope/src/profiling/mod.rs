//! Sampling core
//!
//! This module contains the sampling engine proper:
//! - Sample records and their invariants
//! - Frame walking over the target's runtime structures
//! - The fixed-interval timer thread
//! - Activation / deactivation of a sampler slot
//! - The output sink seam
//! - Headless display helpers

pub mod sample;
pub mod sample_display;
pub mod sink;
pub mod slot;
pub mod timer;
pub mod walker;

use std::time::Duration;

use framescope_common::RuntimeLayout;

use crate::domain::Pid;
use crate::symbolization::Anchors;

// Re-export common types
pub use sample::{ArgSnapshot, Location, Sample, SampleKind, SymbolInfo};
pub use sample_display::{display_sample, display_statistics, format_sample, SampleStats};
pub use sink::SampleSink;
pub use slot::{SamplerSlot, SamplerState};
pub use timer::{split_nanos, Sampler, WakeTime};
pub use walker::FrameWalker;

/// Default tick interval (1ms)
pub const DEFAULT_INTERVAL: Duration = Duration::from_micros(1000);

/// Everything needed to start sampling one target
///
/// Written once at activation; the timer thread only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub pid: Pid,
    pub anchors: Anchors,
    pub layout: RuntimeLayout,
    pub interval: Duration,
    pub capture_args: bool,
}

impl SamplerConfig {
    #[must_use]
    pub fn new(pid: Pid, anchors: Anchors, layout: RuntimeLayout) -> Self {
        Self { pid, anchors, layout, interval: DEFAULT_INTERVAL, capture_args: false }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_args(mut self, capture_args: bool) -> Self {
        self.capture_args = capture_args;
        self
    }
}
