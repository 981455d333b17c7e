//! Sampler activation and deactivation
//!
//! ```text
//! Inactive ──activate──▶ Running ──deactivate──▶ Closing ──join──▶ Inactive
//! ```
//!
//! A [`SamplerSlot`] owns at most one running sampler. Deactivation is
//! cooperative: it sets the shutdown flag, wakes the timer thread and blocks
//! until the thread has exited, so no sample reaches the sink afterwards.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use super::sink::SampleSink;
use super::timer::{run_timer, Sampler, TimerControl};
use super::SamplerConfig;
use crate::domain::{Pid, SamplerError};
use crate::remote::RemoteMemory;
use crate::symbolization::SymbolTable;

/// Observable lifecycle state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Inactive,
    Running,
    /// Shutdown requested, or the timer thread stopped on its own; waiting
    /// for [`SamplerSlot::deactivate`] to join it
    Closing,
}

struct ActiveSampler {
    pid: Pid,
    control: Arc<TimerControl>,
    thread: JoinHandle<()>,
}

/// Holds the running sampler for one target process
#[derive(Default)]
pub struct SamplerSlot {
    active: Option<ActiveSampler>,
}

impl SamplerSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sampling `config.pid` on a dedicated thread
    ///
    /// # Errors
    /// - [`SamplerError::AlreadyActive`] if this slot already runs a sampler
    /// - [`SamplerError::ZeroInterval`] for a zero interval
    /// - [`SamplerError::Spawn`] if the thread cannot be created; the slot
    ///   stays inactive
    pub fn activate<M, T, S>(
        &mut self,
        config: SamplerConfig,
        memory: M,
        symbols: T,
        sink: S,
    ) -> Result<(), SamplerError>
    where
        M: RemoteMemory + 'static,
        T: SymbolTable + 'static,
        S: SampleSink,
    {
        if let Some(active) = &self.active {
            return Err(SamplerError::AlreadyActive(active.pid));
        }
        if config.interval.is_zero() {
            return Err(SamplerError::ZeroInterval);
        }

        let control = Arc::new(TimerControl::default());
        let sampler = Sampler::new(&config, memory, symbols, sink);

        let thread_control = Arc::clone(&control);
        let thread = thread::Builder::new()
            .name(format!("sampler-{}", config.pid.0))
            .spawn(move || run_timer(&sampler, &thread_control))
            .map_err(|e| {
                warn!("Failed to start sampler for {}: {e}", config.pid);
                SamplerError::Spawn(e)
            })?;

        info!(
            "Sampling {} every {}us (layout {}, args {})",
            config.pid,
            config.interval.as_micros(),
            config.layout.name,
            if config.capture_args { "on" } else { "off" }
        );

        self.active = Some(ActiveSampler { pid: config.pid, control, thread });
        Ok(())
    }

    /// Stop the sampler and wait for its thread; no-op when inactive
    pub fn deactivate(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.control.close();
        if active.thread.join().is_err() {
            error!("Sampler thread for {} panicked", active.pid);
        }

        info!("Sampler for {} deactivated", active.pid);
    }

    #[must_use]
    pub fn state(&self) -> SamplerState {
        match &self.active {
            None => SamplerState::Inactive,
            Some(active) if active.thread.is_finished() || active.control.is_closed() => {
                SamplerState::Closing
            }
            Some(_) => SamplerState::Running,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Target of the running sampler, if any
    #[must_use]
    pub fn pid(&self) -> Option<Pid> {
        self.active.as_ref().map(|active| active.pid)
    }
}

impl Drop for SamplerSlot {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryImage;
    use crate::symbolization::{Anchors, InternTable};
    use crossbeam_channel::unbounded;
    use framescope_common::PHP_80;
    use std::time::Duration;

    fn config() -> SamplerConfig {
        SamplerConfig::new(Pid(9), Anchors { heap: 0x1000, current_frame: 0x2000 }, PHP_80)
            .with_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_deactivate_inactive_is_noop() {
        let mut slot = SamplerSlot::new();
        slot.deactivate();
        slot.deactivate();
        assert_eq!(slot.state(), SamplerState::Inactive);
    }

    #[test]
    fn test_activate_twice_rejected() {
        let (tx, _rx) = unbounded();
        let mut slot = SamplerSlot::new();
        slot.activate(config(), MemoryImage::new(), InternTable::new(), tx.clone()).unwrap();
        assert_eq!(slot.state(), SamplerState::Running);

        let err = slot.activate(config(), MemoryImage::new(), InternTable::new(), tx).unwrap_err();
        assert!(matches!(err, SamplerError::AlreadyActive(Pid(9))));

        slot.deactivate();
        assert!(!slot.is_active());
        assert_eq!(slot.pid(), None);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let (tx, _rx) = unbounded();
        let mut slot = SamplerSlot::new();
        let result = slot.activate(
            config().with_interval(Duration::ZERO),
            MemoryImage::new(),
            InternTable::new(),
            tx,
        );
        assert!(matches!(result, Err(SamplerError::ZeroInterval)));
        assert_eq!(slot.state(), SamplerState::Inactive);
    }

    #[test]
    fn test_slot_reusable_after_deactivate() {
        let (tx, rx) = unbounded();
        let mut slot = SamplerSlot::new();

        slot.activate(config(), MemoryImage::new(), InternTable::new(), tx.clone()).unwrap();
        slot.deactivate();
        slot.activate(config(), MemoryImage::new(), InternTable::new(), tx).unwrap();
        assert!(slot.is_active());
        drop(slot);

        // Every tick against an empty image is memory-only
        assert!(rx.try_iter().all(|sample| sample.symbol.is_none()));
    }
}
