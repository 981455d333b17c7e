//! # Sampler Timer
//!
//! One dedicated thread per active sampler. The thread keeps an absolute wake
//! time and advances it by exactly one interval per tick, so the time spent
//! sampling never accumulates as drift:
//!
//! ```text
//! wake₀ = now + interval
//! wakeₙ = wakeₙ₋₁ + interval     (nanoseconds carried into seconds)
//! ```
//!
//! Between ticks the thread blocks in a timed condition-variable wait. The
//! mutex guards only the shutdown flag; samples are built locally and moved
//! into the sink. If a tick overruns, the next wake time is already in the
//! past and the loop samples again immediately until it has caught up.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{error, info};

use super::sample::Sample;
use super::sink::SampleSink;
use super::walker::FrameWalker;
use super::SamplerConfig;
use crate::remote::RemoteMemory;
use crate::symbolization::SymbolTable;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Split a nanosecond count into whole seconds and the sub-second remainder
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn split_nanos(cumulative: u64) -> (u64, u32) {
    // remainder < 1e9 always fits in u32
    (cumulative / NANOS_PER_SEC, (cumulative % NANOS_PER_SEC) as u32)
}

/// Absolute wall-clock wake time, normalized so `nanos < 1e9`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WakeTime {
    secs: u64,
    nanos: u32,
}

impl WakeTime {
    /// Current wall-clock time
    ///
    /// # Errors
    /// Fails if the system clock reads earlier than the Unix epoch.
    pub fn now() -> Result<Self, SystemTimeError> {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH)?;
        Ok(Self { secs: since_epoch.as_secs(), nanos: since_epoch.subsec_nanos() })
    }

    #[must_use]
    pub fn new(secs: u64, nanos: u32) -> Self {
        let (carry, nanos) = split_nanos(u64::from(nanos));
        Self { secs: secs.saturating_add(carry), nanos }
    }

    /// Move the wake time forward by `interval_nanos`
    pub fn advance(&mut self, interval_nanos: u64) {
        let (carry, nanos) = split_nanos(u64::from(self.nanos).saturating_add(interval_nanos));
        self.secs = self.secs.saturating_add(carry);
        self.nanos = nanos;
    }

    #[must_use]
    pub fn secs(&self) -> u64 {
        self.secs
    }

    #[must_use]
    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Time left until the wake time; zero if it has passed
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let Some(target) = UNIX_EPOCH.checked_add(Duration::new(self.secs, self.nanos)) else {
            return Duration::MAX;
        };
        target.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO)
    }
}

/// Shutdown flag and the condition variable the timer thread waits on
#[derive(Debug, Default)]
pub(crate) struct TimerControl {
    closed: Mutex<bool>,
    signal: Condvar,
}

impl TimerControl {
    /// Set the shutdown flag and wake the timer thread
    pub(crate) fn close(&self) {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        *closed = true;
        self.signal.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-sampler state owned by the timer thread
pub struct Sampler<M, T, S> {
    walker: FrameWalker<M, T>,
    sink: S,
    interval: Duration,
}

impl<M: RemoteMemory, T: SymbolTable, S: SampleSink> Sampler<M, T, S> {
    pub fn new(config: &SamplerConfig, memory: M, symbols: T, sink: S) -> Self {
        Self { walker: FrameWalker::new(config, memory, symbols), sink, interval: config.interval }
    }

    /// Take one sample and hand it to the sink
    pub fn tick(&self) {
        let sample: Sample = self.walker.sample();
        self.sink.insert(sample);
    }

    fn interval_nanos(&self) -> u64 {
        u64::try_from(self.interval.as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Timer thread body: tick at every wake time until the shutdown flag is set
pub(crate) fn run_timer<M, T, S>(sampler: &Sampler<M, T, S>, control: &TimerControl)
where
    M: RemoteMemory,
    T: SymbolTable,
    S: SampleSink,
{
    let pid = sampler.walker.pid();
    let interval = sampler.interval_nanos();

    let mut wake = match WakeTime::now() {
        Ok(now) => now,
        Err(e) => {
            error!("Sampler for {pid} cannot read the clock, stopping: {e}");
            return;
        }
    };
    wake.advance(interval);

    let Ok(mut closed) = control.closed.lock() else {
        error!("Sampler lock for {pid} poisoned, stopping");
        return;
    };

    while !*closed {
        match control.signal.wait_timeout(closed, wake.remaining()) {
            Ok((guard, result)) => {
                closed = guard;
                if !*closed && (result.timed_out() || wake.remaining().is_zero()) {
                    sampler.tick();
                    wake.advance(interval);
                }
            }
            Err(_) => {
                error!("Sampler lock for {pid} poisoned, stopping");
                return;
            }
        }
    }

    info!("Sampler for {pid} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_nanos() {
        assert_eq!(split_nanos(0), (0, 0));
        assert_eq!(split_nanos(999_999_999), (0, 999_999_999));
        assert_eq!(split_nanos(1_000_000_000), (1, 0));
        assert_eq!(split_nanos(3_250_000_001), (3, 250_000_001));
    }

    #[test]
    fn test_advance_carries_into_seconds() {
        let mut wake = WakeTime::new(10, 999_000_000);
        wake.advance(1_000_000); // 1ms
        assert_eq!((wake.secs(), wake.nanos()), (11, 0));

        wake.advance(2_500_000_000);
        assert_eq!((wake.secs(), wake.nanos()), (13, 500_000_000));
    }

    #[test]
    fn test_many_ticks_do_not_drift() {
        let mut wake = WakeTime::new(0, 0);
        // 1_000_003 ticks of 1ms = 1000.003s
        for _ in 0..1_000_003 {
            wake.advance(1_000_000);
        }
        assert_eq!((wake.secs(), wake.nanos()), (1000, 3_000_000));
    }

    #[test]
    fn test_new_normalizes() {
        let wake = WakeTime::new(1, 2_000_000_001);
        assert_eq!((wake.secs(), wake.nanos()), (3, 1));
    }

    #[test]
    fn test_remaining() {
        let past = WakeTime::new(0, 0);
        assert_eq!(past.remaining(), Duration::ZERO);

        let mut future = WakeTime::now().unwrap();
        future.advance(60 * NANOS_PER_SEC);
        assert!(future.remaining() > Duration::from_secs(50));
    }

    #[test]
    fn test_control_close() {
        let control = TimerControl::default();
        assert!(!control.is_closed());
        control.close();
        assert!(control.is_closed());
    }
}
