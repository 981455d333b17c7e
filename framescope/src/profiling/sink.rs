//! Output buffer seam
//!
//! The sampler thread is the only producer for its sink. Insertion must not
//! block for long: a slow consumer should lose samples, not delay ticks.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use log::debug;

use super::sample::Sample;

/// Receives finished samples from the sampler thread
pub trait SampleSink: Send + 'static {
    fn insert(&self, sample: Sample);
}

impl<S: SampleSink + Sync> SampleSink for Arc<S> {
    fn insert(&self, sample: Sample) {
        (**self).insert(sample);
    }
}

/// Bounded channel: drops the sample when the consumer falls behind
impl SampleSink for Sender<Sample> {
    fn insert(&self, sample: Sample) {
        match self.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(sample)) => {
                debug!("Sample buffer full, dropping sample at {}", sample.elapsed);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Sample consumer disconnected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Pid, Timestamp};
    use crossbeam_channel::bounded;

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (tx, rx) = bounded(1);
        tx.insert(Sample::memory_only(Pid(1), Timestamp(1), 0));
        tx.insert(Sample::memory_only(Pid(1), Timestamp(2), 0));

        assert_eq!(rx.try_recv().unwrap().elapsed, Timestamp(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_tolerates_disconnect() {
        let (tx, rx) = bounded(1);
        drop(rx);
        tx.insert(Sample::memory_only(Pid(1), Timestamp(1), 0));
    }
}
