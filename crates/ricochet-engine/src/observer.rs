//! Event observers.
//!
//! Observers see every executed event after the schedule has been
//! repaired. They receive a shared reference and cannot mutate the
//! simulation.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use ricochet_core::Event;
use ricochet_predict::ParticleDelta;
use smallvec::SmallVec;

/// One executed event as seen by observers.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    /// The event, with `dt` as it was when popped.
    pub event: Event,
    /// System time after the event.
    pub system_time: f64,
    /// Per-particle state changes.
    pub deltas: SmallVec<[ParticleDelta; 2]>,
    /// Change in internal energy.
    pub energy_delta: f64,
}

/// Pure consumer of [`EventRecord`]s.
///
/// `Send` so a simulation carrying observers can still be moved across
/// threads by replica exchange.
pub trait EventObserver: Send {
    /// Called once per executed event.
    fn observe(&mut self, record: &EventRecord);
}

impl<F> EventObserver for F
where
    F: FnMut(&EventRecord) + Send,
{
    fn observe(&mut self, record: &EventRecord) {
        self(record)
    }
}

/// Forwards records over a crossbeam channel.
///
/// A bounded channel never blocks the event loop: records that do not
/// fit are dropped and counted.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Sender<EventRecord>,
    dropped: u64,
}

impl ChannelObserver {
    /// Observer over an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<EventRecord>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx, dropped: 0 }, rx)
    }

    /// Observer over a channel holding at most `capacity` records.
    pub fn bounded(capacity: usize) -> (Self, Receiver<EventRecord>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Records dropped because the channel was full or disconnected.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventObserver for ChannelObserver {
    fn observe(&mut self, record: &EventRecord) {
        match self.tx.try_send(record.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }
}
