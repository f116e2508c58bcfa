//! Bounded per-particle event list.

use smallvec::SmallVec;

use ricochet_core::Event;

/// Sorted, bounded set of candidate events for one calendar slot.
///
/// Holds at most `capacity` events in ascending [`Event::order`]. When a
/// push would exceed the capacity the largest candidates are dropped and
/// the new last entry is turned into a recalculate marker, so nothing
/// beyond the retained window can ever be executed from this list.
#[derive(Clone, Debug)]
pub struct ParticleEventList {
    events: SmallVec<[Event; 8]>,
    capacity: usize,
}

impl ParticleEventList {
    /// Empty list holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: SmallVec::new(),
            capacity,
        }
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained events, including any recalculate marker.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if no event is scheduled.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The earliest event.
    pub fn head(&self) -> Option<&Event> {
        self.events.first()
    }

    /// Events in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// `true` if the list has overflowed since it was last cleared.
    pub fn is_truncated(&self) -> bool {
        self.events.last().is_some_and(Event::is_recalculate)
    }

    /// Insert `event` in order. Returns `true` if the insert overflowed
    /// the capacity and a recalculate marker was (re)placed, or if the
    /// event falls after an existing marker and was dropped.
    pub fn push(&mut self, event: Event) -> bool {
        let at = self
            .events
            .partition_point(|e| e.order(&event).is_le());
        if at == self.events.len() && self.is_truncated() {
            return true;
        }
        if at < self.capacity {
            self.events.insert(at, event);
            if self.events.len() <= self.capacity {
                return false;
            }
            self.events.truncate(self.capacity);
        }
        // Past the window: the last retained slot no longer bounds what
        // was dropped.
        if let Some(last) = self.events.last_mut() {
            *last = last.into_recalculate();
        }
        true
    }

    /// Remove and return the earliest event.
    pub fn pop_front(&mut self) -> Option<Event> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    /// Drop every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.events.iter_mut()
    }
}
