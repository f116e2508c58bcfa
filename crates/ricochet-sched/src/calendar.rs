//! The event calendar: per-slot bounded lists under one tournament tree.
//!
//! Slot `i < N` belongs to particle `i`; slot `N` holds system events.
//! Stored event times are keys on a shared clock that runs ahead by the
//! peculiar time: streaming every event by `dt` only advances the
//! offset. Keys are re-based back to zero every `rebase_interval`
//! streams.

use tracing::{debug, trace};

use ricochet_core::{Event, EventCount, EventKind, Owner, ParticleId, Stamp};

use crate::config::CalendarConfig;
use crate::error::CalendarError;
use crate::pel::ParticleEventList;
use crate::tree::TournamentTree;

/// Result of a successful [`EventCalendar::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pushed {
    /// The event is in the owner's list.
    Stored,
    /// The event was stored and a recalculate marker was (re)placed.
    Overflowed,
    /// The event was dropped because it never happens.
    Never,
}

/// Per-particle calendars plus the global ordering over them.
#[derive(Clone, Debug)]
pub struct EventCalendar {
    lists: Vec<ParticleEventList>,
    tree: TournamentTree,
    counters: Vec<EventCount>,
    dirty: Vec<bool>,
    pending: Vec<u32>,
    pec_time: f64,
    streams_since_rebase: u32,
    rebase_interval: u32,
    overflows: u64,
}

impl EventCalendar {
    /// Empty calendar for `particles` particles plus the system slot.
    pub fn new(particles: usize, config: &CalendarConfig) -> Result<Self, CalendarError> {
        config.validate()?;
        // Slot N is the system slot, and u32::MAX marks an empty tree node.
        if particles >= (u32::MAX - 1) as usize {
            return Err(CalendarError::TooManyParticles { count: particles });
        }
        let slots = particles + 1;
        Ok(Self {
            lists: vec![ParticleEventList::new(config.capacity); slots],
            tree: TournamentTree::new(slots),
            counters: vec![EventCount::default(); particles],
            dirty: vec![false; slots],
            pending: Vec::new(),
            pec_time: 0.0,
            streams_since_rebase: 0,
            rebase_interval: config.rebase_interval,
            overflows: 0,
        })
    }

    /// Number of particle slots (excluding the system slot).
    pub fn particle_count(&self) -> usize {
        self.counters.len()
    }

    /// Live staleness counter of `particle`.
    pub fn counter(&self, particle: ParticleId) -> Option<EventCount> {
        self.counters.get(particle.index()).copied()
    }

    /// Number of pushes that overflowed a list since construction.
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    /// Accumulated time not yet folded into the stored keys.
    pub fn peculiar_time(&self) -> f64 {
        self.pec_time
    }

    fn slot(&self, owner: Owner) -> Result<usize, CalendarError> {
        match owner {
            Owner::System => Ok(self.counters.len()),
            Owner::Particle(id) if id.index() < self.counters.len() => Ok(id.index()),
            Owner::Particle(_) => Err(CalendarError::UnknownOwner { owner }),
        }
    }

    fn mark(&mut self, slot: usize) {
        if !self.dirty[slot] {
            self.dirty[slot] = true;
            self.pending.push(slot as u32);
        }
    }

    fn flush(&mut self) {
        for slot in self.pending.drain(..) {
            let slot = slot as usize;
            self.dirty[slot] = false;
            self.tree.update(slot, self.lists[slot].head().copied());
        }
    }

    fn stamp(&self, event: &Event) -> Result<Stamp, CalendarError> {
        let owner = match event.owner {
            Owner::Particle(id) => self
                .counter(id)
                .ok_or(CalendarError::UnknownOwner { owner: event.owner })?,
            Owner::System => EventCount::default(),
        };
        let partner = match event.kind.partner() {
            Some(id) => Some(self.counter(id).ok_or(CalendarError::UnknownOwner {
                owner: Owner::Particle(id),
            })?),
            None => None,
        };
        Ok(Stamp { owner, partner })
    }

    fn rebased(&self, mut event: Event) -> Event {
        event.dt = (event.dt - self.pec_time).max(0.0);
        event
    }

    /// Schedule `event`, stamping it with its dependencies' live counters.
    ///
    /// `dt` is relative to now. An infinite `dt` is dropped, a negative
    /// infinite `dt` fires immediately. NaN or finite negative times are
    /// rejected.
    pub fn push(&mut self, mut event: Event) -> Result<Pushed, CalendarError> {
        if event.dt.is_nan() {
            return Err(CalendarError::NotANumber { event });
        }
        if event.dt == f64::INFINITY {
            return Ok(Pushed::Never);
        }
        if event.dt == f64::NEG_INFINITY {
            event.dt = 0.0;
        }
        if event.dt < 0.0 {
            return Err(CalendarError::NegativeTime { event });
        }
        let slot = self.slot(event.owner)?;
        event.stamp = self.stamp(&event)?;
        event.dt += self.pec_time;

        let overflowed = self.lists[slot].push(event);
        self.mark(slot);
        if overflowed {
            self.overflows += 1;
            debug!(owner = %event.owner, capacity = self.lists[slot].capacity(), "calendar entry overflowed");
            Ok(Pushed::Overflowed)
        } else {
            Ok(Pushed::Stored)
        }
    }

    /// Bump `particle`'s counter and drop its entry. Every stored event
    /// depending on the old counter becomes stale.
    pub fn invalidate(&mut self, particle: ParticleId) -> Result<EventCount, CalendarError> {
        let slot = self.slot(Owner::Particle(particle))?;
        let next = self.counters[slot].next();
        self.counters[slot] = next;
        self.lists[slot].clear();
        self.mark(slot);
        Ok(next)
    }

    /// Drop `owner`'s entry without touching any counter.
    pub fn clear(&mut self, owner: Owner) -> Result<(), CalendarError> {
        let slot = self.slot(owner)?;
        self.lists[slot].clear();
        self.mark(slot);
        Ok(())
    }

    /// Drop every entry. Counters are kept.
    pub fn clear_all(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
        for slot in self.pending.drain(..) {
            self.dirty[slot as usize] = false;
        }
        for slot in 0..self.lists.len() {
            self.tree.set_unsorted(slot, None);
        }
        self.tree.rebuild();
    }

    /// The globally earliest event, with `dt` relative to now.
    pub fn peek(&mut self) -> Option<Event> {
        self.flush();
        let (_, event) = self.tree.top()?;
        Some(self.rebased(*event))
    }

    /// Remove and return the globally earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.flush();
        let (slot, _) = self.tree.top()?;
        let event = self.lists[slot].pop_front()?;
        self.tree.update(slot, self.lists[slot].head().copied());
        Some(self.rebased(event))
    }

    /// `true` if every counter `event` depends on is still live.
    pub fn is_current(&self, event: &Event) -> bool {
        let owner_ok = match event.owner {
            Owner::Particle(id) => self.counter(id) == Some(event.stamp.owner),
            Owner::System => true,
        };
        let partner_ok = match event.kind.partner() {
            Some(id) => self.counter(id).is_some() && self.counter(id) == event.stamp.partner,
            None => true,
        };
        owner_ok && partner_ok
    }

    /// `owner`'s stored events in order, with times relative to now.
    pub fn entry(&self, owner: Owner) -> Result<Vec<Event>, CalendarError> {
        let slot = self.slot(owner)?;
        Ok(self.lists[slot].iter().map(|e| self.rebased(*e)).collect())
    }

    /// `true` if `owner`'s entry holds a pair event with `partner`, or
    /// has overflowed and so may have dropped one.
    pub fn references(&self, owner: ParticleId, partner: ParticleId) -> bool {
        if owner.index() >= self.counters.len() {
            return false;
        }
        self.lists[owner.index()].iter().any(|e| match e.kind {
            EventKind::Interaction { partner: p, .. } => p == partner,
            EventKind::Recalculate => true,
            _ => false,
        })
    }

    /// Advance every stored event by `dt`.
    pub fn stream(&mut self, dt: f64) {
        self.pec_time += dt;
        self.streams_since_rebase += 1;
        if self.streams_since_rebase >= self.rebase_interval {
            self.rebase();
        }
    }

    /// Fold the peculiar time into the stored keys.
    pub fn rebase(&mut self) {
        trace!(pec_time = self.pec_time, "rebasing calendar");
        let offset = self.pec_time;
        self.transform_keys(|t| (t - offset).max(0.0));
        self.pec_time = 0.0;
        self.streams_since_rebase = 0;
    }

    /// Multiply every stored time-until-event by `factor`.
    pub fn rescale_times(&mut self, factor: f64) -> Result<(), CalendarError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(CalendarError::InvalidTimeScale { factor });
        }
        self.rebase();
        self.transform_keys(|t| t * factor);
        Ok(())
    }

    fn transform_keys(&mut self, f: impl Fn(f64) -> f64) {
        for list in &mut self.lists {
            for event in list.iter_mut() {
                event.dt = f(event.dt);
            }
        }
        for slot in self.pending.drain(..) {
            self.dirty[slot as usize] = false;
        }
        for (slot, list) in self.lists.iter().enumerate() {
            self.tree.set_unsorted(slot, list.head().copied());
        }
        self.tree.rebuild();
    }
}
