//! Event descriptors.
//!
//! An [`Event`] is a prediction: "in `dt` time units, `owner` will
//! experience an event of this kind". The [`EventKind`] tag carries only
//! the fields relevant to its source, so dispatch is a `match` rather
//! than a lookup through optional fields.

use std::cmp::Ordering;
use std::fmt;

use crate::id::{EventCount, ParticleId, SourceId};

/// Which calendar slot an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    /// A particle's own calendar entry.
    Particle(ParticleId),
    /// The shared slot holding system events.
    System,
}

impl Owner {
    /// The owning particle, if any.
    pub fn particle(self) -> Option<ParticleId> {
        match self {
            Self::Particle(id) => Some(id),
            Self::System => None,
        }
    }

    /// Sort key used to break time ties deterministically.
    /// The system slot sorts after every particle.
    fn tie_key(self) -> u64 {
        match self {
            Self::Particle(id) => u64::from(id.0),
            Self::System => u64::MAX,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Particle(id) => write!(f, "particle {id}"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Source-tagged event variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A pair event between the owner and `partner`, predicted by
    /// interaction `source`.
    Interaction {
        /// The other particle.
        partner: ParticleId,
        /// Index into the interaction table.
        source: SourceId,
    },
    /// A single-particle event against a fixed obstacle.
    Local {
        /// Index into the local table.
        source: SourceId,
    },
    /// A single-particle event from a global rule.
    Global {
        /// Index into the global table.
        source: SourceId,
    },
    /// The owner leaves its current cell.
    CellTransition,
    /// A whole-system event such as a ticker.
    System {
        /// Index into the system table.
        source: SourceId,
    },
    /// Placeholder left behind when a bounded calendar overflowed.
    /// Popping it triggers full recomputation of the owner.
    Recalculate,
}

impl EventKind {
    /// The interaction partner, if this is a pair event.
    pub fn partner(self) -> Option<ParticleId> {
        match self {
            Self::Interaction { partner, .. } => Some(partner),
            _ => None,
        }
    }

    /// Short lowercase name for logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Interaction { .. } => "interaction",
            Self::Local { .. } => "local",
            Self::Global { .. } => "global",
            Self::CellTransition => "cell-transition",
            Self::System { .. } => "system",
            Self::Recalculate => "recalculate",
        }
    }
}

/// Physical classification reported by the predictor.
///
/// The scheduler never branches on this; it is carried through to
/// observers and error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Hard-core elastic collision.
    Core,
    /// Reflection off a potential step the pair cannot climb.
    Bounce,
    /// Pair enters a potential well.
    Capture,
    /// Pair leaves a potential well.
    Release,
    /// Collision with a wall or other fixed obstacle.
    Wall,
    /// Cell boundary crossing.
    Cell,
    /// Periodic system tick.
    Ticker,
    /// Thermostat velocity reassignment.
    Thermostat,
    /// Particle is put to sleep.
    Sleep,
    /// Particle is woken.
    Wake,
    /// Bookkeeping event with no physical effect.
    Virtual,
    /// Bounded-calendar overflow marker.
    Recalculate,
}

/// Dependency counters captured when the event was pushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stamp {
    /// The owner's counter. Zero for system events.
    pub owner: EventCount,
    /// The partner's counter, for interaction events.
    pub partner: Option<EventCount>,
}

/// A predicted event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    /// Calendar slot the event lives in.
    pub owner: Owner,
    /// Time until the event, relative to the current system time.
    pub dt: f64,
    /// Source tag.
    pub kind: EventKind,
    /// Physical classification.
    pub event_type: EventType,
    /// Counters the prediction depends on. Filled in by the calendar.
    pub stamp: Stamp,
}

impl Event {
    /// A new event with an empty stamp.
    pub fn new(owner: Owner, dt: f64, kind: EventKind, event_type: EventType) -> Self {
        Self {
            owner,
            dt,
            kind,
            event_type,
            stamp: Stamp::default(),
        }
    }

    /// Pair event owned by `particle`.
    pub fn interaction(
        particle: ParticleId,
        partner: ParticleId,
        source: SourceId,
        dt: f64,
        event_type: EventType,
    ) -> Self {
        Self::new(
            Owner::Particle(particle),
            dt,
            EventKind::Interaction { partner, source },
            event_type,
        )
    }

    /// Cell-transition event owned by `particle`.
    pub fn cell_transition(particle: ParticleId, dt: f64) -> Self {
        Self::new(
            Owner::Particle(particle),
            dt,
            EventKind::CellTransition,
            EventType::Cell,
        )
    }

    /// The owning particle, if any.
    pub fn particle(&self) -> Option<ParticleId> {
        self.owner.particle()
    }

    /// `true` for the overflow placeholder.
    pub fn is_recalculate(&self) -> bool {
        matches!(self.kind, EventKind::Recalculate)
    }

    /// Turn this event into an overflow placeholder at the same time.
    pub fn into_recalculate(self) -> Self {
        Self {
            kind: EventKind::Recalculate,
            event_type: EventType::Recalculate,
            stamp: Stamp {
                partner: None,
                ..self.stamp
            },
            ..self
        }
    }

    /// Total order used by every queue in the workspace: by time, then
    /// by owner, then by partner. NaN never reaches a queue.
    pub fn order(&self, other: &Self) -> Ordering {
        self.dt
            .total_cmp(&other.dt)
            .then_with(|| self.owner.tie_key().cmp(&other.owner.tie_key()))
            .then_with(|| {
                let a = self.kind.partner().map_or(u32::MAX, |p| p.0);
                let b = other.kind.partner().map_or(u32::MAX, |p| p.0);
                a.cmp(&b)
            })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} for {}", self.kind.name(), self.event_type, self.owner)?;
        if let Some(partner) = self.kind.partner() {
            write!(f, " with particle {partner}")?;
        }
        write!(f, " in dt={}", self.dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_breaks_ties_by_owner_then_partner() {
        let a = Event::interaction(ParticleId(1), ParticleId(5), SourceId(0), 2.0, EventType::Core);
        let b = Event::interaction(ParticleId(1), ParticleId(3), SourceId(0), 2.0, EventType::Core);
        let c = Event::cell_transition(ParticleId(0), 2.0);
        let sys = Event::new(Owner::System, 2.0, EventKind::System { source: SourceId(0) }, EventType::Ticker);

        assert_eq!(c.order(&a), Ordering::Less);
        assert_eq!(b.order(&a), Ordering::Less);
        assert_eq!(a.order(&sys), Ordering::Less);
        assert_eq!(a.order(&a), Ordering::Equal);
    }

    #[test]
    fn order_is_by_time_first() {
        let early = Event::cell_transition(ParticleId(9), 1.0);
        let late = Event::cell_transition(ParticleId(0), 1.5);
        assert_eq!(early.order(&late), Ordering::Less);
    }

    #[test]
    fn recalculate_keeps_time_and_owner() {
        let mut e = Event::interaction(ParticleId(2), ParticleId(4), SourceId(1), 3.5, EventType::Core);
        e.stamp = Stamp {
            owner: EventCount(7),
            partner: Some(EventCount(3)),
        };
        let r = e.into_recalculate();
        assert!(r.is_recalculate());
        assert_eq!(r.dt, 3.5);
        assert_eq!(r.owner, Owner::Particle(ParticleId(2)));
        assert_eq!(r.stamp.owner, EventCount(7));
        assert_eq!(r.stamp.partner, None);
        assert_eq!(r.kind.partner(), None);
    }

    #[test]
    fn display_names_partner() {
        let e = Event::interaction(ParticleId(0), ParticleId(1), SourceId(0), 4.5, EventType::Core);
        let s = e.to_string();
        assert!(s.contains("interaction"));
        assert!(s.contains("particle 1"));
    }
}
