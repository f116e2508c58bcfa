//! Particle state and flag bits.

use std::fmt;

use glam::DVec3;

use crate::id::{ParticleId, SpeciesId};

/// State bits carried by each particle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleFlags(u8);

impl ParticleFlags {
    /// The particle streams and owns a calendar entry.
    pub const DYNAMIC: Self = Self(1 << 0);
    /// The particle is parked: it does not stream and is only
    /// scheduled as somebody else's partner.
    pub const SLEEPING: Self = Self(1 << 1);
    /// The particle takes part in the simulation. Clearing this bit
    /// removes the particle from indexing and scheduling.
    pub const ALIVE: Self = Self(1 << 2);

    /// No bits set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit pattern.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Union of two flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for ParticleFlags {
    /// `DYNAMIC | ALIVE`.
    fn default() -> Self {
        Self::DYNAMIC.union(Self::ALIVE)
    }
}

impl fmt::Debug for ParticleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.contains(Self::DYNAMIC) {
            set.entry(&"DYNAMIC");
        }
        if self.contains(Self::SLEEPING) {
            set.entry(&"SLEEPING");
        }
        if self.contains(Self::ALIVE) {
            set.entry(&"ALIVE");
        }
        set.finish()
    }
}

/// A point particle.
///
/// Positions are stored unwrapped between cell transitions; the
/// spatial index wraps them back into the primary image whenever a
/// particle crosses the edge of the periodic box.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Index into the particle array.
    pub id: ParticleId,
    /// Position at the current system time.
    pub position: DVec3,
    /// Velocity at the current system time.
    pub velocity: DVec3,
    /// Species, resolved through the property table.
    pub species: SpeciesId,
    /// State bits.
    pub flags: ParticleFlags,
}

impl Particle {
    /// A live, dynamic particle of species 0.
    pub fn new(id: ParticleId, position: DVec3, velocity: DVec3) -> Self {
        Self {
            id,
            position,
            velocity,
            species: SpeciesId(0),
            flags: ParticleFlags::default(),
        }
    }

    /// Builder-style species override.
    pub fn with_species(mut self, species: SpeciesId) -> Self {
        self.species = species;
        self
    }

    /// Builder-style flag override.
    pub fn with_flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// `true` unless the particle was removed.
    pub fn is_alive(&self) -> bool {
        self.flags.contains(ParticleFlags::ALIVE)
    }

    /// `true` if the particle moves between events and owns its own
    /// calendar entry.
    pub fn is_scheduled(&self) -> bool {
        self.flags.contains(ParticleFlags::ALIVE.union(ParticleFlags::DYNAMIC))
            && !self.flags.contains(ParticleFlags::SLEEPING)
    }

    /// Translational momentum for a given mass.
    pub fn momentum(&self, mass: f64) -> DVec3 {
        self.velocity * mass
    }

    /// Translational kinetic energy for a given mass.
    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        0.5 * mass * self.velocity.length_squared()
    }

    /// `true` if position and velocity are finite on every axis.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Borrow two distinct particles mutably.
///
/// Returns `None` if `a == b` or either index is out of range.
pub fn pair_mut(
    particles: &mut [Particle],
    a: ParticleId,
    b: ParticleId,
) -> Option<(&mut Particle, &mut Particle)> {
    let (i, j) = (a.index(), b.index());
    if i == j || i >= particles.len() || j >= particles.len() {
        return None;
    }
    if i < j {
        let (lo, hi) = particles.split_at_mut(j);
        Some((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = particles.split_at_mut(i);
        Some((&mut hi[0], &mut lo[j]))
    }
}
