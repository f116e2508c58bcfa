//! What an executed event changed.

use smallvec::SmallVec;

use ricochet_core::{DVec3, Particle, ParticleFlags, ParticleId, SpeciesId};

/// Before/after state of one particle touched by an event.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleDelta {
    /// The particle.
    pub id: ParticleId,
    /// Velocity before the event.
    pub old_velocity: DVec3,
    /// Velocity after the event.
    pub new_velocity: DVec3,
    /// Flags before the event.
    pub old_flags: ParticleFlags,
    /// Flags after the event.
    pub new_flags: ParticleFlags,
    /// Species before the event.
    pub old_species: SpeciesId,
    /// Species after the event.
    pub new_species: SpeciesId,
}

impl ParticleDelta {
    /// Delta between two snapshots of the same particle.
    pub fn between(before: &Particle, after: &Particle) -> Self {
        Self {
            id: after.id,
            old_velocity: before.velocity,
            new_velocity: after.velocity,
            old_flags: before.flags,
            new_flags: after.flags,
            old_species: before.species,
            new_species: after.species,
        }
    }

    /// `true` if velocity, flags or species differ.
    pub fn is_change(&self) -> bool {
        self.old_velocity != self.new_velocity
            || self.old_flags != self.new_flags
            || self.old_species != self.new_species
    }
}

/// Result of executing one event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventOutcome {
    /// Every particle the handler touched, changed or not.
    pub deltas: SmallVec<[ParticleDelta; 2]>,
    /// Change in internal (potential) energy.
    pub energy_delta: f64,
}

impl EventOutcome {
    /// Outcome that touched nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Record a touched particle.
    pub fn push(&mut self, before: &Particle, after: &Particle) {
        self.deltas.push(ParticleDelta::between(before, after));
    }

    /// Ids of particles whose state actually changed. These are the
    /// particles whose counters the driver bumps.
    pub fn changed(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.deltas.iter().filter(|d| d.is_change()).map(|d| d.id)
    }

    /// Ids of every touched particle.
    pub fn touched(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.deltas.iter().map(|d| d.id)
    }
}
