//! Brute-force references.
//!
//! Everything here is O(N) or O(N^2) on purpose: these are the answers
//! the incremental structures must agree with.

use std::cmp::Ordering;

use ricochet_core::{CellId, DVec3, Event, Particle, ParticleId};
use ricochet_space::{BoundaryCondition, CellList};

/// Unsorted event pool popped by linear scan with [`Event::order`].
#[derive(Clone, Debug, Default)]
pub struct ReferenceQueue {
    events: Vec<Event>,
}

impl ReferenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Keep only the events satisfying `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&Event) -> bool) {
        self.events.retain(keep);
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.iter().min_by(|a, b| a.order(b))
    }

    pub fn pop(&mut self) -> Option<Event> {
        let (i, _) = self
            .events
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.order(b))?;
        Some(self.events.swap_remove(i))
    }

    /// Subtract `dt` from every stored time.
    pub fn stream(&mut self, dt: f64) {
        for e in &mut self.events {
            e.dt -= dt;
        }
    }
}

/// Scan every lattice cell for the one whose half-open box holds
/// `position` (already in the primary image).
pub fn brute_force_cell(cells: &CellList, position: DVec3) -> Option<CellId> {
    let lattice = cells.lattice();
    let w = lattice.lattice_width();
    (0..cells.cell_count() as u32).map(CellId).find(|&id| {
        lattice.coord(id).is_ok_and(|coord| {
            let lower = lattice.lower_corner(coord);
            (0..3).all(|a| position[a] >= lower[a] && position[a] < lower[a] + w[a])
        })
    })
}

/// Every live pair closer than `range` under the boundary's minimum
/// image, with the lower id first.
pub fn brute_force_pairs(
    particles: &[Particle],
    boundary: &dyn BoundaryCondition,
    range: f64,
) -> Vec<(ParticleId, ParticleId)> {
    let mut pairs = Vec::new();
    for (i, a) in particles.iter().enumerate() {
        for b in &particles[i + 1..] {
            if !a.is_alive() || !b.is_alive() {
                continue;
            }
            let mut r = b.position - a.position;
            boundary.wrap(&mut r);
            if r.length() < range {
                pairs.push((a.id, b.id));
            }
        }
    }
    pairs
}

/// Smallest minimum-image separation over all live pairs, with the pair.
pub fn min_separation(
    particles: &[Particle],
    boundary: &dyn BoundaryCondition,
) -> Option<(f64, ParticleId, ParticleId)> {
    let mut best: Option<(f64, ParticleId, ParticleId)> = None;
    for (i, a) in particles.iter().enumerate() {
        for b in &particles[i + 1..] {
            if !a.is_alive() || !b.is_alive() {
                continue;
            }
            let mut r = b.position - a.position;
            boundary.wrap(&mut r);
            let d = r.length();
            if best.is_none_or(|(x, _, _)| d.total_cmp(&x) == Ordering::Less) {
                best = Some((d, a.id, b.id));
            }
        }
    }
    best
}
