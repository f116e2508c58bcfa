//! Cell-list invariant helpers.
//!
//! Reused by every test that mutates a [`CellList`]: membership must
//! stay in step with positions, and occupancy must account for every
//! live particle exactly once.

use indexmap::IndexSet;
use ricochet_core::{CellId, Particle, ParticleId};

use crate::cells::CellList;

/// Assert that the sum of per-cell occupancy equals the live count.
pub fn assert_occupancy_matches(cells: &CellList, particles: &[Particle]) {
    let live = particles.iter().filter(|p| p.is_alive()).count();
    assert_eq!(
        cells.total_occupancy(),
        live,
        "total occupancy {} != live particle count {live}",
        cells.total_occupancy()
    );
}

/// Assert that every live particle is filed under exactly one cell and
/// that the cell's extent contains its position.
pub fn assert_membership_consistent(cells: &CellList, particles: &[Particle]) {
    assert_occupancy_matches(cells, particles);
    let mut seen: IndexSet<ParticleId> = IndexSet::new();
    for c in 0..cells.cell_count() as u32 {
        for p in cells.particles_in(CellId(c)) {
            assert!(seen.insert(p), "particle {p} filed under two cells");
            assert_eq!(cells.cell_of(p), Some(CellId(c)), "reverse map for {p} disagrees");
        }
    }
    for p in particles {
        assert!(
            cells.is_consistent(p, 1e-9),
            "particle {} at {} outside the extent of {:?}",
            p.id,
            p.position,
            cells.cell_of(p.id)
        );
    }
}

/// Assert that neighbourhoods are symmetric: `b` near `a` iff `a` near `b`.
pub fn assert_neighbours_symmetric(cells: &CellList) {
    for c in 0..cells.cell_count() as u32 {
        let cell = CellId(c);
        for nb in cells.neighbour_cells(cell).expect("valid cell") {
            let back = cells.neighbour_cells(nb).expect("valid cell");
            assert!(
                back.contains(&cell),
                "neighbour symmetry violated: {nb} near {cell} but not the reverse"
            );
        }
    }
}
