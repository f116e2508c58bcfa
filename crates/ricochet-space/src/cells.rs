//! The cell list: particle membership over a [`CellLattice`].
//!
//! Membership is updated incrementally. Each particle's next exit from
//! its cell is predicted like any other event
//! ([`transition_time`](CellList::transition_time)), and the move is
//! applied when that event fires
//! ([`apply_transition`](CellList::apply_transition)). Nothing ever
//! rescans all particles except an explicit [`rebuild`](CellList::rebuild).

use indexmap::IndexSet;
use ricochet_core::{CellCrossing, CellId, DVec3, Kinematics, Particle, ParticleId};
use tracing::debug;

use crate::boundary::BoundaryCondition;
use crate::config::CellConfig;
use crate::error::SpaceError;
use crate::lattice::{CellCoord, CellLattice, CellVec};

/// Result of moving a particle across a cell face.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Cell the particle left.
    pub from: CellId,
    /// Cell the particle entered.
    pub to: CellId,
    /// Cells whose occupants are new interaction candidates.
    pub entered: CellVec,
    /// `true` if the particle's position was mapped back into the
    /// primary image on the way.
    pub wrapped: bool,
}

/// Spatial index over a fixed particle population.
#[derive(Clone, Debug)]
pub struct CellList {
    lattice: CellLattice,
    members: Vec<IndexSet<ParticleId>>,
    cell_of: Vec<Option<CellId>>,
    periodic: bool,
    sheared: bool,
}

impl CellList {
    /// Build an empty index sized for `range` over `particle_count`
    /// particles in `boundary`'s primary box.
    pub fn new(
        boundary: &dyn BoundaryCondition,
        range: f64,
        particle_count: usize,
        config: &CellConfig,
    ) -> Result<Self, SpaceError> {
        let lattice = CellLattice::new(boundary.primary_box(), range, particle_count, config)?;
        if boundary.is_sheared() && lattice.overlink() != 1 {
            return Err(SpaceError::InvalidGeometry {
                reason: "sheared boundaries require overlink = 1".to_string(),
            });
        }
        debug!(
            dims = ?lattice.dims(),
            width = %lattice.lattice_width(),
            range,
            "cell lattice built"
        );
        Ok(Self {
            members: vec![IndexSet::new(); lattice.cell_count()],
            cell_of: vec![None; particle_count],
            periodic: boundary.is_periodic(),
            sheared: boundary.is_sheared(),
            lattice,
        })
    }

    /// Lattice geometry.
    pub fn lattice(&self) -> &CellLattice {
        &self.lattice
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.members.len()
    }

    /// Cell coordinate of `position` after mapping it into the primary
    /// image.
    pub fn locate(
        &self,
        position: DVec3,
        boundary: &dyn BoundaryCondition,
    ) -> Result<CellCoord, SpaceError> {
        let mut p = position;
        boundary.wrap(&mut p);
        self.lattice.locate(p)
    }

    /// Current cell of `particle`.
    pub fn cell_of(&self, particle: ParticleId) -> Option<CellId> {
        self.cell_of.get(particle.index()).copied().flatten()
    }

    /// Particles in `cell`, in insertion order.
    pub fn particles_in(&self, cell: CellId) -> impl Iterator<Item = ParticleId> + '_ {
        self.members
            .get(cell.index())
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Number of particles in `cell`.
    pub fn occupancy(&self, cell: CellId) -> usize {
        self.members.get(cell.index()).map_or(0, IndexSet::len)
    }

    /// Sum of occupancy over all cells.
    pub fn total_occupancy(&self) -> usize {
        self.members.iter().map(IndexSet::len).sum()
    }

    /// Add `particle` to `cell`.
    pub fn insert(&mut self, particle: ParticleId, cell: CellId) -> Result<(), SpaceError> {
        let slot = self
            .cell_of
            .get_mut(particle.index())
            .ok_or(SpaceError::UnknownParticle { particle })?;
        if let Some(existing) = *slot {
            return Err(SpaceError::AlreadyIndexed {
                particle,
                cell: existing,
            });
        }
        let set = self
            .members
            .get_mut(cell.index())
            .ok_or_else(|| SpaceError::CellOutOfRange {
                coord: [cell.index() as i64, 0, 0],
                dims: self.lattice.dims(),
            })?;
        set.insert(particle);
        *slot = Some(cell);
        Ok(())
    }

    /// Remove `particle` from its cell, returning the cell.
    pub fn remove(&mut self, particle: ParticleId) -> Result<CellId, SpaceError> {
        let cell = self
            .cell_of
            .get_mut(particle.index())
            .and_then(Option::take)
            .ok_or(SpaceError::UnknownParticle { particle })?;
        if let Some(set) = self.members.get_mut(cell.index()) {
            set.swap_remove(&particle);
        }
        Ok(cell)
    }

    /// Move `particle` from `from` to `to`.
    pub fn transfer(&mut self, particle: ParticleId, from: CellId, to: CellId) -> Result<(), SpaceError> {
        match self.cell_of(particle) {
            Some(current) if current == from => {}
            _ => return Err(SpaceError::UnknownParticle { particle }),
        }
        self.remove(particle)?;
        self.insert(particle, to)
    }

    /// Locate and insert a particle. Removed particles are skipped.
    pub fn index_particle(
        &mut self,
        particle: &Particle,
        boundary: &dyn BoundaryCondition,
    ) -> Result<Option<CellId>, SpaceError> {
        if !particle.is_alive() {
            return Ok(None);
        }
        let coord = self.locate(particle.position, boundary)?;
        let cell = self.lattice.id(coord)?;
        self.insert(particle.id, cell)?;
        Ok(Some(cell))
    }

    /// Clear and re-index every live particle.
    pub fn rebuild(
        &mut self,
        particles: &[Particle],
        boundary: &dyn BoundaryCondition,
    ) -> Result<(), SpaceError> {
        for set in &mut self.members {
            set.clear();
        }
        self.cell_of.iter_mut().for_each(|c| *c = None);
        self.cell_of.resize(particles.len(), None);
        for p in particles {
            self.index_particle(p, boundary)?;
        }
        Ok(())
    }

    /// Cells whose occupants may interact with occupants of `cell`.
    ///
    /// Under shear, cells in the two boundary rows also see the whole
    /// x-strip of the opposite boundary row.
    pub fn neighbour_cells(&self, cell: CellId) -> Result<CellVec, SpaceError> {
        let coord = self.lattice.coord(cell)?;
        let mut cells = self.lattice.neighbourhood(coord);
        if self.sheared {
            let ny = self.lattice.dims()[1];
            if coord[1] == 0 {
                cells.extend(self.lattice.shear_strip(ny - 1, coord[2]));
            }
            if coord[1] == ny - 1 {
                cells.extend(self.lattice.shear_strip(0, coord[2]));
            }
            cells.sort_unstable();
            cells.dedup();
        }
        Ok(cells)
    }

    /// Every particle other than `particle` in its neighbourhood.
    pub fn neighbours_of(&self, particle: ParticleId) -> Result<Vec<ParticleId>, SpaceError> {
        let cell = self
            .cell_of(particle)
            .ok_or(SpaceError::UnknownParticle { particle })?;
        let cells = self.neighbour_cells(cell)?;
        Ok(self.collect(&cells, particle))
    }

    fn collect(&self, cells: &[CellId], exclude: ParticleId) -> Vec<ParticleId> {
        cells
            .iter()
            .flat_map(|&c| self.particles_in(c))
            .filter(|&q| q != exclude)
            .collect()
    }

    /// Time until `particle` leaves its cell's extent.
    ///
    /// `Ok(None)` if it never does (at rest, or not scheduled).
    pub fn transition_time(
        &self,
        particle: &Particle,
        kinematics: &Kinematics,
    ) -> Result<Option<CellCrossing>, SpaceError> {
        if !particle.is_scheduled() {
            return Ok(None);
        }
        let cell = self
            .cell_of(particle.id)
            .ok_or(SpaceError::UnknownParticle { particle: particle.id })?;
        let coord = self.lattice.coord(cell)?;
        let offset = self.lattice.offset_in_cell(coord, particle.position);
        Ok(kinematics.exit_time(offset, particle.velocity, self.lattice.cell_dimension()))
    }

    /// Move `particle`, which must be sitting on the face described by
    /// `crossing`, into the next cell.
    ///
    /// When the move crosses the edge of a periodic box, the crossing
    /// coordinate is mapped back into the primary image. A crossing of
    /// the sheared y boundary maps the whole position and velocity
    /// through the boundary and re-homes the particle in whichever
    /// column the shifted x lands in.
    pub fn apply_transition(
        &mut self,
        particle: &mut Particle,
        crossing: &CellCrossing,
        boundary: &dyn BoundaryCondition,
    ) -> Result<Transition, SpaceError> {
        let id = particle.id;
        let from = self.cell_of(id).ok_or(SpaceError::UnknownParticle { particle: id })?;
        let from_coord = self.lattice.coord(from)?;
        let axis = crossing.axis;
        let n = self.lattice.dims()[axis];
        let crosses_edge = (crossing.direction > 0 && from_coord[axis] == n - 1)
            || (crossing.direction < 0 && from_coord[axis] == 0);

        let mut to_coord = self.lattice.step(from_coord, axis, i64::from(crossing.direction));
        let mut wrapped = false;
        if crosses_edge && self.periodic {
            wrapped = true;
            if self.sheared && axis == 1 {
                boundary.wrap_with_velocity(&mut particle.position, &mut particle.velocity);
                to_coord[0] = self.lattice.locate(particle.position)?[0];
            } else {
                let size = self.lattice.box_size()[axis];
                particle.position[axis] -= size * (particle.position[axis] / size).round();
            }
        }

        let to = self.lattice.id(to_coord)?;
        self.transfer(id, from, to)?;

        let entered = if self.sheared {
            self.neighbour_cells(to)?
        } else {
            self.lattice.leading_slab(to_coord, axis, crossing.direction)
        };
        Ok(Transition {
            from,
            to,
            entered,
            wrapped,
        })
    }

    /// New interaction candidates after a transition.
    pub fn entered_particles(&self, transition: &Transition, particle: ParticleId) -> Vec<ParticleId> {
        self.collect(&transition.entered, particle)
    }

    /// `true` if `particle` lies inside the extent of the cell it is
    /// filed under.
    pub fn is_consistent(&self, particle: &Particle, eps: f64) -> bool {
        let Some(cell) = self.cell_of(particle.id) else {
            return !particle.is_alive();
        };
        match self.lattice.coord(cell) {
            Ok(coord) => self.lattice.extent_contains(coord, particle.position, eps),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{LeesEdwards, Periodic, Unbounded};
    use crate::compliance;
    use proptest::prelude::*;

    fn grid10() -> CellConfig {
        CellConfig {
            cells_per_axis: Some([10, 10, 10]),
            ..CellConfig::default()
        }
    }

    fn particle(i: u32, pos: DVec3, vel: DVec3) -> Particle {
        Particle::new(ParticleId(i), pos, vel)
    }

    #[test]
    fn insert_remove_round_trip() {
        let bc = Periodic::cube(10.0).unwrap();
        let mut cells = CellList::new(&bc, 0.5, 4, &grid10()).unwrap();
        let before: Vec<usize> = (0..cells.cell_count() as u32).map(|c| cells.occupancy(CellId(c))).collect();
        cells.insert(ParticleId(2), CellId(17)).unwrap();
        assert_eq!(cells.occupancy(CellId(17)), 1);
        assert_eq!(cells.remove(ParticleId(2)).unwrap(), CellId(17));
        let after: Vec<usize> = (0..cells.cell_count() as u32).map(|c| cells.occupancy(CellId(c))).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn double_insert_is_rejected() {
        let bc = Periodic::cube(10.0).unwrap();
        let mut cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        cells.insert(ParticleId(0), CellId(0)).unwrap();
        assert!(matches!(
            cells.insert(ParticleId(0), CellId(1)),
            Err(SpaceError::AlreadyIndexed { .. })
        ));
        assert!(matches!(
            cells.insert(ParticleId(5), CellId(1)),
            Err(SpaceError::UnknownParticle { .. })
        ));
    }

    #[test]
    fn transfer_requires_current_cell() {
        let bc = Periodic::cube(10.0).unwrap();
        let mut cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        cells.insert(ParticleId(0), CellId(3)).unwrap();
        assert!(cells.transfer(ParticleId(0), CellId(4), CellId(5)).is_err());
        cells.transfer(ParticleId(0), CellId(3), CellId(5)).unwrap();
        assert_eq!(cells.cell_of(ParticleId(0)), Some(CellId(5)));
        assert_eq!(cells.total_occupancy(), 1);
    }

    #[test]
    fn rebuild_skips_removed_particles() {
        let bc = Periodic::cube(10.0).unwrap();
        let mut ps = vec![
            particle(0, DVec3::ZERO, DVec3::ZERO),
            particle(1, DVec3::splat(2.0), DVec3::ZERO),
        ];
        ps[1].flags.remove(ricochet_core::ParticleFlags::ALIVE);
        let mut cells = CellList::new(&bc, 0.5, 2, &grid10()).unwrap();
        cells.rebuild(&ps, &bc).unwrap();
        assert_eq!(cells.total_occupancy(), 1);
        assert_eq!(cells.cell_of(ParticleId(1)), None);
        compliance::assert_membership_consistent(&cells, &ps);
    }

    #[test]
    fn neighbours_include_wrapped_cells() {
        let bc = Periodic::cube(10.0).unwrap();
        let ps = vec![
            particle(0, DVec3::splat(-4.9), DVec3::ZERO),
            particle(1, DVec3::splat(4.9), DVec3::ZERO),
            particle(2, DVec3::ZERO, DVec3::ZERO),
        ];
        let mut cells = CellList::new(&bc, 0.5, 3, &grid10()).unwrap();
        cells.rebuild(&ps, &bc).unwrap();
        let nb = cells.neighbours_of(ParticleId(0)).unwrap();
        assert_eq!(nb, vec![ParticleId(1)]);
    }

    #[test]
    fn transition_moves_particle_and_reports_slab() {
        let bc = Periodic::cube(10.0).unwrap();
        let k = Kinematics::free_flight();
        let mut p = particle(0, DVec3::new(0.5, 0.5, 0.5), DVec3::new(1.0, 0.0, 0.0));
        let mut cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        cells.rebuild(std::slice::from_ref(&p), &bc).unwrap();
        let from = cells.cell_of(ParticleId(0)).unwrap();

        let crossing = cells.transition_time(&p, &k).unwrap().unwrap();
        assert_eq!((crossing.axis, crossing.direction), (0, 1));
        k.stream(&mut p, crossing.dt);
        let t = cells.apply_transition(&mut p, &crossing, &bc).unwrap();
        assert_eq!(t.from, from);
        assert_ne!(t.to, from);
        assert_eq!(t.entered.len(), 9);
        assert!(cells.is_consistent(&p, 1e-9));

        // The next crossing is a full lattice width away, not zero.
        let next = cells.transition_time(&p, &k).unwrap().unwrap();
        assert!(next.dt > 0.5);
    }

    #[test]
    fn crossing_the_box_edge_wraps_position() {
        let bc = Periodic::cube(10.0).unwrap();
        let k = Kinematics::free_flight();
        let mut p = particle(0, DVec3::new(4.8, 0.5, 0.5), DVec3::new(1.0, 0.0, 0.0));
        let mut cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        cells.rebuild(std::slice::from_ref(&p), &bc).unwrap();
        let crossing = cells.transition_time(&p, &k).unwrap().unwrap();
        k.stream(&mut p, crossing.dt);
        let t = cells.apply_transition(&mut p, &crossing, &bc).unwrap();
        assert!(t.wrapped);
        assert!(p.position.x < -4.5);
        assert_eq!(cells.lattice().coord(t.to).unwrap()[0], 0);
        assert!(cells.is_consistent(&p, 1e-9));
    }

    #[test]
    fn unbounded_box_tiles_without_wrapping() {
        let bc = Unbounded::new(DVec3::splat(10.0)).unwrap();
        let k = Kinematics::free_flight();
        let mut p = particle(0, DVec3::new(4.8, 0.5, 0.5), DVec3::new(1.0, 0.0, 0.0));
        let mut cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        cells.rebuild(std::slice::from_ref(&p), &bc).unwrap();
        let crossing = cells.transition_time(&p, &k).unwrap().unwrap();
        k.stream(&mut p, crossing.dt);
        let t = cells.apply_transition(&mut p, &crossing, &bc).unwrap();
        assert!(!t.wrapped);
        assert!(p.position.x > 5.0);
        assert!(cells.is_consistent(&p, 1e-9));
    }

    #[test]
    fn sheared_crossing_rehomes_column() {
        let mut bc = LeesEdwards::new(DVec3::splat(10.0), 0.1).unwrap();
        bc.stream(3.0); // images above are shifted by +3 in x
        let k = Kinematics::free_flight();
        let mut p = particle(0, DVec3::new(0.5, 4.8, 0.5), DVec3::new(0.0, 1.0, 0.0));
        let mut cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        cells.rebuild(std::slice::from_ref(&p), &bc).unwrap();
        let from = cells.lattice().coord(cells.cell_of(ParticleId(0)).unwrap()).unwrap();

        let crossing = cells.transition_time(&p, &k).unwrap().unwrap();
        assert_eq!((crossing.axis, crossing.direction), (1, 1));
        k.stream(&mut p, crossing.dt);
        let t = cells.apply_transition(&mut p, &crossing, &bc).unwrap();
        let to = cells.lattice().coord(t.to).unwrap();
        assert_eq!(to[1], 0);
        assert_eq!(to[0], (from[0] + 10 - 3) % 10);
        assert!((p.velocity.x + 1.0).abs() < 1e-12);
        assert!(cells.is_consistent(&p, 1e-9));
    }

    #[test]
    fn sheared_boundary_rows_see_opposite_strip() {
        let bc = LeesEdwards::new(DVec3::splat(10.0), 0.1).unwrap();
        let cells = CellList::new(&bc, 0.5, 1, &grid10()).unwrap();
        let lattice = cells.lattice().clone();
        let nb = cells.neighbour_cells(lattice.id([0, 0, 0]).unwrap()).unwrap();
        // 27 regular cells plus the rest of the opposite row strip.
        assert_eq!(nb.len(), 27 + 3 * 7);
        let interior = cells.neighbour_cells(lattice.id([0, 5, 0]).unwrap()).unwrap();
        assert_eq!(interior.len(), 27);
    }

    #[test]
    fn sheared_requires_unit_overlink() {
        let bc = LeesEdwards::new(DVec3::splat(10.0), 0.1).unwrap();
        let cfg = CellConfig {
            overlink: 2,
            ..grid10()
        };
        assert!(matches!(
            CellList::new(&bc, 1.0, 1, &cfg),
            Err(SpaceError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn neighbourhoods_are_symmetric() {
        let periodic = Periodic::cube(10.0).unwrap();
        compliance::assert_neighbours_symmetric(&CellList::new(&periodic, 0.5, 1, &grid10()).unwrap());
        let sheared = LeesEdwards::new(DVec3::splat(10.0), 0.5).unwrap();
        compliance::assert_neighbours_symmetric(&CellList::new(&sheared, 0.5, 1, &grid10()).unwrap());
    }

    proptest! {
        #[test]
        fn random_walks_keep_membership_consistent(
            seed_pos in prop::collection::vec((-5.0f64..5.0, -5.0f64..5.0, -5.0f64..5.0), 1..20),
            seed_vel in prop::collection::vec((-2.0f64..2.0, -2.0f64..2.0, -2.0f64..2.0), 20),
            steps in 1usize..60,
        ) {
            let bc = Periodic::cube(10.0).unwrap();
            let k = Kinematics::free_flight();
            let mut ps: Vec<Particle> = seed_pos
                .iter()
                .zip(&seed_vel)
                .enumerate()
                .map(|(i, (&(x, y, z), &(vx, vy, vz)))| {
                    particle(i as u32, DVec3::new(x, y, z), DVec3::new(vx, vy, vz))
                })
                .collect();
            let mut cells = CellList::new(&bc, 0.5, ps.len(), &grid10()).unwrap();
            cells.rebuild(&ps, &bc).unwrap();

            for _ in 0..steps {
                // Advance everyone to the earliest crossing and apply it.
                let mut next: Option<(usize, CellCrossing)> = None;
                for (i, p) in ps.iter().enumerate() {
                    if let Some(c) = cells.transition_time(p, &k).unwrap() {
                        if next.as_ref().is_none_or(|(_, b)| c.dt < b.dt) {
                            next = Some((i, c));
                        }
                    }
                }
                let Some((i, crossing)) = next else { break };
                for p in ps.iter_mut() {
                    k.stream(p, crossing.dt);
                }
                cells.apply_transition(&mut ps[i], &crossing, &bc).unwrap();
                prop_assert_eq!(cells.total_occupancy(), ps.len());
                for p in &ps {
                    prop_assert!(cells.is_consistent(p, 1e-7));
                }
            }
        }
    }
}
