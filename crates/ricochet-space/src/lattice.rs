//! Geometry of the cell lattice.
//!
//! The primary box `[-L/2, L/2)` is cut into `dims` lattice cells of
//! width `w = L / n` per axis. Each cell's *extent* is the lattice cell
//! grown by a margin `m` on every side, so neighbouring extents overlap.
//! A particle is a member of exactly one cell and stays there until it
//! leaves that cell's extent; at that moment it sits `2m` inside the
//! next cell's extent, which stops it sliding back and forth along a
//! shared face.
//!
//! Correctness of the neighbourhood follows from the sizing rule
//! `w >= range / overlink`: two particles `overlink + 1` cells apart are
//! at least `range` apart even with both pushed into their margins.

use ricochet_core::{CellId, DVec3};
use smallvec::SmallVec;

use crate::config::CellConfig;
use crate::error::SpaceError;

/// Integer cell coordinate `[x, y, z]`.
pub type CellCoord = [usize; 3];

/// Inline capacity covering a full `overlink = 1` neighbourhood.
pub type CellVec = SmallVec<[CellId; 27]>;

/// Dimensions and widths of the cell lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct CellLattice {
    dims: [usize; 3],
    box_size: DVec3,
    lattice_width: DVec3,
    cell_dimension: DVec3,
    margin: DVec3,
    overlink: usize,
    range: f64,
}

impl CellLattice {
    /// Size a lattice for `box_size`, the largest interaction `range`
    /// and `particle_count` particles.
    ///
    /// Without explicit dimensions the lattice is as fine as the range
    /// allows, but never finer than one cell per particle on average.
    pub fn new(
        box_size: DVec3,
        range: f64,
        particle_count: usize,
        config: &CellConfig,
    ) -> Result<Self, SpaceError> {
        config.validate()?;
        if !box_size.is_finite() || box_size.min_element() <= 0.0 {
            return Err(SpaceError::InvalidGeometry {
                reason: format!("box edges must be finite and positive, got {box_size}"),
            });
        }
        if !range.is_finite() || range < 0.0 {
            return Err(SpaceError::InvalidGeometry {
                reason: format!("interaction range must be finite and non-negative, got {range}"),
            });
        }

        let min_cells = config.min_cells_per_axis();
        let per_cell = range / config.overlink as f64;
        let supported = box_size.min_element() / min_cells as f64 * config.overlink as f64;

        let dims = match config.cells_per_axis {
            Some(dims) => dims,
            None => {
                let density_width = if particle_count > 0 {
                    (box_size.x * box_size.y * box_size.z / particle_count as f64).cbrt()
                } else {
                    0.0
                };
                let width = per_cell.max(density_width);
                let mut dims = [0usize; 3];
                for (axis, n) in dims.iter_mut().enumerate() {
                    *n = if width > 0.0 {
                        ((box_size[axis] / width).floor() as usize).max(min_cells)
                    } else {
                        min_cells
                    };
                }
                // A box with no interactions and no particles still
                // needs a valid lattice.
                if width == 0.0 {
                    dims = [min_cells; 3];
                }
                dims
            }
        };

        for (axis, &n) in dims.iter().enumerate() {
            if n < min_cells {
                return Err(SpaceError::InteractionRangeTooLarge { range, supported });
            }
            if box_size[axis] / (n as f64) < per_cell {
                return Err(SpaceError::InteractionRangeTooLarge {
                    range,
                    supported: box_size[axis] / n as f64 * config.overlink as f64,
                });
            }
        }
        let total = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .and_then(|n| u32::try_from(n).ok());
        if total.is_none() {
            return Err(SpaceError::InvalidGeometry {
                reason: format!("lattice {dims:?} has more than u32::MAX cells"),
            });
        }

        let counts = DVec3::new(dims[0] as f64, dims[1] as f64, dims[2] as f64);
        let lattice_width = box_size / counts;
        let cell_dimension = lattice_width + (lattice_width - DVec3::splat(per_cell)) * config.overlap;
        let margin = (cell_dimension - lattice_width) * 0.5;

        Ok(Self {
            dims,
            box_size,
            lattice_width,
            cell_dimension,
            margin,
            overlink: config.overlink,
            range,
        })
    }

    /// Cells per axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Primary box edge lengths.
    pub fn box_size(&self) -> DVec3 {
        self.box_size
    }

    /// Lattice spacing per axis.
    pub fn lattice_width(&self) -> DVec3 {
        self.lattice_width
    }

    /// Edge lengths of a cell's extent (lattice width plus margins).
    pub fn cell_dimension(&self) -> DVec3 {
        self.cell_dimension
    }

    /// Cells per interaction range.
    pub fn overlink(&self) -> usize {
        self.overlink
    }

    /// The interaction range the lattice was sized for.
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Largest interaction range this lattice can serve.
    pub fn max_supported_range(&self) -> f64 {
        self.lattice_width.min_element() * self.overlink as f64
    }

    /// Flat id of a coordinate. Fails on out-of-range coordinates
    /// rather than aliasing another cell.
    pub fn id(&self, coord: CellCoord) -> Result<CellId, SpaceError> {
        if (0..3).any(|a| coord[a] >= self.dims[a]) {
            return Err(SpaceError::CellOutOfRange {
                coord: coord.map(|c| c as i64),
                dims: self.dims,
            });
        }
        let flat = (coord[2] * self.dims[1] + coord[1]) * self.dims[0] + coord[0];
        // Cell count was checked to fit u32 at construction.
        Ok(CellId(flat as u32))
    }

    /// Coordinate of a flat id.
    pub fn coord(&self, id: CellId) -> Result<CellCoord, SpaceError> {
        let flat = id.index();
        if flat >= self.cell_count() {
            return Err(SpaceError::CellOutOfRange {
                coord: [flat as i64, 0, 0],
                dims: self.dims,
            });
        }
        let x = flat % self.dims[0];
        let y = (flat / self.dims[0]) % self.dims[1];
        let z = flat / (self.dims[0] * self.dims[1]);
        Ok([x, y, z])
    }

    /// Lattice cell containing `position`. Positions outside the
    /// primary box map to the periodic image of the lattice.
    pub fn locate(&self, position: DVec3) -> Result<CellCoord, SpaceError> {
        if !position.is_finite() {
            return Err(SpaceError::NonFinitePosition { position });
        }
        let mut coord = [0usize; 3];
        for axis in 0..3 {
            let t = ((position[axis] + 0.5 * self.box_size[axis]) / self.lattice_width[axis]).floor();
            let n = self.dims[axis] as i64;
            coord[axis] = (t as i64).rem_euclid(n) as usize;
        }
        Ok(coord)
    }

    /// Lower corner of a lattice cell, in primary-box coordinates.
    pub fn lower_corner(&self, coord: CellCoord) -> DVec3 {
        let c = DVec3::new(coord[0] as f64, coord[1] as f64, coord[2] as f64);
        c * self.lattice_width - self.box_size * 0.5
    }

    /// `position` relative to the lower corner of `coord`'s extent,
    /// taking the image of the position closest to the cell.
    pub fn offset_in_cell(&self, coord: CellCoord, position: DVec3) -> DVec3 {
        let origin = self.lower_corner(coord) - self.margin;
        let mut rel = position - origin;
        let half = self.cell_dimension * 0.5;
        rel -= self.box_size * ((rel - half) / self.box_size).round();
        rel
    }

    /// `true` if `position` lies within the extent of `coord`
    /// (inclusive, with tolerance `eps`).
    pub fn extent_contains(&self, coord: CellCoord, position: DVec3, eps: f64) -> bool {
        let rel = self.offset_in_cell(coord, position);
        (0..3).all(|a| rel[a] >= -eps && rel[a] <= self.cell_dimension[a] + eps)
    }

    /// Neighbour of `coord` `delta` cells along `axis`, wrapping.
    pub fn step(&self, coord: CellCoord, axis: usize, delta: i64) -> CellCoord {
        let mut out = coord;
        let n = self.dims[axis] as i64;
        out[axis] = (coord[axis] as i64 + delta).rem_euclid(n) as usize;
        out
    }

    /// The `(2 * overlink + 1)^3` cells around `coord`, itself included.
    pub fn neighbourhood(&self, coord: CellCoord) -> CellVec {
        let o = self.overlink as i64;
        let mut out = CellVec::new();
        for dz in -o..=o {
            let cz = self.step(coord, 2, dz);
            for dy in -o..=o {
                let cy = self.step(cz, 1, dy);
                for dx in -o..=o {
                    let c = self.step(cy, 0, dx);
                    if let Ok(id) = self.id(c) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    /// Cells that become adjacent when a particle moves from the cell
    /// before `to` into `to` along `axis` in `direction`: the
    /// `(2 * overlink + 1)^2` slab `overlink` cells ahead of `to`.
    pub fn leading_slab(&self, to: CellCoord, axis: usize, direction: i8) -> CellVec {
        let o = self.overlink as i64;
        let front = self.step(to, axis, i64::from(direction) * o);
        let (a1, a2) = ((axis + 1) % 3, (axis + 2) % 3);
        let mut out = CellVec::new();
        for d2 in -o..=o {
            let c2 = self.step(front, a2, d2);
            for d1 in -o..=o {
                let c = self.step(c2, a1, d1);
                if let Ok(id) = self.id(c) {
                    out.push(id);
                }
            }
        }
        out
    }

    /// Every cell of row `y` within `overlink` of `z`, across all x.
    /// Under shear the x alignment of rows across the y boundary keeps
    /// changing, so cells in the boundary rows see the whole strip.
    pub fn shear_strip(&self, y: usize, z: usize) -> CellVec {
        let o = self.overlink as i64;
        let mut out = CellVec::new();
        for dz in -o..=o {
            let cz = (z as i64 + dz).rem_euclid(self.dims[2] as i64) as usize;
            for x in 0..self.dims[0] {
                if let Ok(id) = self.id([x, y, cz]) {
                    out.push(id);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(box_edge: f64, range: f64, n: usize) -> CellLattice {
        CellLattice::new(DVec3::splat(box_edge), range, n, &CellConfig::default()).unwrap()
    }

    #[test]
    fn auto_sizing_uses_interaction_range() {
        let l = lattice(10.0, 2.0, 1000);
        assert_eq!(l.dims(), [5, 5, 5]);
        assert!((l.lattice_width().x - 2.0).abs() < 1e-12);
        assert!(l.max_supported_range() >= 2.0);
    }

    #[test]
    fn auto_sizing_caps_by_density() {
        // Range 0.1 would give 100 cells per axis; 1000 particles in a
        // 10^3 box caps it at one cell per unit volume.
        let l = lattice(10.0, 0.1, 1000);
        assert_eq!(l.dims(), [10, 10, 10]);
    }

    #[test]
    fn sparse_systems_keep_the_minimum_lattice() {
        let l = lattice(30.0, 1.0, 2);
        assert_eq!(l.dims(), [3, 3, 3]);
    }

    #[test]
    fn range_too_large_is_rejected() {
        let err = CellLattice::new(DVec3::splat(5.0), 2.0, 10, &CellConfig::default()).unwrap_err();
        assert!(matches!(err, SpaceError::InteractionRangeTooLarge { .. }));
    }

    #[test]
    fn explicit_dims_must_fit_range() {
        let cfg = CellConfig {
            cells_per_axis: Some([10, 10, 10]),
            ..CellConfig::default()
        };
        assert!(CellLattice::new(DVec3::splat(10.0), 1.0, 1000, &cfg).is_ok());
        let err = CellLattice::new(DVec3::splat(10.0), 1.5, 1000, &cfg).unwrap_err();
        assert!(matches!(err, SpaceError::InteractionRangeTooLarge { .. }));
    }

    #[test]
    fn id_coord_roundtrip() {
        let cfg = CellConfig {
            cells_per_axis: Some([3, 4, 5]),
            ..CellConfig::default()
        };
        let l = CellLattice::new(DVec3::new(3.0, 4.0, 5.0), 1.0, 10, &cfg).unwrap();
        for flat in 0..l.cell_count() as u32 {
            let c = l.coord(CellId(flat)).unwrap();
            assert_eq!(l.id(c).unwrap(), CellId(flat));
        }
    }

    #[test]
    fn out_of_range_coordinate_is_an_error() {
        let l = lattice(10.0, 2.0, 1000);
        assert!(matches!(
            l.id([5, 0, 0]),
            Err(SpaceError::CellOutOfRange { .. })
        ));
        assert!(l.coord(CellId(125)).is_err());
    }

    #[test]
    fn locate_wraps_images() {
        let l = lattice(10.0, 2.0, 1000);
        assert_eq!(l.locate(DVec3::splat(-5.0)).unwrap(), [0, 0, 0]);
        assert_eq!(l.locate(DVec3::splat(4.99)).unwrap(), [4, 4, 4]);
        assert_eq!(l.locate(DVec3::new(5.5, -5.5, 14.0)).unwrap(), [0, 4, 4]);
        assert!(l.locate(DVec3::new(f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn neighbourhood_has_27_distinct_cells() {
        let l = lattice(10.0, 2.0, 1000);
        let mut nb = l.neighbourhood([0, 0, 0]);
        assert_eq!(nb.len(), 27);
        nb.sort();
        nb.dedup();
        assert_eq!(nb.len(), 27);
    }

    #[test]
    fn leading_slab_is_ahead_of_target() {
        let l = lattice(10.0, 2.0, 1000);
        let slab = l.leading_slab([2, 2, 2], 0, 1);
        assert_eq!(slab.len(), 9);
        for id in slab {
            assert_eq!(l.coord(id).unwrap()[0], 3);
        }
        let back = l.leading_slab([0, 2, 2], 0, -1);
        for id in back {
            assert_eq!(l.coord(id).unwrap()[0], 4);
        }
    }

    #[test]
    fn extents_overlap_their_neighbours() {
        let l = lattice(10.0, 0.5, 1000);
        let w = l.lattice_width().x;
        assert!(l.cell_dimension().x > w);
        // A point just past the upper face of cell 0 is still inside it.
        let lower = l.lower_corner([0, 0, 0]);
        let p = lower + DVec3::new(w + 0.01, 0.5 * w, 0.5 * w);
        assert!(l.extent_contains([0, 0, 0], p, 0.0));
        assert!(l.extent_contains([1, 0, 0], p, 0.0));
    }

    #[test]
    fn shear_strip_spans_every_column() {
        let l = lattice(10.0, 2.0, 1000);
        let strip = l.shear_strip(4, 0);
        assert_eq!(strip.len(), 5 * 3);
        assert!(strip.iter().all(|&id| l.coord(id).unwrap()[1] == 4));
    }
}
