//! Cell lattice configuration.

use crate::error::SpaceError;

/// Tuning knobs for the cell list.
#[derive(Clone, Debug, PartialEq)]
pub struct CellConfig {
    /// Number of lattice cells spanning one interaction range.
    /// Neighbourhoods are `(2 * overlink + 1)^3` cells. Default: 1.
    pub overlink: usize,
    /// Fraction of the slack between lattice width and per-cell range
    /// used to enlarge each cell, so crossings land strictly inside the
    /// next cell. In `[0, 1]`. Default: 0.9.
    pub overlap: f64,
    /// Explicit lattice dimensions. `None` derives them from the box,
    /// the interaction range and the particle density.
    pub cells_per_axis: Option<[usize; 3]>,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            overlink: 1,
            overlap: 0.9,
            cells_per_axis: None,
        }
    }
}

impl CellConfig {
    /// Smallest lattice extent along any axis.
    pub fn min_cells_per_axis(&self) -> usize {
        (2 * self.overlink + 1).max(3)
    }

    /// Check field ranges. Geometry is checked when the lattice is built.
    pub fn validate(&self) -> Result<(), SpaceError> {
        if self.overlink == 0 {
            return Err(SpaceError::InvalidGeometry {
                reason: "overlink must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.overlap) {
            return Err(SpaceError::InvalidGeometry {
                reason: format!("overlap must be in [0, 1], got {}", self.overlap),
            });
        }
        if let Some(dims) = self.cells_per_axis {
            let min = self.min_cells_per_axis();
            if dims.iter().any(|&n| n < min) {
                return Err(SpaceError::InvalidGeometry {
                    reason: format!("cells_per_axis {dims:?} below minimum of {min} per axis"),
                });
            }
        }
        Ok(())
    }
}
