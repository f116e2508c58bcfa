//! Error types for spatial indexing.

use ricochet_core::{CellId, DVec3, ParticleId};
use std::fmt;

/// Errors arising from cell-list construction or updates.
///
/// Every variant is fatal to a run: it means the configuration cannot
/// support the requested interaction range, or positions have drifted
/// somewhere the lattice cannot represent.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceError {
    /// A computed cell coordinate is outside the lattice.
    CellOutOfRange {
        /// The offending coordinate.
        coord: [i64; 3],
        /// Lattice extent per axis.
        dims: [usize; 3],
    },
    /// A position is NaN or infinite and cannot be located.
    NonFinitePosition {
        /// The offending position.
        position: DVec3,
    },
    /// Box or lattice parameters are inconsistent.
    InvalidGeometry {
        /// What went wrong.
        reason: String,
    },
    /// The largest interaction range does not fit the lattice.
    InteractionRangeTooLarge {
        /// Requested interaction range.
        range: f64,
        /// Largest range the lattice supports.
        supported: f64,
    },
    /// The particle is not in the index.
    UnknownParticle {
        /// The missing particle.
        particle: ParticleId,
    },
    /// The particle is already in a cell.
    AlreadyIndexed {
        /// The particle.
        particle: ParticleId,
        /// The cell it is in.
        cell: CellId,
    },
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellOutOfRange { coord, dims } => {
                write!(f, "cell coordinate {coord:?} outside lattice {dims:?}")
            }
            Self::NonFinitePosition { position } => {
                write!(f, "cannot locate non-finite position {position}")
            }
            Self::InvalidGeometry { reason } => write!(f, "invalid cell geometry: {reason}"),
            Self::InteractionRangeTooLarge { range, supported } => write!(
                f,
                "interaction range {range} exceeds the {supported} supported by the cell lattice"
            ),
            Self::UnknownParticle { particle } => {
                write!(f, "particle {particle} is not in the cell list")
            }
            Self::AlreadyIndexed { particle, cell } => {
                write!(f, "particle {particle} is already in cell {cell}")
            }
        }
    }
}

impl std::error::Error for SpaceError {}
