//! Boundary conditions and the cell-list spatial index.
//!
//! The [`CellList`] answers "which particles could interact with this
//! one" in constant time by filing particles into a regular lattice of
//! overlapping cells. Membership changes only when a particle's
//! predicted cell transition fires, so the index never needs an O(N)
//! rescan during a run.
//!
//! # Boundaries
//!
//! - [`Unbounded`]: infinite space; the lattice tiles periodically.
//! - [`Periodic`]: cuboidal periodic box.
//! - [`LeesEdwards`]: sheared periodic box (sliding-brick images).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod boundary;
pub mod cells;
pub mod config;
pub mod error;
pub mod lattice;

#[cfg(test)]
pub(crate) mod compliance;

pub use boundary::{BoundaryCondition, LeesEdwards, Periodic, Unbounded};
pub use cells::{CellList, Transition};
pub use config::CellConfig;
pub use error::SpaceError;
pub use lattice::{CellCoord, CellLattice, CellVec};
