//! Test fixtures and oracles for Ricochet development.
//!
//! - [`fixtures`]: minimal event sources (hard spheres, a plane wall, a
//!   sentinel, a ticker, a random velocity reverser) so the scheduler can
//!   be driven end to end.
//! - [`gas`]: seeded random particle configurations.
//! - [`oracle`]: brute-force references the fast paths are checked
//!   against.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod gas;
pub mod oracle;

pub use fixtures::{HardSphere, PlaneWall, Reverser, Sentinel, Ticker};
pub use gas::{lattice_gas, random_cloud};
pub use oracle::{brute_force_cell, brute_force_pairs, min_separation, ReferenceQueue};
