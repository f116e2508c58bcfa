//! Core types for the Ricochet event-driven dynamics engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace:
//! identifiers, particles, event descriptors, free-streaming kinematics,
//! and the error types predictors report.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod id;
pub mod kinematics;
pub mod particle;

pub use error::{ExecuteError, PredictError};
pub use event::{Event, EventKind, EventType, Owner, Stamp};
pub use glam::DVec3;
pub use id::{CellId, EventCount, ParticleId, SourceId, SpeciesId};
pub use kinematics::{CellCrossing, Kinematics};
pub use particle::{pair_mut, Particle, ParticleFlags};
