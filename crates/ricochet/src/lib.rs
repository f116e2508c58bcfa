//! Ricochet: an event-driven molecular dynamics engine.
//!
//! Particles stream freely between discrete events (collisions, wall
//! bounces, cell crossings, thermostat ticks). The engine predicts each
//! particle's next events, keeps them in a calendar ordered by time,
//! and repairs only the affected entries after every event.
//!
//! This is the facade crate. It re-exports the public API of every
//! sub-crate.
//!
//! # Quick start
//!
//! ```rust
//! use ricochet::prelude::*;
//!
//! // Equal-mass elastic spheres of unit diameter.
//! struct Spheres;
//! impl Interaction for Spheres {
//!     fn name(&self) -> &str { "spheres" }
//!     fn range(&self) -> f64 { 1.0 }
//!     fn predict(
//!         &self,
//!         _ctx: &PredictContext<'_>,
//!         a: &Particle,
//!         b: &Particle,
//!     ) -> Result<Option<Prediction>, PredictError> {
//!         let (r, v) = (b.position - a.position, b.velocity - a.velocity);
//!         let (rv, c) = (r.dot(v), r.length_squared() - 1.0);
//!         let disc = rv * rv - v.length_squared() * c;
//!         if rv >= 0.0 || disc < 0.0 {
//!             return Ok(None);
//!         }
//!         Ok(Some(Prediction::new(c / (-rv + disc.sqrt()), EventType::Core)))
//!     }
//!     fn execute(
//!         &self,
//!         _ctx: &PredictContext<'_>,
//!         a: &mut Particle,
//!         b: &mut Particle,
//!         _event_type: EventType,
//!     ) -> Result<f64, ExecuteError> {
//!         let r = b.position - a.position;
//!         let k = r.dot(b.velocity - a.velocity) / r.length_squared();
//!         a.velocity += r * k;
//!         b.velocity -= r * k;
//!         Ok(0.0)
//!     }
//! }
//!
//! let mut predictor = PredictorTable::new();
//! predictor.add_interaction(Spheres).unwrap();
//! let particles = vec![
//!     Particle::new(ParticleId(0), DVec3::ZERO, DVec3::X),
//!     Particle::new(ParticleId(1), DVec3::X * 10.0, -DVec3::X),
//! ];
//! let config = SimulationConfig::new(
//!     particles,
//!     Unbounded::new(DVec3::splat(30.0)).unwrap(),
//!     PropertyTable::single("bulk", 1.0).unwrap(),
//!     predictor,
//! );
//! let mut sim = Simulation::new(config).unwrap();
//! sim.run_until(5.0).unwrap();
//! assert_eq!(sim.metrics().interaction_events, 1);
//! assert!(sim.particles()[0].velocity.x < 0.0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `ricochet-core` | Ids, particles, events, kinematics |
//! | [`space`] | `ricochet-space` | Boundary conditions and the cell list |
//! | [`sched`] | `ricochet-sched` | Bounded per-particle lists and the event calendar |
//! | [`predict`] | `ricochet-predict` | Event source traits and predictor tables |
//! | [`engine`] | `ricochet-engine` | The simulation driver and replica exchange |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Ids, particles, events and free streaming (`ricochet-core`).
pub use ricochet_core as types;

/// Boundary conditions and the cell list (`ricochet-space`).
///
/// [`space::CellList`] answers neighbour queries and predicts cell
/// crossings under any [`space::BoundaryCondition`].
pub use ricochet_space as space;

/// The event calendar (`ricochet-sched`).
pub use ricochet_sched as sched;

/// Event sources and dispatch (`ricochet-predict`).
///
/// Implement [`predict::Interaction`], [`predict::Local`],
/// [`predict::Global`] or [`predict::SystemEvent`] and register them in
/// a [`predict::PredictorTable`].
pub use ricochet_predict as predict;

/// The simulation driver (`ricochet-engine`).
///
/// [`engine::Simulation`] runs one system; [`engine::ReplicaExchange`]
/// runs several at different temperatures and swaps them.
pub use ricochet_engine as engine;

/// Common imports for typical Ricochet usage.
///
/// ```rust
/// use ricochet::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use ricochet_core::{
        DVec3, Event, EventKind, EventType, Kinematics, Owner, Particle, ParticleFlags,
        ParticleId, SpeciesId,
    };

    // Errors
    pub use ricochet_core::{ExecuteError, PredictError};
    pub use ricochet_engine::{ConfigError, ReplicaError, RunError};

    // Space
    pub use ricochet_space::{BoundaryCondition, CellConfig, LeesEdwards, Periodic, Unbounded};

    // Calendar
    pub use ricochet_sched::CalendarConfig;

    // Event sources
    pub use ricochet_predict::{
        EventOutcome, EventPredictor, Global, Interaction, Local, PredictContext, Prediction,
        PredictorTable, PropertyTable, SystemEvent,
    };

    // Engine
    pub use ricochet_engine::{
        EventObserver, EventRecord, ReplicaConfig, ReplicaExchange, RunBudget, RunMetrics,
        Simulation, SimulationConfig, SwapMode,
    };
}
