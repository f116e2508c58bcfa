//! Event-driven simulation driver for Ricochet.
//!
//! [`Simulation`] owns the particles, the cell list and the event
//! calendar, and runs the pop / stream / execute / invalidate /
//! recompute loop until a [`RunBudget`] is met. [`ReplicaExchange`]
//! runs several simulations at different temperatures in parallel and
//! swaps them between segments.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod replica;
pub mod scheduler;

pub use config::{
    ConfigError, RunBudget, SimulationConfig, DEFAULT_OVERLAP_TOLERANCE, DEFAULT_REJECTION_LIMIT,
};
pub use driver::{DriverState, Simulation, StepOutcome};
pub use error::{EventReport, ParticleSnapshot, RunError, ScheduleError};
pub use metrics::RunMetrics;
pub use observer::{ChannelObserver, EventObserver, EventRecord};
pub use replica::{ReplicaConfig, ReplicaError, ReplicaExchange, ReplicaStats, SwapMode};
pub use scheduler::Scheduler;
