//! Event sources: the four families of predictors.
//!
//! Each family is a trait; the [`PredictorTable`](crate::PredictorTable)
//! stores boxed implementations keyed by [`SourceId`](ricochet_core::SourceId).
//!
//! # Contract
//!
//! - `predict` is pure: two calls with the same particles and context
//!   return the same result.
//! - A returned `dt` is relative to `ctx.system_time()` and must not be
//!   NaN or finite-negative. `f64::NEG_INFINITY` means "now".
//! - `execute` only writes velocity, flags and species. Positions belong
//!   to the driver.

use ricochet_core::{EventType, ExecuteError, Particle, PredictError};

use crate::context::PredictContext;
use crate::outcome::EventOutcome;

/// Time and classification of a predicted event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Time until the event.
    pub dt: f64,
    /// Physical classification passed back to `execute`.
    pub event_type: EventType,
}

impl Prediction {
    /// Convenience constructor.
    pub fn new(dt: f64, event_type: EventType) -> Self {
        Self { dt, event_type }
    }
}

/// A pair rule between two particles.
pub trait Interaction: Send + 'static {
    /// Human-readable name for error reporting.
    fn name(&self) -> &str;

    /// Largest centre separation at which this interaction can produce an
    /// event. Sizes the cell lattice.
    fn range(&self) -> f64;

    /// `true` if this interaction governs the pair. The first applicable
    /// interaction in table order wins.
    fn applies(&self, a: &Particle, b: &Particle) -> bool {
        let _ = (a, b);
        true
    }

    /// Next event between `a` and `b`, if any.
    fn predict(
        &self,
        ctx: &PredictContext<'_>,
        a: &Particle,
        b: &Particle,
    ) -> Result<Option<Prediction>, PredictError>;

    /// Carry out the event. Returns the internal energy change.
    fn execute(
        &self,
        ctx: &PredictContext<'_>,
        a: &mut Particle,
        b: &mut Particle,
        event_type: EventType,
    ) -> Result<f64, ExecuteError>;

    /// Penetration depth of an invalid initial configuration, if any.
    ///
    /// Default: never overlapping.
    fn overlap(&self, ctx: &PredictContext<'_>, a: &Particle, b: &Particle) -> Option<f64> {
        let _ = (ctx, a, b);
        None
    }
}

/// A single-particle rule against a fixed obstacle such as a wall.
pub trait Local: Send + 'static {
    /// Human-readable name for error reporting.
    fn name(&self) -> &str;

    /// `true` if the obstacle affects `particle`.
    fn applies(&self, particle: &Particle) -> bool {
        let _ = particle;
        true
    }

    /// Next event of `particle` with the obstacle.
    fn predict(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Option<Prediction>, PredictError>;

    /// Carry out the event. Returns the internal energy change.
    fn execute(
        &self,
        ctx: &PredictContext<'_>,
        particle: &mut Particle,
        event_type: EventType,
    ) -> Result<f64, ExecuteError>;
}

/// A single-particle rule with no spatial extent, such as a sentinel
/// that bounds free flight.
pub trait Global: Send + 'static {
    /// Human-readable name for error reporting.
    fn name(&self) -> &str;

    /// `true` if the rule affects `particle`.
    fn applies(&self, particle: &Particle) -> bool {
        let _ = particle;
        true
    }

    /// Next event of `particle` under this rule.
    fn predict(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Option<Prediction>, PredictError>;

    /// Carry out the event. Returns the internal energy change.
    fn execute(
        &self,
        ctx: &PredictContext<'_>,
        particle: &mut Particle,
        event_type: EventType,
    ) -> Result<f64, ExecuteError>;
}

/// A whole-system event living in the system calendar slot.
///
/// Unlike the other families, system events carry their own state
/// (their clock, a random stream) and so take `&mut self`.
pub trait SystemEvent: Send + 'static {
    /// Human-readable name for error reporting.
    fn name(&self) -> &str;

    /// Next occurrence, if any.
    fn predict(&self, ctx: &PredictContext<'_>) -> Result<Option<Prediction>, PredictError>;

    /// Carry out the event on the whole particle array.
    fn execute(
        &mut self,
        ctx: &PredictContext<'_>,
        particles: &mut [Particle],
    ) -> Result<EventOutcome, ExecuteError>;

    /// Advance internal clocks by `dt`.
    ///
    /// Default: stateless in time.
    fn stream(&mut self, dt: f64) {
        let _ = dt;
    }
}
