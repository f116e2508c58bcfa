//! The [`EventPredictor`] capability the scheduler consumes.

use smallvec::SmallVec;

use ricochet_core::{Event, EventKind, ExecuteError, Particle, PredictError};

use crate::context::PredictContext;
use crate::outcome::EventOutcome;

/// Events predicted for one particle or for the system slot.
pub type Predictions = SmallVec<[Event; 4]>;

/// Everything the scheduler needs from the physics.
///
/// Implementations return fully formed [`Event`]s (owner, kind, source
/// id and relative `dt`); the calendar stamps them with counters.
///
/// # Object safety
///
/// This trait is object-safe; the engine stores the predictor as
/// `Box<dyn EventPredictor>`.
pub trait EventPredictor: Send + 'static {
    /// Largest range of any interaction. Sizes the cell lattice.
    fn max_interaction_range(&self) -> f64;

    /// Next pair event owned by `a` with partner `b`.
    fn predict_interaction(
        &self,
        ctx: &PredictContext<'_>,
        a: &Particle,
        b: &Particle,
    ) -> Result<Option<Event>, PredictError>;

    /// Events of `particle` with fixed obstacles.
    fn predict_local(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Predictions, PredictError>;

    /// Events of `particle` under global rules.
    fn predict_global(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Predictions, PredictError>;

    /// Events for the system slot.
    fn predict_system(&self, ctx: &PredictContext<'_>) -> Result<Predictions, PredictError>;

    /// Predict `event` afresh from the current particle state, keeping
    /// its owner and source. `Ok(None)` means the event no longer
    /// happens. Kinds without a fresh prediction are returned unchanged.
    fn repredict(
        &self,
        ctx: &PredictContext<'_>,
        event: &Event,
        particles: &[Particle],
    ) -> Result<Option<Event>, ExecuteError>;

    /// Carry out `event` on `particles`.
    fn execute(
        &mut self,
        ctx: &PredictContext<'_>,
        event: &Event,
        particles: &mut [Particle],
    ) -> Result<EventOutcome, ExecuteError>;

    /// Advance the internal clocks of stateful sources by `dt`.
    fn stream(&mut self, dt: f64);

    /// Penetration depth of `a` and `b`, if they overlap.
    fn overlap(&self, ctx: &PredictContext<'_>, a: &Particle, b: &Particle) -> Option<f64>;

    /// Human-readable name of the source behind `kind`, for reports.
    fn source_name(&self, kind: EventKind) -> Option<&str> {
        let _ = kind;
        None
    }
}
