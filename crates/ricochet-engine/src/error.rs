//! Run-time error types and fault reports.

use std::error::Error;
use std::fmt;

use ricochet_core::{
    DVec3, Event, EventCount, ExecuteError, ParticleFlags, ParticleId, PredictError, SpeciesId,
};
use ricochet_sched::CalendarError;
use ricochet_space::SpaceError;

// ── ScheduleError ──────────────────────────────────────────────────

/// Failure of one of the collaborators the scheduler drives.
#[derive(Clone, Debug, PartialEq)]
pub enum ScheduleError {
    /// A prediction failed.
    Predict(PredictError),
    /// An execution failed.
    Execute(ExecuteError),
    /// The calendar rejected an event (NaN or negative time).
    Calendar(CalendarError),
    /// The spatial index failed.
    Space(SpaceError),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predict(e) => write!(f, "predict: {e}"),
            Self::Execute(e) => write!(f, "execute: {e}"),
            Self::Calendar(e) => write!(f, "calendar: {e}"),
            Self::Space(e) => write!(f, "space: {e}"),
        }
    }
}

impl Error for ScheduleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Predict(e) => Some(e),
            Self::Execute(e) => Some(e),
            Self::Calendar(e) => Some(e),
            Self::Space(e) => Some(e),
        }
    }
}

impl From<PredictError> for ScheduleError {
    fn from(e: PredictError) -> Self {
        Self::Predict(e)
    }
}

impl From<ExecuteError> for ScheduleError {
    fn from(e: ExecuteError) -> Self {
        Self::Execute(e)
    }
}

impl From<CalendarError> for ScheduleError {
    fn from(e: CalendarError) -> Self {
        Self::Calendar(e)
    }
}

impl From<SpaceError> for ScheduleError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

// ── EventReport ────────────────────────────────────────────────────

/// State of one particle at the moment of a fault.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleSnapshot {
    /// The particle.
    pub id: ParticleId,
    /// Position.
    pub position: DVec3,
    /// Velocity.
    pub velocity: DVec3,
    /// Species.
    pub species: SpeciesId,
    /// Flags.
    pub flags: ParticleFlags,
    /// Live staleness counter.
    pub counter: Option<EventCount>,
}

/// Full context of the event that was being processed when a run
/// failed.
#[derive(Clone, Debug, PartialEq)]
pub struct EventReport {
    /// Simulation time of the fault.
    pub system_time: f64,
    /// The event being processed.
    pub event: Event,
    /// Name of the event's source, if it has one.
    pub source: Option<String>,
    /// The owner and partner, as far as they exist.
    pub particles: Vec<ParticleSnapshot>,
}

impl fmt::Display for EventReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at t={}: {} ({:?})", self.system_time, self.event, self.event.event_type)?;
        if let Some(source) = &self.source {
            write!(f, " from '{source}'")?;
        }
        for p in &self.particles {
            write!(
                f,
                "\n  particle {}: r={} v={} species={} flags={:?}",
                p.id, p.position, p.velocity, p.species, p.flags
            )?;
            if let Some(c) = p.counter {
                write!(f, " counter={c}")?;
            }
        }
        Ok(())
    }
}

// ── RunError ───────────────────────────────────────────────────────

/// Errors that end a run.
#[derive(Clone, Debug, PartialEq)]
pub enum RunError {
    /// Processing an event failed. The simulation is terminated.
    Fault {
        /// Event context at the time of failure.
        report: Box<EventReport>,
        /// What failed.
        cause: ScheduleError,
    },
    /// Rebuilding or repairing the schedule failed outside any single
    /// event. The simulation is terminated.
    Schedule(ScheduleError),
    /// No event will ever happen and no time bound was set.
    QueueExhausted {
        /// Time at which the queue ran dry.
        system_time: f64,
    },
    /// The simulation has terminated after an earlier fault.
    Terminated,
    /// A particle id outside the particle array.
    UnknownParticle {
        /// The offending id.
        particle: ParticleId,
    },
    /// A velocity scale factor was not finite and positive.
    InvalidScale {
        /// The offending factor.
        factor: f64,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault { report, cause } => write!(f, "{cause}, {report}"),
            Self::Schedule(e) => write!(f, "schedule repair failed: {e}"),
            Self::QueueExhausted { system_time } => {
                write!(f, "event queue exhausted at t={system_time}")
            }
            Self::Terminated => write!(f, "simulation has terminated"),
            Self::UnknownParticle { particle } => write!(f, "unknown particle {particle}"),
            Self::InvalidScale { factor } => {
                write!(f, "velocity scale must be finite and positive, got {factor}")
            }
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fault { cause, .. } => Some(cause),
            Self::Schedule(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScheduleError> for RunError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}
