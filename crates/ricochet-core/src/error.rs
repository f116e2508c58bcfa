//! Errors reported by event predictors.
//!
//! Predictors never panic on bad state: a prediction that cannot be
//! made returns [`PredictError`] and an execution that cannot be
//! carried out returns [`ExecuteError`]. The engine wraps either one in
//! a fatal run error together with the full event context.

use std::error::Error;
use std::fmt;

use crate::event::EventKind;
use crate::id::{ParticleId, SourceId, SpeciesId};

/// Errors from predicting an event time.
#[derive(Clone, Debug, PartialEq)]
pub enum PredictError {
    /// Two particles overlap by more than the tolerated amount.
    Overlap {
        /// First particle.
        a: ParticleId,
        /// Second particle.
        b: ParticleId,
        /// Penetration depth.
        depth: f64,
    },
    /// A particle is outside the region a local obstacle confines it to.
    Escaped {
        /// The particle.
        particle: ParticleId,
        /// Name of the obstacle.
        obstacle: String,
    },
    /// A species was not found in the property table.
    UnknownSpecies {
        /// The missing species.
        species: SpeciesId,
    },
    /// The computation produced NaN.
    NotANumber {
        /// What was being computed.
        context: String,
    },
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap { a, b, depth } => {
                write!(f, "particles {a} and {b} overlap by {depth}")
            }
            Self::Escaped { particle, obstacle } => {
                write!(f, "particle {particle} escaped through '{obstacle}'")
            }
            Self::UnknownSpecies { species } => write!(f, "unknown species {species}"),
            Self::NotANumber { context } => write!(f, "NaN while computing {context}"),
        }
    }
}

impl Error for PredictError {}

/// Errors from executing an event.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecuteError {
    /// The event references a source that is not in the table.
    UnknownSource {
        /// Kind of event that carried the source id.
        kind: &'static str,
        /// The missing source.
        source: SourceId,
    },
    /// The event kind is handled by the scheduler, not a predictor.
    NotExecutable {
        /// The offending kind.
        kind: EventKind,
    },
    /// The event references a particle that does not exist.
    UnknownParticle {
        /// The missing particle.
        particle: ParticleId,
    },
    /// The handler's own prediction failed while executing.
    Predict(PredictError),
    /// The handler refused to execute.
    Rejected {
        /// Why.
        reason: String,
    },
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSource { kind, source } => {
                write!(f, "no {kind} source with id {source}")
            }
            Self::NotExecutable { kind } => {
                write!(f, "{} events are not executed by predictors", kind.name())
            }
            Self::UnknownParticle { particle } => write!(f, "unknown particle {particle}"),
            Self::Predict(e) => write!(f, "prediction failed during execution: {e}"),
            Self::Rejected { reason } => write!(f, "execution rejected: {reason}"),
        }
    }
}

impl Error for ExecuteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Predict(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PredictError> for ExecuteError {
    fn from(e: PredictError) -> Self {
        Self::Predict(e)
    }
}
