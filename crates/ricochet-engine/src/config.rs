//! Simulation configuration, validation, and error types.
//!
//! [`SimulationConfig`] is the builder input for
//! [`Simulation::new`](crate::driver::Simulation::new).
//! [`validate()`](SimulationConfig::validate) checks structural
//! invariants; geometry that depends on the interaction range (cell
//! sizing) and initial overlaps are checked when the simulation is built.

use std::error::Error;
use std::fmt;

use ricochet_core::{Kinematics, Particle, ParticleId, SpeciesId};
use ricochet_predict::{EventPredictor, PropertyTable};
use ricochet_sched::{CalendarConfig, CalendarError};
use ricochet_space::{BoundaryCondition, CellConfig, SpaceError};

use crate::error::ScheduleError;

/// Default number of consecutive watchdog rejections before an event is
/// forced through.
pub const DEFAULT_REJECTION_LIMIT: u32 = 10;

/// Default tolerated initial penetration depth.
pub const DEFAULT_OVERLAP_TOLERANCE: f64 = 1e-8;

// ── RunBudget ──────────────────────────────────────────────────────

/// When [`Simulation::run`](crate::driver::Simulation::run) stops.
///
/// Both limits are cumulative over the simulation's lifetime. With
/// neither set, `run()` only returns on error.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunBudget {
    /// Stop after this many executed events. Default: unlimited.
    pub max_events: Option<u64>,
    /// Stop when the system clock reaches this time. Default: unlimited.
    pub max_time: Option<f64>,
}

impl RunBudget {
    /// Stop after `n` executed events.
    pub fn events(n: u64) -> Self {
        Self {
            max_events: Some(n),
            max_time: None,
        }
    }

    /// Stop at simulation time `t`.
    pub fn time(t: f64) -> Self {
        Self {
            max_events: None,
            max_time: Some(t),
        }
    }

    /// `true` if neither limit is set.
    pub fn is_unlimited(&self) -> bool {
        self.max_events.is_none() && self.max_time.is_none()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.max_time {
            if !t.is_finite() || t < 0.0 {
                return Err(ConfigError::InvalidBudget {
                    reason: format!("max_time must be finite and non-negative, got {t}"),
                });
            }
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a [`SimulationConfig`] or building
/// the simulation from it.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The particle array is empty.
    NoParticles,
    /// More particles than the calendar can address.
    TooManyParticles {
        /// The configured count.
        count: usize,
    },
    /// `particles[index].id` is not `index`.
    ParticleIdMismatch {
        /// Array position.
        index: usize,
        /// The id found there.
        id: ParticleId,
    },
    /// A particle's position or velocity is NaN or infinite.
    NonFiniteState {
        /// The offending particle.
        particle: ParticleId,
    },
    /// A particle's species is not in the property table.
    UnknownSpecies {
        /// The offending particle.
        particle: ParticleId,
        /// Its species.
        species: SpeciesId,
    },
    /// The external acceleration is not finite.
    InvalidAcceleration,
    /// Calendar configuration is invalid.
    Calendar(CalendarError),
    /// Cell configuration or geometry is invalid.
    Space(SpaceError),
    /// The run budget is invalid.
    InvalidBudget {
        /// Which limit is wrong.
        reason: String,
    },
    /// `overlap_tolerance` is negative or not finite.
    InvalidTolerance {
        /// The invalid value.
        value: f64,
    },
    /// Two particles start overlapping by more than the tolerance.
    Overlap {
        /// First particle.
        a: ParticleId,
        /// Second particle.
        b: ParticleId,
        /// Penetration depth.
        depth: f64,
    },
    /// Building the initial schedule failed.
    InitialSchedule(ScheduleError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoParticles => write!(f, "no particles configured"),
            Self::TooManyParticles { count } => {
                write!(f, "{count} particles exceed the addressable maximum")
            }
            Self::ParticleIdMismatch { index, id } => {
                write!(f, "particle at index {index} has id {id}")
            }
            Self::NonFiniteState { particle } => {
                write!(f, "particle {particle} has a non-finite position or velocity")
            }
            Self::UnknownSpecies { particle, species } => {
                write!(f, "particle {particle} has unknown species {species}")
            }
            Self::InvalidAcceleration => write!(f, "external acceleration must be finite"),
            Self::Calendar(e) => write!(f, "calendar: {e}"),
            Self::Space(e) => write!(f, "space: {e}"),
            Self::InvalidBudget { reason } => write!(f, "invalid run budget: {reason}"),
            Self::InvalidTolerance { value } => {
                write!(f, "overlap_tolerance must be finite and non-negative, got {value}")
            }
            Self::Overlap { a, b, depth } => {
                write!(f, "particles {a} and {b} start overlapping by {depth}")
            }
            Self::InitialSchedule(e) => write!(f, "initial schedule: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Calendar(e) => Some(e),
            Self::Space(e) => Some(e),
            Self::InitialSchedule(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CalendarError> for ConfigError {
    fn from(e: CalendarError) -> Self {
        Self::Calendar(e)
    }
}

impl From<SpaceError> for ConfigError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

impl From<ScheduleError> for ConfigError {
    fn from(e: ScheduleError) -> Self {
        Self::InitialSchedule(e)
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Everything needed to build a [`Simulation`](crate::driver::Simulation).
///
/// `particles[i].id` must equal `ParticleId(i)`. The particle count is
/// fixed for the lifetime of the simulation; removed particles keep
/// their slot with the `ALIVE` flag cleared.
pub struct SimulationConfig {
    /// Initial particle state.
    pub particles: Vec<Particle>,
    /// Image mapping shared by the cell list and every predictor.
    pub boundary: Box<dyn BoundaryCondition>,
    /// Species table consulted by predictors.
    pub properties: PropertyTable,
    /// Event predictor.
    pub predictor: Box<dyn EventPredictor>,
    /// Streaming law. Default: free flight.
    pub kinematics: Kinematics,
    /// Calendar sizing.
    pub calendar: CalendarConfig,
    /// Cell lattice sizing.
    pub cells: CellConfig,
    /// When `run()` stops. Default: unlimited.
    pub budget: RunBudget,
    /// Consecutive watchdog rejections tolerated before an event is
    /// executed anyway. Zero disables the watchdog. Default: 10.
    pub rejection_limit: u32,
    /// Largest initial penetration depth accepted. Default: 1e-8.
    pub overlap_tolerance: f64,
}

impl SimulationConfig {
    /// Config with default kinematics, calendar, cells and budget.
    pub fn new(
        particles: Vec<Particle>,
        boundary: impl BoundaryCondition,
        properties: PropertyTable,
        predictor: impl EventPredictor,
    ) -> Self {
        Self {
            particles,
            boundary: Box::new(boundary),
            properties,
            predictor: Box::new(predictor),
            kinematics: Kinematics::free_flight(),
            calendar: CalendarConfig::default(),
            cells: CellConfig::default(),
            budget: RunBudget::default(),
            rejection_limit: DEFAULT_REJECTION_LIMIT,
            overlap_tolerance: DEFAULT_OVERLAP_TOLERANCE,
        }
    }

    /// Check structural invariants.
    ///
    /// Range-dependent geometry and initial overlaps need the predictor
    /// and the cell list, and are checked by `Simulation::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one particle.
        if self.particles.is_empty() {
            return Err(ConfigError::NoParticles);
        }
        // 2. Addressable by the calendar (slot N is the system slot).
        if self.particles.len() >= (u32::MAX - 1) as usize {
            return Err(ConfigError::TooManyParticles {
                count: self.particles.len(),
            });
        }
        for (index, p) in self.particles.iter().enumerate() {
            // 3. Ids match array positions.
            if p.id.index() != index {
                return Err(ConfigError::ParticleIdMismatch { index, id: p.id });
            }
            // 4. Finite state.
            if !p.is_finite() {
                return Err(ConfigError::NonFiniteState { particle: p.id });
            }
            // 5. Known species.
            if !self.properties.contains(p.species) {
                return Err(ConfigError::UnknownSpecies {
                    particle: p.id,
                    species: p.species,
                });
            }
        }
        // 6. Finite external field.
        if !self.kinematics.acceleration.is_finite() {
            return Err(ConfigError::InvalidAcceleration);
        }
        // 7. Calendar sizing.
        self.calendar.validate()?;
        // 8. Cell knobs.
        self.cells.validate()?;
        // 9. Budget.
        self.budget.validate()?;
        // 10. Overlap tolerance.
        if !self.overlap_tolerance.is_finite() || self.overlap_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance {
                value: self.overlap_tolerance,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SimulationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationConfig")
            .field("particles", &self.particles.len())
            .field("boundary", &self.boundary)
            .field("properties", &self.properties)
            .field("max_range", &self.predictor.max_interaction_range())
            .field("kinematics", &self.kinematics)
            .field("calendar", &self.calendar)
            .field("cells", &self.cells)
            .field("budget", &self.budget)
            .field("rejection_limit", &self.rejection_limit)
            .field("overlap_tolerance", &self.overlap_tolerance)
            .finish()
    }
}
