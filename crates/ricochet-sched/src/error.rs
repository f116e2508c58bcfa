//! Calendar error types.

use std::error::Error;
use std::fmt;

use ricochet_core::{Event, Owner};

/// Errors from pushing into or configuring the calendar.
#[derive(Clone, Debug, PartialEq)]
pub enum CalendarError {
    /// A predicted time was NaN.
    NotANumber {
        /// The rejected event.
        event: Event,
    },
    /// A predicted time was negative.
    NegativeTime {
        /// The rejected event.
        event: Event,
    },
    /// The owner has no calendar slot.
    UnknownOwner {
        /// The owner.
        owner: Owner,
    },
    /// Per-particle capacity below the minimum of 2.
    CapacityTooSmall {
        /// The configured capacity.
        capacity: usize,
    },
    /// Rebase interval of zero.
    ZeroRebaseInterval,
    /// A time rescale factor was not finite and positive.
    InvalidTimeScale {
        /// The rejected factor.
        factor: f64,
    },
    /// Particle count does not fit the slot index type.
    TooManyParticles {
        /// The requested count.
        count: usize,
    },
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber { event } => write!(f, "predicted time is NaN: {event}"),
            Self::NegativeTime { event } => write!(f, "predicted time is negative: {event}"),
            Self::UnknownOwner { owner } => write!(f, "no calendar slot for {owner}"),
            Self::CapacityTooSmall { capacity } => {
                write!(f, "calendar capacity {capacity} is below minimum of 2")
            }
            Self::ZeroRebaseInterval => write!(f, "rebase_interval must be at least 1"),
            Self::InvalidTimeScale { factor } => {
                write!(f, "time rescale factor must be finite and positive, got {factor}")
            }
            Self::TooManyParticles { count } => {
                write!(f, "{count} particles exceed the calendar's u32 slot range")
            }
        }
    }
}

impl Error for CalendarError {}
