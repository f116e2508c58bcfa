//! Calendar configuration parameters.

use crate::error::CalendarError;

/// Configuration for the event calendar.
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarConfig {
    /// Candidate events kept per particle.
    ///
    /// Default: 8. Minimum: 2, so an overflowed entry always holds at
    /// least one real event ahead of its recalculate marker.
    pub capacity: usize,

    /// Streams between folds of the accumulated time offset back into
    /// the stored event times.
    ///
    /// Default: 4096. Smaller values trade throughput for round-off.
    pub rebase_interval: u32,
}

impl CalendarConfig {
    /// Default per-particle capacity.
    pub const DEFAULT_CAPACITY: usize = 8;

    /// Default rebase interval.
    pub const DEFAULT_REBASE_INTERVAL: u32 = 4096;

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.capacity < 2 {
            return Err(CalendarError::CapacityTooSmall {
                capacity: self.capacity,
            });
        }
        if self.rebase_interval == 0 {
            return Err(CalendarError::ZeroRebaseInterval);
        }
        Ok(())
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            rebase_interval: Self::DEFAULT_REBASE_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = CalendarConfig::default();
        assert_eq!(cfg.capacity, 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn capacity_one_is_rejected() {
        let cfg = CalendarConfig {
            capacity: 1,
            ..CalendarConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(CalendarError::CapacityTooSmall { capacity: 1 })
        );
    }

    #[test]
    fn zero_rebase_interval_is_rejected() {
        let cfg = CalendarConfig {
            rebase_interval: 0,
            ..CalendarConfig::default()
        };
        assert_eq!(cfg.validate(), Err(CalendarError::ZeroRebaseInterval));
    }
}
