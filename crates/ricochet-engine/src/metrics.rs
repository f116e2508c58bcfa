//! Cumulative run counters.
//!
//! [`RunMetrics`] is updated by the driver on every pop and read back
//! through [`Simulation::metrics`](crate::driver::Simulation::metrics).

use ricochet_core::EventKind;

/// Counters accumulated over the lifetime of a simulation.
///
/// Every field except `last_run_us` is cumulative. Stale discards and
/// watchdog rejections are recovered conditions, not errors; a steadily
/// climbing rejection count usually means a predictor disagrees with
/// itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunMetrics {
    /// Executed interaction events.
    pub interaction_events: u64,
    /// Executed local events.
    pub local_events: u64,
    /// Executed global events.
    pub global_events: u64,
    /// Executed system events.
    pub system_events: u64,
    /// Executed cell transitions.
    pub cell_transitions: u64,
    /// Popped events discarded because a dependency counter moved on or
    /// a particle was removed.
    pub stale_discards: u64,
    /// Recalculate markers popped.
    pub recalculations: u64,
    /// Events rejected by the watchdog re-prediction.
    pub rejections: u64,
    /// Events executed despite rejection after the limit was reached.
    pub watchdog_overrides: u64,
    /// Neighbouring entries refreshed because they referenced a changed
    /// particle.
    pub neighbour_refreshes: u64,
    /// Full rebuilds of the cell list and calendar.
    pub full_rebuilds: u64,
    /// Calendar overflows that placed a recalculate marker.
    pub overflow_markers: u64,
    /// Wall-clock time of the most recent `run()`, in microseconds.
    pub last_run_us: u64,
}

impl RunMetrics {
    /// Events that changed or moved particles, cell transitions
    /// included.
    pub fn executed(&self) -> u64 {
        self.interaction_events
            + self.local_events
            + self.global_events
            + self.system_events
            + self.cell_transitions
    }

    pub(crate) fn record_executed(&mut self, kind: EventKind) {
        match kind {
            EventKind::Interaction { .. } => self.interaction_events += 1,
            EventKind::Local { .. } => self.local_events += 1,
            EventKind::Global { .. } => self.global_events += 1,
            EventKind::System { .. } => self.system_events += 1,
            EventKind::CellTransition => self.cell_transitions += 1,
            EventKind::Recalculate => self.recalculations += 1,
        }
    }
}
