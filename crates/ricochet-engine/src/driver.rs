//! The event loop.
//!
//! [`Simulation`] owns the particles, the schedule and the predictor,
//! and advances by popping the earliest event from the calendar:
//!
//! 1. **Idle**: peek the calendar; stop at the budget.
//! 2. Pop. Recalculate markers and stale events are handled here and
//!    never advance the clock.
//! 3. **AdvanceTime**: stream particles, boundary, calendar and
//!    predictor state by the event's `dt`.
//! 4. **Execute**: cell transitions are applied to the spatial index;
//!    everything else goes to the predictor.
//! 5. **Invalidate**: bump the counters of changed particles and find
//!    neighbouring entries that depended on them.
//! 6. **Recompute**: regenerate the entries of every involved particle.
//!
//! A fault moves the simulation to **Terminated**; every later call
//! returns [`RunError::Terminated`].

use std::fmt;
use std::time::Instant;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::{debug, error, info, trace, warn};

use ricochet_core::{DVec3, Event, EventKind, Kinematics, Owner, Particle, ParticleFlags, ParticleId};
use ricochet_predict::{EventOutcome, EventPredictor, PredictContext, PropertyTable};
use ricochet_sched::CalendarError;
use ricochet_space::BoundaryCondition;

use crate::config::{ConfigError, RunBudget, SimulationConfig};
use crate::error::{EventReport, ParticleSnapshot, RunError, ScheduleError};
use crate::metrics::RunMetrics;
use crate::observer::{EventObserver, EventRecord};
use crate::scheduler::{Env, Scheduler};

/// Relative slack allowed between a re-predicted event time and the
/// next queued event before the watchdog rejects it.
const WATCHDOG_TOLERANCE: f64 = 1e-10;

// ── DriverState ────────────────────────────────────────────────────

/// Where the driver is in its cycle.
///
/// Between calls to [`Simulation::step`] the state is always `Idle` or
/// `Terminated`; the intermediate states are visible in fault reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Waiting for the next pop.
    Idle,
    /// Streaming to the event time.
    AdvanceTime,
    /// Executing the event.
    Execute,
    /// Bumping counters of changed particles.
    Invalidate,
    /// Regenerating calendar entries.
    Recompute,
    /// A fault ended the run.
    Terminated,
}

/// What one call to [`Simulation::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An event was executed.
    Executed,
    /// A stale event was discarded and its owner recomputed.
    Discarded,
    /// A recalculate marker was popped and its owner recomputed.
    Recalculated,
    /// The watchdog rejected the event and recomputed its particles.
    Rejected,
    /// The event or time budget is reached. The clock stands at the time
    /// bound if one was set.
    BudgetReached,
}

// ── Simulation ─────────────────────────────────────────────────────

/// A single event-driven simulation instance.
///
/// # Ownership
///
/// The simulation exclusively owns its particles, calendar and spatial
/// index. It is `Send`, so replica exchange can run instances on worker
/// threads, but it is never shared between threads.
pub struct Simulation {
    particles: Vec<Particle>,
    boundary: Box<dyn BoundaryCondition>,
    properties: PropertyTable,
    predictor: Box<dyn EventPredictor>,
    kinematics: Kinematics,
    scheduler: Scheduler,
    observers: Vec<Box<dyn EventObserver>>,
    budget: RunBudget,
    target: Option<f64>,
    rejection_limit: u32,
    consecutive_rejections: u32,
    system_time: f64,
    event_count: u64,
    internal_energy: f64,
    state: DriverState,
    metrics: RunMetrics,
}

// Compile-time assertion: Simulation must be Send.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<Simulation>();
};

impl Simulation {
    /// Validate `config`, index the particles and build the initial
    /// schedule.
    ///
    /// Periodic positions are mapped into the primary image first, and
    /// any pair overlapping by more than `overlap_tolerance` is
    /// rejected.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let SimulationConfig {
            mut particles,
            boundary,
            properties,
            predictor,
            kinematics,
            calendar,
            cells,
            budget,
            rejection_limit,
            overlap_tolerance,
        } = config;

        for p in particles.iter_mut().filter(|p| p.is_alive()) {
            boundary.wrap_with_velocity(&mut p.position, &mut p.velocity);
        }
        let range = predictor.max_interaction_range();
        let scheduler = Scheduler::new(&particles, &*boundary, range, &calendar, &cells)?;

        let mut sim = Self {
            particles,
            boundary,
            properties,
            predictor,
            kinematics,
            scheduler,
            observers: Vec::new(),
            budget,
            target: None,
            rejection_limit,
            consecutive_rejections: 0,
            system_time: 0.0,
            event_count: 0,
            internal_energy: 0.0,
            state: DriverState::Idle,
            metrics: RunMetrics::default(),
        };
        sim.check_overlaps(overlap_tolerance)?;
        {
            let (scheduler, env) = sim.split();
            scheduler.rebuild(&env)?;
        }
        info!(
            particles = sim.particles.len(),
            range,
            dims = ?sim.scheduler.cells().lattice().dims(),
            "simulation built"
        );
        Ok(sim)
    }

    fn check_overlaps(&self, tolerance: f64) -> Result<(), ConfigError> {
        let ctx = self.context();
        let cells = self.scheduler.cells();
        for a in self.particles.iter().filter(|p| p.is_alive()) {
            for q in cells.neighbours_of(a.id)? {
                if q <= a.id {
                    continue;
                }
                let Some(b) = self.particles.get(q.index()).filter(|b| b.is_alive()) else {
                    continue;
                };
                if let Some(depth) = self.predictor.overlap(&ctx, a, b) {
                    if depth > tolerance {
                        return Err(ConfigError::Overlap {
                            a: a.id,
                            b: b.id,
                            depth,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn context(&self) -> PredictContext<'_> {
        PredictContext::new(
            &*self.boundary,
            &self.properties,
            &self.kinematics,
            self.system_time,
        )
    }

    /// Borrow the scheduler mutably alongside everything it predicts
    /// against.
    fn split(&mut self) -> (&mut Scheduler, Env<'_>) {
        let env = Env {
            particles: &self.particles,
            predictor: &*self.predictor,
            ctx: PredictContext::new(
                &*self.boundary,
                &self.properties,
                &self.kinematics,
                self.system_time,
            ),
        };
        (&mut self.scheduler, env)
    }

    fn refresh(&mut self, id: ParticleId) -> Result<(), ScheduleError> {
        let (scheduler, env) = self.split();
        scheduler.refresh(&env, id)
    }

    fn rebuild_system_events(&mut self) -> Result<(), ScheduleError> {
        let (scheduler, env) = self.split();
        scheduler.rebuild_system_events(&env)
    }

    fn is_alive(&self, id: ParticleId) -> bool {
        self.particles.get(id.index()).is_some_and(Particle::is_alive)
    }

    /// `true` if every counter `event` was stamped with is still live and
    /// every particle it names still exists.
    fn is_live(&self, event: &Event) -> bool {
        self.scheduler.calendar().is_current(event)
            && event.particle().is_none_or(|p| self.is_alive(p))
            && event.kind.partner().is_none_or(|p| self.is_alive(p))
    }

    fn time_bound(&self) -> Option<f64> {
        match (self.budget.max_time, self.target) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ── Stepping ───────────────────────────────────────────────────

    /// Process the next event.
    pub fn step(&mut self) -> Result<StepOutcome, RunError> {
        if self.state == DriverState::Terminated {
            return Err(RunError::Terminated);
        }
        if self
            .budget
            .max_events
            .is_some_and(|max| self.event_count >= max)
        {
            return Ok(StepOutcome::BudgetReached);
        }

        let bound = self.time_bound();
        let Some(next) = self.scheduler.calendar_mut().peek() else {
            return match bound {
                Some(t) => {
                    self.advance((t - self.system_time).max(0.0));
                    Ok(StepOutcome::BudgetReached)
                }
                None => Err(RunError::QueueExhausted {
                    system_time: self.system_time,
                }),
            };
        };
        if let Some(t) = bound {
            if self.system_time + next.dt > t {
                self.advance((t - self.system_time).max(0.0));
                return Ok(StepOutcome::BudgetReached);
            }
        }

        let Some(event) = self.scheduler.calendar_mut().pop() else {
            return Ok(StepOutcome::Discarded);
        };
        match self.process(event) {
            Ok(outcome) => {
                self.state = DriverState::Idle;
                Ok(outcome)
            }
            Err(cause) => {
                let report = self.report(&event);
                error!(%cause, state = ?self.state, %report, "event processing failed");
                self.state = DriverState::Terminated;
                Err(RunError::Fault {
                    report: Box::new(report),
                    cause,
                })
            }
        }
    }

    fn process(&mut self, event: Event) -> Result<StepOutcome, ScheduleError> {
        if event.is_recalculate() {
            self.metrics.record_executed(event.kind);
            debug!(owner = %event.owner, "recalculate marker popped");
            match event.owner {
                Owner::System => self.rebuild_system_events()?,
                Owner::Particle(p) => self.refresh(p)?,
            }
            return Ok(StepOutcome::Recalculated);
        }

        if !self.is_live(&event) {
            self.metrics.stale_discards += 1;
            debug!(%event, "stale event discarded");
            if let Some(p) = event.particle().filter(|&p| self.is_alive(p)) {
                self.refresh(p)?;
            }
            return Ok(StepOutcome::Discarded);
        }

        let event = match self.watchdog(event)? {
            Some(event) => event,
            None => return Ok(StepOutcome::Rejected),
        };

        self.state = DriverState::AdvanceTime;
        self.advance(event.dt);

        self.state = DriverState::Execute;
        trace!(%event, t = self.system_time, "executing");
        let outcome = match event.kind {
            EventKind::CellTransition => match self.cell_transition(&event)? {
                Some(outcome) => outcome,
                None => {
                    self.finish(&event, EventOutcome::none());
                    return Ok(StepOutcome::Executed);
                }
            },
            _ => {
                let ctx = PredictContext::new(
                    &*self.boundary,
                    &self.properties,
                    &self.kinematics,
                    self.system_time,
                );
                self.predictor.execute(&ctx, &event, &mut self.particles)?
            }
        };

        self.state = DriverState::Invalidate;
        let changed: SmallVec<[ParticleId; 2]> = outcome.changed().collect();
        let stale = self.scheduler.stale_neighbours(&changed)?;
        self.metrics.neighbour_refreshes += stale.len() as u64;
        for &q in &changed {
            if self.is_alive(q) {
                self.scheduler.invalidate(q)?;
            } else {
                self.scheduler.remove(q)?;
            }
        }

        self.state = DriverState::Recompute;
        let mut involved: IndexSet<ParticleId> = IndexSet::new();
        involved.extend(event.particle());
        involved.extend(outcome.touched());
        involved.extend(stale);
        for p in involved {
            if self.is_alive(p) {
                self.refresh(p)?;
            }
        }
        if let Owner::System = event.owner {
            self.rebuild_system_events()?;
        }

        self.finish(&event, outcome);
        Ok(StepOutcome::Executed)
    }

    /// Re-predict interaction and local events before executing them.
    ///
    /// Returns the event to execute, or `None` if it was rejected.
    fn watchdog(&mut self, event: Event) -> Result<Option<Event>, ScheduleError> {
        if !matches!(event.kind, EventKind::Interaction { .. } | EventKind::Local { .. })
            || self.rejection_limit == 0
        {
            return Ok(Some(event));
        }
        if self.consecutive_rejections >= self.rejection_limit {
            warn!(
                %event,
                rejections = self.consecutive_rejections,
                "rejection limit reached, executing anyway"
            );
            self.metrics.watchdog_overrides += 1;
            return Ok(Some(event));
        }

        let fresh = match self
            .predictor
            .repredict(&self.context(), &event, &self.particles)?
        {
            Some(mut fresh) => {
                if fresh.dt.is_nan() {
                    return Err(CalendarError::NotANumber { event: fresh }.into());
                }
                if fresh.dt == f64::NEG_INFINITY {
                    fresh.dt = 0.0;
                }
                if fresh.dt < 0.0 {
                    return Err(CalendarError::NegativeTime { event: fresh }.into());
                }
                Some(fresh)
            }
            None => None,
        };
        let next_dt = self
            .scheduler
            .calendar_mut()
            .peek()
            .map_or(f64::INFINITY, |e| e.dt);
        let slack = WATCHDOG_TOLERANCE * next_dt.abs().max(1.0);
        match fresh {
            Some(fresh) if fresh.dt <= next_dt + slack => Ok(Some(fresh)),
            _ => {
                self.metrics.rejections += 1;
                self.consecutive_rejections += 1;
                debug!(%event, fresh = ?fresh.map(|e| e.dt), "event rejected on re-prediction");
                let ids = event.particle().into_iter().chain(event.kind.partner());
                for p in ids.collect::<SmallVec<[ParticleId; 2]>>() {
                    if self.is_alive(p) {
                        self.refresh(p)?;
                    }
                }
                Ok(None)
            }
        }
    }

    /// Move the owner of a cell-transition event into its next cell.
    ///
    /// Returns `Some` when the move changed the particle's velocity (a
    /// sheared boundary crossing); the caller then takes the full
    /// invalidation path. `None` means the schedule is already repaired.
    fn cell_transition(&mut self, event: &Event) -> Result<Option<EventOutcome>, ScheduleError> {
        let Some(id) = event.particle() else {
            return Ok(None);
        };
        let index = id.index();
        let Some(before) = self.particles.get(index).cloned() else {
            return Ok(None);
        };
        let crossing = self
            .scheduler
            .cells()
            .transition_time(&before, &self.kinematics)?;
        let Some(crossing) = crossing else {
            self.refresh(id)?;
            return Ok(None);
        };

        let transition = self.scheduler.cells_mut().apply_transition(
            &mut self.particles[index],
            &crossing,
            &*self.boundary,
        )?;
        trace!(particle = %id, from = %transition.from, to = %transition.to, "cell transition");

        if transition.wrapped && self.boundary.is_sheared() {
            let mut outcome = EventOutcome::none();
            outcome.push(&before, &self.particles[index]);
            return Ok(Some(outcome));
        }

        let entered = self.scheduler.cells().entered_particles(&transition, id);
        let (scheduler, env) = self.split();
        let particle = &env.particles[index];
        if let Some(next) = scheduler.cells().transition_time(particle, env.ctx.kinematics())? {
            scheduler.push(Event::cell_transition(id, next.dt))?;
        }
        for other in entered {
            scheduler.add_pair(&env, particle, other)?;
        }
        Ok(None)
    }

    fn finish(&mut self, event: &Event, outcome: EventOutcome) {
        self.consecutive_rejections = 0;
        self.event_count += 1;
        self.internal_energy += outcome.energy_delta;
        self.metrics.record_executed(event.kind);
        if self.observers.is_empty() {
            return;
        }
        let record = EventRecord {
            event: *event,
            system_time: self.system_time,
            deltas: outcome.deltas,
            energy_delta: outcome.energy_delta,
        };
        for observer in &mut self.observers {
            observer.observe(&record);
        }
    }

    /// Stream everything by `dt`.
    fn advance(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.system_time += dt;
        for p in &mut self.particles {
            self.kinematics.stream(p, dt);
        }
        self.boundary.stream(dt);
        self.scheduler.calendar_mut().stream(dt);
        self.predictor.stream(dt);
    }

    fn report(&self, event: &Event) -> EventReport {
        let calendar = self.scheduler.calendar();
        let particles = event
            .particle()
            .into_iter()
            .chain(event.kind.partner())
            .filter_map(|id| self.particles.get(id.index()))
            .map(|p| ParticleSnapshot {
                id: p.id,
                position: p.position,
                velocity: p.velocity,
                species: p.species,
                flags: p.flags,
                counter: calendar.counter(p.id),
            })
            .collect();
        EventReport {
            system_time: self.system_time,
            event: *event,
            source: self.predictor.source_name(event.kind).map(str::to_string),
            particles,
        }
    }

    // ── Running ────────────────────────────────────────────────────

    /// Step until the budget is reached or an error occurs.
    ///
    /// With an unlimited budget this only returns on error, typically
    /// [`RunError::QueueExhausted`].
    #[tracing::instrument(skip(self), fields(t0 = self.system_time))]
    pub fn run(&mut self) -> Result<(), RunError> {
        let start = Instant::now();
        let result = loop {
            match self.step() {
                Ok(StepOutcome::BudgetReached) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.metrics.last_run_us = start.elapsed().as_micros() as u64;
        info!(
            events = self.event_count,
            t = self.system_time,
            us = self.metrics.last_run_us,
            "run finished"
        );
        result
    }

    /// Run until the clock reaches `time` (or the budget stops it
    /// earlier). The clock stands exactly at `time` afterwards unless
    /// the event budget ran out first.
    pub fn run_until(&mut self, time: f64) -> Result<(), RunError> {
        self.target = Some(time);
        let result = self.run();
        self.target = None;
        result
    }

    /// Replace the run budget.
    pub fn set_budget(&mut self, budget: RunBudget) {
        self.budget = budget;
    }

    /// Attach an observer. Observers see every executed event.
    pub fn add_observer(&mut self, observer: impl EventObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Take a particle out of the simulation.
    ///
    /// Its slot stays in the particle array with `ALIVE` cleared; every
    /// event naming it is discarded when popped.
    pub fn remove_particle(&mut self, id: ParticleId) -> Result<(), RunError> {
        if self.state == DriverState::Terminated {
            return Err(RunError::Terminated);
        }
        let Some(p) = self.particles.get_mut(id.index()) else {
            return Err(RunError::UnknownParticle { particle: id });
        };
        if !p.is_alive() {
            return Ok(());
        }
        p.flags.remove(ParticleFlags::ALIVE);
        let stale = self.scheduler.stale_neighbours(&[id])?;
        self.scheduler.remove(id)?;
        for q in stale {
            self.refresh(q)?;
        }
        info!(particle = %id, t = self.system_time, "particle removed");
        Ok(())
    }

    /// Multiply every live particle's velocity by `factor`.
    ///
    /// Under free flight without shear, every stored event time scales
    /// by exactly `1 / factor` and the calendar is rescaled in place.
    /// Otherwise the schedule is rebuilt. System events are always
    /// re-predicted.
    pub fn rescale_velocities(&mut self, factor: f64) -> Result<(), RunError> {
        if self.state == DriverState::Terminated {
            return Err(RunError::Terminated);
        }
        if !factor.is_finite() || factor <= 0.0 {
            return Err(RunError::InvalidScale { factor });
        }
        for p in self.particles.iter_mut().filter(|p| p.is_alive()) {
            p.velocity *= factor;
        }
        if self.kinematics.is_free_flight() && !self.boundary.is_sheared() {
            self.scheduler
                .calendar_mut()
                .rescale_times(1.0 / factor)
                .map_err(ScheduleError::from)?;
            self.rebuild_system_events()?;
        } else {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Re-index every particle and regenerate every calendar entry.
    #[tracing::instrument(skip(self), fields(t = self.system_time))]
    pub fn rebuild(&mut self) -> Result<(), RunError> {
        if self.state == DriverState::Terminated {
            return Err(RunError::Terminated);
        }
        let (scheduler, env) = self.split();
        scheduler.rebuild(&env)?;
        self.metrics.full_rebuilds += 1;
        info!(t = self.system_time, "schedule rebuilt");
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Current simulation time.
    pub fn system_time(&self) -> f64 {
        self.system_time
    }

    /// Executed events, cell transitions included.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Accumulated energy deltas reported by executed events.
    pub fn internal_energy(&self) -> f64 {
        self.internal_energy
    }

    /// Every particle, removed ones included.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// One particle.
    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id.index())
    }

    /// Number of live particles.
    pub fn live_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_alive()).count()
    }

    /// Total kinetic energy of live particles. Particles of unknown
    /// species contribute nothing.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .filter(|p| p.is_alive())
            .filter_map(|p| {
                self.properties
                    .mass(p.species)
                    .ok()
                    .map(|m| p.kinetic_energy(m))
            })
            .sum()
    }

    /// Total momentum of live particles.
    pub fn total_momentum(&self) -> DVec3 {
        self.particles
            .iter()
            .filter(|p| p.is_alive())
            .filter_map(|p| self.properties.mass(p.species).ok().map(|m| p.momentum(m)))
            .sum()
    }

    /// Driver state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Current budget.
    pub fn budget(&self) -> RunBudget {
        self.budget
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> RunMetrics {
        RunMetrics {
            overflow_markers: self.scheduler.calendar().overflow_count(),
            ..self.metrics.clone()
        }
    }

    /// The calendar and spatial index.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The boundary condition.
    pub fn boundary(&self) -> &dyn BoundaryCondition {
        &*self.boundary
    }

    /// The species table.
    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    /// The streaming law.
    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("particles", &self.particles.len())
            .field("system_time", &self.system_time)
            .field("event_count", &self.event_count)
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use ricochet_core::{EventType, ExecuteError, PredictError};
    use ricochet_predict::{Interaction, Prediction, PredictorTable};
    use ricochet_space::{Periodic, Unbounded};
    use ricochet_test_utils::{HardSphere, Sentinel, Ticker};

    fn head_on() -> Vec<Particle> {
        vec![
            Particle::new(ParticleId(0), DVec3::ZERO, DVec3::X),
            Particle::new(ParticleId(1), DVec3::X * 10.0, -DVec3::X),
        ]
    }

    fn spheres() -> PredictorTable {
        let mut t = PredictorTable::new();
        t.add_interaction(HardSphere::new(1.0)).unwrap();
        t
    }

    fn sim(particles: Vec<Particle>, predictor: PredictorTable) -> Simulation {
        let boundary = Unbounded::new(DVec3::splat(30.0)).unwrap();
        let properties = PropertyTable::single("bulk", 1.0).unwrap();
        Simulation::new(SimulationConfig::new(particles, boundary, properties, predictor)).unwrap()
    }

    /// Step until the counter picked by `count` moves.
    fn step_until(s: &mut Simulation, count: fn(&RunMetrics) -> u64) {
        let start = count(&s.metrics());
        for _ in 0..10_000 {
            s.step().unwrap();
            if count(&s.metrics()) > start {
                return;
            }
        }
        panic!("event never executed");
    }

    #[test]
    fn new_wraps_and_indexes() {
        let s = sim(head_on(), spheres());
        assert_eq!(s.live_count(), 2);
        assert!(s.scheduler().is_consistent(s.particles(), 1e-9));
        assert_eq!(s.state(), DriverState::Idle);
    }

    #[test]
    fn head_on_collision_exchanges_velocities() {
        let mut s = sim(head_on(), spheres());
        step_until(&mut s, |m| m.interaction_events);
        assert!((s.system_time() - 4.5).abs() < 1e-9, "t = {}", s.system_time());
        assert!((s.particles()[0].velocity - -DVec3::X).length() < 1e-12);
        assert!((s.particles()[1].velocity - DVec3::X).length() < 1e-12);
        let c = s.scheduler().calendar();
        assert_eq!(c.counter(ParticleId(0)).map(|c| c.0), Some(1));
        assert_eq!(c.counter(ParticleId(1)).map(|c| c.0), Some(1));
    }

    #[test]
    fn overlapping_start_is_rejected() {
        let particles = vec![
            Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO),
            Particle::new(ParticleId(1), DVec3::X * 0.5, DVec3::ZERO),
        ];
        let boundary = Periodic::cube(10.0).unwrap();
        let properties = PropertyTable::single("bulk", 1.0).unwrap();
        let cfg = SimulationConfig::new(particles, boundary, properties, spheres());
        match Simulation::new(cfg) {
            Err(ConfigError::Overlap { a, b, depth }) => {
                assert_eq!((a, b), (ParticleId(0), ParticleId(1)));
                assert!((depth - 0.5).abs() < 1e-12);
            }
            other => panic!("expected Overlap, got {other:?}"),
        }
    }

    #[test]
    fn time_budget_stops_exactly_at_bound() {
        let mut s = sim(head_on(), spheres());
        s.set_budget(RunBudget::time(2.0));
        s.run().unwrap();
        assert_eq!(s.system_time(), 2.0);
        assert!((s.particles()[0].position.x - 2.0).abs() < 1e-12);
        assert_eq!(s.metrics().interaction_events, 0);
    }

    #[test]
    fn event_budget_counts_executed_events() {
        let mut s = sim(head_on(), spheres());
        s.set_budget(RunBudget::events(3));
        s.run().unwrap();
        assert_eq!(s.event_count(), 3);
        assert_eq!(s.step().unwrap(), StepOutcome::BudgetReached);
    }

    #[test]
    fn empty_queue_without_bound_is_exhausted() {
        let particles = vec![Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO)];
        let mut s = sim(particles, spheres());
        match s.run() {
            Err(RunError::QueueExhausted { system_time }) => assert_eq!(system_time, 0.0),
            other => panic!("expected QueueExhausted, got {other:?}"),
        }
        s.run_until(3.0).unwrap();
        assert_eq!(s.system_time(), 3.0);
    }

    #[test]
    fn ticker_fires_on_its_period() {
        let mut predictor = spheres();
        predictor.add_system(Ticker::new(1.5)).unwrap();
        let particles = vec![Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO)];
        let mut s = sim(particles, predictor);
        s.run_until(4.6).unwrap();
        assert_eq!(s.metrics().system_events, 3);
        assert_eq!(s.system_time(), 4.6);
        step_until(&mut s, |m| m.system_events);
        assert!((s.system_time() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn remove_particle_discards_its_events() {
        let mut s = sim(head_on(), spheres());
        s.remove_particle(ParticleId(1)).unwrap();
        assert_eq!(s.live_count(), 1);
        assert_eq!(s.scheduler().cells().total_occupancy(), 1);
        s.run_until(10.0).unwrap();
        assert_eq!(s.metrics().interaction_events, 0);
        assert!((s.particles()[0].position.x - 10.0).abs() < 1e-9);
        assert_eq!(s.particles()[1].position.x, 10.0);
        match s.remove_particle(ParticleId(9)) {
            Err(RunError::UnknownParticle { particle }) => assert_eq!(particle, ParticleId(9)),
            other => panic!("expected UnknownParticle, got {other:?}"),
        }
    }

    #[test]
    fn rescale_velocities_rescales_event_times() {
        let mut s = sim(head_on(), spheres());
        s.rescale_velocities(2.0).unwrap();
        step_until(&mut s, |m| m.interaction_events);
        assert!((s.system_time() - 2.25).abs() < 1e-9, "t = {}", s.system_time());
        match s.rescale_velocities(0.0) {
            Err(RunError::InvalidScale { .. }) => {}
            other => panic!("expected InvalidScale, got {other:?}"),
        }
    }

    #[test]
    fn observers_see_executed_events() {
        let mut s = sim(head_on(), spheres());
        let (obs, rx) = crate::observer::ChannelObserver::unbounded();
        s.add_observer(obs);
        s.run_until(5.0).unwrap();
        let records: Vec<EventRecord> = rx.try_iter().collect();
        assert_eq!(records.len() as u64, s.event_count());
        let collision = records
            .iter()
            .find(|r| matches!(r.event.kind, EventKind::Interaction { .. }))
            .unwrap();
        assert_eq!(collision.deltas.len(), 2);
        assert!((collision.system_time - 4.5).abs() < 1e-9);
    }

    #[test]
    fn static_particle_is_hit_but_never_streams() {
        let mut particles = head_on();
        particles[1].velocity = DVec3::ZERO;
        particles[1].flags = ParticleFlags::ALIVE;
        let mut s = sim(particles, spheres());
        s.run_until(20.0).unwrap();
        assert_eq!(s.particles()[1].position.x, 10.0);
        assert_eq!(s.metrics().interaction_events, 1);
    }

    #[test]
    fn global_events_reschedule_themselves() {
        let mut predictor = spheres();
        predictor.add_global(Sentinel::new(1.0)).unwrap();
        let particles = vec![Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO)];
        let mut s = sim(particles, predictor);
        s.run_until(3.5).unwrap();
        assert_eq!(s.metrics().global_events, 3);
    }

    /// Predicts a collision on every other call, so every re-prediction
    /// disagrees with the prediction before it.
    #[derive(Default)]
    struct Fickle {
        calls: AtomicU32,
    }

    impl Interaction for Fickle {
        fn name(&self) -> &str {
            "fickle"
        }

        fn range(&self) -> f64 {
            1.0
        }

        fn predict(
            &self,
            _ctx: &PredictContext<'_>,
            _a: &Particle,
            _b: &Particle,
        ) -> Result<Option<Prediction>, PredictError> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            Ok((n % 2 == 0).then(|| Prediction::new(1.0, EventType::Core)))
        }

        fn execute(
            &self,
            _ctx: &PredictContext<'_>,
            _a: &mut Particle,
            _b: &mut Particle,
            _event_type: EventType,
        ) -> Result<f64, ExecuteError> {
            Ok(0.0)
        }
    }

    #[test]
    fn watchdog_executes_after_rejection_limit() {
        // Particle 1 is static, so only particle 0 owns the pair event.
        let particles = vec![
            Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO),
            Particle::new(ParticleId(1), DVec3::X * 2.0, DVec3::ZERO).with_flags(ParticleFlags::ALIVE),
        ];
        let mut predictor = PredictorTable::new();
        predictor.add_interaction(Fickle::default()).unwrap();
        let mut s = sim(particles, predictor);
        s.set_budget(RunBudget::events(1));
        s.run().unwrap();
        let m = s.metrics();
        assert_eq!(m.rejections, u64::from(crate::config::DEFAULT_REJECTION_LIMIT));
        assert_eq!(m.watchdog_overrides, 1);
        assert_eq!(m.interaction_events, 1);
        assert_eq!(s.system_time(), 1.0);
    }

    /// Predicts a collision at 1.0, then a negative time on re-prediction.
    #[derive(Default)]
    struct Backwards {
        calls: AtomicU32,
    }

    impl Interaction for Backwards {
        fn name(&self) -> &str {
            "backwards"
        }

        fn range(&self) -> f64 {
            1.0
        }

        fn predict(
            &self,
            _ctx: &PredictContext<'_>,
            _a: &Particle,
            _b: &Particle,
        ) -> Result<Option<Prediction>, PredictError> {
            let dt = match self.calls.fetch_add(1, Ordering::Relaxed) {
                0 => 1.0,
                1 => -0.5,
                _ => 5.0,
            };
            Ok(Some(Prediction::new(dt, EventType::Core)))
        }

        fn execute(
            &self,
            _ctx: &PredictContext<'_>,
            _a: &mut Particle,
            _b: &mut Particle,
            _event_type: EventType,
        ) -> Result<f64, ExecuteError> {
            Ok(0.0)
        }
    }

    #[test]
    fn negative_reprediction_is_fatal() {
        let particles = vec![
            Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO),
            Particle::new(ParticleId(1), DVec3::X * 2.0, DVec3::ZERO).with_flags(ParticleFlags::ALIVE),
        ];
        let mut predictor = PredictorTable::new();
        predictor.add_interaction(Backwards::default()).unwrap();
        let mut s = sim(particles, predictor);
        s.set_budget(RunBudget::events(1));
        match s.run() {
            Err(RunError::Fault { report, cause }) => {
                assert_eq!(report.source.as_deref(), Some("backwards"));
                assert_eq!(report.system_time, 0.0);
                match cause {
                    ScheduleError::Calendar(CalendarError::NegativeTime { event }) => {
                        assert_eq!(event.dt, -0.5);
                    }
                    other => panic!("expected NegativeTime, got {other:?}"),
                }
            }
            other => panic!("expected Fault, got {other:?}"),
        }
        assert_eq!(s.metrics().interaction_events, 0);
        assert_eq!(s.system_time(), 0.0);
        assert_eq!(s.state(), DriverState::Terminated);
    }

    /// Always fails to execute.
    struct Broken;

    impl Interaction for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn range(&self) -> f64 {
            1.0
        }

        fn predict(
            &self,
            _ctx: &PredictContext<'_>,
            _a: &Particle,
            _b: &Particle,
        ) -> Result<Option<Prediction>, PredictError> {
            Ok(Some(Prediction::new(1.0, EventType::Core)))
        }

        fn execute(
            &self,
            _ctx: &PredictContext<'_>,
            _a: &mut Particle,
            _b: &mut Particle,
            _event_type: EventType,
        ) -> Result<f64, ExecuteError> {
            Err(ExecuteError::Rejected {
                reason: "broken on purpose".to_string(),
            })
        }
    }

    #[test]
    fn execution_failure_terminates_with_report() {
        let particles = vec![
            Particle::new(ParticleId(0), DVec3::ZERO, DVec3::ZERO),
            Particle::new(ParticleId(1), DVec3::X * 2.0, DVec3::ZERO),
        ];
        let mut predictor = PredictorTable::new();
        predictor.add_interaction(Broken).unwrap();
        let mut s = sim(particles, predictor);
        match s.run() {
            Err(RunError::Fault { report, cause }) => {
                assert_eq!(report.source.as_deref(), Some("broken"));
                assert_eq!(report.particles.len(), 2);
                assert!((report.system_time - 1.0).abs() < 1e-12);
                assert!(matches!(cause, ScheduleError::Execute(ExecuteError::Rejected { .. })));
            }
            other => panic!("expected Fault, got {other:?}"),
        }
        assert_eq!(s.state(), DriverState::Terminated);
        assert_eq!(s.step(), Err(RunError::Terminated));
    }
}
