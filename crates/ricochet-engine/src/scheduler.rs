//! Calendar maintenance: which predictions each particle's entry holds.
//!
//! The [`Scheduler`] owns the event calendar and the cell list, and is
//! the only place that decides what gets predicted for a particle: its
//! global events, its next cell transition, its local obstacles, and a
//! pair prediction against every live particle in its cell
//! neighbourhood.

use indexmap::IndexSet;
use tracing::{debug, trace};

use ricochet_core::{Event, EventCount, ExecuteError, Owner, Particle, ParticleId};
use ricochet_predict::{EventPredictor, PredictContext};
use ricochet_sched::{CalendarConfig, EventCalendar, Pushed};
use ricochet_space::{BoundaryCondition, CellConfig, CellList};

use crate::config::ConfigError;
use crate::error::ScheduleError;

/// Read-only state the scheduler predicts against.
pub(crate) struct Env<'a> {
    pub(crate) particles: &'a [Particle],
    pub(crate) predictor: &'a dyn EventPredictor,
    pub(crate) ctx: PredictContext<'a>,
}

impl Env<'_> {
    fn particle(&self, id: ParticleId) -> Result<&Particle, ScheduleError> {
        self.particles
            .get(id.index())
            .ok_or(ScheduleError::Execute(ExecuteError::UnknownParticle { particle: id }))
    }
}

/// Event calendar plus spatial index.
#[derive(Debug)]
pub struct Scheduler {
    calendar: EventCalendar,
    cells: CellList,
}

impl Scheduler {
    pub(crate) fn new(
        particles: &[Particle],
        boundary: &dyn BoundaryCondition,
        range: f64,
        calendar: &CalendarConfig,
        cells: &CellConfig,
    ) -> Result<Self, ConfigError> {
        let mut index = CellList::new(boundary, range, particles.len(), cells)?;
        index.rebuild(particles, boundary)?;
        Ok(Self {
            calendar: EventCalendar::new(particles.len(), calendar)?,
            cells: index,
        })
    }

    /// The event calendar.
    pub fn calendar(&self) -> &EventCalendar {
        &self.calendar
    }

    /// The spatial index.
    pub fn cells(&self) -> &CellList {
        &self.cells
    }

    pub(crate) fn calendar_mut(&mut self) -> &mut EventCalendar {
        &mut self.calendar
    }

    pub(crate) fn cells_mut(&mut self) -> &mut CellList {
        &mut self.cells
    }

    pub(crate) fn push(&mut self, event: Event) -> Result<(), ScheduleError> {
        if let Pushed::Overflowed = self.calendar.push(event)? {
            trace!(owner = %event.owner, "entry truncated");
        }
        Ok(())
    }

    /// Predict and push every event `id` owns. Particles that are not
    /// scheduled (asleep, static or removed) own nothing.
    pub(crate) fn add_events(&mut self, env: &Env<'_>, id: ParticleId) -> Result<(), ScheduleError> {
        let particle = env.particle(id)?;
        if !particle.is_scheduled() {
            return Ok(());
        }
        for event in env.predictor.predict_global(&env.ctx, particle)? {
            self.push(event)?;
        }
        if let Some(crossing) = self.cells.transition_time(particle, env.ctx.kinematics())? {
            self.push(Event::cell_transition(id, crossing.dt))?;
        }
        for event in env.predictor.predict_local(&env.ctx, particle)? {
            self.push(event)?;
        }
        for other in self.cells.neighbours_of(id)? {
            self.add_pair(env, particle, other)?;
        }
        Ok(())
    }

    /// Predict and push the pair event `particle` owns with `other`.
    pub(crate) fn add_pair(
        &mut self,
        env: &Env<'_>,
        particle: &Particle,
        other: ParticleId,
    ) -> Result<(), ScheduleError> {
        let partner = env.particle(other)?;
        if !partner.is_alive() {
            return Ok(());
        }
        if let Some(event) = env.predictor.predict_interaction(&env.ctx, particle, partner)? {
            self.push(event)?;
        }
        Ok(())
    }

    /// Bump `id`'s counter and drop its entry.
    pub(crate) fn invalidate(&mut self, id: ParticleId) -> Result<EventCount, ScheduleError> {
        Ok(self.calendar.invalidate(id)?)
    }

    /// Drop and regenerate `id`'s entry without touching its counter.
    pub(crate) fn refresh(&mut self, env: &Env<'_>, id: ParticleId) -> Result<(), ScheduleError> {
        self.calendar.clear(Owner::Particle(id))?;
        self.add_events(env, id)
    }

    /// Drop and regenerate the system slot.
    pub(crate) fn rebuild_system_events(&mut self, env: &Env<'_>) -> Result<(), ScheduleError> {
        self.calendar.clear(Owner::System)?;
        for event in env.predictor.predict_system(&env.ctx)? {
            self.push(event)?;
        }
        Ok(())
    }

    /// Re-index every particle and regenerate every entry.
    pub(crate) fn rebuild(&mut self, env: &Env<'_>) -> Result<(), ScheduleError> {
        self.cells.rebuild(env.particles, env.ctx.boundary())?;
        self.calendar.clear_all();
        for particle in env.particles {
            self.add_events(env, particle.id)?;
        }
        self.rebuild_system_events(env)?;
        debug!(particles = env.particles.len(), "schedule rebuilt");
        Ok(())
    }

    /// Particles outside `changed` whose entries hold a pair event with a
    /// changed particle, found through the cell neighbourhood of each
    /// changed particle.
    pub(crate) fn stale_neighbours(
        &self,
        changed: &[ParticleId],
    ) -> Result<IndexSet<ParticleId>, ScheduleError> {
        let mut stale = IndexSet::new();
        for &q in changed {
            if self.cells.cell_of(q).is_none() {
                continue;
            }
            for p in self.cells.neighbours_of(q)? {
                if !changed.contains(&p) && self.calendar.references(p, q) {
                    stale.insert(p);
                }
            }
        }
        Ok(stale)
    }

    /// Take `id` out of the schedule and the spatial index. Events that
    /// name it as a partner go stale.
    pub(crate) fn remove(&mut self, id: ParticleId) -> Result<(), ScheduleError> {
        self.calendar.invalidate(id)?;
        if self.cells.cell_of(id).is_some() {
            self.cells.remove(id)?;
        }
        Ok(())
    }

    /// `true` if the index holds exactly the live particles and each
    /// one lies inside the extent of its cell.
    pub fn is_consistent(&self, particles: &[Particle], eps: f64) -> bool {
        let live = particles.iter().filter(|p| p.is_alive()).count();
        live == self.cells.total_occupancy()
            && particles.iter().all(|p| self.cells.is_consistent(p, eps))
    }
}
