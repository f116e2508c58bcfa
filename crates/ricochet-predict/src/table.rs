//! Source-id keyed predictor tables.

use std::fmt;

use indexmap::IndexMap;
use tracing::trace;

use ricochet_core::{
    pair_mut, Event, EventKind, ExecuteError, Owner, Particle, ParticleId, PredictError,
    SourceId,
};

use crate::context::PredictContext;
use crate::error::RegistryError;
use crate::outcome::EventOutcome;
use crate::predictor::{EventPredictor, Predictions};
use crate::source::{Global, Interaction, Local, SystemEvent};

/// [`EventPredictor`] assembled from four tables of sources.
///
/// A source's position in its table is its [`SourceId`]: the first
/// interaction added is `SourceId(0)` in interaction events, the first
/// system event is `SourceId(0)` in system events. Names are unique per
/// table.
#[derive(Default)]
pub struct PredictorTable {
    interactions: IndexMap<String, Box<dyn Interaction>>,
    locals: IndexMap<String, Box<dyn Local>>,
    globals: IndexMap<String, Box<dyn Global>>,
    systems: IndexMap<String, Box<dyn SystemEvent>>,
    max_range: f64,
}

fn register<T: ?Sized>(
    table: &mut IndexMap<String, Box<T>>,
    kind: &'static str,
    name: String,
    source: Box<T>,
) -> Result<SourceId, RegistryError> {
    if table.contains_key(&name) {
        return Err(RegistryError::DuplicateName { table: kind, name });
    }
    let id = u32::try_from(table.len()).map_err(|_| RegistryError::TableFull { table: kind })?;
    table.insert(name, source);
    Ok(SourceId(id))
}

fn lookup<'t, T: ?Sized>(
    table: &'t IndexMap<String, Box<T>>,
    kind: &'static str,
    source: SourceId,
) -> Result<&'t T, ExecuteError> {
    table
        .get_index(source.index())
        .map(|(_, s)| &**s)
        .ok_or(ExecuteError::UnknownSource { kind, source })
}

fn particle(particles: &[Particle], id: ParticleId) -> Result<&Particle, ExecuteError> {
    particles
        .get(id.index())
        .ok_or(ExecuteError::UnknownParticle { particle: id })
}

fn owner_of(event: &Event) -> Result<ParticleId, ExecuteError> {
    event
        .particle()
        .ok_or(ExecuteError::NotExecutable { kind: event.kind })
}

impl PredictorTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair rule.
    pub fn add_interaction(
        &mut self,
        interaction: impl Interaction,
    ) -> Result<SourceId, RegistryError> {
        let range = interaction.range();
        let name = interaction.name().to_string();
        if !range.is_finite() || range < 0.0 {
            return Err(RegistryError::InvalidRange { name, range });
        }
        let boxed: Box<dyn Interaction> = Box::new(interaction);
        let id = register(&mut self.interactions, "interaction", name, boxed)?;
        self.max_range = self.max_range.max(range);
        Ok(id)
    }

    /// Register a fixed obstacle.
    pub fn add_local(&mut self, local: impl Local) -> Result<SourceId, RegistryError> {
        let name = local.name().to_string();
        let boxed: Box<dyn Local> = Box::new(local);
        register(&mut self.locals, "local", name, boxed)
    }

    /// Register a global rule.
    pub fn add_global(&mut self, global: impl Global) -> Result<SourceId, RegistryError> {
        let name = global.name().to_string();
        let boxed: Box<dyn Global> = Box::new(global);
        register(&mut self.globals, "global", name, boxed)
    }

    /// Register a system event.
    pub fn add_system(&mut self, system: impl SystemEvent) -> Result<SourceId, RegistryError> {
        let name = system.name().to_string();
        let boxed: Box<dyn SystemEvent> = Box::new(system);
        register(&mut self.systems, "system", name, boxed)
    }

    /// Name of the source an event came from, for reports.
    pub fn source_name(&self, kind: EventKind) -> Option<&str> {
        let entry = match kind {
            EventKind::Interaction { source, .. } => {
                self.interactions.get_index(source.index()).map(|(n, _)| n)
            }
            EventKind::Local { source } => self.locals.get_index(source.index()).map(|(n, _)| n),
            EventKind::Global { source } => self.globals.get_index(source.index()).map(|(n, _)| n),
            EventKind::System { source } => self.systems.get_index(source.index()).map(|(n, _)| n),
            EventKind::CellTransition | EventKind::Recalculate => None,
        };
        entry.map(String::as_str)
    }

    /// Number of registered sources per table: interactions, locals,
    /// globals, systems.
    pub fn counts(&self) -> [usize; 4] {
        [
            self.interactions.len(),
            self.locals.len(),
            self.globals.len(),
            self.systems.len(),
        ]
    }

    fn interaction_for(&self, a: &Particle, b: &Particle) -> Option<(usize, &dyn Interaction)> {
        self.interactions
            .values()
            .enumerate()
            .find(|(_, i)| i.applies(a, b))
            .map(|(idx, i)| (idx, &**i))
    }
}

impl fmt::Debug for PredictorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictorTable")
            .field("interactions", &self.interactions.keys().collect::<Vec<_>>())
            .field("locals", &self.locals.keys().collect::<Vec<_>>())
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .field("systems", &self.systems.keys().collect::<Vec<_>>())
            .field("max_range", &self.max_range)
            .finish()
    }
}

impl EventPredictor for PredictorTable {
    fn max_interaction_range(&self) -> f64 {
        self.max_range
    }

    fn predict_interaction(
        &self,
        ctx: &PredictContext<'_>,
        a: &Particle,
        b: &Particle,
    ) -> Result<Option<Event>, PredictError> {
        if a.id == b.id {
            return Ok(None);
        }
        let Some((idx, interaction)) = self.interaction_for(a, b) else {
            return Ok(None);
        };
        Ok(interaction.predict(ctx, a, b)?.map(|p| {
            Event::interaction(a.id, b.id, SourceId(idx as u32), p.dt, p.event_type)
        }))
    }

    fn predict_local(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Predictions, PredictError> {
        let mut out = Predictions::new();
        for (idx, local) in self.locals.values().enumerate() {
            if !local.applies(particle) {
                continue;
            }
            if let Some(p) = local.predict(ctx, particle)? {
                out.push(Event::new(
                    Owner::Particle(particle.id),
                    p.dt,
                    EventKind::Local {
                        source: SourceId(idx as u32),
                    },
                    p.event_type,
                ));
            }
        }
        Ok(out)
    }

    fn predict_global(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Predictions, PredictError> {
        let mut out = Predictions::new();
        for (idx, global) in self.globals.values().enumerate() {
            if !global.applies(particle) {
                continue;
            }
            if let Some(p) = global.predict(ctx, particle)? {
                out.push(Event::new(
                    Owner::Particle(particle.id),
                    p.dt,
                    EventKind::Global {
                        source: SourceId(idx as u32),
                    },
                    p.event_type,
                ));
            }
        }
        Ok(out)
    }

    fn predict_system(&self, ctx: &PredictContext<'_>) -> Result<Predictions, PredictError> {
        let mut out = Predictions::new();
        for (idx, system) in self.systems.values().enumerate() {
            if let Some(p) = system.predict(ctx)? {
                out.push(Event::new(
                    Owner::System,
                    p.dt,
                    EventKind::System {
                        source: SourceId(idx as u32),
                    },
                    p.event_type,
                ));
            }
        }
        Ok(out)
    }

    fn repredict(
        &self,
        ctx: &PredictContext<'_>,
        event: &Event,
        particles: &[Particle],
    ) -> Result<Option<Event>, ExecuteError> {
        let fresh = match event.kind {
            EventKind::Interaction { partner, source } => {
                let interaction = lookup(&self.interactions, "interaction", source)?;
                let a = particle(particles, owner_of(event)?)?;
                let b = particle(particles, partner)?;
                interaction.predict(ctx, a, b)?
            }
            EventKind::Local { source } => {
                let local = lookup(&self.locals, "local", source)?;
                local.predict(ctx, particle(particles, owner_of(event)?)?)?
            }
            EventKind::Global { source } => {
                let global = lookup(&self.globals, "global", source)?;
                global.predict(ctx, particle(particles, owner_of(event)?)?)?
            }
            EventKind::System { .. } | EventKind::CellTransition | EventKind::Recalculate => {
                return Ok(Some(*event));
            }
        };
        Ok(fresh.map(|p| Event {
            dt: p.dt,
            event_type: p.event_type,
            ..*event
        }))
    }

    fn execute(
        &mut self,
        ctx: &PredictContext<'_>,
        event: &Event,
        particles: &mut [Particle],
    ) -> Result<EventOutcome, ExecuteError> {
        match event.kind {
            EventKind::Interaction { partner, source } => {
                let interaction = lookup(&self.interactions, "interaction", source)?;
                let owner = owner_of(event)?;
                let (a, b) = pair_mut(particles, owner, partner)
                    .ok_or(ExecuteError::UnknownParticle { particle: partner })?;
                let (a0, b0) = (a.clone(), b.clone());
                trace!(source = interaction.name(), %owner, %partner, "executing interaction");
                let energy_delta = interaction.execute(ctx, a, b, event.event_type)?;
                let mut outcome = EventOutcome {
                    energy_delta,
                    ..EventOutcome::none()
                };
                outcome.push(&a0, a);
                outcome.push(&b0, b);
                Ok(outcome)
            }
            EventKind::Local { source } => {
                let local = lookup(&self.locals, "local", source)?;
                let owner = owner_of(event)?;
                let p = particles
                    .get_mut(owner.index())
                    .ok_or(ExecuteError::UnknownParticle { particle: owner })?;
                let before = p.clone();
                trace!(source = local.name(), %owner, "executing local event");
                let energy_delta = local.execute(ctx, p, event.event_type)?;
                let mut outcome = EventOutcome {
                    energy_delta,
                    ..EventOutcome::none()
                };
                outcome.push(&before, p);
                Ok(outcome)
            }
            EventKind::Global { source } => {
                let global = lookup(&self.globals, "global", source)?;
                let owner = owner_of(event)?;
                let p = particles
                    .get_mut(owner.index())
                    .ok_or(ExecuteError::UnknownParticle { particle: owner })?;
                let before = p.clone();
                trace!(source = global.name(), %owner, "executing global event");
                let energy_delta = global.execute(ctx, p, event.event_type)?;
                let mut outcome = EventOutcome {
                    energy_delta,
                    ..EventOutcome::none()
                };
                outcome.push(&before, p);
                Ok(outcome)
            }
            EventKind::System { source } => {
                let system = self
                    .systems
                    .get_index_mut(source.index())
                    .map(|(_, s)| s)
                    .ok_or(ExecuteError::UnknownSource {
                        kind: "system",
                        source,
                    })?;
                trace!(source = system.name(), "executing system event");
                system.execute(ctx, particles)
            }
            EventKind::CellTransition | EventKind::Recalculate => {
                Err(ExecuteError::NotExecutable { kind: event.kind })
            }
        }
    }

    fn stream(&mut self, dt: f64) {
        for system in self.systems.values_mut() {
            system.stream(dt);
        }
    }

    fn overlap(&self, ctx: &PredictContext<'_>, a: &Particle, b: &Particle) -> Option<f64> {
        if a.id == b.id {
            return None;
        }
        self.interaction_for(a, b)
            .and_then(|(_, i)| i.overlap(ctx, a, b))
    }

    fn source_name(&self, kind: EventKind) -> Option<&str> {
        PredictorTable::source_name(self, kind)
    }
}
