//! Reusable event sources for scheduler and engine tests.
//!
//! - [`HardSphere`]: elastic collisions of equal-diameter spheres.
//! - [`PlaneWall`]: elastic reflection off an infinite plane.
//! - [`Sentinel`]: a global event with no physical effect.
//! - [`Ticker`]: a fixed-period system event with no physical effect.
//! - [`Reverser`]: a system event that flips a random particle's velocity.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ricochet_core::{DVec3, EventType, ExecuteError, Particle, PredictError};
use ricochet_predict::{
    EventOutcome, Global, Interaction, Local, PredictContext, Prediction, SystemEvent,
};

// ── HardSphere ─────────────────────────────────────────────────────

/// Elastic hard spheres of diameter `diameter`.
pub struct HardSphere {
    pub name: String,
    pub diameter: f64,
}

impl HardSphere {
    pub fn new(diameter: f64) -> Self {
        Self {
            name: "hard-sphere".to_string(),
            diameter,
        }
    }

    /// Separation and relative velocity of `b` seen from `a`, through
    /// the boundary's minimum image.
    fn relative(ctx: &PredictContext<'_>, a: &Particle, b: &Particle) -> (DVec3, DVec3) {
        let mut r = b.position - a.position;
        let mut v = b.velocity - a.velocity;
        ctx.boundary().wrap_with_velocity(&mut r, &mut v);
        (r, v)
    }
}

/// Time until two spheres at separation `r` with relative velocity `v`
/// touch at distance `sigma`. Overlapping, approaching pairs collide now.
pub fn sphere_contact_time(r: DVec3, v: DVec3, sigma: f64) -> Option<f64> {
    let b = r.dot(v);
    if b >= 0.0 {
        return None;
    }
    let c = r.length_squared() - sigma * sigma;
    if c <= 0.0 {
        return Some(0.0);
    }
    let disc = b * b - v.length_squared() * c;
    if disc < 0.0 {
        return None;
    }
    Some(c / (-b + disc.sqrt()))
}

impl Interaction for HardSphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> f64 {
        self.diameter
    }

    fn predict(
        &self,
        ctx: &PredictContext<'_>,
        a: &Particle,
        b: &Particle,
    ) -> Result<Option<Prediction>, PredictError> {
        let (r, v) = Self::relative(ctx, a, b);
        Ok(sphere_contact_time(r, v, self.diameter).map(|dt| Prediction::new(dt, EventType::Core)))
    }

    fn execute(
        &self,
        ctx: &PredictContext<'_>,
        a: &mut Particle,
        b: &mut Particle,
        _event_type: EventType,
    ) -> Result<f64, ExecuteError> {
        let ma = ctx.properties().mass(a.species)?;
        let mb = ctx.properties().mass(b.species)?;
        let (r, v) = Self::relative(ctx, a, b);
        let r2 = r.length_squared();
        if r2 == 0.0 {
            return Err(ExecuteError::Predict(PredictError::NotANumber {
                context: format!("contact normal of particles {} and {}", a.id, b.id),
            }));
        }
        let k = 2.0 * r.dot(v) / (r2 * (ma + mb));
        a.velocity += r * (k * mb);
        b.velocity -= r * (k * ma);
        Ok(0.0)
    }

    fn overlap(&self, ctx: &PredictContext<'_>, a: &Particle, b: &Particle) -> Option<f64> {
        let (r, _) = Self::relative(ctx, a, b);
        let depth = self.diameter - r.length();
        (depth > 0.0).then_some(depth)
    }
}

// ── PlaneWall ──────────────────────────────────────────────────────

/// An infinite plane through `origin` with unit `normal` pointing into
/// the allowed half-space. Particle centres reflect at distance `radius`.
pub struct PlaneWall {
    pub name: String,
    pub origin: DVec3,
    pub normal: DVec3,
    pub radius: f64,
}

impl PlaneWall {
    pub fn new(name: &str, origin: DVec3, normal: DVec3, radius: f64) -> Self {
        Self {
            name: name.to_string(),
            origin,
            normal: normal.normalize(),
            radius,
        }
    }
}

/// Earliest `t >= 0` at which a point `d` away from a plane, moving
/// towards it at `u` with acceleration `g` (both towards the plane),
/// reaches it.
fn approach_time(d: f64, u: f64, g: f64) -> Option<f64> {
    if d <= 0.0 {
        return (u > 0.0 || (u == 0.0 && g > 0.0)).then_some(0.0);
    }
    let disc = u * u + 2.0 * g * d;
    if disc < 0.0 {
        return None;
    }
    let denom = u + disc.sqrt();
    (denom > 0.0).then(|| 2.0 * d / denom)
}

impl Local for PlaneWall {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(
        &self,
        ctx: &PredictContext<'_>,
        particle: &Particle,
    ) -> Result<Option<Prediction>, PredictError> {
        let d = self.normal.dot(particle.position - self.origin) - self.radius;
        if d < -self.radius {
            return Err(PredictError::Escaped {
                particle: particle.id,
                obstacle: self.name.clone(),
            });
        }
        let u = -self.normal.dot(particle.velocity);
        let g = -self.normal.dot(ctx.kinematics().acceleration);
        Ok(approach_time(d, u, g).map(|dt| Prediction::new(dt, EventType::Wall)))
    }

    fn execute(
        &self,
        _ctx: &PredictContext<'_>,
        particle: &mut Particle,
        _event_type: EventType,
    ) -> Result<f64, ExecuteError> {
        let vn = particle.velocity.dot(self.normal);
        if vn < 0.0 {
            particle.velocity -= self.normal * (2.0 * vn);
        }
        Ok(0.0)
    }
}

// ── Sentinel ───────────────────────────────────────────────────────

/// Fires for every particle `interval` after it was last predicted.
/// Does nothing when it fires.
pub struct Sentinel {
    pub name: String,
    pub interval: f64,
}

impl Sentinel {
    pub fn new(interval: f64) -> Self {
        Self {
            name: "sentinel".to_string(),
            interval,
        }
    }
}

impl Global for Sentinel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(
        &self,
        _ctx: &PredictContext<'_>,
        _particle: &Particle,
    ) -> Result<Option<Prediction>, PredictError> {
        Ok(Some(Prediction::new(self.interval, EventType::Virtual)))
    }

    fn execute(
        &self,
        _ctx: &PredictContext<'_>,
        _particle: &mut Particle,
        _event_type: EventType,
    ) -> Result<f64, ExecuteError> {
        Ok(0.0)
    }
}

// ── Ticker ─────────────────────────────────────────────────────────

/// Fixed-period system event. Counts how often it fired.
pub struct Ticker {
    pub name: String,
    pub period: f64,
    next: f64,
    pub fired: u64,
}

impl Ticker {
    pub fn new(period: f64) -> Self {
        Self {
            name: "ticker".to_string(),
            period,
            next: period,
            fired: 0,
        }
    }
}

impl SystemEvent for Ticker {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, _ctx: &PredictContext<'_>) -> Result<Option<Prediction>, PredictError> {
        Ok(Some(Prediction::new(self.next.max(0.0), EventType::Ticker)))
    }

    fn execute(
        &mut self,
        _ctx: &PredictContext<'_>,
        _particles: &mut [Particle],
    ) -> Result<EventOutcome, ExecuteError> {
        self.fired += 1;
        self.next = self.period;
        Ok(EventOutcome::none())
    }

    fn stream(&mut self, dt: f64) {
        self.next -= dt;
    }
}

// ── Reverser ───────────────────────────────────────────────────────

/// Every `period`, reverses the velocity of one randomly chosen
/// scheduled particle.
pub struct Reverser {
    pub period: f64,
    next: f64,
    rng: ChaCha8Rng,
}

impl Reverser {
    pub fn new(period: f64, seed: u64) -> Self {
        Self {
            period,
            next: period,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SystemEvent for Reverser {
    fn name(&self) -> &str {
        "reverser"
    }

    fn predict(&self, _ctx: &PredictContext<'_>) -> Result<Option<Prediction>, PredictError> {
        Ok(Some(Prediction::new(self.next.max(0.0), EventType::Thermostat)))
    }

    fn execute(
        &mut self,
        _ctx: &PredictContext<'_>,
        particles: &mut [Particle],
    ) -> Result<EventOutcome, ExecuteError> {
        self.next = self.period;
        let mut outcome = EventOutcome::none();
        if particles.is_empty() {
            return Ok(outcome);
        }
        let i = self.rng.random_range(0..particles.len());
        let p = &mut particles[i];
        if p.is_scheduled() {
            let before = p.clone();
            p.velocity = -p.velocity;
            outcome.push(&before, p);
        }
        Ok(outcome)
    }

    fn stream(&mut self, dt: f64) {
        self.next -= dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::{Kinematics, ParticleId};
    use ricochet_predict::PropertyTable;
    use ricochet_space::{Periodic, Unbounded};

    fn head_on() -> (Particle, Particle) {
        (
            Particle::new(ParticleId(0), DVec3::ZERO, DVec3::X),
            Particle::new(ParticleId(1), DVec3::X * 10.0, -DVec3::X),
        )
    }

    #[test]
    fn head_on_collision_time() {
        let bc = Unbounded::new(DVec3::splat(30.0)).unwrap();
        let props = PropertyTable::single("A", 1.0).unwrap();
        let kin = Kinematics::free_flight();
        let ctx = PredictContext::new(&bc, &props, &kin, 0.0);
        let (a, b) = head_on();
        let p = HardSphere::new(1.0).predict(&ctx, &a, &b).unwrap().unwrap();
        assert_eq!(p.dt, 4.5);
    }

    #[test]
    fn receding_pair_never_collides() {
        let (a, b) = head_on();
        assert!(sphere_contact_time(b.position - a.position, a.velocity - b.velocity, 1.0).is_none());
    }

    #[test]
    fn equal_masses_exchange_normal_velocity() {
        let bc = Periodic::cube(30.0).unwrap();
        let props = PropertyTable::single("A", 1.0).unwrap();
        let kin = Kinematics::free_flight();
        let ctx = PredictContext::new(&bc, &props, &kin, 0.0);
        let mut a = Particle::new(ParticleId(0), DVec3::ZERO, DVec3::X);
        let mut b = Particle::new(ParticleId(1), DVec3::X, -DVec3::X);
        HardSphere::new(1.0).execute(&ctx, &mut a, &mut b, EventType::Core).unwrap();
        assert_eq!(a.velocity, -DVec3::X);
        assert_eq!(b.velocity, DVec3::X);
    }

    #[test]
    fn collision_through_periodic_image() {
        let bc = Periodic::cube(10.0).unwrap();
        let props = PropertyTable::single("A", 1.0).unwrap();
        let kin = Kinematics::free_flight();
        let ctx = PredictContext::new(&bc, &props, &kin, 0.0);
        let a = Particle::new(ParticleId(0), DVec3::new(4.0, 0.0, 0.0), DVec3::X);
        let b = Particle::new(ParticleId(1), DVec3::new(-4.0, 0.0, 0.0), -DVec3::X);
        // Image separation is 2, closing at 2: contact at 0.5.
        let p = HardSphere::new(1.0).predict(&ctx, &a, &b).unwrap().unwrap();
        assert!((p.dt - 0.5).abs() < 1e-12);
    }

    #[test]
    fn wall_reflects_under_gravity() {
        let bc = Unbounded::new(DVec3::splat(10.0)).unwrap();
        let props = PropertyTable::single("A", 1.0).unwrap();
        let kin = Kinematics::with_acceleration(DVec3::new(0.0, 0.0, -2.0));
        let ctx = PredictContext::new(&bc, &props, &kin, 0.0);
        let floor = PlaneWall::new("floor", DVec3::ZERO, DVec3::Z, 0.5);
        let mut p = Particle::new(ParticleId(0), DVec3::new(0.0, 0.0, 1.5), DVec3::ZERO);
        // Falls 1.0 under g = 2: t = 1.
        let pred = floor.predict(&ctx, &p).unwrap().unwrap();
        assert!((pred.dt - 1.0).abs() < 1e-12);
        p.velocity = DVec3::new(0.0, 0.0, -2.0);
        floor.execute(&ctx, &mut p, EventType::Wall).unwrap();
        assert_eq!(p.velocity, DVec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn escaped_particle_is_an_error() {
        let bc = Unbounded::new(DVec3::splat(10.0)).unwrap();
        let props = PropertyTable::single("A", 1.0).unwrap();
        let kin = Kinematics::free_flight();
        let ctx = PredictContext::new(&bc, &props, &kin, 0.0);
        let floor = PlaneWall::new("floor", DVec3::ZERO, DVec3::Z, 0.5);
        let p = Particle::new(ParticleId(0), DVec3::new(0.0, 0.0, -3.0), DVec3::ZERO);
        assert!(floor.predict(&ctx, &p).is_err());
    }

    #[test]
    fn ticker_counts_down_and_resets() {
        let bc = Unbounded::new(DVec3::splat(10.0)).unwrap();
        let props = PropertyTable::new();
        let kin = Kinematics::free_flight();
        let ctx = PredictContext::new(&bc, &props, &kin, 0.0);
        let mut t = Ticker::new(2.0);
        t.stream(0.5);
        assert_eq!(t.predict(&ctx).unwrap().map(|p| p.dt), Some(1.5));
        t.execute(&ctx, &mut []).unwrap();
        assert_eq!(t.fired, 1);
        assert_eq!(t.predict(&ctx).unwrap().map(|p| p.dt), Some(2.0));
    }
}
