//! Free-streaming motion between events.
//!
//! Between events every dynamic particle follows
//! `r(t) = r + v t + a t^2 / 2` with a uniform external acceleration
//! `a` (zero for pure free flight). [`Kinematics`] advances particles
//! along that law and solves it for the first exit from an axis-aligned
//! box, which is what the spatial index needs to predict cell
//! transitions.

use glam::DVec3;

use crate::particle::Particle;

/// Uniform-acceleration streaming law.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Kinematics {
    /// External acceleration applied to every streaming particle.
    pub acceleration: DVec3,
}

/// First face a particle reaches when leaving an axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellCrossing {
    /// Time until the crossing.
    pub dt: f64,
    /// Axis of the face (0 = x, 1 = y, 2 = z).
    pub axis: usize,
    /// `+1` for the upper face, `-1` for the lower face.
    pub direction: i8,
}

impl Kinematics {
    /// Pure free flight, no external field.
    pub fn free_flight() -> Self {
        Self::default()
    }

    /// Constant acceleration `g` on every streaming particle.
    pub fn with_acceleration(acceleration: DVec3) -> Self {
        Self { acceleration }
    }

    /// `true` when there is no external acceleration. Event times then
    /// scale exactly as `1/f` under a uniform velocity scaling by `f`.
    pub fn is_free_flight(&self) -> bool {
        self.acceleration == DVec3::ZERO
    }

    /// Advance a particle by `dt`. Particles that are not scheduled
    /// (sleeping, static or removed) do not move.
    pub fn stream(&self, particle: &mut Particle, dt: f64) {
        if !particle.is_scheduled() {
            return;
        }
        particle.position = self.position_after(particle.position, particle.velocity, dt);
        particle.velocity += self.acceleration * dt;
    }

    /// Position after `dt` starting from `position` with `velocity`.
    pub fn position_after(&self, position: DVec3, velocity: DVec3, dt: f64) -> DVec3 {
        position + velocity * dt + self.acceleration * (0.5 * dt * dt)
    }

    /// Velocity after `dt`.
    pub fn velocity_after(&self, velocity: DVec3, dt: f64) -> DVec3 {
        velocity + self.acceleration * dt
    }

    /// Time until a point at `offset` from the box's lower corner,
    /// moving with `velocity`, leaves the box `[0, width)`.
    ///
    /// Only faces the particle is heading for count, so a particle
    /// sitting exactly on a face it is moving away from is not
    /// re-crossed. Ties between axes resolve to the lowest axis.
    /// Returns `None` when the particle never leaves.
    pub fn exit_time(&self, offset: DVec3, velocity: DVec3, width: DVec3) -> Option<CellCrossing> {
        let mut best: Option<CellCrossing> = None;
        for axis in 0..3 {
            let (r, v, a, w) = (offset[axis], velocity[axis], self.acceleration[axis], width[axis]);
            for (direction, distance) in [(1i8, w - r), (-1i8, r)] {
                let s = f64::from(direction);
                let dt = face_time(distance, s * v, s * a);
                if dt.is_finite() && best.is_none_or(|b| dt < b.dt) {
                    best = Some(CellCrossing {
                        dt,
                        axis,
                        direction,
                    });
                }
            }
        }
        best
    }
}

/// Earliest `t >= 0` with `u t + g t^2 / 2 = d`, where `d` is the
/// distance to the face and `u`, `g` are velocity and acceleration
/// projected onto the outward face normal. `INFINITY` if never.
fn face_time(d: f64, u: f64, g: f64) -> f64 {
    if d <= 0.0 {
        // Already on or past the face: leave now if heading out.
        if u > 0.0 || (u == 0.0 && g > 0.0) {
            return 0.0;
        }
        if d < 0.0 {
            return f64::INFINITY;
        }
    }
    let disc = u * u + 2.0 * g * d;
    if disc < 0.0 {
        return f64::INFINITY;
    }
    // 2d / (u + sqrt(disc)) is the smaller positive root and stays
    // accurate when g is tiny.
    let denom = u + disc.sqrt();
    if denom <= 0.0 {
        return f64::INFINITY;
    }
    2.0 * d / denom
}
