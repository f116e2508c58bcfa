//! Boundary conditions.
//!
//! A [`BoundaryCondition`] maps positions (and, for sheared boxes,
//! velocities) back into the primary image. The cell list and every
//! predictor use the same object, so separations computed by a pair
//! predictor and cell membership computed by the index always agree on
//! which image of a particle is meant.
//!
//! The primary box is centred on the origin: `[-L/2, L/2)` per axis.

use std::fmt;

use ricochet_core::DVec3;

use crate::error::SpaceError;

/// Image mapping used by the spatial index and predictors.
///
/// # Thread Safety
///
/// `Sync` is required because predictors receive `&dyn BoundaryCondition`
/// through their context, and replicas move whole simulations across
/// threads.
pub trait BoundaryCondition: fmt::Debug + Send + Sync + 'static {
    /// Edge lengths of the primary box.
    fn primary_box(&self) -> DVec3;

    /// `true` if particles leaving one face re-enter through the other.
    /// Unbounded boxes still tile the cell lattice periodically but do
    /// not wrap positions or separations.
    fn is_periodic(&self) -> bool;

    /// `true` for Lees-Edwards shear along x with gradient along y.
    fn is_sheared(&self) -> bool {
        false
    }

    /// Map a position or separation vector into the primary image.
    fn wrap(&self, position: &mut DVec3);

    /// Like [`wrap`](Self::wrap), also applying any velocity jump the
    /// image shift implies.
    fn wrap_with_velocity(&self, position: &mut DVec3, velocity: &mut DVec3);

    /// Wrap as the boundary will stand `dt` from now.
    fn wrap_ahead(&self, position: &mut DVec3, dt: f64) {
        let _ = dt;
        self.wrap(position);
    }

    /// Advance any time-dependent boundary state by `dt`.
    fn stream(&mut self, dt: f64) {
        let _ = dt;
    }
}

fn check_box(size: DVec3) -> Result<(), SpaceError> {
    if !size.is_finite() || size.min_element() <= 0.0 {
        return Err(SpaceError::InvalidGeometry {
            reason: format!("box edges must be finite and positive, got {size}"),
        });
    }
    Ok(())
}

fn minimum_image(v: &mut DVec3, size: DVec3) {
    *v -= size * (*v / size).round();
}

// ── Unbounded ──────────────────────────────────────────────────────

/// An infinite system. `primary_box` only sets the cell lattice period.
#[derive(Clone, Debug, PartialEq)]
pub struct Unbounded {
    size: DVec3,
}

impl Unbounded {
    /// Unbounded space whose cell lattice repeats every `size`.
    pub fn new(size: DVec3) -> Result<Self, SpaceError> {
        check_box(size)?;
        Ok(Self { size })
    }
}

impl BoundaryCondition for Unbounded {
    fn primary_box(&self) -> DVec3 {
        self.size
    }

    fn is_periodic(&self) -> bool {
        false
    }

    fn wrap(&self, _position: &mut DVec3) {}

    fn wrap_with_velocity(&self, _position: &mut DVec3, _velocity: &mut DVec3) {}
}

// ── Periodic ───────────────────────────────────────────────────────

/// Cuboidal periodic box.
#[derive(Clone, Debug, PartialEq)]
pub struct Periodic {
    size: DVec3,
}

impl Periodic {
    /// Periodic box with the given edge lengths.
    pub fn new(size: DVec3) -> Result<Self, SpaceError> {
        check_box(size)?;
        Ok(Self { size })
    }

    /// Cubic periodic box.
    pub fn cube(edge: f64) -> Result<Self, SpaceError> {
        Self::new(DVec3::splat(edge))
    }
}

impl BoundaryCondition for Periodic {
    fn primary_box(&self) -> DVec3 {
        self.size
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn wrap(&self, position: &mut DVec3) {
        minimum_image(position, self.size);
    }

    fn wrap_with_velocity(&self, position: &mut DVec3, _velocity: &mut DVec3) {
        minimum_image(position, self.size);
    }
}

// ── Lees-Edwards ───────────────────────────────────────────────────

/// Lees-Edwards sliding-brick boundary: the images above and below the
/// primary box (along y) slide along x at `shear_rate * Ly`.
#[derive(Clone, Debug, PartialEq)]
pub struct LeesEdwards {
    size: DVec3,
    shear_rate: f64,
    /// Current x displacement of the image above, in `[0, Lx)`.
    offset: f64,
}

impl LeesEdwards {
    /// Sheared box with zero initial image offset.
    pub fn new(size: DVec3, shear_rate: f64) -> Result<Self, SpaceError> {
        check_box(size)?;
        if !shear_rate.is_finite() {
            return Err(SpaceError::InvalidGeometry {
                reason: format!("shear rate must be finite, got {shear_rate}"),
            });
        }
        Ok(Self {
            size,
            shear_rate,
            offset: 0.0,
        })
    }

    /// Current x displacement between neighbouring y images.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Shear rate.
    pub fn shear_rate(&self) -> f64 {
        self.shear_rate
    }

    /// Velocity of the image above relative to the primary box.
    pub fn image_speed(&self) -> f64 {
        self.shear_rate * self.size.y
    }

    fn shift(&self, position: &mut DVec3, offset: f64) -> f64 {
        let images = (position.y / self.size.y).round();
        position.x -= images * offset;
        minimum_image(position, self.size);
        images
    }
}

impl BoundaryCondition for LeesEdwards {
    fn primary_box(&self) -> DVec3 {
        self.size
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn is_sheared(&self) -> bool {
        true
    }

    fn wrap(&self, position: &mut DVec3) {
        self.shift(position, self.offset);
    }

    fn wrap_with_velocity(&self, position: &mut DVec3, velocity: &mut DVec3) {
        let images = self.shift(position, self.offset);
        velocity.x -= images * self.image_speed();
    }

    fn wrap_ahead(&self, position: &mut DVec3, dt: f64) {
        self.shift(position, self.offset + dt * self.image_speed());
    }

    fn stream(&mut self, dt: f64) {
        self.offset = (self.offset + dt * self.image_speed()).rem_euclid(self.size.x);
    }
}
