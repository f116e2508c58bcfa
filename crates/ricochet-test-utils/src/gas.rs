//! Seeded random particle configurations.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ricochet_core::{DVec3, Particle, ParticleId};

fn random_velocity(rng: &mut ChaCha8Rng, speed: f64) -> DVec3 {
    DVec3::new(
        rng.random_range(-speed..speed),
        rng.random_range(-speed..speed),
        rng.random_range(-speed..speed),
    )
}

/// `n` particles on a simple cubic lattice filling a cube of edge
/// `edge` centred on the origin, with random velocities in
/// `[-speed, speed)^3` and zero total momentum.
///
/// Lattice spacing is `edge / ceil(cbrt(n))`, so any diameter below that
/// gives a non-overlapping start.
pub fn lattice_gas(n: usize, edge: f64, speed: f64, seed: u64) -> Vec<Particle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let per_axis = (n as f64).cbrt().ceil().max(1.0) as usize;
    let spacing = edge / per_axis as f64;
    let mut particles: Vec<Particle> = (0..n)
        .map(|i| {
            let (x, y, z) = (i % per_axis, (i / per_axis) % per_axis, i / (per_axis * per_axis));
            let pos = DVec3::new(x as f64, y as f64, z as f64) * spacing
                + DVec3::splat(0.5 * spacing - 0.5 * edge);
            Particle::new(ParticleId(i as u32), pos, random_velocity(&mut rng, speed))
        })
        .collect();

    if n > 1 {
        let mean = particles.iter().map(|p| p.velocity).sum::<DVec3>() / n as f64;
        for p in &mut particles {
            p.velocity -= mean;
        }
    }
    particles
}

/// `n` particles uniformly distributed in a cube of edge `edge` centred
/// on the origin. Overlaps are allowed; use with sources that have no
/// hard core.
pub fn random_cloud(n: usize, edge: f64, speed: f64, seed: u64) -> Vec<Particle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let h = 0.5 * edge;
    (0..n)
        .map(|i| {
            let pos = DVec3::new(
                rng.random_range(-h..h),
                rng.random_range(-h..h),
                rng.random_range(-h..h),
            );
            Particle::new(ParticleId(i as u32), pos, random_velocity(&mut rng, speed))
        })
        .collect()
}
