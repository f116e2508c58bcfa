//! Benchmark profiles for the Ricochet engine.
//!
//! - [`reference_profile`]: 1000 hard spheres in a periodic cube
//! - [`stress_profile`]: 8000 hard spheres at the same density
//! - [`box_edge`]: cube edge for a given count and packing fraction

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::f64::consts::PI;

use ricochet_engine::SimulationConfig;
use ricochet_predict::{PredictorTable, PropertyTable};
use ricochet_space::Periodic;
use ricochet_test_utils::{lattice_gas, HardSphere};

/// Packing fraction used by both profiles.
pub const PACKING_FRACTION: f64 = 0.1;

/// Edge of a cube holding `n` unit-diameter spheres at packing fraction
/// `phi`.
pub fn box_edge(n: usize, phi: f64) -> f64 {
    (n as f64 * PI / 6.0 / phi).cbrt()
}

fn hard_sphere_gas(n: usize, seed: u64) -> SimulationConfig {
    let edge = box_edge(n, PACKING_FRACTION);
    let mut predictor = PredictorTable::new();
    predictor.add_interaction(HardSphere::new(1.0)).unwrap();
    SimulationConfig::new(
        lattice_gas(n, edge, 1.0, seed),
        Periodic::cube(edge).unwrap(),
        PropertyTable::single("bulk", 1.0).unwrap(),
        predictor,
    )
}

/// 1000 hard spheres (10 per axis) at packing fraction 0.1.
pub fn reference_profile(seed: u64) -> SimulationConfig {
    hard_sphere_gas(1000, seed)
}

/// 8000 hard spheres (20 per axis) at packing fraction 0.1.
pub fn stress_profile(seed: u64) -> SimulationConfig {
    hard_sphere_gas(8000, seed)
}
