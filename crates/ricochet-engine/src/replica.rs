//! Replica exchange between independent simulations.
//!
//! Each temperature slot holds one [`Simulation`]. A round runs every
//! slot forward by `segment_time` on its own thread, then attempts
//! swaps between slots. A swap exchanges the simulations wholesale and
//! rescales velocities to the new slot's temperature, so nothing is
//! ever shared between two running instances.

use std::error::Error;
use std::fmt;
use std::mem;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::driver::Simulation;
use crate::error::RunError;

/// Default simulated time between exchange attempts.
pub const DEFAULT_SEGMENT_TIME: f64 = 1.0;

// ── SwapMode ───────────────────────────────────────────────────────

/// Which slot pairs are tried after each segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwapMode {
    /// Never swap.
    NoSwapping,
    /// Adjacent pairs `(i, i+1)` stepping by two, starting at slot 0 and
    /// slot 1 on alternate rounds.
    #[default]
    AlternatingSequence,
    /// One random adjacent pair.
    SinglePair,
    /// Five attempts per replica on random, not necessarily adjacent,
    /// pairs.
    RandomPairs,
    /// A coin flip between `AlternatingSequence` and `RandomPairs`.
    RandomSelection,
}

// ── ReplicaConfig ──────────────────────────────────────────────────

/// Exchange schedule.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicaConfig {
    /// Pair selection. Default: `AlternatingSequence`.
    pub mode: SwapMode,
    /// Simulated time each replica runs between exchanges. Default: 1.0.
    pub segment_time: f64,
    /// Seed for pair selection and acceptance draws. Default: 0.
    pub seed: u64,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            mode: SwapMode::default(),
            segment_time: DEFAULT_SEGMENT_TIME,
            seed: 0,
        }
    }
}

// ── ReplicaError ───────────────────────────────────────────────────

/// Errors from building or running a replica exchange.
#[derive(Debug, PartialEq)]
pub enum ReplicaError {
    /// No replicas were supplied.
    NoReplicas,
    /// A temperature is not finite and positive.
    InvalidTemperature {
        /// The invalid value.
        temperature: f64,
    },
    /// `segment_time` is not finite and positive.
    InvalidSegment {
        /// The invalid value.
        segment_time: f64,
    },
    /// A slot index is out of range.
    UnknownSlot {
        /// The offending index.
        slot: usize,
    },
    /// A replica's run failed.
    Run {
        /// Slot the replica was in.
        slot: usize,
        /// The failure.
        error: RunError,
    },
    /// A replica's worker thread panicked.
    WorkerPanicked {
        /// Slot the replica was in.
        slot: usize,
    },
}

impl fmt::Display for ReplicaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReplicas => write!(f, "no replicas configured"),
            Self::InvalidTemperature { temperature } => {
                write!(f, "temperature must be finite and positive, got {temperature}")
            }
            Self::InvalidSegment { segment_time } => {
                write!(f, "segment_time must be finite and positive, got {segment_time}")
            }
            Self::UnknownSlot { slot } => write!(f, "no replica slot {slot}"),
            Self::Run { slot, error } => write!(f, "replica in slot {slot}: {error}"),
            Self::WorkerPanicked { slot } => write!(f, "worker for slot {slot} panicked"),
        }
    }
}

impl Error for ReplicaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Run { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ── ReplicaStats ───────────────────────────────────────────────────

/// Exchange counters for one temperature slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicaStats {
    /// The slot's temperature.
    pub temperature: f64,
    /// Swaps attempted with this slot as either partner.
    pub attempts: u64,
    /// Swaps accepted with this slot as either partner.
    pub swaps: u64,
}

impl ReplicaStats {
    /// Accepted fraction of attempts, or 0 before the first attempt.
    pub fn acceptance_ratio(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.swaps as f64 / self.attempts as f64
        }
    }
}

// ── ReplicaExchange ────────────────────────────────────────────────

struct Slot {
    temperature: f64,
    sim: Simulation,
    attempts: u64,
    swaps: u64,
}

/// Temperature-ordered set of simulations with periodic swaps.
pub struct ReplicaExchange {
    slots: Vec<Slot>,
    mode: SwapMode,
    segment_time: f64,
    rng: ChaCha8Rng,
    odd_start: bool,
    rounds: u64,
}

impl ReplicaExchange {
    /// Slots from `(temperature, simulation)` pairs, ordered by
    /// temperature. The simulations' velocities are taken to be at
    /// their paired temperature already.
    pub fn new(
        replicas: Vec<(f64, Simulation)>,
        config: &ReplicaConfig,
    ) -> Result<Self, ReplicaError> {
        if replicas.is_empty() {
            return Err(ReplicaError::NoReplicas);
        }
        if !config.segment_time.is_finite() || config.segment_time <= 0.0 {
            return Err(ReplicaError::InvalidSegment {
                segment_time: config.segment_time,
            });
        }
        if let Some(&(temperature, _)) = replicas
            .iter()
            .find(|(t, _)| !t.is_finite() || *t <= 0.0)
        {
            return Err(ReplicaError::InvalidTemperature { temperature });
        }
        let mut slots: Vec<Slot> = replicas
            .into_iter()
            .map(|(temperature, sim)| Slot {
                temperature,
                sim,
                attempts: 0,
                swaps: 0,
            })
            .collect();
        slots.sort_by(|a, b| a.temperature.total_cmp(&b.temperature));
        info!(replicas = slots.len(), mode = ?config.mode, "replica exchange built");
        Ok(Self {
            slots,
            mode: config.mode,
            segment_time: config.segment_time,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            odd_start: false,
            rounds: 0,
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; construction requires at least one replica.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot temperatures in ascending order.
    pub fn temperatures(&self) -> Vec<f64> {
        self.slots.iter().map(|s| s.temperature).collect()
    }

    /// The simulation currently in `slot`.
    pub fn simulation(&self, slot: usize) -> Option<&Simulation> {
        self.slots.get(slot).map(|s| &s.sim)
    }

    /// Mutable access to the simulation currently in `slot`.
    pub fn simulation_mut(&mut self, slot: usize) -> Option<&mut Simulation> {
        self.slots.get_mut(slot).map(|s| &mut s.sim)
    }

    /// Per-slot exchange counters.
    pub fn stats(&self) -> Vec<ReplicaStats> {
        self.slots
            .iter()
            .map(|s| ReplicaStats {
                temperature: s.temperature,
                attempts: s.attempts,
                swaps: s.swaps,
            })
            .collect()
    }

    /// Completed rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Run every replica forward by `segment_time`, one thread each.
    pub fn run_segment(&mut self) -> Result<(), ReplicaError> {
        let segment = self.segment_time;
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .slots
                .iter_mut()
                .map(|slot| {
                    let sim = &mut slot.sim;
                    scope.spawn(move || {
                        let until = sim.system_time() + segment;
                        sim.run_until(until)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });
        for (slot, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(error)) => return Err(ReplicaError::Run { slot, error }),
                Err(_) => return Err(ReplicaError::WorkerPanicked { slot }),
            }
        }
        Ok(())
    }

    /// Attempt swaps according to the configured mode.
    pub fn exchange(&mut self) -> Result<(), ReplicaError> {
        if self.slots.len() < 2 {
            return Ok(());
        }
        match self.mode {
            SwapMode::NoSwapping => Ok(()),
            SwapMode::SinglePair => self.single_pair(),
            SwapMode::AlternatingSequence => self.alternating_sequence(),
            SwapMode::RandomPairs => self.random_pairs(),
            SwapMode::RandomSelection => {
                if self.rng.random_bool(0.5) {
                    self.alternating_sequence()
                } else {
                    self.random_pairs()
                }
            }
        }
    }

    /// One segment followed by one exchange.
    pub fn round(&mut self) -> Result<(), ReplicaError> {
        self.run_segment()?;
        self.exchange()?;
        self.rounds += 1;
        debug!(round = self.rounds, "replica round complete");
        Ok(())
    }

    /// Run `rounds` rounds.
    pub fn run(&mut self, rounds: u64) -> Result<(), ReplicaError> {
        for _ in 0..rounds {
            self.round()?;
        }
        Ok(())
    }

    fn single_pair(&mut self) -> Result<(), ReplicaError> {
        let n = self.slots.len();
        let i = if n == 2 { 0 } else { self.rng.random_range(0..n - 1) };
        self.attempt_swap(i, i + 1).map(|_| ())
    }

    fn alternating_sequence(&mut self) -> Result<(), ReplicaError> {
        let start = usize::from(self.odd_start);
        self.odd_start = !self.odd_start;
        let mut i = start;
        while i + 1 < self.slots.len() {
            self.attempt_swap(i, i + 1)?;
            i += 2;
        }
        Ok(())
    }

    fn random_pairs(&mut self) -> Result<(), ReplicaError> {
        let n = self.slots.len();
        for _ in 0..5 * n {
            let i = self.rng.random_range(0..n);
            let mut j = self.rng.random_range(0..n - 1);
            if j >= i {
                j += 1;
            }
            self.attempt_swap(i, j)?;
        }
        Ok(())
    }

    /// Metropolis swap attempt between slots `i` and `j`.
    ///
    /// Accepted with probability `min(1, exp((1/Ti - 1/Tj)(Ui - Uj)))`
    /// where `U` is each simulation's internal energy. Returns whether
    /// the swap happened.
    pub fn attempt_swap(&mut self, i: usize, j: usize) -> Result<bool, ReplicaError> {
        let n = self.slots.len();
        for slot in [i, j] {
            if slot >= n {
                return Err(ReplicaError::UnknownSlot { slot });
            }
        }
        if i == j {
            return Ok(false);
        }
        self.slots[i].attempts += 1;
        self.slots[j].attempts += 1;

        let (a, b) = (&self.slots[i], &self.slots[j]);
        let exponent = (1.0 / a.temperature - 1.0 / b.temperature)
            * (a.sim.internal_energy() - b.sim.internal_energy());
        let probability = exponent.exp();
        if probability <= self.rng.random::<f64>() {
            return Ok(false);
        }
        self.swap(i, j)?;
        self.slots[i].swaps += 1;
        self.slots[j].swaps += 1;
        Ok(true)
    }

    /// Exchange the simulations in slots `i` and `j` unconditionally and
    /// rescale each one's velocities to its new temperature.
    pub fn swap(&mut self, i: usize, j: usize) -> Result<(), ReplicaError> {
        let n = self.slots.len();
        for slot in [i, j] {
            if slot >= n {
                return Err(ReplicaError::UnknownSlot { slot });
            }
        }
        if i == j {
            return Ok(());
        }
        let (lo, hi) = (i.min(j), i.max(j));
        let (left, right) = self.slots.split_at_mut(hi);
        let (a, b) = (&mut left[lo], &mut right[0]);
        mem::swap(&mut a.sim, &mut b.sim);

        let (t_lo, t_hi) = (a.temperature, b.temperature);
        for (slot, sim, factor) in [
            (lo, &mut a.sim, (t_lo / t_hi).sqrt()),
            (hi, &mut b.sim, (t_hi / t_lo).sqrt()),
        ] {
            if factor != 1.0 {
                sim.rescale_velocities(factor)
                    .map_err(|error| ReplicaError::Run { slot, error })?;
            }
        }
        info!(lo, hi, t_lo, t_hi, "replicas swapped");
        Ok(())
    }
}

impl fmt::Debug for ReplicaExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaExchange")
            .field("temperatures", &self.temperatures())
            .field("mode", &self.mode)
            .field("segment_time", &self.segment_time)
            .field("rounds", &self.rounds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use ricochet_predict::{PredictorTable, PropertyTable};
    use ricochet_space::Periodic;
    use ricochet_test_utils::{lattice_gas, HardSphere};

    fn gas(seed: u64, speed: f64) -> Simulation {
        let mut predictor = PredictorTable::new();
        predictor.add_interaction(HardSphere::new(1.0)).unwrap();
        let cfg = SimulationConfig::new(
            lattice_gas(27, 9.0, speed, seed),
            Periodic::cube(9.0).unwrap(),
            PropertyTable::single("bulk", 1.0).unwrap(),
            predictor,
        );
        Simulation::new(cfg).unwrap()
    }

    fn exchange(temps: &[f64], mode: SwapMode) -> ReplicaExchange {
        let replicas = temps
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, gas(i as u64, t.sqrt())))
            .collect();
        let config = ReplicaConfig {
            mode,
            ..ReplicaConfig::default()
        };
        ReplicaExchange::new(replicas, &config).unwrap()
    }

    fn attempts(rx: &ReplicaExchange) -> Vec<u64> {
        rx.stats().iter().map(|s| s.attempts).collect()
    }

    #[test]
    fn slots_are_sorted_by_temperature() {
        let rx = exchange(&[2.0, 0.5, 1.0], SwapMode::NoSwapping);
        assert_eq!(rx.temperatures(), vec![0.5, 1.0, 2.0]);
        assert_eq!(rx.len(), 3);
    }

    #[test]
    fn construction_rejects_bad_input() {
        match ReplicaExchange::new(Vec::new(), &ReplicaConfig::default()) {
            Err(ReplicaError::NoReplicas) => {}
            other => panic!("expected NoReplicas, got {other:?}"),
        }
        match ReplicaExchange::new(vec![(-1.0, gas(0, 1.0))], &ReplicaConfig::default()) {
            Err(ReplicaError::InvalidTemperature { temperature }) => assert_eq!(temperature, -1.0),
            other => panic!("expected InvalidTemperature, got {other:?}"),
        }
        let config = ReplicaConfig {
            segment_time: 0.0,
            ..ReplicaConfig::default()
        };
        match ReplicaExchange::new(vec![(1.0, gas(0, 1.0))], &config) {
            Err(ReplicaError::InvalidSegment { .. }) => {}
            other => panic!("expected InvalidSegment, got {other:?}"),
        }
    }

    #[test]
    fn swap_moves_whole_simulations() {
        let mut rx = exchange(&[1.0, 1.0], SwapMode::NoSwapping);
        rx.simulation_mut(0).unwrap().run_until(0.5).unwrap();
        let before: Vec<(u64, f64)> = (0..2)
            .map(|i| {
                let s = rx.simulation(i).unwrap();
                (s.event_count(), s.system_time())
            })
            .collect();
        rx.swap(0, 1).unwrap();
        let after: Vec<(u64, f64)> = (0..2)
            .map(|i| {
                let s = rx.simulation(i).unwrap();
                (s.event_count(), s.system_time())
            })
            .collect();
        assert_eq!(after, vec![before[1], before[0]]);
    }

    #[test]
    fn swap_rescales_to_the_new_temperature() {
        let mut rx = exchange(&[1.0, 4.0], SwapMode::NoSwapping);
        let ke_cold = rx.simulation(0).unwrap().kinetic_energy();
        let ke_hot = rx.simulation(1).unwrap().kinetic_energy();
        rx.swap(0, 1).unwrap();
        let now_cold = rx.simulation(0).unwrap().kinetic_energy();
        let now_hot = rx.simulation(1).unwrap().kinetic_energy();
        assert!((now_cold - ke_hot / 4.0).abs() < 1e-9 * ke_hot);
        assert!((now_hot - ke_cold * 4.0).abs() < 1e-9 * ke_hot);
    }

    #[test]
    fn hard_spheres_always_accept() {
        let mut rx = exchange(&[1.0, 2.0], SwapMode::NoSwapping);
        assert!(rx.attempt_swap(0, 1).unwrap());
        let stats = rx.stats();
        assert_eq!((stats[0].attempts, stats[0].swaps), (1, 1));
        assert_eq!((stats[1].attempts, stats[1].swaps), (1, 1));
        assert_eq!(stats[0].acceptance_ratio(), 1.0);
    }

    #[test]
    fn alternating_sequence_alternates_start() {
        let mut rx = exchange(&[1.0, 2.0, 3.0], SwapMode::AlternatingSequence);
        rx.exchange().unwrap();
        assert_eq!(attempts(&rx), vec![1, 1, 0]);
        rx.exchange().unwrap();
        assert_eq!(attempts(&rx), vec![1, 2, 1]);
    }

    #[test]
    fn random_pairs_makes_five_attempts_per_replica() {
        let mut rx = exchange(&[1.0, 2.0, 3.0], SwapMode::RandomPairs);
        rx.exchange().unwrap();
        assert_eq!(attempts(&rx).iter().sum::<u64>(), 2 * 5 * 3);
    }

    #[test]
    fn single_pair_with_two_replicas_tries_both() {
        let mut rx = exchange(&[1.0, 2.0], SwapMode::SinglePair);
        rx.exchange().unwrap();
        assert_eq!(attempts(&rx), vec![1, 1]);
    }

    #[test]
    fn no_swapping_never_attempts() {
        let mut rx = exchange(&[1.0, 2.0], SwapMode::NoSwapping);
        rx.round().unwrap();
        assert_eq!(attempts(&rx), vec![0, 0]);
        assert_eq!(rx.rounds(), 1);
    }

    #[test]
    fn rounds_advance_every_replica() {
        let mut rx = exchange(&[1.0, 2.0], SwapMode::AlternatingSequence);
        rx.run(3).unwrap();
        for i in 0..2 {
            let t = rx.simulation(i).unwrap().system_time();
            assert!((t - 3.0).abs() < 1e-12, "slot {i} at t={t}");
        }
    }

    #[test]
    fn unknown_slot_is_an_error() {
        let mut rx = exchange(&[1.0, 2.0], SwapMode::NoSwapping);
        match rx.swap(0, 5) {
            Err(ReplicaError::UnknownSlot { slot: 5 }) => {}
            other => panic!("expected UnknownSlot, got {other:?}"),
        }
    }
}
