#![deny(warnings)]

//! Combat resolution strategies for the headless simulator.
//!
//! Rendering-free stand-ins for what turrets, projectiles and path following
//! decide in a full game: for every spawned enemy a [`CombatModel`] answers
//! whether it was defeated or leaked. All bundled models are deterministic for
//! a given seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sim_core::{BuildingStats, EnemyStats, StatsProvider};
use thiserror::Error;
use tracing::trace;

/// Fraction of coverage kept by buildings that need line of sight.
pub const LINE_OF_SIGHT_FACTOR: f64 = 0.8;
/// Fraction of damage that lands on enemies with an immunity ability.
pub const IMMUNITY_DAMAGE_FACTOR: f64 = 0.75;
/// Maximum relative deviation applied to enemy health by [`TowerCoverage`].
pub const COVERAGE_JITTER: f64 = 0.1;

/// Errors produced while building or running a combat model.
#[derive(Debug, Error, PartialEq)]
pub enum CombatError {
    /// Kill probability must be within [0, 1].
    #[error("kill chance must be within [0,1], got {0}")]
    InvalidChance(f64),
    /// Path coverage must be within [0, 1].
    #[error("coverage for {building} must be within [0,1], got {coverage}")]
    InvalidCoverage { building: String, coverage: f32 },
    /// Building type missing from the stats provider.
    #[error("unknown building type: {0}")]
    UnknownBuilding(String),
    /// An external strategy failed to evaluate.
    #[error("combat strategy failed: {0}")]
    Strategy(String),
}

/// Result of one enemy's trip down the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Defeated,
    Leaked,
}

/// Everything a combat model may look at for one spawned enemy.
#[derive(Clone, Copy, Debug)]
pub struct Encounter<'a> {
    pub wave_number: u32,
    /// Position of the enemy in the wave's spawn order, starting at 0.
    pub spawn_index: u32,
    pub enemy_type: &'a str,
    /// Stats after all multipliers were applied.
    pub stats: &'a EnemyStats,
    pub path_length: f32,
}

impl Encounter<'_> {
    /// Seconds the enemy needs to walk the whole path.
    pub fn traversal_time(&self) -> f64 {
        f64::from(self.path_length) / f64::from(self.stats.speed())
    }
}

/// Pluggable combat resolution.
///
/// Runners call [`CombatModel::reseed`] before every run, so a model's
/// outcomes depend only on the run's seed and the encounters it sees.
pub trait CombatModel {
    fn name(&self) -> &str;

    /// Restart all internal randomness from `seed`.
    fn reseed(&mut self, seed: u64);

    fn resolve(&mut self, encounter: &Encounter<'_>) -> Result<Outcome, CombatError>;
}

impl<M: CombatModel + ?Sized> CombatModel for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reseed(&mut self, seed: u64) {
        (**self).reseed(seed)
    }

    fn resolve(&mut self, encounter: &Encounter<'_>) -> Result<Outcome, CombatError> {
        (**self).resolve(encounter)
    }
}

/// Defeats each enemy with a fixed probability drawn from a seeded RNG.
///
/// A chance of 1.0 defeats every enemy and 0.0 leaks every enemy.
#[derive(Clone, Debug)]
pub struct SeededKillChance {
    chance: f64,
    rng: ChaCha8Rng,
}

impl SeededKillChance {
    pub fn new(chance: f64, seed: u64) -> Result<Self, CombatError> {
        if !(0.0..=1.0).contains(&chance) {
            return Err(CombatError::InvalidChance(chance));
        }
        Ok(Self {
            chance,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn chance(&self) -> f64 {
        self.chance
    }
}

impl CombatModel for SeededKillChance {
    fn name(&self) -> &str {
        "kill-chance"
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn resolve(&mut self, encounter: &Encounter<'_>) -> Result<Outcome, CombatError> {
        let defeated = self.rng.gen_bool(self.chance);
        trace!(wave = encounter.wave_number, index = encounter.spawn_index, defeated, "kill roll");
        Ok(if defeated {
            Outcome::Defeated
        } else {
            Outcome::Leaked
        })
    }
}

/// A building placed next to the path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedBuilding {
    pub building_type: String,
    pub stats: BuildingStats,
    /// Fraction of the path inside the building's range.
    pub coverage: f32,
}

impl PlacedBuilding {
    /// Coverage after line-of-sight losses.
    pub fn effective_coverage(&self) -> f64 {
        let c = f64::from(self.coverage);
        if self.stats.variant().has_line_of_sight_check() {
            c * LINE_OF_SIGHT_FACTOR
        } else {
            c
        }
    }
}

/// Simplified tower-coverage heuristic.
///
/// Every building deals `dps * coverage * traversal_time` to each passing
/// enemy; the enemy is defeated when the total reaches its health, which is
/// jittered by up to ±10% with a seeded RNG.
#[derive(Clone, Debug)]
pub struct TowerCoverage {
    defenses: Vec<PlacedBuilding>,
    rng: ChaCha8Rng,
}

impl TowerCoverage {
    pub fn new(defenses: Vec<PlacedBuilding>, seed: u64) -> Result<Self, CombatError> {
        for d in &defenses {
            if !(0.0..=1.0).contains(&d.coverage) {
                return Err(CombatError::InvalidCoverage {
                    building: d.building_type.clone(),
                    coverage: d.coverage,
                });
            }
        }
        Ok(Self {
            defenses,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Build a layout from `(building_type, coverage)` pairs.
    pub fn from_layout<P: StatsProvider + ?Sized>(
        provider: &P,
        layout: &[(String, f32)],
        seed: u64,
    ) -> Result<Self, CombatError> {
        let mut defenses = Vec::with_capacity(layout.len());
        for (building_type, coverage) in layout {
            let stats = provider
                .building_stats(building_type)
                .ok_or_else(|| CombatError::UnknownBuilding(building_type.clone()))?;
            defenses.push(PlacedBuilding {
                building_type: building_type.clone(),
                stats: stats.clone(),
                coverage: *coverage,
            });
        }
        Self::new(defenses, seed)
    }

    pub fn defenses(&self) -> &[PlacedBuilding] {
        &self.defenses
    }

    /// Total cost of the layout.
    pub fn build_cost(&self) -> u64 {
        self.defenses.iter().map(|d| u64::from(d.stats.cost())).sum()
    }

    /// Damage the layout deals to an enemy over its full traversal.
    pub fn expected_damage(&self, encounter: &Encounter<'_>) -> f64 {
        let time = encounter.traversal_time();
        let raw: f64 = self
            .defenses
            .iter()
            .map(|d| d.stats.damage_per_second() * d.effective_coverage() * time)
            .sum();
        if encounter.stats.variant().immune_while_ability_active() {
            raw * IMMUNITY_DAMAGE_FACTOR
        } else {
            raw
        }
    }
}

impl CombatModel for TowerCoverage {
    fn name(&self) -> &str {
        "tower-coverage"
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn resolve(&mut self, encounter: &Encounter<'_>) -> Result<Outcome, CombatError> {
        let damage = self.expected_damage(encounter);
        let jitter: f64 = self.rng.gen_range(-COVERAGE_JITTER..=COVERAGE_JITTER);
        let health = f64::from(encounter.stats.max_health()) * (1.0 + jitter);
        trace!(wave = encounter.wave_number, damage, health, "coverage check");
        Ok(if damage >= health {
            Outcome::Defeated
        } else {
            Outcome::Leaked
        })
    }
}
