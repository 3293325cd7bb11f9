use serde::{Deserialize, Serialize};

use crate::{ensure_non_negative, ensure_positive, ValidationError};

/// How often the engine reports progress to its sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressGranularity {
    #[default]
    PerWave,
    PerSpawn,
}

/// Simulation configuration parameters for one headless run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Label carried into reports.
    pub scenario_name: String,
    /// Upper bound on waves attempted; the wave set may hold fewer.
    pub max_waves: u32,
    /// Overrides the wave set's initial money when set.
    pub starting_money: Option<u32>,
    /// Overrides the wave set's initial lives when set.
    pub starting_lives: Option<u32>,
    pub enemy_health_multiplier: f32,
    pub enemy_count_multiplier: f32,
    pub enemy_speed_multiplier: f32,
    /// Weight of enemy XP in the score awarded per kill.
    pub score_multiplier: f32,
    /// Seed for deterministic combat resolution.
    pub random_seed: u64,
    /// Name of the generated wave set ("easy", "normal", "hard").
    pub wave_set_difficulty: String,
    /// Virtual clock step in seconds.
    pub tick_seconds: f32,
    /// Path length in world units; traversal time is `path_length / speed`.
    pub path_length: f32,
    /// Round completion bonus factor (`round * factor`), 0 disables it.
    pub round_bonus_per_round: u32,
    pub progress: ProgressGranularity,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scenario_name: "default".to_string(),
            max_waves: 10,
            starting_money: None,
            starting_lives: None,
            enemy_health_multiplier: 1.0,
            enemy_count_multiplier: 1.0,
            enemy_speed_multiplier: 1.0,
            score_multiplier: 1.0,
            random_seed: 42,
            wave_set_difficulty: "normal".to_string(),
            tick_seconds: 0.1,
            path_length: 1000.0,
            round_bonus_per_round: 0,
            progress: ProgressGranularity::PerWave,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_positive("enemy_health_multiplier", self.enemy_health_multiplier)?;
        ensure_positive("enemy_count_multiplier", self.enemy_count_multiplier)?;
        ensure_positive("enemy_speed_multiplier", self.enemy_speed_multiplier)?;
        ensure_positive("tick_seconds", self.tick_seconds)?;
        ensure_positive("path_length", self.path_length)?;
        ensure_non_negative("score_multiplier", self.score_multiplier)?;
        if self.starting_lives == Some(0) {
            return Err(ValidationError::NoLives);
        }
        Ok(())
    }
}
