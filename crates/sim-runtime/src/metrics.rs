//! Per-wave outcomes and run-level aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SimulationResult;

/// Threat level at which the threat component of the difficulty rating saturates.
pub const THREAT_REFERENCE: f64 = 100.0;
/// Upper bound of the difficulty rating.
pub const MAX_DIFFICULTY: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveStatus {
    /// Every enemy was defeated.
    Successful,
    /// More kills than leaks.
    PartialSuccess,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveMetrics {
    pub wave_number: u32,
    pub wave_name: String,
    /// Virtual seconds from wave start until the last enemy left the field.
    pub wave_duration: f64,
    /// Enemies processed in this wave; lower than configured for a wave cut short.
    pub total_enemies: u32,
    pub enemies_killed: u32,
    pub enemies_leaked: u32,
    pub lives_lost: u32,
    /// Kill rewards plus any completion bonuses.
    pub money_earned: u32,
    pub difficulty_rating: f32,
}

impl WaveMetrics {
    pub fn completion_rate(&self) -> f64 {
        if self.total_enemies == 0 {
            return 1.0;
        }
        f64::from(self.enemies_killed) / f64::from(self.total_enemies)
    }

    pub fn status(&self) -> WaveStatus {
        if self.enemies_killed == self.total_enemies {
            WaveStatus::Successful
        } else if self.enemies_killed > self.enemies_leaked {
            WaveStatus::PartialSuccess
        } else {
            WaveStatus::Failed
        }
    }
}

/// 0–5 rating from completion, lives lost and average enemy threat.
///
/// `2.5 * (1 - completion) + 1.5 * leak_pressure + 1.0 * threat`, where
/// leak pressure is lives lost per enemy and threat is the average threat
/// level over [`THREAT_REFERENCE`], both capped at 1. Empty waves rate 0.
pub fn difficulty_rating(
    total_enemies: u32,
    enemies_killed: u32,
    lives_lost: u32,
    average_threat: f64,
) -> f32 {
    if total_enemies == 0 {
        return 0.0;
    }
    let total = f64::from(total_enemies);
    let completion = (f64::from(enemies_killed) / total).min(1.0);
    let leak_pressure = (f64::from(lives_lost) / total).min(1.0);
    let threat = if average_threat.is_finite() {
        (average_threat / THREAT_REFERENCE).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let rating = 2.5 * (1.0 - completion) + 1.5 * leak_pressure + threat;
    (rating as f32).clamp(0.0, MAX_DIFFICULTY)
}

/// `100 * sqrt(completion * (1 - difficulty / 5))`.
///
/// Increases with completion and decreases with difficulty.
pub fn balance_score(completion_rate: f64, average_difficulty: f64) -> f64 {
    let completion = completion_rate.clamp(0.0, 1.0);
    let ease = 1.0 - (average_difficulty / f64::from(MAX_DIFFICULTY)).clamp(0.0, 1.0);
    100.0 * (completion * ease).sqrt()
}

/// Run-level aggregate derived from a finished [`SimulationResult`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub scenario_name: String,
    pub total_duration: f64,
    pub total_waves_attempted: u32,
    pub total_waves_completed: u32,
    pub overall_success: bool,
    pub overall_completion_rate: f64,
    pub average_difficulty_rating: f64,
    pub wave_metrics: Vec<WaveMetrics>,
    pub custom_metrics: BTreeMap<String, f64>,
}

impl SimulationMetrics {
    pub fn balance_score(&self) -> f64 {
        self.custom_metrics
            .get("balance_score")
            .copied()
            .unwrap_or(0.0)
    }
}

/// Aggregate a result into run-level metrics. Pure; repeated calls agree.
pub fn summarize(result: &SimulationResult) -> SimulationMetrics {
    let waves = &result.wave_results;
    let total_enemies: u64 = waves.iter().map(|w| u64::from(w.total_enemies)).sum();
    let total_kills: u64 = waves.iter().map(|w| u64::from(w.enemies_killed)).sum();
    let total_lives_lost: u64 = waves.iter().map(|w| u64::from(w.lives_lost)).sum();
    let total_money: u64 = waves.iter().map(|w| u64::from(w.money_earned)).sum();

    let overall_completion_rate = if total_enemies > 0 {
        total_kills as f64 / total_enemies as f64
    } else if waves.is_empty() {
        0.0
    } else {
        1.0
    };
    let average_difficulty_rating = if waves.is_empty() {
        0.0
    } else {
        waves
            .iter()
            .map(|w| f64::from(w.difficulty_rating))
            .sum::<f64>()
            / waves.len() as f64
    };

    let mut custom_metrics = BTreeMap::new();
    custom_metrics.insert(
        "balance_score".to_string(),
        balance_score(overall_completion_rate, average_difficulty_rating),
    );
    custom_metrics.insert("total_enemies".to_string(), total_enemies as f64);
    custom_metrics.insert("total_kills".to_string(), total_kills as f64);
    custom_metrics.insert("total_lives_lost".to_string(), total_lives_lost as f64);
    custom_metrics.insert("total_money_earned".to_string(), total_money as f64);
    custom_metrics.insert("final_score".to_string(), result.final_score as f64);

    SimulationMetrics {
        scenario_name: result.scenario_name.clone(),
        total_duration: result.simulation_duration,
        total_waves_attempted: result.total_waves_attempted,
        total_waves_completed: result.total_waves_completed,
        overall_success: result.success,
        overall_completion_rate,
        average_difficulty_rating,
        wave_metrics: waves.clone(),
        custom_metrics,
    }
}
