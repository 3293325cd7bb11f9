#![deny(warnings)]

//! Economic models: money, lives and score bookkeeping for a simulated match.
//!
//! This module provides validated utilities for:
//! - The per-run economy state (spend, earn, lose lives, score)
//! - Kill rewards and round-completion bonuses
//! - Progressive difficulty curves used to scale generated wave sets

use serde::{Deserialize, Serialize};
use sim_core::EnemyStats;
use thiserror::Error;
use tracing::debug;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Multipliers and growth rates must be finite and non-negative.
    #[error("invalid multiplier: {0}")]
    InvalidMultiplier(f32),
}

/// Mutable money, lives and score for one run.
///
/// Owned by a single simulation; money can only go down through [`spend`]
/// and lives saturate at zero.
///
/// [`spend`]: EconomyState::spend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyState {
    money: u32,
    lives: u32,
    score: u64,
}

impl EconomyState {
    pub fn new(money: u32, lives: u32) -> Self {
        Self {
            money,
            lives,
            score: 0,
        }
    }

    pub fn money(&self) -> u32 {
        self.money
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    /// Deducts `amount` when affordable. Returns false and leaves money unchanged otherwise.
    pub fn spend(&mut self, amount: u32) -> bool {
        if amount > self.money {
            debug!(amount, money = self.money, "spend rejected: insufficient funds");
            return false;
        }
        self.money -= amount;
        true
    }

    pub fn add_money(&mut self, amount: u32) {
        self.money = self.money.saturating_add(amount);
    }

    /// Removes one life, never going below zero. Returns the remaining lives.
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    pub fn add_score(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }

    pub fn is_defeated(&self) -> bool {
        self.lives == 0
    }
}

/// Money and score earned by defeating one enemy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillReward {
    pub money: u32,
    pub score: u64,
}

/// Reward for a kill.
///
/// Money is the spawn group's override when present, otherwise the enemy's
/// gold reward. Score is `reward_gold + reward_xp * score_multiplier`, rounded.
pub fn kill_reward(
    stats: &EnemyStats,
    money_override: Option<u32>,
    score_multiplier: f32,
) -> Result<KillReward, EconError> {
    if !score_multiplier.is_finite() || score_multiplier < 0.0 {
        return Err(EconError::InvalidMultiplier(score_multiplier));
    }
    let money = money_override.unwrap_or_else(|| stats.reward_gold());
    let score = f64::from(stats.reward_gold())
        + f64::from(stats.reward_xp()) * f64::from(score_multiplier);
    Ok(KillReward {
        money,
        score: score.round() as u64,
    })
}

/// Round-completion bonus: `round * bonus_per_round`, saturating.
pub fn round_bonus(round: u32, bonus_per_round: u32) -> u32 {
    round.saturating_mul(bonus_per_round)
}

/// Linear per-wave growth applied when generating wave sets.
///
/// Wave 1 always uses the base values; wave `n` scales by `1 + growth * (n - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyCurve {
    pub health_growth: f32,
    pub speed_growth: f32,
    pub count_growth: f32,
    /// Completion bonus for wave 1; grows with `count_growth`.
    pub base_bonus: u32,
}

impl DifficultyCurve {
    pub fn new(
        health_growth: f32,
        speed_growth: f32,
        count_growth: f32,
        base_bonus: u32,
    ) -> Result<Self, EconError> {
        for g in [health_growth, speed_growth, count_growth] {
            if !g.is_finite() || g < 0.0 {
                return Err(EconError::InvalidMultiplier(g));
            }
        }
        Ok(Self {
            health_growth,
            speed_growth,
            count_growth,
            base_bonus,
        })
    }

    fn factor(growth: f32, wave_number: u32) -> f32 {
        1.0 + growth * wave_number.saturating_sub(1) as f32
    }

    pub fn health_multiplier(&self, wave_number: u32) -> f32 {
        Self::factor(self.health_growth, wave_number)
    }

    pub fn speed_multiplier(&self, wave_number: u32) -> f32 {
        Self::factor(self.speed_growth, wave_number)
    }

    /// Enemy count for a group with `base` enemies in wave 1.
    pub fn count(&self, base: u32, wave_number: u32) -> u32 {
        let scaled = f64::from(base) * f64::from(Self::factor(self.count_growth, wave_number));
        scaled.round().clamp(0.0, f64::from(u32::MAX)) as u32
    }

    pub fn bonus(&self, wave_number: u32) -> u32 {
        self.count(self.base_bonus, wave_number)
    }
}
