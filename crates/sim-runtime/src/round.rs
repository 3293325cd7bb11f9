//! Round phase controller: Preparation → Active ⇄ Paused → Complete.

use serde::{Deserialize, Serialize};
use sim_econ::{round_bonus, EconomyState};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Preparation,
    Active,
    Paused,
    Complete,
}

/// Per-round enemy totals, time budgets and bonuses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRules {
    pub base_enemy_count: u32,
    pub enemies_per_round: u32,
    /// Soft time budget in seconds for round 0.
    pub base_time: f32,
    pub time_per_round: f32,
    pub bonus_per_round: u32,
}

impl Default for RoundRules {
    fn default() -> Self {
        Self {
            base_enemy_count: 10,
            enemies_per_round: 5,
            base_time: 60.0,
            time_per_round: 10.0,
            bonus_per_round: 25,
        }
    }
}

impl RoundRules {
    pub fn enemies_for(&self, round: u32) -> u32 {
        self.base_enemy_count
            .saturating_add(round.saturating_mul(self.enemies_per_round))
    }

    pub fn time_for(&self, round: u32) -> f64 {
        f64::from(self.base_time) + f64::from(round) * f64::from(self.time_per_round)
    }
}

/// Caller-driven round state machine; does not auto-advance to the next round.
#[derive(Clone, Debug)]
pub struct RoundController {
    rules: RoundRules,
    phase: RoundPhase,
    round: u32,
    total_enemies: u32,
    enemies_remaining: u32,
    time_remaining: f64,
}

impl RoundController {
    pub fn new(rules: RoundRules) -> Self {
        Self {
            rules,
            phase: RoundPhase::Preparation,
            round: 0,
            total_enemies: 0,
            enemies_remaining: 0,
            time_remaining: 0.0,
        }
    }

    pub fn rules(&self) -> &RoundRules {
        &self.rules
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn current_round(&self) -> u32 {
        self.round
    }

    pub fn total_enemies(&self) -> u32 {
        self.total_enemies
    }

    pub fn enemies_remaining(&self) -> u32 {
        self.enemies_remaining
    }

    pub fn time_remaining(&self) -> f64 {
        self.time_remaining
    }

    /// Start `round` with the enemy total given by the rules.
    pub fn start_round(&mut self, round: u32) -> bool {
        let total = self.rules.enemies_for(round);
        self.start_round_with_total(round, total)
    }

    /// Start `round` with an externally known enemy total (e.g. a configured wave).
    pub fn start_round_with_total(&mut self, round: u32, total_enemies: u32) -> bool {
        if round == 0 {
            warn!("rejected round start: rounds are numbered from 1");
            return false;
        }
        if !matches!(self.phase, RoundPhase::Preparation | RoundPhase::Complete) {
            warn!(round, active = self.round, phase = ?self.phase, "rejected round start");
            return false;
        }
        self.round = round;
        self.total_enemies = total_enemies;
        self.enemies_remaining = total_enemies;
        self.time_remaining = self.rules.time_for(round);
        self.phase = RoundPhase::Active;
        info!(round, enemies = total_enemies, time = self.time_remaining, "round started");
        true
    }

    /// Count one defeated enemy; completes the round when none remain.
    ///
    /// Returns the bonus awarded if this call completed the round.
    pub fn on_enemy_defeated(&mut self, economy: &mut EconomyState) -> Option<u32> {
        self.enemy_removed(economy)
    }

    /// Count one enemy that left the field by reaching the end of the path.
    pub fn on_enemy_leaked(&mut self, economy: &mut EconomyState) -> Option<u32> {
        self.enemy_removed(economy)
    }

    fn enemy_removed(&mut self, economy: &mut EconomyState) -> Option<u32> {
        if self.phase != RoundPhase::Active {
            return None;
        }
        self.enemies_remaining = self.enemies_remaining.saturating_sub(1);
        if self.enemies_remaining == 0 {
            return self.complete_round(economy);
        }
        None
    }

    /// Active → Complete, awarding `round * bonus_per_round` exactly once.
    pub fn complete_round(&mut self, economy: &mut EconomyState) -> Option<u32> {
        if self.phase != RoundPhase::Active {
            warn!(round = self.round, phase = ?self.phase, "rejected round completion");
            return None;
        }
        self.phase = RoundPhase::Complete;
        self.enemies_remaining = 0;
        let bonus = round_bonus(self.round, self.rules.bonus_per_round);
        economy.add_money(bonus);
        info!(round = self.round, bonus, money = economy.money(), "round complete");
        Some(bonus)
    }

    pub fn pause_round(&mut self) -> bool {
        if self.phase != RoundPhase::Active {
            return false;
        }
        self.phase = RoundPhase::Paused;
        true
    }

    pub fn resume_round(&mut self) -> bool {
        if self.phase != RoundPhase::Paused {
            return false;
        }
        self.phase = RoundPhase::Active;
        true
    }

    /// Spend `dt` seconds of the soft time budget. Never ends the round.
    pub fn tick(&mut self, dt: f64) {
        if self.phase == RoundPhase::Active {
            self.time_remaining = (self.time_remaining - dt).max(0.0);
        }
    }
}
