//! Headless game simulation: waves, combat outcomes and economy end to end.

use serde::{Deserialize, Serialize};
use sim_combat::{CombatModel, Encounter, Outcome};
use sim_core::{ProgressGranularity, SimulationConfig, StatsProvider, Wave, WaveSet};
use sim_econ::{kill_reward, EconomyState};
use tracing::{debug, info, warn};

use crate::metrics::{difficulty_rating, WaveMetrics};
use crate::round::{RoundController, RoundPhase, RoundRules};
use crate::scheduler::{SchedulerEvent, SpawnEvent, WaveScheduler};

/// Snapshot handed to the progress sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub current_wave: u32,
    pub total_waves: u32,
    pub current_gold: u32,
    pub remaining_lives: u32,
    /// Enemies resolved so far in the current wave.
    pub enemies_processed: u32,
}

/// Synchronous observer invoked inline while a run progresses.
pub trait ProgressSink {
    fn on_progress(&mut self, progress: &SimulationProgress);
}

impl<F: FnMut(&SimulationProgress)> ProgressSink for F {
    fn on_progress(&mut self, progress: &SimulationProgress) {
        self(progress)
    }
}

/// Sink that drops every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _progress: &SimulationProgress) {}
}

/// Outcome of one run. Defeat and configuration problems are data, not errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario_name: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    /// Virtual seconds across all attempted waves.
    pub simulation_duration: f64,
    pub final_money: u32,
    pub final_lives: u32,
    pub final_score: u64,
    pub total_waves_attempted: u32,
    pub total_waves_completed: u32,
    pub wave_results: Vec<WaveMetrics>,
}

/// Runs a whole wave set without rendering.
///
/// The runner itself is immutable; every call to [`run`] builds a fresh
/// economy, round controller and scheduler, so one runner can be shared by
/// sequential runs and separate runners can work in parallel.
///
/// [`run`]: GameSimRunner::run
pub struct GameSimRunner<'a, S: StatsProvider + ?Sized> {
    config: SimulationConfig,
    wave_set: &'a WaveSet,
    stats: &'a S,
}

impl<'a, S: StatsProvider + ?Sized> GameSimRunner<'a, S> {
    pub fn new(config: SimulationConfig, wave_set: &'a WaveSet, stats: &'a S) -> Self {
        Self {
            config,
            wave_set,
            stats,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of waves a run will attempt.
    pub fn planned_waves(&self) -> u32 {
        self.config.max_waves.min(self.wave_set.total_waves())
    }

    /// Simulate until victory, defeat, or a configuration failure.
    pub fn run(
        &self,
        combat: &mut dyn CombatModel,
        sink: &mut dyn ProgressSink,
    ) -> SimulationResult {
        let money = self
            .config
            .starting_money
            .unwrap_or(self.wave_set.initial_money);
        let lives = self
            .config
            .starting_lives
            .unwrap_or(self.wave_set.initial_lives);
        let mut run = RunState {
            economy: EconomyState::new(money, lives),
            rounds: RoundController::new(RoundRules {
                bonus_per_round: self.config.round_bonus_per_round,
                ..RoundRules::default()
            }),
            waves: Vec::new(),
            duration: 0.0,
            completed: 0,
        };

        if let Err(e) = self.config.validate() {
            return run.finish(&self.config, Some(format!("invalid configuration: {e}")));
        }
        // a configured starting life count replaces the set's own
        let checked = match self.config.starting_lives {
            Some(_) => self.wave_set.validate_waves(),
            None => self.wave_set.validate(),
        };
        if let Err(e) = checked {
            return run.finish(&self.config, Some(format!("invalid wave set: {e}")));
        }
        let planned = self.planned_waves();
        if planned == 0 {
            warn!(set = %self.wave_set.set_name, "no waves to simulate");
            return run.finish(&self.config, Some("no waves configured".to_string()));
        }
        info!(
            scenario = %self.config.scenario_name,
            combat = combat.name(),
            waves = planned,
            money,
            lives,
            seed = self.config.random_seed,
            "simulation started"
        );

        combat.reseed(self.config.random_seed);
        let mut scheduler = WaveScheduler::new();
        for wave_number in 1..=planned {
            let Some(source) = self.wave_set.wave(wave_number) else {
                return run.finish(&self.config, Some(format!("wave {wave_number} missing")));
            };
            let working = source.working_copy(self.config.enemy_count_multiplier);
            if !scheduler.start(&working) {
                return run.finish(
                    &self.config,
                    Some(format!("wave {wave_number} could not be started")),
                );
            }
            if !run
                .rounds
                .start_round_with_total(wave_number, working.total_enemies())
            {
                return run.finish(
                    &self.config,
                    Some(format!("round {wave_number} could not be started")),
                );
            }

            let mut tally = WaveTally::new(&working);
            let status =
                self.play_wave(&working, &mut scheduler, combat, sink, &mut run, &mut tally);
            run.waves.push(tally.to_metrics(&working));
            run.duration += run.waves.last().map_or(0.0, |w| w.wave_duration);

            match status {
                WaveEnd::Cleared => {
                    run.completed += 1;
                    info!(
                        wave = wave_number,
                        money = run.economy.money(),
                        lives = run.economy.lives(),
                        "wave cleared"
                    );
                    sink.on_progress(&run.progress(wave_number, planned, tally.processed));
                }
                WaveEnd::Defeated => {
                    info!(wave = wave_number, "lives exhausted");
                    sink.on_progress(&run.progress(wave_number, planned, tally.processed));
                    return run.finish(
                        &self.config,
                        Some(format!("lives exhausted during wave {wave_number}")),
                    );
                }
                WaveEnd::Aborted(reason) => {
                    warn!(wave = wave_number, %reason, "simulation aborted");
                    return run.finish(&self.config, Some(reason));
                }
            }
        }
        run.finish(&self.config, None)
    }

    fn play_wave(
        &self,
        wave: &Wave,
        scheduler: &mut WaveScheduler,
        combat: &mut dyn CombatModel,
        sink: &mut dyn ProgressSink,
        run: &mut RunState,
        tally: &mut WaveTally,
    ) -> WaveEnd {
        let tick = f64::from(self.config.tick_seconds);
        let mut events = Vec::new();
        loop {
            // Skip idle ticks in one step, landing on the first tick at or past the next spawn.
            let step = match scheduler.next_spawn_in() {
                Some(wait) if !wait.is_finite() => {
                    return WaveEnd::Aborted(format!(
                        "wave {} has no finite next spawn time",
                        wave.wave_number
                    ));
                }
                Some(wait) if wait > tick => (wait / tick).ceil() * tick,
                _ => tick,
            };
            scheduler.advance(step, &mut events);
            run.rounds.tick(step);
            for event in events.drain(..) {
                match event {
                    SchedulerEvent::Spawn(spawn) => {
                        if let Err(reason) = self.resolve_spawn(wave, &spawn, combat, run, tally) {
                            return WaveEnd::Aborted(reason);
                        }
                        if self.config.progress == ProgressGranularity::PerSpawn {
                            sink.on_progress(&run.progress(
                                wave.wave_number,
                                self.planned_waves(),
                                tally.processed,
                            ));
                        }
                        if run.economy.is_defeated() {
                            return WaveEnd::Defeated;
                        }
                    }
                    SchedulerEvent::WaveCompleted { total_spawned, .. } => {
                        debug!(wave = wave.wave_number, total_spawned, "all enemies resolved");
                        run.economy.add_money(wave.bonus_money);
                        tally.money_earned = tally.money_earned.saturating_add(wave.bonus_money);
                        if run.rounds.phase() == RoundPhase::Active {
                            if let Some(bonus) = run.rounds.complete_round(&mut run.economy) {
                                tally.money_earned = tally.money_earned.saturating_add(bonus);
                            }
                        }
                        return WaveEnd::Cleared;
                    }
                }
            }
        }
    }

    fn resolve_spawn(
        &self,
        wave: &Wave,
        spawn: &SpawnEvent,
        combat: &mut dyn CombatModel,
        run: &mut RunState,
        tally: &mut WaveTally,
    ) -> Result<(), String> {
        let group = &wave.enemy_groups[spawn.group_index];
        let base = self
            .stats
            .enemy_stats(&spawn.enemy_type)
            .ok_or_else(|| format!("unknown enemy type: {}", spawn.enemy_type))?;
        let stats = base
            .with_multipliers(
                group.health_multiplier * self.config.enemy_health_multiplier,
                group.speed_multiplier * self.config.enemy_speed_multiplier,
            )
            .map_err(|e| format!("invalid stats for {}: {e}", spawn.enemy_type))?;
        let encounter = Encounter {
            wave_number: spawn.wave_number,
            spawn_index: spawn.spawn_index,
            enemy_type: &spawn.enemy_type,
            stats: &stats,
            path_length: self.config.path_length,
        };
        let outcome = combat.resolve(&encounter).map_err(|e| e.to_string())?;

        tally.processed += 1;
        tally.threat_sum += stats.threat_level();
        tally.last_exit = tally
            .last_exit
            .max(spawn.time + encounter.traversal_time());
        match outcome {
            Outcome::Defeated => {
                let reward = kill_reward(&stats, group.money_reward, self.config.score_multiplier)
                    .map_err(|e| e.to_string())?;
                run.economy.add_money(reward.money);
                run.economy.add_score(reward.score);
                tally.killed += 1;
                tally.money_earned = tally.money_earned.saturating_add(reward.money);
                if let Some(bonus) = run.rounds.on_enemy_defeated(&mut run.economy) {
                    tally.money_earned = tally.money_earned.saturating_add(bonus);
                }
            }
            Outcome::Leaked => {
                run.economy.lose_life();
                tally.lives_lost += 1;
                // a lost run never completes its round
                if !run.economy.is_defeated() {
                    if let Some(bonus) = run.rounds.on_enemy_leaked(&mut run.economy) {
                        tally.money_earned = tally.money_earned.saturating_add(bonus);
                    }
                }
            }
        }
        debug!(
            wave = spawn.wave_number,
            index = spawn.spawn_index,
            enemy = %spawn.enemy_type,
            ?outcome,
            money = run.economy.money(),
            lives = run.economy.lives(),
            "enemy resolved"
        );
        Ok(())
    }
}

enum WaveEnd {
    Cleared,
    Defeated,
    Aborted(String),
}

struct RunState {
    economy: EconomyState,
    rounds: RoundController,
    waves: Vec<WaveMetrics>,
    duration: f64,
    completed: u32,
}

impl RunState {
    fn progress(&self, wave: u32, total_waves: u32, processed: u32) -> SimulationProgress {
        SimulationProgress {
            current_wave: wave,
            total_waves,
            current_gold: self.economy.money(),
            remaining_lives: self.economy.lives(),
            enemies_processed: processed,
        }
    }

    fn finish(self, config: &SimulationConfig, failure_reason: Option<String>) -> SimulationResult {
        let success = failure_reason.is_none() && !self.economy.is_defeated();
        info!(
            success,
            money = self.economy.money(),
            lives = self.economy.lives(),
            waves = self.waves.len(),
            "simulation finished"
        );
        SimulationResult {
            scenario_name: config.scenario_name.clone(),
            success,
            failure_reason,
            simulation_duration: self.duration,
            final_money: self.economy.money(),
            final_lives: self.economy.lives(),
            final_score: self.economy.score(),
            total_waves_attempted: u32::try_from(self.waves.len()).unwrap_or(u32::MAX),
            total_waves_completed: self.completed,
            wave_results: self.waves,
        }
    }
}

/// Running counters for the wave in flight.
struct WaveTally {
    processed: u32,
    killed: u32,
    lives_lost: u32,
    money_earned: u32,
    threat_sum: f64,
    last_exit: f64,
}

impl WaveTally {
    fn new(wave: &Wave) -> Self {
        Self {
            processed: 0,
            killed: 0,
            lives_lost: 0,
            money_earned: 0,
            threat_sum: 0.0,
            last_exit: f64::from(wave.pre_wave_delay),
        }
    }

    fn to_metrics(&self, wave: &Wave) -> WaveMetrics {
        let average_threat = if self.processed == 0 {
            0.0
        } else {
            self.threat_sum / f64::from(self.processed)
        };
        WaveMetrics {
            wave_number: wave.wave_number,
            wave_name: wave.wave_name.clone(),
            wave_duration: self.last_exit + f64::from(wave.post_wave_delay),
            total_enemies: self.processed,
            enemies_killed: self.killed,
            enemies_leaked: self.processed - self.killed,
            lives_lost: self.lives_lost,
            money_earned: self.money_earned,
            difficulty_rating: difficulty_rating(
                self.processed,
                self.killed,
                self.lives_lost,
                average_threat,
            ),
        }
    }
}
