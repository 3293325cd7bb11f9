use sim_combat::{SeededKillChance, TowerCoverage};
use sim_core::SimulationConfig;
use sim_data::{default_stats_table, generate_wave_set, Difficulty};
use sim_runtime::{summarize, GameSimRunner, NoProgress, SimulationResult};

const DIFFICULTIES: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

fn config(waves: u32, seed: u64) -> SimulationConfig {
    SimulationConfig {
        max_waves: waves,
        random_seed: seed,
        ..SimulationConfig::default()
    }
}

fn run_coverage(difficulty: Difficulty, seed: u64) -> SimulationResult {
    let stats = default_stats_table().unwrap();
    let waves = generate_wave_set(difficulty, 15);
    let layout = vec![
        ("basic_turret".to_string(), 0.6),
        ("sniper_turret".to_string(), 0.4),
        ("cannon".to_string(), 0.3),
    ];
    let mut combat = TowerCoverage::from_layout(&stats, &layout, seed).unwrap();
    GameSimRunner::new(config(15, seed), &waves, &stats).run(&mut combat, &mut NoProgress)
}

#[test]
fn perfect_defense_clears_every_generated_set() {
    let stats = default_stats_table().unwrap();
    for difficulty in DIFFICULTIES {
        let waves = generate_wave_set(difficulty, 12);
        let mut combat = SeededKillChance::new(1.0, 1).unwrap();
        let result =
            GameSimRunner::new(config(12, 1), &waves, &stats).run(&mut combat, &mut NoProgress);
        assert!(result.success, "{difficulty}: {:?}", result.failure_reason);
        assert_eq!(result.total_waves_completed, 12);
        assert_eq!(result.final_lives, waves.initial_lives);
        assert!(result.final_money > waves.initial_money);
        let metrics = summarize(&result);
        assert_eq!(metrics.overall_completion_rate, 1.0);
    }
}

#[test]
fn coverage_runs_repeat_exactly() {
    for difficulty in DIFFICULTIES {
        assert_eq!(run_coverage(difficulty, 11), run_coverage(difficulty, 11));
    }
}

#[test]
fn coverage_runs_keep_accounting_consistent() {
    for difficulty in DIFFICULTIES {
        let result = run_coverage(difficulty, 5);
        assert!(result.total_waves_attempted <= 15);
        assert!(result.total_waves_completed <= result.total_waves_attempted);
        assert_eq!(result.wave_results.len() as u32, result.total_waves_attempted);
        for wave in &result.wave_results {
            assert_eq!(wave.enemies_killed + wave.enemies_leaked, wave.total_enemies);
            assert!((0.0..=5.0).contains(&wave.difficulty_rating));
        }
        if !result.success {
            assert_eq!(result.final_lives, 0);
        }
    }
}
