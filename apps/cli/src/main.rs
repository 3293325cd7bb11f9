#![deny(warnings)]

//! Headless CLI: runs one balance simulation and prints or exports the outcome.

mod args;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use modkit::load_combat_mod;
use persistence::{save_archive, write_json_report, write_markdown_report, BuildInfo, RunArchive, RunReport};
use sim_combat::{CombatModel, SeededKillChance, TowerCoverage};
use sim_core::{ProgressGranularity, SimulationConfig, StatsTable, WaveSet};
use sim_data::{
    default_stats_table, generate_wave_set, load_sim_config, load_stats_table,
    load_wave_set_or_default, Difficulty,
};
use sim_runtime::{summarize, GameSimRunner, SimulationMetrics, SimulationProgress, SimulationResult};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::args::{parse_args, Args, CombatChoice, USAGE};

fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_sha: env!("GIT_SHA").to_string(),
    }
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => load_sim_config(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }
    if let Some(max) = args.max_waves {
        config.max_waves = max;
    }
    if let Some(difficulty) = &args.difficulty {
        config.wave_set_difficulty = difficulty.clone();
    }
    if args.per_spawn {
        config.progress = ProgressGranularity::PerSpawn;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_waves(args: &Args, config: &SimulationConfig) -> Result<WaveSet> {
    if let Some(path) = &args.waves {
        return Ok(load_wave_set_or_default(path));
    }
    let difficulty: Difficulty = config.wave_set_difficulty.parse()?;
    let count = args.waves_count.unwrap_or(config.max_waves);
    Ok(generate_wave_set(difficulty, count))
}

fn load_stats(args: &Args) -> Result<StatsTable> {
    Ok(match &args.stats {
        Some(path) => load_stats_table(path)
            .with_context(|| format!("loading stats {}", path.display()))?,
        None => default_stats_table().context("built-in stats table")?,
    })
}

fn combat_model(
    choice: &CombatChoice,
    stats: &StatsTable,
    seed: u64,
) -> Result<Box<dyn CombatModel>> {
    Ok(match choice {
        CombatChoice::KillChance(p) => Box::new(SeededKillChance::new(*p, seed)?),
        CombatChoice::Coverage(layout) => {
            let model = TowerCoverage::from_layout(stats, layout, seed)?;
            info!(buildings = model.defenses().len(), cost = model.build_cost(), "tower layout");
            Box::new(model)
        }
        CombatChoice::Script(dir) => Box::new(
            load_combat_mod(dir, seed)
                .with_context(|| format!("loading combat mod {}", dir.display()))?,
        ),
    })
}

fn print_progress(p: &SimulationProgress) {
    println!(
        "wave {:>3}/{:<3} | gold {:>6} | lives {:>3} | processed {:>4}",
        p.current_wave, p.total_waves, p.current_gold, p.remaining_lives, p.enemies_processed
    );
}

fn print_summary(result: &SimulationResult, metrics: &SimulationMetrics) {
    println!();
    println!(
        "{:>4} | {:<20} | {:>7} | {:>6} | {:>6} | {:>6} | {:>5}",
        "wave", "name", "enemies", "killed", "leaked", "money", "diff"
    );
    for w in &metrics.wave_metrics {
        println!(
            "{:>4} | {:<20} | {:>7} | {:>6} | {:>6} | {:>6} | {:>5.2}",
            w.wave_number,
            w.wave_name,
            w.total_enemies,
            w.enemies_killed,
            w.enemies_leaked,
            w.money_earned,
            w.difficulty_rating
        );
    }
    println!();
    println!(
        "Run {} | waves: {}/{} | money: {} | lives: {} | score: {} | completion: {:.1}% | difficulty: {:.2} | balance: {:.1}",
        if result.success { "OK" } else { "FAILED" },
        result.total_waves_completed,
        result.total_waves_attempted,
        result.final_money,
        result.final_lives,
        result.final_score,
        metrics.overall_completion_rate * 100.0,
        metrics.average_difficulty_rating,
        metrics.balance_score()
    );
    if let Some(reason) = &result.failure_reason {
        println!("Failure: {reason}");
    }
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if markdown {
        write_markdown_report(path, report)?;
    } else {
        write_json_report(path, report)?;
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }
    let build = build_info();
    info!(version = %build.version, sha = %build.git_sha, built = env!("BUILD_DATE"), "starting CLI");

    let config = load_config(&args)?;
    let waves = load_waves(&args, &config)?;
    let stats = load_stats(&args)?;
    let mut combat = combat_model(&args.combat, &stats, config.random_seed)?;
    info!(
        scenario = %config.scenario_name,
        set = %waves.set_name,
        waves = waves.total_waves(),
        combat = combat.name(),
        "configured"
    );

    let started = Utc::now();
    let runner = GameSimRunner::new(config.clone(), &waves, &stats);
    let mut progress = |p: &SimulationProgress| print_progress(p);
    let result = runner.run(combat.as_mut(), &mut progress);
    let elapsed = Utc::now() - started;
    info!(ms = elapsed.num_milliseconds(), "run finished");

    let metrics = summarize(&result);
    print_summary(&result, &metrics);

    if let Some(path) = &args.report {
        let report = RunReport::new(build, config.clone(), result.clone());
        write_report(path, &report).with_context(|| format!("writing report {}", path.display()))?;
    }
    if let Some(path) = &args.archive {
        save_archive(path, &RunArchive::new(config, result.clone()))
            .with_context(|| format!("writing archive {}", path.display()))?;
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
