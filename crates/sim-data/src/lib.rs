#![deny(warnings)]

//! Configuration loading for the simulator.
//!
//! Reads wave sets, stats tables and run configs from JSON or YAML, validates
//! them, and provides built-in defaults: the stats table shipped in
//! `assets/default_stats.yaml` and procedurally scaled wave sets.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use sim_core::{EnemySpawnGroup, SimulationConfig, StatsTable, ValidationError, Wave, WaveSet};
use sim_econ::DifficultyCurve;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_STATS: &str = include_str!("../assets/default_stats.yaml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Serialization format of a config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse any config record from text.
pub fn parse<T: DeserializeOwned>(text: &str, format: Format) -> Result<T, ConfigError> {
    Ok(match format {
        Format::Json => serde_json::from_str(text)?,
        Format::Yaml => serde_yaml::from_str(text)?,
    })
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text, format)
}

/// Load and validate a wave set.
pub fn load_wave_set(path: &Path) -> Result<WaveSet, ConfigError> {
    let set: WaveSet = load(path)?;
    set.validate()?;
    info!(path = %path.display(), set = %set.set_name, waves = set.waves.len(), "wave set loaded");
    Ok(set)
}

/// Load a wave set, falling back to the empty set on any error.
///
/// Callers should check `total_waves() == 0` before starting a run.
pub fn load_wave_set_or_default(path: &Path) -> WaveSet {
    match load_wave_set(path) {
        Ok(set) => set,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "falling back to empty wave set");
            WaveSet::default()
        }
    }
}

/// Load a stats table; stat invariants are checked while deserializing.
pub fn load_stats_table(path: &Path) -> Result<StatsTable, ConfigError> {
    let table: StatsTable = load(path)?;
    info!(
        path = %path.display(),
        enemies = table.enemies.len(),
        buildings = table.buildings.len(),
        "stats table loaded"
    );
    Ok(table)
}

/// Load and validate a run configuration. Missing fields take their defaults.
pub fn load_sim_config(path: &Path) -> Result<SimulationConfig, ConfigError> {
    let config: SimulationConfig = load(path)?;
    config.validate()?;
    Ok(config)
}

/// The built-in enemy and building stats.
pub fn default_stats_table() -> Result<StatsTable, ConfigError> {
    parse(DEFAULT_STATS, Format::Yaml)
}

/// Preset difficulty for generated wave sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ConfigError::UnknownDifficulty(other.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        };
        f.write_str(s)
    }
}

impl Difficulty {
    pub fn curve(self) -> DifficultyCurve {
        match self {
            Difficulty::Easy => DifficultyCurve {
                health_growth: 0.08,
                speed_growth: 0.01,
                count_growth: 0.10,
                base_bonus: 20,
            },
            Difficulty::Normal => DifficultyCurve {
                health_growth: 0.15,
                speed_growth: 0.02,
                count_growth: 0.15,
                base_bonus: 25,
            },
            Difficulty::Hard => DifficultyCurve {
                health_growth: 0.25,
                speed_growth: 0.03,
                count_growth: 0.25,
                base_bonus: 30,
            },
        }
    }

    /// Starting money and lives.
    pub fn starting_economy(self) -> (u32, u32) {
        match self {
            Difficulty::Easy => (250, 30),
            Difficulty::Normal => (200, 20),
            Difficulty::Hard => (150, 10),
        }
    }
}

/// Generate `waves` waves scaled by the difficulty curve.
///
/// Basic enemies appear every wave, fast runners from wave 3, tanks from
/// wave 5 and a boss on every tenth wave.
pub fn generate_wave_set(difficulty: Difficulty, waves: u32) -> WaveSet {
    let curve = difficulty.curve();
    let (money, lives) = difficulty.starting_economy();
    let waves = (1..=waves).map(|n| generated_wave(&curve, n)).collect();
    WaveSet {
        set_name: format!("generated-{difficulty}"),
        description: format!("Procedurally scaled {difficulty} wave set"),
        waves,
        initial_money: money,
        initial_lives: lives,
    }
}

fn generated_wave(curve: &DifficultyCurve, n: u32) -> Wave {
    let health = curve.health_multiplier(n);
    let speed = curve.speed_multiplier(n);
    let mut wave = Wave::new(n, format!("Wave {n}")).with_bonus(curve.bonus(n));
    wave.pre_wave_delay = 5.0;
    wave.post_wave_delay = 2.0;
    wave = wave.with_group(
        EnemySpawnGroup::new("basic", curve.count(6, n), 1.0).with_multipliers(health, speed),
    );
    if n >= 3 {
        wave = wave.with_group(
            EnemySpawnGroup::new("fast", curve.count(3, n), 0.6)
                .with_start_delay(2.0)
                .with_multipliers(health, speed),
        );
    }
    if n >= 5 {
        wave = wave.with_group(
            EnemySpawnGroup::new("tank", curve.count(2, n), 2.5)
                .with_start_delay(3.0)
                .with_multipliers(health, speed),
        );
    }
    if n % 10 == 0 {
        wave = wave.with_group(
            EnemySpawnGroup::new("boss", 1, 1.0)
                .with_start_delay(5.0)
                .with_multipliers(health, 1.0),
        );
    }
    wave
}

/// Wave set for a run config: generated from its difficulty and wave cap.
pub fn wave_set_for(config: &SimulationConfig) -> Result<WaveSet, ConfigError> {
    let difficulty: Difficulty = config.wave_set_difficulty.parse()?;
    Ok(generate_wave_set(difficulty, config.max_waves))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::StatsProvider;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sim-data-tests-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn builtin_stats_parse() {
        let table = default_stats_table().unwrap();
        for id in ["basic", "fast", "tank", "boss"] {
            assert!(table.enemy_stats(id).is_some(), "missing enemy {id}");
        }
        for id in ["basic_turret", "sniper_turret", "cannon"] {
            assert!(table.building_stats(id).is_some(), "missing building {id}");
        }
        let boss = table.enemy_stats("boss").unwrap();
        assert!(boss.variant().immune_while_ability_active());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.YML")).unwrap(), Format::Yaml);
        assert!(matches!(
            Format::from_path(Path::new("a.toml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn loads_json_wave_set() {
        let path = temp_file(
            "waves.json",
            r#"{
                "set_name": "json-set",
                "initial_money": 120,
                "initial_lives": 15,
                "waves": [
                    {"wave_number": 1, "enemy_groups": [
                        {"enemy_type": "basic", "count": 5, "spawn_interval": 1.0, "money_reward": 10}
                    ]}
                ]
            }"#,
        );
        let set = load_wave_set(&path).unwrap();
        assert_eq!(set.set_name, "json-set");
        assert_eq!(set.waves[0].total_enemies(), 5);
        assert_eq!(set.waves[0].enemy_groups[0].money_reward, Some(10));
    }

    #[test]
    fn loads_yaml_config_with_defaults() {
        let path = temp_file("config.yaml", "max_waves: 4\nrandom_seed: 7\n");
        let cfg = load_sim_config(&path).unwrap();
        assert_eq!(cfg.max_waves, 4);
        assert_eq!(cfg.random_seed, 7);
        assert_eq!(cfg.tick_seconds, SimulationConfig::default().tick_seconds);
    }

    #[test]
    fn invalid_files_fall_back_to_empty_set() {
        let missing = std::env::temp_dir().join("definitely-missing-wave-set.json");
        assert!(matches!(load_wave_set(&missing), Err(ConfigError::Io { .. })));
        assert_eq!(load_wave_set_or_default(&missing).total_waves(), 0);

        let malformed = temp_file("broken.yaml", "set_name: [unterminated");
        assert!(matches!(load_wave_set(&malformed), Err(ConfigError::Parse(_))));

        let bad_numbering = temp_file(
            "numbering.json",
            r#"{"set_name": "x", "initial_lives": 3, "waves": [{"wave_number": 2}]}"#,
        );
        assert!(matches!(
            load_wave_set(&bad_numbering),
            Err(ConfigError::Invalid(ValidationError::WaveNumbering { .. }))
        ));
        assert_eq!(load_wave_set_or_default(&bad_numbering), WaveSet::default());
    }

    #[test]
    fn bad_stats_are_rejected_on_load() {
        let path = temp_file(
            "stats.json",
            r#"{"enemies": {"ghost": {"max_health": 0, "speed": 1.0}}}"#,
        );
        assert!(matches!(load_stats_table(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn difficulty_parsing() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(Difficulty::Easy.to_string(), "easy");
        assert!(matches!(
            "nightmare".parse::<Difficulty>(),
            Err(ConfigError::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn generated_sets_scale_up() {
        let set = generate_wave_set(Difficulty::Normal, 10);
        assert!(set.validate().is_ok());
        assert_eq!(set.total_waves(), 10);
        assert_eq!(set.waves[0].enemy_groups.len(), 1);
        assert_eq!(set.waves[2].enemy_groups.len(), 2);
        assert_eq!(set.waves[4].enemy_groups.len(), 3);
        assert_eq!(set.waves[9].enemy_groups.len(), 4);
        assert!(set.waves[9].total_enemies() > set.waves[0].total_enemies());
        assert!(
            set.waves[9].enemy_groups[0].health_multiplier
                > set.waves[0].enemy_groups[0].health_multiplier
        );
        let hard = generate_wave_set(Difficulty::Hard, 10);
        assert!(hard.waves[9].total_enemies() > set.waves[9].total_enemies());
        assert!(hard.initial_lives < set.initial_lives);
    }

    #[test]
    fn wave_set_for_config_uses_difficulty() {
        let cfg = SimulationConfig {
            wave_set_difficulty: "easy".into(),
            max_waves: 3,
            ..SimulationConfig::default()
        };
        let set = wave_set_for(&cfg).unwrap();
        assert_eq!(set.set_name, "generated-easy");
        assert_eq!(set.total_waves(), 3);
    }

    proptest! {
        #[test]
        fn generated_sets_always_validate(waves in 0u32..60) {
            for d in [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard] {
                let set = generate_wave_set(d, waves);
                prop_assert!(set.validate().is_ok());
                prop_assert_eq!(set.total_waves(), waves);
            }
        }
    }
}
