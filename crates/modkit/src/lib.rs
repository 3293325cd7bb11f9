#![deny(warnings)]

//! Rhai-based modding API: scripted combat strategies loaded from mod folders.
//!
//! A mod folder holds `metadata.yaml` and `script.rhai`. The script defines
//! `fn kill_chance(health, speed, damage, wave)` returning a probability; the
//! resulting [`ScriptedCombat`] rolls against it with a seeded RNG.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rhai::{Dynamic, Engine, Scope, AST};
use serde::Deserialize;
use sim_combat::{CombatError, CombatModel, Encounter, Outcome};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

/// Schema version this build understands.
pub const MOD_SCHEMA_VERSION: u32 = 1;
/// Script function a combat mod must define.
pub const KILL_CHANCE_FN: &str = "kill_chance";
/// Upper bound on script operations per evaluation.
pub const MAX_OPERATIONS: u64 = 100_000;

/// Metadata for a mod package.
#[derive(Debug, Clone, Deserialize)]
pub struct ModMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    pub engine_schema_version: u32,
    #[serde(default)]
    pub hooks: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ModError {
    #[error("invalid metadata: {0}")]
    InvalidMeta(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("rhai error: {0}")]
    Rhai(String),
}

impl From<std::io::Error> for ModError {
    fn from(e: std::io::Error) -> Self {
        ModError::Io(e.to_string())
    }
}

impl From<Box<rhai::EvalAltResult>> for ModError {
    fn from(e: Box<rhai::EvalAltResult>) -> Self {
        ModError::Rhai(e.to_string())
    }
}

impl From<rhai::ParseError> for ModError {
    fn from(e: rhai::ParseError) -> Self {
        ModError::Rhai(e.to_string())
    }
}

/// Loaded mod with metadata and script path.
#[derive(Debug, Clone)]
pub struct LoadedMod {
    pub meta: ModMeta,
    pub dir: PathBuf,
    pub script_path: PathBuf,
    pub script_mtime: SystemTime,
}

impl LoadedMod {
    /// Read and check `metadata.yaml`, and locate `script.rhai`.
    pub fn load(dir: &Path) -> Result<Self, ModError> {
        let meta_path = dir.join("metadata.yaml");
        let script_path = dir.join("script.rhai");
        let meta_text = fs::read_to_string(&meta_path)?;
        let meta: ModMeta = serde_yaml::from_str(&meta_text)
            .map_err(|e| ModError::InvalidMeta(e.to_string()))?;
        if meta.engine_schema_version != MOD_SCHEMA_VERSION {
            return Err(ModError::InvalidMeta(format!(
                "{} targets schema {}, expected {}",
                meta.id, meta.engine_schema_version, MOD_SCHEMA_VERSION
            )));
        }
        if let Some(hooks) = &meta.hooks {
            if !hooks.iter().any(|h| h == KILL_CHANCE_FN) {
                return Err(ModError::InvalidMeta(format!(
                    "{} does not declare the {KILL_CHANCE_FN} hook",
                    meta.id
                )));
            }
        }
        let script_mtime = script_modified(&script_path)?;
        Ok(Self {
            meta,
            dir: dir.to_path_buf(),
            script_path,
            script_mtime,
        })
    }
}

fn script_modified(path: &Path) -> Result<SystemTime, ModError> {
    Ok(fs::metadata(path)?
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH))
}

/// Returns a Rhai engine with the operation limit applied.
pub fn new_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine
}

/// Combat model whose kill probability comes from a Rhai script.
pub struct ScriptedCombat {
    engine: Engine,
    ast: AST,
    module: LoadedMod,
    rng: ChaCha8Rng,
}

impl ScriptedCombat {
    pub fn new(module: LoadedMod, seed: u64) -> Result<Self, ModError> {
        let engine = new_engine();
        let ast = compile(&engine, &module.script_path)?;
        if !ast.iter_functions().any(|f| f.name == KILL_CHANCE_FN) {
            return Err(ModError::Rhai(format!(
                "{} does not define {KILL_CHANCE_FN}",
                module.script_path.display()
            )));
        }
        info!(id = %module.meta.id, version = %module.meta.version, "combat mod loaded");
        Ok(Self {
            engine,
            ast,
            module,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn meta(&self) -> &ModMeta {
        &self.module.meta
    }

    /// Evaluate the script's kill probability, clamped to [0, 1].
    pub fn kill_chance(
        &self,
        health: u32,
        speed: f32,
        damage: u32,
        wave: u32,
    ) -> Result<f64, ModError> {
        let mut scope = Scope::new();
        let value: Dynamic = self.engine.call_fn(
            &mut scope,
            &self.ast,
            KILL_CHANCE_FN,
            (
                i64::from(health),
                f64::from(speed),
                i64::from(damage),
                i64::from(wave),
            ),
        )?;
        let chance = value
            .as_float()
            .or_else(|_| value.as_int().map(|i| i as f64))
            .map_err(|t| ModError::Rhai(format!("{KILL_CHANCE_FN} returned {t}")))?;
        if chance.is_nan() {
            return Err(ModError::Rhai(format!("{KILL_CHANCE_FN} returned NaN")));
        }
        Ok(chance.clamp(0.0, 1.0))
    }

    /// Recompile when the script changed on disk. Returns whether it did.
    pub fn reload_if_changed(&mut self) -> Result<bool, ModError> {
        let mtime = script_modified(&self.module.script_path)?;
        if mtime <= self.module.script_mtime {
            return Ok(false);
        }
        self.ast = compile(&self.engine, &self.module.script_path)?;
        self.module.script_mtime = mtime;
        info!(id = %self.module.meta.id, "combat mod reloaded");
        Ok(true)
    }
}

fn compile(engine: &Engine, path: &Path) -> Result<AST, ModError> {
    let script = fs::read_to_string(path)?;
    Ok(engine.compile(&script)?)
}

impl CombatModel for ScriptedCombat {
    fn name(&self) -> &str {
        &self.module.meta.id
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn resolve(&mut self, encounter: &Encounter<'_>) -> Result<Outcome, CombatError> {
        let stats = encounter.stats;
        let chance = self
            .kill_chance(
                stats.max_health(),
                stats.speed(),
                stats.damage(),
                encounter.wave_number,
            )
            .map_err(|e| CombatError::Strategy(e.to_string()))?;
        let defeated = self.rng.gen_bool(chance);
        debug!(wave = encounter.wave_number, chance, defeated, "scripted roll");
        Ok(if defeated {
            Outcome::Defeated
        } else {
            Outcome::Leaked
        })
    }
}

/// Load the combat mod in `dir` and seed its RNG.
pub fn load_combat_mod(dir: &Path, seed: u64) -> Result<ScriptedCombat, ModError> {
    ScriptedCombat::new(LoadedMod::load(dir)?, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::EnemyStats;

    fn write_mod(name: &str, script: &str, schema: u32) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("modkit-tests-{}", std::process::id()))
            .join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("metadata.yaml"),
            format!(
                "id: {name}\nname: Test\nversion: 0.0.1\nengine_schema_version: {schema}\nhooks: [kill_chance]\n"
            ),
        )
        .unwrap();
        fs::write(dir.join("script.rhai"), script).unwrap();
        dir
    }

    fn encounter<'a>(stats: &'a EnemyStats, wave: u32) -> Encounter<'a> {
        Encounter {
            wave_number: wave,
            spawn_index: 0,
            enemy_type: "grunt",
            stats,
            path_length: 100.0,
        }
    }

    #[test]
    fn engine_runs_script() {
        let engine = new_engine();
        let result: i64 = engine.eval("40 + 2").unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn bundled_mod_loads_and_scores() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/mods/health_falloff");
        let combat = load_combat_mod(&dir, 1).unwrap();
        assert_eq!(combat.name(), "health_falloff");
        let weak = combat.kill_chance(30, 1.0, 1, 1).unwrap();
        let strong = combat.kill_chance(900, 4.0, 5, 1).unwrap();
        assert!(weak > strong);
        assert!((0.0..=1.0).contains(&strong));
    }

    #[test]
    fn certain_outcomes_follow_script() {
        let stats = EnemyStats::new(100, 1.0, 1, 5, 1, "grunt").unwrap();
        let dir = write_mod("always", "fn kill_chance(h, s, d, w) { 1 }", 1);
        let mut always = load_combat_mod(&dir, 3).unwrap();
        let dir = write_mod("never", "fn kill_chance(h, s, d, w) { -2.0 }", 1);
        let mut never = load_combat_mod(&dir, 3).unwrap();
        for wave in 1..20 {
            assert_eq!(always.resolve(&encounter(&stats, wave)), Ok(Outcome::Defeated));
            assert_eq!(never.resolve(&encounter(&stats, wave)), Ok(Outcome::Leaked));
        }
    }

    #[test]
    fn same_seed_same_rolls() {
        let stats = EnemyStats::new(100, 1.0, 1, 5, 1, "grunt").unwrap();
        let dir = write_mod("coin", "fn kill_chance(h, s, d, w) { 0.5 }", 1);
        let mut a = load_combat_mod(&dir, 9).unwrap();
        let mut b = load_combat_mod(&dir, 9).unwrap();
        for i in 0..50 {
            let e = encounter(&stats, i);
            assert_eq!(a.resolve(&e), b.resolve(&e));
        }
    }

    #[test]
    fn reseed_restarts_the_roll_sequence() {
        let stats = EnemyStats::new(100, 1.0, 1, 5, 1, "grunt").unwrap();
        let dir = write_mod("reseeded", "fn kill_chance(h, s, d, w) { 0.5 }", 1);
        let mut combat = load_combat_mod(&dir, 4).unwrap();
        let first: Vec<_> = (0..40).map(|i| combat.resolve(&encounter(&stats, i))).collect();
        combat.reseed(4);
        let again: Vec<_> = (0..40).map(|i| combat.resolve(&encounter(&stats, i))).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn script_errors_become_strategy_errors() {
        let stats = EnemyStats::new(100, 1.0, 1, 5, 1, "grunt").unwrap();
        let dir = write_mod("text", r#"fn kill_chance(h, s, d, w) { "high" }"#, 1);
        let mut bad = load_combat_mod(&dir, 1).unwrap();
        assert!(matches!(
            bad.resolve(&encounter(&stats, 1)),
            Err(CombatError::Strategy(_))
        ));
    }

    #[test]
    fn runaway_scripts_hit_operation_limit() {
        let dir = write_mod("loop", "fn kill_chance(h, s, d, w) { loop {} }", 1);
        let combat = load_combat_mod(&dir, 1).unwrap();
        assert!(matches!(combat.kill_chance(1, 1.0, 1, 1), Err(ModError::Rhai(_))));
    }

    #[test]
    fn rejects_bad_mods() {
        let dir = write_mod("old", "fn kill_chance(h, s, d, w) { 1.0 }", 0);
        assert!(matches!(load_combat_mod(&dir, 1), Err(ModError::InvalidMeta(_))));

        let dir = write_mod("nofn", "fn other() { 1.0 }", 1);
        assert!(matches!(load_combat_mod(&dir, 1), Err(ModError::Rhai(_))));

        let dir = write_mod("syntax", "fn kill_chance(h, s, d, w) { ", 1);
        assert!(matches!(load_combat_mod(&dir, 1), Err(ModError::Rhai(_))));

        let missing = std::env::temp_dir().join("modkit-no-such-mod");
        assert!(matches!(load_combat_mod(&missing, 1), Err(ModError::Io(_))));
    }

    #[test]
    fn unchanged_script_is_not_reloaded() {
        let dir = write_mod("steady", "fn kill_chance(h, s, d, w) { 0.3 }", 1);
        let mut combat = load_combat_mod(&dir, 1).unwrap();
        assert!(!combat.reload_if_changed().unwrap());
        assert_eq!(combat.meta().id, "steady");
    }
}
