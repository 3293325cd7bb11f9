use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "\
usage: cli [options]

  --config <file>        simulation config (.json/.yaml)
  --waves <file>         wave set (.json/.yaml); generated when absent
  --stats <file>         enemy/building stats table; built-in table when absent
  --difficulty <name>    easy | normal | hard (generated wave sets)
  --waves-count <n>      number of generated waves
  --seed <n>             RNG seed
  --max-waves <n>        stop after n waves
  --kill-chance <p>      flat kill probability combat model (default 0.85)
  --coverage <list>      tower layout, e.g. basic_turret=0.5,cannon=0.3
  --script <dir>         Rhai combat mod directory
  --report <file>        write a report (.md for Markdown, JSON otherwise)
  --archive <file>       write a binary run archive
  --per-spawn            report progress after every enemy
  -h, --help             show this help";

/// How each spawned enemy is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum CombatChoice {
    KillChance(f64),
    Coverage(Vec<(String, f32)>),
    Script(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub waves: Option<PathBuf>,
    pub stats: Option<PathBuf>,
    pub difficulty: Option<String>,
    pub waves_count: Option<u32>,
    pub seed: Option<u64>,
    pub max_waves: Option<u32>,
    pub combat: CombatChoice,
    pub report: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub per_spawn: bool,
    pub help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            waves: None,
            stats: None,
            difficulty: None,
            waves_count: None,
            seed: None,
            max_waves: None,
            combat: CombatChoice::KillChance(0.85),
            report: None,
            archive: None,
            per_spawn: false,
            help: false,
        }
    }
}

fn value(flag: &str, it: &mut impl Iterator<Item = String>) -> Result<String> {
    it.next().ok_or_else(|| anyhow!("{flag} needs a value"))
}

fn number<T>(flag: &str, it: &mut impl Iterator<Item = String>) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = value(flag, it)?;
    raw.parse()
        .with_context(|| format!("{flag}: cannot parse {raw:?}"))
}

/// Parse `type=coverage` pairs separated by commas.
pub fn parse_layout(layout: &str) -> Result<Vec<(String, f32)>> {
    layout.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (name, coverage) = part
                .split_once('=')
                .ok_or_else(|| anyhow!("layout entry {part:?} is not type=coverage"))?;
            let coverage: f32 = coverage
                .trim()
                .parse()
                .with_context(|| format!("bad coverage in {part:?}"))?;
            Ok((name.trim().to_string(), coverage))
        })
        .collect()
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => out.config = Some(value(&arg, &mut it)?.into()),
            "--waves" => out.waves = Some(value(&arg, &mut it)?.into()),
            "--stats" => out.stats = Some(value(&arg, &mut it)?.into()),
            "--difficulty" => out.difficulty = Some(value(&arg, &mut it)?),
            "--waves-count" => out.waves_count = Some(number(&arg, &mut it)?),
            "--seed" => out.seed = Some(number(&arg, &mut it)?),
            "--max-waves" => out.max_waves = Some(number(&arg, &mut it)?),
            "--kill-chance" => out.combat = CombatChoice::KillChance(number(&arg, &mut it)?),
            "--coverage" => out.combat = CombatChoice::Coverage(parse_layout(&value(&arg, &mut it)?)?),
            "--script" => out.combat = CombatChoice::Script(value(&arg, &mut it)?.into()),
            "--report" => out.report = Some(value(&arg, &mut it)?.into()),
            "--archive" => out.archive = Some(value(&arg, &mut it)?.into()),
            "--per-spawn" => out.per_spawn = true,
            "-h" | "--help" => out.help = true,
            other => bail!("unknown argument {other:?}\n\n{USAGE}"),
        }
    }
    Ok(out)
}
