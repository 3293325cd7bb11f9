#![deny(warnings)]

//! Persistence layer: run reports (JSON, Markdown) and binary run archives.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sim_core::SimulationConfig;
use sim_runtime::{summarize, SimulationMetrics, SimulationResult};
use thiserror::Error;
use tracing::info;

/// Leading bytes of every run archive.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"WBRA";
/// Bumped whenever the archived record layout changes.
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("archive encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("not a run archive")]
    BadMagic,
    #[error("unsupported archive version {found} (expected {expected})")]
    Version { expected: u32, found: u32 },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError {
    let path = path.display().to_string();
    move |source| PersistError::Io { path, source }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, bytes).map_err(io_err(path))
}

/// Identifies the build that produced a report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_sha: String,
}

/// Everything a run report shows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub build: BuildInfo,
    pub config: SimulationConfig,
    pub result: SimulationResult,
    pub metrics: SimulationMetrics,
}

impl RunReport {
    /// Build a report for a finished run; metrics are derived from `result`.
    pub fn new(build: BuildInfo, config: SimulationConfig, result: SimulationResult) -> Self {
        let metrics = summarize(&result);
        Self {
            generated_at: Utc::now(),
            build,
            config,
            result,
            metrics,
        }
    }
}

pub fn write_json_report(path: &Path, report: &RunReport) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(report)?;
    write_file(path, json.as_bytes())?;
    info!(path = %path.display(), "json report written");
    Ok(())
}

pub fn read_json_report(path: &Path) -> Result<RunReport, PersistError> {
    let text = fs::read_to_string(path).map_err(io_err(path))?;
    Ok(serde_json::from_str(&text)?)
}

/// Render a report as Markdown: summary, per-wave table, custom metrics.
pub fn render_markdown(report: &RunReport) -> String {
    let mut out = String::new();
    // fmt::Write for String never errors
    let _ = write_markdown(&mut out, report);
    out
}

/// Write the Markdown rendering of `report` into any formatter sink.
pub fn write_markdown<W: fmt::Write>(out: &mut W, report: &RunReport) -> fmt::Result {
    let r = &report.result;
    let m = &report.metrics;

    writeln!(out, "# Balance report: {}\n", r.scenario_name)?;
    writeln!(
        out,
        "_Generated {} by version {} ({})_\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.build.version,
        report.build.git_sha
    )?;

    writeln!(out, "## Summary\n")?;
    let outcome = if r.success { "✅ survived" } else { "❌ failed" };
    writeln!(out, "- **Outcome**: {outcome}")?;
    if let Some(reason) = &r.failure_reason {
        writeln!(out, "- **Failure reason**: {reason}")?;
    }
    writeln!(
        out,
        "- **Waves**: {}/{} completed",
        r.total_waves_completed, r.total_waves_attempted
    )?;
    writeln!(
        out,
        "- **Final economy**: {} money, {} lives, {} score",
        r.final_money, r.final_lives, r.final_score
    )?;
    writeln!(out, "- **Duration**: {:.1}s", r.simulation_duration)?;
    writeln!(
        out,
        "- **Completion rate**: {:.1}%",
        m.overall_completion_rate * 100.0
    )?;
    writeln!(
        out,
        "- **Average difficulty**: {:.2}",
        m.average_difficulty_rating
    )?;
    writeln!(out, "- **Balance score**: {:.1}\n", m.balance_score())?;

    writeln!(out, "## Waves\n")?;
    if m.wave_metrics.is_empty() {
        writeln!(out, "No waves were played.\n")?;
    } else {
        writeln!(
            out,
            "| Wave | Name | Enemies | Killed | Leaked | Money | Difficulty | Status |"
        )?;
        writeln!(out, "|---|---|---|---|---|---|---|---|")?;
        for w in &m.wave_metrics {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {:.2} | {:?} |",
                w.wave_number,
                w.wave_name,
                w.total_enemies,
                w.enemies_killed,
                w.enemies_leaked,
                w.money_earned,
                w.difficulty_rating,
                w.status()
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Metrics\n")?;
    for (name, value) in &m.custom_metrics {
        writeln!(out, "- `{name}`: {value:.2}")?;
    }
    Ok(())
}

pub fn write_markdown_report(path: &Path, report: &RunReport) -> Result<(), PersistError> {
    write_file(path, render_markdown(report).as_bytes())?;
    info!(path = %path.display(), "markdown report written");
    Ok(())
}

/// A finished run kept for later comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunArchive {
    pub generated_at: DateTime<Utc>,
    pub config: SimulationConfig,
    pub result: SimulationResult,
}

impl RunArchive {
    pub fn new(config: SimulationConfig, result: SimulationResult) -> Self {
        Self {
            generated_at: Utc::now(),
            config,
            result,
        }
    }

    /// Encode as magic, little-endian version, then the bincode payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let payload = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(payload.len() + 8);
        bytes.extend_from_slice(&ARCHIVE_MAGIC);
        bytes.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() < 8 || bytes[..4] != ARCHIVE_MAGIC {
            return Err(PersistError::BadMagic);
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let found = u32::from_le_bytes(version);
        if found != ARCHIVE_VERSION {
            return Err(PersistError::Version {
                expected: ARCHIVE_VERSION,
                found,
            });
        }
        Ok(bincode::deserialize(&bytes[8..])?)
    }
}

pub fn save_archive(path: &Path, archive: &RunArchive) -> Result<(), PersistError> {
    let bytes = archive.to_bytes()?;
    write_file(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "run archive saved");
    Ok(())
}

pub fn load_archive(path: &Path) -> Result<RunArchive, PersistError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    RunArchive::from_bytes(&bytes)
}
