#![deny(warnings)]

//! Core domain models and invariants for the wave balance simulator.
//!
//! This crate defines the serializable records shared across the simulation
//! (enemy and building stats, wave configuration, run configuration) together
//! with the validation that guarantees their basic invariants.

use thiserror::Error;

mod config;
mod stats;
mod wave;

pub use config::{ProgressGranularity, SimulationConfig};
pub use stats::{
    BuildingStats, BuildingVariant, EnemyStats, EnemyVariant, StatsProvider, StatsTable,
};
pub use wave::{EnemySpawnGroup, Wave, WaveSet};

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Enemy health must be strictly positive.
    #[error("max health must be > 0")]
    NonPositiveHealth,
    /// Speed, range, fire rate and similar rates must be finite and > 0.
    #[error("{field} must be finite and > 0, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    /// Delays and weights must be finite and >= 0.
    #[error("{field} must be finite and >= 0, got {value}")]
    Negative { field: &'static str, value: f32 },
    /// Waves must be numbered 1..=n in order.
    #[error("wave numbering out of order: expected {expected}, found {found}")]
    WaveNumbering { expected: u32, found: u32 },
    /// A run must start with at least one life.
    #[error("initial lives must be > 0")]
    NoLives,
    /// Identifier fields must not be blank.
    #[error("{0} must not be empty")]
    EmptyName(&'static str),
}

pub(crate) fn ensure_positive(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositive { field, value })
    }
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Negative { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_check_rejects_nan_and_zero() {
        assert!(ensure_positive("speed", 1.5).is_ok());
        assert!(ensure_positive("speed", 0.0).is_err());
        assert!(ensure_positive("speed", f32::NAN).is_err());
        assert!(ensure_positive("speed", f32::INFINITY).is_err());
    }

    #[test]
    fn delay_check_allows_zero() {
        assert!(ensure_non_negative("start_delay", 0.0).is_ok());
        assert_eq!(
            ensure_non_negative("start_delay", -1.0),
            Err(ValidationError::Negative {
                field: "start_delay",
                value: -1.0
            })
        );
    }
}
