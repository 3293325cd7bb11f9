#![deny(warnings)]

//! Headless simulation runtime: wave scheduling, round phases, the game
//! simulation loop and metrics aggregation.
//!
//! Everything here runs on the caller's thread. A run owns its economy,
//! scheduler and round controller exclusively; progress is reported through a
//! synchronous [`ProgressSink`].

pub mod engine;
pub mod metrics;
pub mod round;
pub mod scheduler;

pub use engine::{GameSimRunner, NoProgress, ProgressSink, SimulationProgress, SimulationResult};
pub use metrics::{
    balance_score, difficulty_rating, summarize, SimulationMetrics, WaveMetrics, WaveStatus,
};
pub use round::{RoundController, RoundPhase, RoundRules};
pub use scheduler::{SchedulerEvent, SchedulerState, SpawnEvent, WaveScheduler};
