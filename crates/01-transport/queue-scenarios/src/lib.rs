//! Two-thread workloads that drive a mirrored queue and check the byte stream
//! that comes out the other side.

pub mod checks;
pub mod config;
pub mod engine;
pub mod stats;

pub use checks::{verify, CheckResult};
pub use config::{ScenarioConfig, ScenarioKind};
pub use engine::{Pattern, ScenarioEngine, ScenarioReport};
pub use stats::{ArcStatsSink, ScenarioStats, StatsSink};

use mirror_queue::QueueResult;

/// Runs `config` with a fresh stats sink and returns the report.
pub fn run_scenario(config: &ScenarioConfig) -> QueueResult<ScenarioReport> {
    ScenarioEngine::new(config.clone(), ArcStatsSink::default()).run()
}
