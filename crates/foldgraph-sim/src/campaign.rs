//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with shared parameters, collecting pass/fail results
//! and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::oracle::{InvariantViolation, OracleResult, ViewOracle};
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration: which seeds to run and the simulation
/// parameters shared by every seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub node_count: usize,
    pub parent_window: usize,
    pub merge_percent: u8,
    pub hidden_percent: u8,
    pub rounds: u64,
    pub batch_size: usize,
    pub max_walk: usize,
    pub controller_percent: u8,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            node_count: sim.node_count,
            parent_window: sim.parent_window,
            merge_percent: sim.merge_percent,
            hidden_percent: sim.hidden_percent,
            rounds: sim.rounds,
            batch_size: sim.batch_size,
            max_walk: sim.max_walk,
            controller_percent: sim.controller_percent,
        }
    }
}

impl CampaignConfig {
    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            node_count: self.node_count,
            parent_window: self.parent_window,
            merge_percent: self.merge_percent,
            hidden_percent: self.hidden_percent,
            rounds: self.rounds,
            batch_size: self.batch_size,
            max_walk: self.max_walk,
            controller_percent: self.controller_percent,
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        self.sim_config_for_seed(self.seed_range.start).validate()
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    /// Round of the first failing check.
    pub round: Option<u64>,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds where at least one sweep stayed inside a partial range.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything known about one replayed seed.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    /// Oracle verdict on the final state.
    pub oracle: OracleResult,
    /// The generated `(up, down)` edge list.
    pub edges: Vec<(usize, usize)>,
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let result = run_seed(seed, config)?;
        if result.interesting_state_reached {
            report.interesting_states_reached += 1;
        }
        if result.passed() {
            report.seeds_passed += 1;
            continue;
        }
        report.first_failure.get_or_insert(seed);
        report.failures.push(SeedFailure {
            seed,
            round: result.failed_round,
            violations: result.violations.iter().map(format_violation).collect(),
        });
    }

    Ok(report)
}

/// Run a single seed and return Ok(()) on pass, Err(violations) on failure.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the simulation itself encounters an internal
/// error (invalid config, rejected modification). The inner `Result`
/// distinguishes pass from invariant violations.
pub fn run_single_seed(
    seed: u64,
    config: &CampaignConfig,
) -> Result<std::result::Result<(), Vec<InvariantViolation>>> {
    let result = run_seed(seed, config)?;
    if result.passed() {
        Ok(Ok(()))
    } else {
        Ok(Err(result.violations))
    }
}

/// Replay a single seed with full trace details for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;

    let mut simulator = Simulator::new(config.sim_config_for_seed(seed))?;
    let result = simulator.run()?;
    let oracle = ViewOracle::check_all(simulator.edges(), simulator.view());

    Ok(DetailedTrace {
        result,
        oracle,
        edges: simulator.edges().to_vec(),
    })
}

fn run_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}

/// Format an invariant violation into a human-readable string.
#[must_use]
pub fn format_violation(violation: &InvariantViolation) -> String {
    match violation {
        InvariantViolation::Unreadable { reason } => format!("Unreadable: {reason}"),
        InvariantViolation::Compaction { expected, actual } => {
            format!("Compaction: compiled order {actual:?}, visible nodes {expected:?}")
        }
        InvariantViolation::RoundTrip { index, mapped } => {
            format!("RoundTrip: backing {index} maps back to {mapped:?}")
        }
        InvariantViolation::MissingConnector { up, down } => {
            format!("MissingConnector: no dotted edge {up} -> {down}")
        }
        InvariantViolation::SpuriousConnector { up, down } => {
            format!("SpuriousConnector: dotted edge {up} -> {down} has no hidden path")
        }
        InvariantViolation::HiddenEndpoint { index } => {
            format!("HiddenEndpoint: hidden node {index} owns a connector")
        }
        InvariantViolation::DanglingArrow { index } => {
            format!("DanglingArrow: node {index} kept an arrow after a closed sweep")
        }
        InvariantViolation::Divergence {
            only_incremental,
            only_rebuilt,
        } => format!(
            "Divergence: incremental view differs from rebuild \
             (only_incremental={only_incremental:?}, only_rebuilt={only_rebuilt:?})"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seeds: Range<u64>) -> CampaignConfig {
        CampaignConfig {
            seed_range: seeds,
            node_count: 32,
            rounds: 12,
            ..CampaignConfig::default()
        }
    }

    #[test]
    fn validate_rejects_empty_seed_range() {
        let config = small_config(5..5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_rounds() {
        let config = CampaignConfig {
            rounds: 0,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_simulation_parameters() {
        let config = CampaignConfig {
            hidden_percent: 150,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sim_config_carries_campaign_parameters() {
        let config = small_config(0..1);
        let sim = config.sim_config_for_seed(9);
        assert_eq!(sim.seed, 9);
        assert_eq!(sim.node_count, 32);
        assert_eq!(sim.rounds, 12);
        assert_eq!(sim.max_walk, config.max_walk);
    }

    #[test]
    fn campaign_of_many_seeds_passes() {
        let report = run_campaign(&small_config(0..100)).expect("campaign");
        assert_eq!(report.seeds_run, 100);
        assert!(report.all_passed(), "failures: {:?}", report.failures);
        assert_eq!(report.seeds_passed, 100);
        assert_eq!(report.first_failure, None);
        assert!(report.interesting_states_reached > 0);
    }

    #[test]
    fn tight_walk_budget_still_passes() {
        let config = CampaignConfig {
            max_walk: 1,
            ..small_config(0..20)
        };
        let report = run_campaign(&config).expect("campaign");
        assert!(report.all_passed(), "failures: {:?}", report.failures);
    }

    #[test]
    fn single_seed_passes() {
        let outcome = run_single_seed(3, &small_config(0..1)).expect("seed");
        assert_eq!(outcome, Ok(()));
    }

    #[test]
    fn replay_matches_campaign_run() {
        let config = small_config(0..1);
        let trace = replay_seed(7, &config).expect("replay");
        assert!(trace.oracle.passed);
        assert!(trace.result.passed());
        assert!(!trace.edges.is_empty());
        let again = replay_seed(7, &config).expect("replay");
        assert_eq!(trace.result, again.result);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = CampaignReport {
            seeds_run: 2,
            seeds_passed: 1,
            first_failure: Some(1),
            failures: vec![SeedFailure {
                seed: 1,
                round: Some(4),
                violations: vec![format_violation(&InvariantViolation::MissingConnector {
                    up: 0,
                    down: 3,
                })],
            }],
            interesting_states_reached: 1,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("MissingConnector: no dotted edge 0 -> 3"));
        let back: CampaignReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, report);
        assert!(!back.all_passed());
    }

    #[test]
    fn config_reads_from_toml() {
        let config: CampaignConfig =
            toml::from_str("node_count = 16\nrounds = 3\n").expect("parse config");
        assert_eq!(config.node_count, 16);
        assert_eq!(config.rounds, 3);
        assert_eq!(config.seed_range, 0..100);
    }
}
