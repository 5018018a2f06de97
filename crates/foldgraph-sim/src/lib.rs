#![forbid(unsafe_code)]
//! foldgraph-sim: deterministic simulation of collapsed views.
//!
//! A seed fixes a random history DAG, a starting visibility and a sequence
//! of rounds. Each round flips a batch of nodes through one
//! [`Modification`](foldgraph_core::Modification) and, now and then, drives
//! a [`CollapseController`] action. After every step the view is checked
//! against [`oracle::ViewOracle`].
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod campaign;
pub mod oracle;
pub mod rng;

use std::sync::Arc;

use anyhow::{Result, bail};
use foldgraph_core::controller::{CollapseController, GraphAction, GraphController, PermanentController};
use foldgraph_core::{
    Adjacency, BackingGraph, CollapsedGraph, EdgeFilter, EdgeKind, EngineConfig, GraphEdge,
    GraphElement, LinearGraph, StaticGraph, VisibilityMap, apply_and_bridge,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::oracle::{InvariantViolation, ViewOracle};
use crate::rng::DeterministicRng;

/// Parameters of one simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Nodes in the generated history.
    pub node_count: usize,
    /// Parents are drawn from this many nodes below a child.
    pub parent_window: usize,
    /// Chance that a node gets a second parent (percent, 0–100).
    pub merge_percent: u8,
    /// Chance that a node starts hidden (percent, 0–100).
    pub hidden_percent: u8,
    pub rounds: u64,
    /// Nodes flipped per round.
    pub batch_size: usize,
    /// Walk budget for growing a synthesis range.
    pub max_walk: usize,
    /// Chance per round of a controller action (percent, 0–100).
    pub controller_percent: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            node_count: 64,
            parent_window: 4,
            merge_percent: 20,
            hidden_percent: 50,
            rounds: 24,
            batch_size: 3,
            max_walk: 500,
            controller_percent: 25,
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            bail!("node_count must be > 0");
        }
        if u32::try_from(self.node_count).is_err() {
            bail!("node_count must fit in a node id");
        }
        if self.parent_window == 0 {
            bail!("parent_window must be > 0");
        }
        for (name, percent) in [
            ("merge_percent", self.merge_percent),
            ("hidden_percent", self.hidden_percent),
            ("controller_percent", self.controller_percent),
        ] {
            if percent > 100 {
                bail!("{name} must be within 0..=100");
            }
        }
        Ok(())
    }
}

/// What happened in one step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: u64,
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEventKind {
    /// A visibility batch and the backing range the sweep covered.
    Batch {
        shown: Vec<usize>,
        hidden: Vec<usize>,
        swept: Option<(usize, usize)>,
    },
    /// A controller action and how many nodes it showed or hid.
    Action { action: String, changed: usize },
}

/// Outcome of [`Simulator::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trace: Vec<TraceEvent>,
    /// Violations of the first failing step; empty on success.
    pub violations: Vec<InvariantViolation>,
    /// Round of the first failing step.
    pub failed_round: Option<u64>,
    /// Batches whose sweep stayed inside a partial range.
    pub partial_sweeps: usize,
    /// Batches that swept the whole graph.
    pub full_sweeps: usize,
    /// Whether at least one batch exercised the incremental path.
    pub interesting_state_reached: bool,
}

impl SimulationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Drives one seeded run.
#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    edges: Vec<(usize, usize)>,
    graph: CollapsedGraph,
    controller: CollapseController,
}

impl Simulator {
    /// Generate the history and starting views for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config or if the generated graph is
    /// rejected by the engine.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = DeterministicRng::new(config.seed);
        let edges = generate_history(&config, &mut rng);
        let backing: Arc<dyn BackingGraph> = Arc::new(StaticGraph::from_edges(config.node_count, &edges)?);

        let matched: VisibilityMap = (0..config.node_count)
            .filter(|_| !rng.chance(config.hidden_percent))
            .map(|i| backing.id_of(i))
            .collect();
        let graph = CollapsedGraph::filtered(Arc::clone(&backing), &matched)?;

        let engine = EngineConfig {
            max_walk: config.max_walk,
            ..EngineConfig::default()
        };
        let controller = CollapseController::new(Box::new(PermanentController::new(backing)), engine)?;

        debug!(
            seed = config.seed,
            nodes = config.node_count,
            edges = edges.len(),
            visible = graph.visible_count(),
            "generated history"
        );
        Ok(Self {
            config,
            rng,
            edges,
            graph,
            controller,
        })
    }

    /// The generated `(up, down)` edge list.
    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// The view driven by visibility batches.
    #[must_use]
    pub const fn view(&self) -> &CollapsedGraph {
        &self.graph
    }

    /// Run every round, stopping at the first failing check.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects an operation.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let mut result = SimulationResult {
            trace: Vec::new(),
            violations: Vec::new(),
            failed_round: None,
            partial_sweeps: 0,
            full_sweeps: 0,
            interesting_state_reached: false,
        };
        let full_range = (0, self.config.node_count - 1);

        for round in 0..self.config.rounds {
            let batch = self.flip_batch()?;
            if let TraceEventKind::Batch { swept: Some(swept), .. } = &batch {
                if *swept == full_range {
                    result.full_sweeps += 1;
                } else {
                    result.partial_sweeps += 1;
                }
            }
            result.trace.push(TraceEvent { round, kind: batch });

            let check = ViewOracle::check_all(&self.edges, &self.graph);
            if !check.passed {
                result.violations = check.violations;
                result.failed_round = Some(round);
                break;
            }

            if self.rng.chance(self.config.controller_percent) {
                let action = self.controller_step()?;
                result.trace.push(TraceEvent { round, kind: action });
                let check = ViewOracle::check_all(&self.edges, self.controller.collapsed());
                if !check.passed {
                    result.violations = check.violations;
                    result.failed_round = Some(round);
                    break;
                }
            }
        }

        result.interesting_state_reached = result.partial_sweeps > 0;
        info!(
            seed = self.config.seed,
            rounds = self.config.rounds,
            partial_sweeps = result.partial_sweeps,
            passed = result.passed(),
            "simulation finished"
        );
        Ok(result)
    }

    fn flip_batch(&mut self) -> Result<TraceEventKind> {
        let (mut shown, mut hidden) = (Vec::new(), Vec::new());
        let mut modification = self.graph.start_modification()?;
        for _ in 0..self.config.batch_size {
            let index = self.rng.next_index(self.config.node_count);
            let visible = modification
                .pending_visibility(index)
                .unwrap_or_else(|| self.graph.is_visible(index));
            if visible {
                modification.hide_node(index)?;
                hidden.push(index);
            } else {
                modification.show_node(index)?;
                shown.push(index);
            }
        }
        let swept = apply_and_bridge(&mut self.graph, modification, self.config.max_walk)?
            .map(|range| (*range.start(), *range.end()));
        Ok(TraceEventKind::Batch {
            shown,
            hidden,
            swept,
        })
    }

    fn controller_step(&mut self) -> Result<TraceEventKind> {
        let action = match self.rng.next_index(4) {
            0 => GraphAction::CollapseAll,
            1 => GraphAction::ExpandAll,
            2 => {
                let count = self.controller.collapsed().visible_count();
                GraphAction::Collapse(GraphElement::Node(self.rng.next_index(count)))
            }
            _ => first_dotted_edge(self.controller.collapsed())?
                .map_or(GraphAction::ExpandAll, GraphAction::Expand),
        };
        let answer = self.controller.perform_action(&action)?;
        let changed = answer
            .changes
            .map_or(0, |changes| changes.added.len() + changes.removed.len());
        Ok(TraceEventKind::Action {
            action: format!("{action:?}"),
            changed,
        })
    }
}

/// Edges `(child, parent)` where every parent has a larger index than its
/// child, like a history listed newest first.
fn generate_history(config: &SimulationConfig, rng: &mut DeterministicRng) -> Vec<(usize, usize)> {
    let last = config.node_count - 1;
    let mut edges = Vec::new();
    for child in 0..last {
        let reach = config.parent_window.min(last - child);
        let first = child + 1 + rng.next_index(reach);
        edges.push((child, first));
        if rng.chance(config.merge_percent) {
            let second = child + 1 + rng.next_index(reach);
            if second != first {
                edges.push((child, second));
            }
        }
    }
    edges
}

fn first_dotted_edge(graph: &CollapsedGraph) -> Result<Option<GraphEdge>> {
    let compiled = graph.compiled_graph()?;
    Ok((0..compiled.node_count()).find_map(|i| {
        compiled
            .adjacent_edges(i, EdgeFilter::DOWN_ONLY)
            .into_iter()
            .find(|edge| edge.kind == EdgeKind::Dotted)
    }))
}
