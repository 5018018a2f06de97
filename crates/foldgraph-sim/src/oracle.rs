use std::collections::BTreeSet;
use std::sync::Arc;

use foldgraph_core::{Adjacency, BackingGraph, CollapsedGraph, EdgeKind, LinearGraph};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};

// ── Core result types ─────────────────────────────────────────────────────────

/// Outcome of one or more invariant checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Accumulate the failures of `other`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

/// A single way a collapsed view disagreed with brute force. Indices are
/// backing indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    /// The compiled view could not be read.
    Unreadable { reason: String },
    /// The compiled view does not list exactly the visible nodes in order.
    Compaction {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// A visible id does not map back to its own backing index.
    RoundTrip { index: usize, mapped: Option<usize> },
    /// Two visible nodes joined only through hidden nodes have no connector.
    MissingConnector { up: usize, down: usize },
    /// A connector joins nodes that are not joined only through hidden nodes.
    SpuriousConnector { up: usize, down: usize },
    /// A hidden node owns a connector.
    HiddenEndpoint { index: usize },
    /// A dangling arrow survived a closed sweep.
    DanglingArrow { index: usize },
    /// The incrementally maintained connectors differ from a rebuild.
    Divergence {
        only_incremental: Vec<(usize, usize)>,
        only_rebuilt: Vec<(usize, usize)>,
    },
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Brute-force checks for a [`CollapsedGraph`] over a known edge list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewOracle;

impl ViewOracle {
    /// Visible pairs joined only through hidden nodes, minus pairs that
    /// are also joined directly.
    #[must_use]
    pub fn expected_connectors(edges: &[(usize, usize)], visible: &[bool]) -> BTreeSet<(usize, usize)> {
        let mut through_hidden = DiGraphMap::<usize, ()>::new();
        for node in 0..visible.len() {
            through_hidden.add_node(node);
        }
        for &(up, down) in edges {
            if !visible[up] {
                through_hidden.add_edge(up, down, ());
            }
        }
        let direct: BTreeSet<(usize, usize)> = edges.iter().copied().collect();

        let mut pairs = BTreeSet::new();
        for &(up, first) in edges {
            if !visible[up] || visible[first] {
                continue;
            }
            let mut dfs = Dfs::new(&through_hidden, first);
            while let Some(reached) = dfs.next(&through_hidden) {
                if visible[reached] && !direct.contains(&(up, reached)) {
                    pairs.insert((up, reached));
                }
            }
        }
        pairs
    }

    #[must_use]
    pub fn check_compaction(graph: &CollapsedGraph) -> OracleResult {
        let compiled = match graph.compiled_graph() {
            Ok(compiled) => compiled,
            Err(err) => return unreadable(&err),
        };
        let expected: Vec<usize> = visible_mask(graph)
            .iter()
            .enumerate()
            .filter_map(|(i, visible)| visible.then_some(i))
            .collect();
        let actual: Vec<usize> = (0..compiled.node_count())
            .filter_map(|i| compiled.backing_index(i))
            .collect();
        if expected == actual {
            OracleResult::pass()
        } else {
            OracleResult::from_violations(vec![InvariantViolation::Compaction { expected, actual }])
        }
    }

    #[must_use]
    pub fn check_round_trip(graph: &CollapsedGraph) -> OracleResult {
        let compiled = match graph.compiled_graph() {
            Ok(compiled) => compiled,
            Err(err) => return unreadable(&err),
        };
        let backing = graph.backing();
        let violations = (0..backing.node_count())
            .filter(|&index| graph.is_visible(index))
            .filter_map(|index| {
                let mapped = compiled
                    .index_of_id(backing.id_of(index))
                    .and_then(|c| compiled.backing_index(c));
                (mapped != Some(index)).then_some(InvariantViolation::RoundTrip { index, mapped })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    /// Connectors must be exactly the hidden-path pairs, owned by visible
    /// nodes, with no arrows left over.
    #[must_use]
    pub fn check_connectors(edges: &[(usize, usize)], graph: &CollapsedGraph) -> OracleResult {
        let expected = Self::expected_connectors(edges, &visible_mask(graph));
        let actual = connector_pairs(graph);

        let mut violations: Vec<InvariantViolation> = expected
            .difference(&actual)
            .map(|&(up, down)| InvariantViolation::MissingConnector { up, down })
            .collect();
        violations.extend(
            actual
                .difference(&expected)
                .map(|&(up, down)| InvariantViolation::SpuriousConnector { up, down }),
        );
        for index in 0..graph.backing().node_count() {
            let owned = graph.synthetic_edges(index);
            if owned.is_empty() {
                continue;
            }
            if !graph.is_visible(index) {
                violations.push(InvariantViolation::HiddenEndpoint { index });
            }
            if owned.iter().any(|edge| edge.kind.is_arrow()) {
                violations.push(InvariantViolation::DanglingArrow { index });
            }
        }
        OracleResult::from_violations(violations)
    }

    /// Compare against a view built from scratch with the same visibility.
    #[must_use]
    pub fn check_against_rebuild(graph: &CollapsedGraph) -> OracleResult {
        let rebuilt = match CollapsedGraph::filtered(Arc::clone(graph.backing()), graph.visibility()) {
            Ok(rebuilt) => rebuilt,
            Err(err) => return unreadable(&err),
        };
        let ours = connector_pairs(graph);
        let theirs = connector_pairs(&rebuilt);
        if ours == theirs {
            return OracleResult::pass();
        }
        OracleResult::from_violations(vec![InvariantViolation::Divergence {
            only_incremental: ours.difference(&theirs).copied().collect(),
            only_rebuilt: theirs.difference(&ours).copied().collect(),
        }])
    }

    #[must_use]
    pub fn check_all(edges: &[(usize, usize)], graph: &CollapsedGraph) -> OracleResult {
        Self::check_compaction(graph)
            .merge(Self::check_round_trip(graph))
            .merge(Self::check_connectors(edges, graph))
            .merge(Self::check_against_rebuild(graph))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Every dotted connector of `graph` as `(up, down)` backing indices.
#[must_use]
pub fn connector_pairs(graph: &CollapsedGraph) -> BTreeSet<(usize, usize)> {
    (0..graph.backing().node_count())
        .flat_map(|i| graph.synthetic_edges(i))
        .filter(|edge| edge.kind == EdgeKind::Dotted)
        .filter_map(|edge| Some((edge.up?, edge.down?)))
        .collect()
}

fn visible_mask(graph: &CollapsedGraph) -> Vec<bool> {
    (0..graph.backing().node_count())
        .map(|i| graph.is_visible(i))
        .collect()
}

fn unreadable(err: &dyn std::error::Error) -> OracleResult {
    OracleResult::from_violations(vec![InvariantViolation::Unreadable {
        reason: err.to_string(),
    }])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
