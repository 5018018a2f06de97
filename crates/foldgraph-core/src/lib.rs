#![forbid(unsafe_code)]
//! foldgraph-core: a collapsible view over large history DAGs.
//!
//! A [`CollapsedGraph`] wraps an immutable [`BackingGraph`], hides a subset
//! of its nodes and bridges each hidden run with a synthesized dotted
//! connector, so that what remains on screen stays connected the way the
//! full graph is.
//!
//! # Layout
//!
//! - [`graph`]: index-space vocabulary and the graph traits.
//! - [`visibility`], [`compactor`]: which nodes are shown and their dense
//!   renumbering.
//! - [`edges`]: storage for synthesized edges.
//! - [`collapsed`]: the facade, its transactions and its compiled view.
//! - [`dotted`]: connector synthesis over a changed range.
//! - [`fragment`]: collapsible-run search and branch reachability.
//! - [`controller`]: stacked view layers driven by [`controller::GraphAction`].
//!
//! # Conventions
//!
//! - **Errors**: engine operations return [`error::Result`]; config loading
//!   uses `anyhow::Result`.
//! - **Logging**: `tracing` macros (`debug!`, `trace!`, `warn!`).

pub mod collapsed;
pub mod compactor;
pub mod config;
pub mod controller;
pub mod dotted;
pub mod edges;
pub mod error;
pub mod fragment;
pub mod graph;
pub mod visibility;

pub use collapsed::{CollapsedGraph, CompiledGraph, Modification};
pub use config::{EngineConfig, load_engine_config};
pub use dotted::{DottedEdgeSynthesizer, apply_and_bridge, bridge_range};
pub use error::{ErrorCode, GraphError};
pub use fragment::{Fragment, FragmentFinder, reachable_from};
pub use graph::{
    Adjacency, BackingGraph, Direction, EdgeFilter, EdgeKind, GraphEdge, GraphElement, GraphNode,
    LinearGraph, NodeId, StaticGraph,
};
pub use visibility::VisibilityMap;
