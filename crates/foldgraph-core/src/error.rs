use std::fmt;

use crate::graph::NodeId;

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ModificationInProgress,
    UnderModification,
    ForeignModification,
    IndexOutOfRange,
    NotTopological,
    DuplicateId,
    IdOverflow,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ModificationInProgress => "E1001",
            Self::UnderModification => "E1002",
            Self::ForeignModification => "E1003",
            Self::IndexOutOfRange => "E2001",
            Self::NotTopological => "E3001",
            Self::DuplicateId => "E3002",
            Self::IdOverflow => "E3003",
        }
    }

    /// Short human-facing summary for logs.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ModificationInProgress => "Modification already in progress",
            Self::UnderModification => "Graph is under modification",
            Self::ForeignModification => "Modification belongs to another graph",
            Self::IndexOutOfRange => "Node index out of range",
            Self::NotTopological => "Backing edge is not topologically ordered",
            Self::DuplicateId => "Duplicate node id",
            Self::IdOverflow => "Node id is reserved",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ModificationInProgress => {
                Some("Apply the pending modification before starting another one.")
            }
            Self::UnderModification => Some("Read the compiled graph after apply() returns."),
            Self::ForeignModification => {
                Some("Apply a modification only to the graph that started it.")
            }
            Self::IndexOutOfRange => None,
            Self::NotTopological => {
                Some("Index backing nodes so every edge points from a smaller to a larger index.")
            }
            Self::DuplicateId => Some("Give every backing node a distinct stable id."),
            Self::IdOverflow => Some("Node id u32::MAX is reserved for dangling edges."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Result alias used across the engine.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Errors raised by the collapsible graph engine.
///
/// The first three variants are contract violations by the caller. The
/// remaining ones reject malformed backing graphs or out-of-range lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("modification already in progress")]
    ModificationInProgress,

    #[error("graph is under modification")]
    UnderModification,

    #[error("modification was not started by this graph")]
    ForeignModification,

    #[error("node index {index} out of range (node count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("edge {up} -> {down} does not point to a larger index")]
    NotTopological { up: usize, down: usize },

    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    #[error("node id {0} is reserved")]
    IdOverflow(u32),
}

impl GraphError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ModificationInProgress => ErrorCode::ModificationInProgress,
            Self::UnderModification => ErrorCode::UnderModification,
            Self::ForeignModification => ErrorCode::ForeignModification,
            Self::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            Self::NotTopological { .. } => ErrorCode::NotTopological,
            Self::DuplicateId(_) => ErrorCode::DuplicateId,
            Self::IdOverflow(_) => ErrorCode::IdOverflow,
        }
    }

    /// Optional remediation hint for this error.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
