use thiserror::Error;

use crate::graph::GateType;

/// Validation errors raised at the graph-building boundary.
///
/// Once a graph passes [`validate`][crate::graph::FaultTree::validate],
/// the analytical passes assume a well-formed input and enforce their
/// own contracts with assertions.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum GraphError {
    #[error("argument index must not be zero")]
    ZeroIndex,

    #[error("node {0} is not an argument candidate of this graph")]
    UnknownNode(u32),

    #[error("duplicate argument {0}")]
    DuplicateArgument(i32),

    #[error("argument {0} already present with the opposite sign")]
    ComplementArgument(i32),

    #[error("{gate_type:?} gate {index} must have {expected} arguments, got {actual}")]
    WrongArity {
        index: u32,
        gate_type: GateType,
        expected: &'static str,
        actual: usize,
    },

    #[error("ATLEAST gate {index} must have a vote number of at least 2, got {vote_number}")]
    InvalidVoteNumber { index: u32, vote_number: u32 },

    #[error("the root gate must not have parents")]
    RootWithParents,
}
