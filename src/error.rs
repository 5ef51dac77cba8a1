//! The error taxonomy for the sequential decomposition engine.
//!
//! One enum covers every fatal condition named in the specification's error
//! taxonomy. `IterationLimit` is deliberately *not* a variant here: hitting
//! an iteration cap is non-fatal and is reported as data on
//! [`crate::driver::ConvergenceHistory`], not as an `Err`.

use crate::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;

/// Errors produced by graph construction, tear selection, ordering, and the
/// convergence driver.
#[derive(Debug, Error)]
pub enum Error {
    /// An arc supplied by the model was not directed.
    #[error("arc '{name}' is not directed")]
    UndirectedArc { name: String },

    /// An arc supplied by the model had no expanded block.
    #[error("arc '{name}' has not been expanded")]
    UnexpandedArc { name: String },

    /// A user-supplied tear set does not acyclify the graph.
    #[error("tear set does not break all cycles: SCC containing node {node:?} still has {size} nodes after removing the supplied tear set")]
    InvalidTearSet { node: NodeIndex, size: usize },

    /// An enum-valued option was given a name the engine does not recognize.
    #[error("invalid value '{value}' for option '{option}'")]
    InvalidOption { option: &'static str, value: String },

    /// An equality constraint was fixed on both sides with disagreeing values.
    #[error("arc {edge:?} ('{constraint}'): source and destination fixed to disagreeing values (|{lhs} - {rhs}| > {tol})")]
    OverdeterminedArc {
        edge: EdgeIndex,
        constraint: String,
        lhs: f64,
        rhs: f64,
        tol: f64,
    },

    /// A propagation constraint had more than one free variable, or was non-linear.
    #[error("arc {edge:?} ('{constraint}'): constraint is non-linear or has more than one free variable")]
    UnderdeterminedArc { edge: EdgeIndex, constraint: String },

    /// An inequality was found on an arc's expanded block.
    #[error("arc {edge:?} ('{constraint}'): expanded block contains a non-equality constraint")]
    NonEqualityOnExpandedBlock { edge: EdgeIndex, constraint: String },

    /// A free inlet variable had no current value, no guess, and no default.
    #[error("port member '{member}' on unit '{unit}' has no current value, guess, or default")]
    MissingValue { unit: String, member: String },

    /// A guess was given a shape incompatible with the member it targets.
    #[error("guess for member '{member}' on port '{port}' has the wrong shape: {reason}")]
    GuessTypeError {
        port: String,
        member: String,
        reason: String,
    },

    /// The calculation orderer was invoked on a graph that is not a DAG.
    #[error("calculation ordering was invoked on a non-DAG: node {node:?} was revisited, indicating a cycle was not excluded by the caller")]
    CycleDuringOrdering { node: NodeIndex },

    /// The MIP solver invoked for exact tear selection failed.
    #[error("tear-set MIP solve failed: {0}")]
    SolverError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
