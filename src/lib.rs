//! Sequential modular decomposition of directed process networks.
//!
//! Given a directed multigraph of computational units and the streams that
//! connect them, this crate decides *how* to evaluate the network: it finds
//! an evaluation order that respects data dependencies, tears the minimum
//! number of cyclic edges needed to make that order possible, and converges
//! the torn edges to self-consistency with a choice of fixed-point schemes.
//!
//! The five components described in the specification map directly onto
//! this crate's modules:
//!
//! - [`graph`] — C1, the graph representation and its cached adjacency views.
//! - [`scc`] and [`cycles`] — C2, SCC partitioning and elementary cycle
//!   enumeration.
//! - [`tear`] — C3, tear-set selection (fast heuristic, branch-and-bound,
//!   exact MIP).
//! - [`order`] — C4, breadth-first calculation-order layering.
//! - [`driver`], [`propagate`], [`ledger`], [`guesses`] — C5, the
//!   tear-convergence driver and its supporting machinery.
//!
//! [`model`] holds the narrow trait boundary ([`model::Model`],
//! [`model::ArcSource`]) a caller implements to plug their own modeling
//! layer (ports, arcs, symbolic expressions) into the engine; this crate
//! never implements that layer itself.

pub mod config;
pub mod cycles;
pub mod driver;
pub mod error;
pub mod graph;
pub mod guesses;
pub mod ledger;
pub mod model;
pub mod order;
pub mod propagate;
pub mod scc;
pub mod tear;

pub use config::{RunOptions, SelectTearMethod, TearMethod, TolType};
pub use driver::{run_network, ConvergenceHistory, NetworkReport, SccReport, TearStream};
pub use error::{Error, Result};
pub use graph::{EdgeIndex, Graph, NodeIndex};
pub use model::{ArcSource, Model};
pub use tear::{GoodLpTearSolver, TearSelector, TearSolver};
