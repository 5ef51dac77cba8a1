//! External interfaces (specification §6).
//!
//! Everything in this module is a narrow trait boundary, not an
//! implementation: the modeling layer that builds ports, arcs, and units,
//! and the symbolic expression machinery behind them, are external
//! collaborators this crate never implements (spec.md §1, "Out of scope").
//! A caller adapts their own model by implementing [`ArcSource`] (to build
//! a [`crate::graph::Graph`]) and [`Model`] (to drive evaluation).

use crate::graph::EdgeIndex;
use std::collections::HashMap;
use std::hash::Hash;

/// One arc as exposed by the modeling layer, before a [`crate::graph::Graph`]
/// is built from it. Mirrors the fields spec.md §6 requires every arc to
/// expose: `src`, `dest`, `expanded_block != null`, `directed`, `name`.
pub trait ArcSource {
    type Unit: Clone + Eq + Hash;

    fn src_unit(&self) -> Self::Unit;
    fn dest_unit(&self) -> Self::Unit;
    fn name(&self) -> &str;
    fn directed(&self) -> bool;
    fn is_expanded(&self) -> bool;
}

/// Build a [`crate::graph::Graph`] from a model's arcs, checking the two
/// invariants spec.md §6 requires at construction: every arc directed and
/// expanded. Nodes are exactly the arcs' endpoint units.
pub fn build_graph<A: ArcSource>(
    arcs: impl IntoIterator<Item = A>,
) -> crate::error::Result<crate::graph::Graph<A::Unit, A>> {
    let mut collected = Vec::new();
    for arc in arcs {
        if !arc.directed() {
            return Err(crate::error::Error::UndirectedArc {
                name: arc.name().to_string(),
            });
        }
        if !arc.is_expanded() {
            return Err(crate::error::Error::UnexpandedArc {
                name: arc.name().to_string(),
            });
        }
        let src = arc.src_unit();
        let dest = arc.dest_unit();
        collected.push((src, dest, arc));
    }
    Ok(crate::graph::Graph::try_from_arcs(collected))
}

/// One member of a port: a single variable, possibly one slot of an
/// indexed member, possibly extensive (summed across incoming arcs).
#[derive(Clone, Debug)]
pub struct PortMember<V> {
    pub name: String,
    pub var: V,
    /// `Some` identifies one slot of an indexed member; `None` for a
    /// scalar member.
    pub index: Option<String>,
    pub is_extensive: bool,
    pub is_expression: bool,
}

/// An inlet port (a port with at least one incoming arc).
#[derive(Clone, Debug)]
pub struct InletPort<V> {
    pub name: String,
    pub incoming_arcs: Vec<EdgeIndex>,
    pub members: Vec<PortMember<V>>,
}

/// An outlet port (a port with at least one outgoing arc).
#[derive(Clone, Debug)]
pub struct OutletPort<V> {
    pub name: String,
    pub outgoing_arcs: Vec<EdgeIndex>,
    /// Free variables appearing in this port's expressions, which must be
    /// transiently fixed before any of its arcs is propagated (§4.5.2).
    pub expression_vars: Vec<V>,
}

/// One constraint on an arc's expanded block, already evaluated against
/// the source side's (now transiently fixed) values.
#[derive(Clone, Debug)]
pub enum ArcConstraint<V> {
    /// Both sides were already fixed; `lhs`/`rhs` are their values.
    Determined { name: String, lhs: f64, rhs: f64 },
    /// Exactly one free variable enters linearly: `var * coeff + constant
    /// = target`.
    OneFreeVariable {
        name: String,
        var: V,
        coeff: f64,
        constant: f64,
        target: f64,
    },
    /// Non-linear, or more than one free variable.
    Underdetermined { name: String },
    /// An inequality was found where only equalities are expected.
    NonEquality { name: String },
}

/// The evaluation-time boundary to the external model: variable storage,
/// port/arc introspection, and the unit evaluation callback live on the
/// caller's side of this trait.
pub trait Model {
    type Var: Copy + Eq + Hash + std::fmt::Debug;
    type Unit: Copy + Eq + Hash + std::fmt::Debug;

    fn is_fixed(&self, var: Self::Var) -> bool;
    fn fix(&mut self, var: Self::Var, value: f64);
    fn free(&mut self, var: Self::Var);
    fn current_value(&self, var: Self::Var) -> Option<f64>;

    /// Every inlet port on `unit`.
    fn inlet_ports(&self, unit: Self::Unit) -> Vec<InletPort<Self::Var>>;

    /// Every outlet port on `unit`.
    fn outlet_ports(&self, unit: Self::Unit) -> Vec<OutletPort<Self::Var>>;

    /// `function(unit)` (§6, "Unit evaluation callback"): read fixed
    /// inputs, write results. Must not mutate the graph.
    fn evaluate(&mut self, unit: Self::Unit) -> crate::error::Result<()>;

    /// Constraints on `arc`'s expanded block, read after the source side's
    /// expression variables have been transiently fixed.
    fn arc_constraints(&self, arc: EdgeIndex) -> Vec<ArcConstraint<Self::Var>>;

    /// The per-arc expanded variable backing `member` on `arc`'s
    /// destination port, if that member is extensive. `None` if the arc is
    /// 1-to-1 (no expanded variable) or `member` isn't extensive on it.
    fn extensive_arc_variable(&self, arc: EdgeIndex, member: &str) -> Option<Self::Var>;

    /// Fix the destination port member named `member` on `unit` to the sum
    /// of its per-arc expanded variables.
    fn fix_extensive_total(&mut self, unit: Self::Unit, member: &str, total: f64);

    /// The `splitfrac` multiplier on `arc`, if it carries one. The tear
    /// convergence loop (C5) multiplies this arc's source-side value by
    /// this factor before comparing it against the tear variable's
    /// destination-side guess (spec.md §4.5.4 step 1).
    fn split_fraction(&self, _arc: EdgeIndex) -> Option<f64> {
        None
    }

    /// For a torn arc: the value its source-side expression currently
    /// implies for `var` on its destination port, independent of whether
    /// `var` happens to already be fixed to a guess. The convergence
    /// driver (C5) calls this once per sweep, after the rest of the
    /// network has been evaluated, to read the freshly recomputed value a
    /// tear stream's guess is being compared against (spec.md §4.5.4,
    /// §4.5.5). Returns `None` if `var` does not appear linearly in the
    /// arc's source-side expression.
    fn tear_arc_value(&self, arc: EdgeIndex, var: Self::Var) -> Option<f64>;
}

/// A guess value, as spec.md §4.5.6 defines them: a scalar, a mapping from
/// index to scalar (for indexed members), or a list of per-arc values (for
/// extensive members fed by more than one arc).
#[derive(Clone, Debug)]
pub enum GuessValue {
    Scalar(f64),
    Indexed(HashMap<String, f64>),
    PerArc(Vec<(EdgeIndex, f64)>),
}

/// `port -> {member_name -> value}`, keyed by `(unit, port_name)` since
/// this crate has no concrete port-identity type of its own.
pub type Guesses<U> = HashMap<(U, String), HashMap<String, GuessValue>>;
