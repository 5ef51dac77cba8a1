//! Black-box scenarios from the specification's testable-properties section:
//! one elementary network per scenario, driven end-to-end through
//! [`flowsolve_core::driver::run_network`].
//!
//! The harness below (`ScenarioModel`) is the smallest [`Model`]
//! implementation that can express "unit reads one scalar input, writes one
//! scalar output, arcs carry `y = x`" — just enough to exercise the
//! calculation order, tear selection, and convergence driver without
//! needing a real symbolic-expression layer.

use flowsolve_core::graph::{EdgeIndex, Graph};
use flowsolve_core::model::{ArcConstraint, InletPort, Model, OutletPort, PortMember};
use flowsolve_core::{driver, RunOptions, SelectTearMethod, TearMethod, TolType};
use std::collections::{HashMap, HashSet};

type Unit = u32;
type Var = u32;

/// A tiny network of scalar "unit reads in, writes out" nodes. Each unit
/// owns at most one inlet variable and exactly one outlet variable; each
/// arc's expanded block is the single identity constraint `dest = src`.
struct ScenarioModel {
    values: HashMap<Var, f64>,
    fixed: HashSet<Var>,
    in_var: HashMap<Unit, Var>,
    out_var: HashMap<Unit, Var>,
    incoming: HashMap<Unit, Vec<EdgeIndex>>,
    outgoing: HashMap<Unit, Vec<EdgeIndex>>,
    edge_src_out: HashMap<EdgeIndex, Var>,
    edge_dst_in: HashMap<EdgeIndex, Var>,
    funcs: HashMap<Unit, Box<dyn Fn(f64) -> f64>>,
}

impl ScenarioModel {
    fn new() -> Self {
        ScenarioModel {
            values: HashMap::new(),
            fixed: HashSet::new(),
            in_var: HashMap::new(),
            out_var: HashMap::new(),
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
            edge_src_out: HashMap::new(),
            edge_dst_in: HashMap::new(),
            funcs: HashMap::new(),
        }
    }

    /// Register a unit with its own inlet/outlet variable pair (fresh
    /// integer ids, since this harness has no concrete port-identity type
    /// of its own) and evaluation function.
    fn add_unit(&mut self, unit: Unit, has_inlet: bool, f: impl Fn(f64) -> f64 + 'static) {
        let out_var = unit * 2 + 1;
        self.out_var.insert(unit, out_var);
        if has_inlet {
            self.in_var.insert(unit, unit * 2);
        }
        self.incoming.entry(unit).or_default();
        self.outgoing.entry(unit).or_default();
        self.funcs.insert(unit, Box::new(f));
    }

    fn add_edge<A>(&mut self, g: &Graph<Unit, A>, edge: EdgeIndex) {
        let ends = g.edge_endpoints(edge);
        let src_unit = *g.node_weight(ends.source);
        let dst_unit = *g.node_weight(ends.target);
        self.outgoing.entry(src_unit).or_default().push(edge);
        self.incoming.entry(dst_unit).or_default().push(edge);
        self.edge_src_out.insert(edge, self.out_var[&src_unit]);
        self.edge_dst_in.insert(edge, self.in_var[&dst_unit]);
    }
}

impl Model for ScenarioModel {
    type Var = Var;
    type Unit = Unit;

    fn is_fixed(&self, var: Var) -> bool {
        self.fixed.contains(&var)
    }
    fn fix(&mut self, var: Var, value: f64) {
        self.fixed.insert(var);
        self.values.insert(var, value);
    }
    fn free(&mut self, var: Var) {
        self.fixed.remove(&var);
    }
    fn current_value(&self, var: Var) -> Option<f64> {
        self.values.get(&var).copied()
    }

    fn inlet_ports(&self, unit: Unit) -> Vec<InletPort<Var>> {
        match self.in_var.get(&unit) {
            None => Vec::new(),
            Some(&var) => vec![InletPort {
                name: "in".to_string(),
                incoming_arcs: self.incoming.get(&unit).cloned().unwrap_or_default(),
                members: vec![PortMember {
                    name: "val".to_string(),
                    var,
                    index: None,
                    is_extensive: false,
                    is_expression: false,
                }],
            }],
        }
    }

    fn outlet_ports(&self, unit: Unit) -> Vec<OutletPort<Var>> {
        vec![OutletPort {
            name: "out".to_string(),
            outgoing_arcs: self.outgoing.get(&unit).cloned().unwrap_or_default(),
            expression_vars: vec![self.out_var[&unit]],
        }]
    }

    fn evaluate(&mut self, unit: Unit) -> flowsolve_core::Result<()> {
        let input = self
            .in_var
            .get(&unit)
            .and_then(|&v| self.values.get(&v).copied())
            .unwrap_or(0.0);
        let output = (self.funcs[&unit])(input);
        self.fix(self.out_var[&unit], output);
        Ok(())
    }

    fn arc_constraints(&self, arc: EdgeIndex) -> Vec<ArcConstraint<Var>> {
        let src_val = self.values.get(&self.edge_src_out[&arc]).copied().unwrap_or(0.0);
        let dst_var = self.edge_dst_in[&arc];
        if self.fixed.contains(&dst_var) {
            vec![ArcConstraint::Determined {
                name: "y=x".to_string(),
                lhs: self.values[&dst_var],
                rhs: src_val,
            }]
        } else {
            vec![ArcConstraint::OneFreeVariable {
                name: "y=x".to_string(),
                var: dst_var,
                coeff: 1.0,
                constant: 0.0,
                target: src_val,
            }]
        }
    }

    fn extensive_arc_variable(&self, _arc: EdgeIndex, _member: &str) -> Option<Var> {
        None
    }

    fn fix_extensive_total(&mut self, _unit: Unit, _member: &str, _total: f64) {}

    fn tear_arc_value(&self, arc: EdgeIndex, _var: Var) -> Option<f64> {
        self.values.get(&self.edge_src_out[&arc]).copied()
    }
}

fn heuristic_options() -> RunOptions {
    RunOptions {
        select_tear_method: SelectTearMethod::Heuristic,
        ..RunOptions::default()
    }
}

/// S1: acyclic three-node chain A -> B -> C, `y = x` on both arcs. A has no
/// inlet and its function always produces 5.0. After `run`: B.out = 5,
/// C.in = 5, and no tear edges were needed.
#[test]
fn s1_acyclic_chain_propagates_without_tearing() {
    let g: Graph<Unit, ()> = Graph::try_from_arcs(vec![(0u32, 1u32, ()), (1, 2, ())]);

    let mut model = ScenarioModel::new();
    model.add_unit(0, false, |_| 5.0);
    model.add_unit(1, true, |x| x);
    model.add_unit(2, true, |x| x);
    for e in g.edge_indices() {
        model.add_edge(&g, e);
    }

    let dst_of = model.edge_dst_in.clone();
    let report = driver::run_network(
        &g,
        &mut model,
        None,
        |e| dst_of[&e],
        &HashMap::new(),
        &HashMap::new(),
        &heuristic_options(),
        true,
        true,
        None,
    )
    .unwrap();

    assert!(report.tear_set.is_empty());
    assert!(report.scc_reports.is_empty());
    assert_eq!(model.current_value(model.out_var[&1]), Some(5.0));
    assert_eq!(model.current_value(model.in_var[&2]), Some(5.0));
}

/// S2: a single self-looped node, `y = x`. The tear selector must tear the
/// self-loop, and Direct substitution converges immediately since the
/// identity map is already self-consistent at any seed value.
#[test]
fn s2_self_loop_converges_in_one_iteration() {
    let g: Graph<Unit, ()> = Graph::try_from_arcs(vec![(0u32, 0u32, ())]);

    let mut model = ScenarioModel::new();
    model.add_unit(0, true, |x| x);
    for e in g.edge_indices() {
        model.add_edge(&g, e);
    }

    let mut defaults = HashMap::new();
    defaults.insert(model.in_var[&0], 3.0);

    let options = RunOptions {
        tear_method: TearMethod::Direct,
        ..heuristic_options()
    };

    let dst_of = model.edge_dst_in.clone();
    let report = driver::run_network(
        &g,
        &mut model,
        None,
        |e| dst_of[&e],
        &HashMap::new(),
        &defaults,
        &options,
        true,
        true,
        None,
    )
    .unwrap();

    assert_eq!(report.tear_set.len(), 1);
    assert_eq!(report.scc_reports.len(), 1);
    let history = &report.scc_reports[0].history;
    assert!(history.converged);
    assert_eq!(history.iterations, 1);
    assert!(history.max_error.abs() < 1e-12);
}

/// S3: A <-> B with A.out = 0.5*A.in + 1 and B.out = 0.5*B.in. The analytic
/// fixed point is A.out = 4/3; Direct substitution with tol = 1e-6 must
/// converge well inside the default iteration cap.
#[test]
fn s3_two_node_cycle_converges_to_analytic_fixed_point() {
    let g: Graph<Unit, ()> = Graph::try_from_arcs(vec![(0u32, 1u32, ()), (1, 0, ())]);

    let mut model = ScenarioModel::new();
    model.add_unit(0, true, |x| 0.5 * x + 1.0);
    model.add_unit(1, true, |x| 0.5 * x);
    for e in g.edge_indices() {
        model.add_edge(&g, e);
    }

    let mut defaults = HashMap::new();
    defaults.insert(model.in_var[&0], 0.0);
    defaults.insert(model.in_var[&1], 0.0);

    let options = RunOptions {
        tear_method: TearMethod::Direct,
        tol: 1e-6,
        tol_type: TolType::Absolute,
        ..heuristic_options()
    };

    let dst_of = model.edge_dst_in.clone();
    let report = driver::run_network(
        &g,
        &mut model,
        None,
        |e| dst_of[&e],
        &HashMap::new(),
        &defaults,
        &options,
        true,
        true,
        None,
    )
    .unwrap();

    assert_eq!(report.scc_reports.len(), 1);
    let history = &report.scc_reports[0].history;
    assert!(history.converged);
    assert!(history.iterations <= 40);

    let a_out = model.current_value(model.out_var[&0]).unwrap();
    assert!((a_out - 4.0 / 3.0).abs() < 1e-5);
}

/// A non-contracting two-node cycle (combined gain 1.5, so |slope| > 1 at
/// the only fixed point, 0): Direct substitution must not silently succeed
/// — it has to exhaust `iterlim` and report non-convergence, per spec.md's
/// Non-goal that divergence is reported, not prevented.
#[test]
fn divergent_cycle_is_reported_not_hidden() {
    let g: Graph<Unit, ()> = Graph::try_from_arcs(vec![(0u32, 1u32, ()), (1, 0, ())]);

    let mut model = ScenarioModel::new();
    model.add_unit(0, true, |x| 1.5 * x);
    model.add_unit(1, true, |x| x);
    for e in g.edge_indices() {
        model.add_edge(&g, e);
    }

    let mut defaults = HashMap::new();
    defaults.insert(model.in_var[&0], 1.0);
    defaults.insert(model.in_var[&1], 1.0);

    let options = RunOptions {
        tear_method: TearMethod::Direct,
        tol: 1e-5,
        iterlim: 40,
        ..heuristic_options()
    };

    let dst_of = model.edge_dst_in.clone();
    let report = driver::run_network(
        &g,
        &mut model,
        None,
        |e| dst_of[&e],
        &HashMap::new(),
        &defaults,
        &options,
        true,
        true,
        None,
    )
    .unwrap();

    let history = &report.scc_reports[0].history;
    assert!(!history.converged);
    assert_eq!(history.iterations, 40);
}

/// S6: a user-supplied tear set missing an edge of a 3-cycle must be
/// rejected before any iteration runs.
#[test]
fn s6_invalid_tear_override_is_rejected() {
    let g: Graph<Unit, ()> =
        Graph::try_from_arcs(vec![(0u32, 1u32, ()), (1, 2, ()), (2, 0, ())]);

    let mut model = ScenarioModel::new();
    model.add_unit(0, true, |x| x);
    model.add_unit(1, true, |x| x);
    model.add_unit(2, true, |x| x);
    for e in g.edge_indices() {
        model.add_edge(&g, e);
    }

    // Supply an empty tear set: the 3-cycle is left entirely intact.
    let bogus_tear_set: HashSet<EdgeIndex> = HashSet::new();

    let dst_of = model.edge_dst_in.clone();
    let result = driver::run_network(
        &g,
        &mut model,
        Some(bogus_tear_set),
        |e| dst_of[&e],
        &HashMap::new(),
        &HashMap::new(),
        &heuristic_options(),
        true,
        true,
        None,
    );

    assert!(matches!(
        result,
        Err(flowsolve_core::Error::InvalidTearSet { .. })
    ));
}

/// Testable property 8: running a converged network's order a second time
/// leaves tear-edge values unchanged within tolerance.
#[test]
fn idempotent_rerun_after_convergence() {
    let g: Graph<Unit, ()> = Graph::try_from_arcs(vec![(0u32, 1u32, ()), (1, 0, ())]);

    let mut model = ScenarioModel::new();
    model.add_unit(0, true, |x| 0.5 * x + 1.0);
    model.add_unit(1, true, |x| 0.5 * x);
    for e in g.edge_indices() {
        model.add_edge(&g, e);
    }

    let mut defaults = HashMap::new();
    defaults.insert(model.in_var[&0], 0.0);
    defaults.insert(model.in_var[&1], 0.0);

    let options = RunOptions {
        tear_method: TearMethod::Direct,
        tol: 1e-6,
        ..heuristic_options()
    };

    let dst_of = model.edge_dst_in.clone();
    driver::run_network(
        &g,
        &mut model,
        None,
        |e| dst_of[&e],
        &HashMap::new(),
        &defaults,
        &options,
        true,
        true,
        None,
    )
    .unwrap();
    let first = model.current_value(model.out_var[&0]).unwrap();

    let report2 = driver::run_network(
        &g,
        &mut model,
        None,
        |e| dst_of[&e],
        &HashMap::new(),
        &defaults,
        &options,
        true,
        true,
        None,
    )
    .unwrap();
    let second = model.current_value(model.out_var[&0]).unwrap();

    assert!(report2.scc_reports[0].history.converged);
    assert!((first - second).abs() < 1e-6);
}
