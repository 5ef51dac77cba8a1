//! Tear-convergence driver (component C5).
//!
//! Drives one full pass over the calculation order (C4), fixing and
//! releasing inputs unit by unit, propagating values down every
//! non-torn arc, then closing the loop on the torn arcs by comparing each
//! tear variable's guessed value against what the rest of the network
//! just recomputed for it — repeating until every tear variable agrees
//! with its recomputation within tolerance, or the iteration limit is hit.

use crate::config::{RunOptions, SelectTearMethod, TearMethod, TolType};
use crate::error::{Error, Result};
use crate::graph::{EdgeIndex, Graph, NodeIndex};
use crate::guesses::apply_guesses;
use crate::ledger::ScopedFix;
use crate::model::{Guesses, InletPort, Model};
use crate::order::calculation_order;
use crate::propagate::{load_extensive_member, propagate_arc};
use crate::scc::strongly_connected_components;
use crate::tear::{TearSelector, TearSolver};
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// One tear variable to iterate on: the arc it was torn from, and the
/// destination-side variable whose guess drives convergence.
#[derive(Clone, Copy, Debug)]
pub struct TearStream<V> {
    pub arc: EdgeIndex,
    pub var: V,
}

/// The record of one `run` call: how many sweeps it took, whether it
/// converged, the worst per-variable error at the last sweep, and the
/// full per-sweep error history (one row per sweep, one column per tear
/// variable) for callers that want to inspect convergence behavior rather
/// than just the final verdict.
#[derive(Clone, Debug, Default)]
pub struct ConvergenceHistory {
    pub iterations: usize,
    pub converged: bool,
    pub max_error: f64,
    pub report_diffs: Vec<Vec<f64>>,
}

/// Error between a tear stream's source-side value `s` and its
/// destination-side peer `d` (spec.md §8 Property 7): absolute error is
/// `s - d`; relative error is `(s - d) / s`, keeping the sign and magnitude
/// of the raw difference when the reference (`s`) is zero rather than
/// dividing by zero.
pub fn compute_err(s: f64, d: f64, tol_type: TolType) -> f64 {
    let diff = s - d;
    match tol_type {
        TolType::Absolute => diff,
        TolType::Relative => {
            if s == 0.0 {
                diff
            } else {
                diff / s
            }
        }
    }
}

/// One Wegstein-accelerated update of a tear variable, given the previous
/// and current (input, recomputed-output) pairs. Falls back to `y_curr`
/// (direct substitution) whenever the slope is degenerate or non-finite.
pub fn wegstein_step(
    x_prev: f64,
    y_prev: f64,
    x_curr: f64,
    y_curr: f64,
    accel_min: f64,
    accel_max: f64,
) -> f64 {
    let dx = x_curr - x_prev;
    let dy = y_curr - y_prev;
    let mut slope = if dx == 0.0 { 0.0 } else { dy / dx };
    if !slope.is_finite() {
        slope = 0.0;
    }
    let mut accel = slope / (slope - 1.0);
    if !accel.is_finite() {
        accel = 0.0;
    }
    accel = accel.clamp(accel_min, accel_max);
    accel * x_curr + (1.0 - accel) * y_curr
}

/// Run every unit in `order`'s levels once, in order: for each unit, fix
/// its inlet inputs (guesses, if `first_pass`, then current values, then
/// defaults), evaluate it, release those fixes, then propagate every arc
/// not in `ignore` to the next unit's inlet.
///
/// Guesses are only injected on the first pass (spec.md §4.5.2(a)): once
/// the network has been evaluated once, every port either already carries
/// a real current value or is being driven by the tear-convergence loop,
/// so re-injecting a stale guess over a freshly computed value would be
/// wrong.
///
/// A value propagated into a downstream unit's inlet stays fixed in
/// `fixed_inputs` until that unit's own turn consumes it — not released
/// the moment the source unit's outlet scope exits — so it is visible to
/// `load_inlet_port`'s `is_fixed` check and to any later arc into the same
/// variable that expects it to already be settled (spec.md §4.5.3).
pub fn run_order<M: Model, A>(
    g: &Graph<M::Unit, A>,
    model: &mut M,
    order: &[Vec<NodeIndex>],
    ignore: &HashSet<EdgeIndex>,
    guesses: &Guesses<M::Unit>,
    defaults: &HashMap<M::Var, f64>,
    almost_equal_tol: f64,
    first_pass: bool,
) -> Result<()> {
    let mut fixed_inputs: HashMap<M::Unit, Vec<M::Var>> = HashMap::new();
    for level in order {
        for &node in level {
            let unit = *g.node_weight(node);
            debug!(unit = ?unit, "evaluating unit");

            let inlet_ports = model.inlet_ports(unit);
            {
                let mut scoped = ScopedFix::new(model);
                for port in &inlet_ports {
                    load_inlet_port(&mut scoped, unit, port, guesses, defaults, first_pass)?;
                }
                scoped.model_mut().evaluate(unit)?;
                scoped.release();
            }

            if let Some(held) = fixed_inputs.remove(&unit) {
                for var in held {
                    model.free(var);
                }
            }

            let outlet_ports = model.outlet_ports(unit);
            for port in &outlet_ports {
                let mut scoped = ScopedFix::new(model);
                for &var in &port.expression_vars {
                    if let Some(value) = scoped.model().current_value(var) {
                        scoped.fix(var, value);
                    }
                }
                for &arc in &port.outgoing_arcs {
                    if ignore.contains(&arc) {
                        continue;
                    }
                    let dest_unit = *g.node_weight(g.edge_endpoints(arc).target);
                    let dest_ledger = fixed_inputs.entry(dest_unit).or_default();
                    propagate_arc(scoped.model_mut(), dest_ledger, arc, almost_equal_tol)?;
                }
                scoped.release();
            }
        }
    }
    Ok(())
}

/// Propagate a fixed set of arcs regardless of calculation order, re-fixing
/// each source unit's outlet expression variables just long enough to
/// discharge that one arc's constraints. Used once a tear-converged SCC's
/// internal state is settled, to push its results out to the rest of the
/// network (spec.md §4.5.4, §4.5.5: "on convergence, propagate
/// outEdges(SCC)"). The destination variables these arcs solve for are left
/// fixed at their converged value: the network downstream of a settled SCC
/// is meant to see it as a constant input, not something to free again.
pub fn propagate_edges<M: Model, A>(
    g: &Graph<M::Unit, A>,
    model: &mut M,
    edges: &[EdgeIndex],
    almost_equal_tol: f64,
) -> Result<()> {
    let mut dest_ledger = Vec::new();
    for &arc in edges {
        let src_unit = *g.node_weight(g.edge_endpoints(arc).source);
        let outlet_ports = model.outlet_ports(src_unit);
        for port in &outlet_ports {
            if !port.outgoing_arcs.contains(&arc) {
                continue;
            }
            let mut scoped = ScopedFix::new(model);
            for &var in &port.expression_vars {
                if let Some(value) = scoped.model().current_value(var) {
                    scoped.fix(var, value);
                }
            }
            dest_ledger.clear();
            propagate_arc(scoped.model_mut(), &mut dest_ledger, arc, almost_equal_tol)?;
            scoped.release();
        }
    }
    Ok(())
}

fn load_inlet_port<M: Model>(
    scoped: &mut ScopedFix<M>,
    unit: M::Unit,
    port: &InletPort<M::Var>,
    guesses: &Guesses<M::Unit>,
    defaults: &HashMap<M::Var, f64>,
    first_pass: bool,
) -> Result<()> {
    if first_pass {
        apply_guesses(scoped, guesses, unit, port)?;
    }

    let mut extensive_names: Vec<String> = Vec::new();
    for member in &port.members {
        if member.is_extensive && !extensive_names.iter().any(|n| n == &member.name) {
            extensive_names.push(member.name.clone());
        }
    }
    for name in &extensive_names {
        let has_expanded_vars = port
            .incoming_arcs
            .iter()
            .any(|&arc| scoped.model().extensive_arc_variable(arc, name).is_some());
        if has_expanded_vars {
            load_extensive_member(scoped, unit, name, &port.incoming_arcs, None)?;
        }
    }

    for member in &port.members {
        if member.is_extensive || member.is_expression {
            continue;
        }
        if scoped.model().is_fixed(member.var) {
            continue;
        }
        let value = scoped
            .model()
            .current_value(member.var)
            .or_else(|| defaults.get(&member.var).copied())
            .ok_or_else(|| Error::MissingValue {
                unit: format!("{:?}", unit),
                member: member.name.clone(),
            })?;
        scoped.fix(member.var, value);
    }
    Ok(())
}

/// Run the tear-convergence loop for one SCC: repeatedly walk `order`
/// (already restricted to the SCC and excluding its own tear edges),
/// comparing each tear variable's current (guessed) value against what the
/// rest of the network recomputes for it, until every one agrees within
/// `options.tol` or `options.iterlim` sweeps have run. `ignore` is the set
/// of arcs `run_order` must not propagate during the loop — normally the
/// whole-graph tear set unioned with this SCC's out-edges (spec.md §4.5.4
/// step 5), since out-edges are only propagated once, after convergence.
/// Tear variables that are not already fixed are seeded from `defaults`
/// before the first sweep.
pub fn converge<M: Model, A>(
    g: &Graph<M::Unit, A>,
    model: &mut M,
    order: &[Vec<NodeIndex>],
    ignore: &HashSet<EdgeIndex>,
    tear_vars: &[TearStream<M::Var>],
    guesses: &Guesses<M::Unit>,
    defaults: &HashMap<M::Var, f64>,
    options: &RunOptions,
) -> Result<ConvergenceHistory> {
    for stream in tear_vars {
        if !model.is_fixed(stream.var) {
            let value = model
                .current_value(stream.var)
                .or_else(|| defaults.get(&stream.var).copied())
                .ok_or_else(|| Error::MissingValue {
                    unit: "tear".to_string(),
                    member: format!("{:?}", stream.var),
                })?;
            model.fix(stream.var, value);
        }
    }

    let mut history = ConvergenceHistory::default();
    let mut prev: Option<(Vec<f64>, Vec<f64>)> = None;

    for _ in 0..options.iterlim.max(1) {
        run_order(
            g,
            model,
            order,
            ignore,
            guesses,
            defaults,
            options.almost_equal_tol,
            false,
        )?;

        // `x` is dvals: the tear variable's current (guessed) destination-side
        // value. `y` is svals: what the rest of the network's source-side
        // expression just recomputed for it, scaled by the arc's splitfrac
        // if it carries one (spec.md §4.5.4 step 1).
        let x: Vec<f64> = tear_vars
            .iter()
            .map(|s| {
                model
                    .current_value(s.var)
                    .expect("tear variable is always fixed before a sweep")
            })
            .collect();
        let y: Vec<f64> = tear_vars
            .iter()
            .zip(&x)
            .map(|(s, &xi)| {
                let raw = model.tear_arc_value(s.arc, s.var).unwrap_or(xi);
                raw * model.split_fraction(s.arc).unwrap_or(1.0)
            })
            .collect();

        let diffs: Vec<f64> = x
            .iter()
            .zip(&y)
            .map(|(&xi, &yi)| compute_err(yi, xi, options.tol_type))
            .collect();
        history.iterations += 1;
        history.max_error = diffs.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        history.report_diffs.push(diffs);

        debug!(
            iteration = history.iterations,
            max_error = history.max_error,
            "tear sweep"
        );

        if history.max_error <= options.tol {
            history.converged = true;
            break;
        }

        let next_x: Vec<f64> = match options.tear_method {
            TearMethod::Direct => y.clone(),
            TearMethod::Wegstein => match &prev {
                Some((px, py)) => x
                    .iter()
                    .zip(&y)
                    .enumerate()
                    .map(|(i, (&xi, &yi))| {
                        wegstein_step(px[i], py[i], xi, yi, options.accel_min, options.accel_max)
                    })
                    .collect(),
                None => y.clone(),
            },
        };

        for (stream, &value) in tear_vars.iter().zip(&next_x) {
            model.free(stream.var);
            model.fix(stream.var, value);
        }

        prev = Some((x, y));
    }

    if !history.converged {
        warn!(
            iterations = history.iterations,
            max_error = history.max_error,
            "tear iteration did not converge within iterlim"
        );
    }

    Ok(history)
}

/// Per-SCC record of one `run_network` call: the SCC's node set and its
/// tear-convergence history. SCCs with no internal tear edges (trivial
/// singletons) are not reported, since [`converge`] never runs on them.
#[derive(Clone, Debug)]
pub struct SccReport {
    pub nodes: Vec<NodeIndex>,
    pub history: ConvergenceHistory,
}

/// The full record of one [`run_network`] call: the tear set that was
/// used (whichever selector chose it, or the caller's override) and one
/// [`SccReport`] per SCC that actually needed tear convergence, in the
/// order they were processed.
#[derive(Clone, Debug, Default)]
pub struct NetworkReport {
    pub tear_set: HashSet<EdgeIndex>,
    pub scc_reports: Vec<SccReport>,
}

/// Top-level entry point (spec.md §4.5.1): obtain a tear set, optionally
/// run a global first pass over the whole network, then, if the graph has
/// any cycles, converge each SCC's tear streams in SCC-DAG order and
/// propagate its results downstream once it settles.
///
/// `tear_var_of` maps a torn edge to the destination-side variable whose
/// convergence drives the tear loop for that edge — the model-side
/// counterpart of spec.md's "destination peer" of a tear stream.
/// `solver` is required only when `options.select_tear_method` is
/// [`SelectTearMethod::Mip`] and no `tear_set_override` is supplied.
#[allow(clippy::too_many_arguments)]
pub fn run_network<M: Model, A>(
    g: &Graph<M::Unit, A>,
    model: &mut M,
    tear_set_override: Option<HashSet<EdgeIndex>>,
    tear_var_of: impl Fn(EdgeIndex) -> M::Var,
    guesses: &Guesses<M::Unit>,
    defaults: &HashMap<M::Var, f64>,
    options: &RunOptions,
    run_first_pass: bool,
    solve_tears: bool,
    solver: Option<&dyn TearSolver>,
) -> Result<NetworkReport> {
    let selector = TearSelector::new(g);

    let tear_set = match tear_set_override {
        Some(t) => {
            selector.validate(&t)?;
            t
        }
        None => match options.select_tear_method {
            SelectTearMethod::Heuristic => selector.select_heuristic(),
            SelectTearMethod::Mip => {
                let solver = solver.ok_or_else(|| {
                    Error::SolverError(
                        "select_tear_method is mip but no TearSolver was supplied".to_string(),
                    )
                })?;
                selector.select_exact(solver)?
            }
        },
    };
    info!(tear_edges = tear_set.len(), "tear set selected");

    if run_first_pass {
        let order = calculation_order(g, &tear_set, None, None)?;
        run_order(
            g,
            model,
            &order,
            &tear_set,
            guesses,
            defaults,
            options.almost_equal_tol,
            true,
        )?;
    }

    let mut report = NetworkReport {
        tear_set: tear_set.clone(),
        scc_reports: Vec::new(),
    };

    if !solve_tears || tear_set.is_empty() {
        return Ok(report);
    }

    let partition = strongly_connected_components(g, &HashSet::new());

    for level in &partition.order {
        for &scc_idx in level {
            let scc_tears: HashSet<EdgeIndex> = partition.edges[scc_idx]
                .iter()
                .copied()
                .filter(|e| tear_set.contains(e))
                .collect();
            if scc_tears.is_empty() {
                continue;
            }

            let scc_nodes = &partition.nodes[scc_idx];
            debug!(scc = scc_idx, nodes = scc_nodes.len(), "converging SCC");

            let internal_order =
                calculation_order(g, &scc_tears, Some(scc_nodes), None)?;

            let mut ignore = tear_set.clone();
            ignore.extend(partition.out_edges[scc_idx].iter().copied());

            let tear_vars: Vec<TearStream<M::Var>> = scc_tears
                .iter()
                .map(|&arc| TearStream {
                    arc,
                    var: tear_var_of(arc),
                })
                .collect();

            let history = converge(
                g,
                model,
                &internal_order,
                &ignore,
                &tear_vars,
                guesses,
                defaults,
                options,
            )?;

            propagate_edges(
                g,
                model,
                &partition.out_edges[scc_idx],
                options.almost_equal_tol,
            )?;

            report.scc_reports.push(SccReport {
                nodes: scc_nodes.clone(),
                history,
            });
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_err_absolute_is_source_minus_destination() {
        assert_eq!(compute_err(1.5, 1.0, TolType::Absolute), 0.5);
    }

    #[test]
    fn compute_err_relative_divides_by_source_value() {
        assert_eq!(compute_err(2.0, 1.8, TolType::Relative), 0.1);
    }

    #[test]
    fn compute_err_relative_zero_over_zero_is_zero() {
        assert_eq!(compute_err(0.0, 0.0, TolType::Relative), 0.0);
    }

    #[test]
    fn compute_err_relative_nonzero_source_zero_preserves_numerator() {
        assert_eq!(compute_err(0.0, 3.0, TolType::Relative), -3.0);
    }

    #[test]
    fn wegstein_step_with_zero_accel_is_direct_substitution() {
        // slope 2 => raw accel 2 => clamped to accel_max 0 => result is
        // y_curr, i.e. direct substitution.
        let result = wegstein_step(0.0, 0.0, 1.0, 2.0, -5.0, 0.0);
        assert_eq!(result, 2.0);
    }

    #[test]
    fn wegstein_accel_is_clamped() {
        // A very steep slope would push accel far below accel_min.
        let result = wegstein_step(0.0, 0.0, 1.0, 1000.0, -2.0, 0.0);
        let direct = wegstein_step(0.0, 0.0, 1.0, 1000.0, f64::NEG_INFINITY, f64::INFINITY);
        // Clamped result must differ from the unclamped one when the
        // natural slope falls outside the configured range.
        assert_ne!(result, direct);
    }
}
