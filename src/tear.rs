//! Tear selector (component C3).
//!
//! Breaking every cycle requires removing at least one edge per elementary
//! cycle found by [`crate::cycles::elementary_cycles`]. Three ways to pick
//! that edge set are offered, cheapest to most thorough:
//!
//! - [`TearSelector::fast_upper_bound`]: a single DFS, no cycle enumeration
//!   needed, used to seed the other two methods' bounds.
//! - [`TearSelector::select_heuristic`]: branch-and-bound over the
//!   cycle/edge incidence matrix, minimizing first the worst-hit cycle's
//!   tear count, then the total number of tears.
//! - [`TearSelector::select_exact`]: the same objective solved exactly as a
//!   mixed-integer program via a pluggable [`TearSolver`].

use crate::cycles::{elementary_cycles, Cycle};
use crate::error::{Error, Result};
use crate::graph::{EdgeIndex, Graph, NodeIndex};
use crate::scc::strongly_connected_components;
use std::collections::HashSet;

/// A fast, possibly non-minimal, upper bound on the tear set: a single DFS
/// from every unvisited node, recording each node's depth in its tree.
/// An edge whose target already has a recorded depth smaller than the
/// source's is treated as a back edge and torn.
///
/// Self-loops are not caught by this rule (a self-loop's target has the
/// *same* recorded depth as its source, not a smaller one) — this matches
/// the reference heuristic exactly; a self-loop is still caught by both
/// [`TearSelector::select_exact`] and [`TearSelector::select_heuristic`],
/// which work from the full elementary-cycle list instead.
pub fn fast_tear_upper_bound<N, A>(g: &Graph<N, A>) -> HashSet<EdgeIndex> {
    let n = g.node_count();
    let mut depths: Vec<Option<usize>> = vec![None; n];
    let mut tear = HashSet::new();

    struct Frame {
        depth: usize,
        edges: Vec<EdgeIndex>,
        pos: usize,
    }

    for start in 0..n {
        if depths[start].is_some() {
            continue;
        }
        depths[start] = Some(0);
        let mut work: Vec<Frame> = vec![Frame {
            depth: 0,
            edges: g.out_edges(NodeIndex::new(start)).to_vec(),
            pos: 0,
        }];

        while let Some(frame) = work.last_mut() {
            if frame.pos < frame.edges.len() {
                let e = frame.edges[frame.pos];
                frame.pos += 1;
                let succ = g.edge_endpoints(e).target;
                match depths[succ.index()] {
                    None => {
                        depths[succ.index()] = Some(frame.depth + 1);
                        work.push(Frame {
                            depth: frame.depth + 1,
                            edges: g.out_edges(succ).to_vec(),
                            pos: 0,
                        });
                    }
                    Some(d) => {
                        if d < frame.depth {
                            tear.insert(e);
                        }
                    }
                }
            } else {
                work.pop();
            }
        }
    }

    tear
}

/// External collaborator boundary for exact tear selection (spec.md §6,
/// "Algebraic solver"). Implementors receive the cycle/edge incidence
/// structure of the MIP described in §4.3 — one binary variable per edge,
/// one "worst cycle" continuous variable, minimizing `1000 * worst +
/// sum(edges tom)` — and return the edges selected.
pub trait TearSolver {
    fn solve(&self, num_edges: usize, cycle_edges: &[Vec<usize>]) -> Result<HashSet<usize>>;
}

/// [`TearSolver`] backed by `good_lp`'s HiGHS binding.
pub struct GoodLpTearSolver;

impl TearSolver for GoodLpTearSolver {
    fn solve(&self, num_edges: usize, cycle_edges: &[Vec<usize>]) -> Result<HashSet<usize>> {
        use good_lp::{constraint, variable, variables, Expression, Solution, SolverModel};

        let mut vars = variables!();
        let y: Vec<_> = (0..num_edges)
            .map(|_| vars.add(variable().integer().min(0).max(1)))
            .collect();
        let worst = vars.add(variable().min(0));

        let mut objective = Expression::from(1000.0 * worst);
        for &v in &y {
            objective += v;
        }

        let mut problem = vars.minimise(objective).using(good_lp::solvers::highs::highs);
        for cyc in cycle_edges {
            let mut sum_expr = Expression::from(0);
            for &e in cyc {
                sum_expr += y[e];
            }
            problem = problem.with(constraint!(sum_expr.clone() >= 1));
            problem = problem.with(constraint!(worst >= sum_expr));
        }

        let solution = problem
            .solve()
            .map_err(|e| Error::SolverError(e.to_string()))?;

        Ok(y
            .iter()
            .enumerate()
            .filter(|(_, &v)| solution.value(v) > 0.5)
            .map(|(e, _)| e)
            .collect())
    }
}

/// One branch-and-bound solution: which edges are torn, the worst single
/// cycle's tear count, and the total tear count.
pub type HeuristicSolution = (Vec<bool>, usize, usize);

/// Computes, validates, and exposes tear sets for one graph, caching the
/// elementary-cycle enumeration they all build on.
pub struct TearSelector<'g, N, A> {
    g: &'g Graph<N, A>,
    cycles: Vec<Cycle>,
}

impl<'g, N, A> TearSelector<'g, N, A> {
    pub fn new(g: &'g Graph<N, A>) -> Self {
        let cycles = elementary_cycles(g);
        TearSelector { g, cycles }
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn fast_upper_bound(&self) -> HashSet<EdgeIndex> {
        fast_tear_upper_bound(self.g)
    }

    fn cycle_edge_indices(&self) -> Vec<Vec<usize>> {
        self.cycles
            .iter()
            .map(|c| c.edges.iter().map(|e| e.index()).collect())
            .collect()
    }

    /// Solve the exact MIP model (§4.3) via `solver`.
    pub fn select_exact(&self, solver: &dyn TearSolver) -> Result<HashSet<EdgeIndex>> {
        if self.cycles.is_empty() {
            return Ok(HashSet::new());
        }
        let cycle_edges = self.cycle_edge_indices();
        let chosen = solver.solve(self.g.edge_count(), &cycle_edges)?;
        Ok(chosen.into_iter().map(EdgeIndex::new).collect())
    }

    /// Branch-and-bound over the cycle/edge incidence matrix, seeded by the
    /// fast upper bound. Returns every equally-optimal solution found,
    /// de-duplicated, ordered by their edge-selection vector.
    pub fn all_optimal_tear_sets(&self) -> Vec<HeuristicSolution> {
        let num_edges = self.g.edge_count();
        if self.cycles.is_empty() {
            return vec![(vec![false; num_edges], 0, 0)];
        }

        let cycle_edges = self.cycle_edge_indices();
        let seed = fast_tear_upper_bound(self.g);
        let mut y0 = vec![false; num_edges];
        for e in &seed {
            y0[e.index()] = true;
        }
        let seed_counts = cycle_tear_counts(&y0, &cycle_edges);
        // The fast heuristic can under-tear (it never catches self-loops),
        // so only trust it as a pruning bound if it actually covers every
        // cycle; otherwise start unbounded and let the search establish one.
        let mut bound = if seed_counts.iter().all(|&c| c >= 1) {
            (
                seed_counts.iter().copied().max().unwrap_or(0),
                y0.iter().filter(|&&b| b).count(),
            )
        } else {
            (usize::MAX, usize::MAX)
        };
        let mut solutions: Vec<HeuristicSolution> = Vec::new();
        let all_false = vec![false; num_edges];
        search(
            0,
            &all_false,
            cycle_edges.len(),
            &cycle_edges,
            &mut bound,
            &mut solutions,
        );

        solutions.retain(|(_, worst, total)| {
            *worst < bound.0 || (*worst == bound.0 && *total <= bound.1)
        });
        solutions.sort_by(|a, b| a.0.cmp(&b.0));
        solutions.dedup_by(|a, b| a.0 == b.0);
        solutions
    }

    /// The single branch-and-bound solution with the fewest total tears
    /// among those tying on worst-cycle tear count.
    pub fn select_heuristic(&self) -> HashSet<EdgeIndex> {
        let solutions = self.all_optimal_tear_sets();
        let best = solutions
            .iter()
            .min_by_key(|(_, worst, total)| (*worst, *total))
            .expect("branch-and-bound always returns at least one solution");
        best.0
            .iter()
            .enumerate()
            .filter(|(_, &torn)| torn)
            .map(|(e, _)| EdgeIndex::new(e))
            .collect()
    }

    /// A user-supplied tear set is valid iff removing it leaves every SCC
    /// of size 1 or less (spec.md §4.3). This does not by itself catch a
    /// surviving self-loop, since a self-loop's SCC still has exactly one
    /// node — matching the reference validator.
    pub fn validate(&self, tear_set: &HashSet<EdgeIndex>) -> Result<()> {
        let partition = strongly_connected_components(self.g, tear_set);
        for comp in &partition.nodes {
            if comp.len() > 1 {
                return Err(Error::InvalidTearSet {
                    node: comp[0],
                    size: comp.len(),
                });
            }
        }
        Ok(())
    }
}

fn cycle_tear_counts(y: &[bool], cycle_edges: &[Vec<usize>]) -> Vec<usize> {
    cycle_edges
        .iter()
        .map(|edges| edges.iter().filter(|&&e| y[e]).count())
        .collect()
}

/// Recursive branch-and-bound search ("`sear`" in the reference): `depth`
/// indexes the next cycle to tear an edge from, among those not yet
/// covered by `y`. Recursion depth is bounded by the number of cycles,
/// which is small for realistic flowsheets, so this is left as plain
/// recursion rather than converted to an explicit stack.
fn search(
    depth: usize,
    y: &[bool],
    nr: usize,
    cycle_edges: &[Vec<usize>],
    bound: &mut (usize, usize),
    solutions: &mut Vec<HeuristicSolution>,
) {
    for &e in &cycle_edges[depth] {
        let mut y2 = y.to_vec();
        y2[e] = true;
        let counts = cycle_tear_counts(&y2, cycle_edges);
        let worst = *counts.iter().max().unwrap();
        let total = y2.iter().filter(|&&b| b).count();

        if worst > bound.0 || (worst == bound.0 && total > bound.1) {
            continue;
        }

        let covered = *counts.iter().min().unwrap() >= 1;
        if covered {
            if worst < bound.0 {
                *bound = (worst, total);
            } else if total < bound.1 {
                bound.1 = total;
            }
            solutions.push((y2.clone(), worst, total));
        } else {
            for j in (depth + 1)..nr {
                if counts[j] == 0 {
                    search(j, &y2, nr, cycle_edges, bound, solutions);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn acyclic_graph_needs_no_tears() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "b", ()), ("b", "c", ())]);
        let selector = TearSelector::new(&g);
        assert!(selector.fast_upper_bound().is_empty());
        assert!(selector.select_heuristic().is_empty());
    }

    #[test]
    fn two_node_cycle_tears_exactly_one_edge() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "b", ()), ("b", "a", ())]);
        let selector = TearSelector::new(&g);
        let tear = selector.select_heuristic();
        assert_eq!(tear.len(), 1);
        assert!(selector.validate(&tear).is_ok());
    }

    #[test]
    fn two_disjoint_cycles_sharing_no_edge_each_need_one_tear() {
        // a<->b and c<->d, independent two-cycles.
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![
            ("a", "b", ()),
            ("b", "a", ()),
            ("c", "d", ()),
            ("d", "c", ()),
        ]);
        let selector = TearSelector::new(&g);
        let solutions = selector.all_optimal_tear_sets();
        let best = &solutions[0];
        assert_eq!(best.1, 1); // worst cycle has exactly one tear
        assert_eq!(best.2, 2); // two tears total, one per cycle
    }

    #[test]
    fn shared_edge_tear_covers_both_cycles_with_one_edge() {
        // a->x->b->a and a->x->c->a: tearing a->x alone breaks both.
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![
            ("a", "x", ()),
            ("x", "b", ()),
            ("b", "a", ()),
            ("x", "c", ()),
            ("c", "a", ()),
        ]);
        let selector = TearSelector::new(&g);
        let tear = selector.select_heuristic();
        assert_eq!(tear.len(), 1);
        assert!(selector.validate(&tear).is_ok());
    }

    #[test]
    fn fast_upper_bound_does_not_tear_a_self_loop() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "a", ())]);
        let ub = fast_tear_upper_bound(&g);
        assert!(ub.is_empty());
    }

    #[test]
    fn self_loop_is_torn_by_heuristic_search() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "a", ())]);
        let selector = TearSelector::new(&g);
        let tear = selector.select_heuristic();
        assert_eq!(tear, [EdgeIndex::new(0)].into_iter().collect());
        assert!(selector.validate(&tear).is_ok());
    }

    #[test]
    fn invalid_tear_set_is_rejected() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "b", ()), ("b", "a", ())]);
        let selector = TearSelector::new(&g);
        assert!(selector.validate(&HashSet::new()).is_err());
    }
}
