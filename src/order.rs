//! Calculation orderer (component C4).
//!
//! Produces a breadth-first layering of a DAG: level 0 holds the sources
//! (or the caller-supplied roots), and a node appears in level `k` iff every
//! in-neighbor considered by the current mask appears in a level `< k`.
//! The algorithm is deterministic given the input iteration order.

use crate::error::{Error, Result};
use crate::graph::{filtered_adjacency, Graph, NodeIndex};
use std::collections::HashSet;

/// Layer a DAG given by plain integer adjacency lists (no node payload
/// required). This is the generic routine the original calls `tree_order`;
/// it underlies both [`calculation_order`] (C4 proper, over graph nodes)
/// and the SCC-DAG layering used by [`crate::scc`].
///
/// `roots`, if `None`, defaults to every node with no predecessor under
/// `adj`/`rev_adj`. If `Some`, only nodes reachable from `roots` are
/// considered, and the returned levels may omit nodes outside that reach.
///
/// Returns [`Error::CycleDuringOrdering`] if a node would need to be
/// visited a second time — `adj`/`rev_adj` are only valid input if they
/// describe a DAG, which the caller guarantees by excluding a tear set.
pub fn layered_order(
    adj: &[Vec<usize>],
    rev_adj: &[Vec<usize>],
    roots: Option<&[usize]>,
) -> Result<Vec<Vec<usize>>> {
    let n = adj.len();

    // `mark[i]`: i is a root, or a descendant of a root under the current mask.
    let (roots, mark): (Vec<usize>, Vec<bool>) = match roots {
        None => {
            let mut is_target = vec![false; n];
            for succs in adj {
                for &s in succs {
                    is_target[s] = true;
                }
            }
            let roots: Vec<usize> = (0..n).filter(|&i| !is_target[i]).collect();
            (roots, vec![true; n])
        }
        Some(given) => {
            let mut mark = vec![false; n];
            let mut frontier: Vec<usize> = given.to_vec();
            while !frontier.is_empty() {
                let mut next = HashSet::new();
                for i in frontier {
                    if mark[i] {
                        continue;
                    }
                    mark[i] = true;
                    for &s in &adj[i] {
                        next.insert(s);
                    }
                }
                frontier = next.into_iter().collect();
            }
            (given.to_vec(), mark)
        }
    };

    // Remaining-predecessor sets, restricted to marked ancestors not yet placed.
    let mut remaining_preds: Vec<HashSet<usize>> = rev_adj
        .iter()
        .map(|preds| preds.iter().copied().collect())
        .collect();

    let mut depth_of_node: Vec<Option<usize>> = vec![None; n];
    let mut order: Vec<Vec<usize>> = Vec::new();

    let mut candidates: HashSet<usize> = HashSet::new();
    for &r in &roots {
        for &s in &adj[r] {
            candidates.insert(s);
        }
    }

    let mut current_level = roots;
    let mut depth = 0usize;

    while !current_level.is_empty() {
        order.push(current_level.clone());
        for &i in &current_level {
            depth_of_node[i] = Some(depth);
        }
        depth += 1;

        let mut next_level = Vec::new();
        let mut resolved = Vec::new();
        let mut newly_visible = HashSet::new();

        for &i in &candidates {
            if depth_of_node[i].is_some() {
                return Err(Error::CycleDuringOrdering {
                    node: NodeIndex::new(i),
                });
            }

            let placed_last_level: HashSet<usize> = current_level.iter().copied().collect();
            remaining_preds[i].retain(|p| !placed_last_level.contains(p) && mark[*p]);

            if remaining_preds[i].is_empty() {
                next_level.push(i);
                resolved.push(i);
                for &s in &adj[i] {
                    newly_visible.insert(s);
                }
            }
        }

        for i in &resolved {
            candidates.remove(i);
        }
        for i in newly_visible {
            candidates.insert(i);
        }

        current_level = next_level;
    }

    Ok(order)
}

/// Compute a calculation order over `g`'s nodes, excluding `tear_set` edges
/// and, if `nodes` is given, restricted to that subgraph. `roots`, if given,
/// restricts the order to descendants of those nodes (used when only part
/// of the network changed and a full re-order would be wasted work).
pub fn calculation_order<N, A>(
    g: &Graph<N, A>,
    tear_set: &HashSet<crate::graph::EdgeIndex>,
    nodes: Option<&[NodeIndex]>,
    roots: Option<&[NodeIndex]>,
) -> Result<Vec<Vec<NodeIndex>>> {
    let adjacency = filtered_adjacency(g, tear_set, nodes, false);

    let local_adj: Vec<Vec<usize>> = adjacency
        .successors
        .iter()
        .map(|succs| succs.iter().map(|nb| nb.local).collect())
        .collect();
    let local_rev: Vec<Vec<usize>> = adjacency
        .predecessors
        .iter()
        .map(|preds| preds.iter().map(|nb| nb.local).collect())
        .collect();

    let local_roots: Option<Vec<usize>> = roots.map(|rs| {
        rs.iter()
            .filter_map(|&r| adjacency.local_of(r))
            .collect()
    });

    let order_local = layered_order(&local_adj, &local_rev, local_roots.as_deref())?;

    Ok(order_local
        .into_iter()
        .map(|level| level.into_iter().map(|i| adjacency.index_to_node[i]).collect())
        .collect())
}
