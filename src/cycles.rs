//! Cycle & SCC analyzer, elementary-cycle half (component C2).
//!
//! Enumerates every elementary cycle of a directed multigraph following
//! [Tarjan's 1973 circuit-enumeration algorithm][1]. For each starting node
//! `s` (ascending index), a DFS explores only nodes with index `>= s`,
//! blocking a node on entry and leaving it blocked until a cycle closing
//! back to `s` is found through it. Each cycle has a unique minimum-index
//! node, so starting from `s` in ascending order produces every elementary
//! cycle exactly once. Self-loops are cycles of length one.
//!
//! [1]: https://doi.org/10.1137/0202002
//!
//! The DFS is naturally recursive; it is converted here to an explicit work
//! stack so cycle-rich flowsheets don't risk exhausting the native stack.

use crate::graph::{filtered_adjacency, EdgeIndex, Graph, Neighbor, NodeIndex};
use std::collections::HashSet;

/// One elementary cycle, represented in lockstep as nodes and as edges —
/// both orderings trace the same closed walk, with the final edge
/// returning to the first node.
#[derive(Clone, Debug)]
pub struct Cycle {
    pub nodes: Vec<NodeIndex>,
    pub edges: Vec<EdgeIndex>,
}

/// Enumerate every elementary cycle of `g`.
pub fn elementary_cycles<N, A>(g: &Graph<N, A>) -> Vec<Cycle> {
    let adjacency = filtered_adjacency(g, &HashSet::new(), None, true);
    let n = adjacency.index_to_node.len();
    let mut adj: Vec<Vec<Neighbor>> = adjacency.successors;

    let mut mark = vec![false; n];
    let mut mark_stack: Vec<usize> = Vec::new();
    let mut point_stack: Vec<(usize, Option<EdgeIndex>)> = Vec::new();
    let mut raw_cycles: Vec<Vec<(usize, Option<EdgeIndex>)>> = Vec::new();

    struct Frame {
        v: usize,
        sucs: Vec<Neighbor>,
        pos: usize,
        found_cycle: bool,
    }

    for start in 0..n {
        // top-level call: backtrack(start, pre_key = None)
        point_stack.push((start, None));
        mark[start] = true;
        mark_stack.push(start);
        let mut work: Vec<Frame> = vec![Frame {
            v: start,
            sucs: adj[start].clone(),
            pos: 0,
            found_cycle: false,
        }];

        while let Some(frame) = work.last_mut() {
            let v = frame.v;
            if frame.pos < frame.sucs.len() {
                let Neighbor { local: si, edge } = frame.sucs[frame.pos];
                frame.pos += 1;

                if si < start {
                    // This neighbor leads only to already-exhausted start
                    // nodes; prune it from the live adjacency permanently.
                    adj[v].retain(|nb| !(nb.local == si && nb.edge == edge));
                } else if si == start {
                    frame.found_cycle = true;
                    let mut cyc = point_stack.clone();
                    cyc.push((start, Some(edge)));
                    raw_cycles.push(cyc);
                } else if !mark[si] {
                    point_stack.push((si, Some(edge)));
                    mark[si] = true;
                    mark_stack.push(si);
                    work.push(Frame {
                        v: si,
                        sucs: adj[si].clone(),
                        pos: 0,
                        found_cycle: false,
                    });
                }
            } else {
                let found = frame.found_cycle;
                if found {
                    while let Some(&top) = mark_stack.last() {
                        mark_stack.pop();
                        mark[top] = false;
                        if top == v {
                            break;
                        }
                    }
                    // v itself must stay reachable for future unblocking
                    // within this same start-node search, matching the
                    // reference behaviour of clearing down to (and
                    // including) v only when v closed a cycle.
                }
                point_stack.pop();
                work.pop();
                if let Some(parent) = work.last_mut() {
                    parent.found_cycle = parent.found_cycle || found;
                }
            }
        }

        while let Some(i) = mark_stack.pop() {
            mark[i] = false;
        }
    }

    raw_cycles
        .into_iter()
        .map(|cyc| {
            let nodes: Vec<NodeIndex> = cyc[..cyc.len() - 1]
                .iter()
                .map(|&(local, _)| adjacency.index_to_node[local])
                .collect();
            let edges: Vec<EdgeIndex> = cyc[1..].iter().map(|&(_, key)| key.unwrap()).collect();
            Cycle { nodes, edges }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "b", ()), ("b", "c", ())]);
        assert!(elementary_cycles(&g).is_empty());
    }

    #[test]
    fn self_loop_is_a_length_one_cycle() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "a", ())]);
        let cycles = elementary_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].nodes, vec![NodeIndex::new(0)]);
        assert_eq!(cycles[0].edges, vec![EdgeIndex::new(0)]);
    }

    #[test]
    fn two_node_cycle_is_found_once() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![("a", "b", ()), ("b", "a", ())]);
        let cycles = elementary_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].edges.len(), 2);
    }

    #[test]
    fn two_cycles_sharing_only_a_node_are_both_found() {
        // a->b->a and a->c->a share node a but no edge.
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![
            ("a", "b", ()),
            ("b", "a", ()),
            ("a", "c", ()),
            ("c", "a", ()),
        ]);
        let cycles = elementary_cycles(&g);
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn two_cycles_sharing_an_edge_are_both_found() {
        // a->x->b->a and a->x->c->a share edge a->x.
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![
            ("a", "x", ()),
            ("x", "b", ()),
            ("b", "a", ()),
            ("x", "c", ()),
            ("c", "a", ()),
        ]);
        let cycles = elementary_cycles(&g);
        assert_eq!(cycles.len(), 2);
        let shared_edge = EdgeIndex::new(0);
        assert!(cycles.iter().all(|c| c.edges.contains(&shared_edge)));
    }

    #[test]
    fn disconnected_components_are_both_processed() {
        let g: Graph<&str, ()> = Graph::try_from_arcs(vec![
            ("a", "b", ()),
            ("b", "a", ()),
            ("c", "d", ()),
            ("d", "c", ()),
        ]);
        let cycles = elementary_cycles(&g);
        assert_eq!(cycles.len(), 2);
    }
}
