//! Cycle & SCC analyzer, strongly-connected-component half (component C2).
//!
//! Strongly connected components are found with an iterative rendition of
//! [Tarjan's algorithm][1] — recursive in the textbook presentation, but
//! converted to an explicit work stack here so that deep flowsheets (long
//! chains of units) don't exhaust the native stack, per the design notes.
//!
//! [1]: https://en.wikipedia.org/wiki/Tarjan%27s_strongly_connected_components_algorithm

use crate::graph::{filtered_adjacency, EdgeIndex, Graph, NodeIndex};
use crate::order::layered_order;
use fixedbitset::FixedBitSet;
use std::collections::HashSet;

/// The strongly connected components of a graph, plus enough bookkeeping
/// to drive per-component tear convergence (C5) without recomputing
/// adjacency from scratch.
pub struct SccPartition {
    /// `nodes[i]` is the set of nodes in SCC `i`. SCCs are listed in
    /// reverse topological order of the condensation (Tarjan's natural
    /// output order).
    pub nodes: Vec<Vec<NodeIndex>>,
    /// Edges with both endpoints inside SCC `i`.
    pub edges: Vec<Vec<EdgeIndex>>,
    /// Edges entering SCC `i` from outside it.
    pub in_edges: Vec<Vec<EdgeIndex>>,
    /// Edges leaving SCC `i` to outside it.
    pub out_edges: Vec<Vec<EdgeIndex>>,
    /// Evaluation order over SCC indices: each level has no incoming edge
    /// from a later level.
    pub order: Vec<Vec<usize>>,
}

impl SccPartition {
    pub fn scc_of_node(&self, n: NodeIndex) -> Option<usize> {
        self.nodes.iter().position(|ns| ns.contains(&n))
    }
}

/// Compute the strongly connected components of `g`, excluding `exclude_edges`
/// from consideration, then derive the SCC-DAG evaluation order.
pub fn strongly_connected_components<N, A>(
    g: &Graph<N, A>,
    exclude_edges: &HashSet<EdgeIndex>,
) -> SccPartition {
    let adjacency = filtered_adjacency(g, exclude_edges, None, false);
    let local_sccs = tarjan_scc(&adjacency.successors.iter().map(|s| s.iter().map(|n| n.local).collect()).collect::<Vec<Vec<usize>>>());

    let nodes: Vec<Vec<NodeIndex>> = local_sccs
        .iter()
        .map(|comp| comp.iter().map(|&i| adjacency.index_to_node[i]).collect())
        .collect();

    let (edges, in_edges, out_edges) = partition_edges(g, &nodes);

    let order = scc_calculation_order(&nodes, &in_edges, &out_edges);

    SccPartition {
        nodes,
        edges,
        in_edges,
        out_edges,
        order,
    }
}

/// Iterative Tarjan SCC over plain integer adjacency lists. Returns SCCs in
/// reverse topological order of the condensation, each as a list of local
/// node indices (arbitrary order within a component).
fn tarjan_scc(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut index_of: Vec<Option<usize>> = vec![None; n];
    let mut lowlink: Vec<usize> = vec![0; n];
    let mut on_stack = FixedBitSet::with_capacity(n);
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    // Explicit-stack DFS. Each frame tracks the node being visited and how
    // far through its neighbor list we've gotten, mirroring the call frame
    // of a recursive `strongconnect(v)` without using the native stack.
    struct Frame {
        node: usize,
        neighbor_pos: usize,
    }

    for start in 0..n {
        if index_of[start].is_some() {
            continue;
        }

        let mut work: Vec<Frame> = vec![Frame {
            node: start,
            neighbor_pos: 0,
        }];
        index_of[start] = Some(next_index);
        lowlink[start] = next_index;
        next_index += 1;
        on_stack.insert(start);
        stack.push(start);

        while let Some(frame) = work.last_mut() {
            let v = frame.node;
            if frame.neighbor_pos < adj[v].len() {
                let w = adj[v][frame.neighbor_pos];
                frame.neighbor_pos += 1;

                match index_of[w] {
                    None => {
                        index_of[w] = Some(next_index);
                        lowlink[w] = next_index;
                        next_index += 1;
                        on_stack.insert(w);
                        stack.push(w);
                        work.push(Frame {
                            node: w,
                            neighbor_pos: 0,
                        });
                    }
                    Some(w_index) => {
                        if on_stack[w] {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                    }
                }
            } else {
                // Finished exploring v's neighbors: propagate lowlink to
                // the parent and, if v is a component root, pop the SCC.
                if lowlink[v] == index_of[v].unwrap() {
                    let mut comp = Vec::new();
                    while let Some(&w) = stack.last() {
                        stack.pop();
                        on_stack.remove(w);
                        comp.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(comp);
                }
                work.pop();
                if let Some(parent) = work.last_mut() {
                    let p = parent.node;
                    lowlink[p] = lowlink[p].min(lowlink[v]);
                }
            }
        }
    }

    sccs
}

fn partition_edges<N, A>(
    g: &Graph<N, A>,
    sccs: &[Vec<NodeIndex>],
) -> (Vec<Vec<EdgeIndex>>, Vec<Vec<EdgeIndex>>, Vec<Vec<EdgeIndex>>) {
    let mut scc_of: std::collections::HashMap<NodeIndex, usize> = std::collections::HashMap::new();
    for (i, comp) in sccs.iter().enumerate() {
        for &n in comp {
            scc_of.insert(n, i);
        }
    }

    let mut edges = vec![Vec::new(); sccs.len()];
    let mut in_edges = vec![Vec::new(); sccs.len()];
    let mut out_edges = vec![Vec::new(); sccs.len()];

    for e in g.edge_indices() {
        let ends = g.edge_endpoints(e);
        let src_scc = scc_of.get(&ends.source).copied();
        let dst_scc = scc_of.get(&ends.target).copied();
        match (src_scc, dst_scc) {
            (Some(s), Some(d)) if s == d => edges[s].push(e),
            (Some(s), Some(d)) => {
                out_edges[s].push(e);
                in_edges[d].push(e);
            }
            _ => {}
        }
    }

    (edges, in_edges, out_edges)
}

/// Build an adjacency list over SCC indices by matching each SCC's
/// `in_edges` against every other SCC's `out_edges`: a match means the
/// second SCC feeds the first. Feed the result to the same BFS layering
/// routine the calculation orderer (C4) uses.
fn scc_calculation_order(
    sccs: &[Vec<NodeIndex>],
    in_edges: &[Vec<EdgeIndex>],
    out_edges: &[Vec<EdgeIndex>],
) -> Vec<Vec<usize>> {
    let n = sccs.len();
    let mut adj = vec![Vec::new(); n];
    let mut rev_adj = vec![Vec::new(); n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let feeds = in_edges[i]
                .iter()
                .any(|ine| out_edges[j].contains(ine));
            if feeds {
                adj[j].push(i);
                rev_adj[i].push(j);
            }
        }
    }

    layered_order(&adj, &rev_adj, None).expect("SCC condensation is always acyclic")
}
